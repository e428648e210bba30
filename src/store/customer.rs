//! Customer store

use std::sync::Arc;
use crate::customer::Customer;
use crate::dispatch::Dispatcher;
use crate::mapper::{CustomerRow, LicenseRow};
use crate::storage::{ContextHandle, PersistentContext, Predicate};
use crate::StoreError;
use super::{fold, submit};

/// CRUD for customers and, on create and delete, their licenses
#[derive(Clone)]
pub struct CustomerStore {
    context: ContextHandle,
    dispatcher: Arc<dyn Dispatcher>,
}

impl CustomerStore {
    pub fn new(context: ContextHandle, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { context, dispatcher }
    }

    /// All customers with their licenses
    pub fn fetch_customers<C>(&self, completion: C)
    where
        C: FnOnce(Result<Vec<Customer>, StoreError>) + Send + 'static,
    {
        let failure = || StoreError::CannotFetch("Cannot fetch customers".to_string());
        submit(&self.context, &self.dispatcher, failure(), completion, move |context| {
            let load = || -> crate::Result<Vec<Customer>> {
                context
                    .fetch::<CustomerRow>(&Predicate::All)?
                    .into_iter()
                    .map(|row| load_customer(context, row))
                    .collect()
            };
            fold(load(), failure)
        });
    }

    /// The customer with `id`
    pub fn fetch_customer<C>(&self, id: &str, completion: C)
    where
        C: FnOnce(Result<Customer, StoreError>) + Send + 'static,
    {
        let id = id.to_string();
        let failure = {
            let message = format!("Cannot fetch customer with id {}", id);
            move || StoreError::CannotFetch(message.clone())
        };
        submit(&self.context, &self.dispatcher, failure(), completion, move |context| {
            let load = || -> crate::Result<Option<Customer>> {
                match find_customer(context, &id)? {
                    Some(row) => Ok(Some(load_customer(context, row)?)),
                    None => Ok(None),
                }
            };
            fold(load(), &failure)?.ok_or_else(&failure)
        });
    }

    /// Insert a customer and one license row per entry in `customer.licenses`,
    /// each linked to the new customer, in a single commit.
    ///
    /// Duplicate ids are rejected by the database, not checked here.
    pub fn create_customer<C>(&self, customer: Customer, completion: C)
    where
        C: FnOnce(Result<Customer, StoreError>) + Send + 'static,
    {
        let failure = {
            let message = format!("Cannot create customer with id {}", customer.id);
            move || StoreError::CannotCreate(message.clone())
        };
        submit(&self.context, &self.dispatcher, failure(), completion, move |context| {
            let row = CustomerRow::from(&customer);
            context.insert(&row);
            let licenses: Vec<LicenseRow> = customer
                .licenses
                .iter()
                .map(|license| LicenseRow::for_customer(license, &row))
                .collect();
            for license in &licenses {
                context.insert(license);
            }
            fold(context.save(), failure)?;
            Ok(row.into_customer(licenses))
        });
    }

    /// Overwrite the stored name (and id) of an existing customer.
    ///
    /// A missing customer is reported as `CannotUpdate`; nothing is created.
    pub fn update_customer<C>(&self, customer: Customer, completion: C)
    where
        C: FnOnce(Result<Customer, StoreError>) + Send + 'static,
    {
        let lookup_failure = {
            let message = format!("Cannot fetch customer with id {} to update", customer.id);
            move || StoreError::CannotUpdate(message.clone())
        };
        let save_failure = {
            let message = format!("Cannot update customer with id {}", customer.id);
            move || StoreError::CannotUpdate(message.clone())
        };
        submit(&self.context, &self.dispatcher, lookup_failure(), completion, move |context| {
            let found = fold(find_customer(context, &customer.id), &lookup_failure)?;
            let Some(mut row) = found else {
                return Err(lookup_failure());
            };

            let key = row.id.clone();
            let licenses = fold(
                context.fetch::<LicenseRow>(&Predicate::ParentIdEquals(key.clone())),
                &lookup_failure,
            )?;
            row.assign(&customer);
            context.update(&key, &row);
            fold(context.save(), save_failure)?;
            Ok(row.into_customer(licenses))
        });
    }

    /// Delete a customer together with its license rows
    pub fn delete_customer<C>(&self, id: &str, completion: C)
    where
        C: FnOnce(Result<(), StoreError>) + Send + 'static,
    {
        let id = id.to_string();
        let failure = {
            let message = format!("Cannot fetch customer with id {} to delete", id);
            move || StoreError::CannotDelete(message.clone())
        };
        submit(&self.context, &self.dispatcher, failure(), completion, move |context| {
            let mut delete = || -> crate::Result<bool> {
                let Some(row) = find_customer(context, &id)? else {
                    return Ok(false);
                };
                for license in context.fetch::<LicenseRow>(&Predicate::ParentIdEquals(row.id.clone()))? {
                    context.delete(&license);
                }
                context.delete(&row);
                context.save()?;
                Ok(true)
            };
            if fold(delete(), &failure)? {
                Ok(())
            } else {
                Err(failure())
            }
        });
    }
}

fn find_customer(context: &PersistentContext, id: &str) -> crate::Result<Option<CustomerRow>> {
    Ok(context
        .fetch::<CustomerRow>(&Predicate::IdEquals(id.to_string()))?
        .into_iter()
        .next())
}

fn load_customer(context: &PersistentContext, row: CustomerRow) -> crate::Result<Customer> {
    let licenses = context.fetch::<LicenseRow>(&Predicate::ParentIdEquals(row.id.clone()))?;
    Ok(row.into_customer(licenses))
}
