//! License store

use std::sync::Arc;
use crate::customer::Customer;
use crate::dispatch::Dispatcher;
use crate::license::License;
use crate::mapper::{CustomerRow, LicenseRow};
use crate::storage::{ContextHandle, PersistentContext, Predicate};
use crate::StoreError;
use super::{fold, submit};

/// CRUD for licenses; creation requires an existing parent customer
#[derive(Clone)]
pub struct LicenseStore {
    context: ContextHandle,
    dispatcher: Arc<dyn Dispatcher>,
}

impl LicenseStore {
    pub fn new(context: ContextHandle, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { context, dispatcher }
    }

    /// Licenses whose parent-link is `customer.id`
    pub fn fetch_licenses<C>(&self, customer: &Customer, completion: C)
    where
        C: FnOnce(Result<Vec<License>, StoreError>) + Send + 'static,
    {
        let customer_id = customer.id.clone();
        let failure = {
            let message = format!("Cannot fetch licenses for customer with id {}", customer_id);
            move || StoreError::CannotFetch(message.clone())
        };
        submit(&self.context, &self.dispatcher, failure(), completion, move |context| {
            let rows = fold(
                context.fetch::<LicenseRow>(&Predicate::ParentIdEquals(customer_id)),
                failure,
            )?;
            Ok(rows.into_iter().map(LicenseRow::into_license).collect())
        });
    }

    /// The license with `id`
    pub fn fetch_license<C>(&self, id: &str, completion: C)
    where
        C: FnOnce(Result<License, StoreError>) + Send + 'static,
    {
        let id = id.to_string();
        let failure = {
            let message = format!("Cannot fetch license with id {}", id);
            move || StoreError::CannotFetch(message.clone())
        };
        submit(&self.context, &self.dispatcher, failure(), completion, move |context| {
            fold(find_license(context, &id), &failure)?
                .map(LicenseRow::into_license)
                .ok_or_else(&failure)
        });
    }

    /// Insert `license` under `customer`.
    ///
    /// The customer row is resolved first; if it is missing nothing is staged.
    pub fn create_license<C>(&self, license: License, customer: &Customer, completion: C)
    where
        C: FnOnce(Result<License, StoreError>) + Send + 'static,
    {
        let customer_id = customer.id.clone();
        let parent_failure = {
            let message = format!("Cannot find associated customer with id {}", customer_id);
            move || StoreError::CannotCreate(message.clone())
        };
        let save_failure = {
            let message = format!("Cannot create license with id {}", license.id);
            move || StoreError::CannotCreate(message.clone())
        };
        submit(&self.context, &self.dispatcher, parent_failure(), completion, move |context| {
            let parent = context
                .fetch::<CustomerRow>(&Predicate::IdEquals(customer_id))
                .map(|rows| rows.into_iter().next());
            let Some(parent) = fold(parent, &parent_failure)? else {
                return Err(parent_failure());
            };

            let row = LicenseRow::for_customer(&license, &parent);
            context.insert(&row);
            fold(context.save(), save_failure)?;
            Ok(row.into_license())
        });
    }

    /// Overwrite the stored serial (and id) of an existing license.
    ///
    /// A missing license is reported as `CannotUpdate`; nothing is created.
    pub fn update_license<C>(&self, license: License, completion: C)
    where
        C: FnOnce(Result<License, StoreError>) + Send + 'static,
    {
        let lookup_failure = {
            let message = format!("Cannot fetch license with id {} to update", license.id);
            move || StoreError::CannotUpdate(message.clone())
        };
        let save_failure = {
            let message = format!("Cannot update license with id {}", license.id);
            move || StoreError::CannotUpdate(message.clone())
        };
        submit(&self.context, &self.dispatcher, lookup_failure(), completion, move |context| {
            let Some(mut row) = fold(find_license(context, &license.id), &lookup_failure)? else {
                return Err(lookup_failure());
            };

            let key = row.id.clone();
            row.assign(&license);
            context.update(&key, &row);
            fold(context.save(), save_failure)?;
            Ok(row.into_license())
        });
    }

    pub fn delete_license<C>(&self, id: &str, completion: C)
    where
        C: FnOnce(Result<(), StoreError>) + Send + 'static,
    {
        let id = id.to_string();
        let failure = {
            let message = format!("Cannot fetch license with id {} to delete", id);
            move || StoreError::CannotDelete(message.clone())
        };
        submit(&self.context, &self.dispatcher, failure(), completion, move |context| {
            let Some(row) = fold(find_license(context, &id), &failure)? else {
                return Err(failure());
            };
            context.delete(&row);
            fold(context.save(), &failure)
        });
    }
}

fn find_license(context: &PersistentContext, id: &str) -> crate::Result<Option<LicenseRow>> {
    Ok(context
        .fetch::<LicenseRow>(&Predicate::IdEquals(id.to_string()))?
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::wait_for;
    use crate::store::testing::stores;
    use crate::store::Stores;

    fn with_amy() -> (Stores, Customer) {
        let stores = stores();
        let amy = Customer::new("amy", "Amy").with_license("a1", "a1");
        let amy = wait_for(|done| stores.customers.create_customer(amy, done)).unwrap().unwrap();
        (stores, amy)
    }

    fn fetch(store: &LicenseStore, id: &str) -> Result<License, StoreError> {
        wait_for(|done| store.fetch_license(id, done)).unwrap()
    }

    #[test]
    fn test_create_for_existing_customer() {
        let (stores, amy) = with_amy();

        let created = wait_for(|done| {
            stores.licenses.create_license(License::new("a2", "serial-a2", "ignored"), &amy, done)
        })
        .unwrap()
        .unwrap();
        assert_eq!(created.customer_id, "amy");

        let fetched = fetch(&stores.licenses, "a2").unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_create_for_missing_customer_leaves_store_unchanged() {
        let (stores, _) = with_amy();
        let ghost = Customer::new("ghost", "Ghost");

        let result = wait_for(|done| {
            stores.licenses.create_license(License::new("g1", "g1", "ghost"), &ghost, done)
        })
        .unwrap();
        assert_eq!(
            result,
            Err(StoreError::CannotCreate("Cannot find associated customer with id ghost".into()))
        );

        let stats = stores.context().call(|context| context.stats()).unwrap();
        assert_eq!(stats.licenses, 1);
        assert!(matches!(fetch(&stores.licenses, "g1"), Err(StoreError::CannotFetch(_))));
    }

    #[test]
    fn test_create_duplicate_license() {
        let (stores, amy) = with_amy();
        let result = wait_for(|done| {
            stores.licenses.create_license(License::new("a1", "again", "amy"), &amy, done)
        })
        .unwrap();
        assert_eq!(result, Err(StoreError::CannotCreate("Cannot create license with id a1".into())));
    }

    #[test]
    fn test_fetch_for_customer() {
        let (stores, amy) = with_amy();
        let bob = Customer::new("bob", "Bob").with_license("b1", "b1").with_license("b2", "b2");
        let bob = wait_for(|done| stores.customers.create_customer(bob, done)).unwrap().unwrap();

        let amys = wait_for(|done| stores.licenses.fetch_licenses(&amy, done)).unwrap().unwrap();
        assert_eq!(amys.len(), 1);

        let bobs = wait_for(|done| stores.licenses.fetch_licenses(&bob, done)).unwrap().unwrap();
        assert_eq!(bobs.len(), 2);
        assert!(bobs.iter().all(|l| l.belongs_to(&bob)));
    }

    #[test]
    fn test_update() {
        let (stores, _) = with_amy();
        let updated = wait_for(|done| {
            stores.licenses.update_license(License::new("a1", "renewed", "amy"), done)
        })
        .unwrap()
        .unwrap();
        assert_eq!(updated.serial, "renewed");
        assert_eq!(fetch(&stores.licenses, "a1").unwrap().serial, "renewed");
    }

    #[test]
    fn test_update_missing() {
        let (stores, _) = with_amy();
        let result = wait_for(|done| {
            stores.licenses.update_license(License::new("zz", "zz", "amy"), done)
        })
        .unwrap();
        assert_eq!(
            result,
            Err(StoreError::CannotUpdate("Cannot fetch license with id zz to update".into()))
        );
        assert!(fetch(&stores.licenses, "zz").is_err());
    }

    #[test]
    fn test_delete_then_fetch() {
        let (stores, amy) = with_amy();
        wait_for(|done| stores.licenses.delete_license("a1", done)).unwrap().unwrap();

        assert!(matches!(fetch(&stores.licenses, "a1"), Err(StoreError::CannotFetch(_))));
        let customer = wait_for(|done| stores.customers.fetch_customer(&amy.id, done))
            .unwrap()
            .unwrap();
        assert!(customer.licenses.is_empty());

        let again = wait_for(|done| stores.licenses.delete_license("a1", done)).unwrap();
        assert_eq!(
            again,
            Err(StoreError::CannotDelete("Cannot fetch license with id a1 to delete".into()))
        );
    }
}
