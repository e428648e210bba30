//! Demo fixtures
//!
//! Clears the store and inserts three customers with one, two and three
//! licenses.

use tracing::info;
use crate::customer::Customer;
use crate::dispatch::wait_for;
use crate::mapper::{CustomerRow, LicenseRow};
use crate::storage::ContextHandle;
use crate::store::Stores;
use crate::StoreError;

/// The fixture customers: amy [a1], bob [b1, b2], cas [c1, c2, c3]
pub fn fixtures() -> Vec<Customer> {
    vec![
        Customer::new("amy", "Amy").with_license("a1", "a1"),
        Customer::new("bob", "Bob")
            .with_license("b1", "b1")
            .with_license("b2", "b2"),
        Customer::new("cas", "Cas")
            .with_license("c1", "c1")
            .with_license("c2", "c2")
            .with_license("c3", "c3"),
    ]
}

/// Bulk delete every license and customer row
pub fn clear(context: &ContextHandle) -> crate::Result<()> {
    context.call(|context| {
        context.delete_all::<LicenseRow>();
        context.delete_all::<CustomerRow>();
        context.save()
    })
}

/// Clear the store and insert the fixtures through the customer store.
///
/// Blocks until every insert has completed, so it must not run on the
/// dispatcher the stores deliver to.
pub fn populate(stores: &Stores) -> Result<Vec<Customer>, StoreError> {
    clear(&stores.context()).map_err(|e| {
        StoreError::CannotDelete(format!("Cannot clear store: {}", e))
    })?;

    let mut created = Vec::new();
    for customer in fixtures() {
        let failure = StoreError::CannotCreate(format!("Cannot create customer with id {}", customer.id));
        let customer = wait_for(|done| stores.customers.create_customer(customer, done))
            .map_err(|_| failure)??;
        created.push(customer);
    }

    info!(customers = created.len(), "Seeded store");
    Ok(created)
}
