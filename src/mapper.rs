//! Translation between domain records and persisted rows

use rusqlite::types::Value;
use crate::customer::Customer;
use crate::license::License;
use crate::storage::schema;
use crate::storage::Record;

/// Persisted customer row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRow {
    pub id: String,
    pub name: String,
}

/// Persisted license row; `customer_id` is the parent-link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRow {
    pub id: String,
    pub serial: String,
    pub customer_id: String,
}

impl Record for CustomerRow {
    const ENTITY: &'static str = schema::CUSTOMER_ENTITY;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::Text(self.id.clone()), Value::Text(self.name.clone())]
    }
}

impl Record for LicenseRow {
    const ENTITY: &'static str = schema::LICENSE_ENTITY;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            serial: row.get(1)?,
            customer_id: row.get(2)?,
        })
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(self.serial.clone()),
            Value::Text(self.customer_id.clone()),
        ]
    }
}

impl CustomerRow {
    /// Build the domain customer together with its linked license rows
    pub fn into_customer(self, licenses: Vec<LicenseRow>) -> Customer {
        let mut customer = Customer::new(self.id, self.name);
        customer.licenses = licenses.iter().map(|row| row.to_license(&customer)).collect();
        customer
    }

    /// Overwrite the mutable fields from a domain customer
    pub fn assign(&mut self, customer: &Customer) {
        self.id = customer.id.clone();
        self.name = customer.name.clone();
    }
}

impl From<&Customer> for CustomerRow {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.clone(),
            name: customer.name.clone(),
        }
    }
}

impl LicenseRow {
    /// Row for `license` linked to `parent`, whatever customer the license named
    pub fn for_customer(license: &License, parent: &CustomerRow) -> Self {
        Self {
            id: license.id.clone(),
            serial: license.serial.clone(),
            customer_id: parent.id.clone(),
        }
    }

    /// Domain license owned by an already-built customer
    pub fn to_license(&self, customer: &Customer) -> License {
        License::new(self.id.clone(), self.serial.clone(), customer.id.clone())
    }

    /// Domain license using the stored parent-link
    pub fn into_license(self) -> License {
        License::new(self.id, self.serial, self.customer_id)
    }

    /// Overwrite the mutable fields from a domain license
    pub fn assign(&mut self, license: &License) {
        self.id = license.id.clone();
        self.serial = license.serial.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_customer_links_licenses() {
        let row = CustomerRow { id: "bob".into(), name: "Bob".into() };
        let licenses = vec![
            LicenseRow { id: "b1".into(), serial: "s1".into(), customer_id: "bob".into() },
            LicenseRow { id: "b2".into(), serial: "s2".into(), customer_id: "bob".into() },
        ];

        let bob = row.into_customer(licenses);
        assert_eq!(bob.name, "Bob");
        assert_eq!(bob.licenses.len(), 2);
        assert!(bob.licenses.iter().all(|l| l.customer_id == "bob"));
    }

    #[test]
    fn test_for_customer_relinks_to_parent() {
        let parent = CustomerRow { id: "cas".into(), name: "Cas".into() };
        let stray = License::new("c1", "s1", "someone-else");

        let row = LicenseRow::for_customer(&stray, &parent);
        assert_eq!(row.customer_id, "cas");
        assert_eq!(row.clone().into_license().customer_id, "cas");
    }

    #[test]
    fn test_assign_keeps_parent_link() {
        let mut row = LicenseRow { id: "a1".into(), serial: "old".into(), customer_id: "amy".into() };
        row.assign(&License::new("a1", "new", "bob"));
        assert_eq!(row.serial, "new");
        assert_eq!(row.customer_id, "amy");
    }
}
