//! Database schema definitions
//!
//! The store only needs entity names, field names and the parent-link field
//! from the schema; `describe` answers those by entity name.

use crate::{Error, Result};

/// Entity name of customer rows
pub const CUSTOMER_ENTITY: &str = "customers";

/// Entity name of license rows
pub const LICENSE_ENTITY: &str = "licenses";

/// Lookup key shared by every entity
pub const ID_FIELD: &str = "id";

/// SQL to create the customers table
pub const CREATE_CUSTOMERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
)
"#;

/// SQL to create the licenses table
/// `customer_id` is the parent-link back to the owning customer
pub const CREATE_LICENSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS licenses (
    id TEXT PRIMARY KEY,
    serial TEXT NOT NULL,
    customer_id TEXT NOT NULL REFERENCES customers(id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_licenses_customer ON licenses(customer_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_CUSTOMERS_TABLE, CREATE_LICENSES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// Shape of one persisted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescription {
    pub name: &'static str,
    /// Column order used for both reads and writes
    pub fields: &'static [&'static str],
    pub parent_link: Option<&'static str>,
}

pub const CUSTOMER: EntityDescription = EntityDescription {
    name: CUSTOMER_ENTITY,
    fields: &["id", "name"],
    parent_link: None,
};

pub const LICENSE: EntityDescription = EntityDescription {
    name: LICENSE_ENTITY,
    fields: &["id", "serial", "customer_id"],
    parent_link: Some("customer_id"),
};

pub const ENTITIES: &[EntityDescription] = &[CUSTOMER, LICENSE];

/// Look up an entity description by name
pub fn describe(entity: &str) -> Result<&'static EntityDescription> {
    ENTITIES
        .iter()
        .find(|description| description.name == entity)
        .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
}

impl EntityDescription {
    /// Comma separated column list in field order
    pub fn columns(&self) -> String {
        self.fields.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_entities() {
        let license = describe("licenses").unwrap();
        assert_eq!(license.parent_link, Some("customer_id"));
        assert_eq!(license.columns(), "id, serial, customer_id");

        let customer = describe("customers").unwrap();
        assert!(customer.parent_link.is_none());
    }

    #[test]
    fn test_describe_unknown_entity() {
        let err = describe("orders").unwrap_err();
        assert!(matches!(err, Error::UnknownEntity(name) if name == "orders"));
    }
}
