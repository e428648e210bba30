//! License domain record

use serde::{Deserialize, Serialize};
use crate::customer::Customer;

/// A license owned by exactly one customer.
///
/// The owner is referenced by id only; a license never keeps its customer alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub serial: String,
    pub customer_id: String,
}

impl License {
    pub fn new(id: impl Into<String>, serial: impl Into<String>, customer_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            serial: serial.into(),
            customer_id: customer_id.into(),
        }
    }

    /// Whether this license points at the given customer
    pub fn belongs_to(&self, customer: &Customer) -> bool {
        self.customer_id == customer.id
    }
}

impl std::fmt::Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "License<id:{} serial:{} customer:{}>", self.id, self.serial, self.customer_id)
    }
}
