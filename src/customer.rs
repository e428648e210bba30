//! Customer domain record

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use crate::license::License;

/// A customer and the licenses it owns.
///
/// `licenses` is conceptually a set keyed by license id; the order of a
/// customer loaded from storage is unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub licenses: Vec<License>,
}

impl Customer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            licenses: Vec::new(),
        }
    }

    /// Add a license pointing back at this customer
    pub fn with_license(mut self, id: impl Into<String>, serial: impl Into<String>) -> Self {
        let license = License::new(id, serial, self.id.clone());
        self.licenses.push(license);
        self
    }

    /// `(id, serial)` pairs of the owned licenses, independent of order
    pub fn license_set(&self) -> BTreeSet<(&str, &str)> {
        self.licenses
            .iter()
            .map(|l| (l.id.as_str(), l.serial.as_str()))
            .collect()
    }
}

impl std::fmt::Display for Customer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Customer<id:{}, name:{}, licenses:[", self.id, self.name)?;
        for (i, license) in self.licenses.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", license)?;
        }
        write!(f, "]>")
    }
}
