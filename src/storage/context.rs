//! SQLite-backed persistent context

use std::path::Path;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::{debug, info};
use crate::{Error, FatalError, Result};
use super::schema::{self, EntityDescription};

/// A persisted row type the context can read and write
pub trait Record: Sized {
    /// Entity name as known to the schema
    const ENTITY: &'static str;

    /// Value of the `id` field
    fn id(&self) -> &str;

    /// Build a row from a result row whose columns follow the entity's field order
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self>;

    /// Field values in the entity's field order
    fn values(&self) -> Vec<Value>;
}

/// Row filter for `fetch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All,
    IdEquals(String),
    /// Rows whose parent-link equals the given parent id
    ParentIdEquals(String),
}

impl Predicate {
    fn where_clause(&self, entity: &EntityDescription) -> Result<(String, Vec<Value>)> {
        match self {
            Predicate::All => Ok((String::new(), Vec::new())),
            Predicate::IdEquals(id) => Ok((
                format!(" WHERE {} = ?1", schema::ID_FIELD),
                vec![Value::Text(id.clone())],
            )),
            Predicate::ParentIdEquals(parent_id) => {
                let link = entity
                    .parent_link
                    .ok_or_else(|| Error::NoParentLink(entity.name.to_string()))?;
                Ok((format!(" WHERE {} = ?1", link), vec![Value::Text(parent_id.clone())]))
            }
        }
    }
}

/// A staged change, applied on `save`
#[derive(Debug, Clone)]
enum Change {
    Insert { entity: &'static str, values: Vec<Value> },
    Update { entity: &'static str, key: String, values: Vec<Value> },
    Delete { entity: &'static str, key: String },
    DeleteAll { entity: &'static str },
}

impl Change {
    fn apply(&self, conn: &Connection) -> Result<usize> {
        match self {
            Change::Insert { entity, values } => {
                let description = schema::describe(entity)?;
                let placeholders = (1..=values.len())
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    description.name,
                    description.columns(),
                    placeholders
                );
                Ok(conn.execute(&sql, params_from_iter(values.iter()))?)
            }
            Change::Update { entity, key, values } => {
                let description = schema::describe(entity)?;
                let assignments = description
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, field)| format!("{} = ?{}", field, i + 1))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    description.name,
                    assignments,
                    schema::ID_FIELD,
                    description.fields.len() + 1
                );
                let mut args: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                args.push(key);
                Ok(conn.execute(&sql, args.as_slice())?)
            }
            Change::Delete { entity, key } => {
                let description = schema::describe(entity)?;
                let sql = format!("DELETE FROM {} WHERE {} = ?1", description.name, schema::ID_FIELD);
                Ok(conn.execute(&sql, [key])?)
            }
            Change::DeleteAll { entity } => {
                let description = schema::describe(entity)?;
                Ok(conn.execute(&format!("DELETE FROM {}", description.name), [])?)
            }
        }
    }
}

/// The single handle to the on-disk store.
///
/// Reads go straight to the database. Inserts, updates and deletes are
/// staged and only reach the file on `save`, which applies them in staging
/// order inside one transaction.
pub struct PersistentContext {
    conn: Connection,
    pending: Vec<Change>,
}

impl PersistentContext {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> std::result::Result<Self, FatalError> {
        let conn = Connection::open(path).map_err(|source| FatalError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let context = Self::with_connection(conn)?;
        info!("Opened persistent context at {}", path.display());
        Ok(context)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> std::result::Result<Self, FatalError> {
        let conn = Connection::open_in_memory().map_err(|source| FatalError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> std::result::Result<Self, FatalError> {
        let context = Self { conn, pending: Vec::new() };
        context.initialize_schema().map_err(FatalError::Schema)?;
        Ok(context)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> rusqlite::Result<()> {
        self.conn.pragma_update(None, "foreign_keys", true)?;
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    /// All committed rows of `R` matching the predicate
    pub fn fetch<R: Record>(&self, predicate: &Predicate) -> Result<Vec<R>> {
        let description = schema::describe(R::ENTITY)?;
        let (clause, args) = predicate.where_clause(description)?;
        let sql = format!("SELECT {} FROM {}{}", description.columns(), description.name, clause);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| R::from_row(row))?
            .collect::<rusqlite::Result<Vec<R>>>()?;

        Ok(rows)
    }

    /// Stage a new row
    pub fn insert<R: Record>(&mut self, row: &R) {
        debug!(entity = R::ENTITY, id = row.id(), "Staging insert");
        self.pending.push(Change::Insert { entity: R::ENTITY, values: row.values() });
    }

    /// Stage an overwrite of the row currently stored under `key`
    pub fn update<R: Record>(&mut self, key: &str, row: &R) {
        debug!(entity = R::ENTITY, key, "Staging update");
        self.pending.push(Change::Update {
            entity: R::ENTITY,
            key: key.to_string(),
            values: row.values(),
        });
    }

    /// Stage removal of a row
    pub fn delete<R: Record>(&mut self, row: &R) {
        debug!(entity = R::ENTITY, id = row.id(), "Staging delete");
        self.pending.push(Change::Delete { entity: R::ENTITY, key: row.id().to_string() });
    }

    /// Stage removal of every row of `R`
    pub fn delete_all<R: Record>(&mut self) {
        debug!(entity = R::ENTITY, "Staging bulk delete");
        self.pending.push(Change::DeleteAll { entity: R::ENTITY });
    }

    /// Whether any change is waiting for `save`
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop all staged changes
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    /// Commit all staged changes.
    ///
    /// On failure the transaction is rolled back and the staged changes are
    /// discarded.
    pub fn save(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let changes = std::mem::take(&mut self.pending);
        let tx = self.conn.transaction()?;
        for change in &changes {
            change.apply(&tx)?;
        }
        tx.commit()?;

        debug!(changes = changes.len(), "Committed pending changes");
        Ok(())
    }

    /// Final save before the context goes away
    pub fn close(mut self) -> std::result::Result<(), FatalError> {
        self.save().map_err(FatalError::Close)
    }

    /// Count all rows of one entity
    pub fn count(&self, entity: &str) -> Result<usize> {
        let description = schema::describe(entity)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", description.name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            customers: self.count(schema::CUSTOMER_ENTITY)?,
            licenses: self.count(schema::LICENSE_ENTITY)?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DbStats {
    pub customers: usize,
    pub licenses: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Customers: {}", self.customers)?;
        writeln!(f, "  Licenses: {}", self.licenses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{CustomerRow, LicenseRow};

    fn customer(id: &str, name: &str) -> CustomerRow {
        CustomerRow { id: id.to_string(), name: name.to_string() }
    }

    fn license(id: &str, customer_id: &str) -> LicenseRow {
        LicenseRow {
            id: id.to_string(),
            serial: format!("serial-{}", id),
            customer_id: customer_id.to_string(),
        }
    }

    #[test]
    fn test_staged_changes_need_save() {
        let mut context = PersistentContext::open_in_memory().unwrap();

        context.insert(&customer("amy", "Amy"));
        assert!(context.has_changes());
        assert!(context.fetch::<CustomerRow>(&Predicate::All).unwrap().is_empty());

        context.save().unwrap();
        assert!(!context.has_changes());
        let rows = context.fetch::<CustomerRow>(&Predicate::All).unwrap();
        assert_eq!(rows, vec![customer("amy", "Amy")]);
    }

    #[test]
    fn test_discard_drops_pending() {
        let mut context = PersistentContext::open_in_memory().unwrap();
        context.insert(&customer("amy", "Amy"));
        context.discard();
        context.save().unwrap();
        assert_eq!(context.count("customers").unwrap(), 0);
    }

    #[test]
    fn test_fetch_by_id_and_parent() {
        let mut context = PersistentContext::open_in_memory().unwrap();
        context.insert(&customer("bob", "Bob"));
        context.insert(&customer("cas", "Cas"));
        context.insert(&license("b1", "bob"));
        context.insert(&license("b2", "bob"));
        context.insert(&license("c1", "cas"));
        context.save().unwrap();

        let bob = context.fetch::<CustomerRow>(&Predicate::IdEquals("bob".into())).unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].name, "Bob");

        let licenses = context
            .fetch::<LicenseRow>(&Predicate::ParentIdEquals("bob".into()))
            .unwrap();
        assert_eq!(licenses.len(), 2);
        assert!(licenses.iter().all(|l| l.customer_id == "bob"));
    }

    #[test]
    fn test_parent_predicate_on_root_entity() {
        let context = PersistentContext::open_in_memory().unwrap();
        let err = context
            .fetch::<CustomerRow>(&Predicate::ParentIdEquals("x".into()))
            .unwrap_err();
        assert!(matches!(err, Error::NoParentLink(_)));
    }

    #[test]
    fn test_update_and_delete() {
        let mut context = PersistentContext::open_in_memory().unwrap();
        context.insert(&customer("amy", "Amy"));
        context.save().unwrap();

        context.update("amy", &customer("amy", "Amelia"));
        context.save().unwrap();
        let rows = context.fetch::<CustomerRow>(&Predicate::All).unwrap();
        assert_eq!(rows[0].name, "Amelia");

        context.delete(&rows[0]);
        context.save().unwrap();
        assert_eq!(context.count("customers").unwrap(), 0);
    }

    #[test]
    fn test_failed_save_rolls_back_everything() {
        let mut context = PersistentContext::open_in_memory().unwrap();
        context.insert(&customer("amy", "Amy"));
        context.save().unwrap();

        context.insert(&customer("bob", "Bob"));
        context.insert(&customer("amy", "Duplicate"));
        assert!(context.save().is_err());
        assert!(!context.has_changes());

        let rows = context.fetch::<CustomerRow>(&Predicate::All).unwrap();
        assert_eq!(rows, vec![customer("amy", "Amy")]);
    }

    #[test]
    fn test_license_requires_existing_customer() {
        let mut context = PersistentContext::open_in_memory().unwrap();
        context.insert(&license("x1", "nobody"));
        assert!(context.save().is_err());
        assert_eq!(context.count("licenses").unwrap(), 0);
    }

    #[test]
    fn test_delete_all_and_stats() {
        let mut context = PersistentContext::open_in_memory().unwrap();
        context.insert(&customer("amy", "Amy"));
        context.insert(&license("a1", "amy"));
        context.save().unwrap();
        assert_eq!(context.stats().unwrap(), DbStats { customers: 1, licenses: 1 });

        context.delete_all::<LicenseRow>();
        context.delete_all::<CustomerRow>();
        context.save().unwrap();
        assert_eq!(context.stats().unwrap(), DbStats { customers: 0, licenses: 0 });
    }

    #[test]
    fn test_close_with_failing_save_is_fatal() {
        let mut context = PersistentContext::open_in_memory().unwrap();
        context.insert(&license("x1", "nobody"));
        assert!(matches!(context.close(), Err(FatalError::Close(_))));
    }

    #[test]
    fn test_open_non_database_fails_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Relationship.sqlite");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();
        assert!(matches!(PersistentContext::open(&path), Err(FatalError::Schema(_))));
    }

    #[test]
    fn test_reopen_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Relationship.sqlite");

        let mut context = PersistentContext::open(&path).unwrap();
        context.insert(&customer("amy", "Amy"));
        context.close().unwrap();

        let context = PersistentContext::open(&path).unwrap();
        assert_eq!(context.count("customers").unwrap(), 1);
    }
}
