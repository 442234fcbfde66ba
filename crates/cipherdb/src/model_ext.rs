//! Record-style calls on model values.

use cipherdb_core::{Model, Result, Value};
use cipherdb_query::{Criteria, Select};

use crate::database::{Database, Upsert};

/// Persistence methods on every [`Model`], forwarding to a [`Database`].
///
/// ```ignore
/// let mut hero = Hero { id: None, name: "Deadpond".into(), age: None };
/// hero.save(&db)?;
/// let found = Hero::find_by_pk(&db, hero.id)?;
/// ```
pub trait ModelExt: Model {
    fn save(&mut self, db: &Database) -> Result<i64> {
        db.save(self)
    }

    fn update(&self, db: &Database) -> Result<u64> {
        db.update(self)
    }

    fn save_or_update(&mut self, db: &Database) -> Result<Upsert> {
        db.save_or_update(self)
    }

    fn delete(&self, db: &Database) -> Result<u64> {
        db.delete(self)
    }

    fn find_all(db: &Database) -> Result<Vec<Self>> {
        db.find_all::<Self>()
    }

    fn find_by_pk(db: &Database, pk: impl Into<Value>) -> Result<Option<Self>> {
        db.find_by_pk::<Self>(pk)
    }

    fn find(db: &Database, criteria: Criteria) -> Result<Vec<Self>> {
        db.find::<Self>(criteria)
    }

    fn find_first(db: &Database, criteria: Criteria) -> Result<Option<Self>> {
        db.find_first::<Self>(criteria)
    }

    /// Start a typed query for this model.
    fn query() -> Select<Self> {
        Select::new()
    }
}

impl<M: Model> ModelExt for M {}
