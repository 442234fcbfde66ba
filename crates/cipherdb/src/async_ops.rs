//! `Cx`-aware wrappers around the blocking [`Database`] calls.
//!
//! The engine call itself is synchronous and runs inline; the wrappers only
//! observe cancellation before touching the connection, so a cancelled task
//! never starts a write.

use asupersync::{Cx, Outcome};
use cipherdb_core::{Error, Model, Result};
use cipherdb_query::Criteria;

use crate::database::Database;

fn into_outcome<T>(result: Result<T>) -> Outcome<T, Error> {
    match result {
        Ok(value) => Outcome::Ok(value),
        Err(e) => Outcome::Err(e),
    }
}

impl Database {
    /// Async [`Database::save`].
    pub async fn save_async<M: Model>(&self, cx: &Cx, model: &mut M) -> Outcome<i64, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        into_outcome(self.save(model))
    }

    /// Async [`Database::update`].
    pub async fn update_async<M: Model>(&self, cx: &Cx, model: &M) -> Outcome<u64, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        into_outcome(self.update(model))
    }

    /// Async [`Database::delete`].
    pub async fn delete_async<M: Model>(&self, cx: &Cx, model: &M) -> Outcome<u64, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        into_outcome(self.delete(model))
    }

    /// Async [`Database::find_all`].
    pub async fn find_all_async<M: Model>(&self, cx: &Cx) -> Outcome<Vec<M>, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        into_outcome(self.find_all::<M>())
    }

    /// Async [`Database::find`].
    pub async fn find_async<M: Model>(
        &self,
        cx: &Cx,
        criteria: Criteria,
    ) -> Outcome<Vec<M>, Error> {
        if let Some(reason) = cx.cancel_reason() {
            return Outcome::Cancelled(reason);
        }
        into_outcome(self.find::<M>(criteria))
    }
}
