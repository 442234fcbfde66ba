//! The `Database` façade: one queued connection, a model registry and
//! change observers.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use cipherdb_core::{Connection, Error, Model, Result, Row, Value, quote_ident};
use cipherdb_query::{Criteria, DeleteBuilder, InsertBuilder, Select, UpdateBuilder};
use cipherdb_schema::{ColumnInfo, SyncReport, TableDef, sync_table, table_columns};
use cipherdb_sqlite::{DatabaseQueue, SqliteConnection};

use crate::config::DatabaseConfig;
use crate::observer::{ChangeEvent, ChangeKind, Observers, Subscription};

/// Result of [`Database::save_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new row was inserted with this rowid.
    Inserted(i64),
    /// An existing row was updated; carries the number of rows changed.
    Updated(u64),
}

/// Handle to one encrypted SQLite database.
///
/// All access goes through a single mutex-guarded connection. Batch
/// operations run in one transaction and roll back entirely on the first
/// error.
#[derive(Debug)]
pub struct Database {
    queue: DatabaseQueue,
    config: RwLock<DatabaseConfig>,
    registry: Mutex<Vec<TableDef>>,
    observers: Observers,
}

// ============================================================================
// Logging helpers
// ============================================================================

impl Database {
    fn logging(&self) -> bool {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enable_logging
    }

    /// Log an operation's outcome: `info`/`warn` with logging enabled,
    /// `debug` otherwise.
    fn finish<T>(&self, op: &'static str, table: &str, result: Result<T>) -> Result<T> {
        match (&result, self.logging()) {
            (Ok(_), true) => tracing::info!(op, table, "succeeded"),
            (Ok(_), false) => tracing::debug!(op, table, "succeeded"),
            (Err(e), true) => tracing::warn!(op, table, error = %e, "failed"),
            (Err(e), false) => tracing::debug!(op, table, error = %e, "failed"),
        }
        result
    }

    /// Log, then notify observers if the write succeeded.
    fn finish_write<T>(
        &self,
        op: &'static str,
        table: &'static str,
        result: Result<(T, Vec<ChangeEvent>)>,
    ) -> Result<T> {
        let (value, events) = self.finish(op, table, result)?;
        self.observers.notify(&events);
        Ok(value)
    }
}

// ============================================================================
// Opening and configuration
// ============================================================================

impl Database {
    /// Open the database described by `config`.
    ///
    /// Without a key the database is opened unencrypted and a warning is
    /// logged. A key on a build without SQLCipher is an `Error::Encryption`.
    #[tracing::instrument(level = "debug", skip(config))]
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let key = config.key_str();
        let queue = if config.in_memory {
            DatabaseQueue::open_in_memory(key)?
        } else {
            let path = config.database_path()?;
            if key.is_none() {
                tracing::warn!(path = %path.display(), "No encryption key configured; database is not encrypted");
            }
            DatabaseQueue::open(&path, key)?
        };

        let path = queue.path()?;
        if config.enable_logging {
            tracing::info!(path = ?path, encrypted = key.is_some(), "Database opened");
        } else {
            tracing::debug!(path = ?path, encrypted = key.is_some(), "Database opened");
        }

        Ok(Self {
            queue,
            config: RwLock::new(config),
            registry: Mutex::new(Vec::new()),
            observers: Observers::default(),
        })
    }

    /// Open a private, unencrypted in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(DatabaseConfig::new().in_memory(true))
    }

    /// File path of the open database (`None` for in-memory).
    pub fn path(&self) -> Result<Option<PathBuf>> {
        self.queue.path()
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> DatabaseConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the connection. Later calls fail with a connection error.
    pub fn close(&self) -> Result<()> {
        self.queue.close()
    }

    /// Close the current database and open `<base_dir>/<name>/<file_name>`
    /// with the configured key, then create or sync every registered table.
    ///
    /// Returns the new database path.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn change_directory(&self, name: &str) -> Result<PathBuf> {
        let next = self.config().with_directory(name);
        if next.in_memory {
            return Err(Error::Config(
                "an in-memory database has no directory to change".to_string(),
            ));
        }
        let path = next.database_path()?;
        self.queue.reopen(&path, next.key_str())?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = next;

        let tables = self.registered_tables();
        let result = self.queue.in_transaction(|conn| {
            tables
                .iter()
                .map(|table| sync_table(conn, table))
                .collect::<Result<Vec<_>>>()
        });
        self.finish("change_directory", name, result)?;

        tracing::info!(path = %path.display(), tables = tables.len(), "Switched database directory");
        Ok(path)
    }
}

// ============================================================================
// Schema
// ============================================================================

impl Database {
    /// Create or sync `M`'s table and remember it for `change_directory`.
    pub fn register<M: Model>(&self) -> Result<SyncReport> {
        let table = TableDef::of::<M>();
        {
            let mut registry = self
                .registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !registry.iter().any(|t| t.name == table.name) {
                registry.push(table);
            }
        }
        self.create_table::<M>()
    }

    /// Tables registered so far.
    pub fn registered_tables(&self) -> Vec<TableDef> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create `M`'s table if missing and add any columns it lacks, in one
    /// transaction.
    pub fn create_table<M: Model>(&self) -> Result<SyncReport> {
        let table = TableDef::of::<M>();
        let result = self.queue.in_transaction(|conn| sync_table(conn, &table));
        if let Ok(report) = &result {
            if !report.is_noop() {
                tracing::info!(
                    table = M::TABLE_NAME,
                    created = report.created,
                    added = ?report.added_columns,
                    "Synced table"
                );
            }
        }
        self.finish("create_table", M::TABLE_NAME, result)
    }

    /// Whether `M`'s table exists.
    pub fn table_exists<M: Model>(&self) -> Result<bool> {
        self.queue
            .in_database(|conn| conn.table_exists(M::TABLE_NAME))
    }

    /// Live columns of `M`'s table.
    pub fn columns<M: Model>(&self) -> Result<Vec<ColumnInfo>> {
        self.queue
            .in_database(|conn| table_columns(&*conn, M::TABLE_NAME))
    }
}

// ============================================================================
// Write helpers (run on an already-locked connection)
// ============================================================================

fn insert_model<M: Model, C: Connection + ?Sized>(conn: &C, model: &mut M) -> Result<i64> {
    let was_new = model.is_new();
    let rowid = InsertBuilder::new(&*model).execute(conn)?;
    if let Some(pk) = M::primary_key_field() {
        if pk.auto_increment && was_new {
            model.set_primary_key_value(&Value::Integer(rowid))?;
        }
    }
    Ok(rowid)
}

fn row_exists<C: Connection + ?Sized>(
    conn: &C,
    table: &str,
    column: &str,
    value: &Value,
) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
        quote_ident(table),
        quote_ident(column)
    );
    Ok(conn.query_one(&sql, std::slice::from_ref(value))?.is_some())
}

fn upsert_model<M: Model, C: Connection + ?Sized>(
    conn: &C,
    model: &mut M,
) -> Result<(Upsert, ChangeEvent)> {
    if let (Some(pk), Some(value)) = (M::primary_key_field(), key_of(model)) {
        if !model.is_new() && row_exists(conn, M::TABLE_NAME, pk.column_name, &value)? {
            let changed = UpdateBuilder::new(&*model).execute(conn)?;
            let event = ChangeEvent::new(M::TABLE_NAME, ChangeKind::Update, Some(value));
            return Ok((Upsert::Updated(changed), event));
        }
    }

    let rowid = insert_model(conn, model)?;
    let event = ChangeEvent::new(M::TABLE_NAME, ChangeKind::Insert, model.primary_key_value());
    Ok((Upsert::Inserted(rowid), event))
}

/// Update the row whose `column` equals `value`, adopting its primary key,
/// or insert `model` when there is none.
fn upsert_by_column<M: Model, C: Connection + ?Sized>(
    conn: &C,
    model: &mut M,
    column: &str,
    value: &Value,
) -> Result<(Upsert, ChangeEvent)> {
    let pk = M::primary_key_field()
        .ok_or_else(|| Error::model(format!("{} has no primary key", M::TABLE_NAME)))?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1 LIMIT 1",
        quote_ident(pk.column_name),
        quote_ident(M::TABLE_NAME),
        quote_ident(column)
    );
    let existing = conn
        .query_one(&sql, std::slice::from_ref(value))?
        .and_then(|row| row.get(0).cloned())
        .filter(|key| !key.is_null());

    if let Some(key) = existing {
        model.set_primary_key_value(&key)?;
        let changed = UpdateBuilder::new(&*model).execute(conn)?;
        let event = ChangeEvent::new(M::TABLE_NAME, ChangeKind::Update, Some(key));
        return Ok((Upsert::Updated(changed), event));
    }

    let rowid = insert_model(conn, model)?;
    let event = ChangeEvent::new(M::TABLE_NAME, ChangeKind::Insert, model.primary_key_value());
    Ok((Upsert::Inserted(rowid), event))
}

fn key_of<M: Model>(model: &M) -> Option<Value> {
    model.primary_key_value().filter(|v| !v.is_null())
}

/// Run `write` and, if it fails, put back the primary keys `models` had
/// before. Keys assigned by inserts inside a rolled-back transaction name
/// rows that no longer exist.
fn restoring_keys<M: Model, T>(
    models: &mut [M],
    write: impl FnOnce(&mut [M]) -> Result<T>,
) -> Result<T> {
    let before: Vec<Option<Value>> = models.iter().map(Model::primary_key_value).collect();
    let result = write(models);
    if result.is_err() {
        for (model, key) in models.iter_mut().zip(before) {
            let Some(key) = key else { continue };
            if let Err(e) = model.set_primary_key_value(&key) {
                tracing::warn!(table = M::TABLE_NAME, error = %e, "Could not restore primary key after rollback");
            }
        }
    }
    result
}

/// An unset auto-increment key (NULL or 0) cannot address a row.
fn ensure_saved<M: Model>(model: &M) -> Result<()> {
    if M::primary_key_field().is_some() && model.is_new() {
        return Err(Error::model(format!(
            "cannot update an unsaved {} row",
            M::TABLE_NAME
        )));
    }
    Ok(())
}

// ============================================================================
// Single-row writes
// ============================================================================

impl Database {
    /// Insert `model`. An unset auto-increment key is filled in with the new
    /// rowid, which is also returned.
    pub fn save<M: Model>(&self, model: &mut M) -> Result<i64> {
        let result = self.queue.in_database(|conn| {
            let rowid = insert_model(&*conn, model)?;
            let event = ChangeEvent::new(M::TABLE_NAME, ChangeKind::Insert, model.primary_key_value());
            Ok((rowid, vec![event]))
        });
        self.finish_write("save", M::TABLE_NAME, result)
    }

    /// Update `model`'s row by primary key. Returns the rows changed.
    pub fn update<M: Model>(&self, model: &M) -> Result<u64> {
        let result = self.queue.in_database(|conn| {
            ensure_saved(model)?;
            let changed = UpdateBuilder::new(model).execute(&*conn)?;
            let events = if changed > 0 {
                vec![ChangeEvent::new(M::TABLE_NAME, ChangeKind::Update, key_of(model))]
            } else {
                Vec::new()
            };
            Ok((changed, events))
        });
        self.finish_write("update", M::TABLE_NAME, result)
    }

    /// Update `model` if a row with its primary key exists, insert it
    /// otherwise.
    pub fn save_or_update<M: Model>(&self, model: &mut M) -> Result<Upsert> {
        let result = restoring_keys(std::slice::from_mut(model), |models| {
            self.queue.in_transaction(|conn| {
                let (outcome, event) = upsert_model(conn, &mut models[0])?;
                Ok((outcome, vec![event]))
            })
        });
        self.finish_write("save_or_update", M::TABLE_NAME, result)
    }

    /// Update the first row whose `column` (field or column name) equals
    /// `value`, giving `model` that row's primary key; insert `model` when no
    /// row matches.
    pub fn save_or_update_by_column<M: Model>(
        &self,
        model: &mut M,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Upsert> {
        let column = M::column_for(column)?;
        let value = value.into();
        let result = restoring_keys(std::slice::from_mut(model), |models| {
            self.queue.in_transaction(|conn| {
                let (outcome, event) = upsert_by_column(conn, &mut models[0], column, &value)?;
                Ok((outcome, vec![event]))
            })
        });
        self.finish_write("save_or_update_by_column", M::TABLE_NAME, result)
    }

    /// Delete `model`'s row by primary key. Fails if the key is missing.
    pub fn delete<M: Model>(&self, model: &M) -> Result<u64> {
        let result = self.queue.in_database(|conn| {
            let deleted = DeleteBuilder::from_model(model)?.execute(&*conn)?;
            let events = if deleted > 0 {
                vec![ChangeEvent::new(M::TABLE_NAME, ChangeKind::Delete, key_of(model))]
            } else {
                Vec::new()
            };
            Ok((deleted, events))
        });
        self.finish_write("delete", M::TABLE_NAME, result)
    }
}

// ============================================================================
// Batch writes (one transaction each)
// ============================================================================

impl Database {
    /// Insert every model; all or nothing. Returns the rowids in order.
    ///
    /// On failure no model keeps a key assigned during the batch.
    pub fn save_all<M: Model>(&self, models: &mut [M]) -> Result<Vec<i64>> {
        let result = restoring_keys(models, |models| {
            self.queue.in_transaction(|conn| {
                let mut rowids = Vec::with_capacity(models.len());
                let mut events = Vec::with_capacity(models.len());
                for model in models.iter_mut() {
                    rowids.push(insert_model(conn, model)?);
                    events.push(ChangeEvent::new(M::TABLE_NAME, ChangeKind::Insert, model.primary_key_value()));
                }
                Ok((rowids, events))
            })
        });
        self.finish_write("save_all", M::TABLE_NAME, result)
    }

    /// Update every model by primary key; all or nothing. A model without a
    /// key aborts the whole batch.
    pub fn update_all<M: Model>(&self, models: &[M]) -> Result<u64> {
        let result = self.queue.in_transaction(|conn| {
            let mut total = 0;
            let mut events = Vec::new();
            for model in models {
                ensure_saved(model)?;
                let changed = UpdateBuilder::new(model).execute(conn)?;
                if changed > 0 {
                    events.push(ChangeEvent::new(M::TABLE_NAME, ChangeKind::Update, key_of(model)));
                }
                total += changed;
            }
            Ok((total, events))
        });
        self.finish_write("update_all", M::TABLE_NAME, result)
    }

    /// Delete every model that has a key; models without one are skipped.
    pub fn delete_all<M: Model>(&self, models: &[M]) -> Result<u64> {
        let result = self.queue.in_transaction(|conn| {
            let mut total = 0;
            let mut events = Vec::new();
            for model in models {
                if M::primary_key_field().is_none() || key_of(model).is_none() {
                    tracing::debug!(table = M::TABLE_NAME, "Skipping delete of model without a key");
                    continue;
                }
                let deleted = DeleteBuilder::from_model(model)?.execute(conn)?;
                if deleted > 0 {
                    events.push(ChangeEvent::new(M::TABLE_NAME, ChangeKind::Delete, key_of(model)));
                }
                total += deleted;
            }
            Ok((total, events))
        });
        self.finish_write("delete_all", M::TABLE_NAME, result)
    }

    /// [`Database::save_or_update`] for every model, in one transaction.
    pub fn save_or_update_all<M: Model>(&self, models: &mut [M]) -> Result<Vec<Upsert>> {
        let result = restoring_keys(models, |models| {
            self.queue.in_transaction(|conn| {
                let mut outcomes = Vec::with_capacity(models.len());
                let mut events = Vec::with_capacity(models.len());
                for model in models.iter_mut() {
                    let (outcome, event) = upsert_model(conn, model)?;
                    outcomes.push(outcome);
                    events.push(event);
                }
                Ok((outcomes, events))
            })
        });
        self.finish_write("save_or_update_all", M::TABLE_NAME, result)
    }

    /// Delete the rows matching `criteria`.
    pub fn delete_where<M: Model>(&self, criteria: Criteria) -> Result<u64> {
        let result = self.queue.in_database(|conn| {
            let deleted = DeleteBuilder::<M>::filtered(criteria).execute(&*conn)?;
            let events = if deleted > 0 {
                vec![ChangeEvent::new(M::TABLE_NAME, ChangeKind::Delete, None)]
            } else {
                Vec::new()
            };
            Ok((deleted, events))
        });
        self.finish_write("delete_where", M::TABLE_NAME, result)
    }

    /// Delete every row of `M`'s table.
    pub fn clear_table<M: Model>(&self) -> Result<u64> {
        let result = self.queue.in_database(|conn| {
            let deleted = DeleteBuilder::<M>::all().execute(&*conn)?;
            Ok((deleted, vec![ChangeEvent::new(M::TABLE_NAME, ChangeKind::Clear, None)]))
        });
        self.finish_write("clear_table", M::TABLE_NAME, result)
    }
}

// ============================================================================
// Reads
// ============================================================================

impl Database {
    /// Every row of `M`'s table.
    pub fn find_all<M: Model>(&self) -> Result<Vec<M>> {
        let result = Select::<M>::new().fetch(self);
        self.finish("find_all", M::TABLE_NAME, result)
    }

    /// The row whose primary key equals `pk`.
    pub fn find_by_pk<M: Model>(&self, pk: impl Into<Value>) -> Result<Option<M>> {
        let field = M::primary_key_field()
            .ok_or_else(|| Error::model(format!("{} has no primary key", M::TABLE_NAME)))?;
        let result = Select::<M>::new()
            .filter(field.column_name, "=", pk)
            .first(self);
        self.finish("find_by_pk", M::TABLE_NAME, result)
    }

    /// Rows matching `criteria`.
    pub fn find<M: Model>(&self, criteria: Criteria) -> Result<Vec<M>> {
        let result = Select::<M>::with_criteria(criteria).fetch(self);
        self.finish("find", M::TABLE_NAME, result)
    }

    /// The first row matching `criteria`.
    pub fn find_first<M: Model>(&self, criteria: Criteria) -> Result<Option<M>> {
        let result = Select::<M>::with_criteria(criteria).first(self);
        self.finish("find_first", M::TABLE_NAME, result)
    }

    /// Number of rows matching `criteria`.
    pub fn count<M: Model>(&self, criteria: Criteria) -> Result<u64> {
        let result = Select::<M>::with_criteria(criteria).count(self);
        self.finish("count", M::TABLE_NAME, result)
    }

    /// Whether a row with `model`'s primary key is stored.
    pub fn exists<M: Model>(&self, model: &M) -> Result<bool> {
        let (Some(field), Some(value)) = (M::primary_key_field(), key_of(model)) else {
            return Ok(false);
        };
        self.queue
            .in_database(|conn| row_exists(&*conn, M::TABLE_NAME, field.column_name, &value))
    }

    /// Start a typed query; run it with `.fetch(&db)`.
    pub fn query<M: Model>(&self) -> Select<M> {
        Select::new()
    }
}

// ============================================================================
// Driver pass-through
// ============================================================================

impl Database {
    /// Run `f` with exclusive access to the connection.
    pub fn in_database<T>(&self, f: impl FnOnce(&mut SqliteConnection) -> Result<T>) -> Result<T> {
        self.queue.in_database(f)
    }

    /// Run `f` in a transaction; any `Err` rolls back.
    ///
    /// `f` must use the connection it is given, not this `Database`.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&SqliteConnection) -> Result<T>) -> Result<T> {
        self.queue.in_transaction(f)
    }

    /// Re-encrypt the database with `new_key`.
    pub fn rekey(&self, new_key: &str) -> Result<()> {
        self.queue.in_database(|conn| conn.rekey(new_key))?;
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .encryption_key = Some(new_key.into());
        Ok(())
    }

    /// SQLCipher version, or `None` when SQLite was built without it.
    pub fn cipher_version(&self) -> Result<Option<String>> {
        self.queue.in_database(|conn| conn.cipher_version())
    }
}

// ============================================================================
// Observers
// ============================================================================

impl Database {
    /// Call `callback` after every successful write.
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        self.observers.subscribe(Arc::new(callback))
    }

    /// Stop a subscription. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.observers.unsubscribe(subscription)
    }
}

impl Connection for Database {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.queue.in_database(|conn| conn.execute(sql, params))
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.queue.in_database(|conn| conn.insert(sql, params))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.queue.in_database(|conn| conn.query(sql, params))
    }
}

// ============================================================================
// Process-wide instance
// ============================================================================

fn shared_slot() -> &'static RwLock<Option<Arc<Database>>> {
    static SHARED: OnceLock<RwLock<Option<Arc<Database>>>> = OnceLock::new();
    SHARED.get_or_init(|| RwLock::new(None))
}

impl Database {
    /// The process-wide database, opened on first use from
    /// [`DatabaseConfig::from_env`].
    pub fn shared() -> Result<Arc<Database>> {
        if let Some(db) = shared_slot()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(db));
        }

        let mut slot = shared_slot()
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = slot.as_ref() {
            return Ok(Arc::clone(db));
        }
        let db = Arc::new(Database::open(DatabaseConfig::from_env()?)?);
        *slot = Some(Arc::clone(&db));
        Ok(db)
    }

    /// Replace the process-wide database. Returns the previous one, if any.
    pub fn install_shared(db: Database) -> Option<Arc<Database>> {
        shared_slot()
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(db))
    }
}
