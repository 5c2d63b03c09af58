use std::sync::Arc;

use parking_lot::Mutex;

use tessera_api::{Cell, Error, Item, Result, Row, RowFactory, Sink, Stage};

use crate::dialect::Dialect;
use crate::driver::{self, Database, Handle, Statement};
use crate::options::{IfExists, RdbOptions};
use crate::sql::{self, ColumnDef};

/// Writes rows into one table inside a single transaction.
///
/// The table is created from the first row. Rows are inserted in
/// batches of `batch` rows; the transaction commits on a clean finish
/// and rolls back otherwise.
pub struct RdbSink {
    table: String,
    dialect: Dialect,
    options: RdbOptions,
    state: Mutex<State>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Failed,
    Closed,
}

struct State {
    handle: Handle,
    /// Schema of the first row; later rows must match it.
    factory: Option<Arc<RowFactory>>,
    columns: Option<Vec<ColumnDef>>,
    /// Cached full-batch insert.
    stmt: Option<Box<dyn Statement>>,
    pending: Vec<Cell>,
    pending_rows: usize,
    written: usize,
    batches: usize,
    phase: Phase,
}

impl RdbSink {
    pub fn open(db: Database, options: RdbOptions) -> Result<Self> {
        let table = options.validate_sink()?;
        let (mut handle, dialect) = driver::connect(&db, &options)?;

        if let Err(e) = begin(&handle, dialect, &table, &options) {
            if let Err(close) = handle.close() {
                tracing::warn!(error = %close, "failed to close connection");
            }
            return Err(e);
        }

        let state = State {
            handle,
            factory: None,
            columns: None,
            stmt: None,
            pending: Vec::new(),
            pending_rows: 0,
            written: 0,
            batches: 0,
            phase: Phase::Open,
        };
        Ok(Self { table, dialect, options, state: Mutex::new(state) })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Rows executed so far, committed or not.
    pub fn written(&self) -> usize {
        self.state.lock().written
    }

    fn columns_for(&self, row: &Row) -> Result<Vec<ColumnDef>> {
        let names = row.factory().names();
        names
            .iter()
            .zip(row.cells())
            .map(|(name, cell)| {
                let described = self.options.describe(name);
                let sql_type = match (described.sql_type, cell) {
                    (Some(ty), _) => ty,
                    (None, Some(value)) => self.dialect.sql_type(value.kind())?.to_string(),
                    (None, None) => {
                        return Err(Error::type_err(format!(
                            "column {name}: first row has no value to infer a type from"
                        )));
                    }
                };
                Ok(ColumnDef::new(described.name, sql_type, described.primary_key))
            })
            .collect()
    }

    fn push(&self, state: &mut State, row: Row) -> Result<()> {
        match &state.factory {
            Some(factory) if !factory.same_schema(row.factory()) => {
                return Err(Error::SchemaMismatch {
                    expected: factory.names().join(", "),
                    got: row.factory().names().join(", "),
                });
            }
            Some(_) => {}
            None => {
                let columns = self.columns_for(&row)?;
                let ddl = sql::create_table(&self.table, &columns, self.options.if_exists);
                tracing::debug!(sql = %ddl, "create table");
                state.handle.with(|c| c.execute(&ddl)).map_err(|e| Error::stage(Stage::Create, e))?;
                state.columns = Some(columns);
                state.factory = Some(Arc::clone(row.factory()));
            }
        }

        state.pending.extend(row.into_cells());
        state.pending_rows += 1;
        if state.pending_rows >= self.options.batch {
            self.flush(state)?;
        }
        Ok(())
    }

    fn flush(&self, state: &mut State) -> Result<()> {
        let rows = state.pending_rows;
        let Some(columns) = state.columns.as_deref() else {
            return Ok(());
        };
        if rows == 0 {
            return Ok(());
        }

        let insert = |rows: usize| sql::batch_insert(&self.table, columns, rows, self.dialect, self.options.if_exists);
        let failed = |e| Error::stage(Stage::Insert, e);

        if rows == self.options.batch {
            if state.stmt.is_none() {
                let sql = insert(rows);
                tracing::debug!(%sql, "prepare batch insert");
                state.stmt = Some(state.handle.with(|c| c.prepare(&sql)).map_err(failed)?);
            }
            if let Some(stmt) = state.stmt.as_mut() {
                stmt.execute(&state.pending).map_err(failed)?;
            }
        } else {
            let sql = insert(rows);
            tracing::debug!(%sql, "prepare final insert");
            let mut stmt = state.handle.with(|c| c.prepare(&sql)).map_err(failed)?;
            let executed = stmt.execute(&state.pending);
            let closed = stmt.close();
            executed.map_err(failed)?;
            closed.map_err(failed)?;
        }

        state.written += rows;
        state.batches += 1;
        state.pending.clear();
        state.pending_rows = 0;
        Ok(())
    }

    fn complete(&self, state: &mut State) -> Result<()> {
        self.flush(state)?;
        if let Some(mut stmt) = state.stmt.take() {
            stmt.close().map_err(|e| Error::stage(Stage::Insert, e))?;
        }
        state.handle.with(|c| c.commit()).map_err(|e| Error::stage(Stage::Commit, e))?;
        state.phase = Phase::Closed;
        state.handle.close().map_err(|e| Error::stage(Stage::Connection, e))?;
        Ok(())
    }
}

/// Release everything without committing.
fn abort(table: &str, state: &mut State) {
    state.phase = Phase::Closed;
    if let Some(mut stmt) = state.stmt.take()
        && let Err(e) = stmt.close()
    {
        tracing::warn!(error = %e, "failed to close insert statement");
    }
    if let Err(e) = state.handle.with(|c| c.rollback()) {
        tracing::warn!(%table, error = %e, "rollback failed");
    }
    if let Err(e) = state.handle.close() {
        tracing::warn!(error = %e, "failed to close connection");
    }
}

fn begin(handle: &Handle, dialect: Dialect, table: &str, options: &RdbOptions) -> Result<()> {
    driver::select_schema(handle, dialect, options)?;
    handle.with(|c| c.begin()).map_err(|e| Error::stage(Stage::Connection, e))?;
    if options.if_exists == IfExists::Drop {
        let sql = sql::drop_table(table, options.schema.as_deref());
        tracing::debug!(%sql, "drop table");
        if let Err(e) = handle.with(|c| c.execute(&sql)) {
            if let Err(rollback) = handle.with(|c| c.rollback()) {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            return Err(Error::stage(Stage::Drop, e));
        }
    }
    Ok(())
}

impl Sink for RdbSink {
    fn put(&self, item: Item, _index: usize) -> Result<()> {
        let Item::Row(row) = item else {
            return Ok(());
        };
        let mut state = self.state.lock();
        match state.phase {
            Phase::Open => {}
            Phase::Failed => return Err(Error::stage(Stage::Write, "an earlier write failed")),
            Phase::Closed => return Err(Error::stage(Stage::Write, "sink is closed")),
        }
        let result = self.push(&mut state, row);
        if result.is_err() {
            state.phase = Phase::Failed;
        }
        result
    }

    fn finish(&self, error: Option<&Error>) -> Result<()> {
        let mut state = self.state.lock();
        if state.phase == Phase::Closed {
            return Ok(());
        }
        if let Some(e) = error {
            tracing::warn!(table = %self.table, error = %e, "write aborted, rolling back");
            abort(&self.table, &mut state);
            return Ok(());
        }
        if state.phase == Phase::Failed {
            abort(&self.table, &mut state);
            return Err(Error::stage(Stage::Write, "an earlier write failed"));
        }
        match self.complete(&mut state) {
            Ok(()) => {
                tracing::info!(table = %self.table, rows = state.written, batches = state.batches, "write committed");
                Ok(())
            }
            Err(e) => {
                if state.phase != Phase::Closed {
                    abort(&self.table, &mut state);
                }
                Err(e)
            }
        }
    }
}

impl Drop for RdbSink {
    fn drop(&mut self) {
        let table = &self.table;
        let state = self.state.get_mut();
        if state.phase != Phase::Closed {
            tracing::warn!(%table, "sink dropped before finish, rolling back");
            abort(table, state);
        }
    }
}
