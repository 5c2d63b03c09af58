#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use tessera_api::Cell;
use tessera_rdb::{ColumnInfo, Connection, Connector, DriverError, Native, Rows, Scanner, Statement};

/// In-memory database that records every call made on it.
#[derive(Default)]
pub struct MemDb {
    pub log: Vec<String>,
    /// Parameters of every executed insert, one entry per execution.
    pub inserted: Vec<Vec<Cell>>,
    results: HashMap<String, (Vec<ColumnInfo>, Vec<Vec<Native>>)>,
    fail_on: Option<String>,
}

impl MemDb {
    fn check(&self, sql: &str) -> Result<(), DriverError> {
        match &self.fail_on {
            Some(pattern) if sql.contains(pattern.as_str()) => {
                Err(DriverError::backend(format!("injected failure on `{sql}`")))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct SharedDb(Arc<Mutex<MemDb>>);

impl SharedDb {
    pub fn log(&self) -> Vec<String> {
        self.0.lock().log.clone()
    }

    pub fn inserted(&self) -> Vec<Vec<Cell>> {
        self.0.lock().inserted.clone()
    }

    pub fn fail_on(&self, pattern: &str) {
        self.0.lock().fail_on = Some(pattern.to_string());
    }

    pub fn result(&self, query: &str, columns: &[(&str, &str)], rows: Vec<Vec<Native>>) {
        let columns = columns.iter().map(|(n, t)| ColumnInfo::new(*n, *t)).collect();
        self.0.lock().results.insert(query.to_string(), (columns, rows));
    }

    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(MemConnection { db: self.clone() })
    }
}

/// Register a fresh database under `driver` and return it.
pub fn register(driver: &str) -> SharedDb {
    let db = SharedDb::default();
    tessera_rdb::register(driver, Arc::new(MemConnector { db: db.clone() }));
    db
}

struct MemConnector {
    db: SharedDb,
}

impl Connector for MemConnector {
    fn open(&self, info: &str) -> Result<Box<dyn Connection>, DriverError> {
        self.db.0.lock().log.push(format!("open {info}"));
        Ok(self.db.connection())
    }
}

struct MemConnection {
    db: SharedDb,
}

impl MemConnection {
    fn record(&self, entry: String) -> Result<(), DriverError> {
        let mut db = self.db.0.lock();
        db.check(&entry)?;
        db.log.push(entry);
        Ok(())
    }
}

impl Connection for MemConnection {
    fn execute(&mut self, sql: &str) -> Result<u64, DriverError> {
        self.record(sql.to_string())?;
        Ok(0)
    }

    fn query(&mut self, sql: &str) -> Result<Box<dyn Rows>, DriverError> {
        self.record(format!("query {sql}"))?;
        let db = self.db.0.lock();
        let (columns, rows) = db
            .results
            .get(sql)
            .cloned()
            .ok_or_else(|| DriverError::backend(format!("no result for `{sql}`")))?;
        Ok(Box::new(MemRows { db: self.db.clone(), columns, rows: rows.into() }))
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.record("begin".into())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.record("commit".into())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.record("rollback".into())
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement>, DriverError> {
        self.record(format!("prepare {sql}"))?;
        Ok(Box::new(MemStatement { db: self.db.clone() }))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.record("close".into())
    }
}

struct MemStatement {
    db: SharedDb,
}

impl Statement for MemStatement {
    fn execute(&mut self, params: &[Cell]) -> Result<u64, DriverError> {
        let mut db = self.db.0.lock();
        let entry = format!("exec {}", params.len());
        db.check(&entry)?;
        db.log.push(entry);
        db.inserted.push(params.to_vec());
        Ok(1)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.db.0.lock().log.push("close statement".into());
        Ok(())
    }
}

struct MemRows {
    db: SharedDb,
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<Native>>,
}

impl Rows for MemRows {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn next_row(&mut self, dest: &mut [Scanner]) -> Result<bool, DriverError> {
        let Some(row) = self.rows.pop_front() else {
            return Ok(false);
        };
        for (scanner, native) in dest.iter_mut().zip(row) {
            scanner.scan(native)?;
        }
        Ok(true)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.db.0.lock().log.push("close rows".into());
        Ok(())
    }
}
