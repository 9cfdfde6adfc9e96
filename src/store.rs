//! SQLite persistence for prediction requests and their results.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::features::Measurements;

/// One stored prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
    pub predicted_class: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// The stored inputs.
    pub fn measurements(&self) -> Measurements {
        Measurements {
            sepal_length: self.sepal_length,
            sepal_width: self.sepal_width,
            petal_length: self.petal_length,
            petal_width: self.petal_width,
        }
    }

    /// Replace the stored inputs.
    pub fn set_measurements(&mut self, m: &Measurements) {
        self.sepal_length = m.sepal_length;
        self.sepal_width = m.sepal_width;
        self.petal_length = m.petal_length;
        self.petal_width = m.petal_width;
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sepal_length: row.get(1)?,
            sepal_width: row.get(2)?,
            petal_length: row.get(3)?,
            petal_width: row.get(4)?,
            predicted_class: row.get(5)?,
            created_at: timestamp(row, 6)?,
            updated_at: timestamp(row, 7)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, sepal_length, sepal_width, petal_length, petal_width,
        predicted_class, created_at, updated_at
     FROM prediction";

/// SQLite-backed log of every prediction served.
pub struct PredictionStore {
    conn: Mutex<Connection>,
}

impl PredictionStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn)
    }

    /// Ephemeral database for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS prediction (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                sepal_length    REAL NOT NULL,
                sepal_width     REAL NOT NULL,
                petal_length    REAL NOT NULL,
                petal_width     REAL NOT NULL,
                predicted_class TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Record a new prediction and return the stored row.
    pub fn insert(
        &self,
        m: &Measurements,
        predicted_class: Option<&str>,
    ) -> Result<PredictionRecord, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let stamp = format_timestamp(&now);
        conn.execute(
            "INSERT INTO prediction
                (sepal_length, sepal_width, petal_length, petal_width, predicted_class, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                m.sepal_length,
                m.sepal_width,
                m.petal_length,
                m.petal_width,
                predicted_class,
                stamp,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, ?predicted_class, "Prediction stored");

        Ok(PredictionRecord {
            id,
            sepal_length: m.sepal_length,
            sepal_width: m.sepal_width,
            petal_length: m.petal_length,
            petal_width: m.petal_width,
            predicted_class: predicted_class.map(str::to_string),
            created_at: parse_timestamp(&stamp).unwrap_or(now),
            updated_at: parse_timestamp(&stamp).unwrap_or(now),
        })
    }

    /// All predictions ordered by id.
    pub fn list(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let rows = stmt
            .query_map([], PredictionRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// A single prediction, if it exists.
    pub fn get(&self, id: i64) -> Result<Option<PredictionRecord>, StoreError> {
        let conn = self.conn()?;
        Self::get_with(&conn, id)
    }

    fn get_with(conn: &Connection, id: i64) -> Result<Option<PredictionRecord>, StoreError> {
        let record = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                PredictionRecord::from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Number of stored predictions.
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM prediction", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Read-modify-write a row inside one transaction.
    ///
    /// Returns `Ok(None)` when `id` does not exist. If `f` fails nothing is
    /// written and its error is returned.
    pub fn modify<E, F>(&self, id: i64, f: F) -> Result<Option<PredictionRecord>, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut PredictionRecord) -> Result<(), E>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(StoreError::from)?;

        let Some(mut record) = Self::get_with(&tx, id)? else {
            return Ok(None);
        };
        f(&mut record)?;

        let now = Utc::now();
        let stamp = format_timestamp(&now);
        tx.execute(
            "UPDATE prediction
             SET sepal_length = ?1, sepal_width = ?2, petal_length = ?3, petal_width = ?4,
                 predicted_class = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                record.sepal_length,
                record.sepal_width,
                record.petal_length,
                record.petal_width,
                record.predicted_class,
                stamp,
                id,
            ],
        )
        .map_err(StoreError::from)?;
        tx.commit().map_err(StoreError::from)?;

        record.updated_at = parse_timestamp(&stamp).unwrap_or(now);
        debug!(id, predicted_class = ?record.predicted_class, "Prediction updated");
        Ok(Some(record))
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{raw}'").into(),
        )
    })
}
