//! SQLite-backed pending torrent store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::filter::FilterSnapshot;

use super::{
    CreatePendingRequest, PendingError, PendingQuery, PendingStats, PendingStatus, PendingStore,
    PendingTorrent, StatusUpdate,
};

const COLUMNS: &str = "hash, magnet, save_path, category, num, source, status, retry_count, \
     max_retries, total_size, filter_result, error_message, added_at, last_check_at, \
     completed_at, updated_at";

/// SQLite-backed pending torrent store.
pub struct SqlitePendingStore {
    conn: Mutex<Connection>,
}

impl SqlitePendingStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, PendingError> {
        let conn = Connection::open(path).map_err(|e| PendingError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, PendingError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PendingError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PendingError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pending_torrents (
                hash TEXT PRIMARY KEY,
                magnet TEXT NOT NULL,
                save_path TEXT,
                category TEXT,
                num TEXT,
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL,
                total_size INTEGER,
                filter_result TEXT,
                error_message TEXT,
                added_at TEXT NOT NULL,
                last_check_at TEXT,
                completed_at TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pending_status ON pending_torrents(status);
            CREATE INDEX IF NOT EXISTS idx_pending_added_at ON pending_torrents(added_at);
            "#,
        )
        .map_err(|e| PendingError::Database(e.to_string()))?;

        Ok(())
    }

    /// Overwrite one timestamp column, for tests that need aged rows.
    #[cfg(test)]
    pub(crate) fn set_timestamp(&self, hash: &str, column: &str, when: DateTime<Utc>) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("UPDATE pending_torrents SET {} = ? WHERE hash = ?", column),
            params![timestamp(when), hash],
        )
        .unwrap();
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PendingError> {
        self.conn
            .lock()
            .map_err(|_| PendingError::Database("connection lock poisoned".to_string()))
    }

    fn fetch(conn: &Connection, hash: &str) -> Result<Option<PendingTorrent>, PendingError> {
        conn.query_row(
            &format!("SELECT {} FROM pending_torrents WHERE hash = ?", COLUMNS),
            params![hash],
            Self::row_to_pending,
        )
        .optional()
        .map_err(|e| PendingError::Database(e.to_string()))
    }

    fn query_rows(
        conn: &Connection,
        sql: &str,
        params: &[Box<dyn rusqlite::ToSql>],
    ) -> Result<Vec<PendingTorrent>, PendingError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| PendingError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_pending)
            .map_err(|e| PendingError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PendingError::Database(e.to_string()))
    }

    /// `status IN (?, ?, ...)` plus the boxed values for it.
    fn status_in(statuses: &[PendingStatus]) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let params = statuses
            .iter()
            .map(|s| Box::new(s.as_str()) as Box<dyn rusqlite::ToSql>)
            .collect();
        (format!("status IN ({})", placeholders), params)
    }

    fn row_to_pending(row: &rusqlite::Row) -> rusqlite::Result<PendingTorrent> {
        let source: String = row.get(5)?;
        let status: String = row.get(6)?;
        let total_size: Option<i64> = row.get(9)?;
        let filter_result: Option<String> = row.get(10)?;

        Ok(PendingTorrent {
            hash: row.get(0)?,
            magnet: row.get(1)?,
            save_path: row.get(2)?,
            category: row.get(3)?,
            num: row.get(4)?,
            source: source.parse().map_err(|e| conversion_error(5, e))?,
            status: status.parse().map_err(|e| conversion_error(6, e))?,
            retry_count: row.get(7)?,
            max_retries: row.get(8)?,
            total_size: total_size.map(|size| size.max(0) as u64),
            filter_result: filter_result
                .map(|json| serde_json::from_str::<FilterSnapshot>(&json))
                .transpose()
                .map_err(|e| conversion_error(10, e))?,
            error_message: row.get(11)?,
            added_at: parse_timestamp(12, row.get(12)?)?,
            last_check_at: parse_optional_timestamp(13, row.get(13)?)?,
            completed_at: parse_optional_timestamp(14, row.get(14)?)?,
            updated_at: parse_timestamp(15, row.get(15)?)?,
        })
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_optional_timestamp(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(idx, v)).transpose()
}

impl PendingStore for SqlitePendingStore {
    fn create_if_absent(
        &self,
        request: CreatePendingRequest,
    ) -> Result<(PendingTorrent, bool), PendingError> {
        let conn = self.lock()?;
        let now = timestamp(Utc::now());

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO pending_torrents (hash, magnet, save_path, category, num, source, status, retry_count, max_retries, added_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
                params![
                    request.hash,
                    request.magnet,
                    request.save_path,
                    request.category,
                    request.num,
                    request.source.as_str(),
                    PendingStatus::WaitingMetadata.as_str(),
                    request.max_retries,
                    now,
                    now,
                ],
            )
            .map_err(|e| PendingError::Database(e.to_string()))?;

        let row = Self::fetch(&conn, &request.hash)?
            .ok_or_else(|| PendingError::NotFound(request.hash.clone()))?;

        Ok((row, inserted == 1))
    }

    fn get(&self, hash: &str) -> Result<Option<PendingTorrent>, PendingError> {
        let conn = self.lock()?;
        Self::fetch(&conn, hash)
    }

    fn list(&self, query: &PendingQuery) -> Result<Vec<PendingTorrent>, PendingError> {
        let conn = self.lock()?;

        let (where_clause, mut params) = match query.status {
            Some(status) => {
                let (clause, params) = Self::status_in(&[status]);
                (format!("WHERE {}", clause), params)
            }
            None => (String::new(), Vec::new()),
        };
        params.push(Box::new(query.limit()));
        params.push(Box::new(query.offset()));

        let sql = format!(
            "SELECT {} FROM pending_torrents {} ORDER BY added_at DESC, hash ASC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );

        Self::query_rows(&conn, &sql, &params)
    }

    fn count(&self, status: Option<PendingStatus>) -> Result<u64, PendingError> {
        let conn = self.lock()?;

        let count: i64 = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM pending_torrents WHERE status = ?",
                params![status.as_str()],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM pending_torrents", [], |row| {
                row.get(0)
            }),
        }
        .map_err(|e| PendingError::Database(e.to_string()))?;

        Ok(count.max(0) as u64)
    }

    fn list_active(&self) -> Result<Vec<PendingTorrent>, PendingError> {
        let conn = self.lock()?;

        let (clause, params) = Self::status_in(&PendingStatus::ACTIVE);
        let sql = format!(
            "SELECT {} FROM pending_torrents WHERE {} ORDER BY added_at ASC",
            COLUMNS, clause
        );

        Self::query_rows(&conn, &sql, &params)
    }

    fn record_check(&self, hash: &str) -> Result<Option<PendingTorrent>, PendingError> {
        let conn = self.lock()?;
        let now = timestamp(Utc::now());

        let changed = conn
            .execute(
                "UPDATE pending_torrents SET retry_count = retry_count + 1, last_check_at = ?, updated_at = ? WHERE hash = ? AND status = ?",
                params![now, now, hash, PendingStatus::WaitingMetadata.as_str()],
            )
            .map_err(|e| PendingError::Database(e.to_string()))?;

        if changed == 0 {
            return Ok(None);
        }

        Self::fetch(&conn, hash)
    }

    fn transition(
        &self,
        hash: &str,
        from: &[PendingStatus],
        update: StatusUpdate,
    ) -> Result<bool, PendingError> {
        if from.is_empty() {
            return Ok(false);
        }

        let conn = self.lock()?;
        let now = timestamp(Utc::now());

        let filter_json = update
            .filter_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| PendingError::Database(e.to_string()))?;
        let completed_at = update.status.is_terminal().then(|| now.clone());

        let (status_clause, status_params) = Self::status_in(from);
        let sql = format!(
            "UPDATE pending_torrents SET status = ?, updated_at = ?, \
             error_message = COALESCE(?, error_message), \
             filter_result = COALESCE(?, filter_result), \
             total_size = COALESCE(?, total_size), \
             completed_at = COALESCE(?, completed_at) \
             WHERE hash = ? AND {}",
            status_clause
        );

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(update.status.as_str()),
            Box::new(now),
            Box::new(update.error_message),
            Box::new(filter_json),
            Box::new(update.total_size.map(|size| size.min(i64::MAX as u64) as i64)),
            Box::new(completed_at),
            Box::new(hash.to_string()),
        ];
        all_params.extend(status_params);

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let changed = conn
            .execute(&sql, param_refs.as_slice())
            .map_err(|e| PendingError::Database(e.to_string()))?;

        Ok(changed == 1)
    }

    fn reset_for_retry(&self, hash: &str) -> Result<bool, PendingError> {
        let conn = self.lock()?;
        let now = timestamp(Utc::now());

        let changed = conn
            .execute(
                "UPDATE pending_torrents SET status = ?, retry_count = 0, error_message = NULL, filter_result = NULL, completed_at = NULL, last_check_at = NULL, updated_at = ? WHERE hash = ? AND status IN (?, ?)",
                params![
                    PendingStatus::WaitingMetadata.as_str(),
                    now,
                    hash,
                    PendingStatus::Failed.as_str(),
                    PendingStatus::Timeout.as_str(),
                ],
            )
            .map_err(|e| PendingError::Database(e.to_string()))?;

        Ok(changed == 1)
    }

    fn delete(&self, hash: &str) -> Result<PendingTorrent, PendingError> {
        let conn = self.lock()?;

        let row = Self::fetch(&conn, hash)?.ok_or_else(|| PendingError::NotFound(hash.to_string()))?;

        conn.execute("DELETE FROM pending_torrents WHERE hash = ?", params![hash])
            .map_err(|e| PendingError::Database(e.to_string()))?;

        Ok(row)
    }

    fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, PendingError> {
        let conn = self.lock()?;

        let (clause, mut params) = Self::status_in(&PendingStatus::TERMINAL);
        params.push(Box::new(timestamp(cutoff)));

        let sql = format!(
            "DELETE FROM pending_torrents WHERE {} AND completed_at IS NOT NULL AND completed_at < ?",
            clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.execute(&sql, param_refs.as_slice())
            .map_err(|e| PendingError::Database(e.to_string()))
    }

    fn statistics(&self, stuck_before: DateTime<Utc>) -> Result<PendingStats, PendingError> {
        let conn = self.lock()?;
        let mut stats = PendingStats::default();

        {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM pending_torrents GROUP BY status")
                .map_err(|e| PendingError::Database(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let status: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    let status: PendingStatus =
                        status.parse().map_err(|e| conversion_error(0, e))?;
                    Ok((status, count.max(0) as u64))
                })
                .map_err(|e| PendingError::Database(e.to_string()))?;

            for row in rows {
                let (status, count) = row.map_err(|e| PendingError::Database(e.to_string()))?;
                stats.set_count(status, count);
                stats.total += count;
            }
        }

        let (clause, mut params) = Self::status_in(&PendingStatus::ACTIVE);
        params.push(Box::new(timestamp(stuck_before)));
        let sql = format!(
            "SELECT COUNT(*) FROM pending_torrents WHERE {} AND added_at < ?",
            clause
        );
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let stuck: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| PendingError::Database(e.to_string()))?;
        stats.stuck = stuck.max(0) as u64;

        Ok(stats)
    }
}
