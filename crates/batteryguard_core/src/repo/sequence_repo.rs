//! Per-year report sequence generator.
//!
//! # Responsibility
//! - Issue gap-free, duplicate-free integer sequences keyed by calendar
//!   year for report numbering.
//!
//! # Invariants
//! - The counter row is owned exclusively by this module; nothing else
//!   reads or writes `report_counters`.
//! - Increment-and-fetch is one UPSERT statement; sequences are never
//!   derived by scanning existing reports.
//! - Writer contention is retried internally within a bounded budget and
//!   surfaces as `Transient` only when the budget is exhausted.

use crate::model::report::Report;
use crate::repo::{
    ensure_connection_ready, is_busy, RepoError, RepoResult, TableSpec,
};
use rusqlite::Connection;
use std::time::Duration;

const RETRY_BUDGET: u32 = 5;
const RETRY_BACKOFF_MS: u64 = 20;

/// Issues monotonically increasing per-year sequences.
pub trait SequenceGenerator {
    /// Returns 1 on the first call for `year`, then strictly increasing
    /// integers with no gaps or duplicates across concurrent callers.
    fn next_sequence(&self, year: i32) -> RepoResult<i64>;

    /// Draws the next sequence and formats it as `<seq>/<year>`.
    fn format_number(&self, year: i32) -> RepoResult<String> {
        let seq = self.next_sequence(year)?;
        Ok(Report::format_number(seq, year))
    }
}

/// SQLite-backed generator over the `report_counters` table.
pub struct SqliteSequenceGenerator<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSequenceGenerator<'conn> {
    /// Constructs a generator from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[TableSpec {
                table: "report_counters",
                columns: &["year", "last_seq"],
            }],
        )?;
        Ok(Self { conn })
    }
}

impl SequenceGenerator for SqliteSequenceGenerator<'_> {
    fn next_sequence(&self, year: i32) -> RepoResult<i64> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = self.conn.query_row(
                "INSERT INTO report_counters (year, last_seq)
                 VALUES (?1, 1)
                 ON CONFLICT(year) DO UPDATE SET last_seq = last_seq + 1
                 RETURNING last_seq;",
                [year],
                |row| row.get::<_, i64>(0),
            );

            match result {
                Ok(seq) => return Ok(seq),
                Err(err) if is_busy(&err) && attempts < RETRY_BUDGET => {
                    std::thread::sleep(Duration::from_millis(
                        RETRY_BACKOFF_MS * u64::from(attempts),
                    ));
                }
                Err(err) if is_busy(&err) => {
                    return Err(RepoError::Transient {
                        op: "next_sequence",
                        attempts,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
