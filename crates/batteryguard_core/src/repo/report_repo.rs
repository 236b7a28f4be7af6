//! Report store.
//!
//! # Responsibility
//! - Persist numbered reports with their immutable snapshot columns.
//! - Apply allow-listed mutable updates (status, dates, technician,
//!   measurements).
//!
//! # Invariants
//! - Snapshot fields (number, supplier, customer, address, device list)
//!   have no update path; they are frozen at creation.
//! - Object deletion does not touch reports; orphaned rows stay readable.

use crate::model::report::{Report, ReportMeasurement, ReportStatus};
use crate::repo::{
    ensure_connection_ready, enum_from_db, enum_to_db, map_insert_error, RepoError, RepoResult,
    SqlFieldSet, TableSpec,
};
use rusqlite::{params, params_from_iter, Connection, Row};

/// Typed field set for report updates. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportUpdate {
    pub status: Option<ReportStatus>,
    pub technician_name: Option<String>,
    pub date_execution: Option<i64>,
    pub date_issue: Option<i64>,
    pub date_next: Option<i64>,
    /// Replaces the whole measurement list; rows are edited as a unit in
    /// the report wizard.
    pub measurements: Option<Vec<ReportMeasurement>>,
}

/// Store interface for reports.
pub trait ReportRepository {
    fn create_report(&mut self, report: &Report) -> RepoResult<()>;
    fn get_report(&self, id: &str) -> RepoResult<Report>;
    fn list_reports(&self) -> RepoResult<Vec<Report>>;
    /// Reports for one object, newest number first.
    fn list_reports_for_object(&self, object_id: &str) -> RepoResult<Vec<Report>>;
    fn update_report(&mut self, id: &str, update: &ReportUpdate) -> RepoResult<()>;
    fn delete_report(&mut self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed report store.
pub struct SqliteReportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReportRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[TableSpec {
                table: "reports",
                columns: &[
                    "id",
                    "object_id",
                    "report_number",
                    "seq",
                    "year",
                    "status",
                    "measurements",
                ],
            }],
        )?;
        Ok(Self { conn })
    }
}

const REPORT_SELECT_SQL: &str = "SELECT
    id,
    object_id,
    report_type,
    report_number,
    seq,
    year,
    status,
    supplier,
    customer,
    object_address,
    device_list,
    technician_name,
    measurements,
    date_execution,
    date_issue,
    date_next
FROM reports";

impl ReportRepository for SqliteReportRepository<'_> {
    fn create_report(&mut self, report: &Report) -> RepoResult<()> {
        self.conn
            .execute(
                "INSERT INTO reports (
                    id, object_id, report_type, report_number, seq, year, status,
                    supplier, customer, object_address, device_list, technician_name,
                    measurements, date_execution, date_issue, date_next
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
                params![
                    report.id,
                    report.object_id,
                    report.report_type,
                    report.report_number,
                    report.seq,
                    report.year,
                    enum_to_db(&report.status)?,
                    serde_json::to_string(&report.supplier)?,
                    serde_json::to_string(&report.customer)?,
                    report.object_address,
                    serde_json::to_string(&report.device_list)?,
                    report.technician_name,
                    serde_json::to_string(&report.measurements)?,
                    report.date_execution,
                    report.date_issue,
                    report.date_next,
                ],
            )
            .map_err(|err| map_insert_error(err, "report", &report.id))?;
        Ok(())
    }

    fn get_report(&self, id: &str) -> RepoResult<Report> {
        let mut stmt = self
            .conn
            .prepare(&format!("{REPORT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_report_row(row),
            None => Err(RepoError::NotFound(format!("reports/{id}"))),
        }
    }

    fn list_reports(&self) -> RepoResult<Vec<Report>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REPORT_SELECT_SQL} ORDER BY year DESC, seq DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            reports.push(parse_report_row(row)?);
        }
        Ok(reports)
    }

    fn list_reports_for_object(&self, object_id: &str) -> RepoResult<Vec<Report>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REPORT_SELECT_SQL} WHERE object_id = ?1 ORDER BY year DESC, seq DESC;"
        ))?;
        let mut rows = stmt.query([object_id])?;
        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            reports.push(parse_report_row(row)?);
        }
        Ok(reports)
    }

    fn update_report(&mut self, id: &str, update: &ReportUpdate) -> RepoResult<()> {
        let mut fields = SqlFieldSet::default();
        if let Some(status) = &update.status {
            fields.push("status", enum_to_db(status)?);
        }
        if let Some(technician_name) = &update.technician_name {
            fields.push("technician_name", technician_name.clone());
        }
        if let Some(date_execution) = update.date_execution {
            fields.push("date_execution", date_execution);
        }
        if let Some(date_issue) = update.date_issue {
            fields.push("date_issue", date_issue);
        }
        if let Some(date_next) = update.date_next {
            fields.push("date_next", date_next);
        }
        if let Some(measurements) = &update.measurements {
            fields.push("measurements", serde_json::to_string(measurements)?);
        }

        if fields.is_empty() {
            return Err(RepoError::Validation(
                "report update field set is empty".to_string(),
            ));
        }

        let where_index = fields.bind_count() + 1;
        let (set_clause, mut values) = fields.into_parts();
        values.push(id.to_string().into());

        let sql = format!("UPDATE reports SET {set_clause} WHERE id = ?{where_index};");
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("reports/{id}")));
        }
        Ok(())
    }

    fn delete_report(&mut self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM reports WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("reports/{id}")));
        }
        Ok(())
    }
}

fn parse_report_row(row: &Row<'_>) -> RepoResult<Report> {
    let status_text: String = row.get("status")?;
    let supplier_text: String = row.get("supplier")?;
    let customer_text: String = row.get("customer")?;
    let device_list_text: String = row.get("device_list")?;
    let measurements_text: String = row.get("measurements")?;

    Ok(Report {
        id: row.get("id")?,
        object_id: row.get("object_id")?,
        report_type: row.get("report_type")?,
        report_number: row.get("report_number")?,
        seq: row.get("seq")?,
        year: row.get("year")?,
        status: enum_from_db(&status_text, "reports.status")?,
        supplier: serde_json::from_str(&supplier_text)?,
        customer: serde_json::from_str(&customer_text)?,
        object_address: row.get("object_address")?,
        device_list: serde_json::from_str(&device_list_text)?,
        technician_name: row.get("technician_name")?,
        measurements: serde_json::from_str(&measurements_text)?,
        date_execution: row.get("date_execution")?,
        date_issue: row.get("date_issue")?,
        date_next: row.get("date_next")?,
    })
}
