//! Company settings store behind the settings collaborator seam.
//!
//! # Responsibility
//! - Read supplier/company identity for the report builder.
//! - Let administrators replace the single settings row.
//!
//! # Invariants
//! - At most one settings row exists (`id = 1`).
//! - Whole-row replacement is acceptable: admin configuration only.

use crate::model::settings::CompanySettings;
use crate::repo::{ensure_connection_ready, RepoResult, TableSpec};
use rusqlite::{params, Connection};

/// Read seam consumed by the report builder.
pub trait SettingsProvider {
    /// Returns the supplier settings, or `None` when never configured.
    fn company_settings(&self) -> RepoResult<Option<CompanySettings>>;
}

/// SQLite-backed settings store.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[TableSpec {
                table: "company_settings",
                columns: &[
                    "id",
                    "supplier_name",
                    "supplier_address",
                    "supplier_ico",
                    "supplier_dic",
                    "technician_name",
                ],
            }],
        )?;
        Ok(Self { conn })
    }

    /// Replaces the settings row. ADMIN gating is the caller's decision.
    pub fn save_company_settings(&self, settings: &CompanySettings) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO company_settings (
                id, supplier_name, supplier_address, supplier_ico, supplier_dic,
                technician_name
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                supplier_name = excluded.supplier_name,
                supplier_address = excluded.supplier_address,
                supplier_ico = excluded.supplier_ico,
                supplier_dic = excluded.supplier_dic,
                technician_name = excluded.technician_name;",
            params![
                settings.supplier_name,
                settings.supplier_address,
                settings.supplier_ico,
                settings.supplier_dic,
                settings.technician_name,
            ],
        )?;
        Ok(())
    }
}

impl SettingsProvider for SqliteSettingsRepository<'_> {
    fn company_settings(&self) -> RepoResult<Option<CompanySettings>> {
        let mut stmt = self.conn.prepare(
            "SELECT supplier_name, supplier_address, supplier_ico, supplier_dic,
                    technician_name
             FROM company_settings
             WHERE id = 1;",
        )?;
        let mut rows = stmt.query([])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(CompanySettings {
            supplier_name: row.get("supplier_name")?,
            supplier_address: row.get("supplier_address")?,
            supplier_ico: row.get("supplier_ico")?,
            supplier_dic: row.get("supplier_dic")?,
            technician_name: row.get("technician_name")?,
        }))
    }
}
