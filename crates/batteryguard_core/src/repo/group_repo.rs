//! Object group store.
//!
//! # Responsibility
//! - CRUD for customer groups, including billing info reads for the
//!   report builder.
//!
//! # Invariants
//! - `replace_all_groups` is delete-then-reinsert in one transaction; it is
//!   tolerable only because groups are a rarely-edited admin collection.
//!   This pattern must never spread to the object tree: it races with
//!   per-item mutation and loses concurrent writes.

use crate::model::group::{BillingInfo, ObjectGroup};
use crate::repo::{
    ensure_connection_ready, map_insert_error, RepoError, RepoResult, SqlFieldSet, TableSpec,
};
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

/// Typed field set for group updates. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub billing_info: Option<BillingInfo>,
    pub default_battery_life_months: Option<u32>,
    pub notification_lead_time_weeks: Option<u32>,
}

/// Store interface for object groups.
pub trait GroupRepository {
    fn create_group(&mut self, group: &ObjectGroup) -> RepoResult<()>;
    fn get_group(&self, id: &str) -> RepoResult<ObjectGroup>;
    fn list_groups(&self) -> RepoResult<Vec<ObjectGroup>>;
    fn update_group(&mut self, id: &str, update: &GroupUpdate) -> RepoResult<()>;
    fn delete_group(&mut self, id: &str) -> RepoResult<()>;
    /// Replaces the whole collection atomically. Admin configuration only.
    fn replace_all_groups(&mut self, groups: &[ObjectGroup]) -> RepoResult<()>;
}

/// SQLite-backed group store.
pub struct SqliteGroupRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGroupRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[TableSpec {
                table: "groups",
                columns: &[
                    "id",
                    "name",
                    "color",
                    "billing_info",
                    "default_battery_life_months",
                    "notification_lead_time_weeks",
                ],
            }],
        )?;
        Ok(Self { conn })
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn create_group(&mut self, group: &ObjectGroup) -> RepoResult<()> {
        insert_group(self.conn, group)
    }

    fn get_group(&self, id: &str) -> RepoResult<ObjectGroup> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, billing_info, default_battery_life_months,
                    notification_lead_time_weeks
             FROM groups
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_group_row(row),
            None => Err(RepoError::NotFound(format!("groups/{id}"))),
        }
    }

    fn list_groups(&self) -> RepoResult<Vec<ObjectGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, color, billing_info, default_battery_life_months,
                    notification_lead_time_weeks
             FROM groups
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            groups.push(parse_group_row(row)?);
        }
        Ok(groups)
    }

    fn update_group(&mut self, id: &str, update: &GroupUpdate) -> RepoResult<()> {
        let mut fields = SqlFieldSet::default();
        if let Some(name) = &update.name {
            fields.push("name", name.clone());
        }
        if let Some(color) = &update.color {
            fields.push("color", color.clone());
        }
        if let Some(billing_info) = &update.billing_info {
            fields.push("billing_info", serde_json::to_string(billing_info)?);
        }
        if let Some(months) = update.default_battery_life_months {
            fields.push("default_battery_life_months", i64::from(months));
        }
        if let Some(weeks) = update.notification_lead_time_weeks {
            fields.push("notification_lead_time_weeks", i64::from(weeks));
        }

        if fields.is_empty() {
            return Err(RepoError::Validation(
                "group update field set is empty".to_string(),
            ));
        }

        let where_index = fields.bind_count() + 1;
        let (set_clause, mut values) = fields.into_parts();
        values.push(id.to_string().into());

        let sql = format!("UPDATE groups SET {set_clause} WHERE id = ?{where_index};");
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("groups/{id}")));
        }
        Ok(())
    }

    fn delete_group(&mut self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM groups WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(format!("groups/{id}")));
        }
        Ok(())
    }

    fn replace_all_groups(&mut self, groups: &[ObjectGroup]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM groups;", [])?;
        for group in groups {
            insert_group(&tx, group)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn insert_group(conn: &Connection, group: &ObjectGroup) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO groups (
            id, name, color, billing_info, default_battery_life_months,
            notification_lead_time_weeks
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            group.id,
            group.name,
            group.color,
            group
                .billing_info
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            group.default_battery_life_months.map(i64::from),
            group.notification_lead_time_weeks.map(i64::from),
        ],
    )
    .map_err(|err| map_insert_error(err, "group", &group.id))?;
    Ok(())
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<ObjectGroup> {
    let billing_text: Option<String> = row.get("billing_info")?;
    Ok(ObjectGroup {
        id: row.get("id")?,
        name: row.get("name")?,
        color: row.get("color")?,
        billing_info: billing_text
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|err| {
                RepoError::InvalidData(format!("invalid billing_info payload: {err}"))
            })?,
        default_battery_life_months: row
            .get::<_, Option<i64>>("default_battery_life_months")?
            .map(|value| parse_u32_column("default_battery_life_months", value))
            .transpose()?,
        notification_lead_time_weeks: row
            .get::<_, Option<i64>>("notification_lead_time_weeks")?
            .map(|value| parse_u32_column("notification_lead_time_weeks", value))
            .transpose()?,
    })
}

fn parse_u32_column(column: &str, value: i64) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid `{column}` value `{value}`"))
    })
}
