//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL batch
//! that transforms the schema from version N to N+1. Every table, including
//! the migrations ledger, carries the tenant prefix.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::tenant::TableNames;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection, tables: &TableNames) -> Result<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
            tables.migrations
        ),
        [],
    )?;

    let current: u32 = conn.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {}", tables.migrations),
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, tables, version)?;

            tx.execute(
                &format!(
                    "INSERT INTO {} (version, applied_at) VALUES (?1, ?2)",
                    tables.migrations
                ),
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, tables: &TableNames, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn, tables),
        2 => apply_v2(conn, tables),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: ownership and custom permissions.
fn apply_v1(conn: &Connection, t: &TableNames) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        -- Who owns which path. Several owners per path are allowed.
        CREATE TABLE {owner} (
            path TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            owner_type INTEGER NOT NULL,      -- 1=user, 2=department
            owner_name TEXT NOT NULL,
            modify_time INTEGER NOT NULL,     -- Unix ms
            deletable INTEGER NOT NULL DEFAULT 1
        );

        -- Allow/deny overlays
        CREATE TABLE {perm} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL,
            accessor_id TEXT NOT NULL,
            accessor_type INTEGER NOT NULL,   -- 4=anonymous link
            kind INTEGER NOT NULL,            -- 1=allow, 2=deny, 3=block inherit
            perm_value INTEGER NOT NULL,
            source INTEGER NOT NULL,
            end_time INTEGER NOT NULL,        -- Unix ms, -1=never
            create_time INTEGER NOT NULL,
            modify_time INTEGER NOT NULL
        );

        CREATE INDEX idx_{owner}_path ON {owner}(path);
        CREATE INDEX idx_{owner}_owner ON {owner}(owner_id);
        CREATE INDEX idx_{perm}_path ON {perm}(path);
        CREATE INDEX idx_{perm}_accessor ON {perm}(accessor_id);
        CREATE INDEX idx_{perm}_end_time ON {perm}(end_time);
        "#,
        owner = t.owner,
        perm = t.custom_perm,
    ))?;

    Ok(())
}

/// Migration v2: sharing strategies and the department directory.
fn apply_v2(conn: &Connection, t: &TableNames) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE {strategy} (
            strategy_id TEXT NOT NULL,
            obj_id TEXT NOT NULL,
            obj_type INTEGER NOT NULL,        -- 1=user, 2=department
            parent_id TEXT NOT NULL DEFAULT '',
            role INTEGER NOT NULL             -- 1=sharer, 2=scope
        );

        -- Global default-scope toggles ("-1", "-2")
        CREATE TABLE {toggle} (
            toggle_key TEXT PRIMARY KEY,
            enabled INTEGER NOT NULL
        );

        CREATE TABLE {dept} (
            id TEXT PRIMARY KEY,
            parent_id TEXT,                   -- NULL for roots
            name TEXT NOT NULL,
            is_enterprise INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE {user_dept} (
            user_id TEXT NOT NULL,
            department_id TEXT NOT NULL,
            PRIMARY KEY (user_id, department_id)
        );

        CREATE TABLE {account} (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX idx_{strategy}_obj ON {strategy}(obj_id, role);
        CREATE INDEX idx_{strategy}_sid ON {strategy}(strategy_id, role);
        CREATE INDEX idx_{dept}_parent ON {dept}(parent_id);
        "#,
        strategy = t.strategy,
        toggle = t.toggle,
        dept = t.department,
        user_dept = t.user_department,
        account = t.account,
    ))?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::TenantSchema;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tables = TenantSchema::new("t1").unwrap().tables();
        migrate(&mut conn, &tables).unwrap();

        let names: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            &tables.owner,
            &tables.custom_perm,
            &tables.strategy,
            &tables.toggle,
            &tables.department,
            &tables.user_department,
            &tables.account,
            &tables.migrations,
        ] {
            assert!(names.contains(table), "missing table {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        let tables = TenantSchema::default().tables();
        migrate(&mut conn, &tables).unwrap();
        migrate(&mut conn, &tables).unwrap();

        let version: u32 = conn
            .query_row(
                &format!("SELECT MAX(version) FROM {}", tables.migrations),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_tenants_share_a_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn, &TenantSchema::new("a").unwrap().tables()).unwrap();
        migrate(&mut conn, &TenantSchema::new("b").unwrap().tables()).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE '%_owner'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
