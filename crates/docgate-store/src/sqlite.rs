//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via `tokio::task::spawn_blocking`.
//!
//! The connection is opened lazily, exactly once per store: the first call
//! checks the cell, takes the init lock, re-checks, then opens and migrates.
//! Every later call reads the initialized cell without taking the init lock.
//! All statements are parameterized; only validated tenant table names are
//! interpolated into SQL text.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use docgate_core::{
    AccessorType, CustomPermRecord, DefaultScopeToggle, Department, GnsPath, OwnerRecord,
    PermBits, PermKind, PermSource, PrincipalId, PrincipalType, StrategyRecord, StrategyRole,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::tenant::{TableNames, TenantSchema};
use crate::traits::{
    CustomPermStore, Directory, DirectoryWriter, OwnerStore, StrategyStore, BATCH_CHUNK_SIZE,
};

const OWNER_COLUMNS: &str = "path, owner_id, owner_type, owner_name, modify_time, deletable";

const PERM_COLUMNS: &str = "id, path, accessor_id, accessor_type, kind, perm_value, source, \
                            end_time, create_time, modify_time";

/// Records that take part in permission evaluation: allow/deny only, never
/// anonymous links (accessor type 4).
const EVALUABLE: &str = "kind IN (1, 2) AND accessor_type <> 4";

/// Where the database lives.
#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Memory,
}

/// State shared with blocking tasks.
struct Shared {
    target: Target,
    tables: TableNames,
    conn: OnceLock<Arc<Mutex<Connection>>>,
    init: Mutex<()>,
}

impl Shared {
    /// The connection, opening and migrating it on first use.
    fn connection(&self) -> Result<Arc<Mutex<Connection>>> {
        if let Some(conn) = self.conn.get() {
            return Ok(Arc::clone(conn));
        }

        let _guard = self
            .init
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;

        if let Some(conn) = self.conn.get() {
            return Ok(Arc::clone(conn));
        }

        let mut conn = match &self.target {
            Target::File(path) => Connection::open(path)?,
            Target::Memory => Connection::open_in_memory()?,
        };
        migration::migrate(&mut conn, &self.tables)?;
        tracing::debug!(target = ?self.target, "sqlite connection initialized");

        let conn = Arc::new(Mutex::new(conn));
        // Only this thread can reach here while the init lock is held.
        let _ = self.conn.set(Arc::clone(&conn));
        Ok(conn)
    }
}

/// SQLite-based store implementation.
///
/// Thread-safe via an internal Mutex around a single connection. All
/// operations use `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStore {
    shared: Arc<Shared>,
}

impl SqliteStore {
    /// Configure a store over the database file at `path`, opened on first use.
    pub fn lazy(path: impl AsRef<Path>, schema: &TenantSchema) -> Self {
        Self::with_target(Target::File(path.as_ref().to_path_buf()), schema)
    }

    /// Open (creating and migrating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, schema: &TenantSchema) -> Result<Self> {
        let store = Self::lazy(path, schema);
        store.shared.connection()?;
        Ok(store)
    }

    /// Open an in-memory database under the default tenant.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::open_memory_with_schema(&TenantSchema::default())
    }

    /// Open an in-memory database under `schema`.
    pub fn open_memory_with_schema(schema: &TenantSchema) -> Result<Self> {
        let store = Self::with_target(Target::Memory, schema);
        store.shared.connection()?;
        Ok(store)
    }

    fn with_target(target: Target, schema: &TenantSchema) -> Self {
        Self {
            shared: Arc::new(Shared {
                target,
                tables: schema.tables(),
                conn: OnceLock::new(),
                init: Mutex::new(()),
            }),
        }
    }

    /// Whether the connection has been opened yet.
    pub fn is_initialized(&self) -> bool {
        self.shared.conn.get().is_some()
    }

    /// The tenant-qualified table names.
    pub fn tables(&self) -> &TableNames {
        &self.shared.tables
    }

    /// Execute a blocking operation on the connection.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &TableNames) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let conn = shared.connection()?;
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn, &shared.tables)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration provisioning
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl DirectoryWriter for SqliteStore {
    async fn put_department(&self, dept: &Department) -> Result<()> {
        let dept = dept.clone();
        self.run(move |conn, t| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, parent_id, name, is_enterprise, priority)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    t.department
                ),
                params![
                    dept.id.as_str(),
                    dept.parent_id.as_ref().map(|p| p.as_str().to_string()),
                    dept.name,
                    dept.is_enterprise,
                    dept.priority,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn put_user_department(&self, user_id: &PrincipalId, dept_id: &PrincipalId) -> Result<()> {
        let (user_id, dept_id) = (user_id.as_str().to_string(), dept_id.as_str().to_string());
        self.run(move |conn, t| {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (user_id, department_id) VALUES (?1, ?2)",
                    t.user_department
                ),
                params![user_id, dept_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn put_account(&self, id: &PrincipalId, name: &str, is_admin: bool) -> Result<()> {
        let (id, name) = (id.as_str().to_string(), name.to_string());
        self.run(move |conn, t| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (id, name, is_admin) VALUES (?1, ?2, ?3)",
                    t.account
                ),
                params![id, name, is_admin],
            )?;
            Ok(())
        })
        .await
    }

    async fn put_strategy_record(&self, record: &StrategyRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn, t| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (strategy_id, obj_id, obj_type, parent_id, role)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    t.strategy
                ),
                params![
                    record.strategy_id,
                    record.obj_id.as_str(),
                    record.obj_type.to_i32(),
                    record.parent_id.as_str(),
                    record.role.to_i32(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn set_default_toggle(&self, toggle: DefaultScopeToggle, enabled: bool) -> Result<()> {
        self.run(move |conn, t| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO {} (toggle_key, enabled) VALUES (?1, ?2)",
                    t.toggle
                ),
                params![toggle.key(), enabled],
            )?;
            Ok(())
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn conversion_failure(idx: usize, what: &'static str, code: i32) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Integer,
        Box::new(docgate_core::CoreError::UnknownCode { what, code }),
    )
}

fn row_to_owner(row: &rusqlite::Row<'_>) -> rusqlite::Result<OwnerRecord> {
    let owner_type: i32 = row.get(2)?;
    Ok(OwnerRecord {
        path: GnsPath::new(row.get::<_, String>(0)?),
        owner_id: PrincipalId::new(row.get::<_, String>(1)?),
        owner_type: PrincipalType::from_i32(owner_type)
            .ok_or_else(|| conversion_failure(2, "principal type", owner_type))?,
        owner_name: row.get(3)?,
        modify_time: row.get(4)?,
        deletable: row.get(5)?,
    })
}

fn row_to_perm(row: &rusqlite::Row<'_>) -> rusqlite::Result<CustomPermRecord> {
    let accessor_type: i32 = row.get(3)?;
    let kind: i32 = row.get(4)?;
    let perm_value: i64 = row.get(5)?;
    let source: i32 = row.get(6)?;
    Ok(CustomPermRecord {
        id: row.get(0)?,
        path: GnsPath::new(row.get::<_, String>(1)?),
        accessor_id: PrincipalId::new(row.get::<_, String>(2)?),
        accessor_type: AccessorType::from_i32(accessor_type)
            .ok_or_else(|| conversion_failure(3, "accessor type", accessor_type))?,
        kind: PermKind::from_i32(kind).ok_or_else(|| conversion_failure(4, "permission kind", kind))?,
        perm_value: PermBits(perm_value as u32),
        source: PermSource::from_i32(source)
            .ok_or_else(|| conversion_failure(6, "permission source", source))?,
        end_time: row.get(7)?,
        create_time: row.get(8)?,
        modify_time: row.get(9)?,
    })
}

fn row_to_strategy(row: &rusqlite::Row<'_>) -> rusqlite::Result<StrategyRecord> {
    let obj_type: i32 = row.get(2)?;
    let role: i32 = row.get(4)?;
    Ok(StrategyRecord {
        strategy_id: row.get(0)?,
        obj_id: PrincipalId::new(row.get::<_, String>(1)?),
        obj_type: PrincipalType::from_i32(obj_type)
            .ok_or_else(|| conversion_failure(2, "principal type", obj_type))?,
        parent_id: PrincipalId::new(row.get::<_, String>(3)?),
        role: StrategyRole::from_i32(role).ok_or_else(|| conversion_failure(4, "strategy role", role))?,
    })
}

fn row_to_department(row: &rusqlite::Row<'_>) -> rusqlite::Result<Department> {
    let parent_id: Option<String> = row.get(1)?;
    Ok(Department {
        id: PrincipalId::new(row.get::<_, String>(0)?),
        parent_id: parent_id.filter(|p| !p.is_empty()).map(PrincipalId::new),
        name: row.get(2)?,
        is_enterprise: row.get(3)?,
        priority: row.get(4)?,
    })
}

/// `?, ?, ?` with `n` placeholders.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Run `template` (containing one `{in}` marker) once per chunk of `keys`,
/// binding the chunk to the `IN (...)` list.
fn select_in<T, F>(conn: &Connection, template: &str, keys: &[String], mut map: F) -> Result<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut out = Vec::new();
    for chunk in keys.chunks(BATCH_CHUNK_SIZE) {
        let sql = template.replace("{in}", &placeholders(chunk.len()));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), &mut map)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        out.extend(rows);
    }
    Ok(out)
}

fn strings<T: AsRef<str>>(items: &[T]) -> Vec<String> {
    items.iter().map(|i| i.as_ref().to_string()).collect()
}

fn dedup_strings<T: AsRef<str>>(items: &[T]) -> Vec<String> {
    let mut out = strings(items);
    out.sort();
    out.dedup();
    out
}

fn insert_owner(conn: &Connection, table: &str, record: &OwnerRecord) -> Result<()> {
    conn.prepare_cached(&format!(
        "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        table, OWNER_COLUMNS
    ))?
    .execute(params![
        record.path.as_str(),
        record.owner_id.as_str(),
        record.owner_type.to_i32(),
        record.owner_name,
        record.modify_time,
        record.deletable,
    ])?;
    Ok(())
}

fn insert_perm(conn: &Connection, table: &str, record: &CustomPermRecord) -> Result<i64> {
    conn.prepare_cached(&format!(
        "INSERT INTO {} (path, accessor_id, accessor_type, kind, perm_value, source,
                         end_time, create_time, modify_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        table
    ))?
    .execute(params![
        record.path.as_str(),
        record.accessor_id.as_str(),
        record.accessor_type.to_i32(),
        record.kind.to_i32(),
        record.perm_value.bits() as i64,
        record.source.to_i32(),
        record.end_time,
        record.create_time,
        record.modify_time,
    ])?;
    Ok(conn.last_insert_rowid())
}

// ─────────────────────────────────────────────────────────────────────────────
// Ownership
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl OwnerStore for SqliteStore {
    async fn add_owner(&self, record: &OwnerRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn, t| insert_owner(conn, &t.owner, &record))
            .await
    }

    async fn add_owners(&self, records: &[OwnerRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = records.to_vec();
        self.run(move |conn, t| {
            for chunk in records.chunks(BATCH_CHUNK_SIZE) {
                let tx = conn.transaction()?;
                for record in chunk {
                    insert_owner(&tx, &t.owner, record)?;
                }
                tx.commit()?;
            }
            Ok(())
        })
        .await
    }

    async fn touch_owner(
        &self,
        path: &GnsPath,
        owner_id: &PrincipalId,
        modify_time: i64,
    ) -> Result<u64> {
        let (path, owner_id) = (path.as_str().to_string(), owner_id.as_str().to_string());
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!(
                    "UPDATE {} SET modify_time = ?1 WHERE path = ?2 AND owner_id = ?3",
                    t.owner
                ),
                params![modify_time, path, owner_id],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn is_owner(&self, path: &GnsPath, user_id: &PrincipalId) -> Result<bool> {
        let ancestors = path.ancestors();
        if ancestors.is_empty() {
            return Ok(false);
        }
        let mut args = strings(&ancestors);
        args.push(user_id.as_str().to_string());

        self.run(move |conn, t| {
            let sql = format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE path IN ({}) AND owner_id = ?)",
                t.owner,
                placeholders(args.len() - 1)
            );
            let exists: bool = conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
            Ok(exists)
        })
        .await
    }

    async fn get_inherit_owner_infos_by_doc_id(
        &self,
        path: &GnsPath,
        only_users: bool,
    ) -> Result<Vec<OwnerRecord>> {
        let ancestors = strings(&path.ancestors());
        if ancestors.is_empty() {
            return Ok(Vec::new());
        }

        self.run(move |conn, t| {
            let type_filter = if only_users {
                format!(" AND owner_type = {}", PrincipalType::User.to_i32())
            } else {
                String::new()
            };
            let sql = format!(
                "SELECT {} FROM {} WHERE path IN ({}){} ORDER BY length(path), path, rowid",
                OWNER_COLUMNS,
                t.owner,
                placeholders(ancestors.len()),
                type_filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params_from_iter(ancestors.iter()), row_to_owner)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_owner_infos_by_doc_id(&self, path: &GnsPath) -> Result<Vec<OwnerRecord>> {
        let path = path.as_str().to_string();
        self.run(move |conn, t| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE path = ?1 ORDER BY rowid",
                OWNER_COLUMNS, t.owner
            ))?;
            let records = stmt
                .query_map(params![path], row_to_owner)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_owner_infos_by_user_id(&self, user_id: &PrincipalId) -> Result<Vec<OwnerRecord>> {
        let user_id = user_id.as_str().to_string();
        self.run(move |conn, t| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE owner_id = ?1 ORDER BY length(path), path, rowid",
                OWNER_COLUMNS, t.owner
            ))?;
            let records = stmt
                .query_map(params![user_id], row_to_owner)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_sub_objs_by_user_id(
        &self,
        path: &GnsPath,
        user_id: &PrincipalId,
    ) -> Result<Vec<GnsPath>> {
        let user_id = user_id.as_str().to_string();
        let prefix = (!path.is_root()).then(|| path.subtree_prefix());

        self.run(move |conn, t| {
            let paths: Vec<String> = match prefix {
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT DISTINCT path FROM {} WHERE owner_id = ?1
                         ORDER BY length(path), path",
                        t.owner
                    ))?;
                    let rows = stmt
                        .query_map(params![user_id], |row| row.get(0))?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                }
                Some(prefix) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT DISTINCT path FROM {} WHERE owner_id = ?1
                         AND substr(path, 1, ?2) = ?3
                         ORDER BY length(path), path",
                        t.owner
                    ))?;
                    let rows = stmt
                        .query_map(
                            params![user_id, prefix.chars().count() as i64, prefix],
                            |row| row.get(0),
                        )?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                }
            };
            Ok(paths.into_iter().map(GnsPath::new).collect())
        })
        .await
    }

    async fn delete_owner_by_file_id(&self, path: &GnsPath) -> Result<u64> {
        let path = path.as_str().to_string();
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE path = ?1", t.owner),
                params![path],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn delete_owner_by_dir_id(&self, path: &GnsPath) -> Result<u64> {
        let exact = path.as_str().to_string();
        let prefix = path.subtree_prefix();
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE path = ?1 OR substr(path, 1, ?2) = ?3",
                    t.owner
                ),
                params![exact, prefix.chars().count() as i64, prefix],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn delete_owner_by_user_id(&self, user_id: &PrincipalId) -> Result<u64> {
        let user_id = user_id.as_str().to_string();
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE owner_id = ?1", t.owner),
                params![user_id],
            )?;
            Ok(n as u64)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Custom permissions
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CustomPermStore for SqliteStore {
    async fn add_custom_perm(&self, record: &CustomPermRecord) -> Result<i64> {
        let record = record.clone();
        self.run(move |conn, t| insert_perm(conn, &t.custom_perm, &record))
            .await
    }

    async fn add_custom_perms(&self, records: &[CustomPermRecord]) -> Result<Vec<i64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let records = records.to_vec();
        self.run(move |conn, t| {
            let mut ids = Vec::with_capacity(records.len());
            for chunk in records.chunks(BATCH_CHUNK_SIZE) {
                let tx = conn.transaction()?;
                for record in chunk {
                    ids.push(insert_perm(&tx, &t.custom_perm, record)?);
                }
                tx.commit()?;
            }
            Ok(ids)
        })
        .await
    }

    async fn update_custom_perm(&self, record: &CustomPermRecord) -> Result<bool> {
        let record = record.clone();
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!(
                    "UPDATE {} SET path = ?1, accessor_id = ?2, accessor_type = ?3, kind = ?4,
                        perm_value = ?5, source = ?6, end_time = ?7, create_time = ?8,
                        modify_time = ?9
                     WHERE id = ?10",
                    t.custom_perm
                ),
                params![
                    record.path.as_str(),
                    record.accessor_id.as_str(),
                    record.accessor_type.to_i32(),
                    record.kind.to_i32(),
                    record.perm_value.bits() as i64,
                    record.source.to_i32(),
                    record.end_time,
                    record.create_time,
                    record.modify_time,
                    record.id,
                ],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn delete_custom_perm(&self, id: i64) -> Result<u64> {
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE id = ?1", t.custom_perm),
                params![id],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn delete_custom_perm_by_end_time(&self, id: i64, end_time: i64) -> Result<u64> {
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE id = ?1 AND end_time = ?2",
                    t.custom_perm
                ),
                params![id, end_time],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn delete_custom_perm_by_file_id(&self, path: &GnsPath) -> Result<u64> {
        let path = path.as_str().to_string();
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE path = ?1", t.custom_perm),
                params![path],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn delete_custom_perm_by_dir_id(&self, path: &GnsPath) -> Result<u64> {
        let exact = path.as_str().to_string();
        let prefix = path.subtree_prefix();
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE path = ?1 OR substr(path, 1, ?2) = ?3",
                    t.custom_perm
                ),
                params![exact, prefix.chars().count() as i64, prefix],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn delete_custom_perm_by_user_id(&self, accessor_id: &PrincipalId) -> Result<u64> {
        let accessor_id = accessor_id.as_str().to_string();
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!("DELETE FROM {} WHERE accessor_id = ?1", t.custom_perm),
                params![accessor_id],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn delete_custom_perm_by_doc_user_id(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
    ) -> Result<u64> {
        let (path, accessor_id) = (path.as_str().to_string(), accessor_id.as_str().to_string());
        self.run(move |conn, t| {
            let n = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE path = ?1 AND accessor_id = ?2",
                    t.custom_perm
                ),
                params![path, accessor_id],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn get_custom_perm_by_doc_ids(
        &self,
        paths: &[GnsPath],
    ) -> Result<Vec<CustomPermRecord>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let keys = dedup_strings(paths);

        self.run(move |conn, t| {
            let template = format!(
                "SELECT {} FROM {} WHERE path IN ({{in}}) AND {} ORDER BY path, id",
                PERM_COLUMNS, t.custom_perm, EVALUABLE
            );
            let mut records = select_in(conn, &template, &keys, row_to_perm)?;
            // Chunks are ordered individually; restore the global order.
            records.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
            Ok(records)
        })
        .await
    }

    async fn get_custom_perm_by_id(&self, id: i64) -> Result<Option<CustomPermRecord>> {
        self.run(move |conn, t| {
            conn.query_row(
                &format!("SELECT {} FROM {} WHERE id = ?1", PERM_COLUMNS, t.custom_perm),
                params![id],
                row_to_perm,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_custom_perm_by_end_time(
        &self,
        path: &GnsPath,
        accessor_id: &PrincipalId,
        accessor_type: AccessorType,
        kind: PermKind,
        end_time: i64,
    ) -> Result<Option<CustomPermRecord>> {
        let (path, accessor_id) = (path.as_str().to_string(), accessor_id.as_str().to_string());
        self.run(move |conn, t| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM {}
                     WHERE path = ?1 AND accessor_id = ?2 AND accessor_type = ?3
                       AND kind = ?4 AND end_time = ?5
                     ORDER BY id LIMIT 1",
                    PERM_COLUMNS, t.custom_perm
                ),
                params![
                    path,
                    accessor_id,
                    accessor_type.to_i32(),
                    kind.to_i32(),
                    end_time
                ],
                row_to_perm,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_custom_perms_by_accessor(
        &self,
        accessor_id: &PrincipalId,
    ) -> Result<Vec<CustomPermRecord>> {
        let accessor_id = accessor_id.as_str().to_string();
        self.run(move |conn, t| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE accessor_id = ?1 ORDER BY path, id",
                PERM_COLUMNS, t.custom_perm
            ))?;
            let records = stmt
                .query_map(params![accessor_id], row_to_perm)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_expire_perm_infos(&self, threshold: i64) -> Result<Vec<CustomPermRecord>> {
        self.run(move |conn, t| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {}
                 WHERE kind IN (1, 2) AND end_time <> -1 AND end_time < ?1
                 ORDER BY end_time, id",
                PERM_COLUMNS, t.custom_perm
            ))?;
            let records = stmt
                .query_map(params![threshold], row_to_perm)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn get_all_custom_perm(&self) -> Result<Vec<CustomPermRecord>> {
        self.run(move |conn, t| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE accessor_type <> 4 ORDER BY path, id",
                PERM_COLUMNS, t.custom_perm
            ))?;
            let records = stmt
                .query_map([], row_to_perm)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Strategies and directory (read-only)
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl StrategyStore for SqliteStore {
    async fn get_sharer_strategies(&self, obj_ids: &[PrincipalId]) -> Result<Vec<StrategyRecord>> {
        if obj_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = dedup_strings(obj_ids);
        self.run(move |conn, t| {
            let template = format!(
                "SELECT strategy_id, obj_id, obj_type, parent_id, role FROM {}
                 WHERE obj_id IN ({{in}}) AND role = {} ORDER BY strategy_id, rowid",
                t.strategy,
                StrategyRole::Sharer.to_i32()
            );
            select_in(conn, &template, &keys, row_to_strategy)
        })
        .await
    }

    async fn get_scope_records(&self, strategy_ids: &[String]) -> Result<Vec<StrategyRecord>> {
        if strategy_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = dedup_strings(strategy_ids);
        self.run(move |conn, t| {
            let template = format!(
                "SELECT strategy_id, obj_id, obj_type, parent_id, role FROM {}
                 WHERE strategy_id IN ({{in}}) AND role = {} ORDER BY strategy_id, rowid",
                t.strategy,
                StrategyRole::Scope.to_i32()
            );
            select_in(conn, &template, &keys, row_to_strategy)
        })
        .await
    }

    async fn get_default_toggle(&self, toggle: DefaultScopeToggle) -> Result<bool> {
        self.run(move |conn, t| {
            let enabled: Option<bool> = conn
                .query_row(
                    &format!("SELECT enabled FROM {} WHERE toggle_key = ?1", t.toggle),
                    params![toggle.key()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(enabled.unwrap_or(false))
        })
        .await
    }
}

#[async_trait]
impl Directory for SqliteStore {
    async fn get_user_department_ids(&self, user_id: &PrincipalId) -> Result<Vec<PrincipalId>> {
        let user_id = user_id.as_str().to_string();
        self.run(move |conn, t| {
            let mut stmt = conn.prepare(&format!(
                "SELECT department_id FROM {} WHERE user_id = ?1 ORDER BY department_id",
                t.user_department
            ))?;
            let ids = stmt
                .query_map(params![user_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids.into_iter().map(PrincipalId::new).collect())
        })
        .await
    }

    async fn get_parent_department_ids(
        &self,
        dept_ids: &[PrincipalId],
    ) -> Result<Vec<PrincipalId>> {
        if dept_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = dedup_strings(dept_ids);
        self.run(move |conn, t| {
            let template = format!(
                "SELECT DISTINCT parent_id FROM {}
                 WHERE id IN ({{in}}) AND parent_id IS NOT NULL AND parent_id <> ''",
                t.department
            );
            let mut parents: Vec<String> = select_in(conn, &template, &keys, |row| row.get(0))?;
            parents.sort();
            parents.dedup();
            Ok(parents.into_iter().map(PrincipalId::new).collect())
        })
        .await
    }

    async fn get_departments(&self, ids: &[PrincipalId]) -> Result<Vec<Department>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = dedup_strings(ids);
        self.run(move |conn, t| {
            let template = format!(
                "SELECT id, parent_id, name, is_enterprise, priority FROM {}
                 WHERE id IN ({{in}}) ORDER BY id",
                t.department
            );
            select_in(conn, &template, &keys, row_to_department)
        })
        .await
    }

    async fn is_admin(&self, user_id: &PrincipalId) -> Result<bool> {
        let user_id = user_id.as_str().to_string();
        self.run(move |conn, t| {
            let admin: Option<bool> = conn
                .query_row(
                    &format!("SELECT is_admin FROM {} WHERE id = ?1", t.account),
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(admin.unwrap_or(false))
        })
        .await
    }
}
