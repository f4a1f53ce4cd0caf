//! Menu Persistence
//!
//! `MenuStore` maps [`TreeStore`]s to rows of the `menu_items` table.
//!
//! # Transactions
//!
//! Structural changes go through [`MenuStore::mutate_tree`]: the tree is
//! loaded inside a `BEGIN IMMEDIATE` transaction (so no other writer can
//! interleave), the operation runs on the loaded copy, and only rows that
//! actually changed are written back before `COMMIT`. Any error, whether
//! from the operation, the invariant check or SQL, rolls the whole
//! transaction back.
//!
//! Reads are single `SELECT`s and therefore see one committed snapshot; with
//! WAL enabled they never wait for a writer.

use crate::db::{DatabaseError, DatabaseService};
use crate::models::{LinkTarget, MenuItem, MenuMeta, Visibility};
use crate::tree::{TreeError, TreeStore};
use chrono::{DateTime, Utc};
use libsql::{params_from_iter, Connection, Value};
use std::sync::Arc;

const ITEM_COLUMNS: &str = "id, tree_id, parent_id, range_start, range_end, depth, position, name, \
     link_kind, url, resource_type, resource_id, fallback_url, is_active, display_at, hide_at, \
     slug, max_depth, created_at, modified_at";

const UPSERT_ITEM: &str = "INSERT INTO menu_items (id, tree_id, parent_id, range_start, range_end, \
     depth, position, name, link_kind, url, resource_type, resource_id, fallback_url, is_active, \
     display_at, hide_at, slug, max_depth, created_at, modified_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
     ON CONFLICT(id) DO UPDATE SET
        tree_id = excluded.tree_id,
        parent_id = excluded.parent_id,
        range_start = excluded.range_start,
        range_end = excluded.range_end,
        depth = excluded.depth,
        position = excluded.position,
        name = excluded.name,
        link_kind = excluded.link_kind,
        url = excluded.url,
        resource_type = excluded.resource_type,
        resource_id = excluded.resource_id,
        fallback_url = excluded.fallback_url,
        is_active = excluded.is_active,
        display_at = excluded.display_at,
        hide_at = excluded.hide_at,
        slug = excluded.slug,
        max_depth = excluded.max_depth,
        modified_at = excluded.modified_at";

/// Rows written and deleted by one committed mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub deleted: usize,
}

/// Persistence for menu trees
#[derive(Debug, Clone)]
pub struct MenuStore {
    db: Arc<DatabaseService>,
}

impl MenuStore {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Load one complete tree, or `None` if no tree has this id
    pub async fn load_tree(&self, tree_id: &str) -> Result<Option<TreeStore>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let items = fetch_items(
            &conn,
            &format!("SELECT {} FROM menu_items WHERE tree_id = ?1", ITEM_COLUMNS),
            vec![text(tree_id)],
        )
        .await?;

        if items.is_empty() {
            return Ok(None);
        }
        assemble(tree_id, items).map(Some)
    }

    /// Persist a newly created tree
    pub async fn insert_tree(&self, tree: &TreeStore) -> Result<(), DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        execute_control(&conn, "BEGIN IMMEDIATE").await?;

        for item in tree.items() {
            if let Err(e) = upsert_item(&conn, item).await {
                rollback(&conn).await;
                return Err(e);
            }
        }

        commit(&conn).await
    }

    /// Run `op` against the stored tree and persist the result atomically
    ///
    /// Returns `Ok(None)` when the tree does not exist. When `op` or the
    /// invariant check fails, nothing is written and the error is returned.
    pub async fn mutate_tree<T, E, F>(
        &self,
        tree_id: &str,
        op: F,
    ) -> Result<Option<(TreeStore, T)>, E>
    where
        F: FnOnce(&mut TreeStore) -> Result<T, E>,
        E: From<DatabaseError> + From<TreeError>,
    {
        let conn = self.db.connect_with_timeout().await?;
        execute_control(&conn, "BEGIN IMMEDIATE").await?;

        match apply(&conn, tree_id, op).await {
            Ok(Some((tree, result, stats))) => {
                commit(&conn).await?;
                tracing::debug!(
                    tree_id,
                    written = stats.written,
                    deleted = stats.deleted,
                    "Committed tree mutation"
                );
                Ok(Some((tree, result)))
            }
            Ok(None) => {
                rollback(&conn).await;
                Ok(None)
            }
            Err(e) => {
                rollback(&conn).await;
                Err(e)
            }
        }
    }

    /// Delete a whole tree; returns whether it existed
    pub async fn delete_tree(&self, tree_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let deleted = conn
            .execute("DELETE FROM menu_items WHERE tree_id = ?1", [tree_id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to delete tree {}: {}", tree_id, e))
            })?;
        Ok(deleted > 0)
    }

    /// Root items of every tree, ordered by name
    pub async fn list_roots(&self) -> Result<Vec<MenuItem>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_items(
            &conn,
            &format!(
                "SELECT {} FROM menu_items WHERE parent_id IS NULL ORDER BY name, id",
                ITEM_COLUMNS
            ),
            Vec::new(),
        )
        .await
    }

    /// Tree an item belongs to
    pub async fn tree_id_of(&self, item_id: &str) -> Result<Option<String>, DatabaseError> {
        self.single_text("SELECT tree_id FROM menu_items WHERE id = ?1", item_id)
            .await
    }

    /// Tree carrying a slug
    pub async fn tree_id_by_slug(&self, slug: &str) -> Result<Option<String>, DatabaseError> {
        self.single_text(
            "SELECT id FROM menu_items WHERE slug = ?1 AND parent_id IS NULL",
            slug,
        )
        .await
    }

    async fn single_text(&self, sql: &str, arg: &str) -> Result<Option<String>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        let mut stmt = conn.prepare(sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare '{}': {}", sql, e))
        })?;
        let mut rows = stmt.query([arg]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", sql, e))
        })?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => opt_text(&row, 0, "value"),
            None => Ok(None),
        }
    }
}

async fn apply<T, E, F>(
    conn: &Connection,
    tree_id: &str,
    op: F,
) -> Result<Option<(TreeStore, T, WriteStats)>, E>
where
    F: FnOnce(&mut TreeStore) -> Result<T, E>,
    E: From<DatabaseError> + From<TreeError>,
{
    let items = fetch_items(
        conn,
        &format!("SELECT {} FROM menu_items WHERE tree_id = ?1", ITEM_COLUMNS),
        vec![text(tree_id)],
    )
    .await?;
    if items.is_empty() {
        return Ok(None);
    }

    let before = assemble(tree_id, items)?;
    let mut after = before.clone();
    let result = op(&mut after)?;
    after.check_invariants()?;

    let stats = write_changes(conn, &before, &after).await?;
    Ok(Some((after, result, stats)))
}

/// Write every item of `after` that differs from `before`, then delete the
/// items `after` no longer has
///
/// Upserts go first so items re-parented out of a deleted subtree are not
/// taken along by the cascading delete.
async fn write_changes(
    conn: &Connection,
    before: &TreeStore,
    after: &TreeStore,
) -> Result<WriteStats, DatabaseError> {
    let mut stats = WriteStats::default();

    for item in after.items() {
        if before.get(&item.id) != Some(item) {
            upsert_item(conn, item).await?;
            stats.written += 1;
        }
    }

    for item in before.items() {
        if !after.contains_id(&item.id) {
            conn.execute("DELETE FROM menu_items WHERE id = ?1", [item.id.as_str()])
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!(
                        "Failed to delete item {}: {}",
                        item.id, e
                    ))
                })?;
            stats.deleted += 1;
        }
    }

    Ok(stats)
}

fn assemble(tree_id: &str, items: Vec<MenuItem>) -> Result<TreeStore, DatabaseError> {
    TreeStore::from_items(items).map_err(|e| DatabaseError::inconsistent_tree(tree_id, e))
}

async fn execute_control(conn: &Connection, statement: &str) -> Result<(), DatabaseError> {
    conn.execute(statement, ()).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute '{}': {}", statement, e))
    })?;
    Ok(())
}

async fn commit(conn: &Connection) -> Result<(), DatabaseError> {
    if let Err(e) = execute_control(conn, "COMMIT").await {
        rollback(conn).await;
        return Err(e);
    }
    Ok(())
}

async fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute("ROLLBACK", ()).await {
        tracing::debug!("Rollback failed: {}", e);
    }
}

async fn upsert_item(conn: &Connection, item: &MenuItem) -> Result<(), DatabaseError> {
    conn.execute(UPSERT_ITEM, params_from_iter(item_values(item)))
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to write item {}: {}", item.id, e))
        })?;
    Ok(())
}

async fn fetch_items(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<MenuItem>, DatabaseError> {
    let mut stmt = conn
        .prepare(sql)
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to prepare item query: {}", e)))?;
    let mut rows = stmt
        .query(params_from_iter(params))
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to execute item query: {}", e)))?;

    let mut items = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
    {
        items.push(item_from_row(&row)?);
    }
    Ok(items)
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text_value(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

fn timestamp_value(value: Option<DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |at| Value::Text(at.to_rfc3339()))
}

fn item_values(item: &MenuItem) -> Vec<Value> {
    let (link_kind, url, resource_type, resource_id, fallback_url) = match &item.link {
        None => (None, None, None, None, None),
        Some(LinkTarget::Url { url }) => (Some("url"), Some(url.as_str()), None, None, None),
        Some(LinkTarget::Resource {
            resource_type,
            resource_id,
            fallback_url,
        }) => (
            Some("resource"),
            None,
            Some(resource_type.as_str()),
            Some(resource_id.as_str()),
            fallback_url.as_deref(),
        ),
    };

    vec![
        text(&item.id),
        text(&item.tree_id),
        opt_text_value(item.parent_id.as_deref()),
        Value::Integer(item.range_start),
        Value::Integer(item.range_end),
        Value::Integer(i64::from(item.depth)),
        Value::Integer(i64::from(item.position)),
        text(&item.name),
        opt_text_value(link_kind),
        opt_text_value(url),
        opt_text_value(resource_type),
        opt_text_value(resource_id),
        opt_text_value(fallback_url),
        Value::Integer(i64::from(item.visibility.is_active)),
        timestamp_value(item.visibility.display_at),
        timestamp_value(item.visibility.hide_at),
        opt_text_value(item.menu.as_ref().map(|m| m.slug.as_str())),
        item.menu
            .as_ref()
            .map_or(Value::Null, |m| Value::Integer(i64::from(m.max_depth))),
        timestamp_value(Some(item.created_at)),
        timestamp_value(Some(item.modified_at)),
    ]
}

fn value_at(row: &libsql::Row, idx: i32, column: &str) -> Result<Value, DatabaseError> {
    row.get_value(idx)
        .map_err(|e| DatabaseError::row_decode(column, e))
}

fn opt_text(row: &libsql::Row, idx: i32, column: &str) -> Result<Option<String>, DatabaseError> {
    match value_at(row, idx, column)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(DatabaseError::row_decode(
            column,
            format!("expected text, found {:?}", other),
        )),
    }
}

fn req_text(row: &libsql::Row, idx: i32, column: &str) -> Result<String, DatabaseError> {
    opt_text(row, idx, column)?.ok_or_else(|| DatabaseError::row_decode(column, "unexpected NULL"))
}

fn opt_integer(row: &libsql::Row, idx: i32, column: &str) -> Result<Option<i64>, DatabaseError> {
    match value_at(row, idx, column)? {
        Value::Null => Ok(None),
        Value::Integer(n) => Ok(Some(n)),
        other => Err(DatabaseError::row_decode(
            column,
            format!("expected integer, found {:?}", other),
        )),
    }
}

fn req_integer(row: &libsql::Row, idx: i32, column: &str) -> Result<i64, DatabaseError> {
    opt_integer(row, idx, column)?
        .ok_or_else(|| DatabaseError::row_decode(column, "unexpected NULL"))
}

fn req_u32(row: &libsql::Row, idx: i32, column: &str) -> Result<u32, DatabaseError> {
    let n = req_integer(row, idx, column)?;
    u32::try_from(n).map_err(|e| DatabaseError::row_decode(column, e))
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DatabaseError::row_decode(column, e))
}

fn opt_timestamp(
    row: &libsql::Row,
    idx: i32,
    column: &str,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    opt_text(row, idx, column)?
        .map(|s| parse_timestamp(&s, column))
        .transpose()
}

fn item_from_row(row: &libsql::Row) -> Result<MenuItem, DatabaseError> {
    let link = match opt_text(row, 8, "link_kind")?.as_deref() {
        None => None,
        Some("url") => Some(LinkTarget::Url {
            url: req_text(row, 9, "url")?,
        }),
        Some("resource") => Some(LinkTarget::Resource {
            resource_type: req_text(row, 10, "resource_type")?,
            resource_id: req_text(row, 11, "resource_id")?,
            fallback_url: opt_text(row, 12, "fallback_url")?,
        }),
        Some(other) => {
            return Err(DatabaseError::row_decode(
                "link_kind",
                format!("unknown link kind '{}'", other),
            ))
        }
    };

    let menu = match opt_text(row, 16, "slug")? {
        Some(slug) => {
            let max_depth = opt_integer(row, 17, "max_depth")?
                .ok_or_else(|| DatabaseError::row_decode("max_depth", "missing on root"))?;
            Some(MenuMeta {
                slug,
                max_depth: u32::try_from(max_depth)
                    .map_err(|e| DatabaseError::row_decode("max_depth", e))?,
            })
        }
        None => None,
    };

    Ok(MenuItem {
        id: req_text(row, 0, "id")?,
        tree_id: req_text(row, 1, "tree_id")?,
        parent_id: opt_text(row, 2, "parent_id")?,
        range_start: req_integer(row, 3, "range_start")?,
        range_end: req_integer(row, 4, "range_end")?,
        depth: req_u32(row, 5, "depth")?,
        position: req_u32(row, 6, "position")?,
        name: req_text(row, 7, "name")?,
        link,
        visibility: Visibility {
            is_active: req_integer(row, 13, "is_active")? != 0,
            display_at: opt_timestamp(row, 14, "display_at")?,
            hide_at: opt_timestamp(row, 15, "hide_at")?,
        },
        menu,
        created_at: parse_timestamp(&req_text(row, 18, "created_at")?, "created_at")?,
        modified_at: parse_timestamp(&req_text(row, 19, "modified_at")?, "modified_at")?,
    })
}
