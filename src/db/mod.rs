//! SQLite-backed node store.
//!
//! The store knows nodes, scalar properties, single references and ordered
//! reference sets. It has no notion of feeds or categories; the entity views
//! in [`crate::graph`] give those meaning. Every multi-statement mutation runs
//! inside one transaction so a failure never leaves a half-written property.

mod schema;

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{MetadataError, Result};
use crate::models::*;

/// Name prefix that separates user properties from system properties.
const USER_PROPERTY_PREFIX: &str = "usr:";

/// A node to be created, with the properties it starts out with.
#[derive(Debug, Clone)]
pub struct NewNode<'a> {
    pub node_type: NodeType,
    pub parent_id: Option<Uuid>,
    pub properties: Vec<(&'a str, String)>,
    pub references: Vec<(&'a str, Uuid)>,
}

impl<'a> NewNode<'a> {
    pub fn new(node_type: NodeType, parent_id: Option<Uuid>) -> Self {
        Self {
            node_type,
            parent_id,
            properties: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn property(mut self, name: &'a str, value: impl Into<String>) -> Self {
        self.properties.push((name, value.into()));
        self
    }

    pub fn optional_property(self, name: &'a str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.property(name, value),
            None => self,
        }
    }

    pub fn reference(mut self, name: &'a str, target: Uuid) -> Self {
        self.references.push((name, target));
        self
    }
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path.parent().ok_or_else(|| {
            MetadataError::InvalidInput("Database path has no parent directory".to_string())
        })?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "feed-metadata").ok_or_else(|| {
            MetadataError::InvalidInput("Could not determine data directory".to_string())
        })?;
        let db_path = dirs.data_dir().join("metadata.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        schema::run_migrations(&conn).map_err(|e| MetadataError::Migration(format!("{:#}", e)))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MetadataError::LockPoisoned)
    }

    // ============================================================
    // Node operations
    // ============================================================

    /// Create a node together with its initial properties and references.
    pub fn create_node(&self, new_node: NewNode<'_>) -> Result<Node> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let node = insert_node(&tx, &new_node)?;
        tx.commit()?;

        tracing::debug!(id = %node.id, node_type = node.node_type.as_str(), "Created node");
        Ok(node)
    }

    pub fn get_node(&self, id: Uuid) -> Result<Option<Node>> {
        let conn = self.conn()?;
        let node = conn
            .query_row(
                "SELECT id, node_type, parent_id, created_at, modified_at FROM nodes WHERE id = ?",
                [id.to_string()],
                node_from_row,
            )
            .optional()?;
        Ok(node)
    }

    pub fn node_exists(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE id = ?",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_nodes_by_type(&self, node_type: NodeType) -> Result<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, node_type, parent_id, created_at, modified_at
             FROM nodes WHERE node_type = ? ORDER BY rowid",
        )?;
        let nodes = stmt
            .query_map([node_type.as_str()], node_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Structural children of a node, in creation order.
    pub fn get_children(&self, parent_id: Uuid, node_type: NodeType) -> Result<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, node_type, parent_id, created_at, modified_at
             FROM nodes WHERE parent_id = ? AND node_type = ? ORDER BY rowid",
        )?;
        let nodes = stmt
            .query_map((parent_id.to_string(), node_type.as_str()), node_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Replace the child node linked from `parent_id` through the reference `link`.
    ///
    /// The previous child (if any) is deleted, the new one created and linked,
    /// all in one transaction.
    pub fn replace_child_node(
        &self,
        parent_id: Uuid,
        link: &str,
        child: NewNode<'_>,
    ) -> Result<Node> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT target_id FROM node_references WHERE node_id = ? AND name = ?",
                (parent_id.to_string(), link),
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = existing {
            tx.execute("DELETE FROM nodes WHERE id = ?", [existing])?;
        }

        let node = insert_node(&tx, &child)?;
        tx.execute(
            "INSERT INTO node_references (node_id, name, target_id) VALUES (?, ?, ?)
             ON CONFLICT (node_id, name) DO UPDATE SET target_id = excluded.target_id",
            (parent_id.to_string(), link, node.id.to_string()),
        )?;
        touch(&tx, parent_id)?;
        tx.commit()?;

        Ok(node)
    }

    // ============================================================
    // Scalar property operations
    // ============================================================

    pub fn get_property(&self, node_id: Uuid, name: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM node_properties WHERE node_id = ? AND name = ?",
                (node_id.to_string(), name),
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Set a scalar property. `None` removes it.
    pub fn set_property(&self, node_id: Uuid, name: &str, value: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        write_property(&conn, node_id, name, value)?;
        touch(&conn, node_id)?;
        Ok(())
    }

    /// Set several scalar properties in one transaction.
    pub fn set_properties(&self, node_id: Uuid, values: &[(&str, Option<&str>)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (name, value) in values {
            write_property(&tx, node_id, name, *value)?;
        }
        touch(&tx, node_id)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_typed<T: PropertyValue>(
        &self,
        node_id: Uuid,
        property: Property<T>,
    ) -> Result<Option<T>> {
        match self.get_property(node_id, property.name)? {
            None => Ok(None),
            Some(raw) => T::from_property(&raw).map(Some).ok_or_else(|| {
                MetadataError::InvalidInput(format!(
                    "Property {} on node {} holds unreadable value {:?}",
                    property.name, node_id, raw
                ))
            }),
        }
    }

    pub fn set_typed<T: PropertyValue>(
        &self,
        node_id: Uuid,
        property: Property<T>,
        value: Option<&T>,
    ) -> Result<()> {
        let raw = value.map(PropertyValue::to_property);
        self.set_property(node_id, property.name, raw.as_deref())
    }

    // ============================================================
    // Reference operations
    // ============================================================

    pub fn get_reference(&self, node_id: Uuid, name: &str) -> Result<Option<Uuid>> {
        let conn = self.conn()?;
        let target: Option<String> = conn
            .query_row(
                "SELECT target_id FROM node_references WHERE node_id = ? AND name = ?",
                (node_id.to_string(), name),
                |row| row.get(0),
            )
            .optional()?;
        target.map(|t| parse_uuid(&t)).transpose()
    }

    /// Point a reference at `target`. `None` clears it.
    pub fn set_reference(&self, node_id: Uuid, name: &str, target: Option<Uuid>) -> Result<()> {
        let conn = self.conn()?;
        match target {
            Some(target) => {
                conn.execute(
                    "INSERT INTO node_references (node_id, name, target_id) VALUES (?, ?, ?)
                     ON CONFLICT (node_id, name) DO UPDATE SET target_id = excluded.target_id",
                    (node_id.to_string(), name, target.to_string()),
                )?;
            }
            None => {
                conn.execute(
                    "DELETE FROM node_references WHERE node_id = ? AND name = ?",
                    (node_id.to_string(), name),
                )?;
            }
        }
        touch(&conn, node_id)?;
        Ok(())
    }

    /// Nodes that reference `target_id` through the reference `name`.
    pub fn get_referencing_nodes(&self, target_id: Uuid, name: &str) -> Result<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT n.id, n.node_type, n.parent_id, n.created_at, n.modified_at
             FROM node_references r JOIN nodes n ON n.id = r.node_id
             WHERE r.target_id = ? AND r.name = ? ORDER BY n.rowid",
        )?;
        let nodes = stmt
            .query_map((target_id.to_string(), name), node_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    // ============================================================
    // Set property operations
    // ============================================================

    /// Members of a set property, in insertion order.
    pub fn get_set_property(&self, node_id: Uuid, name: &str) -> Result<Vec<Uuid>> {
        let conn = self.conn()?;
        read_set_members(&conn, node_id, name)
    }

    /// The nodes a set property points at, in insertion order.
    pub fn get_referenced_node_set(&self, node_id: Uuid, name: &str) -> Result<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT n.id, n.node_type, n.parent_id, n.created_at, n.modified_at
             FROM node_set_members m JOIN nodes n ON n.id = m.target_id
             WHERE m.node_id = ? AND m.name = ? ORDER BY m.position",
        )?;
        let nodes = stmt
            .query_map((node_id.to_string(), name), node_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    /// Add `target` to a set property. Returns `true` if the set changed.
    pub fn add_to_set_property(&self, node_id: Uuid, name: &str, target: Uuid) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "INSERT OR IGNORE INTO node_set_members (node_id, name, target_id, position)
             VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(position), -1) + 1
                                  FROM node_set_members WHERE node_id = ?1 AND name = ?2))",
            (node_id.to_string(), name, target.to_string()),
        )?;
        if rows > 0 {
            touch(&conn, node_id)?;
        }
        tracing::debug!(node = %node_id, property = name, target = %target, changed = rows > 0, "Add to set property");
        Ok(rows > 0)
    }

    /// Remove `target` from a set property. Returns `true` if the set changed.
    pub fn remove_from_set_property(
        &self,
        node_id: Uuid,
        name: &str,
        target: Uuid,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM node_set_members WHERE node_id = ? AND name = ? AND target_id = ?",
            (node_id.to_string(), name, target.to_string()),
        )?;
        if rows > 0 {
            touch(&conn, node_id)?;
        }
        tracing::debug!(node = %node_id, property = name, target = %target, changed = rows > 0, "Remove from set property");
        Ok(rows > 0)
    }

    /// Rewrite a whole set property.
    ///
    /// Duplicates in `targets` collapse to their first occurrence. The old
    /// members are only gone once every new member has been written; any
    /// failure rolls the property back to its previous contents.
    pub fn replace_set_property(&self, node_id: Uuid, name: &str, targets: &[Uuid]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let members = write_set_members(&tx, node_id, name, targets)?;
        touch(&tx, node_id)?;
        tx.commit()?;

        tracing::debug!(node = %node_id, property = name, members, "Replaced set property");
        Ok(())
    }

    /// Keep only the members of a set property for which `keep` holds.
    ///
    /// Reading the members and rewriting the set happen in one transaction,
    /// so members added concurrently are never lost. Returns `true` if any
    /// member was dropped; otherwise nothing is written.
    pub fn retain_set_property(
        &self,
        node_id: Uuid,
        name: &str,
        keep: impl Fn(&Uuid) -> bool,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let members = read_set_members(&tx, node_id, name)?;
        let retained: Vec<Uuid> = members.iter().copied().filter(|m| keep(m)).collect();
        if retained.len() == members.len() {
            return Ok(false);
        }

        write_set_members(&tx, node_id, name, &retained)?;
        touch(&tx, node_id)?;
        tx.commit()?;

        tracing::debug!(
            node = %node_id,
            property = name,
            removed = members.len() - retained.len(),
            "Retained set property members"
        );
        Ok(true)
    }

    // ============================================================
    // User property operations
    // ============================================================

    pub fn get_user_properties(&self, node_id: Uuid) -> Result<BTreeMap<String, String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, value FROM node_properties WHERE node_id = ? AND name LIKE 'usr:%'",
        )?;
        let props = stmt
            .query_map([node_id.to_string()], |row| {
                let name: String = row.get(0)?;
                let value: String = row.get(1)?;
                Ok((name, value))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(props
            .into_iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(USER_PROPERTY_PREFIX)
                    .map(|n| (n.to_string(), value))
            })
            .collect())
    }

    /// Replace all user properties of a node with `properties`.
    pub fn set_user_properties(
        &self,
        node_id: Uuid,
        properties: &BTreeMap<String, String>,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM node_properties WHERE node_id = ? AND name LIKE 'usr:%'",
            [node_id.to_string()],
        )?;
        for (name, value) in properties {
            let name = format!("{}{}", USER_PROPERTY_PREFIX, name);
            write_property(&tx, node_id, &name, Some(value.as_str()))?;
        }

        touch(&tx, node_id)?;
        tx.commit()?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn insert_node(conn: &Connection, new_node: &NewNode<'_>) -> Result<Node> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO nodes (id, node_type, parent_id, created_at, modified_at)
         VALUES (?, ?, ?, ?, ?)",
        (
            id.to_string(),
            new_node.node_type.as_str(),
            new_node.parent_id.map(|p| p.to_string()),
            now.to_rfc3339(),
            now.to_rfc3339(),
        ),
    )?;

    for (name, value) in &new_node.properties {
        write_property(conn, id, name, Some(value.as_str()))?;
    }
    for (name, target) in &new_node.references {
        conn.execute(
            "INSERT INTO node_references (node_id, name, target_id) VALUES (?, ?, ?)",
            (id.to_string(), *name, target.to_string()),
        )?;
    }

    Ok(Node {
        id,
        node_type: new_node.node_type,
        parent_id: new_node.parent_id,
        created_at: now,
        modified_at: now,
    })
}

fn read_set_members(conn: &Connection, node_id: Uuid, name: &str) -> Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT target_id FROM node_set_members
         WHERE node_id = ? AND name = ? ORDER BY position",
    )?;
    let ids = stmt
        .query_map((node_id.to_string(), name), |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    ids.iter().map(|id| parse_uuid(id)).collect()
}

/// Replace the members of a set property, deduplicating in order. Returns
/// the number of members written.
fn write_set_members(conn: &Connection, node_id: Uuid, name: &str, targets: &[Uuid]) -> Result<usize> {
    conn.execute(
        "DELETE FROM node_set_members WHERE node_id = ? AND name = ?",
        (node_id.to_string(), name),
    )?;

    let mut seen = HashSet::new();
    for target in targets {
        if !seen.insert(*target) {
            continue;
        }
        conn.execute(
            "INSERT INTO node_set_members (node_id, name, target_id, position) VALUES (?, ?, ?, ?)",
            (node_id.to_string(), name, target.to_string(), seen.len() as i64 - 1),
        )?;
    }
    Ok(seen.len())
}

fn write_property(conn: &Connection, node_id: Uuid, name: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => {
            conn.execute(
                "INSERT INTO node_properties (node_id, name, value) VALUES (?, ?, ?)
                 ON CONFLICT (node_id, name) DO UPDATE SET value = excluded.value",
                (node_id.to_string(), name, value),
            )?;
        }
        None => {
            conn.execute(
                "DELETE FROM node_properties WHERE node_id = ? AND name = ?",
                (node_id.to_string(), name),
            )?;
        }
    }
    Ok(())
}

fn touch(conn: &Connection, node_id: Uuid) -> Result<()> {
    conn.execute(
        "UPDATE nodes SET modified_at = ? WHERE id = ?",
        (Utc::now().to_rfc3339(), node_id.to_string()),
    )?;
    Ok(())
}

fn node_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Node> {
    let id: String = row.get(0)?;
    let node_type: String = row.get(1)?;
    let parent_id: Option<String> = row.get(2)?;
    let created_at: String = row.get(3)?;
    let modified_at: String = row.get(4)?;

    Ok(Node {
        id: column_uuid(0, &id)?,
        node_type: NodeType::from_str(&node_type).ok_or_else(|| {
            conversion_failure(1, format!("Unknown node type {}", node_type))
        })?,
        parent_id: parent_id.map(|p| column_uuid(2, &p)).transpose()?,
        created_at: column_datetime(3, &created_at)?,
        modified_at: column_datetime(4, &modified_at)?,
    })
}

fn conversion_failure(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn column_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion_failure(idx, e.to_string()))
}

fn column_datetime(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_failure(idx, e.to_string()))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|e| MetadataError::InvalidInput(format!("Stored id {:?} is not a UUID: {}", s, e)))
}
