//! Typed entity views over the node store.
//!
//! Each view wraps one [`Node`] and a handle to the [`Database`] it lives in.
//! Views never cache property values; every accessor reads through to the
//! store, and every mutator is one store operation (or one transaction).
//!
//! # Entities
//!
//! - [`Feed`]: a schedulable pipeline, the hub of the graph.
//! - [`Category`]: the namespace a feed belongs to.
//! - [`FeedSource`] / [`FeedDestination`]: the feed's connections to [`Datasource`]s.
//! - [`ServiceLevelAgreement`], [`SecurityGroup`], [`FeedTemplate`]: shared
//!   objects referenced from feeds.
//! - [`FeedPrecondition`]: the feed-owned node gating a feed on an SLA.

mod category;
mod connection;
mod feed;
mod security_group;
mod sla;
mod template;

pub use category::*;
pub use connection::*;
pub use feed::*;
pub use security_group::*;
pub use sla::*;
pub use template::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{MetadataError, Result};
use crate::models::{Node, NodeType, Property, Reference, SetProperty};

pub const SYSTEM_NAME: Property<String> = Property::new("tba:systemName");
pub const TITLE: Property<String> = Property::new("tba:title");
pub const DESCRIPTION: Property<String> = Property::new("tba:description");

/// A typed view over a node of one [`NodeType`].
pub trait Entity: Sized {
    const NODE_TYPE: NodeType;

    fn from_node(db: &Database, node: Node) -> Self;

    fn node(&self) -> &Node;

    fn db(&self) -> &Database;

    fn id(&self) -> Uuid {
        self.node().id
    }

    /// Load the entity with `id`. Absent or differently typed nodes yield `None`.
    fn get(db: &Database, id: Uuid) -> Result<Option<Self>> {
        Ok(db
            .get_node(id)?
            .filter(|node| node.node_type == Self::NODE_TYPE)
            .map(|node| Self::from_node(db, node)))
    }

    /// Load the entity with `id`, failing with `NotFound` if it is absent.
    fn require(db: &Database, id: Uuid) -> Result<Self> {
        Self::get(db, id)?.ok_or_else(|| MetadataError::not_found(Self::NODE_TYPE.as_str(), id))
    }

    fn list(db: &Database) -> Result<Vec<Self>> {
        Ok(db
            .get_nodes_by_type(Self::NODE_TYPE)?
            .into_iter()
            .map(|node| Self::from_node(db, node))
            .collect())
    }

    fn system_name(&self) -> Result<Option<String>> {
        self.db().get_typed(self.id(), SYSTEM_NAME)
    }

    fn set_system_name(&self, name: &str) -> Result<()> {
        self.db()
            .set_typed(self.id(), SYSTEM_NAME, Some(&name.to_string()))
    }

    fn title(&self) -> Result<Option<String>> {
        self.db().get_typed(self.id(), TITLE)
    }

    fn set_title(&self, title: &str) -> Result<()> {
        self.db().set_typed(self.id(), TITLE, Some(&title.to_string()))
    }

    fn description(&self) -> Result<Option<String>> {
        self.db().get_typed(self.id(), DESCRIPTION)
    }

    fn set_description(&self, description: Option<&str>) -> Result<()> {
        self.db().set_property(self.id(), DESCRIPTION.name, description)
    }

    fn created_time(&self) -> DateTime<Utc> {
        self.node().created_at
    }

    /// Last modification time, read fresh from the store.
    fn modified_time(&self) -> Result<DateTime<Utc>> {
        Ok(self
            .db()
            .get_node(self.id())?
            .map(|node| node.modified_at)
            .unwrap_or(self.node().modified_at))
    }
}

/// Resolve a single reference to a typed entity.
pub(crate) fn referenced<E: Entity>(
    db: &Database,
    node_id: Uuid,
    reference: Reference,
) -> Result<Option<E>> {
    debug_assert_eq!(reference.target, E::NODE_TYPE);
    match db.get_reference(node_id, reference.name)? {
        Some(target) => E::get(db, target),
        None => Ok(None),
    }
}

/// Resolve every member of a set property to a typed entity, in set order.
pub(crate) fn referenced_set<E: Entity>(
    db: &Database,
    node_id: Uuid,
    set: SetProperty,
) -> Result<Vec<E>> {
    debug_assert_eq!(set.target, E::NODE_TYPE);
    Ok(db
        .get_referenced_node_set(node_id, set.name)?
        .into_iter()
        .filter(|node| node.node_type == E::NODE_TYPE)
        .map(|node| E::from_node(db, node))
        .collect())
}
