use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A node in the metadata graph.
///
/// Nodes carry no domain data themselves; scalar properties, references and
/// set properties hang off the node id in the store. `parent_id` is the
/// structural parent (a feed lives under its category, a feed source under
/// its feed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub node_type: NodeType,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// The kind of entity a node represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Feed,
    Category,
    FeedSource,
    FeedDestination,
    Datasource,
    FeedTemplate,
    FeedPrecondition,
    Sla,
    SecurityGroup,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Category => "category",
            Self::FeedSource => "feed_source",
            Self::FeedDestination => "feed_destination",
            Self::Datasource => "datasource",
            Self::FeedTemplate => "feed_template",
            Self::FeedPrecondition => "feed_precondition",
            Self::Sla => "sla",
            Self::SecurityGroup => "security_group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(Self::Feed),
            "category" => Some(Self::Category),
            "feed_source" => Some(Self::FeedSource),
            "feed_destination" => Some(Self::FeedDestination),
            "datasource" => Some(Self::Datasource),
            "feed_template" => Some(Self::FeedTemplate),
            "feed_precondition" => Some(Self::FeedPrecondition),
            "sla" => Some(Self::Sla),
            "security_group" => Some(Self::SecurityGroup),
            _ => None,
        }
    }
}

/// A value that can be stored in a scalar node property.
pub trait PropertyValue: Sized {
    fn to_property(&self) -> String;
    fn from_property(raw: &str) -> Option<Self>;
}

impl PropertyValue for String {
    fn to_property(&self) -> String {
        self.clone()
    }

    fn from_property(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl PropertyValue for bool {
    fn to_property(&self) -> String {
        self.to_string()
    }

    fn from_property(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl PropertyValue for i64 {
    fn to_property(&self) -> String {
        self.to_string()
    }

    fn from_property(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

/// A typed scalar property name.
///
/// Each entity kind declares its properties as constants, so the value type
/// of a property is fixed at the declaration instead of at every call site.
#[derive(Debug)]
pub struct Property<T> {
    pub name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Property<T> {}

/// A single-valued reference to another node of a known type.
#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub name: &'static str,
    pub target: NodeType,
}

impl Reference {
    pub const fn new(name: &'static str, target: NodeType) -> Self {
        Self { name, target }
    }
}

/// A deduplicated, insertion-ordered set of references to nodes of a known type.
#[derive(Debug, Clone, Copy)]
pub struct SetProperty {
    pub name: &'static str,
    pub target: NodeType,
}

impl SetProperty {
    pub const fn new(name: &'static str, target: NodeType) -> Self {
        Self { name, target }
    }
}
