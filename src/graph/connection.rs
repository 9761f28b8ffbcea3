use uuid::Uuid;

use crate::db::{Database, NewNode};
use crate::error::Result;
use crate::models::{CreateDatasourceInput, Node, NodeType, Reference};

use super::{referenced, Entity, Feed, DESCRIPTION, SYSTEM_NAME};

/// Reference from a feed source/destination to its datasource.
pub const DATASOURCE: Reference = Reference::new("tba:datasource", NodeType::Datasource);

/// An external system a feed reads from or writes to.
#[derive(Clone)]
pub struct Datasource {
    db: Database,
    node: Node,
}

impl Entity for Datasource {
    const NODE_TYPE: NodeType = NodeType::Datasource;

    fn from_node(db: &Database, node: Node) -> Self {
        Self {
            db: db.clone(),
            node,
        }
    }

    fn node(&self) -> &Node {
        &self.node
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

impl Datasource {
    pub fn create(db: &Database, input: CreateDatasourceInput) -> Result<Self> {
        let node = db.create_node(
            NewNode::new(NodeType::Datasource, None)
                .property(SYSTEM_NAME.name, input.name)
                .optional_property(DESCRIPTION.name, input.description),
        )?;
        Ok(Self::from_node(db, node))
    }
}

/// Whether `node_id` references the datasource `datasource_id`.
pub(crate) fn is_referencing_datasource(
    db: &Database,
    node_id: Uuid,
    datasource_id: Uuid,
) -> Result<bool> {
    Ok(db.get_reference(node_id, DATASOURCE.name)? == Some(datasource_id))
}

/// A feed's inbound connection to a datasource. Lives under its feed node.
#[derive(Clone)]
pub struct FeedSource {
    db: Database,
    node: Node,
}

impl Entity for FeedSource {
    const NODE_TYPE: NodeType = NodeType::FeedSource;

    fn from_node(db: &Database, node: Node) -> Self {
        Self {
            db: db.clone(),
            node,
        }
    }

    fn node(&self) -> &Node {
        &self.node
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

impl FeedSource {
    pub fn datasource(&self) -> Result<Option<Datasource>> {
        referenced(&self.db, self.node.id, DATASOURCE)
    }

    pub fn feed(&self) -> Result<Option<Feed>> {
        match self.node.parent_id {
            Some(parent_id) => Feed::get(&self.db, parent_id),
            None => Ok(None),
        }
    }
}

/// A feed's outbound connection to a datasource. Lives under its feed node.
#[derive(Clone)]
pub struct FeedDestination {
    db: Database,
    node: Node,
}

impl Entity for FeedDestination {
    const NODE_TYPE: NodeType = NodeType::FeedDestination;

    fn from_node(db: &Database, node: Node) -> Self {
        Self {
            db: db.clone(),
            node,
        }
    }

    fn node(&self) -> &Node {
        &self.node
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

impl FeedDestination {
    pub fn datasource(&self) -> Result<Option<Datasource>> {
        referenced(&self.db, self.node.id, DATASOURCE)
    }

    pub fn feed(&self) -> Result<Option<Feed>> {
        match self.node.parent_id {
            Some(parent_id) => Feed::get(&self.db, parent_id),
            None => Ok(None),
        }
    }
}
