use crate::db::{Database, NewNode};
use crate::error::Result;
use crate::models::{CreateSlaInput, Node, NodeType, Property, Reference};

use super::{referenced, Entity, Feed, DESCRIPTION, SYSTEM_NAME};

/// Opaque JSON payload of an SLA.
pub const PAYLOAD: Property<String> = Property::new("tba:payload");

/// Reference from a precondition to the SLA that gates its feed.
pub const PRECONDITION_SLA: Reference = Reference::new("tba:sla", NodeType::Sla);

/// A service level agreement that feeds may reference.
///
/// SLAs outlive any single feed; removing a feed's reference leaves the SLA
/// node untouched.
#[derive(Clone)]
pub struct ServiceLevelAgreement {
    db: Database,
    node: Node,
}

impl Entity for ServiceLevelAgreement {
    const NODE_TYPE: NodeType = NodeType::Sla;

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

impl ServiceLevelAgreement {
    pub fn create(db: &Database, input: CreateSlaInput) -> Result<Self> {
        let payload = serde_json::to_string(&input.payload)?;
        let node = db.create_node(
            NewNode::new(NodeType::Sla, None)
                .property(SYSTEM_NAME.name, input.name)
                .optional_property(DESCRIPTION.name, input.description)
                .property(PAYLOAD.name, payload),
        )?;
        Ok(Self::from_node(db, node))
    }

    pub fn payload(&self) -> Result<serde_json::Value> {
        match self.db.get_typed(self.node.id, PAYLOAD)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(serde_json::Value::Null),
        }
    }
}

/// The condition that must hold before a feed runs, expressed as an SLA.
#[derive(Clone)]
pub struct FeedPrecondition {
    db: Database,
    node: Node,
}

impl Entity for FeedPrecondition {
    const NODE_TYPE: NodeType = NodeType::FeedPrecondition;

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

impl FeedPrecondition {
    pub fn service_level_agreement(&self) -> Result<Option<ServiceLevelAgreement>> {
        referenced(&self.db, self.node.id, PRECONDITION_SLA)
    }

    pub fn feed(&self) -> Result<Option<Feed>> {
        match self.node.parent_id {
            Some(parent_id) => Feed::get(&self.db, parent_id),
            None => Ok(None),
        }
    }
}
