use crate::db::{Database, NewNode};
use crate::error::Result;
use crate::models::{CreateSecurityGroupInput, Node, NodeType, Property};

use super::{Entity, DESCRIPTION, SYSTEM_NAME};

pub const GROUP_ID: Property<String> = Property::new("tba:groupId");

/// An access-control group attached to feeds.
#[derive(Clone)]
pub struct SecurityGroup {
    db: Database,
    node: Node,
}

impl Entity for SecurityGroup {
    const NODE_TYPE: NodeType = NodeType::SecurityGroup;

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

impl SecurityGroup {
    pub fn create(db: &Database, input: CreateSecurityGroupInput) -> Result<Self> {
        let node = db.create_node(
            NewNode::new(NodeType::SecurityGroup, None)
                .property(SYSTEM_NAME.name, input.name)
                .optional_property(GROUP_ID.name, input.group_id)
                .optional_property(DESCRIPTION.name, input.description),
        )?;
        Ok(Self::from_node(db, node))
    }

    pub fn group_id(&self) -> Result<Option<String>> {
        self.db.get_typed(self.node.id, GROUP_ID)
    }
}
