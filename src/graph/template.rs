use crate::db::{Database, NewNode};
use crate::error::Result;
use crate::models::{CreateTemplateInput, Node, NodeType};

use super::{Entity, Feed, DESCRIPTION, SYSTEM_NAME, TEMPLATE};

/// The template a feed was provisioned from.
#[derive(Clone)]
pub struct FeedTemplate {
    db: Database,
    node: Node,
}

impl Entity for FeedTemplate {
    const NODE_TYPE: NodeType = NodeType::FeedTemplate;

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

impl FeedTemplate {
    pub fn create(db: &Database, input: CreateTemplateInput) -> Result<Self> {
        let node = db.create_node(
            NewNode::new(NodeType::FeedTemplate, None)
                .property(SYSTEM_NAME.name, input.name)
                .optional_property(DESCRIPTION.name, input.description),
        )?;
        Ok(Self::from_node(db, node))
    }

    /// Feeds provisioned from this template, in creation order.
    pub fn feeds(&self) -> Result<Vec<Feed>> {
        Ok(self
            .db
            .get_referencing_nodes(self.node.id, TEMPLATE.name)?
            .into_iter()
            .filter(|node| node.node_type == NodeType::Feed)
            .map(|node| Feed::from_node(&self.db, node))
            .collect())
    }
}
