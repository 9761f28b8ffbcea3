use crate::db::{Database, NewNode};
use crate::error::{MetadataError, Result};
use crate::models::{CreateCategoryInput, Node, NodeType};

use super::feed::CATEGORY;
use super::{referenced, Entity, Feed, DESCRIPTION, SYSTEM_NAME, TITLE};

/// A namespace grouping feeds.
///
/// Feeds are created as children of their category and also reference it.
#[derive(Clone)]
pub struct Category {
    db: Database,
    node: Node,
}

impl Entity for Category {
    const NODE_TYPE: NodeType = NodeType::Category;

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

impl Category {
    pub fn create(db: &Database, input: CreateCategoryInput) -> Result<Self> {
        let title = input.title.unwrap_or_else(|| input.system_name.clone());
        let node = db.create_node(
            NewNode::new(NodeType::Category, None)
                .property(SYSTEM_NAME.name, input.system_name)
                .property(TITLE.name, title)
                .optional_property(DESCRIPTION.name, input.description),
        )?;
        Ok(Self::from_node(db, node))
    }

    /// The category's system name, or an empty string for unnamed legacy nodes.
    pub fn name(&self) -> Result<String> {
        Ok(self.system_name()?.unwrap_or_default())
    }

    /// Feeds created under this category.
    pub fn feeds(&self) -> Result<Vec<Feed>> {
        Ok(self
            .db
            .get_children(self.node.id, NodeType::Feed)?
            .into_iter()
            .map(|node| Feed::from_node(&self.db, node))
            .collect())
    }
}

/// One way of finding a feed's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryResolution {
    /// The feed's explicit `tba:category` reference.
    DirectReference,
    /// The feed node's structural parent. Older feed records only have this.
    StructuralParent,
}

/// Strategies tried, in order, when resolving a feed's category.
pub const CATEGORY_RESOLUTION_ORDER: [CategoryResolution; 2] = [
    CategoryResolution::DirectReference,
    CategoryResolution::StructuralParent,
];

impl CategoryResolution {
    /// Try this strategy. `Ok(None)` means the strategy found nothing usable
    /// (missing, or not a category node); store failures are errors.
    pub fn resolve(&self, db: &Database, feed_node: &Node) -> Result<Option<Category>> {
        match self {
            Self::DirectReference => referenced(db, feed_node.id, CATEGORY),
            Self::StructuralParent => match feed_node.parent_id {
                Some(parent_id) => Category::get(db, parent_id),
                None => Ok(None),
            },
        }
    }
}

/// Resolve the category of a feed node through [`CATEGORY_RESOLUTION_ORDER`].
pub fn resolve_category(db: &Database, feed_node: &Node) -> Result<Category> {
    for strategy in CATEGORY_RESOLUTION_ORDER {
        if let Some(category) = strategy.resolve(db, feed_node)? {
            if strategy != CategoryResolution::DirectReference {
                tracing::debug!(feed = %feed_node.id, ?strategy, "Resolved category through fallback");
            }
            return Ok(category);
        }
    }

    Err(MetadataError::CategoryNotFound {
        feed: feed_node.id.to_string(),
    })
}
