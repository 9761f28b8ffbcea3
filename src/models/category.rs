use serde::{Deserialize, Serialize};

/// Input for creating a category.
///
/// Categories are the namespace feeds live under; a feed's qualified name is
/// `<category>.<feed>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryInput {
    pub system_name: String,
    /// Display title. Defaults to the system name if not specified.
    pub title: Option<String>,
    pub description: Option<String>,
}

impl CreateCategoryInput {
    pub fn named(system_name: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            title: None,
            description: None,
        }
    }
}
