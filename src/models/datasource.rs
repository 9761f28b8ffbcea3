use serde::{Deserialize, Serialize};

/// Input for registering a datasource that feeds read from or write to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatasourceInput {
    pub name: String,
    pub description: Option<String>,
}

/// Input for registering a feed template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateInput {
    pub name: String,
    pub description: Option<String>,
}
