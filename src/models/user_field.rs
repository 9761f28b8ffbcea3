use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Describes one user-defined property that may be attached to a feed.
///
/// The metadata layer persists user properties as given; descriptors only
/// shape them. Callers that want enforcement run [`UserFieldDescriptor::validate`]
/// before calling `set_user_properties`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserFieldDescriptor {
    pub system_name: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub field_type: UserFieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum UserFieldType {
    String,
    Number,
    Boolean,
}

/// A reason a user property map does not satisfy its descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFieldViolation {
    MissingRequired(String),
    InvalidValue { field: String, value: String },
}

impl UserFieldDescriptor {
    pub fn new(system_name: impl Into<String>, field_type: UserFieldType) -> Self {
        Self {
            system_name: system_name.into(),
            display_name: None,
            description: None,
            field_type,
            required: false,
            order: 0,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check a user property map against a set of descriptors.
    ///
    /// Properties without a matching descriptor are accepted as-is.
    pub fn validate(
        descriptors: &BTreeSet<UserFieldDescriptor>,
        properties: &BTreeMap<String, String>,
    ) -> Vec<UserFieldViolation> {
        let mut violations = Vec::new();
        for descriptor in descriptors {
            match properties.get(&descriptor.system_name) {
                None => {
                    if descriptor.required {
                        violations.push(UserFieldViolation::MissingRequired(
                            descriptor.system_name.clone(),
                        ));
                    }
                }
                Some(value) if value.trim().is_empty() && descriptor.required => {
                    violations.push(UserFieldViolation::MissingRequired(
                        descriptor.system_name.clone(),
                    ));
                }
                Some(value) => {
                    let valid = match descriptor.field_type {
                        UserFieldType::String => true,
                        UserFieldType::Number => {
                            value.trim().is_empty() || value.trim().parse::<f64>().is_ok()
                        }
                        UserFieldType::Boolean => {
                            value.trim().is_empty() || value.trim().parse::<bool>().is_ok()
                        }
                    };
                    if !valid {
                        violations.push(UserFieldViolation::InvalidValue {
                            field: descriptor.system_name.clone(),
                            value: value.clone(),
                        });
                    }
                }
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> BTreeSet<UserFieldDescriptor> {
        [
            UserFieldDescriptor::new("owner", UserFieldType::String).required(),
            UserFieldDescriptor::new("retention_days", UserFieldType::Number),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_missing_required_field() {
        let props = BTreeMap::from([("retention_days".to_string(), "30".to_string())]);
        let violations = UserFieldDescriptor::validate(&descriptors(), &props);
        assert_eq!(
            violations,
            vec![UserFieldViolation::MissingRequired("owner".to_string())]
        );
    }

    #[test]
    fn test_invalid_number() {
        let props = BTreeMap::from([
            ("owner".to_string(), "etl-team".to_string()),
            ("retention_days".to_string(), "forever".to_string()),
        ]);
        let violations = UserFieldDescriptor::validate(&descriptors(), &props);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            &violations[0],
            UserFieldViolation::InvalidValue { field, .. } if field == "retention_days"
        ));
    }

    #[test]
    fn test_undescribed_properties_are_accepted() {
        let props = BTreeMap::from([
            ("owner".to_string(), "etl-team".to_string()),
            ("anything".to_string(), "goes".to_string()),
        ]);
        assert!(UserFieldDescriptor::validate(&descriptors(), &props).is_empty());
    }
}
