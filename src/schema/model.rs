use serde::{Deserialize, Serialize};

use super::derive::DerivedSchema;

fn default_true() -> bool {
    true
}

/// A column of a table schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    pub data_type: String,
    /// Precision/scale or length, e.g. `10,2` for `decimal(10,2)`.
    #[serde(default)]
    pub precision_scale: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Column records the row creation time.
    #[serde(default)]
    pub created_tracker: bool,
    /// Column records the row modification time.
    #[serde(default)]
    pub updated_tracker: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            precision_scale: None,
            description: None,
            nullable: true,
            primary_key: false,
            created_tracker: false,
            updated_tracker: false,
        }
    }

    /// The data type with its precision/scale applied where the type takes one.
    pub fn derived_data_type(&self) -> String {
        let takes_precision = matches!(
            self.data_type.to_ascii_lowercase().as_str(),
            "decimal" | "varchar" | "char"
        );
        match self.precision_scale.as_deref().map(str::trim) {
            Some(ps) if takes_precision && !ps.is_empty() => {
                format!("{}({})", self.data_type, ps)
            }
            _ => self.data_type.clone(),
        }
    }

    /// `name|type|description|pk|created|updated`, the column spec consumed
    /// by the table-creation step. Description newlines become spaces.
    pub fn as_field_structure(&self) -> String {
        let description = self
            .description
            .as_deref()
            .unwrap_or("")
            .replace("\r\n", " ")
            .replace(['\n', '\r'], " ");
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.name,
            self.derived_data_type(),
            description,
            flag(self.primary_key),
            flag(self.created_tracker),
            flag(self.updated_tracker)
        )
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// An ordered list of fields describing a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// How a partition column is computed from its source field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartitionFormula {
    Val,
    Year,
    Month,
    Day,
    Hour,
    ToDate,
}

impl PartitionFormula {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Val => "val",
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::ToDate => "to_date",
        }
    }
}

/// A partition column of the destination table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartitionField {
    #[serde(default)]
    pub position: i32,
    /// Name of the partition column.
    pub field: String,
    pub formula: PartitionFormula,
    pub source_field: String,
    #[serde(default)]
    pub source_data_type: Option<String>,
}

impl PartitionField {
    /// Type of the partition column. `val` partitions keep the source type.
    pub fn data_type(&self) -> String {
        match self.formula {
            PartitionFormula::Val => self
                .source_data_type
                .clone()
                .unwrap_or_else(|| "string".to_string()),
            PartitionFormula::Year
            | PartitionFormula::Month
            | PartitionFormula::Day
            | PartitionFormula::Hour => "int".to_string(),
            PartitionFormula::ToDate => "date".to_string(),
        }
    }

    /// Expression computing the partition value from the source row.
    pub fn formula_expression(&self) -> String {
        match self.formula {
            PartitionFormula::Val => self.source_field.clone(),
            formula => format!("{}({})", formula.as_str(), self.source_field),
        }
    }

    /// `column|type`
    pub fn as_partition_structure(&self) -> String {
        format!("{}|{}", self.field, self.data_type())
    }

    /// `column|type|expression`
    pub fn as_partition_spec(&self) -> String {
        format!(
            "{}|{}|{}",
            self.field,
            self.data_type(),
            self.formula_expression()
        )
    }
}

/// Standardization, validation and profiling settings for one destination
/// field. Policies correspond to fields by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldPolicy {
    #[serde(default)]
    pub field_name: Option<String>,
    #[serde(default)]
    pub feed_field_name: Option<String>,
    #[serde(default)]
    pub partition_column: bool,
    #[serde(default)]
    pub profile: bool,
    /// Field is pushed to the search index.
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub domain_type_id: Option<String>,
    #[serde(default)]
    pub standardization: Vec<serde_json::Value>,
    #[serde(default)]
    pub validation: Vec<serde_json::Value>,
}

/// Storage options for the destination table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableOptions {
    /// `NONE`, `SNAPPY`, `ZLIB`, `GZIP`, ...
    #[serde(default)]
    pub compression_format: Option<String>,
    #[serde(default)]
    pub audit_logging: bool,
}

/// Strategy for merging a batch into the destination table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    Sync,
    Merge,
    DedupeAndMerge,
    PkMerge,
    RollingSync,
}

/// The structured table model of a feed.
///
/// This is the source of truth; [`TableSetup::derived`] is regenerated from it
/// by [`TableSetup::update_metadata_field_values`] and must not be edited on
/// its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableSetup {
    #[serde(default)]
    pub table_schema: Option<TableSchema>,
    #[serde(default)]
    pub source_table_schema: Option<TableSchema>,
    /// Ingest method, e.g. `FILE` or `DATABASE`.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub field_policies: Option<Vec<FieldPolicy>>,
    #[serde(default)]
    pub partitions: Option<Vec<PartitionField>>,
    #[serde(default)]
    pub table_type: Option<String>,
    #[serde(default)]
    pub incremental_date_field: Option<String>,
    /// Source field used when incrementally querying table data.
    #[serde(default)]
    pub source_table_incremental_date_field: Option<String>,
    #[serde(default)]
    pub options: Option<TableOptions>,
    /// Row format of the feed table, e.g.
    /// `ROW FORMAT DELIMITED FIELDS TERMINATED BY ',' STORED AS TEXTFILE`.
    #[serde(default)]
    pub feed_format: Option<String>,
    /// `STORED AS PARQUET` or `STORED AS ORC`.
    #[serde(default)]
    pub target_format: Option<String>,
    #[serde(default)]
    pub target_merge_strategy: Option<MergeStrategy>,
    #[serde(default)]
    pub derived: DerivedSchema,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_field_structure() {
        let mut field = Field::new("amount", "decimal");
        field.precision_scale = Some("10,2".to_string());
        field.primary_key = true;
        field.description = Some("Order\ntotal".to_string());
        assert_eq!(field.as_field_structure(), "amount|decimal(10,2)|Order total|1|0|0");
    }

    #[test]
    fn test_precision_ignored_for_other_types() {
        let mut field = Field::new("id", "int");
        field.precision_scale = Some("10".to_string());
        assert_eq!(field.derived_data_type(), "int");
    }

    #[test]
    fn test_partition_representations() {
        let year = PartitionField {
            position: 0,
            field: "order_date_year".to_string(),
            formula: PartitionFormula::Year,
            source_field: "order_date".to_string(),
            source_data_type: Some("timestamp".to_string()),
        };
        assert_eq!(year.as_partition_structure(), "order_date_year|int");
        assert_eq!(
            year.as_partition_spec(),
            "order_date_year|int|year(order_date)"
        );

        let region = PartitionField {
            position: 1,
            field: "region_part".to_string(),
            formula: PartitionFormula::Val,
            source_field: "region".to_string(),
            source_data_type: Some("string".to_string()),
        };
        assert_eq!(region.as_partition_spec(), "region_part|string|region");
    }

    #[test]
    fn test_field_nullable_defaults_to_true() {
        let field: Field =
            serde_json::from_str(r#"{"name": "id", "dataType": "int"}"#).unwrap();
        assert!(field.nullable);
        assert!(!field.primary_key);
    }
}
