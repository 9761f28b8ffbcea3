//! Derivation of DDL fragments from a [`TableSetup`].
//!
//! Every function here is pure and order-preserving; the same model always
//! yields byte-identical strings.

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::escape::{escape_java, unescape_java};
use super::model::{FieldPolicy, PartitionField, TableOptions, TableSchema, TableSetup};

/// The strings downstream tooling consumes, regenerated from the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSchema {
    /// Partition columns as `column|type`, one per line.
    pub partition_structure: String,
    /// Destination columns as field structures, one per line.
    pub field_structure: String,
    /// Destination field names, one per line.
    pub fields_string: String,
    pub nullable_fields: String,
    pub primary_key_fields: String,
    /// Source field names, one per line.
    pub source_fields: String,
    /// Comma-separated names of fields pushed to the search index.
    pub field_index_string: String,
    /// Partition columns as `column|type|expression`, one per line.
    pub partition_specs: String,
    pub field_policies_json: String,
    pub target_tbl_properties: String,
    /// Escaped row format; `None` when the model has none.
    pub feed_format: Option<String>,
}

/// Append `value`, preceded by `separator` once the buffer holds non-blank text.
fn append_separated(buf: &mut String, value: &str, separator: &str) {
    if !buf.trim().is_empty() {
        buf.push_str(separator);
    }
    buf.push_str(value);
}

fn join_separated<'a>(values: impl IntoIterator<Item = &'a str>, separator: &str) -> String {
    let mut buf = String::new();
    for value in values {
        append_separated(&mut buf, value, separator);
    }
    buf
}

pub fn partition_structure(partitions: Option<&[PartitionField]>) -> String {
    let lines: Vec<String> = partitions
        .unwrap_or_default()
        .iter()
        .map(PartitionField::as_partition_structure)
        .collect();
    join_separated(lines.iter().map(String::as_str), "\n")
}

pub fn partition_specs(partitions: Option<&[PartitionField]>) -> String {
    let lines: Vec<String> = partitions
        .unwrap_or_default()
        .iter()
        .map(PartitionField::as_partition_spec)
        .collect();
    join_separated(lines.iter().map(String::as_str), "\n")
}

pub fn field_structure(schema: Option<&TableSchema>) -> String {
    let lines: Vec<String> = schema
        .map(|s| s.fields.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|f| f.as_field_structure())
        .collect();
    join_separated(lines.iter().map(String::as_str), "\n")
}

/// Field names, nullable field names and primary key names of a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldStrings {
    pub fields: String,
    pub nullable: String,
    pub primary_keys: String,
}

pub fn field_strings(schema: Option<&TableSchema>) -> FieldStrings {
    let mut strings = FieldStrings::default();
    for field in schema.map(|s| s.fields.as_slice()).unwrap_or_default() {
        append_separated(&mut strings.fields, &field.name, "\n");
        if field.nullable {
            append_separated(&mut strings.nullable, &field.name, ",");
        }
        if field.primary_key {
            append_separated(&mut strings.primary_keys, &field.name, ",");
        }
    }
    strings
}

pub fn source_fields(schema: Option<&TableSchema>) -> String {
    join_separated(
        schema
            .map(|s| s.fields.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|f| f.name.as_str()),
        "\n",
    )
}

/// Names of fields whose positionally matching policy is indexed.
///
/// Fields and policies are paired by position; pairing stops at the end of
/// the shorter list.
pub fn field_index_string(schema: Option<&TableSchema>, policies: Option<&[FieldPolicy]>) -> String {
    let (Some(schema), Some(policies)) = (schema, policies) else {
        return String::new();
    };
    join_separated(
        schema
            .fields
            .iter()
            .zip(policies)
            .filter(|(_, policy)| policy.index)
            .map(|(field, _)| field.name.as_str()),
        ",",
    )
}

/// Copy each field's name onto its positionally matching policy.
pub fn bind_field_policy_names(schema: Option<&TableSchema>, policies: Option<&mut [FieldPolicy]>) {
    let (Some(schema), Some(policies)) = (schema, policies) else {
        return;
    };
    for (policy, field) in policies.iter_mut().zip(&schema.fields) {
        policy.field_name = Some(field.name.clone());
    }
}

/// JSON array of the policies; `[]` when there are none.
pub fn field_policies_json(policies: Option<&[FieldPolicy]>) -> Result<String> {
    Ok(serde_json::to_string(policies.unwrap_or_default())?)
}

/// `tblproperties(...)` clause selecting the compression codec for the target format.
///
/// Compression on a format other than Parquet or ORC yields an empty clause
/// and a warning.
pub fn target_tbl_properties(options: Option<&TableOptions>, target_format: Option<&str>) -> String {
    let compression = options
        .and_then(|o| o.compression_format.as_deref())
        .filter(|c| !c.trim().is_empty() && !c.eq_ignore_ascii_case("NONE"));
    let Some(compression) = compression else {
        return String::new();
    };

    let target_format = target_format.unwrap_or("");
    if target_format.eq_ignore_ascii_case("STORED AS PARQUET") {
        format!("tblproperties(\"parquet.compression\"=\"{}\")", compression)
    } else if target_format.eq_ignore_ascii_case("STORED AS ORC") {
        format!("tblproperties(\"orc.compress\"=\"{}\")", compression)
    } else {
        tracing::warn!(
            "Compression enabled with unsupported target format: {}",
            target_format
        );
        String::new()
    }
}

/// Escape a row format for storage. Blank formats are stored as given.
pub fn escape_feed_format(feed_format: Option<&str>) -> Option<String> {
    feed_format.map(|format| {
        if format.trim().is_empty() {
            format.to_string()
        } else {
            escape_java(format)
        }
    })
}

/// Read back a stored row format.
///
/// Only values containing an escaped backslash (`\\`) are unescaped; anything
/// else is returned verbatim. A format whose only escapes are control
/// characters therefore comes back still escaped, so only values written by
/// [`escape_feed_format`] from text containing a backslash round-trip.
pub fn decode_feed_format(stored: &str) -> String {
    if !stored.trim().is_empty() && stored.contains("\\\\") {
        unescape_java(stored)
    } else {
        stored.to_string()
    }
}

impl TableSetup {
    /// Regenerate [`TableSetup::derived`] and bind policy field names.
    ///
    /// Must run whenever the model changes. Running it again on an unchanged
    /// model produces identical output.
    pub fn update_metadata_field_values(&mut self) -> Result<()> {
        let schema = self.table_schema.as_ref();
        let partitions = self.partitions.as_deref();

        let partition_structure = partition_structure(partitions);
        let field_structure = field_structure(schema);
        let field_strings = field_strings(schema);
        let source_fields = source_fields(self.source_table_schema.as_ref());
        let field_index_string = field_index_string(schema, self.field_policies.as_deref());
        let partition_specs = partition_specs(partitions);
        bind_field_policy_names(self.table_schema.as_ref(), self.field_policies.as_deref_mut());
        let field_policies_json = field_policies_json(self.field_policies.as_deref())?;
        let target_tbl_properties =
            target_tbl_properties(self.options.as_ref(), self.target_format.as_deref());
        let feed_format = escape_feed_format(self.feed_format.as_deref());

        self.derived = DerivedSchema {
            partition_structure,
            field_structure,
            fields_string: field_strings.fields,
            nullable_fields: field_strings.nullable,
            primary_key_fields: field_strings.primary_keys,
            source_fields,
            field_index_string,
            partition_specs,
            field_policies_json,
            target_tbl_properties,
            feed_format,
        };

        tracing::debug!(
            fields = self.table_schema.as_ref().map_or(0, |s| s.fields.len()),
            partitions = self.partitions.as_ref().map_or(0, Vec::len),
            "Updated derived table metadata"
        );
        Ok(())
    }

    /// The row format as the derived value reads back.
    pub fn stored_feed_format(&self) -> Option<String> {
        self.derived.feed_format.as_deref().map(decode_feed_format)
    }
}
