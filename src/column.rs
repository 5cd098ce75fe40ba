use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

use crate::field::FieldType;
use crate::record::RecordValue;

const DEFAULT_OPTION_COLOR: &str = "default";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColumnOption {
    pub name: String,
    pub color: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    pub property_name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ColumnOption>>,
}

impl ColumnDef {
    pub fn new(property_name: &str, field_type: FieldType) -> Self {
        Self {
            name: property_name.to_string(),
            property_name: property_name.to_string(),
            field_type,
            options: None,
        }
    }

    pub fn is_editable(&self) -> bool {
        !self.field_type.is_read_only()
    }

    /// Suggested values for select-like editing, in schema order.
    pub fn option_names(&self) -> Vec<&str> {
        self.options
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|o| o.name.as_str())
            .collect()
    }
}

pub fn find_column<'c>(columns: &'c [ColumnDef], property_name: &str) -> Option<&'c ColumnDef> {
    columns.iter().find(|c| c.property_name == property_name)
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SchemaOption {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SchemaOptionList {
    #[serde(default)]
    pub options: Vec<SchemaOption>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<SchemaOptionList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SchemaOptionList>,
}

impl PropertySchema {
    fn option_list(&self, field_type: &FieldType) -> Option<&SchemaOptionList> {
        match field_type {
            FieldType::Select => self.select.as_ref(),
            FieldType::Status => self.status.as_ref(),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CollectionSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
}

impl CollectionSchema {
    /// Reads a schema body, skipping property entries that do not parse.
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.get("properties")?.as_object()?;
        let mut properties = BTreeMap::new();
        for (name, def) in entries {
            match serde_json::from_value::<PropertySchema>(def.clone()) {
                Ok(parsed) => {
                    properties.insert(name.clone(), parsed);
                }
                Err(err) => trace!(property = %name, "skipping schema entry: {err}"),
            }
        }
        Some(Self { properties })
    }
}

/// One column per property of the first record, in that record's order.
/// No records means no columns, whatever the schema says.
pub fn infer_columns(records: &[RecordValue]) -> Vec<ColumnDef> {
    let Some(first) = records.first() else {
        return vec![];
    };
    first
        .properties
        .iter()
        .map(|(name, property)| {
            let tag = property
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            ColumnDef::new(name, FieldType::from_tag(tag))
        })
        .collect()
}

pub fn merge_schema_options(
    columns: &[ColumnDef],
    schema: Option<&CollectionSchema>,
) -> Vec<ColumnDef> {
    let Some(schema) = schema else {
        return columns.to_vec();
    };
    columns
        .iter()
        .map(|column| {
            let mut merged = column.clone();
            if !column.field_type.has_options() {
                return merged;
            }
            let options = schema
                .properties
                .get(&column.property_name)
                .and_then(|def| def.option_list(&column.field_type));
            if let Some(list) = options {
                merged.options = Some(
                    list.options
                        .iter()
                        .map(|o| ColumnOption {
                            name: o.name.clone(),
                            color: o
                                .color
                                .clone()
                                .unwrap_or_else(|| DEFAULT_OPTION_COLOR.to_string()),
                        })
                        .collect(),
                );
            }
            merged
        })
        .collect()
}
