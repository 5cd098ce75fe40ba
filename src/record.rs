use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::column::ColumnDef;
use crate::field;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RecordValue {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(
        default,
        rename = "created_time",
        alias = "createdAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,
    #[serde(
        default,
        rename = "last_edited_time",
        alias = "lastEditedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_edited_at: Option<String>,
}

/// One decoded record. Every column key maps to a string, possibly empty.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RowData {
    pub record_id: String,
    pub cells: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_at: Option<String>,
}

impl RowData {
    pub fn cell(&self, property_name: &str) -> &str {
        self.cells
            .get(property_name)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

pub fn decode_record(record: &RecordValue, columns: &[ColumnDef]) -> RowData {
    let mut cells: BTreeMap<String, String> = record
        .properties
        .iter()
        .map(|(name, property)| (name.clone(), field::decode_property(property).1))
        .collect();
    for column in columns {
        cells.entry(column.property_name.clone()).or_default();
    }

    RowData {
        record_id: record.id.clone(),
        cells,
        created_at: record.created_at.clone(),
        last_edited_at: record.last_edited_at.clone(),
    }
}

pub fn decode_records(records: &[RecordValue], columns: &[ColumnDef]) -> Vec<RowData> {
    records
        .iter()
        .map(|record| decode_record(record, columns))
        .collect()
}
