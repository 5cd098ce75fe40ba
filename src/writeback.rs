use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::field::{is_truthy, DateValue, FieldType, SelectOption, TextRun};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyUpdate {
    Title(Vec<TextRun>),
    RichText(Vec<TextRun>),
    Number(Option<f64>),
    Checkbox(bool),
    Date(Option<DateValue>),
    Url(Option<String>),
    Select(Option<SelectOption>),
    Status(Option<SelectOption>),
    MultiSelect(Vec<SelectOption>),
}

impl PropertyUpdate {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Title(_) => FieldType::Title,
            Self::RichText(_) => FieldType::RichText,
            Self::Number(_) => FieldType::Number,
            Self::Checkbox(_) => FieldType::Checkbox,
            Self::Date(_) => FieldType::Date,
            Self::Url(_) => FieldType::Url,
            Self::Select(_) => FieldType::Select,
            Self::Status(_) => FieldType::Status,
            Self::MultiSelect(_) => FieldType::MultiSelect,
        }
    }

    /// The member stored under the type tag, e.g. the run list of a text update.
    pub fn value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().next().map(|(_, v)| v).unwrap_or_default(),
            _ => Value::Null,
        }
    }
}

/// Body of a page update: `{"properties": {name: update}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePayload {
    pub property_name: String,
    pub update: PropertyUpdate,
}

impl Serialize for UpdatePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut properties = BTreeMap::new();
        properties.insert(self.property_name.as_str(), &self.update);
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("properties", &properties)?;
        map.end()
    }
}

/// Maps a plain edited value back to the remote shape for `field_type`.
/// Only the empty string clears a value; anything else is sent as typed.
/// Read-only and unrecognized kinds fall back to a text update.
pub fn build_update(property_name: &str, field_type: &FieldType, plain_value: &str) -> UpdatePayload {
    let blank = plain_value.is_empty();

    let update = match field_type {
        FieldType::Title => PropertyUpdate::Title(vec![TextRun::plain(plain_value)]),
        FieldType::Number => PropertyUpdate::Number(
            plain_value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite()),
        ),
        FieldType::Checkbox => PropertyUpdate::Checkbox(is_truthy(plain_value)),
        FieldType::Date => PropertyUpdate::Date((!blank).then(|| DateValue {
            start: Some(plain_value.to_string()),
            end: None,
        })),
        FieldType::Url => PropertyUpdate::Url((!blank).then(|| plain_value.to_string())),
        FieldType::Select => PropertyUpdate::Select((!blank).then(|| SelectOption::named(plain_value))),
        FieldType::Status => PropertyUpdate::Status((!blank).then(|| SelectOption::named(plain_value))),
        FieldType::MultiSelect => PropertyUpdate::MultiSelect(
            plain_value
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(SelectOption::named)
                .collect(),
        ),
        FieldType::RichText
        | FieldType::Formula
        | FieldType::Rollup
        | FieldType::People
        | FieldType::Unsupported(_) => PropertyUpdate::RichText(vec![TextRun::plain(plain_value)]),
    };

    UpdatePayload {
        property_name: property_name.to_string(),
        update,
    }
}
