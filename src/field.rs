use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Marker the presentation layer shows for an empty cell.
pub const EMPTY_PLACEHOLDER: &str = "\u{2014}";

pub const CHECK_MARK: &str = "\u{2713}";

/// Closed set of remote field kinds. Tags outside the set are kept verbatim in
/// `Unsupported` so a column can still be shown and edited as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Title,
    RichText,
    Number,
    Select,
    MultiSelect,
    Checkbox,
    Date,
    Url,
    Status,
    Formula,
    Rollup,
    People,
    Unsupported(String),
}

impl FieldType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "title" => Self::Title,
            "rich_text" => Self::RichText,
            "number" => Self::Number,
            "select" => Self::Select,
            "multi_select" => Self::MultiSelect,
            "checkbox" => Self::Checkbox,
            "date" => Self::Date,
            "url" => Self::Url,
            "status" => Self::Status,
            "formula" => Self::Formula,
            "rollup" => Self::Rollup,
            "people" => Self::People,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::RichText => "rich_text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::Url => "url",
            Self::Status => "status",
            Self::Formula => "formula",
            Self::Rollup => "rollup",
            Self::People => "people",
            Self::Unsupported(tag) => tag,
        }
    }

    /// Computed or externally managed kinds that never accept a write.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Formula | Self::Rollup | Self::People)
    }

    pub fn has_options(&self) -> bool {
        matches!(self, Self::Select | Self::Status)
    }
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_tag().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TextRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
}

impl TextRun {
    pub fn plain(content: &str) -> Self {
        Self {
            plain_text: None,
            text: Some(TextContent {
                content: content.to_string(),
            }),
        }
    }

    fn content(&self) -> &str {
        self.plain_text
            .as_deref()
            .or_else(|| self.text.as_ref().map(|t| t.content.as_str()))
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl SelectOption {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            color: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Person {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FormulaResult {
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub number: Option<f64>,
    #[serde(default)]
    pub boolean: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RollupResult {
    #[serde(default)]
    pub number: Option<f64>,
    #[serde(default)]
    pub array: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Title(Vec<TextRun>),
    RichText(Vec<TextRun>),
    Number(Option<f64>),
    Select(Option<SelectOption>),
    MultiSelect(Vec<SelectOption>),
    Checkbox(bool),
    Date(Option<DateValue>),
    Url(Option<String>),
    Status(Option<SelectOption>),
    Formula(FormulaResult),
    Rollup(RollupResult),
    People(Vec<Person>),
    Unsupported,
}

impl FieldValue {
    /// Reads the type-specific member of a property (`raw` is the value stored
    /// under the property's own type tag). Malformed shapes degrade to empty.
    pub fn parse(field_type: &FieldType, raw: &Value) -> Self {
        match field_type {
            FieldType::Title => Self::Title(lenient_list(raw)),
            FieldType::RichText => Self::RichText(lenient_list(raw)),
            FieldType::Number => Self::Number(raw.as_f64()),
            FieldType::Select => Self::Select(lenient(raw)),
            FieldType::MultiSelect => Self::MultiSelect(lenient_list(raw)),
            FieldType::Checkbox => Self::Checkbox(raw.as_bool().unwrap_or(false)),
            FieldType::Date => Self::Date(lenient(raw)),
            FieldType::Url => Self::Url(raw.as_str().map(str::to_string)),
            FieldType::Status => Self::Status(lenient(raw)),
            FieldType::Formula => Self::Formula(lenient(raw)),
            FieldType::Rollup => Self::Rollup(lenient(raw)),
            FieldType::People => Self::People(lenient_list(raw)),
            FieldType::Unsupported(_) => Self::Unsupported,
        }
    }

    pub fn from_property(property: &Value) -> (FieldType, Self) {
        let tag = property
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let field_type = FieldType::from_tag(tag);
        let raw = property.get(tag).unwrap_or(&Value::Null);
        let value = Self::parse(&field_type, raw);
        (field_type, value)
    }

    pub fn to_plain(&self) -> String {
        match self {
            Self::Title(runs) | Self::RichText(runs) => {
                runs.iter().map(TextRun::content).collect::<String>()
            }
            Self::Number(number) => number.map(number_to_string).unwrap_or_default(),
            Self::Select(option) | Self::Status(option) => option
                .as_ref()
                .map(|o| o.name.clone())
                .unwrap_or_default(),
            Self::MultiSelect(options) => options
                .iter()
                .map(|o| o.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Checkbox(checked) => yes_no(*checked),
            Self::Date(date) => date
                .as_ref()
                .and_then(|d| d.start.clone())
                .unwrap_or_default(),
            Self::Url(url) => url.clone().unwrap_or_default(),
            Self::People(people) => people
                .iter()
                .filter_map(|p| p.name.as_deref())
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Formula(result) => {
                if let Some(text) = &result.string {
                    text.clone()
                } else if let Some(number) = result.number {
                    number_to_string(number)
                } else if let Some(flag) = result.boolean {
                    yes_no(flag)
                } else {
                    String::new()
                }
            }
            Self::Rollup(result) => {
                if let Some(number) = result.number {
                    number_to_string(number)
                } else if let Some(items) = &result.array {
                    items.len().to_string()
                } else {
                    String::new()
                }
            }
            Self::Unsupported => String::new(),
        }
    }
}

pub fn decode(field_type: &FieldType, raw: &Value) -> String {
    FieldValue::parse(field_type, raw).to_plain()
}

pub fn decode_property(property: &Value) -> (FieldType, String) {
    let (field_type, value) = FieldValue::from_property(property);
    (field_type, value.to_plain())
}

/// Renders a decoded value for display. Stored cells are never touched; the
/// result is stable when fed back in.
pub fn format_display(field_type: &FieldType, value: &str) -> String {
    match field_type {
        FieldType::Checkbox => {
            if is_truthy(value) || value.trim() == CHECK_MARK {
                CHECK_MARK.to_string()
            } else {
                EMPTY_PLACEHOLDER.to_string()
            }
        }
        FieldType::Date => format_date(value).unwrap_or_else(|| value.to_string()),
        FieldType::Number => format_number(value).unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}

/// `1`, `true` or `yes`, ignoring case and surrounding whitespace.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    ["1", "true", "yes"]
        .iter()
        .any(|accepted| value.eq_ignore_ascii_case(accepted))
}

pub fn is_empty_cell(value: &str) -> bool {
    value.is_empty() || value == EMPTY_PLACEHOLDER
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "Yes" } else { "No" };
    text.to_string()
}

fn number_to_string(number: f64) -> String {
    format!("{}", number)
}

fn lenient<T: DeserializeOwned + Default>(raw: &Value) -> T {
    if raw.is_null() {
        return T::default();
    }
    serde_json::from_value(raw.clone()).unwrap_or_default()
}

fn lenient_list<T: DeserializeOwned>(raw: &Value) -> Vec<T> {
    raw.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn format_date(value: &str) -> Option<String> {
    let value = value.trim();
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })?;
    Some(date.format("%b %-d, %Y").to_string())
}

fn format_number(value: &str) -> Option<String> {
    let number = value.trim().parse::<f64>().ok().filter(|n| n.is_finite())?;
    Some(group_thousands(number))
}

// At most three fraction digits, trailing zeros dropped.
fn group_thousands(number: f64) -> String {
    // beyond 1e15 there are no fraction digits left to round
    let rounded = if number.abs() < 1e15 {
        (number * 1000.0).round() / 1000.0
    } else {
        number
    };
    let text = format!("{:.3}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::new();
    if rounded < 0.0 {
        grouped.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if !frac_part.is_empty() {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}
