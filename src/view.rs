use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::column::{find_column, ColumnDef};
use crate::field::{is_empty_cell, FieldType, EMPTY_PLACEHOLDER};
use crate::record::RowData;

pub const CREATED_AT_KEY: &str = "createdAt";
pub const LAST_EDITED_AT_KEY: &str = "lastEditedAt";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[default]
    Contains,
    Equals,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOp {
    pub fn needs_value(self) -> bool {
        matches!(self, Self::Contains | Self::Equals)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum SortKey {
    CreatedAt,
    LastEditedAt,
    Property(String),
}

impl SortKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreatedAt => CREATED_AT_KEY,
            Self::LastEditedAt => LAST_EDITED_AT_KEY,
            Self::Property(name) => name,
        }
    }

    fn is_unset(&self) -> bool {
        matches!(self, Self::Property(name) if name.is_empty())
    }
}

impl From<String> for SortKey {
    fn from(key: String) -> Self {
        match key.as_str() {
            CREATED_AT_KEY => Self::CreatedAt,
            LAST_EDITED_AT_KEY => Self::LastEditedAt,
            _ => Self::Property(key),
        }
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.as_str().to_string()
    }
}

/// Active filter, sort and group configuration. Holds no derived data.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewParams {
    pub sort_key: Option<SortKey>,
    pub sort_direction: SortDirection,
    pub group_key: Option<String>,
    pub filter_key: Option<String>,
    pub filter_op: FilterOp,
    pub filter_value: String,
}

impl ViewParams {
    pub fn sorted_by(mut self, key: &str, direction: SortDirection) -> Self {
        self.sort_key = Some(SortKey::from(key.to_string()));
        self.sort_direction = direction;
        self
    }

    pub fn grouped_by(mut self, key: &str) -> Self {
        self.group_key = Some(key.to_string());
        self
    }

    pub fn filtered(mut self, key: &str, op: FilterOp, value: &str) -> Self {
        self.filter_key = Some(key.to_string());
        self.filter_op = op;
        self.filter_value = value.to_string();
        self
    }

    pub fn active_sort_key(&self) -> Option<&SortKey> {
        self.sort_key.as_ref().filter(|key| !key.is_unset())
    }

    fn active_group_key(&self) -> Option<&str> {
        self.group_key.as_deref().filter(|key| !key.is_empty())
    }

    fn active_filter_key(&self) -> Option<&str> {
        self.filter_key.as_deref().filter(|key| !key.is_empty())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RowGroup<'a> {
    pub key: String,
    pub rows: Vec<&'a RowData>,
}

/// Keeps the rows matching the filter. An unknown column, or a value-based
/// operator with a blank value, keeps everything.
pub fn filter_rows<'a, I>(rows: I, columns: &[ColumnDef], params: &ViewParams) -> Vec<&'a RowData>
where
    I: IntoIterator<Item = &'a RowData>,
{
    let rows = rows.into_iter();
    let Some(key) = params
        .active_filter_key()
        .filter(|key| find_column(columns, key).is_some())
    else {
        return rows.collect();
    };
    let needle = params.filter_value.to_lowercase();
    if params.filter_op.needs_value() && needle.trim().is_empty() {
        return rows.collect();
    }

    rows.filter(|row| {
        let value = row.cell(key);
        match params.filter_op {
            FilterOp::Contains => value.to_lowercase().contains(&needle),
            FilterOp::Equals => value.to_lowercase() == needle,
            FilterOp::IsEmpty => is_empty_cell(value),
            FilterOp::IsNotEmpty => !is_empty_cell(value),
        }
    })
    .collect()
}

pub fn sort_rows<'a, I>(rows: I, columns: &[ColumnDef], params: &ViewParams) -> Vec<&'a RowData>
where
    I: IntoIterator<Item = &'a RowData>,
{
    let mut sorted: Vec<&RowData> = rows.into_iter().collect();
    let Some(key) = params.active_sort_key() else {
        return sorted;
    };
    let numeric = match key {
        SortKey::Property(name) => is_numeric_column(columns, name),
        _ => false,
    };

    sorted.sort_by(|a, b| {
        let ordering = match key {
            SortKey::CreatedAt => timestamp(&a.created_at).cmp(timestamp(&b.created_at)),
            SortKey::LastEditedAt => {
                timestamp(&a.last_edited_at).cmp(timestamp(&b.last_edited_at))
            }
            SortKey::Property(name) if numeric => {
                number_or_zero(a.cell(name)).total_cmp(&number_or_zero(b.cell(name)))
            }
            SortKey::Property(name) => a
                .cell(name)
                .to_lowercase()
                .cmp(&b.cell(name).to_lowercase()),
        };
        match params.sort_direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    sorted
}

// Without an active, known group column everything lands in one group keyed "".
pub fn group_rows<'a, I>(rows: I, columns: &[ColumnDef], params: &ViewParams) -> Vec<RowGroup<'a>>
where
    I: IntoIterator<Item = &'a RowData>,
{
    let rows = rows.into_iter();
    let Some(key) = params
        .active_group_key()
        .filter(|key| find_column(columns, key).is_some())
    else {
        return vec![RowGroup {
            key: String::new(),
            rows: rows.collect(),
        }];
    };
    let numeric = is_numeric_column(columns, key);

    let mut groups: Vec<RowGroup<'a>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let value = row.cell(key);
        let bucket = if is_empty_cell(value) {
            EMPTY_PLACEHOLDER
        } else {
            value
        };
        match positions.get(bucket) {
            Some(&idx) => groups[idx].rows.push(row),
            None => {
                positions.insert(bucket.to_string(), groups.len());
                groups.push(RowGroup {
                    key: bucket.to_string(),
                    rows: vec![row],
                });
            }
        }
    }

    groups.sort_by(|a, b| compare_group_keys(&a.key, &b.key, numeric));
    groups
}

pub fn derive_view<'a>(
    rows: &'a [RowData],
    columns: &[ColumnDef],
    params: &ViewParams,
) -> Vec<RowGroup<'a>> {
    let filtered = filter_rows(rows, columns, params);
    let sorted = sort_rows(filtered, columns, params);
    group_rows(sorted, columns, params)
}

fn is_numeric_column(columns: &[ColumnDef], property_name: &str) -> bool {
    find_column(columns, property_name)
        .map(|c| c.field_type == FieldType::Number)
        .unwrap_or(false)
}

fn timestamp(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

fn number_or_zero(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
        + 0.0
}

fn parse_group_number(key: &str) -> Option<f64> {
    key.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

// Numeric keys ahead of the rest so the order stays total on mixed columns.
fn compare_group_keys(a: &str, b: &str, numeric: bool) -> Ordering {
    if !numeric {
        return a.cmp(b);
    }
    match (parse_group_number(a), parse_group_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
