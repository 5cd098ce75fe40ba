use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::column::{find_column, infer_columns, merge_schema_options, CollectionSchema, ColumnDef};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::field::{self, FieldType};
use crate::gateway::{GatewayResponse, QueryPage, RecordQuery, RemoteGateway, SortDirective, TimestampKind};
use crate::record::{decode_records, RowData};
use crate::view::{derive_view, RowGroup, SortKey, ViewParams};
use crate::writeback::build_update;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditingCell {
    pub record_id: String,
    pub property_name: String,
    /// Explicit type; when absent the column's declared type applies.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    pub value: String,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<RowData>,
    pub view: ViewParams,
    pub editing: Option<EditingCell>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Owns the mirrored table and drives refreshes and write-back through a
/// gateway. Failed operations leave columns and rows as they were.
pub struct SyncOrchestrator<G> {
    config: SyncConfig,
    gateway: G,
    state: TableState,
}

impl<G: RemoteGateway> SyncOrchestrator<G> {
    pub fn new(config: SyncConfig, gateway: G) -> Self {
        Self {
            config,
            gateway,
            state: TableState::default(),
        }
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn set_view_params(&mut self, params: ViewParams) {
        self.state.view = params;
    }

    pub fn view(&self) -> Vec<RowGroup<'_>> {
        derive_view(&self.state.rows, &self.state.columns, &self.state.view)
    }

    pub async fn full_sync(&mut self) -> Result<(), SyncError> {
        let result = self.run_full_sync().await;
        self.record_outcome("full sync", &result);
        result
    }

    async fn run_full_sync(&mut self) -> Result<(), SyncError> {
        self.config.validate()?;
        let collection_id = self.config.collection_id();
        let query = RecordQuery {
            sorts: sort_directives(&self.state.view),
            ..RecordQuery::default()
        };
        info!(collection_id = %collection_id, "starting full sync");

        let (schema_result, query_result) = tokio::join!(
            self.gateway.get_schema(&collection_id),
            self.gateway.query_records(&collection_id, &query)
        );
        let schema_response = schema_result.map_err(SyncError::transport)?;
        let query_response = query_result.map_err(SyncError::transport)?;

        let mut page = parse_query_page(&query_response)?;
        let mut records = std::mem::take(&mut page.results);
        let mut fetched = 1;
        while page.has_more {
            let Some(cursor) = page.next_cursor.take() else {
                break;
            };
            if fetched >= self.config.max_pages {
                warn!(
                    pages = fetched,
                    "page limit reached, remaining records are not mirrored"
                );
                break;
            }
            let next = RecordQuery {
                start_cursor: Some(cursor),
                ..query.clone()
            };
            let response = self
                .gateway
                .query_records(&collection_id, &next)
                .await
                .map_err(SyncError::transport)?;
            page = parse_query_page(&response)?;
            records.append(&mut page.results);
            fetched += 1;
        }

        let schema = parse_schema(&schema_response);
        let columns = merge_schema_options(&infer_columns(&records), schema.as_ref());
        let rows = decode_records(&records, &columns);
        info!(
            rows = rows.len(),
            columns = columns.len(),
            pages = fetched,
            "full sync finished"
        );

        self.state.columns = columns;
        self.state.rows = rows;
        self.state.last_synced_at = Some(Utc::now());
        Ok(())
    }

    /// `None` for unknown rows or columns and for read-only columns.
    pub fn begin_edit(&mut self, record_id: &str, property_name: &str) -> Option<&EditingCell> {
        let column = find_column(&self.state.columns, property_name)?;
        if !column.is_editable() {
            debug!(property = %property_name, "refusing edit on read-only column");
            return None;
        }
        let row = self.state.rows.iter().find(|r| r.record_id == record_id)?;
        let cell = EditingCell {
            record_id: record_id.to_string(),
            property_name: property_name.to_string(),
            field_type: Some(column.field_type.clone()),
            value: row.cell(property_name).to_string(),
        };
        self.state.editing = Some(cell);
        self.state.editing.as_ref()
    }

    pub fn begin_edit_as(&mut self, cell: EditingCell) -> &EditingCell {
        self.state.editing.insert(cell)
    }

    pub fn set_edit_value(&mut self, value: &str) -> bool {
        match self.state.editing.as_mut() {
            Some(cell) => {
                cell.value = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&mut self) -> Option<EditingCell> {
        self.state.editing.take()
    }

    /// The edit is closed whether or not the remote accepts it.
    pub async fn commit_edit(&mut self) -> Result<(), SyncError> {
        let Some(cell) = self.state.editing.take() else {
            debug!("commit requested without an active edit");
            return Ok(());
        };
        let result = self.apply_edit(&cell).await;
        self.record_outcome("cell update", &result);
        result
    }

    async fn apply_edit(&mut self, cell: &EditingCell) -> Result<(), SyncError> {
        let field_type = cell
            .field_type
            .clone()
            .or_else(|| {
                find_column(&self.state.columns, &cell.property_name)
                    .map(|c| c.field_type.clone())
            })
            .unwrap_or(FieldType::RichText);
        if field_type.is_read_only() {
            return Err(SyncError::ReadOnlyField(cell.property_name.clone()));
        }

        let payload = build_update(&cell.property_name, &field_type, &cell.value);
        let response = self
            .gateway
            .update_page(&cell.record_id, &payload)
            .await
            .map_err(SyncError::transport)?;
        if !response.is_success() {
            return Err(SyncError::remote(response.status, &response.body));
        }

        if let Some(row) = self
            .state
            .rows
            .iter_mut()
            .find(|r| r.record_id == cell.record_id)
        {
            // same text a later sync decodes from the remote
            let stored = field::decode(&field_type, &payload.update.value());
            row.cells.insert(cell.property_name.clone(), stored);
        }
        info!(
            record_id = %cell.record_id,
            property = %cell.property_name,
            "cell updated"
        );
        Ok(())
    }

    fn record_outcome(&mut self, operation: &str, result: &Result<(), SyncError>) {
        match result {
            Ok(()) => self.state.error_message = None,
            Err(err) => {
                warn!(operation, "{}", err);
                self.state.error_message = Some(err.to_string());
            }
        }
    }
}

pub fn sort_directives(view: &ViewParams) -> Vec<SortDirective> {
    let Some(key) = view.active_sort_key() else {
        return vec![];
    };
    let direction = view.sort_direction;
    let directive = match key {
        SortKey::CreatedAt => SortDirective::Timestamp {
            timestamp: TimestampKind::CreatedTime,
            direction,
        },
        SortKey::LastEditedAt => SortDirective::Timestamp {
            timestamp: TimestampKind::LastEditedTime,
            direction,
        },
        SortKey::Property(name) => SortDirective::Property {
            property: name.clone(),
            direction,
        },
    };
    vec![directive]
}

fn parse_query_page(response: &GatewayResponse) -> Result<QueryPage, SyncError> {
    if !response.is_success() {
        return Err(SyncError::remote(response.status, &response.body));
    }
    serde_json::from_str(&response.body).map_err(|e| SyncError::InvalidResponse(e.to_string()))
}

// A failed schema request only costs the option lists.
fn parse_schema(response: &GatewayResponse) -> Option<CollectionSchema> {
    if !response.is_success() {
        warn!(
            status = response.status,
            "schema unavailable, continuing without option lists"
        );
        return None;
    }
    let value: Value = serde_json::from_str(&response.body).ok()?;
    CollectionSchema::from_value(&value)
}
