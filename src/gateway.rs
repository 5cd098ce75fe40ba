use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Mutex;

use crate::record::RecordValue;
use crate::view::SortDirection;
use crate::writeback::UpdatePayload;

/// Status and raw body of a relayed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

impl GatewayResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampKind {
    CreatedTime,
    LastEditedTime,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SortDirective {
    Timestamp {
        timestamp: TimestampKind,
        direction: SortDirection,
    },
    Property {
        property: String,
        direction: SortDirection,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<SortDirective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    #[serde(default)]
    pub results: Vec<RecordValue>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Forwarding interface to the remote collection. Implementations own
/// transport, credentials and retries; `Err` means the request never got a
/// response, while any HTTP outcome is reported through `GatewayResponse`.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn get_schema(&self, collection_id: &str) -> Result<GatewayResponse>;

    async fn query_records(
        &self,
        collection_id: &str,
        query: &RecordQuery,
    ) -> Result<GatewayResponse>;

    async fn update_page(
        &self,
        record_id: &str,
        payload: &UpdatePayload,
    ) -> Result<GatewayResponse>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    GetSchema(String),
    QueryRecords(String, RecordQuery),
    UpdatePage(String, Value),
}

#[derive(Default)]
struct MemoryState {
    schema: Option<Value>,
    records: Vec<Value>,
    page_size: Option<usize>,
    schema_failure: Option<GatewayResponse>,
    query_failure: Option<GatewayResponse>,
    update_failure: Option<GatewayResponse>,
    transport_failure: Option<String>,
    calls: Vec<GatewayCall>,
}

/// In-memory collection for tests and offline use. Records are returned in
/// insertion order (query sorts are recorded, not applied) and successful
/// updates are written into the stored records.
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(self, schema: Value) -> Self {
        self.edit(|s| s.schema = Some(schema));
        self
    }

    pub fn with_records(self, records: Vec<Value>) -> Self {
        self.edit(|s| s.records = records);
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.edit(|s| s.page_size = Some(page_size.max(1)));
        self
    }

    pub fn fail_schema(&self, response: GatewayResponse) {
        self.edit(|s| s.schema_failure = Some(response));
    }

    pub fn fail_queries(&self, response: GatewayResponse) {
        self.edit(|s| s.query_failure = Some(response));
    }

    pub fn fail_updates(&self, response: GatewayResponse) {
        self.edit(|s| s.update_failure = Some(response));
    }

    pub fn fail_transport(&self, message: &str) {
        self.edit(|s| s.transport_failure = Some(message.to_string()));
    }

    pub fn clear_failures(&self) {
        self.edit(|s| {
            s.schema_failure = None;
            s.query_failure = None;
            s.update_failure = None;
            s.transport_failure = None;
        });
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn records(&self) -> Vec<Value> {
        self.state
            .lock()
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    fn edit(&self, f: impl FnOnce(&mut MemoryState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn begin(&self, call: GatewayCall) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("memory gateway state is poisoned"))?;
        state.calls.push(call);
        if let Some(message) = &state.transport_failure {
            return Err(anyhow!("{}", message));
        }
        Ok(state)
    }
}

fn not_found(kind: &str, id: &str) -> GatewayResponse {
    GatewayResponse::json(
        404,
        &json!({
            "object": "error",
            "status": 404,
            "code": "object_not_found",
            "message": format!("Could not find {} with ID: {}.", kind, id),
        }),
    )
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn get_schema(&self, collection_id: &str) -> Result<GatewayResponse> {
        let state = self.begin(GatewayCall::GetSchema(collection_id.to_string()))?;
        if let Some(failure) = &state.schema_failure {
            return Ok(failure.clone());
        }
        Ok(match &state.schema {
            Some(schema) => GatewayResponse::json(200, schema),
            None => not_found("database", collection_id),
        })
    }

    async fn query_records(
        &self,
        collection_id: &str,
        query: &RecordQuery,
    ) -> Result<GatewayResponse> {
        let state = self.begin(GatewayCall::QueryRecords(
            collection_id.to_string(),
            query.clone(),
        ))?;
        if let Some(failure) = &state.query_failure {
            return Ok(failure.clone());
        }

        let start = query
            .start_cursor
            .as_deref()
            .and_then(|cursor| cursor.parse::<usize>().ok())
            .unwrap_or(0)
            .min(state.records.len());
        let page_size = query
            .page_size
            .map(|n| n as usize)
            .or(state.page_size)
            .unwrap_or(state.records.len())
            .max(1);
        let end = (start + page_size).min(state.records.len());
        let has_more = end < state.records.len();
        let results = state.records[start..end].to_vec();

        Ok(GatewayResponse::json(
            200,
            &json!({
                "object": "list",
                "results": results,
                "has_more": has_more,
                "next_cursor": has_more.then(|| end.to_string()),
            }),
        ))
    }

    async fn update_page(
        &self,
        record_id: &str,
        payload: &UpdatePayload,
    ) -> Result<GatewayResponse> {
        let body = serde_json::to_value(payload)?;
        let mut state = self.begin(GatewayCall::UpdatePage(record_id.to_string(), body))?;
        if let Some(failure) = &state.update_failure {
            return Ok(failure.clone());
        }

        let Some(record) = state
            .records
            .iter_mut()
            .find(|r| r.get("id").and_then(|v| v.as_str()) == Some(record_id))
        else {
            return Ok(not_found("page", record_id));
        };
        let tag = payload.update.field_type().as_tag().to_string();
        let mut property = Map::new();
        property.insert("type".to_string(), Value::String(tag.clone()));
        property.insert(tag, payload.update.value());
        record["properties"][payload.property_name.as_str()] = Value::Object(property);
        let updated = record.clone();
        Ok(GatewayResponse::json(200, &updated))
    }
}
