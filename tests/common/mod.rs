use _dbmirror_core::column::ColumnDef;
use _dbmirror_core::field::FieldType;
use _dbmirror_core::record::RowData;
use _dbmirror_core::{MemoryGateway, SyncConfig, SyncOrchestrator};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[allow(dead_code)]
pub const ENDPOINT: &str = "https://relay.example.com/v1";
#[allow(dead_code)]
pub const COLLECTION_ID: &str = "0123456789abcdef0123456789abcdef";

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn title(text: &str) -> Value {
    json!({"type": "title", "title": [{"plain_text": text}]})
}

#[allow(dead_code)]
pub fn number(value: f64) -> Value {
    json!({"type": "number", "number": value})
}

#[allow(dead_code)]
pub fn select(name: &str) -> Value {
    json!({"type": "select", "select": {"name": name, "color": "blue"}})
}

#[allow(dead_code)]
pub fn formula_number(value: f64) -> Value {
    json!({"type": "formula", "formula": {"type": "number", "number": value}})
}

#[allow(dead_code)]
pub fn record(id: &str, properties: Value) -> Value {
    json!({
        "id": id,
        "created_time": "2024-01-01T00:00:00.000Z",
        "last_edited_time": "2024-01-02T00:00:00.000Z",
        "properties": properties,
    })
}

/// One record: `Name` = "Alpha", `Score` = 3.
#[allow(dead_code)]
pub fn alpha_records() -> Vec<Value> {
    vec![record(
        "p1",
        json!({"Name": title("Alpha"), "Score": number(3.0)}),
    )]
}

#[allow(dead_code)]
pub fn setup_orchestrator(gateway: MemoryGateway) -> SyncOrchestrator<MemoryGateway> {
    init_tracing();
    SyncOrchestrator::new(SyncConfig::new(ENDPOINT, COLLECTION_ID), gateway)
}

#[allow(dead_code)]
pub fn column(name: &str, field_type: FieldType) -> ColumnDef {
    ColumnDef::new(name, field_type)
}

#[allow(dead_code)]
pub fn row(record_id: &str, cells: &[(&str, &str)]) -> RowData {
    RowData {
        record_id: record_id.to_string(),
        cells: cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        created_at: None,
        last_edited_at: None,
    }
}

#[allow(dead_code)]
pub fn ids(rows: &[&RowData]) -> Vec<String> {
    rows.iter().map(|r| r.record_id.clone()).collect()
}
