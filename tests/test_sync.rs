mod common;
use _dbmirror_core::field::FieldType;
use _dbmirror_core::gateway::{GatewayCall, SortDirective, TimestampKind};
use _dbmirror_core::{
    EditingCell, GatewayResponse, MemoryGateway, SortDirection, SyncConfig, SyncError,
    SyncOrchestrator, ViewParams,
};
use common::{
    alpha_records, formula_number, number, record, select, setup_orchestrator, title,
    COLLECTION_ID, ENDPOINT,
};
use serde_json::{json, Value};

fn alpha_schema() -> Value {
    json!({
        "object": "database",
        "properties": {
            "Name": {"type": "title", "title": {}},
            "Score": {"type": "number", "number": {}}
        }
    })
}

fn update_calls(calls: &[GatewayCall]) -> Vec<&GatewayCall> {
    calls
        .iter()
        .filter(|c| matches!(c, GatewayCall::UpdatePage(..)))
        .collect()
}

fn query_calls(calls: &[GatewayCall]) -> Vec<&GatewayCall> {
    calls
        .iter()
        .filter(|c| matches!(c, GatewayCall::QueryRecords(..)))
        .collect()
}

#[tokio::test]
async fn test_sync_full_sync_mirrors_records() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new()
        .with_schema(alpha_schema())
        .with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);

    orchestrator.full_sync().await?;

    let state = orchestrator.state();
    let names: Vec<&str> = state.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Name", "Score"]);
    assert_eq!(state.columns[0].field_type, FieldType::Title);
    assert_eq!(state.columns[1].field_type, FieldType::Number);
    assert_eq!(state.rows.len(), 1);
    assert_eq!(state.rows[0].record_id, "p1");
    assert_eq!(state.rows[0].cell("Name"), "Alpha");
    assert_eq!(state.rows[0].cell("Score"), "3");
    assert!(state.last_synced_at.is_some());
    assert!(state.error_message.is_none());

    let calls = orchestrator.gateway().calls();
    assert!(calls.contains(&GatewayCall::GetSchema(COLLECTION_ID.to_string())));
    assert_eq!(query_calls(&calls).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sync_rejects_missing_configuration_without_calls() {
    let cases = [
        ("", COLLECTION_ID),
        (ENDPOINT, "   "),
        ("not a url", COLLECTION_ID),
    ];
    for (endpoint, collection_id) in cases {
        let gateway = MemoryGateway::new().with_records(alpha_records());
        let mut orchestrator =
            SyncOrchestrator::new(SyncConfig::new(endpoint, collection_id), gateway);

        let result = orchestrator.full_sync().await;

        assert!(
            matches!(result, Err(SyncError::Configuration(_))),
            "{:?}",
            result
        );
        assert!(orchestrator.gateway().calls().is_empty());
        assert!(orchestrator.state().error_message.is_some());
        assert!(orchestrator.state().rows.is_empty());
    }
}

#[tokio::test]
async fn test_sync_shared_link_is_normalized_before_querying() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(alpha_records());
    let link = format!("https://www.notion.so/team/Tasks-{}?v=abc", COLLECTION_ID);
    let mut orchestrator = SyncOrchestrator::new(SyncConfig::new(ENDPOINT, &link), gateway);

    orchestrator.full_sync().await?;

    let calls = orchestrator.gateway().calls();
    assert!(calls.contains(&GatewayCall::GetSchema(COLLECTION_ID.to_string())));
    Ok(())
}

#[tokio::test]
async fn test_sync_failed_query_keeps_previous_table() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new()
        .with_schema(alpha_schema())
        .with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;
    let before = orchestrator.state().clone();

    orchestrator
        .gateway()
        .fail_queries(GatewayResponse::new(500, "x".repeat(300)));
    let result = orchestrator.full_sync().await;

    match result {
        Err(SyncError::Remote { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message.matches('x').count(), 100);
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
    let state = orchestrator.state();
    assert_eq!(state.columns, before.columns);
    assert_eq!(state.rows, before.rows);
    assert_eq!(state.last_synced_at, before.last_synced_at);
    let message = state.error_message.as_deref().unwrap_or_default();
    assert!(message.contains("500"));

    orchestrator.gateway().clear_failures();
    orchestrator.full_sync().await?;
    assert!(orchestrator.state().error_message.is_none());
    Ok(())
}

#[tokio::test]
async fn test_sync_missing_database_gets_specific_message() {
    let gateway = MemoryGateway::new().with_records(alpha_records());
    gateway.fail_queries(GatewayResponse::json(
        404,
        &json!({"object": "error", "status": 404, "code": "object_not_found"}),
    ));
    let mut orchestrator = setup_orchestrator(gateway);

    let result = orchestrator.full_sync().await;

    assert!(matches!(result, Err(SyncError::Remote { status: 404, .. })));
    let message = orchestrator
        .state()
        .error_message
        .clone()
        .unwrap_or_default();
    assert!(message.starts_with("Database not found (404)"), "{}", message);
}

#[tokio::test]
async fn test_sync_schema_failure_is_tolerated() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(vec![record(
        "p1",
        json!({"Name": title("Alpha"), "Stage": select("Done")}),
    )]);
    gateway.fail_schema(GatewayResponse::new(502, "bad gateway"));
    let mut orchestrator = setup_orchestrator(gateway);

    orchestrator.full_sync().await?;

    let state = orchestrator.state();
    assert_eq!(state.rows.len(), 1);
    assert_eq!(state.rows[0].cell("Stage"), "Done");
    assert!(state.columns.iter().all(|c| c.options.is_none()));
    assert!(state.error_message.is_none());
    Ok(())
}

#[tokio::test]
async fn test_sync_schema_options_reach_select_columns() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new()
        .with_schema(json!({
            "properties": {
                "Stage": {"type": "select", "select": {"options": [
                    {"name": "Todo", "color": "gray"},
                    {"name": "Done", "color": "green"}
                ]}}
            }
        }))
        .with_records(vec![record(
            "p1",
            json!({"Name": title("Alpha"), "Stage": select("Done")}),
        )]);
    let mut orchestrator = setup_orchestrator(gateway);

    orchestrator.full_sync().await?;

    let stage = &orchestrator.state().columns[1];
    assert_eq!(stage.name, "Stage");
    assert_eq!(stage.option_names(), vec!["Todo", "Done"]);
    assert!(orchestrator.state().columns[0].options.is_none());
    Ok(())
}

#[tokio::test]
async fn test_sync_transport_failure_leaves_state_untouched() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new()
        .with_schema(alpha_schema())
        .with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;
    let rows_before = orchestrator.state().rows.clone();

    orchestrator.gateway().fail_transport("connection refused");
    let result = orchestrator.full_sync().await;

    assert_eq!(
        result,
        Err(SyncError::Transport("connection refused".to_string()))
    );
    assert_eq!(orchestrator.state().rows, rows_before);
    assert_eq!(
        orchestrator.state().error_message.as_deref(),
        Some("network error: connection refused")
    );
    Ok(())
}

#[tokio::test]
async fn test_sync_zero_records_mean_zero_columns() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_schema(alpha_schema());
    let mut orchestrator = setup_orchestrator(gateway);

    orchestrator.full_sync().await?;

    assert!(orchestrator.state().columns.is_empty());
    assert!(orchestrator.state().rows.is_empty());
    assert!(orchestrator.state().last_synced_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_sync_follows_pagination_cursors() -> anyhow::Result<()> {
    let records: Vec<Value> = (1..=5)
        .map(|i| {
            record(
                &format!("p{}", i),
                json!({"Name": title(&format!("Row {}", i)), "Score": number(i as f64)}),
            )
        })
        .collect();
    let gateway = MemoryGateway::new()
        .with_schema(alpha_schema())
        .with_records(records)
        .with_page_size(2);
    let mut orchestrator = setup_orchestrator(gateway);

    orchestrator.full_sync().await?;

    assert_eq!(orchestrator.state().rows.len(), 5);
    let cursors: Vec<Option<String>> = query_calls(&orchestrator.gateway().calls())
        .into_iter()
        .filter_map(|call| match call {
            GatewayCall::QueryRecords(_, query) => Some(query.start_cursor.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        cursors,
        vec![None, Some("2".to_string()), Some("4".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn test_sync_stops_at_page_limit() -> anyhow::Result<()> {
    let records: Vec<Value> = (1..=5)
        .map(|i| record(&format!("p{}", i), json!({"Name": title("x")})))
        .collect();
    let gateway = MemoryGateway::new()
        .with_records(records)
        .with_page_size(2);
    let mut config = SyncConfig::new(ENDPOINT, COLLECTION_ID);
    config.max_pages = 2;
    let mut orchestrator = SyncOrchestrator::new(config, gateway);

    orchestrator.full_sync().await?;

    assert_eq!(orchestrator.state().rows.len(), 4);
    assert_eq!(query_calls(&orchestrator.gateway().calls()).len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_sync_view_sort_is_forwarded_to_remote_query() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator
        .set_view_params(ViewParams::default().sorted_by("createdAt", SortDirection::Descending));

    orchestrator.full_sync().await?;

    let calls = orchestrator.gateway().calls();
    let Some(GatewayCall::QueryRecords(_, query)) = query_calls(&calls).first().copied() else {
        panic!("no query was sent");
    };
    assert_eq!(
        query.sorts,
        vec![SortDirective::Timestamp {
            timestamp: TimestampKind::CreatedTime,
            direction: SortDirection::Descending,
        }]
    );
    assert_eq!(
        serde_json::to_value(&query.sorts)?,
        json!([{"timestamp": "created_time", "direction": "descending"}])
    );
    Ok(())
}

#[tokio::test]
async fn test_sync_commit_edit_writes_back_and_patches_cell() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new()
        .with_schema(alpha_schema())
        .with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;

    let editing = orchestrator
        .begin_edit("p1", "Score")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Score should be editable"))?;
    assert_eq!(editing.value, "3");
    assert_eq!(editing.field_type, Some(FieldType::Number));
    assert!(orchestrator.set_edit_value("7"));

    orchestrator.commit_edit().await?;

    let state = orchestrator.state();
    assert_eq!(state.rows[0].cell("Score"), "7");
    assert_eq!(state.rows[0].cell("Name"), "Alpha");
    assert!(state.editing.is_none());
    assert!(state.error_message.is_none());

    let calls = orchestrator.gateway().calls();
    assert_eq!(
        update_calls(&calls),
        vec![&GatewayCall::UpdatePage(
            "p1".to_string(),
            json!({"properties": {"Score": {"number": 7.0}}})
        )]
    );
    let stored = orchestrator.gateway().records();
    assert_eq!(
        stored[0]["properties"]["Score"],
        json!({"type": "number", "number": 7.0})
    );

    // a later refresh reads the value the remote now holds
    orchestrator.full_sync().await?;
    assert_eq!(orchestrator.state().rows[0].cell("Score"), "7");
    Ok(())
}

#[tokio::test]
async fn test_sync_failed_update_keeps_cell_and_closes_edit() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new()
        .with_schema(alpha_schema())
        .with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;

    orchestrator
        .gateway()
        .fail_updates(GatewayResponse::new(400, "validation_error"));
    orchestrator.begin_edit("p1", "Score");
    orchestrator.set_edit_value("7");
    let result = orchestrator.commit_edit().await;

    assert!(matches!(result, Err(SyncError::Remote { status: 400, .. })));
    assert_eq!(orchestrator.state().rows[0].cell("Score"), "3");
    assert!(orchestrator.state().editing.is_none());
    assert!(orchestrator.state().error_message.is_some());

    orchestrator.gateway().clear_failures();
    orchestrator.gateway().fail_transport("timed out");
    orchestrator.begin_edit("p1", "Score");
    orchestrator.set_edit_value("8");
    let result = orchestrator.commit_edit().await;

    assert!(matches!(result, Err(SyncError::Transport(_))));
    assert_eq!(orchestrator.state().rows[0].cell("Score"), "3");
    assert!(orchestrator.state().editing.is_none());
    Ok(())
}

#[tokio::test]
async fn test_sync_read_only_columns_cannot_be_edited() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(vec![record(
        "p1",
        json!({"Name": title("Alpha"), "Total": formula_number(5.0)}),
    )]);
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;

    assert!(orchestrator.begin_edit("p1", "Total").is_none());
    assert!(orchestrator.begin_edit("missing", "Name").is_none());
    assert!(orchestrator.begin_edit("p1", "Missing").is_none());
    assert!(orchestrator.state().editing.is_none());
    assert!(!orchestrator.set_edit_value("x"));

    let calls_before = orchestrator.gateway().calls().len();
    orchestrator.begin_edit_as(EditingCell {
        record_id: "p1".to_string(),
        property_name: "Name".to_string(),
        field_type: Some(FieldType::Formula),
        value: "x".to_string(),
    });
    let result = orchestrator.commit_edit().await;

    assert_eq!(result, Err(SyncError::ReadOnlyField("Name".to_string())));
    assert_eq!(orchestrator.gateway().calls().len(), calls_before);
    assert_eq!(orchestrator.state().rows[0].cell("Name"), "Alpha");
    Ok(())
}

#[tokio::test]
async fn test_sync_edit_type_resolution() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new()
        .with_schema(alpha_schema())
        .with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;

    // explicit type wins over the column's
    orchestrator.begin_edit_as(EditingCell {
        record_id: "p1".to_string(),
        property_name: "Score".to_string(),
        field_type: Some(FieldType::RichText),
        value: "seven".to_string(),
    });
    orchestrator.commit_edit().await?;

    // no explicit type: the column's declared type applies
    orchestrator.begin_edit_as(EditingCell {
        record_id: "p1".to_string(),
        property_name: "Score".to_string(),
        field_type: None,
        value: "8".to_string(),
    });
    orchestrator.commit_edit().await?;

    let calls = orchestrator.gateway().calls();
    let bodies: Vec<&Value> = update_calls(&calls)
        .into_iter()
        .filter_map(|call| match call {
            GatewayCall::UpdatePage(_, body) => Some(body),
            _ => None,
        })
        .collect();
    assert_eq!(
        bodies,
        vec![
            &json!({"properties": {"Score": {"rich_text": [{"text": {"content": "seven"}}]}}}),
            &json!({"properties": {"Score": {"number": 8.0}}}),
        ]
    );
    assert_eq!(orchestrator.state().rows[0].cell("Score"), "8");
    Ok(())
}

#[tokio::test]
async fn test_sync_commit_without_edit_is_a_no_op() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;
    let calls_before = orchestrator.gateway().calls().len();

    orchestrator.commit_edit().await?;
    assert_eq!(orchestrator.gateway().calls().len(), calls_before);

    orchestrator.begin_edit("p1", "Name");
    assert!(orchestrator.cancel_edit().is_some());
    orchestrator.commit_edit().await?;
    assert_eq!(orchestrator.gateway().calls().len(), calls_before);
    Ok(())
}

#[tokio::test]
async fn test_sync_new_edit_replaces_unsaved_one() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(alpha_records());
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;

    orchestrator.begin_edit("p1", "Name");
    orchestrator.set_edit_value("draft");
    orchestrator.begin_edit("p1", "Score");

    let editing = orchestrator.state().editing.clone();
    assert_eq!(
        editing.map(|e| (e.property_name, e.value)),
        Some(("Score".to_string(), "3".to_string()))
    );
    Ok(())
}

#[tokio::test]
async fn test_sync_commit_changes_only_the_target_cell() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(vec![
        record("p1", json!({"Name": title("Alpha"), "Score": number(3.0)})),
        record("p2", json!({"Name": title("Beta"), "Score": number(4.0)})),
    ]);
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;
    let before = orchestrator.state().rows.clone();

    orchestrator.begin_edit("p2", "Name");
    orchestrator.set_edit_value("Bravo");
    orchestrator.commit_edit().await?;

    let after = &orchestrator.state().rows;
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1].cell("Score"), before[1].cell("Score"));
    assert_eq!(after[1].cell("Name"), "Bravo");
    assert_eq!(after[1].created_at, before[1].created_at);
    Ok(())
}

#[tokio::test]
async fn test_sync_view_derives_from_current_rows() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(vec![
        record("p1", json!({"Name": title("Alpha"), "Stage": select("Done")})),
        record("p2", json!({"Name": title("Beta"), "Stage": select("Todo")})),
        record("p3", json!({"Name": title("Gamma"), "Stage": select("Done")})),
    ]);
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;
    orchestrator.set_view_params(
        ViewParams::default()
            .sorted_by("Name", SortDirection::Descending)
            .grouped_by("Stage"),
    );

    let groups = orchestrator.view();

    let summary: Vec<(String, Vec<String>)> = groups
        .iter()
        .map(|g| {
            (
                g.key.clone(),
                g.rows.iter().map(|r| r.record_id.clone()).collect(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Done".to_string(), vec!["p3".to_string(), "p1".to_string()]),
            ("Todo".to_string(), vec!["p2".to_string()]),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_sync_committed_cell_matches_next_refresh() -> anyhow::Result<()> {
    let gateway = MemoryGateway::new().with_records(vec![record(
        "p1",
        json!({
            "Name": title("Alpha"),
            "Score": number(3.0),
            "Stage": select("Done"),
            "Tags": {"type": "multi_select", "multi_select": [{"name": "x"}]}
        }),
    )]);
    let mut orchestrator = setup_orchestrator(gateway);
    orchestrator.full_sync().await?;

    let edits = [("Stage", " Todo "), ("Tags", "a,, b "), ("Score", "7.50")];
    let mut committed = Vec::new();
    for (property, value) in edits {
        orchestrator.begin_edit("p1", property);
        orchestrator.set_edit_value(value);
        orchestrator.commit_edit().await?;
        committed.push(orchestrator.state().rows[0].cell(property).to_string());
    }
    assert_eq!(committed, vec![" Todo ", "a, b", "7.5"]);

    orchestrator.full_sync().await?;
    let refreshed: Vec<String> = edits
        .iter()
        .map(|(property, _)| orchestrator.state().rows[0].cell(property).to_string())
        .collect();
    assert_eq!(refreshed, committed);
    Ok(())
}
