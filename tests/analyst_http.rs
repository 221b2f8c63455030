use axum::{
    extract::{ Path, Query },
    http::{ HeaderMap, StatusCode },
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use cortex_analyst_chat::analyst::client::CortexAnalystClient;
use cortex_analyst_chat::analyst::AnalystService;
use cortex_analyst_chat::error::AnalystError;
use cortex_analyst_chat::llm::chat::cortex::CortexCompleteClient;
use cortex_analyst_chat::llm::chat::ChatClient;
use cortex_analyst_chat::models::analyst::ContentItem;
use cortex_analyst_chat::snowflake::{ SnowflakeConfig, SqlApiClient, SqlApiError, TokenType };
use serde_json::{ json, Value };
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };

const TOKEN: &str = "test-token";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false) &&
        headers
            .get("x-snowflake-authorization-token-type")
            .map(|v| v == "OAUTH")
            .unwrap_or(false)
}

async fn analyst_message(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }
    let question = body["messages"][0]["content"][0]["text"].as_str().unwrap_or("").to_string();
    match question.as_str() {
        "too long" =>
            (
                StatusCode::BAD_REQUEST,
                [("x-snowflake-request-id", "req-400")],
                r#"{"message":"prompt too long"}"#,
            ).into_response(),
        "ambiguous" =>
            (
                [("x-snowflake-request-id", "req-amb")],
                Json(
                    json!({
                    "message": { "role": "analyst", "content": [
                        { "type": "text", "text": "Your question is ambiguous" },
                        { "type": "suggestions", "suggestions": ["A", "B"] }
                    ] }
                })
                ),
            ).into_response(),
        "chart" =>
            (
                [("x-snowflake-request-id", "req-chart")],
                Json(json!({ "message": { "content": [{ "type": "chart", "chart_spec": "{}" }] } })),
            ).into_response(),
        _ =>
            (
                [("x-snowflake-request-id", "req-200")],
                Json(
                    json!({
                    "message": { "role": "analyst", "content": [
                        { "type": "text", "text": format!("model {}", body["semantic_model_file"].as_str().unwrap_or("")) },
                        { "type": "sql", "statement": "SELECT tower, SUM(traffic) FROM cells GROUP BY tower" }
                    ] }
                })
                ),
            ).into_response(),
    }
}

async fn submit_statement(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }
    let statement = body["statement"].as_str().unwrap_or("");
    if statement.contains("snowflake.cortex.complete") {
        let model = body["bindings"]["1"]["value"].as_str().unwrap_or("");
        let prompt = body["bindings"]["2"]["value"].as_str().unwrap_or("");
        return Json(
            json!({
            "statementHandle": "h-complete",
            "resultSetMetaData": { "rowType": [{ "name": "RESPONSE" }], "partitionInfo": [{}] },
            "data": [[format!("{} says: {}", model, prompt)]]
        })
        ).into_response();
    }
    if statement.contains("missing_table") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Object 'MISSING_TABLE' does not exist or not authorized." })),
        ).into_response();
    }
    (
        StatusCode::ACCEPTED,
        Json(json!({ "statementHandle": "h-1", "message": "Asynchronous execution in progress." })),
    ).into_response()
}

async fn statement_status(
    Path(handle): Path<String>,
    Query(params): Query<HashMap<String, String>>
) -> Response {
    if handle != "h-1" {
        return (StatusCode::NOT_FOUND, "unknown handle").into_response();
    }
    match params.get("partition").map(String::as_str) {
        Some("1") => Json(json!({ "data": [["T3", "5"]] })).into_response(),
        _ =>
            Json(
                json!({
                "statementHandle": "h-1",
                "resultSetMetaData": {
                    "rowType": [{ "name": "TOWER" }, { "name": "TRAFFIC" }],
                    "partitionInfo": [{ "rowCount": 2 }, { "rowCount": 1 }]
                },
                "data": [["T1", "10"], ["T2", "7"]]
            })
            ).into_response(),
    }
}

async fn spawn_mock() -> Arc<SnowflakeConfig> {
    let app = Router::new()
        .route("/api/v2/cortex/analyst/message", post(analyst_message))
        .route("/api/v2/statements", post(submit_statement))
        .route("/api/v2/statements/{handle}", get(statement_status));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    Arc::new(SnowflakeConfig::new(format!("http://{}", addr), TOKEN, TokenType::OAuth))
}

#[tokio::test]
async fn analyst_success_keeps_header_request_id() {
    let config = spawn_mock().await;
    let client = CortexAnalystClient::new(config, "@DATA/semantic_model.yaml").unwrap();

    let resp = client.send("What is total traffic by tower?").await.unwrap();

    assert_eq!(resp.request_id, "req-200");
    assert_eq!(resp.content, vec![
        ContentItem::Text { text: "model @DATA/semantic_model.yaml".into() },
        ContentItem::Sql { statement: "SELECT tower, SUM(traffic) FROM cells GROUP BY tower".into() }
    ]);
}

#[tokio::test]
async fn analyst_error_status_is_request_failed_with_id() {
    let config = spawn_mock().await;
    let client = CortexAnalystClient::new(config, "@DATA/semantic_model.yaml").unwrap();

    let err = client.send("too long").await.unwrap_err();

    match &err {
        AnalystError::RequestFailed { request_id, status, body } => {
            assert_eq!(request_id.as_deref(), Some("req-400"));
            assert_eq!(*status, 400);
            assert!(body.contains("prompt too long"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().starts_with("Failed request (id: req-400) with status 400"));
}

#[tokio::test]
async fn analyst_suggestions_and_unknown_items() {
    let config = spawn_mock().await;
    let client = CortexAnalystClient::new(config, "@DATA/semantic_model.yaml").unwrap();

    let resp = client.send("ambiguous").await.unwrap();
    assert_eq!(resp.content[1], ContentItem::Suggestions { options: vec!["A".into(), "B".into()] });

    let err = client.send("chart").await.unwrap_err();
    assert!(matches!(err, AnalystError::MalformedResponse { .. }));
    assert_eq!(err.request_id(), Some("req-chart"));
}

#[tokio::test]
async fn unreachable_host_is_reported_without_id() {
    let config = Arc::new(SnowflakeConfig::new("http://127.0.0.1:9", TOKEN, TokenType::OAuth));
    let client = CortexAnalystClient::new(config, "@DATA/semantic_model.yaml").unwrap();

    let err = client.send("anything").await.unwrap_err();
    assert!(matches!(err, AnalystError::Unreachable { .. }));
    assert_eq!(err.request_id(), None);
}

/// Sends the response headers, then closes the socket midway through the
/// declared body.
async fn spawn_truncating_analyst() -> Arc<SnowflakeConfig> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let declared = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + declared {
                    break;
                }
            }
        }
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\nx-snowflake-request-id: req-cut\r\ncontent-length: 200\r\n\r\n{\"message\":"
            ).await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    Arc::new(SnowflakeConfig::new(format!("http://{}", addr), TOKEN, TokenType::OAuth))
}

#[tokio::test]
async fn dropped_body_keeps_header_request_id() {
    let config = spawn_truncating_analyst().await;
    let client = CortexAnalystClient::new(config, "@DATA/semantic_model.yaml").unwrap();

    let err = client.send("anything").await.unwrap_err();

    assert!(matches!(err, AnalystError::Unreachable { .. }));
    assert_eq!(err.request_id(), Some("req-cut"));
    assert!(err.to_string().starts_with("Analyst service unreachable (id: req-cut)"));
}

#[tokio::test]
async fn sql_api_polls_and_collects_every_partition() {
    let config = spawn_mock().await;
    let sql_api = SqlApiClient::new(config).unwrap();

    let result = sql_api.execute("SELECT tower, SUM(traffic) FROM cells GROUP BY tower", &[]).await.unwrap();

    assert_eq!(result.columns, vec!["TOWER".to_string(), "TRAFFIC".to_string()]);
    assert_eq!(result.row_count(), 3);
    assert_eq!(result.rows[2], vec![json!("T3"), json!("5")]);
}

#[tokio::test]
async fn sql_api_error_status_carries_message() {
    let config = spawn_mock().await;
    let sql_api = SqlApiClient::new(config).unwrap();

    match sql_api.execute("SELECT * FROM missing_table", &[]).await {
        Err(SqlApiError::Status { status, message }) => {
            assert_eq!(status, 422);
            assert!(message.contains("does not exist"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn cortex_complete_binds_model_and_prompt() {
    let config = spawn_mock().await;
    let sql_api = SqlApiClient::new(config).unwrap();
    let client = CortexCompleteClient::new(sql_api, None);

    let resp = client.complete("summarize this").await.unwrap();

    assert_eq!(client.get_model(), "llama3.1-70b");
    assert_eq!(resp.response, "llama3.1-70b says: summarize this");
}
