//! Integration tests using mock HTTP server
//!
//! Tests the full flow: config document → client → HTTP exchanges → JSON

use pretty_assertions::assert_eq;
use quickbase_client::{
    ClientConfig, Error, MemoryTicketStore, QuickbaseClient, RateLimitInfo, TicketStore,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORDERS: &str = "bck7gp3q2";

fn yaml_config(server: &MockServer, extra: &str) -> ClientConfig {
    let yaml = format!(
        r"
realm: acme
baseUrl: {uri}
xmlBaseUrl: {uri}
auth:
  type: user-token
  token: b7738j_tok
throttle:
  enabled: false
retry:
  maxAttempts: 3
  initialDelayMs: 10
  maxDelayMs: 50
{extra}
",
        uri = server.uri()
    );
    ClientConfig::from_yaml_str(&yaml).unwrap()
}

async fn calls_to(server: &MockServer, wanted: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

fn page(ids: std::ops::Range<u64>, skip: u64, total: u64) -> serde_json::Value {
    let data: Vec<_> = ids.map(|id| json!({"3": {"value": id}})).collect();
    json!({
        "data": data,
        "fields": [{"id": 3, "label": "Record ID#", "type": "recordid"}],
        "metadata": {"numRecords": data.len(), "skip": skip, "totalRecords": total, "numFields": 1}
    })
}

// ============================================================================
// Rate Limiting
// ============================================================================

#[tokio::test]
async fn test_retry_after_is_honoured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/tables/{ORDERS}")))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "5")
                .insert_header("qb-api-ray", "ray-1"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/tables/{ORDERS}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": ORDERS})))
        .mount(&server)
        .await;

    let seen: Arc<Mutex<Vec<RateLimitInfo>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let config = ClientConfig::builder(
        "acme",
        quickbase_client::AuthDef::UserToken {
            token: "tok".to_string(),
        },
    )
    .base_url(server.uri())
    .no_throttle()
    .on_rate_limit(move |info| sink.lock().unwrap().push(info.clone()))
    .build();
    let client = QuickbaseClient::new(config).await.unwrap();

    let started = Instant::now();
    let table = client.get_table("bck7gp3q1", ORDERS).await.unwrap();

    assert_eq!(table["id"], json!(ORDERS));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(calls_to(&server, &format!("/tables/{ORDERS}")).await, 2);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].retry_after, Some(5));
    assert_eq!(seen[0].attempt, 1);
    assert_eq!(seen[0].ray_id.as_deref(), Some("ray-1"));
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_query_all_pages_merged() {
    let server = MockServer::start().await;
    for (skip, ids) in [(2u64, 2..4), (4, 4..5)] {
        Mock::given(method("POST"))
            .and(path("/records/query"))
            .and(body_partial_json(json!({"options": {"skip": skip}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(ids, skip, 5)))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0..2, 0, 5)))
        .mount(&server)
        .await;

    let client = QuickbaseClient::new(yaml_config(&server, "")).await.unwrap();
    let merged = client
        .run_query(json!({"from": ORDERS, "select": [3], "options": {"top": 2}}))
        .all()
        .await
        .unwrap();

    assert_eq!(merged["data"].as_array().unwrap().len(), 5);
    assert_eq!(merged["metadata"]["numRecords"], json!(5));
    assert_eq!(merged["metadata"]["totalRecords"], json!(5));
    assert_eq!(calls_to(&server, "/records/query").await, 3);
}

#[tokio::test]
async fn test_auto_paginate_from_config_with_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(2..4, 2, 10)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0..2, 0, 10)))
        .mount(&server)
        .await;

    let client = QuickbaseClient::new(yaml_config(&server, "autoPaginate: true"))
        .await
        .unwrap();
    let limited = client
        .run_query(json!({"from": ORDERS}))
        .paginate(3)
        .await
        .unwrap();

    assert_eq!(limited["data"].as_array().unwrap().len(), 3);
    assert_eq!(limited["data"][2]["3"]["value"], json!(2));
    assert_eq!(calls_to(&server, "/records/query").await, 2);
}

// ============================================================================
// Read-only
// ============================================================================

#[tokio::test]
async fn test_read_only_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0..1, 0, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let client = QuickbaseClient::new(yaml_config(&server, "readOnly: true"))
        .await
        .unwrap();

    let err = client
        .upsert(json!({"to": ORDERS, "data": [{"6": {"value": "x"}}]}))
        .await
        .unwrap_err();
    match err {
        Error::ReadOnly { method, path, .. } => {
            assert_eq!(method, "POST");
            assert_eq!(path.as_deref(), Some("/records"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = client
        .generate_document(1, ORDERS, "invoice")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ReadOnly { .. }));

    let err = client
        .execute_xml("API_AddRecord", ORDERS, "<_fid_6>x</_fid_6>")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ReadOnly { action: Some(_), .. }));

    client.run_query(json!({"from": ORDERS})).await.unwrap();
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
}

// ============================================================================
// Schema aliases
// ============================================================================

#[tokio::test]
async fn test_schema_aliases_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .and(body_json(json!({
            "from": ORDERS,
            "select": [3, 7],
            "where": "{7.GT.100}",
            "sortBy": [{"fieldId": 7, "order": "DESC"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"3": {"value": 1}, "7": {"value": 250}}],
            "fields": [{"id": 3, "label": "Record ID#"}, {"id": 7, "label": "Total"}],
            "metadata": {"numRecords": 1, "skip": 0, "totalRecords": 1, "numFields": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extra = format!(
        "schema:\n  tables:\n    orders:\n      id: {ORDERS}\n      fields:\n        recordId: 3\n        total: 7\n"
    );
    let client = QuickbaseClient::new(yaml_config(&server, &extra)).await.unwrap();

    let result = client
        .call(
            "runQuery",
            &json!({"body": {
                "from": "orders",
                "select": ["recordId", "total"],
                "where": "{total.GT.100}",
                "sortBy": [{"fieldId": "total", "order": "DESC"}]
            }}),
        )
        .unwrap()
        .await
        .unwrap();

    assert_eq!(result["data"][0]["total"]["value"], json!(250));
    assert_eq!(result["data"][0]["recordId"]["value"], json!(1));
}

#[tokio::test]
async fn test_unknown_field_alias_suggests() {
    let server = MockServer::start().await;
    let extra = format!("schema:\n  tables:\n    orders:\n      id: {ORDERS}\n      fields:\n        total: 7\n");
    let client = QuickbaseClient::new(yaml_config(&server, &extra)).await.unwrap();

    let err = client
        .run_query(json!({"from": "orders", "select": ["totl"]}))
        .await
        .unwrap_err();
    match err {
        Error::Schema { suggestion, .. } => assert_eq!(suggestion.as_deref(), Some("total")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

// ============================================================================
// Auth strategies end to end
// ============================================================================

#[tokio::test]
async fn test_temp_tokens_fetched_once_per_table() {
    let server = MockServer::start().await;
    for (dbid, token) in [(ORDERS, "tmp-orders"), ("bck7gp3q3", "tmp-items")] {
        Mock::given(method("GET"))
            .and(path(format!("/auth/temporary/{dbid}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"temporaryAuthorization": token})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fields"))
            .and(query_param("tableId", dbid))
            .and(header("Authorization", format!("QB-TEMP-TOKEN {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;
    }

    let yaml = format!(
        "realm: acme\nbaseUrl: {}\nauth:\n  type: temp-token\nthrottle:\n  enabled: false\n",
        server.uri()
    );
    let client = QuickbaseClient::new(ClientConfig::from_yaml_str(&yaml).unwrap())
        .await
        .unwrap();

    for _ in 0..2 {
        client.get_fields(ORDERS).await.unwrap();
        client.get_fields("bck7gp3q3").await.unwrap();
    }
}

#[tokio::test]
async fn test_ticket_auth_then_json_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/db/main"))
        .and(header("QUICKBASE-ACTION", "API_Authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<qdbapi><action>API_Authenticate</action><errcode>0</errcode>\
             <errtext>No error</errtext><ticket>9_tkt</ticket><userid>112.abc</userid></qdbapi>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apps/bck7gp3q1"))
        .and(header("Authorization", "QB-TICKET 9_tkt"))
        .and(header("QB-Realm-Hostname", "acme.quickbase.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "bck7gp3q1"})))
        .expect(2)
        .mount(&server)
        .await;

    let yaml = format!(
        "realm: acme\nbaseUrl: {uri}\nxmlBaseUrl: {uri}\nauth:\n  type: ticket\n  username: jane@example.com\n  password: s3cret\n  hours: 24\nthrottle:\n  enabled: false\n",
        uri = server.uri()
    );
    let store = Arc::new(MemoryTicketStore::new());
    let client = QuickbaseClient::with_ticket_store(
        ClientConfig::from_yaml_str(&yaml).unwrap(),
        Arc::clone(&store) as Arc<dyn TicketStore>,
    )
    .await
    .unwrap();

    client.get_app("bck7gp3q1").await.unwrap();
    client.get_app("bck7gp3q1").await.unwrap();

    let stored = store.get_item("qb-ticket:acme.quickbase.com").unwrap();
    assert!(stored.contains("9_tkt"));
}

// ============================================================================
// Config loading
// ============================================================================

#[test]
fn test_config_file_formats() {
    let dir = tempfile::tempdir().unwrap();

    let yaml_path = dir.path().join("client.yaml");
    std::fs::write(
        &yaml_path,
        "realm: acme\nauth:\n  type: user-token\n  token: t\nreadOnly: true\n",
    )
    .unwrap();
    let config = ClientConfig::from_file(&yaml_path).unwrap();
    assert!(config.read_only);

    let json_path = dir.path().join("client.json");
    std::fs::write(
        &json_path,
        r#"{"realm": "acme.quickbase.com", "auth": {"type": "sso", "samlAssertion": "<a/>"}}"#,
    )
    .unwrap();
    let config = ClientConfig::from_file(&json_path).unwrap();
    let (resolved, auth) = config.resolve().unwrap();
    assert_eq!(resolved.realm_hostname, "acme.quickbase.com");
    assert_eq!(auth.kind(), quickbase_client::AuthKind::Sso);
}
