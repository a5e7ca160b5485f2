//! Tests for the pagination module

use super::*;
use crate::auth::build_strategy;
use crate::config::{AuthDef, ClientConfig};
use crate::error::Error;
use crate::http::{ApiRequest, RequestExecutor};
use crate::types::{JsonValue, Method};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn records(ids: std::ops::Range<u64>) -> Vec<JsonValue> {
    ids.map(|id| json!({"3": {"value": id}})).collect()
}

fn offset_page(ids: std::ops::Range<u64>, skip: u64, total: u64) -> JsonValue {
    let data = records(ids);
    json!({
        "data": data,
        "fields": [{"id": 3, "label": "Record ID#"}],
        "metadata": {
            "numRecords": data.len(),
            "skip": skip,
            "totalRecords": total,
            "numFields": 1
        }
    })
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn test_detect_styles() {
    assert_eq!(PageStyle::detect(&offset_page(0..2, 0, 5)), PageStyle::Offset);
    assert_eq!(
        PageStyle::detect(&json!({"users": [], "metadata": {"nextPageToken": "abc"}})),
        PageStyle::Cursor {
            list_key: "users".to_string()
        }
    );
    assert_eq!(PageStyle::detect(&json!({"id": "bq1"})), PageStyle::Unpaged);
    assert_eq!(PageStyle::detect(&json!([1, 2])), PageStyle::Unpaged);
}

#[test]
fn test_mode_resolution() {
    assert_eq!(PaginationMode::Default.resolve(false), None);
    assert_eq!(PaginationMode::Default.resolve(true), Some(None));
    assert_eq!(PaginationMode::NoPaginate.resolve(true), None);
    assert_eq!(PaginationMode::All.resolve(false), Some(None));
    assert_eq!(PaginationMode::Limit(7).resolve(false), Some(Some(7)));
}

#[test]
fn test_next_page_offsets() {
    let style = PageStyle::Offset;
    assert_eq!(NextPage::from_page(&style, &offset_page(0..2, 0, 5), 0), NextPage::Skip(2));
    assert_eq!(NextPage::from_page(&style, &offset_page(4..5, 4, 5), 4), NextPage::Done);
    // Zero records stops even when the total claims more
    assert_eq!(NextPage::from_page(&style, &offset_page(0..0, 2, 5), 2), NextPage::Done);
    // metadata.skip wins over the requested offset
    assert_eq!(NextPage::from_page(&style, &offset_page(2..4, 2, 6), 0), NextPage::Skip(4));
}

fn offset_page_without_skip(ids: std::ops::Range<u64>, total: u64) -> JsonValue {
    let data = records(ids);
    json!({
        "data": data,
        "metadata": {"numRecords": data.len(), "totalRecords": total}
    })
}

#[test]
fn test_offset_advances_when_pages_omit_skip() {
    let style = PageStyle::Offset;
    assert_eq!(
        NextPage::from_page(&style, &offset_page_without_skip(2..4, 6), 2),
        NextPage::Skip(4)
    );

    let mut acc = PageAccumulator::start(offset_page_without_skip(0..2, 6), None).unwrap();
    assert_eq!(acc.next_page(), &NextPage::Skip(2));
    acc.push(offset_page_without_skip(2..4, 6));
    assert_eq!(acc.next_page(), &NextPage::Skip(4));
    acc.push(offset_page_without_skip(4..6, 6));
    assert!(acc.next_page().is_done());

    let merged = acc.finish();
    assert_eq!(merged["data"].as_array().unwrap().len(), 6);
    assert_eq!(merged["data"][5], json!({"3": {"value": 5}}));
}

#[test]
fn test_apply_placements() {
    let mut request = ApiRequest::new("runQuery", Method::POST, "/records/query")
        .json(json!({"from": "bq1", "options": {"top": 2}}));
    NextPage::Skip(4).apply(&mut request, PagePlacement::Body).unwrap();
    assert_eq!(
        request.body,
        Some(json!({"from": "bq1", "options": {"top": 2, "skip": 4}}))
    );

    let mut request = ApiRequest::new("runReport", Method::POST, "/reports/{reportId}/run");
    NextPage::Skip(10).apply(&mut request, PagePlacement::Query).unwrap();
    assert_eq!(request.query_value("skip"), Some("10"));

    let mut request = ApiRequest::new("getUsers", Method::POST, "/users");
    NextPage::Token("t2".to_string())
        .apply(&mut request, PagePlacement::Body)
        .unwrap();
    assert_eq!(request.body, Some(json!({"nextPageToken": "t2"})));
}

#[test]
fn test_apply_rejects_non_object_body() {
    let mut request = ApiRequest::new("x", Method::POST, "/x").json(json!([1]));
    let err = NextPage::Skip(1)
        .apply(&mut request, PagePlacement::Body)
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

// ============================================================================
// Accumulation
// ============================================================================

#[test]
fn test_accumulator_merges_metadata() {
    let mut acc = PageAccumulator::start(offset_page(0..2, 0, 5), None).unwrap();
    assert_eq!(acc.next_page(), &NextPage::Skip(2));
    acc.push(offset_page(2..4, 2, 5));
    assert_eq!(acc.next_page(), &NextPage::Skip(4));
    acc.push(offset_page(4..5, 4, 5));
    assert!(acc.next_page().is_done());

    let merged = acc.finish();
    assert_eq!(merged["data"].as_array().unwrap().len(), 5);
    assert_eq!(merged["data"][4], json!({"3": {"value": 4}}));
    assert_eq!(merged["metadata"]["numRecords"], json!(5));
    assert_eq!(merged["metadata"]["totalRecords"], json!(5));
    assert_eq!(merged["metadata"]["numFields"], json!(1));
    assert_eq!(merged["metadata"]["skip"], json!(0));
    assert_eq!(merged["fields"][0]["id"], json!(3));
}

#[test]
fn test_accumulator_trims_overshoot() {
    let mut acc = PageAccumulator::start(offset_page(0..2, 0, 10), Some(3)).unwrap();
    acc.push(offset_page(2..4, 2, 10));
    assert!(acc.next_page().is_done());

    let merged = acc.finish();
    assert_eq!(merged["data"].as_array().unwrap().len(), 3);
    assert_eq!(merged["metadata"]["numRecords"], json!(3));
}

#[test]
fn test_accumulator_limit_on_first_page() {
    let acc = PageAccumulator::start(offset_page(0..4, 0, 10), Some(2)).unwrap();
    assert!(acc.next_page().is_done());
    assert_eq!(acc.len(), 2);
}

#[test]
fn test_accumulator_unpaged_returns_input() {
    let body = json!({"id": "bq1", "name": "Orders"});
    let returned = PageAccumulator::start(body.clone(), None).unwrap_err();
    assert_eq!(returned, body);
}

#[test]
fn test_cursor_accumulation() {
    let first = json!({"users": [{"id": 1}, {"id": 2}], "metadata": {"nextPageToken": "p2"}});
    let mut acc = PageAccumulator::start(first, None).unwrap();
    assert_eq!(acc.next_page(), &NextPage::Token("p2".to_string()));

    acc.push(json!({"users": [{"id": 3}], "metadata": {"nextPageToken": ""}}));
    assert!(acc.next_page().is_done());

    let merged = acc.finish();
    assert_eq!(merged["users"], json!([{"id": 1}, {"id": 2}, {"id": 3}]));
    assert_eq!(merged["metadata"]["nextPageToken"], json!(""));
}

// ============================================================================
// Engine
// ============================================================================

async fn executor(server: &MockServer, auto_paginate: bool) -> RequestExecutor {
    let (resolved, auth) = ClientConfig::builder(
        "acme",
        AuthDef::UserToken {
            token: "tok".to_string(),
        },
    )
    .base_url(server.uri())
    .auto_paginate(auto_paginate)
    .no_throttle()
    .build()
    .resolve()
    .unwrap();
    let http = RequestExecutor::http_client().unwrap();
    let auth = build_strategy(auth, &resolved, http.clone(), None)
        .await
        .unwrap();
    RequestExecutor::new(Arc::new(resolved), auth, http)
}

async fn mount_offset_pages(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page(2..4, 2, 5)))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 4}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page(4..5, 4, 5)))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page(0..2, 0, 5)))
        .mount(server)
        .await;
}

fn query() -> ApiRequest {
    ApiRequest::new("runQuery", Method::POST, "/records/query")
        .json(json!({"from": "bck7gp3q2", "select": [3]}))
}

async fn query_calls(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn test_all_collects_every_record() {
    let server = MockServer::start().await;
    mount_offset_pages(&server).await;
    let exec = executor(&server, false).await;

    let merged = execute_paged(&exec, query(), PaginationMode::All, Some(PagePlacement::Body))
        .await
        .unwrap();
    let ids: Vec<u64> = merged["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["3"]["value"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(merged["metadata"]["numRecords"], json!(5));
    assert_eq!(query_calls(&server).await, 3);
}

#[tokio::test]
async fn test_all_terminates_when_pages_omit_skip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 2}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page_without_skip(2..4, 5)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 4}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page_without_skip(4..5, 5)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page_without_skip(0..2, 5)))
        .mount(&server)
        .await;
    let exec = executor(&server, false).await;

    let merged = execute_paged(&exec, query(), PaginationMode::All, Some(PagePlacement::Body))
        .await
        .unwrap();
    assert_eq!(merged["data"].as_array().unwrap().len(), 5);
    assert_eq!(merged["metadata"]["numRecords"], json!(5));
    assert_eq!(query_calls(&server).await, 3);
}

#[tokio::test]
async fn test_default_mode_single_page() {
    let server = MockServer::start().await;
    mount_offset_pages(&server).await;
    let exec = executor(&server, false).await;

    let page = execute_paged(&exec, query(), PaginationMode::Default, Some(PagePlacement::Body))
        .await
        .unwrap();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(query_calls(&server).await, 1);
}

#[tokio::test]
async fn test_auto_paginate_and_no_paginate_override() {
    let server = MockServer::start().await;
    mount_offset_pages(&server).await;
    let exec = executor(&server, true).await;

    let merged = execute_paged(&exec, query(), PaginationMode::Default, Some(PagePlacement::Body))
        .await
        .unwrap();
    assert_eq!(merged["data"].as_array().unwrap().len(), 5);

    let single = execute_paged(
        &exec,
        query(),
        PaginationMode::NoPaginate,
        Some(PagePlacement::Body),
    )
    .await
    .unwrap();
    assert_eq!(single["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_limit_stops_early() {
    let server = MockServer::start().await;
    mount_offset_pages(&server).await;
    let exec = executor(&server, false).await;

    let merged = execute_paged(&exec, query(), PaginationMode::Limit(3), Some(PagePlacement::Body))
        .await
        .unwrap();
    assert_eq!(merged["data"].as_array().unwrap().len(), 3);
    assert_eq!(merged["metadata"]["numRecords"], json!(3));
    assert_eq!(query_calls(&server).await, 2);
}

#[tokio::test]
async fn test_operation_without_placement_never_pages() {
    let server = MockServer::start().await;
    mount_offset_pages(&server).await;
    let exec = executor(&server, true).await;

    let page = execute_paged(&exec, query(), PaginationMode::All, None).await.unwrap();
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_report_pages_through_query_skip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reports/7/run"))
        .and(query_param("skip", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page(2..3, 2, 3)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/reports/7/run"))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page(0..2, 0, 3)))
        .mount(&server)
        .await;
    let exec = executor(&server, false).await;

    let request = ApiRequest::new("runReport", Method::POST, "/reports/{reportId}/run")
        .path_param("reportId", "7")
        .query("tableId", "bck7gp3q2");
    let merged = execute_paged(&exec, request, PaginationMode::All, Some(PagePlacement::Query))
        .await
        .unwrap();
    assert_eq!(merged["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_cursor_pages_through_body_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_partial_json(json!({"nextPageToken": "p2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"userId": "3"}],
            "metadata": {"nextPageToken": ""}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"userId": "1"}, {"userId": "2"}],
            "metadata": {"nextPageToken": "p2"}
        })))
        .mount(&server)
        .await;
    let exec = executor(&server, false).await;

    let request = ApiRequest::new("getUsers", Method::POST, "/users")
        .query("accountId", "1")
        .json(json!({}));
    let merged = execute_paged(&exec, request, PaginationMode::All, Some(PagePlacement::Body))
        .await
        .unwrap();
    assert_eq!(
        merged["users"],
        json!([{"userId": "1"}, {"userId": "2"}, {"userId": "3"}])
    );
}

#[tokio::test]
async fn test_error_on_later_page_fails_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .and(body_partial_json(json!({"options": {"skip": 2}})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Bad Request"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/records/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(offset_page(0..2, 0, 5)))
        .mount(&server)
        .await;
    let exec = executor(&server, false).await;

    let err = execute_paged(&exec, query(), PaginationMode::All, Some(PagePlacement::Body))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 400, .. }));
}
