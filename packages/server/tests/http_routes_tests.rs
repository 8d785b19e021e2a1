//! Integration tests for the HTTP surface.
//!
//! Requests go through the full router (CORS, tracing, client IP extraction)
//! with `tower::ServiceExt::oneshot`.

mod common;

use std::time::Duration;

use axum::body::{Body, BodyDataStream};
use axum::http::{Method, Request, StatusCode};
use futures::StreamExt;
use helpdesk_core::domains::tickets::models::Ticket;
use helpdesk_core::kernel::{MockHostLookup, TestDependencies, DEFAULT_HOST, INVALID_IP};
use serde_json::json;
use test_context::test_context;
use tower::ServiceExt;

use crate::common::{ticket_body, TestHarness};

/// Append SSE chunks to `received` until it contains `needle`.
async fn read_until(body: &mut BodyDataStream, received: &mut String, needle: &str) {
    while !received.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(1), body.next())
            .await
            .expect("no SSE data within 1s")
            .expect("stream ended")
            .expect("body error");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
}

async fn first_ticket_id(ctx: &TestHarness) -> String {
    let (_, body) = ctx.get_json("/api/tickets").await;
    body[0]["id"].as_str().unwrap().to_string()
}

#[test_context(TestHarness)]
#[tokio::test]
async fn welcome_and_health(ctx: &TestHarness) {
    let (status, body) = ctx.get_json("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("ticket"));

    let (status, body) = ctx.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"]["status"], "ok");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn create_then_list(ctx: &TestHarness) {
    let (status, body) = ctx.post_json("/api/tickets", ticket_body("Laptop fan noise")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ok": true, "status": 200, "message": "Ticket created successfully", "ticketNumber": 1})
    );

    ctx.post_json("/api/tickets", ticket_body("Second")).await;

    let (status, body) = ctx.get_json("/api/tickets").await;
    assert_eq!(status, StatusCode::OK);
    let tickets: Vec<Ticket> = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].detail, "Second");
    assert_eq!(body[1]["status"], "PENDING");
    assert_eq!(body[1]["assignee"], "ON_HOLD");
    assert_eq!(body[1]["ticketNumber"], 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn create_with_missing_field_is_bad_request(ctx: &TestHarness) {
    let mut body = ticket_body("Broken chair");
    body.as_object_mut().unwrap().remove("imageUrl");

    let (status, body) = ctx.post_json("/api/tickets", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "Missing required field: imageUrl");
    assert!(body.get("ticketNumber").is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn lifecycle_routes_map_outcomes_to_status_codes(ctx: &TestHarness) {
    ctx.post_json("/api/tickets", ticket_body("Phone dead")).await;
    let id = first_ticket_id(ctx).await;

    let (status, _) = ctx.post_json("/api/tickets/finalize", json!({ "id": id })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = ctx
        .post_json("/api/tickets/assign", json!({ "id": id, "assignee": "Pedro" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Assignee set successfully");

    let (status, body) = ctx.post_json("/api/tickets/finalize", json!({ "id": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Ticket finalized");

    let (status, _) = ctx.post_json("/api/tickets/cancel", json!({ "id": id })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = ctx.get_json("/api/tickets").await;
    assert_eq!(body[0]["status"], "FINALIZED");
    assert_eq!(body[0]["assignee"], "Pedro");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn bad_ids_and_assignees(ctx: &TestHarness) {
    let (status, body) = ctx
        .post_json("/api/tickets/cancel", json!({ "id": "not-a-ticket" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Ticket not found");

    let unknown = helpdesk_core::common::TicketId::new().to_string();
    let (status, _) = ctx.post_json("/api/tickets/finalize", json!({ "id": unknown })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx.post_json("/api/tickets/cancel", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.post_json("/api/tickets", ticket_body("Needs someone")).await;
    let id = first_ticket_id(ctx).await;
    let (status, body) = ctx.post_json("/api/tickets/assign", json!({ "id": id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required field: assignee");
}

#[tokio::test]
async fn capture_reports_host_for_forwarded_ip() {
    let lookup = MockHostLookup::new().with_host("192.168.1.44", "PC-CONTABILIDAD");
    let ctx = TestHarness::with_deps(TestDependencies::new().with_host_lookup(lookup.clone())).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/capture")
        .header("x-forwarded-for", "::ffff:192.168.1.44, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let (status, body) = ctx.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ip": "192.168.1.44", "hostName": "PC-CONTABILIDAD"}));
    assert_eq!(lookup.calls(), vec!["192.168.1.44".to_string()]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn capture_placeholders(ctx: &TestHarness) {
    let request = Request::builder()
        .uri("/capture")
        .header("x-real-ip", "2001:db8::5")
        .body(Body::empty())
        .unwrap();
    let (_, body) = ctx.send(request).await;
    assert_eq!(body["hostName"], INVALID_IP);

    let request = Request::builder()
        .uri("/capture")
        .header("x-real-ip", "172.16.5.5")
        .body(Body::empty())
        .unwrap();
    let (status, body) = ctx.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ip": "172.16.5.5", "hostName": DEFAULT_HOST}));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn sse_stream_sends_connected_then_changes(ctx: &TestHarness) {
    let request = Request::builder()
        .uri("/api/tickets/stream")
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body().into_data_stream();
    let mut received = String::new();
    read_until(&mut body, &mut received, "event: connected").await;

    ctx.post_json("/api/tickets", ticket_body("Streamed")).await;

    read_until(&mut body, &mut received, "event: ticketChange").await;
    assert!(received.contains("\"detail\":\"Streamed\""));
}
