//! Ticket lifecycle and listing routes.
//!
//! Handlers translate JSON bodies into action calls and use the outcome's
//! `status` as the HTTP status. Ids travel in the body; an id that does not
//! parse is answered exactly like an unknown one.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Deserialize;

use crate::common::TicketId;
use crate::domains::tickets::actions::{
    assign_ticket, cancel_ticket, create_ticket, finalize_ticket, list_tickets, CreateTicketInput,
    TicketOutcome,
};
use crate::domains::tickets::errors::TicketError;
use crate::domains::tickets::models::Ticket;
use crate::server::app::AppState;

pub type OutcomeResponse = (StatusCode, Json<TicketOutcome>);

#[derive(Debug, Deserialize)]
pub struct TicketIdRequest {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub id: Option<String>,
    pub assignee: Option<String>,
}

fn respond(outcome: TicketOutcome) -> OutcomeResponse {
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome))
}

fn parse_id(raw: Option<&str>) -> Result<TicketId, TicketError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TicketError::Validation("Missing required field: id".into()))?;
    TicketId::parse(raw).map_err(|_| TicketError::NotFound)
}

pub async fn create_ticket_handler(
    Extension(state): Extension<AppState>,
    Json(input): Json<CreateTicketInput>,
) -> OutcomeResponse {
    respond(create_ticket(input, &state.deps).await)
}

pub async fn list_tickets_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<Ticket>>, OutcomeResponse> {
    list_tickets(&state.deps)
        .await
        .map(Json)
        .map_err(|e| respond(e.into()))
}

pub async fn cancel_ticket_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<TicketIdRequest>,
) -> OutcomeResponse {
    let outcome = match parse_id(body.id.as_deref()) {
        Ok(id) => cancel_ticket(id, &state.deps).await,
        Err(e) => e.into(),
    };
    respond(outcome)
}

pub async fn assign_ticket_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<AssignRequest>,
) -> OutcomeResponse {
    let outcome = match parse_id(body.id.as_deref()) {
        Ok(id) => assign_ticket(id, body.assignee.as_deref().unwrap_or_default(), &state.deps).await,
        Err(e) => e.into(),
    };
    respond(outcome)
}

pub async fn finalize_ticket_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<TicketIdRequest>,
) -> OutcomeResponse {
    let outcome = match parse_id(body.id.as_deref()) {
        Ok(id) => finalize_ticket(id, &state.deps).await,
        Err(e) => e.into(),
    };
    respond(outcome)
}
