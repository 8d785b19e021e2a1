//! Test fixtures for creating ticket data.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use helpdesk_core::common::TicketId;
use helpdesk_core::domains::tickets::actions::CreateTicketInput;
use helpdesk_core::domains::tickets::models::{NewTicket, Ticket};
use serde_json::{json, Value};

/// A complete create request for the given detail text.
pub fn ticket_input(detail: &str) -> CreateTicketInput {
    CreateTicketInput {
        detail: Some(detail.to_string()),
        host_name: Some("PC-SOPORTE-01".to_string()),
        incident_type: Some("hardware".to_string()),
        source_ip: Some("192.168.1.20".to_string()),
        image_url: Some("http://files.local/screenshot.png".to_string()),
    }
}

/// The same request as a JSON body.
pub fn ticket_body(detail: &str) -> Value {
    json!({
        "detail": detail,
        "hostName": "PC-SOPORTE-01",
        "incidentType": "hardware",
        "sourceIp": "192.168.1.20",
        "imageUrl": "http://files.local/screenshot.png",
    })
}

/// A ticket as it would exist in data imported from elsewhere.
pub fn existing_ticket(number: i64, created_at: DateTime<Utc>) -> Ticket {
    NewTicket {
        ticket_number: number,
        detail: format!("imported ticket {}", number),
        host_name: "PC-LEGACY".to_string(),
        incident_type: "software".to_string(),
        source_ip: "10.10.0.1".to_string(),
        image_url: "http://files.local/legacy.png".to_string(),
    }
    .into_ticket(TicketId::new(), created_at)
}
