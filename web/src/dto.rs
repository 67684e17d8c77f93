//! Request and response bodies. Field names are camelCase on the wire;
//! domain types stay snake_case internally and are mapped at this boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketq_core::{Event, QueueStatus, Reservation, ReservationCounts, ReservationStatus, Role, User};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self { id: u.id.to_string(), email: u.email, name: u.name, role: u.role }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub name: String,
    pub total_seats: u32,
    pub sales_start_at: DateTime<Utc>,
    pub sales_end_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub name: String,
    pub total_seats: u32,
    pub sales_start_at: DateTime<Utc>,
    pub sales_end_at: DateTime<Utc>,
    pub remaining_seats: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatsResponse {
    pub event_id: String,
    pub remaining_seats: u32,
    pub queue_length: u64,
    pub active_count: u64,
    pub reservation_counts: ReservationCounts,
}

pub fn event_response(event: Event, remaining_seats: u32) -> EventResponse {
    EventResponse {
        id: event.id.to_string(),
        name: event.name,
        total_seats: event.total_seats,
        sales_start_at: event.sales_start_at,
        sales_end_at: event.sales_end_at,
        remaining_seats,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    pub event_id: String,
    pub position: Option<u64>,
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<ticketq_queue::QueueStatusView> for QueueStatusResponse {
    fn from(v: ticketq_queue::QueueStatusView) -> Self {
        Self {
            event_id: v.event_id.to_string(),
            position: v.position,
            status: v.status,
            reservation_id: v.reservation_id.map(|id| id.to_string()),
            expires_at: v.expires_at,
            message: v.message,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub id: String,
    pub event_id: String,
    pub status: ReservationStatus,
    pub deadline: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id.to_string(),
            event_id: r.event_id.to_string(),
            status: r.status,
            deadline: r.deadline,
            paid_at: r.paid_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketq_core::{EventId, ReservationId, UserId};

    #[test]
    fn event_response_round_trips_camel_case() {
        let event = Event {
            id: EventId::new(),
            name: "Launch Party".to_string(),
            total_seats: 200,
            sales_start_at: Utc::now(),
            sales_end_at: Utc::now() + chrono::Duration::hours(2),
        };
        let response = event_response(event, 150);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"totalSeats\":200"));
        assert!(json.contains("\"remainingSeats\":150"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "Launch Party");
    }

    #[test]
    fn queue_status_response_omits_absent_optionals() {
        let view = ticketq_queue::QueueStatusView {
            event_id: EventId::new(),
            position: Some(3),
            status: QueueStatus::Waiting,
            reservation_id: None,
            expires_at: None,
            message: None,
        };
        let response: QueueStatusResponse = view.into();

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("reservationId"));
        assert!(!json.contains("expiresAt"));
        assert!(!json.contains("message"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["position"], 3);
        assert_eq!(value["status"], "WAITING");
    }

    #[test]
    fn queue_status_response_includes_populated_optionals() {
        let view = ticketq_queue::QueueStatusView {
            event_id: EventId::new(),
            position: None,
            status: QueueStatus::Active,
            reservation_id: Some(ReservationId::new()),
            expires_at: Some(Utc::now()),
            message: Some("promoted".to_string()),
        };
        let response: QueueStatusResponse = view.into();

        let value: serde_json::Value = serde_json::to_value(&response).unwrap();
        assert!(value.get("reservationId").is_some());
        assert!(value.get("expiresAt").is_some());
        assert_eq!(value["message"], "promoted");
    }

    #[test]
    fn reservation_response_round_trips_status_as_screaming_snake_case() {
        let reservation = Reservation {
            id: ReservationId::new(),
            event_id: EventId::new(),
            user_id: UserId::new(),
            status: ReservationStatus::PendingPayment,
            deadline: Utc::now(),
            paid_at: None,
        };
        let response: ReservationResponse = reservation.into();

        let value: serde_json::Value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "PENDING_PAYMENT");
        assert!(value["paidAt"].is_null());
    }
}
