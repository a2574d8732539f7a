use dotenv::dotenv;
use reqwest::Client;
use serde::Serialize;
use std::env;
use tracing::{debug, info};

use crate::auth::AuthService;
use crate::models::booking::Booking;

// Event posted to the notification webhook when a booking changes state.
// Carries what the original emails carried: who to tell, which room,
// when, and why.
#[derive(Debug, Serialize)]
pub struct BookingEvent {
    pub event: &'static str,
    pub recipient: String,
    pub username: String,
    pub room: String,
    pub date: String,
    pub time: String,
    pub purpose: String,
    pub detail: String,
}

impl BookingEvent {
    fn from_booking(event: &'static str, booking: &Booking, recipient: &str, detail: String) -> Self {
        Self {
            event,
            recipient: recipient.to_string(),
            username: booking.user.clone(),
            room: booking.room.clone(),
            date: booking.date.to_string(),
            time: format!(
                "{}-{}",
                booking.start_time.format("%H:%M"),
                booking.end_time.format("%H:%M")
            ),
            purpose: booking.purpose.clone(),
            detail,
        }
    }

    pub fn confirmed(booking: &Booking, recipient: &str) -> Self {
        Self::from_booking(
            "booking_confirmed",
            booking,
            recipient,
            "Your booking has been confirmed.".to_string(),
        )
    }

    pub fn approved(booking: &Booking, recipient: &str) -> Self {
        Self::from_booking(
            "booking_approved",
            booking,
            recipient,
            format!(
                "Your booking has been approved by {}.",
                if booking.approved_by.is_empty() {
                    "the system"
                } else {
                    booking.approved_by.as_str()
                }
            ),
        )
    }

    pub fn rejected(booking: &Booking, recipient: &str) -> Self {
        Self::from_booking(
            "booking_rejected",
            booking,
            recipient,
            if booking.rejection_reason.is_empty() {
                "Your booking has been rejected. No reason provided.".to_string()
            } else {
                format!(
                    "Your booking has been rejected. Reason: {}",
                    booking.rejection_reason
                )
            },
        )
    }

    pub fn cancelled(booking: &Booking, recipient: &str) -> Self {
        Self::from_booking(
            "booking_cancelled",
            booking,
            recipient,
            "Your booking has been cancelled.".to_string(),
        )
    }
}

/// Client for the notification webhook service
pub struct NotificationClient {
    client: Client,
    endpoint: String,
    secret_id: String,
    secret_key: String,
}

impl NotificationClient {
    /// Create a client from environment variables; None when no endpoint
    /// is configured, which disables notification delivery
    pub fn from_env() -> Option<Self> {
        dotenv().ok();

        let endpoint = env::var("ROOMSYNC_NOTIFY_ENDPOINT").ok()?;

        Some(Self {
            client: Client::new(),
            endpoint,
            secret_id: env::var("ROOMSYNC_NOTIFY_SECRET_ID")
                .expect("ROOMSYNC_NOTIFY_SECRET_ID must be set in environment"),
            secret_key: env::var("ROOMSYNC_NOTIFY_SECRET_KEY")
                .expect("ROOMSYNC_NOTIFY_SECRET_KEY must be set in environment"),
        })
    }

    /// Post a booking event to the webhook with signed headers
    pub async fn send_event(&self, event: &BookingEvent) -> Result<(), String> {
        let method = "POST";
        let uri = "/events";
        let url = format!("{}{}", self.endpoint, uri);

        let body = serde_json::to_string(event)
            .map_err(|e| format!("Failed to serialize event: {}", e))?;

        let timestamp = AuthService::get_timestamp();
        let nonce = AuthService::generate_nonce();
        let signature = AuthService::generate_signature(
            &self.secret_id,
            &self.secret_key,
            method,
            uri,
            timestamp,
            &nonce,
            &body,
        );

        info!(
            "Sending {} notification for room {} to {}",
            event.event, event.room, event.recipient
        );
        debug!("Notification URL: {}", url);

        let res = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-RS-Key", &self.secret_id)
            .header("X-RS-Timestamp", timestamp.to_string())
            .header("X-RS-Nonce", &nonce)
            .header("X-RS-Signature", signature)
            .body(body)
            .send()
            .await
            .map_err(|e| format!("Failed to send notification: {}", e))?;

        debug!("Notification response status: {}", res.status());

        if !res.status().is_success() {
            return Err(format!(
                "Notification endpoint returned status {}",
                res.status()
            ));
        }

        Ok(())
    }
}
