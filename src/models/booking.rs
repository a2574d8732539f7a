use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    // Pending and approved bookings occupy the room; rejected and
    // cancelled ones are ignored by the availability resolver.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Approved)
    }
}

// Serialize times-of-day as "HH:MM"; accept "HH:MM:SS" on the way in
// since the original backend emitted seconds.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let value = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

// A booking record as stored and served; date is the calendar day and
// [start_time, end_time) is a half-open range within it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: u64,
    pub room: String,
    pub user: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub purpose: String,
    // Admin-entered override for where notifications go; empty when unused
    pub faculty_email: String,
    pub status: BookingStatus,
    pub rejection_reason: String,
    pub approved_by: String,
    pub approved_at: String,
    pub created_at: String,
    pub cancelled_at: String,
}

// Request body for submitting a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub room: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub faculty_email: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectBookingRequest {
    #[serde(default)]
    pub rejection_reason: String,
}

// Response wrapper for booking mutations
#[derive(Debug, Serialize)]
pub struct BookingActionResponse {
    pub message: String,
    pub booking: Booking,
}

// Query parameters accepted by the booking listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct BookingFilterParams {
    pub room: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
}

// Query parameters accepted by the availability endpoints
#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub date: NaiveDate,
    pub slot: Option<String>,
}

// Resolved status of one room for a date (and optional slot)
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub room: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    pub status: crate::services::availability::SlotStatus,
}

// One row of the campus-wide availability sweep
#[derive(Debug, Serialize)]
pub struct RoomAvailability {
    pub room: String,
    pub block: String,
    pub capacity: u32,
    pub status: crate::services::availability::SlotStatus,
}
