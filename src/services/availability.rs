use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::debug;

use crate::models::booking::{Booking, BookingStatus};

// Total approved minutes at or above which a room/date counts as fully
// booked. Fixed policy constant, not configurable per room.
pub const DAILY_CAPACITY_MINUTES: i64 = 300;

// Derived room status for one date, or for one candidate slot within it.
// Recomputed from the booking snapshot on every call; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Pending,
    Booked,
    PartiallyBooked,
    FullyBooked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Pending => "pending",
            SlotStatus::Booked => "booked",
            SlotStatus::PartiallyBooked => "partially_booked",
            SlotStatus::FullyBooked => "fully_booked",
        }
    }
}

// A half-open [start, end) time-of-day range within one calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Slot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, String> {
        if start >= end {
            return Err(format!(
                "Slot start {} must be before end {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            ));
        }
        Ok(Self { start, end })
    }

    // Parse a "HH:MM-HH:MM" label into a slot
    pub fn parse(label: &str) -> Result<Self, String> {
        let (start_str, end_str) = label
            .split_once('-')
            .ok_or_else(|| format!("Invalid slot format '{}', expected HH:MM-HH:MM", label))?;

        let start = parse_time(start_str)?;
        let end = parse_time(end_str)?;
        Slot::new(start, end)
    }
}

// Parse a "HH:MM" time-of-day; malformed input is rejected rather than
// coerced so corrupt upstream data surfaces instead of being masked
pub fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
        .map_err(|e| format!("Invalid time '{}': {}", value, e))
}

// Two half-open intervals [a_start, a_end) and [b_start, b_end) on the
// same date intersect iff a_start < b_end && b_start < a_end. Touching
// endpoints do not overlap.
pub fn overlaps(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

// Select the bookings for one room and date, preserving snapshot order
pub fn bookings_for<'a>(bookings: &'a [Booking], room: &str, date: NaiveDate) -> Vec<&'a Booking> {
    bookings
        .iter()
        .filter(|b| b.room == room && b.date == date)
        .collect()
}

fn duration_minutes(booking: &Booking) -> i64 {
    (booking.end_time - booking.start_time).num_minutes()
}

// Resolve the status of a room on a date, either for a specific candidate
// slot or for the whole day. Every surface that renders room status calls
// this one resolver. Absence of data yields Available.
pub fn slot_status(
    bookings: &[Booking],
    room: &str,
    date: NaiveDate,
    slot: Option<Slot>,
) -> SlotStatus {
    let active: Vec<&Booking> = bookings_for(bookings, room, date)
        .into_iter()
        .filter(|b| b.status.is_active())
        .collect();

    if let Some(slot) = slot {
        let overlapping: Vec<&&Booking> = active
            .iter()
            .filter(|b| overlaps(slot.start, slot.end, b.start_time, b.end_time))
            .collect();

        if overlapping.is_empty() {
            return SlotStatus::Available;
        }
        // Pending requests block the slot but are shown distinctly from
        // confirmed conflicts
        if overlapping
            .iter()
            .any(|b| b.status == BookingStatus::Pending)
        {
            return SlotStatus::Pending;
        }
        return SlotStatus::Booked;
    }

    if active.is_empty() {
        return SlotStatus::Available;
    }

    // A pending booking anywhere in the day dominates the whole-day status
    if active.iter().any(|b| b.status == BookingStatus::Pending) {
        return SlotStatus::Pending;
    }

    let total_minutes: i64 = active
        .iter()
        .filter(|b| b.status == BookingStatus::Approved)
        .map(|b| duration_minutes(b))
        .sum();

    debug!(
        "Room {} on {} has {} approved minutes booked",
        room, date, total_minutes
    );

    if total_minutes >= DAILY_CAPACITY_MINUTES {
        SlotStatus::FullyBooked
    } else {
        SlotStatus::PartiallyBooked
    }
}
