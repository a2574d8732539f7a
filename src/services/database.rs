use chrono::Utc;
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::models::booking::{Booking, BookingStatus, CreateBookingRequest};
use crate::services::availability;

// Store failures handlers can map onto the HTTP taxonomy
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

const BOOKING_HEADERS: [&str; 14] = [
    "id",
    "room",
    "user",
    "date",
    "start_time",
    "end_time",
    "purpose",
    "faculty_email",
    "status",
    "rejection_reason",
    "approved_by",
    "approved_at",
    "created_at",
    "cancelled_at",
];

// CSV-backed store for booking records
pub struct BookingStore {
    csv_path: String,
    file_mutex: Mutex<()>,
}

impl BookingStore {
    pub fn new(csv_path: &str) -> Self {
        // Create the CSV file with headers if it doesn't exist yet
        if !Path::new(csv_path).exists() {
            info!("Creating new bookings database file at {}", csv_path);

            let file = File::create(csv_path).unwrap_or_else(|e| {
                error!("Failed to create bookings file: {}", e);
                panic!("Failed to create bookings file: {}", e)
            });

            let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

            if let Err(e) = writer.write_record(BOOKING_HEADERS) {
                error!("Failed to write booking headers: {}", e);
                panic!("Failed to write booking headers: {}", e);
            }

            if let Err(e) = writer.flush() {
                error!("Failed to flush booking headers: {}", e);
                panic!("Failed to flush booking headers: {}", e);
            }
        }

        Self {
            csv_path: csv_path.to_string(),
            file_mutex: Mutex::new(()),
        }
    }

    // Read every record; the caller must hold the file mutex
    fn read_all(&self) -> Result<Vec<Booking>, StoreError> {
        if !Path::new(&self.csv_path).exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.csv_path)
            .map_err(|e| StoreError::Storage(format!("Failed to open bookings file: {}", e)))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut bookings = Vec::new();

        for result in reader.deserialize() {
            let booking: Booking = result
                .map_err(|e| StoreError::Storage(format!("Failed to read booking record: {}", e)))?;
            bookings.push(booking);
        }

        Ok(bookings)
    }

    // Rewrite the whole file; the caller must hold the file mutex
    fn write_all(&self, bookings: &[Booking]) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.csv_path)
            .map_err(|e| {
                StoreError::Storage(format!("Failed to open bookings file for writing: {}", e))
            })?;

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

        for booking in bookings {
            writer
                .serialize(booking)
                .map_err(|e| StoreError::Storage(format!("Failed to write booking record: {}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| StoreError::Storage(format!("Failed to flush bookings file: {}", e)))?;

        Ok(())
    }

    fn append(&self, booking: &Booking) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| StoreError::Storage(format!("Failed to open bookings file: {}", e)))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        writer
            .serialize(booking)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize booking: {}", e)))?;

        writer
            .flush()
            .map_err(|e| StoreError::Storage(format!("Failed to flush bookings file: {}", e)))?;

        Ok(())
    }

    // Find an approved booking whose range overlaps the candidate.
    // Only approved bookings hard-block a range; overlapping pending
    // requests coexist and surface as pending status.
    fn approved_conflict(
        bookings: &[Booking],
        candidate: &Booking,
    ) -> Option<u64> {
        bookings
            .iter()
            .filter(|b| {
                b.id != candidate.id
                    && b.room == candidate.room
                    && b.date == candidate.date
                    && b.status == BookingStatus::Approved
            })
            .find(|b| {
                availability::overlaps(
                    candidate.start_time,
                    candidate.end_time,
                    b.start_time,
                    b.end_time,
                )
            })
            .map(|b| b.id)
    }

    pub fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        self.read_all()
    }

    pub fn find_booking(&self, id: u64) -> Result<Option<Booking>, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        Ok(self.read_all()?.into_iter().find(|b| b.id == id))
    }

    /// Create a booking for the given requester
    ///
    /// Admin-created bookings are approved immediately; everyone else's
    /// start pending. The range is validated and rejected if it overlaps
    /// an approved booking for the same room and date.
    pub fn create_booking(
        &self,
        request: &CreateBookingRequest,
        user: &str,
        auto_approve: bool,
    ) -> Result<Booking, StoreError> {
        if request.start_time >= request.end_time {
            return Err(StoreError::Invalid(
                "End time must be after start time.".to_string(),
            ));
        }

        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let bookings = self.read_all()?;
        let next_id = bookings.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        let now = Utc::now().to_rfc3339();

        let mut booking = Booking {
            id: next_id,
            room: request.room.clone(),
            user: user.to_string(),
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            purpose: request.purpose.clone(),
            faculty_email: request.faculty_email.clone(),
            status: BookingStatus::Pending,
            rejection_reason: String::new(),
            approved_by: String::new(),
            approved_at: String::new(),
            created_at: now.clone(),
            cancelled_at: String::new(),
        };

        if let Some(conflict_id) = Self::approved_conflict(&bookings, &booking) {
            warn!(
                "Booking request for room {} on {} conflicts with booking {}",
                booking.room, booking.date, conflict_id
            );
            return Err(StoreError::Conflict(
                "Room already booked for that time.".to_string(),
            ));
        }

        if auto_approve {
            booking.status = BookingStatus::Approved;
            booking.approved_by = user.to_string();
            booking.approved_at = now;
        }

        self.append(&booking)?;

        info!(
            "Stored booking {} for room {} on {} ({} {}-{}, {})",
            booking.id,
            booking.room,
            booking.date,
            booking.user,
            booking.start_time.format("%H:%M"),
            booking.end_time.format("%H:%M"),
            booking.status.as_str()
        );

        Ok(booking)
    }

    /// Approve a pending booking
    ///
    /// Approval re-runs the conflict check so that two overlapping pending
    /// requests can never both end up approved.
    pub fn approve_booking(&self, id: u64, approver: &str) -> Result<Booking, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let mut bookings = self.read_all()?;

        let position = bookings
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Booking {} not found", id)))?;

        if bookings[position].status != BookingStatus::Pending {
            return Err(StoreError::Invalid(format!(
                "Cannot approve booking with status: {}",
                bookings[position].status.as_str()
            )));
        }

        if let Some(conflict_id) = Self::approved_conflict(&bookings, &bookings[position]) {
            warn!(
                "Cannot approve booking {}: conflicts with approved booking {}",
                id, conflict_id
            );
            return Err(StoreError::Conflict(
                "Room already booked for that time.".to_string(),
            ));
        }

        bookings[position].status = BookingStatus::Approved;
        bookings[position].approved_by = approver.to_string();
        bookings[position].approved_at = Utc::now().to_rfc3339();

        self.write_all(&bookings)?;

        info!("Booking {} approved by {}", id, approver);
        Ok(bookings[position].clone())
    }

    /// Reject a pending booking, recording who rejected it and why
    pub fn reject_booking(
        &self,
        id: u64,
        rejecter: &str,
        reason: &str,
    ) -> Result<Booking, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let mut bookings = self.read_all()?;

        let position = bookings
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Booking {} not found", id)))?;

        if bookings[position].status != BookingStatus::Pending {
            return Err(StoreError::Invalid(format!(
                "Cannot reject booking with status: {}",
                bookings[position].status.as_str()
            )));
        }

        bookings[position].status = BookingStatus::Rejected;
        bookings[position].rejection_reason = reason.to_string();
        bookings[position].approved_by = rejecter.to_string();
        bookings[position].approved_at = Utc::now().to_rfc3339();

        self.write_all(&bookings)?;

        info!("Booking {} rejected by {}", id, rejecter);
        Ok(bookings[position].clone())
    }

    /// Cancel a booking regardless of its current active state
    pub fn cancel_booking(&self, id: u64) -> Result<Booking, StoreError> {
        let _lock = self
            .file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))?;

        let mut bookings = self.read_all()?;

        let position = bookings
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Booking {} not found", id)))?;

        if bookings[position].status == BookingStatus::Cancelled {
            return Err(StoreError::Invalid(
                "Booking is already cancelled".to_string(),
            ));
        }

        bookings[position].status = BookingStatus::Cancelled;
        bookings[position].cancelled_at = Utc::now().to_rfc3339();

        self.write_all(&bookings)?;

        info!("Booking {} cancelled", id);
        Ok(bookings[position].clone())
    }
}

// Create a singleton booking store from the environment
pub fn create_booking_store() -> Arc<BookingStore> {
    let default_path = "/app/data/bookings.csv";
    let csv_path =
        std::env::var("ROOMSYNC_BOOKINGS_PATH").unwrap_or_else(|_| default_path.to_string());

    if csv_path == default_path {
        let dir = std::path::Path::new(default_path).parent().unwrap();
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!("Failed to create data directory: {}", e);
            panic!("Failed to create data directory: {}", e);
        }
    }

    Arc::new(BookingStore::new(&csv_path))
}
