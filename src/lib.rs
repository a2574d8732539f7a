//! RoomSync Service
//!
//! Campus room-booking web service: rooms grouped into blocks, booking
//! requests with an approval workflow, and a shared availability resolver
//! that every rendering surface queries for room status.
//!
//! # Modules
//!
//! - `services::availability`: the slot/day status resolver
//! - `services::database`: CSV-backed booking store
//! - `services::registry`: CSV-backed room and block registry
//! - `services::users`: user directory with role-based accounts
//! - `auth`: session tokens and outbound request signing
//! - `notify`: webhook client for booking notifications
//!
//! # Authentication
//!
//! Login issues an HMAC-SHA256-signed session token carrying the username,
//! role, and expiry; handlers verify it from the Authorization header and
//! enforce role rules (admin, faculty, student_rep).

pub mod auth;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod routes;
pub mod services;

// Re-export the main types for ease of use
pub use auth::AuthService;
pub use handlers::api::AppState;
pub use routes::create_router;
pub use services::availability::{slot_status, Slot, SlotStatus};
