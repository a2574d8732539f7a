use axum::http::{header, HeaderName, HeaderValue};
use axum_test::{TestServer, TestServerConfig};
use std::sync::Arc;
use tempfile::TempDir;

use crate::auth::AuthService;
use crate::handlers::api::AppState;
use crate::models::room::Room;
use crate::models::user::Role;
use crate::routes::create_router;
use crate::services::database::BookingStore;
use crate::services::registry::RoomRegistry;
use crate::services::users::UserDirectory;

pub const TEST_SECRET: &str = "test_secret";

/// Build an application state over temp-file stores, seeded with a small
/// campus: two blocks and three rooms
pub fn setup_state() -> (TempDir, Arc<AppState>) {
    let dir = TempDir::new().unwrap();

    let bookings = Arc::new(BookingStore::new(
        dir.path().join("bookings.csv").to_str().unwrap(),
    ));
    let rooms = Arc::new(RoomRegistry::new(
        dir.path().join("rooms.csv").to_str().unwrap(),
        dir.path().join("blocks.csv").to_str().unwrap(),
    ));
    // Seeds the default admin/faculty/student accounts
    let users = Arc::new(UserDirectory::new(
        dir.path().join("users.csv").to_str().unwrap(),
        TEST_SECRET,
    ));

    rooms.create_block("X-Block").unwrap();
    rooms.create_block("Y-Block").unwrap();
    for (number, block, room_type, capacity) in [
        ("X-001", "X-Block", "Classroom", 60),
        ("X-002", "X-Block", "Lab", 30),
        ("Y-101", "Y-Block", "Seminar Hall", 120),
    ] {
        rooms
            .create_room(Room {
                room_number: number.to_string(),
                block: block.to_string(),
                room_type: room_type.to_string(),
                capacity,
                is_active: true,
            })
            .unwrap();
    }

    let state = Arc::new(AppState {
        bookings,
        rooms,
        users,
        auth: AuthService::new(TEST_SECRET),
        notifier: None,            // No webhook in tests
        skip_notifications: true,  // Simulation mode
    });

    (dir, state)
}

/// Spin up a test server over the development router
pub fn setup_server() -> (TempDir, TestServer, Arc<AppState>) {
    let (dir, state) = setup_state();

    let router = create_router(Arc::clone(&state), false);
    let config = TestServerConfig::builder().mock_transport().build();
    let server = TestServer::new_with_config(router, config).unwrap();

    (dir, server, state)
}

/// Issue a session token directly, bypassing the login endpoint
pub fn token_for(state: &AppState, username: &str, role: Role) -> String {
    state.auth.issue_token(username, role)
}

/// Authorization header pair for a bearer token
pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}
