use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    approve_booking, campus_availability, cancel_booking, create_block, create_booking,
    create_room, create_user, delete_block, delete_room, delete_user, get_room, list_blocks,
    list_bookings, list_rooms, list_users, login, me, my_bookings, pending_bookings,
    reject_booking, room_availability, room_types, rooms_by_block, update_room, AppState,
};
use crate::handlers::test::{health_check, sample_booking, sample_rooms};

pub fn create_router(app_state: Arc<AppState>, is_production: bool) -> Router {
    let mut router = Router::new();

    // Health check is always available
    let health_route = Router::new().route("/health", get(health_check));
    router = router.merge(health_route);

    // Authentication
    let auth_routes = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me));
    router = router.merge(auth_routes);

    // Rooms and blocks; writes are role-gated inside the handlers
    let room_routes = Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/by-block", get(rooms_by_block))
        .route("/room-types", get(room_types))
        .route(
            "/rooms/{room_number}",
            get(get_room).put(update_room).delete(delete_room),
        )
        .route("/rooms/{room_number}/availability", get(room_availability))
        .route("/blocks", get(list_blocks).post(create_block))
        .route("/blocks/{name}", delete(delete_block));
    router = router.merge(room_routes);

    // Bookings and the approval workflow
    let booking_routes = Router::new()
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/pending", get(pending_bookings))
        .route("/bookings/my", get(my_bookings))
        .route("/bookings/{id}/approve", post(approve_booking))
        .route("/bookings/{id}/reject", post(reject_booking))
        .route("/bookings/{id}/cancel", post(cancel_booking))
        .route("/availability", get(campus_availability));
    router = router.merge(booking_routes);

    // User management (admin only, enforced in handlers)
    let user_routes = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{username}", delete(delete_user));
    router = router.merge(user_routes);

    // Sample data endpoints are only exposed outside production
    if !is_production {
        let sample_routes = Router::new()
            .route("/test/rooms", get(sample_rooms))
            .route("/test/booking", get(sample_booking));
        router = router.merge(sample_routes);

        info!("Sample data routes enabled - server running in development mode");
    } else {
        info!("Running in production mode - sample data routes disabled");
    }

    router.with_state(app_state)
}
