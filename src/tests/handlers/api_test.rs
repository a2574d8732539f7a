use axum::http::StatusCode;
use axum_test::{TestServer, TestServerConfig};
use serde_json::{json, Value};

use crate::models::booking::Booking;
use crate::models::room::Room;
use crate::models::user::Role;
use crate::routes::create_router;
use crate::tests::common::fixtures::{bearer, setup_server, setup_state, token_for};

/// API handler tests
#[cfg(test)]
mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let (_dir, server, _state) = setup_server();

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let (_dir, server, _state) = setup_server();

        let response = server
            .post("/auth/login")
            .json(&json!({"username": "admin", "password": "admin123"}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["username"], "admin");
        assert_eq!(body["role"], "admin");
        let token = body["token"].as_str().unwrap().to_string();

        // The issued token authenticates /auth/me
        let (name, value) = bearer(&token);
        let me = server.get("/auth/me").add_header(name, value).await;
        me.assert_status_ok();
        let me_body: Value = me.json();
        assert_eq!(me_body["email"], "admin@roomsync.com");
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (_dir, server, _state) = setup_server();

        let response = server
            .post("/auth/login")
            .json(&json!({"username": "admin", "password": "wrong"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let (_dir, server, _state) = setup_server();

        let response = server.get("/auth/me").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_rooms_hides_inactive_from_public() {
        let (_dir, server, state) = setup_server();

        let admin = token_for(&state, "admin", Role::Admin);
        let (name, value) = bearer(&admin);
        let response = server
            .put("/rooms/X-002")
            .add_header(name, value)
            .json(&json!({"is_active": false}))
            .await;
        response.assert_status_ok();

        // Public listing hides the deactivated room
        let public: Vec<Room> = server.get("/rooms").await.json();
        let numbers: Vec<&str> = public.iter().map(|r| r.room_number.as_str()).collect();
        assert_eq!(numbers, vec!["X-001", "Y-101"]);

        // Admins still see it
        let (name, value) = bearer(&admin);
        let all: Vec<Room> = server.get("/rooms").add_header(name, value).await.json();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_list_rooms_filters() {
        let (_dir, server, _state) = setup_server();

        let labs: Vec<Room> = server.get("/rooms?room_type=Lab").await.json();
        assert_eq!(labs.len(), 1);
        assert_eq!(labs[0].room_number, "X-002");

        let big: Vec<Room> = server.get("/rooms?min_capacity=100").await.json();
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].room_number, "Y-101");

        let x_block: Vec<Room> = server.get("/rooms?block=X-Block").await.json();
        assert_eq!(x_block.len(), 2);
    }

    #[tokio::test]
    async fn test_room_management_requires_admin() {
        let (_dir, server, state) = setup_server();

        let body = json!({
            "room_number": "Z-001",
            "block": "X-Block",
            "room_type": "Office",
            "capacity": 4
        });

        // No token
        let response = server.post("/rooms").json(&body).await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        // Student token
        let student = token_for(&state, "student", Role::StudentRep);
        let (name, value) = bearer(&student);
        let response = server.post("/rooms").add_header(name, value).json(&body).await;
        response.assert_status(StatusCode::FORBIDDEN);

        // Admin token
        let admin = token_for(&state, "admin", Role::Admin);
        let (name, value) = bearer(&admin);
        let response = server.post("/rooms").add_header(name, value).json(&body).await;
        response.assert_status(StatusCode::CREATED);

        // Unknown block is refused
        let (name, value) = bearer(&admin);
        let response = server
            .post("/rooms")
            .add_header(name, value)
            .json(&json!({
                "room_number": "Z-002",
                "block": "No-Block",
                "room_type": "Office",
                "capacity": 4
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rooms_by_block_grouping() {
        let (_dir, server, _state) = setup_server();

        let response = server.get("/rooms/by-block").await;
        response.assert_status_ok();

        let grouped: Value = response.json();
        let blocks: Vec<&String> = grouped.as_object().unwrap().keys().collect();
        assert_eq!(blocks, vec!["X-Block", "Y-Block"]);
        assert_eq!(grouped["X-Block"].as_array().unwrap().len(), 2);
        assert_eq!(grouped["Y-Block"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_booking_starts_pending() {
        let (_dir, server, state) = setup_server();

        let student = token_for(&state, "student", Role::StudentRep);
        let (name, value) = bearer(&student);
        let response = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:00",
                "purpose": "Study group"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let booking: Booking = response.json();
        assert_eq!(booking.user, "student");
        assert_eq!(booking.status.as_str(), "pending");
    }

    #[tokio::test]
    async fn test_admin_booking_is_auto_approved() {
        let (_dir, server, state) = setup_server();

        let admin = token_for(&state, "admin", Role::Admin);
        let (name, value) = bearer(&admin);
        let response = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:00",
                "purpose": "Exam"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let booking: Booking = response.json();
        assert_eq!(booking.status.as_str(), "approved");
        assert_eq!(booking.approved_by, "admin");
    }

    #[tokio::test]
    async fn test_booking_conflicts_are_409() {
        let (_dir, server, state) = setup_server();

        let admin = token_for(&state, "admin", Role::Admin);
        let (name, value) = bearer(&admin);
        server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "11:00",
                "purpose": "Exam"
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let student = token_for(&state, "student", Role::StudentRep);
        let (name, value) = bearer(&student);
        let response = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "10:00",
                "end_time": "12:00",
                "purpose": "Study group"
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let body: Value = response.json();
        assert_eq!(body["error"], "Room already booked for that time.");
    }

    #[tokio::test]
    async fn test_booking_validation_errors() {
        let (_dir, server, state) = setup_server();

        let student = token_for(&state, "student", Role::StudentRep);

        // Unknown room
        let (name, value) = bearer(&student);
        server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "Z-999",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:00"
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Inverted time range
        let (name, value) = bearer(&student);
        server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "11:00",
                "end_time": "10:00"
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_approval_workflow_role_gating() {
        let (_dir, server, state) = setup_server();

        let student = token_for(&state, "student", Role::StudentRep);
        let (name, value) = bearer(&student);
        let booking: Booking = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:00",
                "purpose": "Club meeting"
            }))
            .await
            .json();

        // Students cannot approve
        let (name, value) = bearer(&student);
        server
            .post(&format!("/bookings/{}/approve", booking.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // Faculty can
        let faculty = token_for(&state, "faculty", Role::Faculty);
        let (name, value) = bearer(&faculty);
        let response = server
            .post(&format!("/bookings/{}/approve", booking.id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["message"], "Booking approved successfully");
        assert_eq!(body["booking"]["status"], "approved");
        assert_eq!(body["booking"]["approved_by"], "faculty");
    }

    #[tokio::test]
    async fn test_reject_records_reason() {
        let (_dir, server, state) = setup_server();

        let student = token_for(&state, "student", Role::StudentRep);
        let (name, value) = bearer(&student);
        let booking: Booking = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:00"
            }))
            .await
            .json();

        let faculty = token_for(&state, "faculty", Role::Faculty);
        let (name, value) = bearer(&faculty);
        let response = server
            .post(&format!("/bookings/{}/reject", booking.id))
            .add_header(name, value)
            .json(&json!({"rejection_reason": "Room reserved for exams"}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["booking"]["status"], "rejected");
        assert_eq!(body["booking"]["rejection_reason"], "Room reserved for exams");
    }

    #[tokio::test]
    async fn test_cancel_ownership_rules() {
        let (_dir, server, state) = setup_server();

        let student = token_for(&state, "student", Role::StudentRep);
        let (name, value) = bearer(&student);
        let booking: Booking = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:00"
            }))
            .await
            .json();

        // Someone else (non-admin) cannot cancel it
        let faculty = token_for(&state, "faculty", Role::Faculty);
        let (name, value) = bearer(&faculty);
        server
            .post(&format!("/bookings/{}/cancel", booking.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // The owner can
        let (name, value) = bearer(&student);
        let response = server
            .post(&format!("/bookings/{}/cancel", booking.id))
            .add_header(name, value)
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["booking"]["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_pending_listing_sorted_and_gated() {
        let (_dir, server, state) = setup_server();

        let student = token_for(&state, "student", Role::StudentRep);
        for (date, start, end) in [
            ("2025-03-11", "09:00", "10:00"),
            ("2025-03-10", "13:00", "14:00"),
            ("2025-03-10", "09:00", "10:00"),
        ] {
            let (name, value) = bearer(&student);
            server
                .post("/bookings")
                .add_header(name, value)
                .json(&json!({
                    "room": "X-001",
                    "date": date,
                    "start_time": start,
                    "end_time": end
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let (name, value) = bearer(&student);
        server
            .get("/bookings/pending")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let faculty = token_for(&state, "faculty", Role::Faculty);
        let (name, value) = bearer(&faculty);
        let pending: Vec<Booking> = server
            .get("/bookings/pending")
            .add_header(name, value)
            .await
            .json();

        let order: Vec<String> = pending
            .iter()
            .map(|b| format!("{} {}", b.date, b.start_time.format("%H:%M")))
            .collect();
        assert_eq!(
            order,
            vec!["2025-03-10 09:00", "2025-03-10 13:00", "2025-03-11 09:00"]
        );
    }

    #[tokio::test]
    async fn test_room_availability_endpoint() {
        let (_dir, server, state) = setup_server();

        // Empty snapshot resolves available
        let response = server
            .get("/rooms/X-001/availability?date=2025-03-10&slot=09:00-10:00")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "available");

        let admin = token_for(&state, "admin", Role::Admin);
        let (name, value) = bearer(&admin);
        server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:30",
                "end_time": "10:30",
                "purpose": "Exam"
            }))
            .await
            .assert_status(StatusCode::CREATED);

        // Overlapping slot is booked
        let body: Value = server
            .get("/rooms/X-001/availability?date=2025-03-10&slot=09:00-10:00")
            .await
            .json();
        assert_eq!(body["status"], "booked");

        // Touching slot stays available
        let body: Value = server
            .get("/rooms/X-001/availability?date=2025-03-10&slot=10:30-11:30")
            .await
            .json();
        assert_eq!(body["status"], "available");

        // Whole-day view aggregates approved duration
        let body: Value = server
            .get("/rooms/X-001/availability?date=2025-03-10")
            .await
            .json();
        assert_eq!(body["status"], "partially_booked");
    }

    #[tokio::test]
    async fn test_room_availability_rejects_bad_input() {
        let (_dir, server, _state) = setup_server();

        server
            .get("/rooms/Z-999/availability?date=2025-03-10")
            .await
            .assert_status(StatusCode::NOT_FOUND);

        server
            .get("/rooms/X-001/availability?date=2025-03-10&slot=banana")
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get("/rooms/X-001/availability?date=2025-03-10&slot=10:00-09:00")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_campus_availability_sweep() {
        let (_dir, server, state) = setup_server();

        let admin = token_for(&state, "admin", Role::Admin);
        let (name, value) = bearer(&admin);
        server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "15:00",
                "purpose": "Conference"
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let rows: Value = server.get("/availability?date=2025-03-10").await.json();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 3);

        let status_of = |room: &str| {
            rows.iter()
                .find(|r| r["room"] == room)
                .unwrap()["status"]
                .clone()
        };
        // 360 approved minutes crosses the daily capacity threshold
        assert_eq!(status_of("X-001"), "fully_booked");
        assert_eq!(status_of("X-002"), "available");
        assert_eq!(status_of("Y-101"), "available");
    }

    #[tokio::test]
    async fn test_user_management_is_admin_only() {
        let (_dir, server, state) = setup_server();

        let faculty = token_for(&state, "faculty", Role::Faculty);
        let (name, value) = bearer(&faculty);
        server
            .get("/users")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let admin = token_for(&state, "admin", Role::Admin);
        let (name, value) = bearer(&admin);
        let users: Value = server.get("/users").add_header(name, value).await.json();
        assert_eq!(users.as_array().unwrap().len(), 3);

        let (name, value) = bearer(&admin);
        let response = server
            .post("/users")
            .add_header(name, value)
            .json(&json!({
                "username": "jdoe",
                "email": "jdoe@campus.edu",
                "role": "faculty",
                "password": "hunter22"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        // The new account can log in
        server
            .post("/auth/login")
            .json(&json!({"username": "jdoe", "password": "hunter22"}))
            .await
            .assert_status_ok();

        // Admins cannot delete themselves
        let (name, value) = bearer(&admin);
        server
            .delete("/users/admin")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_sample_routes_gated_by_production_mode() {
        let (_dir, server, _state) = setup_server();

        // Development server exposes the sample data routes
        server.get("/test/rooms").await.assert_status_ok();

        // A production router does not
        let (_dir2, state2) = setup_state();
        let router = create_router(state2, true);
        let config = TestServerConfig::builder().mock_transport().build();
        let production = TestServer::new_with_config(router, config).unwrap();

        production
            .get("/test/rooms")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        // Core routes stay available
        production.get("/health").await.assert_status_ok();
    }
}
