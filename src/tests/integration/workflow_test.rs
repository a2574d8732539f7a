use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::models::booking::Booking;
use crate::tests::common::fixtures::{bearer, setup_server};

/// End-to-end booking workflow exercised through the HTTP surface:
/// login, request, moderation, and the availability the UI renders
/// at each step
#[cfg(test)]
mod workflow_tests {
    use super::*;

    async fn login(server: &axum_test::TestServer, username: &str, password: &str) -> String {
        let response = server
            .post("/auth/login")
            .json(&json!({"username": username, "password": password}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["token"].as_str().unwrap().to_string()
    }

    async fn room_status(server: &axum_test::TestServer, query: &str) -> Value {
        let response = server
            .get(&format!("/rooms/X-001/availability?{}", query))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["status"].clone()
    }

    #[tokio::test]
    async fn test_full_booking_lifecycle() {
        let (_dir, server, _state) = setup_server();

        // Everyone logs in through the API
        let student = login(&server, "student", "student123").await;
        let faculty = login(&server, "faculty", "faculty123").await;

        // The room starts the day available
        assert_eq!(room_status(&server, "date=2025-03-10").await, "available");

        // A student requests 09:00-10:30
        let (name, value) = bearer(&student);
        let response = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:30",
                "purpose": "Robotics workshop"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let booking: Booking = response.json();
        assert_eq!(booking.status.as_str(), "pending");

        // The pending request dominates both views
        assert_eq!(
            room_status(&server, "date=2025-03-10&slot=09:00-10:00").await,
            "pending"
        );
        assert_eq!(room_status(&server, "date=2025-03-10").await, "pending");

        // Faculty approves it
        let (name, value) = bearer(&faculty);
        server
            .post(&format!("/bookings/{}/approve", booking.id))
            .add_header(name, value)
            .await
            .assert_status_ok();

        // The slot now reads booked; the day has 90 approved minutes
        assert_eq!(
            room_status(&server, "date=2025-03-10&slot=09:00-10:00").await,
            "booked"
        );
        assert_eq!(
            room_status(&server, "date=2025-03-10&slot=10:30-11:30").await,
            "available"
        );
        assert_eq!(
            room_status(&server, "date=2025-03-10").await,
            "partially_booked"
        );

        // Booking the adjacent range is allowed and pushes the day to
        // 330 approved minutes, past the capacity threshold
        let admin = login(&server, "admin", "admin123").await;
        let (name, value) = bearer(&admin);
        server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "10:30",
                "end_time": "14:30",
                "purpose": "Department review"
            }))
            .await
            .assert_status(StatusCode::CREATED);

        assert_eq!(
            room_status(&server, "date=2025-03-10").await,
            "fully_booked"
        );

        // A conflicting request bounces off the approved schedule
        let (name, value) = bearer(&student);
        server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "13:00",
                "end_time": "15:00",
                "purpose": "Study group"
            }))
            .await
            .assert_status(StatusCode::CONFLICT);

        // The student's own listing shows the approved booking
        let (name, value) = bearer(&student);
        let mine: Vec<Booking> = server
            .get("/bookings/my")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].status.as_str(), "approved");

        // Cancelling frees the morning again
        let (name, value) = bearer(&student);
        server
            .post(&format!("/bookings/{}/cancel", booking.id))
            .add_header(name, value)
            .await
            .assert_status_ok();

        assert_eq!(
            room_status(&server, "date=2025-03-10&slot=09:00-10:00").await,
            "available"
        );
        assert_eq!(
            room_status(&server, "date=2025-03-10").await,
            "partially_booked"
        );

        // Another date never saw any of this
        assert_eq!(room_status(&server, "date=2025-03-11").await, "available");
    }

    #[tokio::test]
    async fn test_rejection_leaves_room_available() {
        let (_dir, server, _state) = setup_server();

        let student = login(&server, "student", "student123").await;
        let faculty = login(&server, "faculty", "faculty123").await;

        let (name, value) = bearer(&student);
        let booking: Booking = server
            .post("/bookings")
            .add_header(name, value)
            .json(&json!({
                "room": "X-001",
                "date": "2025-03-10",
                "start_time": "09:00",
                "end_time": "10:00",
                "purpose": "Chess club"
            }))
            .await
            .json();

        assert_eq!(room_status(&server, "date=2025-03-10").await, "pending");

        let (name, value) = bearer(&faculty);
        server
            .post(&format!("/bookings/{}/reject", booking.id))
            .add_header(name, value)
            .json(&json!({"rejection_reason": "Timetabled lecture"}))
            .await
            .assert_status_ok();

        // Rejected bookings no longer occupy the room
        assert_eq!(room_status(&server, "date=2025-03-10").await, "available");
        assert_eq!(
            room_status(&server, "date=2025-03-10&slot=09:00-10:00").await,
            "available"
        );
    }
}
