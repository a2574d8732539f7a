use axum::{
    extract::{Json as ExtractJson, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthService, Claims};
use crate::models::booking::{
    AvailabilityParams, AvailabilityResponse, Booking, BookingActionResponse, BookingFilterParams,
    BookingStatus, CreateBookingRequest, RejectBookingRequest, RoomAvailability,
};
use crate::models::common::ErrorResponse;
use crate::models::room::{
    Block, CreateBlockRequest, CreateRoomRequest, Room, RoomFilterParams, UpdateRoomRequest,
};
use crate::models::user::{
    CreateUserRequest, LoginRequest, LoginResponse, Role, UserInfo,
};
use crate::notify::{BookingEvent, NotificationClient};
use crate::services::availability::{self, Slot};
use crate::services::database::{BookingStore, StoreError};
use crate::services::registry::RoomRegistry;
use crate::services::users::UserDirectory;

// AppState struct containing shared resources
pub struct AppState {
    pub bookings: Arc<BookingStore>,
    pub rooms: Arc<RoomRegistry>,
    pub users: Arc<UserDirectory>,
    pub auth: AuthService,
    pub notifier: Option<NotificationClient>,
    pub skip_notifications: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::Invalid(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        StoreError::Conflict(msg) => api_error(StatusCode::CONFLICT, msg),
        StoreError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
        StoreError::Storage(msg) => {
            error!("Store failure: {}", msg);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error")
        }
    }
}

fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiError> {
    state
        .auth
        .authenticate(headers)
        .map_err(|status| api_error(status, "Authentication required"))
}

fn require_admin(claims: &Claims) -> Result<(), ApiError> {
    if !claims.is_admin() {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "Only admins can perform this action",
        ));
    }
    Ok(())
}

fn require_moderator(claims: &Claims) -> Result<(), ApiError> {
    if !claims.can_moderate() {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "Only admin and faculty can perform this action",
        ));
    }
    Ok(())
}

// Where a notification about this booking should go: the admin-entered
// override address when present, otherwise the requester's account email
fn notification_recipient(state: &AppState, booking: &Booking) -> Option<String> {
    if !booking.faculty_email.is_empty() {
        return Some(booking.faculty_email.clone());
    }
    match state.users.find(&booking.user) {
        Ok(Some(account)) => Some(account.email),
        Ok(None) => {
            warn!("No account found for booking owner {}", booking.user);
            None
        }
        Err(e) => {
            warn!("Failed to resolve recipient for {}: {}", booking.user, e);
            None
        }
    }
}

// Deliver a notification; failures are logged and never fail the request
async fn notify(state: &AppState, event: BookingEvent) {
    if state.skip_notifications {
        debug!("Notifications disabled, skipping {} event", event.event);
        return;
    }

    match &state.notifier {
        Some(notifier) => {
            if let Err(e) = notifier.send_event(&event).await {
                warn!("Failed to deliver {} notification: {}", event.event, e);
            }
        }
        None => debug!(
            "No notification endpoint configured, skipping {} event",
            event.event
        ),
    }
}

// Login endpoint: verify credentials and issue a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    info!("Received login request for user {}", request.username);

    let account = state
        .users
        .verify(&request.username, &request.password)
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Invalid username or password"))?;

    let token = state.auth.issue_token(&account.username, account.role);

    info!("User {} logged in as {}", account.username, account.role.as_str());

    Ok(Json(LoginResponse {
        token,
        username: account.username,
        role: account.role,
    }))
}

// Return the account behind the presented token
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>, ApiError> {
    let claims = require_auth(&state, &headers)?;

    let account = state
        .users
        .find(&claims.username)
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Account no longer exists"))?;

    Ok(Json(UserInfo::from(&account)))
}

// List rooms; admins also see inactive rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RoomFilterParams>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let is_admin = state
        .auth
        .authenticate(&headers)
        .map(|claims| claims.is_admin())
        .unwrap_or(false);

    let mut rooms = state.rooms.list_rooms().map_err(store_error)?;

    if !is_admin {
        rooms.retain(|r| r.is_active);
    }
    if let Some(block) = &params.block {
        rooms.retain(|r| &r.block == block);
    }
    if let Some(room_type) = &params.room_type {
        rooms.retain(|r| &r.room_type == room_type);
    }
    if let Some(min_capacity) = params.min_capacity {
        rooms.retain(|r| r.capacity >= min_capacity);
    }

    Ok(Json(rooms))
}

pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_number): Path<String>,
) -> Result<Json<Room>, ApiError> {
    state
        .rooms
        .find_room(&room_number)
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Room {} not found", room_number)))
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(request): ExtractJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    info!(
        "Admin {} creating room {} in block {}",
        claims.username, request.room_number, request.block
    );

    let room = Room {
        room_number: request.room_number,
        block: request.block,
        room_type: request.room_type,
        capacity: request.capacity,
        is_active: request.is_active,
    };

    let created = state.rooms.create_room(room).map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_number): Path<String>,
    ExtractJson(request): ExtractJson<UpdateRoomRequest>,
) -> Result<Json<Room>, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    let updated = state
        .rooms
        .update_room(&room_number, &request)
        .map_err(store_error)?;
    Ok(Json(updated))
}

pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(room_number): Path<String>,
) -> Result<StatusCode, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    state.rooms.delete_room(&room_number).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// Rooms grouped by block for the blueprint view
pub async fn rooms_by_block(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, Vec<Room>>>, ApiError> {
    let grouped = state.rooms.rooms_by_block().map_err(store_error)?;
    Ok(Json(grouped))
}

pub async fn room_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let types = state.rooms.room_types().map_err(store_error)?;
    Ok(Json(types))
}

pub async fn list_blocks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Block>>, ApiError> {
    let blocks = state.rooms.list_blocks().map_err(store_error)?;
    Ok(Json(blocks))
}

pub async fn create_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(request): ExtractJson<CreateBlockRequest>,
) -> Result<(StatusCode, Json<Block>), ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    let block = state.rooms.create_block(&request.name).map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(block)))
}

pub async fn delete_block(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    state.rooms.delete_block(&name).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// List bookings with optional room/date/status filters
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BookingFilterParams>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let mut bookings = state.bookings.list_bookings().map_err(store_error)?;

    if let Some(room) = &params.room {
        bookings.retain(|b| &b.room == room);
    }
    if let Some(date) = params.date {
        bookings.retain(|b| b.date == date);
    }
    if let Some(status) = params.status {
        bookings.retain(|b| b.status == status);
    }

    Ok(Json(bookings))
}

// Submit a booking request. Admin bookings are approved immediately;
// everyone else's wait for moderation.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(mut request): ExtractJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let claims = require_auth(&state, &headers)?;

    info!(
        "Received booking request from {} for room {} on {}",
        claims.username, request.room, request.date
    );

    let room = state
        .rooms
        .find_room(&request.room)
        .map_err(store_error)?
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("Unknown room: {}", request.room),
            )
        })?;

    if !room.is_active {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Room {} is not available for booking", room.room_number),
        ));
    }

    // Only admins may redirect notifications to a faculty address, and
    // the address must belong to a faculty account
    if !request.faculty_email.is_empty() {
        if claims.is_admin() {
            let accounts = state.users.list_users().map_err(store_error)?;
            let owner = accounts.iter().find(|a| a.email == request.faculty_email);
            match owner {
                Some(account) if account.role == Role::Faculty => {}
                Some(_) => {
                    return Err(api_error(
                        StatusCode::BAD_REQUEST,
                        "The provided email does not belong to a Faculty member.",
                    ))
                }
                None => {
                    return Err(api_error(
                        StatusCode::BAD_REQUEST,
                        "No user found with this email.",
                    ))
                }
            }
        } else {
            request.faculty_email = String::new();
        }
    }

    let booking = state
        .bookings
        .create_booking(&request, &claims.username, claims.is_admin())
        .map_err(store_error)?;

    if booking.status == BookingStatus::Approved {
        if let Some(recipient) = notification_recipient(&state, &booking) {
            notify(&state, BookingEvent::confirmed(&booking, &recipient)).await;
        }
    }

    Ok((StatusCode::CREATED, Json(booking)))
}

// Pending bookings awaiting moderation, earliest first
pub async fn pending_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_moderator(&claims)?;

    let mut pending: Vec<Booking> = state
        .bookings
        .list_bookings()
        .map_err(store_error)?
        .into_iter()
        .filter(|b| b.status == BookingStatus::Pending)
        .collect();
    pending.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));

    Ok(Json(pending))
}

pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<BookingActionResponse>, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_moderator(&claims)?;

    info!("Received request from {} to approve booking {}", claims.username, id);

    let booking = state
        .bookings
        .approve_booking(id, &claims.username)
        .map_err(store_error)?;

    if let Some(recipient) = notification_recipient(&state, &booking) {
        notify(&state, BookingEvent::approved(&booking, &recipient)).await;
    }

    Ok(Json(BookingActionResponse {
        message: "Booking approved successfully".to_string(),
        booking,
    }))
}

pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    ExtractJson(request): ExtractJson<RejectBookingRequest>,
) -> Result<Json<BookingActionResponse>, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_moderator(&claims)?;

    info!("Received request from {} to reject booking {}", claims.username, id);

    let booking = state
        .bookings
        .reject_booking(id, &claims.username, &request.rejection_reason)
        .map_err(store_error)?;

    if let Some(recipient) = notification_recipient(&state, &booking) {
        notify(&state, BookingEvent::rejected(&booking, &recipient)).await;
    }

    Ok(Json(BookingActionResponse {
        message: "Booking rejected successfully".to_string(),
        booking,
    }))
}

// Cancel a booking; owners may cancel their own, admins anyone's
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<BookingActionResponse>, ApiError> {
    let claims = require_auth(&state, &headers)?;

    let existing = state
        .bookings
        .find_booking(id)
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Booking {} not found", id)))?;

    if existing.user != claims.username && !claims.is_admin() {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "You can only cancel your own bookings",
        ));
    }

    let booking = state.bookings.cancel_booking(id).map_err(store_error)?;

    if let Some(recipient) = notification_recipient(&state, &booking) {
        notify(&state, BookingEvent::cancelled(&booking, &recipient)).await;
    }

    Ok(Json(BookingActionResponse {
        message: "Booking cancelled successfully".to_string(),
        booking,
    }))
}

// The caller's own bookings, newest date first
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let claims = require_auth(&state, &headers)?;

    let email = state
        .users
        .find(&claims.username)
        .map_err(store_error)?
        .map(|a| a.email)
        .unwrap_or_default();

    let mut mine: Vec<Booking> = state
        .bookings
        .list_bookings()
        .map_err(store_error)?
        .into_iter()
        .filter(|b| {
            b.user == claims.username || (!email.is_empty() && b.faculty_email == email)
        })
        .collect();
    mine.sort_by(|a, b| b.date.cmp(&a.date));

    Ok(Json(mine))
}

fn parse_slot_param(slot: &Option<String>) -> Result<Option<Slot>, ApiError> {
    match slot {
        None => Ok(None),
        Some(label) => Slot::parse(label)
            .map(Some)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e)),
    }
}

// Status of one room for a date, or for a specific slot within it
pub async fn room_availability(
    State(state): State<Arc<AppState>>,
    Path(room_number): Path<String>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    state
        .rooms
        .find_room(&room_number)
        .map_err(store_error)?
        .ok_or_else(|| {
            api_error(StatusCode::NOT_FOUND, format!("Room {} not found", room_number))
        })?;

    let slot = parse_slot_param(&params.slot)?;
    let snapshot = state.bookings.list_bookings().map_err(store_error)?;
    let status = availability::slot_status(&snapshot, &room_number, params.date, slot);

    debug!(
        "Room {} on {} resolved to {}",
        room_number,
        params.date,
        status.as_str()
    );

    Ok(Json(AvailabilityResponse {
        room: room_number,
        date: params.date,
        slot: params.slot.clone(),
        status,
    }))
}

// Status of every active room for a date, one snapshot for the whole
// sweep so the calendar and blueprint grids render from a single call
pub async fn campus_availability(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<RoomAvailability>>, ApiError> {
    let slot = parse_slot_param(&params.slot)?;
    let snapshot = state.bookings.list_bookings().map_err(store_error)?;

    let rooms = state.rooms.list_rooms().map_err(store_error)?;
    let statuses: Vec<RoomAvailability> = rooms
        .into_iter()
        .filter(|r| r.is_active)
        .map(|r| {
            let status =
                availability::slot_status(&snapshot, &r.room_number, params.date, slot);
            RoomAvailability {
                room: r.room_number,
                block: r.block,
                capacity: r.capacity,
                status,
            }
        })
        .collect();

    Ok(Json(statuses))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserInfo>>, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    let users = state
        .users
        .list_users()
        .map_err(store_error)?
        .iter()
        .map(UserInfo::from)
        .collect();
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ExtractJson(request): ExtractJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserInfo>), ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    let account = state.users.create_user(&request).map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(UserInfo::from(&account))))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    let claims = require_auth(&state, &headers)?;
    require_admin(&claims)?;

    if username == claims.username {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "You cannot delete your own account",
        ));
    }

    state.users.delete_user(&username).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}
