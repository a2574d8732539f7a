use serde::{Deserialize, Serialize};

// A campus building grouping rooms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
}

// A bookable room; room_number is the public identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_number: String,
    pub block: String,
    pub room_type: String,
    pub capacity: u32,
    pub is_active: bool,
}

// Request body for creating a room
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub room_number: String,
    pub block: String,
    pub room_type: String,
    pub capacity: u32,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

// Request body for updating a room; absent fields are left unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub block: Option<String>,
    pub room_type: Option<String>,
    pub capacity: Option<u32>,
    pub is_active: Option<bool>,
}

// Request body for creating a block
#[derive(Debug, Deserialize)]
pub struct CreateBlockRequest {
    pub name: String,
}

// Query parameters accepted by the room listing endpoint
#[derive(Debug, Default, Deserialize)]
pub struct RoomFilterParams {
    pub block: Option<String>,
    pub room_type: Option<String>,
    pub min_capacity: Option<u32>,
}
