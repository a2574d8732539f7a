use csv::{ReaderBuilder, WriterBuilder};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::models::room::{Block, Room, UpdateRoomRequest};
use crate::services::database::StoreError;

// CSV-backed registry of rooms and the blocks that group them
pub struct RoomRegistry {
    rooms_path: String,
    blocks_path: String,
    file_mutex: Mutex<()>,
}

fn bootstrap_csv(path: &str, headers: &[&str], label: &str) {
    if Path::new(path).exists() {
        return;
    }

    info!("Creating new {} file at {}", label, path);

    let file = File::create(path).unwrap_or_else(|e| {
        error!("Failed to create {} file: {}", label, e);
        panic!("Failed to create {} file: {}", label, e)
    });

    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    if let Err(e) = writer.write_record(headers) {
        error!("Failed to write {} headers: {}", label, e);
        panic!("Failed to write {} headers: {}", label, e);
    }

    if let Err(e) = writer.flush() {
        error!("Failed to flush {} headers: {}", label, e);
        panic!("Failed to flush {} headers: {}", label, e);
    }
}

impl RoomRegistry {
    pub fn new(rooms_path: &str, blocks_path: &str) -> Self {
        bootstrap_csv(
            rooms_path,
            &["room_number", "block", "room_type", "capacity", "is_active"],
            "rooms",
        );
        bootstrap_csv(blocks_path, &["name"], "blocks");

        Self {
            rooms_path: rooms_path.to_string(),
            blocks_path: blocks_path.to_string(),
            file_mutex: Mutex::new(()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.file_mutex
            .lock()
            .map_err(|e| StoreError::Storage(format!("Failed to acquire mutex: {}", e)))
    }

    fn read_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let file = File::open(&self.rooms_path)
            .map_err(|e| StoreError::Storage(format!("Failed to open rooms file: {}", e)))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut rooms = Vec::new();

        for result in reader.deserialize() {
            let room: Room = result
                .map_err(|e| StoreError::Storage(format!("Failed to read room record: {}", e)))?;
            rooms.push(room);
        }

        Ok(rooms)
    }

    fn write_rooms(&self, rooms: &[Room]) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.rooms_path)
            .map_err(|e| {
                StoreError::Storage(format!("Failed to open rooms file for writing: {}", e))
            })?;

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

        for room in rooms {
            writer
                .serialize(room)
                .map_err(|e| StoreError::Storage(format!("Failed to write room record: {}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| StoreError::Storage(format!("Failed to flush rooms file: {}", e)))?;

        Ok(())
    }

    fn read_blocks(&self) -> Result<Vec<Block>, StoreError> {
        let file = File::open(&self.blocks_path)
            .map_err(|e| StoreError::Storage(format!("Failed to open blocks file: {}", e)))?;

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut blocks = Vec::new();

        for result in reader.deserialize() {
            let block: Block = result
                .map_err(|e| StoreError::Storage(format!("Failed to read block record: {}", e)))?;
            blocks.push(block);
        }

        Ok(blocks)
    }

    fn write_blocks(&self, blocks: &[Block]) -> Result<(), StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.blocks_path)
            .map_err(|e| {
                StoreError::Storage(format!("Failed to open blocks file for writing: {}", e))
            })?;

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

        for block in blocks {
            writer
                .serialize(block)
                .map_err(|e| StoreError::Storage(format!("Failed to write block record: {}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| StoreError::Storage(format!("Failed to flush blocks file: {}", e)))?;

        Ok(())
    }

    pub fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        let _lock = self.lock()?;
        let mut rooms = self.read_rooms()?;
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number));
        Ok(rooms)
    }

    pub fn find_room(&self, room_number: &str) -> Result<Option<Room>, StoreError> {
        let _lock = self.lock()?;
        Ok(self
            .read_rooms()?
            .into_iter()
            .find(|r| r.room_number == room_number))
    }

    pub fn create_room(&self, room: Room) -> Result<Room, StoreError> {
        let _lock = self.lock()?;

        let blocks = self.read_blocks()?;
        if !blocks.iter().any(|b| b.name == room.block) {
            return Err(StoreError::Invalid(format!(
                "Unknown block: {}",
                room.block
            )));
        }

        let mut rooms = self.read_rooms()?;
        if rooms.iter().any(|r| r.room_number == room.room_number) {
            return Err(StoreError::Conflict(format!(
                "Room {} already exists",
                room.room_number
            )));
        }

        rooms.push(room.clone());
        self.write_rooms(&rooms)?;

        info!("Created room {} in block {}", room.room_number, room.block);
        Ok(room)
    }

    pub fn update_room(
        &self,
        room_number: &str,
        update: &UpdateRoomRequest,
    ) -> Result<Room, StoreError> {
        let _lock = self.lock()?;

        let mut rooms = self.read_rooms()?;
        let position = rooms
            .iter()
            .position(|r| r.room_number == room_number)
            .ok_or_else(|| StoreError::NotFound(format!("Room {} not found", room_number)))?;

        if let Some(block) = &update.block {
            let blocks = self.read_blocks()?;
            if !blocks.iter().any(|b| &b.name == block) {
                return Err(StoreError::Invalid(format!("Unknown block: {}", block)));
            }
            rooms[position].block = block.clone();
        }
        if let Some(room_type) = &update.room_type {
            rooms[position].room_type = room_type.clone();
        }
        if let Some(capacity) = update.capacity {
            rooms[position].capacity = capacity;
        }
        if let Some(is_active) = update.is_active {
            rooms[position].is_active = is_active;
        }

        self.write_rooms(&rooms)?;

        info!("Updated room {}", room_number);
        Ok(rooms[position].clone())
    }

    pub fn delete_room(&self, room_number: &str) -> Result<(), StoreError> {
        let _lock = self.lock()?;

        let mut rooms = self.read_rooms()?;
        let before = rooms.len();
        rooms.retain(|r| r.room_number != room_number);

        if rooms.len() == before {
            return Err(StoreError::NotFound(format!(
                "Room {} not found",
                room_number
            )));
        }

        self.write_rooms(&rooms)?;
        info!("Deleted room {}", room_number);
        Ok(())
    }

    // Active rooms grouped by block, block names in ascending order
    pub fn rooms_by_block(&self) -> Result<BTreeMap<String, Vec<Room>>, StoreError> {
        let _lock = self.lock()?;

        let blocks = self.read_blocks()?;
        let rooms = self.read_rooms()?;

        let mut grouped: BTreeMap<String, Vec<Room>> = BTreeMap::new();
        for block in blocks {
            grouped.insert(block.name, Vec::new());
        }
        for room in rooms.into_iter().filter(|r| r.is_active) {
            grouped.entry(room.block.clone()).or_default().push(room);
        }
        for members in grouped.values_mut() {
            members.sort_by(|a, b| a.room_number.cmp(&b.room_number));
        }

        Ok(grouped)
    }

    // Distinct types among active rooms
    pub fn room_types(&self) -> Result<Vec<String>, StoreError> {
        let _lock = self.lock()?;

        let mut types: Vec<String> = self
            .read_rooms()?
            .into_iter()
            .filter(|r| r.is_active)
            .map(|r| r.room_type)
            .collect();
        types.sort();
        types.dedup();
        Ok(types)
    }

    pub fn list_blocks(&self) -> Result<Vec<Block>, StoreError> {
        let _lock = self.lock()?;
        let mut blocks = self.read_blocks()?;
        blocks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blocks)
    }

    pub fn create_block(&self, name: &str) -> Result<Block, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::Invalid("Block name must not be empty".to_string()));
        }

        let _lock = self.lock()?;

        let mut blocks = self.read_blocks()?;
        if blocks.iter().any(|b| b.name == name) {
            return Err(StoreError::Conflict(format!("Block {} already exists", name)));
        }

        let block = Block {
            name: name.to_string(),
        };
        blocks.push(block.clone());
        self.write_blocks(&blocks)?;

        info!("Created block {}", name);
        Ok(block)
    }

    // A block can only be removed once no room references it
    pub fn delete_block(&self, name: &str) -> Result<(), StoreError> {
        let _lock = self.lock()?;

        let rooms = self.read_rooms()?;
        if rooms.iter().any(|r| r.block == name) {
            return Err(StoreError::Conflict(format!(
                "Block {} still has rooms assigned",
                name
            )));
        }

        let mut blocks = self.read_blocks()?;
        let before = blocks.len();
        blocks.retain(|b| b.name != name);

        if blocks.len() == before {
            return Err(StoreError::NotFound(format!("Block {} not found", name)));
        }

        self.write_blocks(&blocks)?;
        info!("Deleted block {}", name);
        Ok(())
    }
}

// Create a singleton room registry from the environment
pub fn create_room_registry() -> Arc<RoomRegistry> {
    let rooms_path =
        std::env::var("ROOMSYNC_ROOMS_PATH").unwrap_or_else(|_| "/app/data/rooms.csv".to_string());
    let blocks_path = std::env::var("ROOMSYNC_BLOCKS_PATH")
        .unwrap_or_else(|_| "/app/data/blocks.csv".to_string());

    for path in [&rooms_path, &blocks_path] {
        if let Some(dir) = std::path::Path::new(path).parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                error!("Failed to create data directory: {}", e);
                panic!("Failed to create data directory: {}", e);
            }
        }
    }

    Arc::new(RoomRegistry::new(&rooms_path, &blocks_path))
}
