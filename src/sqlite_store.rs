use rusqlite::Connection;
use std::sync::Mutex;
use uuid::Uuid;
use crate::Room;

/// SQLite-backed persistence for rooms. Each room is stored as one JSON
/// document keyed by id, with the join code indexed for restart-time lookup.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| e.to_string())?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                data TEXT NOT NULL
            );"
        ).map_err(|e| e.to_string())?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    /// Load all persisted rooms.
    pub fn load_all_rooms(&self) -> Result<Vec<Room>, String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        let mut stmt = conn.prepare("SELECT data FROM rooms").map_err(|e| e.to_string())?;
        let rows = stmt.query_map([], |row| {
            let json: String = row.get(0)?;
            Ok(json)
        }).map_err(|e| e.to_string())?;

        let mut rooms = Vec::new();
        for row in rows {
            let json = row.map_err(|e| e.to_string())?;
            let room: Room = serde_json::from_str(&json)
                .map_err(|e| format!("Failed to deserialize room: {}", e))?;
            rooms.push(room);
        }
        Ok(rooms)
    }

    /// Insert a new room.
    pub fn insert_room(&self, room: &Room) -> Result<(), String> {
        let json = serde_json::to_string(room).map_err(|e| e.to_string())?;
        let id = room.id().to_string();
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT OR REPLACE INTO rooms (id, code, data) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, room.code(), json],
        ).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Update an existing room.
    pub fn update_room(&self, room: &Room) -> Result<(), String> {
        let json = serde_json::to_string(room).map_err(|e| e.to_string())?;
        let id = room.id().to_string();
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE rooms SET data = ?2 WHERE id = ?1",
            rusqlite::params![id, json],
        ).map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Delete a room by ID.
    pub fn delete_room(&self, room_id: Uuid) -> Result<(), String> {
        let id = room_id.to_string();
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM rooms WHERE id = ?1",
            rusqlite::params![id],
        ).map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{Character, Gender, Mbti, Profile};
    use crate::room::RoomSettings;

    fn make_room(code: &str) -> Room {
        Room::create(
            RoomSettings::new(4, 3).unwrap(),
            Profile {
                nickname: "host".to_string(),
                gender: Gender::Other,
                mbti: Mbti::Entp,
                character: Character::Fox,
            },
            code.to_string(),
            None,
            1_000,
        )
        .unwrap()
    }

    #[test]
    fn test_open_creates_table() {
        let store = SqliteStore::open(":memory:").unwrap();
        let rooms = store.load_all_rooms().unwrap();
        assert!(rooms.is_empty());
    }

    #[test]
    fn test_insert_and_load() {
        let store = SqliteStore::open(":memory:").unwrap();
        let room = make_room("AAAA11");
        let room_id = room.id();

        store.insert_room(&room).unwrap();

        let loaded = store.load_all_rooms().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id(), room_id);
        assert_eq!(loaded[0].code(), "AAAA11");
    }

    #[test]
    fn test_update_room() {
        let store = SqliteStore::open(":memory:").unwrap();
        let mut room = make_room("AAAA11");
        store.insert_room(&room).unwrap();

        room.start_round(1, Uuid::new_v4(), 2_000).unwrap();
        store.update_room(&room).unwrap();

        let loaded = store.load_all_rooms().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status(), crate::room::RoomStatus::InProgress);
        assert_eq!(loaded[0].current_round().unwrap().round_number(), 1);
    }

    #[test]
    fn test_delete_room() {
        let store = SqliteStore::open(":memory:").unwrap();
        let room = make_room("AAAA11");
        let room_id = room.id();

        store.insert_room(&room).unwrap();
        assert_eq!(store.load_all_rooms().unwrap().len(), 1);

        store.delete_room(room_id).unwrap();
        assert!(store.load_all_rooms().unwrap().is_empty());
    }

    #[test]
    fn test_insert_multiple_rooms() {
        let store = SqliteStore::open(":memory:").unwrap();
        for code in ["AAAA11", "BBBB22", "CCCC33"] {
            store.insert_room(&make_room(code)).unwrap();
        }
        assert_eq!(store.load_all_rooms().unwrap().len(), 3);
    }

    #[test]
    fn test_insert_or_replace_same_id() {
        let store = SqliteStore::open(":memory:").unwrap();
        let room = make_room("AAAA11");
        store.insert_room(&room).unwrap();
        // INSERT OR REPLACE with same ID should not duplicate
        store.insert_room(&room).unwrap();
        assert_eq!(store.load_all_rooms().unwrap().len(), 1);
    }

    #[test]
    fn test_round_trip_preserves_participants() {
        let store = SqliteStore::open(":memory:").unwrap();
        let mut room = make_room("AAAA11");
        room.join(
            Profile {
                nickname: "guest".to_string(),
                gender: Gender::Female,
                mbti: Mbti::Infj,
                character: Character::Cat,
            },
            1_500,
        )
        .unwrap();
        store.insert_room(&room).unwrap();

        let loaded = store.load_all_rooms().unwrap();
        assert_eq!(loaded[0].participants().len(), 2);
        assert_eq!(loaded[0].participants()[1].nickname, "guest");
    }
}
