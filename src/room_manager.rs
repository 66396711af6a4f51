use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use tokio::sync::broadcast;
use crate::matching::{GameStats, RoundOutcome};
use crate::participant::{Character, ParticipantStatus, Profile};
use crate::result::{
    CompleteError, JoinError, SettingsError, SubmitError, TransitionError, TransitionSuccess,
    ValidationError,
};
use crate::room::{Room, RoomSettings, RoomSettingsPatch, RoomStatus, RoundTimerConfig};
use crate::round::{RoundPhase, SelectionRequest};
use crate::selection::{Selection, StatusBoard};
use crate::sqlite_store::SqliteStore;
use crate::room_code;
use serde::{Serialize, Deserialize};
use rand::thread_rng;

/// Event broadcast to subscribers when room state changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoomEvent {
    StateChanged(RoomStateResponse),
    RoundCompleted { room_id: Uuid, outcome: RoundOutcome },
    RoomCancelled { room_id: Uuid, reason: String },
}

/// Runtime-only timer state for an active round phase (not serialized)
struct ActivePhaseTimer {
    phase_started_at: tokio::time::Instant,
    remaining_at_start_ms: u64,
    timeout_handle: tokio::task::JoinHandle<()>,
    /// Monotonic id stamped when the timer is armed. A timeout wakeup must
    /// present a matching id before it may act, so a late wakeup cannot be
    /// mistaken for a timer armed after it went to sleep.
    generation: u64,
    expected_round_number: u32,
    expected_phase: RoundPhase,
}

/// Manages multiple concurrent rooms
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<RwLock<HashMap<Uuid, Arc<RwLock<Room>>>>>,
    codes: Arc<RwLock<HashMap<String, Uuid>>>,
    broadcasters: Arc<RwLock<HashMap<Uuid, broadcast::Sender<RoomEvent>>>>,
    db: Option<Arc<SqliteStore>>,
    phase_timers: Arc<Mutex<HashMap<Uuid, ActivePhaseTimer>>>,
    timer_seq: Arc<AtomicU64>,
}

/// Response for creating a new room
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: Uuid,
    pub code: String,
    pub host_id: Uuid,
}

/// One roster row in a state response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant_id: Uuid,
    pub nickname: String,
    pub character: Character,
    pub status: ParticipantStatus,
    pub is_host: bool,
}

/// The current round as seen by subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentRoundInfo {
    pub round_number: u32,
    pub question_id: Uuid,
    pub phase: RoundPhase,
    pub paused: bool,
}

/// Response for getting room state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStateResponse {
    pub room_id: Uuid,
    pub code: String,
    pub status: RoomStatus,
    pub host_id: Uuid,
    pub settings: RoomSettings,
    pub participants: Vec<ParticipantSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_round: Option<CurrentRoundInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_config: Option<RoundTimerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_remaining_ms: Option<u64>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum RoomManagerError {
    RoomNotFound,
    CodeNotFound,
    LockError,
    Join(JoinError),
    Transition(TransitionError),
    Submit(SubmitError),
    Settings(SettingsError),
    Complete(CompleteError),
    Validation(ValidationError),
    Storage(String),
}

impl From<JoinError> for RoomManagerError {
    fn from(e: JoinError) -> Self {
        RoomManagerError::Join(e)
    }
}

impl From<TransitionError> for RoomManagerError {
    fn from(e: TransitionError) -> Self {
        RoomManagerError::Transition(e)
    }
}

impl From<SubmitError> for RoomManagerError {
    fn from(e: SubmitError) -> Self {
        RoomManagerError::Submit(e)
    }
}

impl From<SettingsError> for RoomManagerError {
    fn from(e: SettingsError) -> Self {
        RoomManagerError::Settings(e)
    }
}

impl From<CompleteError> for RoomManagerError {
    fn from(e: CompleteError) -> Self {
        RoomManagerError::Complete(e)
    }
}

impl From<ValidationError> for RoomManagerError {
    fn from(e: ValidationError) -> Self {
        RoomManagerError::Validation(e)
    }
}

fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn phase_duration_ms(config: &RoundTimerConfig, phase: RoundPhase) -> Option<u64> {
    match phase {
        RoundPhase::FreeTime => Some(config.free_time_secs * 1000),
        RoundPhase::SelectionTime => Some(config.selection_time_secs * 1000),
        _ => None,
    }
}

impl RoomManager {
    /// Create a new room manager (in-memory only)
    pub fn new() -> Self {
        RoomManager {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            codes: Arc::new(RwLock::new(HashMap::new())),
            broadcasters: Arc::new(RwLock::new(HashMap::new())),
            db: None,
            phase_timers: Arc::new(Mutex::new(HashMap::new())),
            timer_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a room manager backed by SQLite. Loads existing rooms from the database.
    pub fn with_db(path: &str) -> Result<Self, String> {
        let store = SqliteStore::open(path)?;
        let existing_rooms = store.load_all_rooms()?;
        let mut rooms_map = HashMap::new();
        let mut codes_map = HashMap::new();
        let mut broadcasters_map = HashMap::new();
        for room in existing_rooms {
            let id = room.id();
            codes_map.insert(room.code().to_string(), id);
            rooms_map.insert(id, Arc::new(RwLock::new(room)));
            let (tx, _) = broadcast::channel(64);
            broadcasters_map.insert(id, tx);
        }
        log::info!("Loaded {} room(s) from database", rooms_map.len());
        let manager = RoomManager {
            rooms: Arc::new(RwLock::new(rooms_map)),
            codes: Arc::new(RwLock::new(codes_map)),
            broadcasters: Arc::new(RwLock::new(broadcasters_map)),
            db: Some(Arc::new(store)),
            phase_timers: Arc::new(Mutex::new(HashMap::new())),
            timer_seq: Arc::new(AtomicU64::new(0)),
        };

        // Restart timers for rooms with a live timed phase
        manager.restart_persisted_timers();

        Ok(manager)
    }

    /// Restart phase timers for timed rooms that had a round running when the
    /// server stopped. A phase whose deadline already passed fires at once.
    fn restart_persisted_timers(&self) {
        let rooms = match self.rooms.read() {
            Ok(r) => r,
            Err(_) => return,
        };
        for (&room_id, room_lock) in rooms.iter() {
            let room = match room_lock.read() {
                Ok(r) => r,
                Err(_) => continue,
            };
            let config = match room.timer() {
                Some(c) => c,
                None => continue,
            };
            let round = match room.current_round() {
                Some(r) => r,
                None => continue,
            };
            if round.is_paused() {
                continue;
            }
            let duration = match phase_duration_ms(&config, round.phase()) {
                Some(d) => d,
                None => continue,
            };
            if let Some(phase_start) = round.phase_started_at_ms() {
                let elapsed = epoch_ms_now()
                    .saturating_sub(phase_start)
                    .saturating_sub(round.paused_total_ms());
                let remaining = duration.saturating_sub(elapsed);
                self.start_phase_timer(room_id, round.round_number(), round.phase(), remaining);
            }
        }
    }

    fn persist_insert(&self, room: &Room) {
        if let Some(db) = &self.db {
            if let Err(e) = db.insert_room(room) {
                log::error!("Failed to persist room insert: {}", e);
            }
        }
    }

    fn persist_update(&self, room: &Room) {
        if let Some(db) = &self.db {
            if let Err(e) = db.update_room(room) {
                log::error!("Failed to persist room update: {}", e);
            }
        }
    }

    fn persist_delete(&self, room_id: Uuid) {
        if let Some(db) = &self.db {
            if let Err(e) = db.delete_room(room_id) {
                log::error!("Failed to persist room delete: {}", e);
            }
        }
    }

    /// Create a new room with the given host. Retries code generation until
    /// it finds one no live room holds.
    pub fn create_room(
        &self,
        settings: RoomSettings,
        host_profile: Profile,
        timer_config: Option<RoundTimerConfig>,
    ) -> Result<CreateRoomResponse, RoomManagerError> {
        let mut codes = self.codes.write().map_err(|_| RoomManagerError::LockError)?;
        let code = {
            let mut rng = thread_rng();
            loop {
                let candidate = room_code::generate(&mut rng);
                if !codes.contains_key(&candidate) {
                    break candidate;
                }
            }
        };

        let room = Room::create(settings, host_profile, code.clone(), timer_config, epoch_ms_now())?;
        let room_id = room.id();
        let host_id = room.host_id();
        self.persist_insert(&room);

        codes.insert(code.clone(), room_id);
        drop(codes);

        let mut rooms = self.rooms.write().map_err(|_| RoomManagerError::LockError)?;
        rooms.insert(room_id, Arc::new(RwLock::new(room)));
        drop(rooms);

        let (tx, _) = broadcast::channel(64);
        let mut broadcasters = self.broadcasters.write().map_err(|_| RoomManagerError::LockError)?;
        broadcasters.insert(room_id, tx);

        Ok(CreateRoomResponse { room_id, code, host_id })
    }

    /// Resolve a join code (case-insensitive, whitespace-trimmed) to a room id.
    pub fn find_by_code(&self, code: &str) -> Result<Uuid, RoomManagerError> {
        let normalized = room_code::normalize(code);
        let codes = self.codes.read().map_err(|_| RoomManagerError::LockError)?;
        codes.get(&normalized).copied().ok_or(RoomManagerError::CodeNotFound)
    }

    fn build_state_response(room_id: Uuid, room: &Room, active_timer: Option<&ActivePhaseTimer>) -> RoomStateResponse {
        let participants = room
            .participants()
            .iter()
            .filter(|p| p.is_active())
            .map(|p| ParticipantSummary {
                participant_id: p.id,
                nickname: p.nickname.clone(),
                character: p.character,
                status: p.status,
                is_host: p.id == room.host_id(),
            })
            .collect();

        let current_round = room.current_round().map(|r| CurrentRoundInfo {
            round_number: r.round_number(),
            question_id: r.question_id(),
            phase: r.phase(),
            paused: r.is_paused(),
        });

        let phase_remaining_ms = active_timer.map(|timer| {
            let elapsed = timer.phase_started_at.elapsed().as_millis() as u64;
            timer.remaining_at_start_ms.saturating_sub(elapsed)
        });

        RoomStateResponse {
            room_id,
            code: room.code().to_string(),
            status: room.status(),
            host_id: room.host_id(),
            settings: room.settings(),
            participants,
            current_round,
            timer_config: room.timer(),
            phase_remaining_ms,
        }
    }

    /// Get the state of a room
    pub fn get_room_state(&self, room_id: Uuid) -> Result<RoomStateResponse, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let room = room_lock.read().map_err(|_| RoomManagerError::LockError)?;

        let timers = self.phase_timers.lock().map_err(|_| RoomManagerError::LockError)?;
        let active_timer = timers.get(&room_id);
        Ok(Self::build_state_response(room_id, &room, active_timer))
    }

    fn broadcast(&self, room_id: Uuid, event: RoomEvent) {
        if let Ok(broadcasters) = self.broadcasters.read() {
            if let Some(tx) = broadcasters.get(&room_id) {
                let _ = tx.send(event);
            }
        }
    }

    fn broadcast_state(&self, room_id: Uuid, room: &Room) {
        let timers = self.phase_timers.lock().unwrap();
        let state = Self::build_state_response(room_id, room, timers.get(&room_id));
        drop(timers);
        self.broadcast(room_id, RoomEvent::StateChanged(state));
    }

    /// Join a room through its code. Returns the room and new participant ids.
    pub fn join_room(&self, code: &str, profile: Profile) -> Result<(Uuid, Uuid), RoomManagerError> {
        let room_id = self.find_by_code(code)?;
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        let participant_id = room.join(profile, epoch_ms_now())?;
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok((room_id, participant_id))
    }

    /// Remove a participant. A room left with no one in it is cancelled.
    pub fn leave_room(&self, room_id: Uuid, participant_id: Uuid) -> Result<(), RoomManagerError> {
        let deserted = {
            let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
            let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
            let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

            room.remove_participant(participant_id)?;
            let deserted = room.active_count() == 0 && !room.is_closed();
            if deserted {
                room.cancel()?;
            }
            self.persist_update(&room);
            self.broadcast_state(room_id, &room);
            deserted
        };

        if deserted {
            self.cancel_phase_timer(room_id);
            self.broadcast(room_id, RoomEvent::RoomCancelled {
                room_id,
                reason: "All participants left".to_string(),
            });
        }
        Ok(())
    }

    pub fn transfer_host(&self, room_id: Uuid, new_host_id: Uuid) -> Result<(), RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        room.transfer_host(new_host_id)?;
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok(())
    }

    pub fn update_settings(&self, room_id: Uuid, patch: RoomSettingsPatch) -> Result<(), RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        room.update_settings(patch)?;
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok(())
    }

    pub fn update_profile(
        &self,
        room_id: Uuid,
        participant_id: Uuid,
        nickname: Option<&str>,
        character: Option<Character>,
    ) -> Result<(), RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        room.update_profile(participant_id, nickname, character)?;
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok(())
    }

    pub fn set_participant_status(
        &self,
        room_id: Uuid,
        participant_id: Uuid,
        status: ParticipantStatus,
    ) -> Result<(), RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        room.set_participant_status(participant_id, status)?;
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok(())
    }

    /// Cancel the active phase timer for a room.
    /// Returns the elapsed ms since the phase timer started.
    fn cancel_phase_timer(&self, room_id: Uuid) -> u64 {
        let mut timers = self.phase_timers.lock().unwrap();
        if let Some(timer) = timers.remove(&room_id) {
            timer.timeout_handle.abort();
            timer.phase_started_at.elapsed().as_millis() as u64
        } else {
            0
        }
    }

    /// Start a phase timer. Spawns a tokio task that fires on the deadline.
    fn start_phase_timer(&self, room_id: Uuid, round_number: u32, phase: RoundPhase, remaining_ms: u64) {
        let generation = self.timer_seq.fetch_add(1, Ordering::Relaxed);
        let mgr = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(remaining_ms)).await;
            mgr.handle_phase_timeout(room_id, generation);
        });

        let mut timers = self.phase_timers.lock().unwrap();
        if let Some(old) = timers.insert(room_id, ActivePhaseTimer {
            phase_started_at: tokio::time::Instant::now(),
            remaining_at_start_ms: remaining_ms,
            timeout_handle: handle,
            generation,
            expected_round_number: round_number,
            expected_phase: phase,
        }) {
            old.timeout_handle.abort();
        }
    }

    /// Arm the timer for whatever phase the current round is now in.
    fn arm_timer_for_current_phase(&self, room_id: Uuid, room: &Room) {
        let config = match room.timer() {
            Some(c) => c,
            None => return,
        };
        let round = match room.current_round() {
            Some(r) => r,
            None => return,
        };
        if let Some(duration) = phase_duration_ms(&config, round.phase()) {
            self.start_phase_timer(room_id, round.round_number(), round.phase(), duration);
        }
    }

    /// Start the next round with the given question.
    pub fn start_round(
        &self,
        room_id: Uuid,
        round_number: u32,
        question_id: Uuid,
    ) -> Result<TransitionSuccess, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        room.start_round(round_number, question_id, epoch_ms_now())?;
        self.persist_update(&room);
        self.arm_timer_for_current_phase(room_id, &room);
        self.broadcast_state(room_id, &room);
        Ok(TransitionSuccess::RoundStarted)
    }

    /// Move the current round from free talk into selection time.
    pub fn advance_to_selection(&self, room_id: Uuid) -> Result<TransitionSuccess, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        self.cancel_phase_timer(room_id);
        let success = room.advance_to_selection(epoch_ms_now())?;
        self.persist_update(&room);
        self.arm_timer_for_current_phase(room_id, &room);
        self.broadcast_state(room_id, &room);
        Ok(success)
    }

    /// Close the current round, run the match detector, and publish the
    /// outcome to subscribers.
    pub fn complete_round(&self, room_id: Uuid) -> Result<(TransitionSuccess, RoundOutcome), RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        self.cancel_phase_timer(room_id);
        let (success, outcome) = room.complete_round(epoch_ms_now())?;
        self.persist_update(&room);
        self.broadcast(room_id, RoomEvent::RoundCompleted { room_id, outcome: outcome.clone() });
        self.broadcast_state(room_id, &room);
        Ok((success, outcome))
    }

    /// Pause the current round, freezing its phase deadline.
    pub fn pause_round(&self, room_id: Uuid) -> Result<TransitionSuccess, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        let success = room.pause_round(epoch_ms_now())?;
        self.cancel_phase_timer(room_id);
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok(success)
    }

    /// Resume a paused round with the time that was left when it paused.
    pub fn resume_round(&self, room_id: Uuid) -> Result<TransitionSuccess, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        let now = epoch_ms_now();
        let success = room.resume_round(now)?;
        if let (Some(config), Some(round)) = (room.timer(), room.current_round()) {
            if let (Some(duration), Some(phase_start)) =
                (phase_duration_ms(&config, round.phase()), round.phase_started_at_ms())
            {
                let elapsed = now
                    .saturating_sub(phase_start)
                    .saturating_sub(round.paused_total_ms());
                let remaining = duration.saturating_sub(elapsed);
                self.start_phase_timer(room_id, round.round_number(), round.phase(), remaining);
            }
        }
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok(success)
    }

    /// Record a selection for the current round.
    pub fn submit_selection(&self, room_id: Uuid, req: SelectionRequest) -> Result<Selection, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

        let selection = room.submit_selection(req, epoch_ms_now())?;
        self.persist_update(&room);
        self.broadcast_state(room_id, &room);
        Ok(selection)
    }

    /// Handle a phase deadline (called from the spawned timer task).
    /// Entirely synchronous to avoid recursive async Send issues.
    fn handle_phase_timeout(&self, room_id: Uuid, generation: u64) {
        // Claim the timer entry first. A manual transition re-arms the timer
        // under a fresh generation, so a wakeup holding a stale generation
        // finds a mismatch here and backs off without touching the room.
        let (expected_round, expected_phase) = {
            let mut timers = self.phase_timers.lock().unwrap();
            match timers.get(&room_id) {
                Some(timer) if timer.generation == generation => {
                    let expected = (timer.expected_round_number, timer.expected_phase);
                    timers.remove(&room_id);
                    expected
                }
                _ => return,
            }
        };

        // The entry was ours; check the round is still where we left it.
        {
            let rooms = match self.rooms.read() {
                Ok(r) => r,
                Err(_) => return,
            };
            let room_lock = match rooms.get(&room_id) {
                Some(r) => r,
                None => return,
            };
            let room = match room_lock.read() {
                Ok(r) => r,
                Err(_) => return,
            };
            match room.current_round() {
                Some(round)
                    if !round.is_paused()
                        && round.round_number() == expected_round
                        && round.phase() == expected_phase => {}
                _ => return,
            }
        }

        let result = match expected_phase {
            RoundPhase::FreeTime => self.advance_to_selection(room_id).map(|_| ()),
            RoundPhase::SelectionTime => self.complete_round(room_id).map(|_| ()),
            _ => return,
        };
        if let Err(e) = result {
            log::error!("Phase timeout handling failed for room {}: {:?}", room_id, e);
        }
    }

    /// Cancel a room, preventing any further play.
    pub fn cancel_room(&self, room_id: Uuid, reason: String) -> Result<(), RoomManagerError> {
        {
            let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
            let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
            let mut room = room_lock.write().map_err(|_| RoomManagerError::LockError)?;

            room.cancel()?;
            self.persist_update(&room);
            self.broadcast_state(room_id, &room);
        }

        self.cancel_phase_timer(room_id);
        self.broadcast(room_id, RoomEvent::RoomCancelled { room_id, reason });
        Ok(())
    }

    /// Selection progress for the current round.
    pub fn get_status_board(&self, room_id: Uuid) -> Result<StatusBoard, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let room = room_lock.read().map_err(|_| RoomManagerError::LockError)?;
        Ok(room.status_board()?)
    }

    /// The stored outcome of a completed round.
    pub fn get_round_outcome(&self, room_id: Uuid, round_number: u32) -> Result<RoundOutcome, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let room = room_lock.read().map_err(|_| RoomManagerError::LockError)?;
        room.outcomes()
            .iter()
            .find(|o| o.round_number == round_number)
            .cloned()
            .ok_or(RoomManagerError::Transition(TransitionError::NoCurrentRound))
    }

    /// Aggregate statistics across every completed round.
    pub fn get_game_stats(&self, room_id: Uuid) -> Result<GameStats, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        let room_lock = rooms.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        let room = room_lock.read().map_err(|_| RoomManagerError::LockError)?;
        Ok(room.game_stats())
    }

    /// List all live rooms
    pub fn list_rooms(&self) -> Result<Vec<Uuid>, RoomManagerError> {
        let rooms = self.rooms.read().map_err(|_| RoomManagerError::LockError)?;
        Ok(rooms.keys().copied().collect())
    }

    /// Remove a room entirely, releasing its code for reuse
    pub fn remove_room(&self, room_id: Uuid) -> Result<(), RoomManagerError> {
        self.cancel_phase_timer(room_id);

        let code = {
            let mut rooms = self.rooms.write().map_err(|_| RoomManagerError::LockError)?;
            let room_lock = rooms.remove(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
            let room = room_lock.read().map_err(|_| RoomManagerError::LockError)?;
            room.code().to_string()
        };

        if let Ok(mut codes) = self.codes.write() {
            codes.remove(&code);
        }

        self.persist_delete(room_id);

        if let Ok(mut broadcasters) = self.broadcasters.write() {
            broadcasters.remove(&room_id);
        }

        Ok(())
    }

    /// Subscribe to room state change events
    pub fn subscribe(&self, room_id: Uuid) -> Result<broadcast::Receiver<RoomEvent>, RoomManagerError> {
        let broadcasters = self.broadcasters.read().map_err(|_| RoomManagerError::LockError)?;
        let tx = broadcasters.get(&room_id).ok_or(RoomManagerError::RoomNotFound)?;
        Ok(tx.subscribe())
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
