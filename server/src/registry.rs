//! Process-wide room and connection lookup tables.
//!
//! These are the only structures shared across rooms. They are constructed
//! once at startup and passed around by `Arc`; nothing here is a global.
//! The connection table is deliberately not the authority for "is this
//! player connected" - that lives on the `Player` inside the room.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};
use rand::Rng;
use tokio::sync::{mpsc, RwLock};

use shared::protocol::ServerMessage;
use shared::PlayerId;

use crate::room::RoomCommand;

pub const ROOM_CODE_LEN: usize = 6;
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Handle for feeding commands into a room's serialized mutation queue.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub code: String,
    pub tx: mpsc::UnboundedSender<RoomCommand>,
}

/// Outbound handle for one live connection. The serial lets a stale
/// socket's teardown recognize that a reconnection already replaced it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub serial: u64,
    pub tx: mpsc::Sender<ServerMessage>,
}

#[derive(Default)]
pub struct Registry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
    connections: RwLock<HashMap<PlayerId, ConnectionHandle>>,
    next_serial: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_serial(&self) -> u64 {
        self.next_serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Inserts a new room under a freshly generated code, regenerating on
    /// collision with live rooms.
    pub async fn insert_room(&self, tx: mpsc::UnboundedSender<RoomCommand>) -> RoomHandle {
        let mut rooms = self.rooms.write().await;
        let mut rng = rand::thread_rng();
        let code = loop {
            let candidate = random_code(&mut rng);
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let handle = RoomHandle {
            code: code.clone(),
            tx,
        };
        rooms.insert(code, handle.clone());
        handle
    }

    pub async fn room(&self, code: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(code).cloned()
    }

    pub async fn remove_room(&self, code: &str) {
        if self.rooms.write().await.remove(code).is_some() {
            info!("room {} removed", code);
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn bind(&self, player_id: PlayerId, handle: ConnectionHandle) {
        self.connections.write().await.insert(player_id, handle);
    }

    /// Unbinds only while the serial still matches: a reconnection may have
    /// replaced the handle since the closing socket last looked.
    pub async fn unbind_if_current(&self, player_id: &PlayerId, serial: u64) {
        let mut connections = self.connections.write().await;
        if connections
            .get(player_id)
            .map_or(false, |h| h.serial == serial)
        {
            connections.remove(player_id);
        }
    }

    pub async fn connection(&self, player_id: &PlayerId) -> Option<ConnectionHandle> {
        self.connections.read().await.get(player_id).cloned()
    }

    /// Best-effort targeted send; unbound, full, or closed handles are
    /// skipped rather than treated as errors.
    pub async fn send_to(&self, player_id: &PlayerId, msg: ServerMessage) {
        if let Some(handle) = self.connection(player_id).await {
            if handle.tx.try_send(msg).is_err() {
                debug!("dropping message to {} (slow or closed connection)", player_id);
            }
        }
    }
}
