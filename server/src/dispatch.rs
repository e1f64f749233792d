//! Message dispatch: the per-connection decode loop, the per-room actor,
//! and the broadcast fan-out that follows every aggregate mutation.
//!
//! Each room runs as one task owning its [`Room`], fed by an unbounded
//! command channel. Timers are spawned sleeps that send a command back into
//! the same channel, so timer expirations and client messages can never
//! interleave inside a mutation. Connections get a bounded outbound queue
//! drained by a writer task; a slow or dead peer loses messages instead of
//! stalling the room.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use shared::protocol::{ClientMessage, ServerMessage};
use shared::{GameSettings, PlayerId};

use crate::config::CoordinatorConfig;
use crate::registry::{ConnectionHandle, Registry, RoomHandle};
use crate::room::{Effect, Room, RoomCommand};

/// Creates a room, spawns its actor, and returns the allocated code.
pub async fn create_room(
    registry: &Arc<Registry>,
    settings: GameSettings,
    config: CoordinatorConfig,
) -> String {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = registry.insert_room(tx.clone()).await;
    let code = handle.code.clone();
    info!("room {} created", code);
    let room = Room::new(code.clone(), settings.sanitized(), config);
    tokio::spawn(room_task(room, rx, tx, Arc::clone(registry)));
    code
}

/// Outstanding timer tasks for one room, owned by its actor. All of them
/// are aborted when the room is deleted.
#[derive(Default)]
struct RoomTimers {
    countdown: Option<JoinHandle<()>>,
    time_limit: Option<JoinHandle<()>>,
    disconnect: HashMap<PlayerId, JoinHandle<()>>,
}

impl RoomTimers {
    fn abort_all(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
        if let Some(handle) = self.time_limit.take() {
            handle.abort();
        }
        for (_, handle) in self.disconnect.drain() {
            handle.abort();
        }
    }
}

/// The room actor: serializes every mutation of one room.
async fn room_task(
    mut room: Room,
    mut rx: mpsc::UnboundedReceiver<RoomCommand>,
    tx: mpsc::UnboundedSender<RoomCommand>,
    registry: Arc<Registry>,
) {
    let mut timers = RoomTimers::default();
    while let Some(cmd) = rx.recv().await {
        let effects = room.apply(cmd);
        if run_effects(&room, effects, &mut timers, &tx, &registry).await {
            break;
        }
    }
    timers.abort_all();
    registry.remove_room(&room.code).await;
}

/// Executes the aggregate's effects. Returns true when the room should be
/// deleted.
async fn run_effects(
    room: &Room,
    effects: Vec<Effect>,
    timers: &mut RoomTimers,
    tx: &mpsc::UnboundedSender<RoomCommand>,
    registry: &Arc<Registry>,
) -> bool {
    let mut delete = false;
    for effect in effects {
        match effect {
            Effect::Send(player_id, msg) => registry.send_to(&player_id, msg).await,
            Effect::Broadcast(msg) => broadcast(room, registry, &msg, None).await,
            Effect::BroadcastExcept(exclude, msg) => {
                broadcast(room, registry, &msg, Some(&exclude)).await
            }
            Effect::ScheduleCountdown {
                kind,
                remaining,
                after,
            } => {
                if let Some(old) = timers.countdown.take() {
                    old.abort();
                }
                let tx = tx.clone();
                timers.countdown = Some(tokio::spawn(async move {
                    sleep(after).await;
                    let _ = tx.send(RoomCommand::CountdownTick { kind, remaining });
                }));
            }
            Effect::ScheduleDisconnectTimeout { player_id, after } => {
                let tx = tx.clone();
                let timed_out = player_id.clone();
                let handle = tokio::spawn(async move {
                    sleep(after).await;
                    let _ = tx.send(RoomCommand::DisconnectTimeout { player_id: timed_out });
                });
                if let Some(old) = timers.disconnect.insert(player_id, handle) {
                    old.abort();
                }
            }
            Effect::CancelDisconnectTimeout(player_id) => {
                if let Some(handle) = timers.disconnect.remove(&player_id) {
                    handle.abort();
                }
            }
            Effect::ScheduleTimeLimit { epoch, after } => {
                if let Some(old) = timers.time_limit.take() {
                    old.abort();
                }
                let tx = tx.clone();
                timers.time_limit = Some(tokio::spawn(async move {
                    sleep(after).await;
                    let _ = tx.send(RoomCommand::TimeLimitExpired { epoch });
                }));
            }
            Effect::CancelTimeLimit => {
                if let Some(handle) = timers.time_limit.take() {
                    handle.abort();
                }
            }
            Effect::DeleteRoom => delete = true,
        }
    }
    delete
}

/// Fans a message out to every connected room member, optionally excluding
/// the originator. Sends are best-effort.
async fn broadcast(
    room: &Room,
    registry: &Arc<Registry>,
    msg: &ServerMessage,
    exclude: Option<&PlayerId>,
) {
    for player in room.players.values() {
        if Some(&player.id) == exclude || !player.is_connected {
            continue;
        }
        registry.send_to(&player.id, msg.clone()).await;
    }
}

/// Accept loop for the game wire protocol.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    config: CoordinatorConfig,
) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("connection from {}", addr);
        let registry = Arc::clone(&registry);
        let config = config.clone();
        tokio::spawn(async move {
            handle_connection(stream, registry, config).await;
        });
    }
}

/// The room a connection has joined, remembered for routing later messages.
struct Session {
    player_id: PlayerId,
    room: RoomHandle,
}

async fn handle_connection(stream: TcpStream, registry: Arc<Registry>, config: CoordinatorConfig) {
    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::channel::<ServerMessage>(config.outbound_buffer);
    let writer = tokio::spawn(write_loop(write_half, out_rx));

    let serial = registry.next_serial();
    let mut session: Option<Session> = None;
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!("read error: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let msg: ClientMessage = match serde_json::from_str(&line) {
            Ok(msg) => msg,
            Err(e) => {
                // Malformed input earns the sender an error, nobody else.
                debug!("unrecognized message: {}", e);
                send(&out_tx, ServerMessage::Error {
                    message: "Unrecognized message".to_string(),
                });
                continue;
            }
        };
        dispatch_message(msg, &mut session, serial, &out_tx, &registry).await;
    }

    // A vanished socket is a disconnect event, not a departure; the room's
    // grace timer decides whether it becomes permanent.
    if let Some(s) = session.take() {
        let _ = s.room.tx.send(RoomCommand::Disconnected {
            player_id: s.player_id.clone(),
        });
        registry.unbind_if_current(&s.player_id, serial).await;
    }
    drop(out_tx);
    let _ = writer.await;
}

async fn dispatch_message(
    msg: ClientMessage,
    session: &mut Option<Session>,
    serial: u64,
    out_tx: &mpsc::Sender<ServerMessage>,
    registry: &Arc<Registry>,
) {
    match msg {
        ClientMessage::Ping => send(out_tx, ServerMessage::Pong),
        ClientMessage::JoinRoom {
            room_id,
            player_id,
            name,
            avatar,
        } => {
            let Some(handle) = registry.room(&room_id).await else {
                send(out_tx, ServerMessage::Error {
                    message: "Room not found".to_string(),
                });
                return;
            };
            // Switching rooms over one socket implies leaving the old one.
            if let Some(prev) = session.take() {
                if prev.room.code != handle.code {
                    let _ = prev.room.tx.send(RoomCommand::Leave {
                        player_id: prev.player_id,
                    });
                }
            }
            registry
                .bind(
                    player_id.clone(),
                    ConnectionHandle {
                        serial,
                        tx: out_tx.clone(),
                    },
                )
                .await;
            let _ = handle.tx.send(RoomCommand::Join {
                player_id: player_id.clone(),
                name,
                avatar,
            });
            *session = Some(Session {
                player_id,
                room: handle,
            });
        }
        ClientMessage::LeaveRoom => {
            if let Some(s) = session.take() {
                let _ = s.room.tx.send(RoomCommand::Leave {
                    player_id: s.player_id.clone(),
                });
                registry.unbind_if_current(&s.player_id, serial).await;
            }
        }
        ClientMessage::PlayerReady { ready } => {
            forward(session, out_tx, |player_id| RoomCommand::SetReady {
                player_id,
                ready,
            });
        }
        ClientMessage::UpdateAvatar { avatar } => {
            forward(session, out_tx, |player_id| RoomCommand::UpdateAvatar {
                player_id,
                avatar,
            });
        }
        ClientMessage::CursorMove { x, y } => {
            forward(session, out_tx, |player_id| RoomCommand::CursorMove {
                player_id,
                x,
                y,
            });
        }
        ClientMessage::CursorLeave => {
            forward(session, out_tx, |player_id| RoomCommand::CursorLeave {
                player_id,
            });
        }
        ClientMessage::ClaimWord { word, start, end } => {
            forward(session, out_tx, |player_id| RoomCommand::ClaimWord {
                player_id,
                word,
                start,
                end,
            });
        }
        ClientMessage::RequestRematch => {
            forward(session, out_tx, |player_id| RoomCommand::VoteRematch {
                player_id,
            });
        }
        ClientMessage::ChatMessage { content } => {
            forward(session, out_tx, |player_id| RoomCommand::Chat {
                player_id,
                content,
            });
        }
        ClientMessage::Typing { is_typing } => {
            forward(session, out_tx, |player_id| RoomCommand::Typing {
                player_id,
                is_typing,
            });
        }
    }
}

/// Routes a message that requires room membership; senders outside a room
/// get a targeted error instead.
fn forward(
    session: &Option<Session>,
    out_tx: &mpsc::Sender<ServerMessage>,
    build: impl FnOnce(PlayerId) -> RoomCommand,
) {
    match session {
        Some(s) => {
            let _ = s.room.tx.send(build(s.player_id.clone()));
        }
        None => send(out_tx, ServerMessage::Error {
            message: "Not in a room".to_string(),
        }),
    }
}

/// Best-effort enqueue to one connection's writer.
fn send(tx: &mpsc::Sender<ServerMessage>, msg: ServerMessage) {
    if tx.try_send(msg).is_err() {
        debug!("dropping reply (slow or closed connection)");
    }
}

async fn write_loop(write_half: OwnedWriteHalf, mut rx: mpsc::Receiver<ServerMessage>) {
    let mut writer = BufWriter::new(write_half);
    while let Some(msg) = rx.recv().await {
        let mut line = match serde_json::to_string(&msg) {
            Ok(line) => line,
            Err(e) => {
                error!("failed to encode message: {}", e);
                continue;
            }
        };
        line.push('\n');
        if writer.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if writer.flush().await.is_err() {
            break;
        }
    }
}

/// Request accepted by the allocation listener; settings are optional and
/// fill from defaults.
#[derive(Debug, Default, Deserialize)]
struct AllocateRequest {
    #[serde(default)]
    settings: GameSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllocateResponse {
    room_code: String,
}

/// The out-of-band room allocation endpoint: one JSON request line per
/// connection, answered with the fresh room code.
pub async fn serve_allocator(
    listener: TcpListener,
    registry: Arc<Registry>,
    config: CoordinatorConfig,
) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("allocation request from {}", addr);
        let registry = Arc::clone(&registry);
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = allocate_one(stream, registry, config).await {
                warn!("allocation failed: {}", e);
            }
        });
    }
}

async fn allocate_one(
    stream: TcpStream,
    registry: Arc<Registry>,
    config: CoordinatorConfig,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut line = String::new();
    BufReader::new(read_half).read_line(&mut line).await?;

    let request: AllocateRequest = if line.trim().is_empty() {
        AllocateRequest::default()
    } else {
        serde_json::from_str(&line).unwrap_or_default()
    };

    let code = create_room(&registry, request.settings, config).await;
    let mut reply = serde_json::to_string(&AllocateResponse { room_code: code })
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    reply.push('\n');
    write_half.write_all(reply.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bind_player(registry: &Arc<Registry>, id: &str) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(64);
        registry
            .bind(
                id.to_string(),
                ConnectionHandle {
                    serial: registry.next_serial(),
                    tx,
                },
            )
            .await;
        rx
    }

    fn join_cmd(id: &str, name: &str) -> RoomCommand {
        RoomCommand::Join {
            player_id: id.to_string(),
            name: name.to_string(),
            avatar: "🦊".to_string(),
        }
    }

    async fn next(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
        rx.recv().await.expect("connection channel closed")
    }

    /// Timers run against the paused test clock, so the full countdown and
    /// the ten-second grace period elapse instantly.
    #[tokio::test(start_paused = true)]
    async fn test_actor_drives_countdown_and_grace_timers() {
        let registry = Arc::new(Registry::new());
        let code = create_room(
            &registry,
            shared::GameSettings::default(),
            CoordinatorConfig::default(),
        )
        .await;
        let handle = registry.room(&code).await.expect("room registered");

        let mut host_rx = bind_player(&registry, "p1").await;
        let _guest_rx = bind_player(&registry, "p2").await;

        handle.tx.send(join_cmd("p1", "Alice")).unwrap();
        handle.tx.send(join_cmd("p2", "Bob")).unwrap();
        for id in ["p1", "p2"] {
            handle
                .tx
                .send(RoomCommand::SetReady {
                    player_id: id.to_string(),
                    ready: true,
                })
                .unwrap();
        }

        // The one-second ticks arrive as scheduled commands: 3, 2, 1, start.
        let mut counts = Vec::new();
        loop {
            match next(&mut host_rx).await {
                ServerMessage::GameStarting { countdown } => counts.push(countdown),
                ServerMessage::GameStarted { .. } => break,
                _ => {}
            }
        }
        assert_eq!(counts, vec![3, 2, 1]);

        // Transport drop: grace elapses with no rejoin, the host wins.
        handle
            .tx
            .send(RoomCommand::Disconnected {
                player_id: "p2".to_string(),
            })
            .unwrap();
        loop {
            match next(&mut host_rx).await {
                ServerMessage::PlayerDisconnected {
                    reconnect_grace_ms, ..
                } => assert_eq!(reconnect_grace_ms, 10_000),
                ServerMessage::GameEnded {
                    winner_id, is_draw, ..
                } => {
                    assert_eq!(winner_id.as_deref(), Some("p1"));
                    assert!(!is_draw);
                    break;
                }
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_removes_emptied_room_from_registry() {
        let registry = Arc::new(Registry::new());
        let code = create_room(
            &registry,
            shared::GameSettings::default(),
            CoordinatorConfig::default(),
        )
        .await;
        let handle = registry.room(&code).await.expect("room registered");

        let _rx = bind_player(&registry, "p1").await;
        handle.tx.send(join_cmd("p1", "Alice")).unwrap();
        handle
            .tx
            .send(RoomCommand::Leave {
                player_id: "p1".to_string(),
            })
            .unwrap();

        for _ in 0..100 {
            if registry.room(&code).await.is_none() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        panic!("room was never removed from the registry");
    }
}
