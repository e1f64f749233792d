//! The room aggregate: authoritative state machine for one match.
//!
//! Every mutation funnels through [`Room::apply`], which turns a
//! [`RoomCommand`] into state changes plus a list of [`Effect`]s describing
//! the I/O to perform. Client messages and timer expirations arrive as
//! commands on the same serialized queue, so a word claim can never race a
//! disconnect timeout. The aggregate itself never touches a socket or a
//! timer; the actor loop in `dispatch` interprets the effects.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use shared::protocol::{RoomView, ServerMessage};
use shared::{
    claim, puzzle, CellPos, CursorPos, GameSettings, Player, PlayerId, RoomStatus, HOST_COLOR,
};

use crate::config::CoordinatorConfig;

/// Which countdown a tick belongs to; decides the message it broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownKind {
    Initial,
    Rematch,
}

/// A single serialized mutation of a room.
#[derive(Debug, Clone)]
pub enum RoomCommand {
    Join {
        player_id: PlayerId,
        name: String,
        avatar: String,
    },
    Leave {
        player_id: PlayerId,
    },
    SetReady {
        player_id: PlayerId,
        ready: bool,
    },
    UpdateAvatar {
        player_id: PlayerId,
        avatar: String,
    },
    CursorMove {
        player_id: PlayerId,
        x: f32,
        y: f32,
    },
    CursorLeave {
        player_id: PlayerId,
    },
    ClaimWord {
        player_id: PlayerId,
        word: String,
        start: CellPos,
        end: CellPos,
    },
    VoteRematch {
        player_id: PlayerId,
    },
    Chat {
        player_id: PlayerId,
        content: String,
    },
    Typing {
        player_id: PlayerId,
        is_typing: bool,
    },
    Disconnected {
        player_id: PlayerId,
    },
    CountdownTick {
        kind: CountdownKind,
        remaining: u8,
    },
    DisconnectTimeout {
        player_id: PlayerId,
    },
    TimeLimitExpired {
        epoch: u64,
    },
}

/// I/O requested by the aggregate, executed by the room actor.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Targeted best-effort send to one player's connection.
    Send(PlayerId, ServerMessage),
    /// Fan-out to every connected room member.
    Broadcast(ServerMessage),
    /// Fan-out to every connected member except the originator.
    BroadcastExcept(PlayerId, ServerMessage),
    ScheduleCountdown {
        kind: CountdownKind,
        remaining: u8,
        after: Duration,
    },
    ScheduleDisconnectTimeout {
        player_id: PlayerId,
        after: Duration,
    },
    CancelDisconnectTimeout(PlayerId),
    ScheduleTimeLimit {
        epoch: u64,
        after: Duration,
    },
    CancelTimeLimit,
    /// The last member departed; the registry entry and actor must go.
    DeleteRoom,
}

/// Why a match ended; decides how the winner is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Completion,
    TimeLimit,
    Forfeit,
}

pub struct Room {
    pub code: String,
    pub host_id: Option<PlayerId>,
    pub guest_id: Option<PlayerId>,
    pub players: HashMap<PlayerId, Player>,
    pub settings: GameSettings,
    pub status: RoomStatus,
    pub puzzle: Option<shared::PuzzleData>,
    pub found_words: Vec<shared::FoundWord>,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub winner_id: Option<PlayerId>,
    pub is_draw: bool,
    pub rematch_votes: HashSet<PlayerId>,
    /// Bumped on every game start so a time-limit timer scheduled for an
    /// earlier match can never end a later one.
    match_epoch: u64,
    chat_seq: u64,
    config: CoordinatorConfig,
}

impl Room {
    pub fn new(code: String, settings: GameSettings, config: CoordinatorConfig) -> Self {
        Self {
            code,
            host_id: None,
            guest_id: None,
            players: HashMap::new(),
            settings,
            status: RoomStatus::Waiting,
            puzzle: None,
            found_words: Vec::new(),
            started_at: None,
            ended_at: None,
            winner_id: None,
            is_draw: false,
            rematch_votes: HashSet::new(),
            match_epoch: 0,
            chat_seq: 0,
            config,
        }
    }

    pub fn apply(&mut self, cmd: RoomCommand) -> Vec<Effect> {
        match cmd {
            RoomCommand::Join {
                player_id,
                name,
                avatar,
            } => self.join(player_id, name, avatar),
            RoomCommand::Leave { player_id } => self.leave(player_id, "left"),
            RoomCommand::SetReady { player_id, ready } => self.set_ready(player_id, ready),
            RoomCommand::UpdateAvatar { player_id, avatar } => {
                self.update_avatar(player_id, avatar)
            }
            RoomCommand::CursorMove { player_id, x, y } => self.cursor_move(player_id, x, y),
            RoomCommand::CursorLeave { player_id } => self.cursor_leave(player_id),
            RoomCommand::ClaimWord {
                player_id,
                word,
                start,
                end,
            } => self.claim_word(player_id, word, start, end),
            RoomCommand::VoteRematch { player_id } => self.vote_rematch(player_id),
            RoomCommand::Chat { player_id, content } => self.chat(player_id, content),
            RoomCommand::Typing {
                player_id,
                is_typing,
            } => self.typing(player_id, is_typing),
            RoomCommand::Disconnected { player_id } => self.disconnected(player_id),
            RoomCommand::CountdownTick { kind, remaining } => self.countdown_tick(kind, remaining),
            RoomCommand::DisconnectTimeout { player_id } => self.disconnect_timeout(player_id),
            RoomCommand::TimeLimitExpired { epoch } => self.time_limit_expired(epoch),
        }
    }

    /// Snapshot for `room_state` messages, taken inside the same serialized
    /// turn as the mutation it reflects.
    pub fn view(&self) -> RoomView {
        RoomView {
            code: self.code.clone(),
            host_id: self.host_id.clone(),
            guest_id: self.guest_id.clone(),
            players: self.players.clone(),
            settings: self.settings.clone(),
            status: self.status,
            puzzle: self.puzzle.clone(),
            found_words: self.found_words.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            winner_id: self.winner_id.clone(),
            is_draw: self.is_draw,
        }
    }

    fn join(&mut self, player_id: PlayerId, name: String, avatar: String) -> Vec<Effect> {
        if self.players.contains_key(&player_id) {
            return self.reconnect(player_id);
        }
        if self.status != RoomStatus::Waiting {
            return vec![Effect::Send(player_id, error("Match already started"))];
        }
        let joinable = self.players.len() < 2 || self.guest_id.as_ref() == Some(&player_id);
        if !joinable {
            return vec![Effect::Send(player_id, error("Room is full"))];
        }

        let is_host = self.players.is_empty();
        let player = Player::new(player_id.clone(), name, avatar, is_host);
        if is_host {
            self.host_id = Some(player_id.clone());
        } else {
            self.guest_id = Some(player_id.clone());
        }
        info!(
            "room {}: {} joined as {}",
            self.code,
            player_id,
            if is_host { "host" } else { "guest" }
        );
        self.players.insert(player_id.clone(), player.clone());

        vec![
            Effect::Send(player_id.clone(), ServerMessage::RoomState { room: self.view() }),
            Effect::BroadcastExcept(player_id, ServerMessage::PlayerJoined { player }),
        ]
    }

    /// A join for an existing member is a reconnection and succeeds
    /// regardless of status.
    fn reconnect(&mut self, player_id: PlayerId) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&player_id) else {
            return Vec::new();
        };
        player.is_connected = true;
        info!("room {}: {} reconnected", self.code, player_id);
        vec![
            Effect::CancelDisconnectTimeout(player_id.clone()),
            Effect::Send(player_id.clone(), ServerMessage::RoomState { room: self.view() }),
            Effect::BroadcastExcept(
                player_id.clone(),
                ServerMessage::PlayerReconnected { player_id },
            ),
        ]
    }

    fn set_ready(&mut self, player_id: PlayerId, ready: bool) -> Vec<Effect> {
        if !matches!(self.status, RoomStatus::Waiting | RoomStatus::Ready) {
            return Vec::new();
        }
        let Some(player) = self.players.get_mut(&player_id) else {
            return Vec::new();
        };
        player.is_ready = ready;

        let mut effects = vec![Effect::Broadcast(ServerMessage::PlayerReadyChanged {
            player_id,
            ready,
        })];

        let all_ready = self.players.len() == 2 && self.players.values().all(|p| p.is_ready);
        match (self.status, all_ready) {
            (RoomStatus::Waiting, true) => {
                self.status = RoomStatus::Ready;
                effects.extend(self.start_countdown(CountdownKind::Initial));
            }
            (RoomStatus::Ready, false) => {
                // In-flight countdown ticks will notice and stop silently.
                self.status = RoomStatus::Waiting;
                debug!("room {}: countdown aborted", self.code);
            }
            _ => {}
        }
        effects
    }

    fn start_countdown(&self, kind: CountdownKind) -> Vec<Effect> {
        let from = self.config.countdown_start;
        info!("room {}: countdown started from {}", self.code, from);
        vec![
            Effect::Broadcast(countdown_message(kind, from)),
            Effect::ScheduleCountdown {
                kind,
                remaining: from.saturating_sub(1),
                after: self.config.countdown_tick,
            },
        ]
    }

    fn countdown_tick(&mut self, kind: CountdownKind, remaining: u8) -> Vec<Effect> {
        // A tick that outlives its countdown (someone un-readied or left)
        // stops silently.
        if self.status != RoomStatus::Ready {
            return Vec::new();
        }
        if remaining > 0 {
            return vec![
                Effect::Broadcast(countdown_message(kind, remaining)),
                Effect::ScheduleCountdown {
                    kind,
                    remaining: remaining - 1,
                    after: self.config.countdown_tick,
                },
            ];
        }
        self.start_game()
    }

    fn start_game(&mut self) -> Vec<Effect> {
        let puzzle = puzzle::generate(&self.settings);
        info!(
            "room {}: match started with {} placed words",
            self.code,
            puzzle.words.len()
        );
        self.match_epoch += 1;
        self.status = RoomStatus::Playing;
        self.found_words.clear();
        self.winner_id = None;
        self.is_draw = false;
        self.ended_at = None;
        let now = now_ms();
        self.started_at = Some(now);
        for player in self.players.values_mut() {
            player.score = 0;
            player.words_found.clear();
            player.is_ready = false;
        }
        self.puzzle = Some(puzzle.clone());

        vec![
            Effect::Broadcast(ServerMessage::GameStarted {
                puzzle,
                start_time: now,
            }),
            Effect::ScheduleTimeLimit {
                epoch: self.match_epoch,
                after: Duration::from_secs(self.settings.time_limit_seconds),
            },
        ]
    }

    fn claim_word(
        &mut self,
        player_id: PlayerId,
        word: String,
        start: CellPos,
        end: CellPos,
    ) -> Vec<Effect> {
        if self.status != RoomStatus::Playing {
            return vec![Effect::Send(
                player_id,
                ServerMessage::WordClaimRejected {
                    word,
                    reason: "Game is not in progress".to_string(),
                },
            )];
        }
        let Some(puzzle) = self.puzzle.as_ref() else {
            return Vec::new();
        };
        if !self.players.contains_key(&player_id) {
            return Vec::new();
        }

        let total_words = puzzle.words.len();
        let found = match claim::validate(puzzle, &self.found_words, &player_id, &word, start, end)
        {
            Err(err) => {
                debug!(
                    "room {}: claim {:?} by {} rejected: {}",
                    self.code, word, player_id, err
                );
                return vec![Effect::Send(
                    player_id,
                    ServerMessage::WordClaimRejected {
                        word,
                        reason: err.reason().to_string(),
                    },
                )];
            }
            Ok(found) => found,
        };

        self.found_words.push(found.clone());
        let player_name = {
            let Some(player) = self.players.get_mut(&player_id) else {
                return Vec::new();
            };
            player.score += self.config.points_per_word;
            player.words_found.push(found.word.clone());
            player.display_name.clone()
        };

        let (host_score, guest_score) = self.scores();
        let mut effects = vec![Effect::Broadcast(ServerMessage::WordClaimed {
            word: found.word,
            player_id,
            player_name,
            start: found.start,
            end: found.end,
            host_score,
            guest_score,
        })];

        if self.found_words.len() == total_words {
            effects.extend(self.end_game(EndReason::Completion, None));
        }
        effects
    }

    /// (host score, guest score) as shown in score-bearing broadcasts.
    fn scores(&self) -> (u32, u32) {
        let score_of = |id: &Option<PlayerId>| {
            id.as_ref()
                .and_then(|id| self.players.get(id))
                .map_or(0, |p| p.score)
        };
        (score_of(&self.host_id), score_of(&self.guest_id))
    }

    fn end_game(&mut self, reason: EndReason, forfeit_winner: Option<PlayerId>) -> Vec<Effect> {
        let (host_score, guest_score) = self.scores();
        self.status = RoomStatus::Finished;
        self.ended_at = Some(now_ms());
        self.rematch_votes.clear();

        match reason {
            EndReason::Forfeit => {
                // The remaining player wins unconditionally.
                self.winner_id = forfeit_winner;
                self.is_draw = false;
            }
            EndReason::Completion | EndReason::TimeLimit => {
                if host_score > guest_score {
                    self.winner_id = self.host_id.clone();
                    self.is_draw = false;
                } else if guest_score > host_score {
                    self.winner_id = self.guest_id.clone();
                    self.is_draw = false;
                } else {
                    self.winner_id = None;
                    self.is_draw = true;
                }
            }
        }
        info!(
            "room {}: match ended ({:?}), winner {:?}",
            self.code, reason, self.winner_id
        );

        vec![
            Effect::CancelTimeLimit,
            Effect::Broadcast(ServerMessage::GameEnded {
                winner_id: self.winner_id.clone(),
                is_draw: self.is_draw,
                host_score,
                guest_score,
            }),
        ]
    }

    fn leave(&mut self, player_id: PlayerId, reason: &str) -> Vec<Effect> {
        if !self.players.contains_key(&player_id) {
            return Vec::new();
        }
        let mut effects = vec![Effect::CancelDisconnectTimeout(player_id.clone())];

        // Forfeit is decided while the departing player's score is still on
        // the books.
        if self.status == RoomStatus::Playing {
            let remaining_id = self.players.keys().find(|id| **id != player_id).cloned();
            effects.extend(self.end_game(EndReason::Forfeit, remaining_id.clone()));
            if let Some(remaining_id) = remaining_id {
                effects.push(Effect::Send(
                    remaining_id,
                    ServerMessage::OpponentLeft {
                        reason: reason.to_string(),
                    },
                ));
            }
        }

        let Some(player) = self.players.remove(&player_id) else {
            return effects;
        };
        info!("room {}: {} {}", self.code, player_id, reason);
        self.rematch_votes.remove(&player_id);
        let was_host = self.host_id.as_ref() == Some(&player_id);
        if self.guest_id.as_ref() == Some(&player_id) {
            self.guest_id = None;
        }

        if self.players.is_empty() {
            self.host_id = None;
            effects.push(Effect::DeleteRoom);
            return effects;
        }

        effects.push(Effect::Broadcast(ServerMessage::PlayerLeft {
            player_id: player_id.clone(),
            name: player.display_name,
        }));

        if was_host {
            self.guest_id = None;
            if let Some(remaining) = self.players.values_mut().next() {
                remaining.is_host = true;
                remaining.color = HOST_COLOR.to_string();
                self.host_id = Some(remaining.id.clone());
                info!("room {}: host migrated to {}", self.code, remaining.id);
            }
        }

        // Refresh the remaining player's view of the shrunken room.
        effects.push(Effect::Broadcast(ServerMessage::RoomState { room: self.view() }));
        effects
    }

    fn vote_rematch(&mut self, player_id: PlayerId) -> Vec<Effect> {
        if self.status != RoomStatus::Finished || !self.players.contains_key(&player_id) {
            return Vec::new();
        }
        if !self.rematch_votes.insert(player_id.clone()) {
            return Vec::new();
        }
        info!(
            "room {}: rematch vote {}/{}",
            self.code,
            self.rematch_votes.len(),
            self.players.len()
        );

        let mut effects = vec![Effect::BroadcastExcept(
            player_id.clone(),
            ServerMessage::RematchRequested { player_id },
        )];
        if self.rematch_votes.len() == self.players.len() {
            effects.extend(self.reset_for_rematch());
        }
        effects
    }

    /// Unanimous rematch: reset the room in place and, with both seats
    /// filled, roll straight into a fresh countdown with no ready toggle.
    fn reset_for_rematch(&mut self) -> Vec<Effect> {
        self.rematch_votes.clear();
        self.puzzle = None;
        self.found_words.clear();
        self.winner_id = None;
        self.is_draw = false;
        self.started_at = None;
        self.ended_at = None;
        for player in self.players.values_mut() {
            player.score = 0;
            player.words_found.clear();
            player.is_ready = false;
            player.cursor = None;
        }

        if self.players.len() == 2 {
            self.status = RoomStatus::Ready;
            let mut effects = vec![Effect::Broadcast(ServerMessage::RoomState { room: self.view() })];
            effects.extend(self.start_countdown(CountdownKind::Rematch));
            effects
        } else {
            // A lone player resets back to waiting for a new opponent.
            self.status = RoomStatus::Waiting;
            vec![Effect::Broadcast(ServerMessage::RoomState { room: self.view() })]
        }
    }

    fn update_avatar(&mut self, player_id: PlayerId, avatar: String) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&player_id) else {
            return Vec::new();
        };
        player.avatar = avatar.clone();
        vec![Effect::Broadcast(ServerMessage::PlayerAvatarChanged {
            player_id,
            avatar,
        })]
    }

    fn cursor_move(&mut self, player_id: PlayerId, x: f32, y: f32) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&player_id) else {
            return Vec::new();
        };
        player.cursor = Some(CursorPos { x, y });
        vec![Effect::BroadcastExcept(
            player_id.clone(),
            ServerMessage::CursorUpdate { player_id, x, y },
        )]
    }

    fn cursor_leave(&mut self, player_id: PlayerId) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&player_id) else {
            return Vec::new();
        };
        player.cursor = None;
        vec![Effect::BroadcastExcept(
            player_id.clone(),
            ServerMessage::CursorLeft { player_id },
        )]
    }

    fn chat(&mut self, player_id: PlayerId, content: String) -> Vec<Effect> {
        let Some(player) = self.players.get(&player_id) else {
            return Vec::new();
        };
        let content = content.trim();
        if content.is_empty() || content.len() > self.config.chat_max_len {
            debug!(
                "room {}: dropped chat from {} ({} bytes)",
                self.code,
                player_id,
                content.len()
            );
            return Vec::new();
        }
        let sender_name = player.display_name.clone();
        let sender_avatar = player.avatar.clone();
        self.chat_seq += 1;
        vec![Effect::Broadcast(ServerMessage::ChatMessage {
            id: format!("{}-{}", self.code, self.chat_seq),
            sender_id: player_id,
            sender_name,
            sender_avatar,
            content: content.to_string(),
            timestamp: now_ms(),
        })]
    }

    fn typing(&mut self, player_id: PlayerId, is_typing: bool) -> Vec<Effect> {
        if !self.players.contains_key(&player_id) {
            return Vec::new();
        }
        vec![Effect::BroadcastExcept(
            player_id.clone(),
            ServerMessage::PlayerTyping {
                player_id,
                is_typing,
            },
        )]
    }

    fn disconnected(&mut self, player_id: PlayerId) -> Vec<Effect> {
        let Some(player) = self.players.get_mut(&player_id) else {
            return Vec::new();
        };
        if !player.is_connected {
            return Vec::new();
        }
        player.is_connected = false;
        player.cursor = None;
        let name = player.display_name.clone();
        let grace = self.config.reconnect_grace;
        info!(
            "room {}: {} disconnected, {}ms grace",
            self.code,
            player_id,
            grace.as_millis()
        );
        vec![
            Effect::BroadcastExcept(
                player_id.clone(),
                ServerMessage::PlayerDisconnected {
                    player_id: player_id.clone(),
                    name,
                    reconnect_grace_ms: grace.as_millis() as u64,
                },
            ),
            Effect::ScheduleDisconnectTimeout {
                player_id,
                after: grace,
            },
        ]
    }

    fn disconnect_timeout(&mut self, player_id: PlayerId) -> Vec<Effect> {
        // Stale timers (player reconnected, or already removed) no-op.
        let still_gone = self
            .players
            .get(&player_id)
            .map_or(false, |p| !p.is_connected);
        if !still_gone {
            return Vec::new();
        }
        self.leave(player_id, "disconnected")
    }

    fn time_limit_expired(&mut self, epoch: u64) -> Vec<Effect> {
        if epoch != self.match_epoch || self.status != RoomStatus::Playing {
            return Vec::new();
        }
        info!("room {}: time limit reached", self.code);
        self.end_game(EndReason::TimeLimit, None)
    }
}

fn countdown_message(kind: CountdownKind, countdown: u8) -> ServerMessage {
    match kind {
        CountdownKind::Initial => ServerMessage::GameStarting { countdown },
        CountdownKind::Rematch => ServerMessage::RematchStarting { countdown },
    }
}

fn error(message: &str) -> ServerMessage {
    ServerMessage::Error {
        message: message.to_string(),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
