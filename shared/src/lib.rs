use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod claim;
pub mod protocol;
pub mod puzzle;

pub type PlayerId = String;

/// Visual color assigned to the room host; reassigned on host migration.
pub const HOST_COLOR: &str = "#e63946";
/// Visual color assigned to the joining guest.
pub const GUEST_COLOR: &str = "#457b9d";

/// A cell coordinate in the puzzle grid (row, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPos {
    pub r: usize,
    pub c: usize,
}

/// A player's pointer position as relayed between clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPos {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Ready,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Inclusive word-length band admitted into the puzzle.
    pub fn length_band(&self) -> (usize, usize) {
        match self {
            Difficulty::Easy => (3, 6),
            Difficulty::Medium => (4, 8),
            Difficulty::Hard => (5, 12),
        }
    }
}

/// Match parameters, immutable once a game has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSettings {
    pub theme: String,
    pub difficulty: Difficulty,
    pub grid_size: usize,
    pub word_count: usize,
    pub time_limit_seconds: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            theme: catalog::DEFAULT_THEME.to_string(),
            difficulty: Difficulty::Easy,
            grid_size: 10,
            word_count: 8,
            time_limit_seconds: 180,
        }
    }
}

impl GameSettings {
    /// Clamps allocation-time settings into ranges the generator and the
    /// match timers can work with.
    pub fn sanitized(mut self) -> Self {
        self.grid_size = self.grid_size.clamp(5, 24);
        self.word_count = self.word_count.clamp(1, 30);
        self.time_limit_seconds = self.time_limit_seconds.clamp(30, 3600);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub avatar: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_connected: bool,
    pub score: u32,
    pub words_found: Vec<String>,
    pub cursor: Option<CursorPos>,
    pub color: String,
}

impl Player {
    pub fn new(id: PlayerId, display_name: String, avatar: String, is_host: bool) -> Self {
        let color = if is_host { HOST_COLOR } else { GUEST_COLOR };
        Self {
            id,
            display_name,
            avatar,
            is_host,
            is_ready: false,
            is_connected: true,
            score: 0,
            words_found: Vec::new(),
            cursor: None,
            color: color.to_string(),
        }
    }
}

/// One word as placed into the grid, with its canonical endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedWord {
    pub word: String,
    pub start: CellPos,
    pub end: CellPos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleData {
    pub grid: Vec<Vec<char>>,
    pub words: Vec<PlacedWord>,
}

/// A successfully claimed word, recorded with the puzzle's endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundWord {
    pub word: String,
    pub found_by: PlayerId,
    pub start: CellPos,
    pub end: CellPos,
}
