//! Word-search puzzle generation.
//!
//! Generation is randomized in content but fixed in structure: filter the
//! theme's word list to the difficulty band, shuffle, place as many words as
//! fit, then fill the remaining cells with random letters. Placement that
//! falls short of the requested word count is not an error; callers must
//! treat `puzzle.words.len()` as the ground truth for completion.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog;
use crate::{CellPos, Difficulty, GameSettings, PlacedWord, PuzzleData};

/// Random placement attempts per candidate word before giving up on it.
const MAX_PLACEMENT_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Right,
    Left,
    Down,
    Up,
    DownRight,
    DownLeft,
    UpRight,
    UpLeft,
}

impl Direction {
    /// Per-letter (row, column) step.
    pub fn delta(&self) -> (isize, isize) {
        match self {
            Direction::Right => (0, 1),
            Direction::Left => (0, -1),
            Direction::Down => (1, 0),
            Direction::Up => (-1, 0),
            Direction::DownRight => (1, 1),
            Direction::DownLeft => (1, -1),
            Direction::UpRight => (-1, 1),
            Direction::UpLeft => (-1, -1),
        }
    }
}

const EASY_DIRECTIONS: &[Direction] = &[Direction::Right, Direction::Down];

const MEDIUM_DIRECTIONS: &[Direction] = &[
    Direction::Right,
    Direction::Down,
    Direction::DownRight,
    Direction::UpRight,
];

const HARD_DIRECTIONS: &[Direction] = &[
    Direction::Right,
    Direction::Left,
    Direction::Down,
    Direction::Up,
    Direction::DownRight,
    Direction::DownLeft,
    Direction::UpRight,
    Direction::UpLeft,
];

/// Placement directions allowed at a difficulty. Harder difficulties admit
/// reversed and diagonal runs.
pub fn allowed_directions(difficulty: Difficulty) -> &'static [Direction] {
    match difficulty {
        Difficulty::Easy => EASY_DIRECTIONS,
        Difficulty::Medium => MEDIUM_DIRECTIONS,
        Difficulty::Hard => HARD_DIRECTIONS,
    }
}

pub fn generate(settings: &GameSettings) -> PuzzleData {
    generate_with(&mut rand::thread_rng(), settings)
}

/// Deterministic when given a seeded rng; [`generate`] is the `thread_rng`
/// entry point.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, settings: &GameSettings) -> PuzzleData {
    let size = settings.grid_size;
    if size == 0 {
        return PuzzleData {
            grid: Vec::new(),
            words: Vec::new(),
        };
    }

    let mut grid: Vec<Vec<Option<char>>> = vec![vec![None; size]; size];
    let (min_len, max_len) = settings.difficulty.length_band();

    let mut candidates: Vec<&'static str> = catalog::words_for_theme(&settings.theme)
        .iter()
        .copied()
        .filter(|w| w.len() >= min_len && w.len() <= max_len && w.len() <= size)
        .collect();
    candidates.shuffle(rng);

    let directions = allowed_directions(settings.difficulty);
    let mut words = Vec::new();

    for candidate in candidates {
        if words.len() >= settings.word_count {
            break;
        }
        let letters: Vec<char> = candidate.to_ascii_uppercase().chars().collect();
        if let Some((start, end)) = try_place(rng, &mut grid, &letters, directions) {
            words.push(PlacedWord {
                word: candidate.to_ascii_uppercase(),
                start,
                end,
            });
        }
    }

    let grid = grid
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| cell.unwrap_or_else(|| random_letter(rng)))
                .collect()
        })
        .collect();

    PuzzleData { grid, words }
}

/// Attempts up to [`MAX_PLACEMENT_ATTEMPTS`] random positions for one word.
/// A position is valid when every cell is in bounds and either empty or
/// already holding the same letter.
fn try_place<R: Rng + ?Sized>(
    rng: &mut R,
    grid: &mut [Vec<Option<char>>],
    letters: &[char],
    directions: &[Direction],
) -> Option<(CellPos, CellPos)> {
    let size = grid.len() as isize;
    let len = letters.len() as isize;

    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let Some(direction) = directions.choose(rng) else {
            return None;
        };
        let (dr, dc) = direction.delta();
        let row = rng.gen_range(0..size);
        let col = rng.gen_range(0..size);
        let end_r = row + dr * (len - 1);
        let end_c = col + dc * (len - 1);
        if end_r < 0 || end_c < 0 || end_r >= size || end_c >= size {
            continue;
        }

        let fits = letters.iter().enumerate().all(|(i, &ch)| {
            let r = (row + dr * i as isize) as usize;
            let c = (col + dc * i as isize) as usize;
            grid[r][c].map_or(true, |existing| existing == ch)
        });
        if !fits {
            continue;
        }

        for (i, &ch) in letters.iter().enumerate() {
            let r = (row + dr * i as isize) as usize;
            let c = (col + dc * i as isize) as usize;
            grid[r][c] = Some(ch);
        }
        return Some((
            CellPos {
                r: row as usize,
                c: col as usize,
            },
            CellPos {
                r: end_r as usize,
                c: end_c as usize,
            },
        ));
    }
    None
}

fn random_letter<R: Rng + ?Sized>(rng: &mut R) -> char {
    (b'A' + rng.gen_range(0..26u8)) as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings(theme: &str, difficulty: Difficulty, grid_size: usize, word_count: usize) -> GameSettings {
        GameSettings {
            theme: theme.to_string(),
            difficulty,
            grid_size,
            word_count,
            ..GameSettings::default()
        }
    }

    /// Reads the grid letters along a placement's start..=end run.
    fn read_placement(puzzle: &PuzzleData, placed: &PlacedWord) -> String {
        let dr = (placed.end.r as isize - placed.start.r as isize).signum();
        let dc = (placed.end.c as isize - placed.start.c as isize).signum();
        let len = (placed.end.r as isize - placed.start.r as isize)
            .abs()
            .max((placed.end.c as isize - placed.start.c as isize).abs())
            + 1;
        (0..len)
            .map(|i| {
                let r = (placed.start.r as isize + dr * i) as usize;
                let c = (placed.start.c as isize + dc * i) as usize;
                puzzle.grid[r][c]
            })
            .collect()
    }

    #[test]
    fn test_placed_words_spell_themselves() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let settings = settings("animals", Difficulty::Hard, 12, 10);
            let puzzle = generate_with(&mut rng, &settings);
            assert!(!puzzle.words.is_empty(), "seed {seed} placed nothing");
            for placed in &puzzle.words {
                assert_eq!(
                    read_placement(&puzzle, placed),
                    placed.word,
                    "seed {seed} corrupted {}",
                    placed.word
                );
            }
        }
    }

    #[test]
    fn test_scenario_small_easy_grid() {
        let mut rng = StdRng::seed_from_u64(7);
        let settings = settings("animals", Difficulty::Easy, 8, 5);
        let puzzle = generate_with(&mut rng, &settings);

        assert_eq!(puzzle.grid.len(), 8);
        assert!(puzzle.grid.iter().all(|row| row.len() == 8));
        assert!(puzzle.words.len() <= 5);
        let (min_len, max_len) = Difficulty::Easy.length_band();
        for placed in &puzzle.words {
            assert!(placed.word.len() >= min_len);
            assert!(placed.word.len() <= max_len);
            assert!(placed.word.len() <= 8);
        }
    }

    #[test]
    fn test_easy_placements_run_forward() {
        let mut rng = StdRng::seed_from_u64(3);
        let settings = settings("food", Difficulty::Easy, 10, 8);
        let puzzle = generate_with(&mut rng, &settings);
        for placed in &puzzle.words {
            assert!(placed.end.r >= placed.start.r);
            assert!(placed.end.c >= placed.start.c);
            // horizontal or vertical only
            assert!(placed.end.r == placed.start.r || placed.end.c == placed.start.c);
        }
    }

    #[test]
    fn test_grid_fully_filled() {
        let mut rng = StdRng::seed_from_u64(11);
        let settings = settings("space", Difficulty::Medium, 9, 6);
        let puzzle = generate_with(&mut rng, &settings);
        for row in &puzzle.grid {
            for &cell in row {
                assert!(cell.is_ascii_uppercase());
            }
        }
    }

    #[test]
    fn test_overfull_request_degrades() {
        let mut rng = StdRng::seed_from_u64(42);
        let settings = settings("ocean", Difficulty::Easy, 5, 30);
        let puzzle = generate_with(&mut rng, &settings);
        // A 5x5 grid cannot hold thirty words; whatever was placed must
        // still read back correctly.
        assert!(puzzle.words.len() < 30);
        for placed in &puzzle.words {
            assert_eq!(read_placement(&puzzle, placed), placed.word);
        }
    }

    #[test]
    fn test_unknown_theme_generates_from_fallback() {
        let mut rng = StdRng::seed_from_u64(5);
        let settings = settings("dinosaurs", Difficulty::Easy, 10, 5);
        let puzzle = generate_with(&mut rng, &settings);
        for placed in &puzzle.words {
            let lower = placed.word.to_ascii_lowercase();
            assert!(catalog::words_for_theme("animals").contains(&lower.as_str()));
        }
    }

    #[test]
    fn test_no_duplicate_placements() {
        let mut rng = StdRng::seed_from_u64(9);
        let settings = settings("sports", Difficulty::Hard, 14, 12);
        let puzzle = generate_with(&mut rng, &settings);
        let mut seen: Vec<&str> = Vec::new();
        for placed in &puzzle.words {
            assert!(!seen.contains(&placed.word.as_str()));
            seen.push(&placed.word);
        }
    }
}
