//! Validation of player word claims against the generated puzzle.

use std::fmt;

use crate::{CellPos, FoundWord, PlayerId, PuzzleData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    AlreadyClaimed,
    NotInPuzzle,
    InvalidPosition,
}

impl ClaimError {
    /// Stable reason string surfaced to the claiming player.
    pub fn reason(&self) -> &'static str {
        match self {
            ClaimError::AlreadyClaimed => "Word already claimed",
            ClaimError::NotInPuzzle => "Word not in puzzle",
            ClaimError::InvalidPosition => "Invalid word position",
        }
    }
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl std::error::Error for ClaimError {}

/// Checks a claim in rule order: duplicate, membership, then endpoints.
/// Selection direction is not significant, so the submitted endpoints may
/// equal the recorded pair in either order. The returned [`FoundWord`]
/// always carries the puzzle's canonical endpoints, not the caller's.
pub fn validate(
    puzzle: &PuzzleData,
    found_words: &[FoundWord],
    claimant: &PlayerId,
    word: &str,
    start: CellPos,
    end: CellPos,
) -> Result<FoundWord, ClaimError> {
    let word = word.to_ascii_uppercase();

    if found_words.iter().any(|f| f.word == word) {
        return Err(ClaimError::AlreadyClaimed);
    }

    let placed = puzzle
        .words
        .iter()
        .find(|p| p.word == word)
        .ok_or(ClaimError::NotInPuzzle)?;

    let forward = start == placed.start && end == placed.end;
    let reverse = start == placed.end && end == placed.start;
    if !forward && !reverse {
        return Err(ClaimError::InvalidPosition);
    }

    Ok(FoundWord {
        word,
        found_by: claimant.clone(),
        start: placed.start,
        end: placed.end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlacedWord;

    fn puzzle() -> PuzzleData {
        // FOX across row 0, OWL down column 0.
        PuzzleData {
            grid: vec![
                vec!['F', 'O', 'X', 'Q'],
                vec!['O', 'Z', 'Z', 'Z'],
                vec!['W', 'Z', 'Z', 'Z'],
                vec!['L', 'Z', 'Z', 'Z'],
            ],
            words: vec![
                PlacedWord {
                    word: "FOX".to_string(),
                    start: CellPos { r: 0, c: 0 },
                    end: CellPos { r: 0, c: 2 },
                },
                PlacedWord {
                    word: "OWL".to_string(),
                    start: CellPos { r: 1, c: 0 },
                    end: CellPos { r: 3, c: 0 },
                },
            ],
        }
    }

    fn claimant() -> PlayerId {
        "p1".to_string()
    }

    #[test]
    fn test_accepts_forward_claim() {
        let found = validate(
            &puzzle(),
            &[],
            &claimant(),
            "fox",
            CellPos { r: 0, c: 0 },
            CellPos { r: 0, c: 2 },
        )
        .unwrap();
        assert_eq!(found.word, "FOX");
        assert_eq!(found.found_by, "p1");
    }

    #[test]
    fn test_accepts_reverse_claim_with_canonical_endpoints() {
        let found = validate(
            &puzzle(),
            &[],
            &claimant(),
            "FOX",
            CellPos { r: 0, c: 2 },
            CellPos { r: 0, c: 0 },
        )
        .unwrap();
        // The recorded orientation wins over the caller's selection.
        assert_eq!(found.start, CellPos { r: 0, c: 0 });
        assert_eq!(found.end, CellPos { r: 0, c: 2 });
    }

    #[test]
    fn test_rejects_wrong_endpoint() {
        let err = validate(
            &puzzle(),
            &[],
            &claimant(),
            "FOX",
            CellPos { r: 0, c: 0 },
            CellPos { r: 0, c: 1 },
        )
        .unwrap_err();
        assert_eq!(err, ClaimError::InvalidPosition);
        assert_eq!(err.reason(), "Invalid word position");
    }

    #[test]
    fn test_rejects_unknown_word() {
        let err = validate(
            &puzzle(),
            &[],
            &claimant(),
            "WOLF",
            CellPos { r: 0, c: 0 },
            CellPos { r: 0, c: 3 },
        )
        .unwrap_err();
        assert_eq!(err, ClaimError::NotInPuzzle);
    }

    #[test]
    fn test_rejects_repeat_claim_before_position_check() {
        let first = validate(
            &puzzle(),
            &[],
            &claimant(),
            "OWL",
            CellPos { r: 1, c: 0 },
            CellPos { r: 3, c: 0 },
        )
        .unwrap();

        // Even with garbage endpoints the duplicate rule fires first.
        let err = validate(
            &puzzle(),
            &[first],
            &"p2".to_string(),
            "owl",
            CellPos { r: 9, c: 9 },
            CellPos { r: 0, c: 0 },
        )
        .unwrap_err();
        assert_eq!(err, ClaimError::AlreadyClaimed);
    }
}
