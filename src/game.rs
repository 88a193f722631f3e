use anyhow::{anyhow, Result};
use std::fmt;
use std::str::FromStr;

pub type PlayerId = i64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,

    /// Not yet chosen this round.
    #[default]
    None,
}

/// The three moves a player can actually submit, in the order they're shown.
pub const MOVES: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

impl Choice {
    pub fn is_none(&self) -> bool {
        *self == Choice::None
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Choice::Rock => "ROCK",
            Choice::Paper => "PAPER",
            Choice::Scissors => "SCISSORS",
            Choice::None => "NONE",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_lowercase())
    }
}

impl FromStr for Choice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Choice> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rock" | "r" => Ok(Choice::Rock),
            "paper" | "p" => Ok(Choice::Paper),
            "scissors" | "s" => Ok(Choice::Scissors),
            "none" => Ok(Choice::None),
            other => Err(anyhow!("unknown choice {:?}", other)),
        }
    }
}

/// Per-player projection of the server's room state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub connected: bool,
    pub score: u32,
    pub current_choice: Choice,
    pub previous_choice: Choice,
}

/// Full, authoritative room state as pushed by the server. Every snapshot replaces the previous
/// one wholesale; nothing is merged across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct RoomSnapshot {
    pub round: u32,
    pub players: Vec<PlayerView>,
}

impl RoomSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The first player whose id differs from the given one.
    pub fn opponent_of(&self, id: PlayerId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id != id)
    }

    /// Both sides of the table from the point of view of the given player, or None if either one
    /// is missing.
    pub fn sides(&self, id: PlayerId) -> Option<(&PlayerView, &PlayerView)> {
        Some((self.player(id)?, self.opponent_of(id)?))
    }
}
