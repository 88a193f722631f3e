//! What the rendering layer should put on screen, derived from the display state and the
//! locally held choice. Nothing here has side effects.

use std::fmt;

use crate::game::{Choice, MOVES};
use crate::game_manager::reconciler::DisplayState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Opponent hasn't shown up or has dropped; no game controls at all.
    WaitingForOpponent,
    Round(RoundView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundView {
    pub round: u32,
    pub own_score: u32,
    pub opponent_score: u32,

    pub opponent: OpponentPanel,

    /// Moves shown to the local player: all of them while nothing is chosen, otherwise just the
    /// chosen one.
    pub moves: Vec<Choice>,

    /// Whether clicking a move does anything. Never while the previous round is being revealed.
    pub accepts_input: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpponentPanel {
    /// Opponent hasn't picked a move yet.
    Thinking,

    /// Opponent picked a move, which stays hidden until the round is over.
    Chose,

    /// The round just finished, showing what both players played.
    Revealed { own: Choice, opponent: Choice },
}

impl Screen {
    pub fn new(display: &DisplayState, held: Choice) -> Screen {
        if !display.opponent_connected {
            return Screen::WaitingForOpponent;
        }

        let opponent = if display.revealing {
            OpponentPanel::Revealed {
                own: display.own_previous_choice,
                opponent: display.opponent_previous_choice,
            }
        } else if display.opponent_revealed_choice.is_none() {
            OpponentPanel::Thinking
        } else {
            OpponentPanel::Chose
        };

        let moves = MOVES
            .iter()
            .copied()
            .filter(|m| held.is_none() || *m == held)
            .collect();

        Screen::Round(RoundView {
            round: display.round_number,
            own_score: display.own_score,
            opponent_score: display.opponent_score,
            opponent,
            moves,
            accepts_input: held.is_none() && !display.revealing,
        })
    }

    pub fn accepts_input(&self) -> bool {
        match self {
            Screen::WaitingForOpponent => false,
            Screen::Round(r) => r.accepts_input,
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let r = match self {
            Screen::WaitingForOpponent => return writeln!(f, "\nWaiting for opponent..."),
            Screen::Round(r) => r,
        };

        writeln!(f, "\n=== Round {} ===", r.round)?;
        writeln!(f, "Opponent's score: {}", r.opponent_score)?;

        match r.opponent {
            OpponentPanel::Thinking => writeln!(f, "  Waiting for opponent choice")?,
            OpponentPanel::Chose => writeln!(f, "  Opponent made a choice")?,
            OpponentPanel::Revealed { own, opponent } => {
                writeln!(f, "  You played {}, opponent played {}", own, opponent)?
            }
        }

        writeln!(f, "Your score: {}", r.own_score)?;

        let moves = r
            .moves
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        if r.accepts_input {
            writeln!(f, "  Pick one: {} (or quit)", moves)
        } else {
            writeln!(f, "  Your choice: {}", moves)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn connected() -> DisplayState {
        DisplayState {
            opponent_connected: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_waiting_when_opponent_gone() {
        let display = DisplayState {
            opponent_connected: false,
            revealing: true,
            round_number: 3,
            ..Default::default()
        };

        let screen = Screen::new(&display, Choice::None);
        assert_eq!(screen, Screen::WaitingForOpponent);
        assert!(!screen.accepts_input());
    }

    #[test]
    fn test_fresh_round() {
        let screen = Screen::new(&connected(), Choice::None);
        assert_eq!(
            screen,
            Screen::Round(RoundView {
                round: 0,
                own_score: 0,
                opponent_score: 0,
                opponent: OpponentPanel::Thinking,
                moves: vec![Choice::Rock, Choice::Paper, Choice::Scissors],
                accepts_input: true,
            })
        );
    }

    #[test]
    fn test_after_choosing() {
        let display = DisplayState {
            opponent_revealed_choice: Choice::Rock,
            ..connected()
        };

        match Screen::new(&display, Choice::Paper) {
            Screen::Round(r) => {
                assert_eq!(r.moves, vec![Choice::Paper]);
                assert!(!r.accepts_input);
                assert_eq!(r.opponent, OpponentPanel::Chose);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reveal_shows_previous_round() {
        let display = DisplayState {
            round_number: 1,
            own_score: 1,
            revealing: true,
            own_previous_choice: Choice::Rock,
            opponent_previous_choice: Choice::Scissors,
            ..connected()
        };

        match Screen::new(&display, Choice::Rock) {
            Screen::Round(r) => {
                assert_eq!(r.round, 1);
                assert_eq!(r.own_score, 1);
                assert_eq!(
                    r.opponent,
                    OpponentPanel::Revealed {
                        own: Choice::Rock,
                        opponent: Choice::Scissors
                    }
                );
                assert!(!r.accepts_input);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_input_while_revealing() {
        let display = DisplayState {
            round_number: 4,
            revealing: true,
            ..connected()
        };

        let screen = Screen::new(&display, Choice::None);
        assert!(!screen.accepts_input());
        match screen {
            Screen::Round(r) => assert_eq!(r.moves, MOVES.to_vec()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_display_reveal() {
        let screen = Screen::Round(RoundView {
            round: 2,
            own_score: 1,
            opponent_score: 1,
            opponent: OpponentPanel::Revealed {
                own: Choice::Paper,
                opponent: Choice::Rock,
            },
            moves: vec![Choice::Paper],
            accepts_input: false,
        });

        let out = screen.to_string();
        assert!(out.contains("=== Round 2 ==="));
        assert!(out.contains("You played paper, opponent played rock"));
        assert!(out.contains("Your choice: paper"));
    }

    #[test]
    fn test_display_pick() {
        let out = Screen::new(&connected(), Choice::None).to_string();
        assert!(out.contains("Waiting for opponent choice"));
        assert!(out.contains("Pick one: rock, paper, scissors (or quit)"));
    }

    #[test]
    fn test_display_waiting() {
        assert!(Screen::WaitingForOpponent.to_string().contains("Waiting for opponent..."));
    }
}
