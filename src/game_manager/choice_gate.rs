use super::gateway::ConnectionGateway;
use super::reconciler::DisplayState;
use crate::game::Choice;
use crate::WSClientToServer;

/// Lets the local player submit at most one choice per round.
///
/// An accepted choice is emitted to the server and held right away, before the server confirms
/// it. The gate never resets on its own: it re-syncs to the display state whenever the reconciler
/// writes the player's own choice. A held choice is only dropped once the display has moved on
/// to a later round with the reveal completed; within its round, the server can confirm or
/// replace it but not take it back.
#[derive(Debug, Default)]
pub struct ChoiceGate {
    held: Choice,
    held_round: u32,
}

impl ChoiceGate {
    pub fn new() -> ChoiceGate {
        ChoiceGate::default()
    }

    pub fn held(&self) -> Choice {
        self.held
    }

    /// Round the held choice was made in.
    pub fn held_round(&self) -> u32 {
        self.held_round
    }

    pub fn is_open(&self) -> bool {
        self.held.is_none()
    }

    /// Submits `choice` for `round`. Returns whether the choice was accepted and sent.
    pub fn select<G: ConnectionGateway + ?Sized>(
        &mut self,
        choice: Choice,
        round: u32,
        gateway: &mut G,
    ) -> bool {
        if choice.is_none() {
            return false;
        }

        if !self.is_open() {
            log::debug!(
                "already chose {:?} in round {}, ignoring {:?}",
                self.held,
                self.held_round,
                choice
            );
            return false;
        }

        if let Err(err) = gateway.emit(WSClientToServer::Choice(choice)) {
            log::warn!("failed to submit {:?}: {:#}", choice, err);
            return false;
        }

        self.held = choice;
        self.held_round = round;
        true
    }

    /// Adopts the player's own choice as last written by the reconciler.
    pub fn sync(&mut self, display: &DisplayState) {
        if display.revealing {
            return;
        }

        let next = display.own_revealed_choice;
        if next.is_none() && !self.held.is_none() && display.round_number == self.held_round {
            log::debug!(
                "round {}: snapshot predates {:?}, keeping it",
                self.held_round,
                self.held
            );
            return;
        }

        if self.held != next {
            log::debug!("held choice {:?} -> {:?}", self.held, next);
        }
        self.held = next;
        self.held_round = display.round_number;
    }
}
