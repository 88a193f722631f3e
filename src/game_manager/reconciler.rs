use crate::game::{Choice, PlayerId, RoomSnapshot};

use tokio::time::{Duration, Instant};

/// How long the previous round's choices stay on screen after the round counter moves.
pub const REVEAL_DELAY: Duration = Duration::from_millis(3500);

/// What the local player sees. Owned by RoundReconciler; nothing else mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayState {
    pub round_number: u32,
    pub opponent_connected: bool,

    pub own_score: u32,
    pub opponent_score: u32,

    /// Choices made in the round being played.
    pub own_revealed_choice: Choice,
    pub opponent_revealed_choice: Choice,

    /// Choices made in the last completed round; this is what the reveal shows.
    pub own_previous_choice: Choice,
    pub opponent_previous_choice: Choice,

    pub revealing: bool,
}

/// Outcome of feeding one snapshot into the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Local player or opponent is missing from the snapshot, display is left as is.
    Skipped,

    /// Same-round update, applied right away.
    Updated,

    /// Same-round update that arrived while a reveal is pending; its choices will be shown when
    /// the reveal fires.
    Deferred,

    /// Round counter moved: scores are updated and the reveal is scheduled.
    RoundStarted,
}

#[derive(Debug, Clone, Copy)]
struct PendingReveal {
    due: Instant,

    own: Choice,
    opponent: Choice,
}

/// Turns the stream of room snapshots into display state, delaying the choices of a freshly
/// started round so that the previous round's result stays visible for a while.
///
/// The reconciler never touches a timer itself: the caller passes the current instant in, asks
/// for the reveal deadline, and calls `fire_reveal` once it's reached. At most one reveal is
/// pending at a time; a newer round transition replaces the older one.
#[derive(Debug)]
pub struct RoundReconciler {
    display: DisplayState,

    last_round: u32,
    local_player_id: Option<PlayerId>,

    reveal_delay: Duration,
    pending: Option<PendingReveal>,
}

impl Default for RoundReconciler {
    fn default() -> Self {
        Self::new(REVEAL_DELAY)
    }
}

impl RoundReconciler {
    pub fn new(reveal_delay: Duration) -> RoundReconciler {
        RoundReconciler {
            display: DisplayState::default(),
            last_round: 0,
            local_player_id: None,
            reveal_delay,
            pending: None,
        }
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn last_round(&self) -> u32 {
        self.last_round
    }

    pub fn local_player_id(&self) -> Option<PlayerId> {
        self.local_player_id
    }

    /// When the pending reveal is due, if there is one.
    pub fn reveal_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    pub fn reconcile(
        &mut self,
        snapshot: &RoomSnapshot,
        local_player_id: Option<PlayerId>,
        now: Instant,
    ) -> Reconciled {
        self.local_player_id = local_player_id;

        let id = match local_player_id {
            Some(id) => id,
            None => {
                log::debug!("round {}: no local player id yet, skipping", snapshot.round);
                return Reconciled::Skipped;
            }
        };

        let (me, opponent) = match snapshot.sides(id) {
            Some(v) => v,
            None => {
                log::debug!(
                    "round {}: snapshot lacks player {} or an opponent, skipping",
                    snapshot.round,
                    id
                );
                return Reconciled::Skipped;
            }
        };

        self.display.opponent_connected = opponent.connected;
        self.display.own_previous_choice = me.previous_choice;
        self.display.opponent_previous_choice = opponent.previous_choice;

        if snapshot.round == self.last_round {
            // Keep the running reveal intact, but make sure it lands on the freshest choices.
            if let Some(pending) = self.pending.as_mut() {
                pending.own = me.current_choice;
                pending.opponent = opponent.current_choice;
                return Reconciled::Deferred;
            }

            self.display.own_revealed_choice = me.current_choice;
            self.display.opponent_revealed_choice = opponent.current_choice;
            self.display.revealing = false;
            return Reconciled::Updated;
        }

        if let Some(stale) = self.pending {
            log::debug!(
                "round {} started before the reveal due at {:?} fired, replacing it",
                snapshot.round,
                stale.due
            );
        }

        self.display.round_number = snapshot.round;
        self.display.own_score = me.score;
        self.display.opponent_score = opponent.score;
        self.display.revealing = true;

        self.pending = Some(PendingReveal {
            due: now + self.reveal_delay,
            own: me.current_choice,
            opponent: opponent.current_choice,
        });
        self.last_round = snapshot.round;

        Reconciled::RoundStarted
    }

    /// Completes the pending reveal if it's due by `now`. Returns whether the display changed.
    pub fn fire_reveal(&mut self, now: Instant) -> bool {
        let pending = match self.pending {
            Some(p) if p.due <= now => p,
            _ => return false,
        };

        self.pending = None;
        self.display.own_revealed_choice = pending.own;
        self.display.opponent_revealed_choice = pending.opponent;
        self.display.revealing = false;

        true
    }

    /// Drops the pending reveal without applying it. Returns whether there was one.
    pub fn cancel_reveal(&mut self) -> bool {
        self.pending.take().is_some()
    }
}
