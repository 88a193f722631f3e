pub mod choice_gate;
pub mod gateway;
pub mod gateway_ws;
pub mod reconciler;
pub mod session;

use anyhow::{Context, Result};

use crate::game::{Choice, PlayerId, RoomSnapshot};
use crate::view::Screen;
use crate::WSServerToClient;
use choice_gate::ChoiceGate;
use gateway::ConnectionGateway;
use reconciler::{Reconciled, RoundReconciler, REVEAL_DELAY};
use session::RoomSession;

use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub room_id: String,

    /// How long the previous round's result stays up once a new round starts.
    pub reveal_delay: Duration,
}

impl SessionConfig {
    pub fn new(room_id: &str) -> SessionConfig {
        SessionConfig {
            room_id: room_id.to_string(),
            reveal_delay: REVEAL_DELAY,
        }
    }
}

/// Drives one room session: feeds server snapshots into the reconciler, user input into the
/// choice gate, fires the reveal when it's due, and keeps the UI posted with fresh screens.
///
/// Everything happens on the single task running `run`, so the display state and the held
/// choice are never touched concurrently. The reveal timer only exists inside that loop; once
/// the loop is over, nothing can fire anymore.
pub struct GameManager<G: ConnectionGateway> {
    session: RoomSession<G>,
    from_gateway: mpsc::UnboundedReceiver<WSServerToClient>,

    reconciler: RoundReconciler,
    gate: ChoiceGate,

    /// Latest snapshot, reconciled again once the server tells us who we are.
    last_snapshot: Option<RoomSnapshot>,

    to_ui: mpsc::Sender<GameManagerToUI>,
    from_ui: mpsc::Receiver<UIToGameManager>,
}

impl<G: ConnectionGateway> GameManager<G> {
    /// Joins the room right away; the session is left when `run` returns or when the manager
    /// is dropped without running.
    pub fn new(
        gateway: G,
        config: &SessionConfig,
        to_ui: mpsc::Sender<GameManagerToUI>,
        from_ui: mpsc::Receiver<UIToGameManager>,
    ) -> Result<GameManager<G>> {
        let (session, from_gateway) =
            RoomSession::join(gateway, &config.room_id).context("joining room")?;

        Ok(GameManager {
            session,
            from_gateway,
            reconciler: RoundReconciler::new(config.reveal_delay),
            gate: ChoiceGate::new(),
            last_snapshot: None,
            to_ui,
            from_ui,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        let res = self.run_loop().await;

        if self.reconciler.cancel_reveal() {
            log::debug!("room {}: dropped pending reveal", self.session.room_id());
        }
        self.session.leave();

        res
    }

    async fn run_loop(&mut self) -> Result<()> {
        self.publish().await?;

        loop {
            let deadline = self.reconciler.reveal_deadline();

            tokio::select! {
                v = self.from_gateway.recv() => {
                    match v {
                        Some(msg) => self.handle_server_msg(msg).await?,
                        None => {
                            log::info!("room {}: gateway is gone", self.session.room_id());
                            return Ok(());
                        }
                    }
                }

                v = self.from_ui.recv() => {
                    match v {
                        Some(UIToGameManager::Choose(choice)) => self.handle_choose(choice).await?,
                        Some(UIToGameManager::Leave) | None => {
                            log::info!("room {}: leaving on UI request", self.session.room_id());
                            return Ok(());
                        }
                    }
                }

                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.handle_reveal_due().await?;
                }
            }
        }
    }

    async fn handle_server_msg(&mut self, msg: WSServerToClient) -> Result<()> {
        match msg {
            WSServerToClient::Joined(joined) => {
                log::info!(
                    "room {}: joined as player {}",
                    self.session.room_id(),
                    joined.player_id
                );
                self.session.set_player_id(joined.player_id);

                self.to_ui
                    .send(GameManagerToUI::Joined(joined.player_id))
                    .await
                    .context("updating UI")?;

                if let Some(snapshot) = self.last_snapshot.take() {
                    self.handle_snapshot(snapshot).await?;
                }
            }

            WSServerToClient::Update(snapshot) => {
                self.handle_snapshot(snapshot).await?;
            }

            WSServerToClient::Error(msg) => {
                // No retry and no rejoin: the user gets to see it and decide.
                log::warn!("room {}: server error: {}", self.session.room_id(), msg);
                self.to_ui
                    .send(GameManagerToUI::Error(msg))
                    .await
                    .context("updating UI")?;
            }
        }

        Ok(())
    }

    async fn handle_snapshot(&mut self, snapshot: RoomSnapshot) -> Result<()> {
        let res = self
            .reconciler
            .reconcile(&snapshot, self.session.player_id(), Instant::now());
        self.last_snapshot = Some(snapshot);

        match res {
            Reconciled::Skipped => return Ok(()),
            Reconciled::Updated => self.gate.sync(self.reconciler.display()),
            Reconciled::Deferred => {}
            Reconciled::RoundStarted => {
                log::debug!(
                    "room {}: round {} started, revealing in {:?}",
                    self.session.room_id(),
                    self.reconciler.last_round(),
                    self.reconciler
                        .reveal_deadline()
                        .map(|d| d.saturating_duration_since(Instant::now()))
                );
            }
        }

        self.publish().await
    }

    async fn handle_choose(&mut self, choice: Choice) -> Result<()> {
        if !self.screen().accepts_input() {
            log::debug!("room {}: not taking input right now, ignoring {:?}", self.session.room_id(), choice);
            return Ok(());
        }

        let display = self.reconciler.display();
        if display.revealing {
            log::debug!("room {}: still revealing, ignoring {:?}", self.session.room_id(), choice);
            return Ok(());
        }

        let round = display.round_number;
        if self.gate.select(choice, round, self.session.gateway_mut()) {
            self.publish().await?;
        }

        Ok(())
    }

    async fn handle_reveal_due(&mut self) -> Result<()> {
        if !self.reconciler.fire_reveal(Instant::now()) {
            return Ok(());
        }

        self.gate.sync(self.reconciler.display());
        self.publish().await
    }

    fn screen(&self) -> Screen {
        Screen::new(self.reconciler.display(), self.gate.held())
    }

    async fn publish(&mut self) -> Result<()> {
        self.to_ui
            .send(GameManagerToUI::Screen(self.screen()))
            .await
            .context("updating UI")
    }
}

/// Message that GameManager can send to UI.
#[derive(Debug, Clone, PartialEq)]
pub enum GameManagerToUI {
    /// The server assigned us an id in the room.
    Joined(PlayerId),

    /// Whatever is on screen should be replaced with this.
    Screen(Screen),

    /// Error reported by the server or the connection.
    Error(String),
}

/// Message that UI can send to GameManager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UIToGameManager {
    Choose(Choice),
    Leave,
}
