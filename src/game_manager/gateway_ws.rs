use anyhow::{anyhow, Context, Result};

use futures_util::{Sink, SinkExt, StreamExt};

use super::gateway::{ConnectionGateway, Handler, HandlerId, Subscribers};
use crate::{EventName, WSClientToServer, WSServerToClient};

use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

#[derive(Debug)]
enum Command {
    Subscribe(EventName, HandlerId, Handler),
    Unsubscribe(EventName, HandlerId),
    Emit(WSClientToServer),
}

/// ConnectionGateway over a single WebSocket connection carrying JSON text frames.
///
/// The socket is driven by a background task which owns the subscriber table; the gateway
/// itself only forwards commands to it, so every call is non-blocking and order-preserving.
/// Frames that don't parse are logged and skipped. There is no reconnection: once the connection
/// itself fails, subscribers get an `error` event with the reason and the task stops.
pub struct WsGateway {
    connect_url: url::Url,

    ids: Subscribers,

    commands: Option<mpsc::UnboundedSender<Command>>,

    /// Receiving end of `commands`, until `open` hands it over to the connection task.
    queued: Option<mpsc::UnboundedReceiver<Command>>,

    /// Dropped by the connection task when it's finished.
    done_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<()>>,
}

impl WsGateway {
    pub fn new(connect_url: url::Url) -> WsGateway {
        let (tx, rx) = mpsc::unbounded_channel::<Command>();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        WsGateway {
            connect_url,
            ids: Subscribers::new(),
            commands: Some(tx),
            queued: Some(rx),
            done_tx: Some(done_tx),
            done_rx: Some(done_rx),
        }
    }

    /// Resolves (with either Ok or Err) once the connection task has flushed everything and
    /// exited, or right after the gateway is dropped if it was never opened. Can be taken once.
    pub fn done(&mut self) -> Option<oneshot::Receiver<()>> {
        self.done_rx.take()
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.commands
            .as_ref()
            .ok_or(anyhow!("gateway to {} is closed", self.connect_url))?
            .send(cmd)
            .map_err(|_| anyhow!("connection to {} is gone", self.connect_url))
    }
}

impl ConnectionGateway for WsGateway {
    fn open(&mut self) -> Result<()> {
        let queued = self
            .queued
            .take()
            .ok_or(anyhow!("gateway to {} was already opened", self.connect_url))?;

        let rt = tokio::runtime::Handle::try_current()
            .context("opening a gateway outside of the tokio runtime")?;

        log::info!("connecting to {}", self.connect_url);

        let url = self.connect_url.clone();
        let done_tx = self.done_tx.take();
        rt.spawn(async move {
            run(url, queued).await;
            drop(done_tx);
        });

        Ok(())
    }

    fn close(&mut self) {
        // Dropping the sender lets the task drain what's queued and then shut the socket.
        if self.commands.take().is_some() {
            log::info!("closing connection to {}", self.connect_url);
        }
        self.queued = None;
    }

    fn subscribe(&mut self, event: EventName, handler: Handler) -> HandlerId {
        let id = self.ids.next_id();
        if let Err(err) = self.send(Command::Subscribe(event, id, handler)) {
            log::warn!("subscribing to {}: {}", event.as_str(), err);
        }
        id
    }

    fn unsubscribe(&mut self, event: EventName, id: HandlerId) {
        if let Err(err) = self.send(Command::Unsubscribe(event, id)) {
            log::debug!("unsubscribing from {}: {}", event.as_str(), err);
        }
    }

    fn emit(&mut self, msg: WSClientToServer) -> Result<()> {
        self.send(Command::Emit(msg))
    }
}

impl Drop for WsGateway {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run(url: url::Url, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut subscribers = Subscribers::new();

    if let Err(err) = handle_ws_conn(&url, &mut commands, &mut subscribers).await {
        log::warn!("ws conn error: {:#}", err);
        subscribers.dispatch(&WSServerToClient::Error(format!("{:#}", err)));
    }

    log::info!("disconnected from {}", url);
}

async fn handle_ws_conn(
    url: &url::Url,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    subscribers: &mut Subscribers,
) -> Result<()> {
    // Whatever was subscribed before open() must be in place before anything can fail, and
    // emits have to wait for the handshake.
    let mut backlog = Vec::new();
    while let Ok(cmd) = commands.try_recv() {
        if let Some(msg) = apply(subscribers, cmd) {
            backlog.push(msg);
        }
    }

    let (ws_stream, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("connecting to {}", url))?;
    log::info!("WebSocket handshake with {} has been successfully completed", url);

    let (mut to_ws, mut from_ws) = ws_stream.split();

    for msg in backlog {
        send_msg(&mut to_ws, &msg).await?;
    }

    loop {
        tokio::select! {
            // Commands first, so that an unsubscribe always wins over a frame that arrived
            // at the same time.
            biased;

            cmd = commands.recv() => {
                let cmd = match cmd {
                    Some(cmd) => cmd,
                    None => {
                        // Gateway closed, and everything it queued has been sent.
                        to_ws.send(Message::Close(None)).await?;
                        return Ok(());
                    }
                };

                if let Some(msg) = apply(subscribers, cmd) {
                    send_msg(&mut to_ws, &msg).await?;
                }
            }

            v = from_ws.next() => {
                let recv = v.ok_or(anyhow!("connection closed by server"))??;

                match recv {
                    Message::Text(text) => {
                        let msg: WSServerToClient = match serde_json::from_str(&text) {
                            Ok(v) => v,
                            Err(err) => {
                                log::warn!("ignoring unparsable frame {:?}: {}", text, err);
                                continue;
                            }
                        };

                        log::debug!("received: {:?}", msg);
                        subscribers.dispatch(&msg);
                    }
                    Message::Close(frame) => {
                        return Err(anyhow!("connection closed by server: {:?}", frame));
                    }

                    // Pings are answered by tungstenite itself, and nothing is sent as binary.
                    Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
        }
    }
}

/// Applies a subscription change, or returns the message to send for an emit.
fn apply(subscribers: &mut Subscribers, cmd: Command) -> Option<WSClientToServer> {
    match cmd {
        Command::Subscribe(event, id, handler) => {
            subscribers.insert(event, id, handler);
            None
        }
        Command::Unsubscribe(event, id) => {
            subscribers.remove(event, id);
            None
        }
        Command::Emit(msg) => Some(msg),
    }
}

async fn send_msg<S>(to_ws: &mut S, msg: &WSClientToServer) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let j = serde_json::to_string(msg)?;
    log::debug!("sending: {}", j);
    to_ws.send(Message::Text(j)).await?;
    Ok(())
}
