mod render;

use anyhow::Result;
use clap::Parser;

use std::io::BufRead;
use std::thread;

use tokio::sync::mpsc;
use tokio::task;
use tokio::time::{self, Duration};

use rps_client::game::Choice;
use rps_client::game_manager::gateway_ws::WsGateway;
use rps_client::game_manager::{GameManager, GameManagerToUI, SessionConfig, UIToGameManager};

/// How long to wait for the leave notice to reach the server on exit.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Play rock-paper-scissors against whoever else joins the same room.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Args {
    /// Room to join.
    room: String,

    /// WebSocket URL of the room server.
    #[clap(long, default_value = "ws://127.0.0.1:3000")]
    server: url::Url,

    /// How long the previous round's result stays on screen, in milliseconds.
    #[clap(long, default_value_t = 3500)]
    reveal_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = SessionConfig {
        room_id: args.room.clone(),
        reveal_delay: Duration::from_millis(args.reveal_delay_ms),
    };

    let (gm_to_ui_tx, gm_to_ui_rx) = mpsc::channel::<GameManagerToUI>(16);
    let (ui_to_gm_tx, ui_to_gm_rx) = mpsc::channel::<UIToGameManager>(16);

    let mut gateway = WsGateway::new(args.server.clone());
    let flushed = gateway.done();

    let gm = GameManager::new(gateway, &config, gm_to_ui_tx, ui_to_gm_rx)?;

    let terminal = task::spawn(render::Terminal::new(gm_to_ui_rx).run());

    // Reading stdin blocks, and a blocked read can't be cancelled, so it gets its own thread
    // which simply dies with the process.
    thread::spawn(move || read_input(ui_to_gm_tx));

    // Dropping the manager on Ctrl+C leaves the room just like a normal exit does.
    let res = tokio::select! {
        res = gm.run() => res,
        _ = tokio::signal::ctrl_c() => {
            log::info!("interrupted");
            Ok(())
        }
    };

    if let Err(err) = &res {
        log::error!("game manager returned error {:?}", err);
    }

    if let Some(flushed) = flushed {
        if time::timeout(FLUSH_TIMEOUT, flushed).await.is_err() {
            log::warn!("connection didn't close within {:?}", FLUSH_TIMEOUT);
        }
    }

    if let Err(err) = terminal.await {
        log::error!("terminal task panicked {:?}", err);
    }

    res
}

fn read_input(to_gm: mpsc::Sender<UIToGameManager>) {
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(err) => {
                log::warn!("reading stdin: {}", err);
                break;
            }
        };

        let cmd = match line.trim() {
            "" => continue,
            "q" | "quit" | "leave" => UIToGameManager::Leave,
            other => match other.parse::<Choice>() {
                Ok(Choice::None) | Err(_) => {
                    println!("Type rock, paper, scissors (or r, p, s), or quit.");
                    continue;
                }
                Ok(choice) => UIToGameManager::Choose(choice),
            },
        };

        if to_gm.blocking_send(cmd).is_err() {
            return;
        }
    }

    // End of input counts as leaving.
    let _ = to_gm.blocking_send(UIToGameManager::Leave);
}
