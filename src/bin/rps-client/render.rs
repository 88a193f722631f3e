use tokio::sync::mpsc;

use rps_client::game_manager::GameManagerToUI;

/// Plain-text front end: prints every screen the GameManager sends.
pub struct Terminal {
    from_gm: mpsc::Receiver<GameManagerToUI>,
}

impl Terminal {
    pub fn new(from_gm: mpsc::Receiver<GameManagerToUI>) -> Terminal {
        Terminal { from_gm }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.from_gm.recv().await {
            match msg {
                GameManagerToUI::Joined(id) => println!("You are player {}.", id),
                GameManagerToUI::Screen(screen) => print!("{}", screen),
                GameManagerToUI::Error(err) => eprintln!("error: {}", err),
            }
        }
    }
}
