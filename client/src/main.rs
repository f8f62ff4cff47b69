use clap::Parser;
use client::backend::{key_name, MacroquadCanvas};
use client::assets::FileAssetLoader;
use client::config::{ClientConfig, Endpoint, FeatureFlags, ReconnectPolicy};
use client::network::WsTransport;
use client::session::{ClientEvent, Session};
use log::{error, info, warn};
use macroquad::prelude::*;
use ::rand::Rng;
use shared::{DEFAULT_ENDPOINT_PATH, MAX_PLAYER_ID, MIN_PLAYER_ID};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    secure: bool,

    /// WebSocket endpoint path on the server
    #[arg(long, default_value = DEFAULT_ENDPOINT_PATH)]
    path: String,

    /// Join right away with this player id (1-99)
    #[arg(short = 'p', long, conflicts_with = "random_id")]
    player_id: Option<String>,

    /// Join right away with a random player id
    #[arg(long)]
    random_id: bool,

    /// Reconnect this many seconds after the connection drops (3 if no value)
    #[arg(short = 'r', long, num_args = 0..=1, default_missing_value = "3")]
    reconnect_delay: Option<u64>,

    /// Draw procedural cars and track instead of sprites
    #[arg(long)]
    no_sprites: bool,

    /// Hide health bars and ignore hp when sending input
    #[arg(long)]
    no_health: bool,

    /// Hide the race timer and finish banner
    #[arg(long)]
    no_race_ui: bool,

    /// Enable car (C) and tyre (1/2/3) changes
    #[arg(long)]
    customization: bool,

    /// Directory holding track.jpg and cars/*.png
    #[arg(short = 'a', long, default_value = "assets")]
    assets: PathBuf,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

impl Args {
    fn config(&self) -> ClientConfig {
        let endpoint = Endpoint::new(self.server.clone())
            .with_path(self.path.clone())
            .secure(self.secure);

        let mut config = ClientConfig::new(endpoint);
        config.features = FeatureFlags {
            sprites: !self.no_sprites,
            health: !self.no_health,
            race_ui: !self.no_race_ui,
            customization: self.customization,
        };
        config.reconnect = match self.reconnect_delay {
            Some(secs) => ReconnectPolicy::After(Duration::from_secs(secs)),
            None => ReconnectPolicy::Disabled,
        };
        config.asset_dir = self.assets.clone();
        config.canvas_width = self.width as f32;
        config.canvas_height = self.height as f32;
        config
    }

    fn initial_id(&self) -> Option<String> {
        if self.random_id {
            let id = ::rand::thread_rng().gen_range(MIN_PLAYER_ID..=MAX_PLAYER_ID);
            return Some(id.to_string());
        }
        self.player_id.clone()
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Race Client".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    if let Err(e) = run(Args::parse()).await {
        error!("Client error: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config();

    info!("Starting client...");
    info!("Connecting to: {}", config.endpoint.url());
    info!("Controls: W/A/S/D to drive, Esc to quit");
    if config.features.customization {
        info!("Press C to change car, 1/2/3 for soft/medium/hard tyres");
    }

    // Network and file IO run on tokio; the window owns the main thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let (transport_tx, mut transport_rx) = mpsc::unbounded_channel();
    let (asset_tx, mut asset_rx) = mpsc::unbounded_channel();
    let transport = WsTransport::new(runtime.handle().clone(), transport_tx);
    let loader = FileAssetLoader::new(config.asset_dir.clone(), runtime.handle().clone(), asset_tx);

    let mut canvas = MacroquadCanvas::new();
    let mut session: Session<_, _, MacroquadCanvas> = Session::new(config, transport, loader)?;

    if let Some(id) = args.initial_id() {
        info!("Joining as player {}", id);
        if let Err(e) = session.submit_id(&id, Instant::now()) {
            warn!("Could not join as {}: {}", id, e);
        }
    }

    loop {
        let now = Instant::now();

        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        while let Ok((conn, event)) = transport_rx.try_recv() {
            session.handle_event(ClientEvent::Transport { conn, event }, &canvas, now);
        }
        while let Ok(event) = asset_rx.try_recv() {
            session.handle_event(ClientEvent::Asset(event), &canvas, now);
        }

        if session.prompt_active() {
            while let Some(c) = get_char_pressed() {
                session.prompt_mut().push(c);
            }
            if is_key_pressed(KeyCode::Backspace) {
                session.prompt_mut().backspace();
            }
            if is_key_pressed(KeyCode::Enter) || is_key_pressed(KeyCode::KpEnter) {
                let raw = session.prompt_mut().take();
                session.handle_event(ClientEvent::SubmitId(raw), &canvas, now);
            }
        } else {
            while get_char_pressed().is_some() {}
        }

        for key in get_keys_pressed() {
            if let Some(name) = key_name(key) {
                session.handle_event(ClientEvent::KeyPressed(name.to_string()), &canvas, now);
            }
        }
        for key in get_keys_released() {
            if let Some(name) = key_name(key) {
                session.handle_event(ClientEvent::KeyReleased(name.to_string()), &canvas, now);
            }
        }

        session.poll_timers(now);
        session.frame(&mut canvas, now);

        next_frame().await;
    }

    session.shutdown();
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("Client stopped");

    Ok(())
}
