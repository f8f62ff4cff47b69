//! The session context: one owned instance of every client component, fed
//! one event at a time from a single thread of control.

use crate::assets::{AssetEvent, AssetLoader};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::frame::FrameScheduler;
use crate::game::SnapshotStore;
use crate::hud::{paint_prompt, paint_race_ui, paint_status, JoinPrompt, StatusLine};
use crate::input::{dispatch_gate, Customization, InputSampler};
use crate::network::{ConnectionChannel, ConnectionId, ConnectionState, Delivery, Transport, TransportEvent};
use crate::race_ui::RaceUiProjector;
use crate::rendering::{Canvas, Renderer, BACKGROUND};
use log::{debug, info, warn};
use shared::{validate_player_id, ClientMessage};
use std::time::Instant;

/// Every external input a session reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Transport {
        conn: ConnectionId,
        event: TransportEvent,
    },
    KeyPressed(String),
    KeyReleased(String),
    Asset(AssetEvent),
    SubmitId(String),
}

pub struct Session<T: Transport, L: AssetLoader, C: Canvas> {
    config: ClientConfig,
    channel: ConnectionChannel<T>,
    sampler: InputSampler,
    store: SnapshotStore,
    renderer: Renderer<C::Image>,
    ui: RaceUiProjector,
    scheduler: FrameScheduler,
    loader: L,
    prompt: JoinPrompt,
}

impl<T: Transport, L: AssetLoader, C: Canvas> Session<T, L, C> {
    /// Builds a session and starts preloading art. Nothing connects until an
    /// id is submitted.
    pub fn new(config: ClientConfig, transport: T, mut loader: L) -> Result<Self, ClientError> {
        config.validate()?;

        let channel = ConnectionChannel::new(transport, config.endpoint.clone(), config.reconnect);
        let mut renderer = Renderer::new(config.features.sprites);
        renderer.preload(&mut loader);

        info!(
            "Session ready for {} (features: {:?}, reconnect: {:?})",
            config.endpoint.url(),
            config.features,
            config.reconnect
        );

        Ok(Self {
            sampler: InputSampler::new(config.key_bindings.clone()),
            ui: RaceUiProjector::new(config.features),
            channel,
            store: SnapshotStore::new(),
            renderer,
            scheduler: FrameScheduler::new(),
            loader,
            prompt: JoinPrompt::new(),
            config,
        })
    }

    /// Validates `raw` as a player id and connects with it.
    ///
    /// An invalid id never opens a connection; the reason is shown on the
    /// prompt, which stays active.
    pub fn submit_id(&mut self, raw: &str, now: Instant) -> Result<(), ClientError> {
        if !self.prompt_active() {
            debug!("Ignoring id submission while {:?}", self.channel.state());
            return Ok(());
        }

        let player_id = match validate_player_id(raw) {
            Ok(id) => id,
            Err(e) => {
                warn!("Rejected player id {:?}: {}", raw, e);
                self.prompt.set_error(Some(e.to_string()));
                return Err(e.into());
            }
        };

        self.prompt.set_error(None);
        self.ui.set_local_player(Some(player_id.clone()));
        if let Err(e) = self.channel.connect(player_id, now) {
            self.prompt.set_error(Some(e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    /// Processes one event to completion.
    ///
    /// `canvas` is only used to decode loaded image bytes.
    pub fn handle_event(&mut self, event: ClientEvent, canvas: &C, now: Instant) {
        match event {
            ClientEvent::Transport { conn, event } => self.on_transport(conn, event, now),
            ClientEvent::KeyPressed(key) => self.on_key(&key, true),
            ClientEvent::KeyReleased(key) => self.on_key(&key, false),
            ClientEvent::Asset(event) => self.on_asset(event, canvas),
            ClientEvent::SubmitId(raw) => {
                // Failures are already on the prompt.
                let _ = self.submit_id(&raw, now);
            }
        }
    }

    fn on_transport(&mut self, conn: ConnectionId, event: TransportEvent, now: Instant) {
        match self.channel.handle(conn, event, now) {
            Delivery::Snapshot(snapshot) => self.store.replace(snapshot),
            Delivery::Joined(_) => {
                self.prompt.set_error(None);
                self.scheduler.start();
            }
            Delivery::Rejected(error) => self.prompt.set_error(Some(error)),
            Delivery::Disconnected | Delivery::Nothing => {}
        }
    }

    fn on_key(&mut self, key: &str, pressed: bool) {
        let key = key.to_lowercase();
        let Some(intent) = self.sampler.key_event(&key, pressed) else {
            return;
        };

        if self.is_movement_key(&key) {
            self.dispatch(|player_id| ClientMessage::PlayerInput {
                player_id,
                input: intent,
            });
        }

        if pressed && self.config.features.customization {
            match Customization::for_key(&key) {
                Some(Customization::ChangeCar) => {
                    self.dispatch(|player_id| ClientMessage::ChangeCar { player_id })
                }
                Some(Customization::ChangeTyres(tyres)) => {
                    self.dispatch(|player_id| ClientMessage::ChangeTyres {
                        player_id,
                        tyres_type: tyres.to_string(),
                    })
                }
                None => {}
            }
        }
    }

    fn is_movement_key(&self, key: &str) -> bool {
        let bindings = self.sampler.bindings();
        [&bindings.up, &bindings.down, &bindings.left, &bindings.right]
            .iter()
            .any(|binding| binding.eq_ignore_ascii_case(key))
    }

    fn dispatch(&mut self, build: impl FnOnce(shared::PlayerId) -> ClientMessage) {
        let Some(player_id) = self.channel.player_id().cloned() else {
            return;
        };
        let local = self.store.player(&player_id);
        if let Err(reason) = dispatch_gate(self.channel.state(), local, self.config.features.health) {
            debug!("Input suppressed: {:?}", reason);
            return;
        }

        if let Err(e) = self.channel.send(&build(player_id)) {
            warn!("Failed to send input: {}", e);
        }
    }

    fn on_asset(&mut self, event: AssetEvent, canvas: &C) {
        match event {
            AssetEvent::Loaded { key, bytes } => match canvas.decode_image(&bytes) {
                Ok(image) => self.renderer.assets_mut().complete(key, image),
                Err(e) => {
                    warn!("Could not decode {}: {}, using fallback art", key, e);
                    self.renderer.assets_mut().fail(key);
                }
            },
            AssetEvent::Failed { key, reason } => {
                warn!("Asset {} unavailable ({}), using fallback art", key, reason);
                self.renderer.assets_mut().fail(key);
            }
        }
    }

    /// Fires the reconnect timer if it is due.
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        self.channel.poll_reconnect(now)
    }

    /// One display-refresh tick. Returns whether the race was rendered.
    pub fn frame(&mut self, canvas: &mut C, now: Instant) -> bool {
        let rendered = self.scheduler.tick(now);

        if rendered {
            if let Some(snapshot) = self.store.latest() {
                self.ui.refresh(snapshot);
            }
            self.renderer
                .render(canvas, self.store.latest(), &mut self.loader);
            paint_race_ui(canvas, &self.ui);
        } else {
            let (width, height) = canvas.size();
            canvas.fill_rect(0.0, 0.0, width, height, BACKGROUND);
        }

        paint_status(canvas, &self.status());
        if self.prompt_active() {
            paint_prompt(canvas, &self.prompt);
        }

        rendered
    }

    /// The id prompt is shown while disconnected with no reconnect pending.
    pub fn prompt_active(&self) -> bool {
        self.channel.state() == ConnectionState::Disconnected && !self.channel.reconnect_pending()
    }

    pub fn prompt(&self) -> &JoinPrompt {
        &self.prompt
    }

    pub fn prompt_mut(&mut self) -> &mut JoinPrompt {
        &mut self.prompt
    }

    pub fn status(&self) -> StatusLine<'_> {
        StatusLine {
            state: self.channel.state(),
            reconnecting: self.channel.reconnect_pending(),
            error: self.channel.last_error(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn channel(&self) -> &ConnectionChannel<T> {
        &self.channel
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn ui(&self) -> &RaceUiProjector {
        &self.ui
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn renderer(&self) -> &Renderer<C::Image> {
        &self.renderer
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Tears the session down; the transport is closed without reconnecting.
    pub fn shutdown(&mut self) {
        info!("Shutting down session");
        self.channel.disconnect();
    }
}
