//! # Race Client Library
//!
//! This library provides the client-side core for the multiplayer racing game.
//! It connects to the race server, forwards the local driver's controls, keeps
//! the latest authoritative race state and draws it every frame.
//!
//! ## Architecture Overview
//!
//! The server is authoritative for everything: positions, health, lap times and
//! race phase. The client never simulates; it only reflects the most recent
//! snapshot and reports input edges upstream.
//!
//! ### Single Thread of Control
//! All client state lives in one [`session::Session`] owned by the main loop.
//! Transport frames, asset loads, key edges and display ticks arrive as discrete
//! events and are processed one at a time to completion, so a render tick never
//! observes a half-applied snapshot. Network and file IO run as tokio tasks that
//! only forward events back to the main loop.
//!
//! ### Join Handshake
//! After the transport opens the client identifies with a player id. The server
//! answers with `join-success`, which starts the frame loop, or `join-error`,
//! which closes the connection and returns the user to the id prompt.
//!
//! ### Feature Configuration
//! Sprite art, health tracking, the race-phase UI and car/tyre customization are
//! switched by [`config::FeatureFlags`] rather than by separate client builds.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! - Connection state machine and join handshake
//! - Reconnect policy and stale-connection filtering
//! - WebSocket transport on tokio-tungstenite
//!
//! ### Input Module (`input`)
//! - Key state tracking with edge detection
//! - Movement intent derivation
//! - Dispatch gating for un-joined and defeated players
//!
//! ### Game Module (`game`)
//! Holds the latest race snapshot, replaced wholesale on every update.
//!
//! ### Rendering Module (`rendering`)
//! - Track and vehicle drawing with sprite or procedural fallback
//! - The [`rendering::Canvas`] drawing seam
//!
//! ### Race UI and HUD (`race_ui`, `hud`)
//! Leaderboard, health bars, race timer and finish banner view models, and
//! the painter that draws them together with the status line and id prompt.
//!
//! ### Supporting Modules
//! `assets` (image cache and file loader), `frame` (display tick gating),
//! `config`, `error` and `backend` (macroquad canvas).
//!
//! ## Usage Example
//!
//! ```ignore
//! use client::config::{ClientConfig, Endpoint};
//! use client::session::{ClientEvent, Session};
//!
//! let config = ClientConfig::new(Endpoint::new("127.0.0.1:8080"));
//! let mut session = Session::new(config, transport, loader)?;
//! session.submit_id("7", Instant::now())?;
//!
//! loop {
//!     for event in pending_events() {
//!         session.handle_event(event, &canvas, Instant::now());
//!     }
//!     session.poll_timers(Instant::now());
//!     session.frame(&mut canvas, Instant::now());
//! }
//! ```

pub mod assets;
pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod game;
pub mod hud;
pub mod input;
pub mod network;
pub mod race_ui;
pub mod rendering;
pub mod session;

pub use error::ClientError;
