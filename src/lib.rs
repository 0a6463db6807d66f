//! # MAESTRO - Self-Hosted AI Research Server
//!
//! A research mission server: users submit a research request, the mission
//! engine walks it through a phased pipeline (analysis, research, outline,
//! writing, citations) and produces a versioned report, streaming progress
//! over WebSockets along the way.
//!
//! ## Overview
//!
//! MAESTRO can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `maestro-server` binary
//! 2. **As a library** - Import the mission engine into your own project
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use maestro::db::Store;
//! use maestro::events::UpdateBus;
//! use maestro::missions::ContextManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(Store::new_local("data/maestro.db").await?);
//!     let bus = UpdateBus::new();
//!     let manager = ContextManager::new(
//!         store.clone(),
//!         bus.clone(),
//!         config.research.clone(),
//!         config.database.data_dir.clone(),
//!     );
//!     manager.load_all().await?;
//!
//!     let mission = manager.start_mission("chat-1", "Compare Rust async runtimes").await?;
//!     println!("started mission {}", mission.mission_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Layout
//!
//! - [`missions`] - Mission context, phase pipeline, manager, preparation
//! - [`db`] - SQLite persistence (users, missions, logs, reports)
//! - [`events`] - Broadcast bus for live mission updates
//! - [`api`] - Axum REST and WebSocket layer
//! - [`auth`] - JWT authentication and password hashing
//! - [`schemas`] - Plan, note, goal, and thought data shapes
//! - [`config`] - Environment-based configuration
//! - [`types`] - Shared API types and the error enum

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod events;
pub mod missions;
pub mod schemas;
pub mod types;
pub mod utils;

pub use config::Config;
pub use types::{AppError, Result};

use crate::auth::jwt::AuthService;
use crate::db::Store;
use crate::events::UpdateBus;
use crate::missions::{ContextManager, MissionService};
use std::sync::Arc;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Environment-derived configuration
    pub config: Arc<Config>,
    /// Database client
    pub store: Arc<Store>,
    /// Mission state engine
    pub manager: Arc<ContextManager>,
    /// Mission preparation service
    pub mission_service: Arc<MissionService>,
    /// Live update broadcast bus
    pub bus: UpdateBus,
    /// Authentication service
    pub auth_service: Arc<AuthService>,
}
