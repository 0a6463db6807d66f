//! HTTP API Handlers and Routes
//!
//! The REST and WebSocket layer for MAESTRO, built on the Axum web framework.
//!
//! # API Endpoints
//!
//! ## Authentication (`/api/auth`)
//! - `POST /api/auth/login` - Login and receive JWT tokens
//! - `POST /api/auth/refresh` - Exchange a refresh token for new tokens
//!
//! ## Missions (`/api/missions`)
//! - `POST /api/missions` - Start a research mission
//! - `GET /api/missions/{id}` - Mission status and metadata
//! - `POST /api/missions/{id}/pause` - Pause a running mission
//! - `POST /api/missions/{id}/resume` - Resume a paused or stopped mission
//! - `POST /api/missions/{id}/stop` - Stop a mission
//! - `GET /api/missions/{id}/draft` - Current report draft
//! - `GET /api/missions/{id}/notes` - Gathered research notes
//! - `GET /api/missions/{id}/logs` - Execution log
//! - `GET /api/missions/{id}/stats` - Cost and token totals
//! - `GET /api/missions/{id}/report` - Current final report version
//! - `GET /api/missions/{id}/checkpoint` - Resume checkpoint summary
//! - `GET /api/missions/{id}/ws` - Live update stream (WebSocket)
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! # Authentication
//!
//! All mission endpoints require a valid JWT token in the `Authorization`
//! header:
//! ```text
//! Authorization: Bearer <token>
//! ```

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
/// WebSocket update streaming.
pub mod ws;
