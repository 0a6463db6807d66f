//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Authentication handlers (login, token refresh).
pub mod auth;
/// Health check handler.
pub mod health;
/// Mission lifecycle and state handlers.
pub mod missions;
