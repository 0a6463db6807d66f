//! JWT Authentication and Middleware
//!
//! Authentication infrastructure for the MAESTRO API: JWT token
//! generation/validation and Axum middleware.
//!
//! # Security Features
//!
//! - **Password Hashing**: Argon2id (memory-hard) for secure password storage
//! - **JWT Tokens**: HS256 signed tokens with configurable expiration
//!
//! Protected routes run [`middleware::auth_middleware`], which validates the
//! bearer token and injects [`crate::types::Claims`] into the request
//! extensions. Handlers pull them back out via [`middleware::AuthUser`].

/// JWT token generation, validation, and password hashing services.
pub mod jwt;
/// Authentication middleware and extractors for protected routes.
pub mod middleware;

pub use jwt::AuthService;
pub use middleware::{auth_middleware, AuthUser};
