//! HTTP client for the IBM Security Verify REST API.
//!
//! Calls are authorized with an OAuth2 client-credentials token that is
//! cached and refreshed by [`TokenManager`].

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;

pub use auth::{AccessToken, ClientCredentialsSource, IssuedToken, TokenManager, TokenSource, TokenState, TokenStatus};
pub use config::{VerifyConfig, VerifyOverrides};
pub use error::{ClientError, ClientResult};
pub use executor::{ApiRequest, ApiResponse, VerifyClient};
