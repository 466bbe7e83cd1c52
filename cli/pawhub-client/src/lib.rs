//! Shared HTTP client infrastructure for the shelter service API.
//!
//! This crate provides:
//! - HTTP client construction with cookie-based session credentials
//! - Error classification and retry with exponential backoff
//! - Search and match derivation over the raw API capabilities
//! - The authentication session state machine
//!
//! ## Usage
//!
//! ```ignore
//! use pawhub_client::{ClientConfig, ShelterClient};
//! use pawhub_client::client::ClientTrait;
//! use pawhub_client::types::SearchCriteria;
//!
//! let client = ShelterClient::new(ClientConfig::default())?;
//! let outcome = client.search(&SearchCriteria::new()).await?;
//! ```

pub mod client;
mod config;
pub mod error;
pub mod search;
pub mod session;
pub mod types;

pub use client::{ClientTrait, RETRY_BUDGET, ShelterClient};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::{ApiError, MatchError, SearchError};
