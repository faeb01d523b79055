//! # ccp-secrets
//!
//! A secrets backend that brokers credential requests to a CyberArk Central
//! Credential Provider (CCP) web service over mutually authenticated TLS.
//! Retrieved secrets are returned to the caller and never persisted.
//!
//! ## Architecture
//!
//! ```text
//! Host routing → Backend::handle_request → config / object / query handler
//!                        ↓                           ↓
//!                 Host storage (config)      ClientCache → CcpClient → CCP
//! ```
//!
//! ## Core Components
//!
//! - **Configuration record**: validated connection settings stored at `config`
//! - **Client factory**: turns the record into a reqwest/rustls client
//! - **Client cache**: one lazily built client, swapped on configuration change
//! - **Handlers**: config read/write, object fetch and query search
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ccp_secrets::backend::{Backend, Operation, Request};
//! use ccp_secrets::storage::InMemoryStorage;
//!
//! # async fn run() -> ccp_secrets::Result<()> {
//! let storage = Arc::new(InMemoryStorage::new());
//! let backend = Backend::new();
//! backend.initialize(storage.as_ref()).await;
//!
//! let request = Request::new(Operation::Update, "config", storage.clone())
//!     .with_field("host", "ccp.example.com")
//!     .with_field("application_id", "MyApp");
//! backend.handle_request(request).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backend;
pub mod ccp;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod storage;
pub mod utils;

pub use backend::Backend;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
