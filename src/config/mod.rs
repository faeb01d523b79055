//! # Configuration Management
//!
//! Process settings for the development host. Backend configuration itself
//! lives in host storage, see [`crate::backend::record`].

pub mod settings;

pub use settings::Settings;
