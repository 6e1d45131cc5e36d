//! Client core for the play8 training coach.
//!
//! Consumes the backend's streamed chat replies, folds them into a
//! conversation session with generated training cards, and keeps the
//! conversation list and training plan in sync with the backend.

pub mod auth;
pub mod config;
pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use auth::{AuthService, SessionAuth};
pub use config::{ClientConfig, ClientConfigRepository, ConfigError};
pub use controllers::{
    ChatController, Navigator, NoopNavigator, PlanController, SwitchOutcome, TurnOutcome,
};
pub use repositories::{AgentRepository, ApiError, ApiResult, HttpAgentRepository};
