//! jobflow — multi-step signup and onboarding flow controller.

pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod flows;
pub mod handoff;
pub mod submission;

pub use config::FlowConfig;
pub use controller::FlowController;
pub use error::{Error, Result};
