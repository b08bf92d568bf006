pub mod core;
pub mod models;
pub mod platform;

pub use crate::core::config::Config;
pub use crate::core::session::{SessionCoordinator, SessionState, Tab};
pub use crate::models::feedback::AnalysisMode;
