//! askrelay Server Library
//!
//! HTTP relay between browser clients and an external agent CLI:
//! - `/ask` validation and JSON response mapping
//! - Agent subprocess invocation with timeout and termination
//! - `/health` and CORS preflight handling

pub mod agent;
pub mod error;
pub mod routes;
pub mod types;
pub mod validate;

pub use agent::{AgentError, AgentRunner};
pub use error::ApiError;
pub use routes::{AppState, build_router};
