//! Sequential-per-conversation workflow orchestration.

mod lane;
mod ratelimit;
mod runner;
mod state;

pub use ratelimit::RateLimiter;
pub use runner::Orchestrator;
