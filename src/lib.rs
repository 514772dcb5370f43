//! Aegis tick engine: simulated trading bots over a shared ledger, advanced
//! by a periodic tick and guarded by a global panic interlock.

pub mod advisor;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod interlock;
pub mod ledger;
pub mod market;
pub mod monitor;
pub mod registry;
pub mod rng;
pub mod service;
pub mod store;
pub mod types;

pub use config::Config;
pub use engine::{EngineSnapshot, EngineState, Seed, TickReport};
pub use error::{EngineError, Rejection, Result};
pub use service::EngineHandle;
