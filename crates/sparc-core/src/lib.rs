pub mod artifact;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod hook;
pub mod io;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;
pub mod progression;
pub mod registry;
pub mod store;
pub mod task;
pub mod trace;
pub mod types;
pub mod validators;

pub use error::{Result, SparcError};
