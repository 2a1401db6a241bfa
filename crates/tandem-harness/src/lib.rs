//! Deterministic simulation harness for Tandem relay testing.
//!
//! Drives the real `ServerDriver` without sockets: a seeded `SimEnv` supplies
//! time and randomness, and a recording executor captures every delivered
//! frame per client.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and `SimServer`, and
//! their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;
pub mod sim_server;

pub use model::{
    ClientId, ModelClient, ModelMessage, ModelRoomId, ModelWorld, ObservableState, Operation,
    OperationError, OperationResult, SmallMessage,
};
pub use sim_env::SimEnv;
pub use sim_server::{RecordingExecutor, SimServer};
