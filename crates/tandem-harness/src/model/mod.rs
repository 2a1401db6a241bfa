//! Reference model for model-based testing.
//!
//! The model is a simplified relay that captures the observable behaviour of
//! rooms and relaying with plain vectors and no I/O. It serves as the oracle
//! against which the real driver is verified.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Observable behaviour only: what each client receives, and who is where
//! - Deterministic: Same inputs produce same outputs

mod client;
pub mod operation;
mod world;

pub use client::{ModelClient, ModelMessage};
pub use operation::{
    ClientId, ModelRoomId, Operation, OperationError, OperationResult, SmallMessage,
};
pub use world::{ModelWorld, ObservableState};
