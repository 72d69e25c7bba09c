//! # v2e-core — Foundational Types for the Coordination Substrate
//!
//! This crate is the bedrock of the v2e FSM workspace. It defines the
//! primitives every other crate depends on: the `Urn` newtype, the
//! UTC-only `Timestamp`, the security-item catalog types, and the shared
//! error hierarchy. It depends on nothing internal.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `v2e-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` / `.unwrap()` outside tests.

pub mod error;
pub mod item;
pub mod record;
pub mod retry;
pub mod ring;
pub mod temporal;
pub mod urn;

pub use error::{OperationError, StoreError, TransitionError, TransitionErrorKind, V2eError};
pub use item::{SecurityItem, SecurityItemKind};
pub use record::{LearningSessionState, MemoryObjectState, StateHistoryEntry};
pub use retry::RetryPolicy;
pub use ring::RingBuffer;
pub use temporal::Timestamp;
pub use urn::Urn;
