//! Shared types and stock engine for the Kindergarten Kitchen Management Platform
//!
//! This crate contains the pure (I/O free) part of the system: unit conversion,
//! ledger folding, portion availability, serving planning and monthly
//! reconciliation arithmetic. It is shared between the backend and the
//! browser (via WASM).

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
