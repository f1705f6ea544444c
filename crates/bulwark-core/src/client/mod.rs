//! Composition of the resilience primitives around an outbound call

mod protected_call;

pub use protected_call::{ProtectedCall, ProtectedCallError};
