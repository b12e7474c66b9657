//! Session coordination: the duplex state machine tying capture,
//! turn processing, and speech output together.

pub mod coordinator;

#[cfg(test)]
mod e2e_tests;

pub use coordinator::{
    RUNTIME_EVENT_CAPACITY, SessionCoordinator, SessionHandle, SessionPhase, SessionState,
};
