//! Flow verification for reactive cross-chain callbacks
//!
//! A flow is verified in five fixed stages:
//! 1. Origin transaction receipt on the origin chain
//! 2. Target event emitted by that transaction
//! 3. Capture of the transaction by the reactive VM
//! 4. Callback transaction issued by the reactive VM
//! 5. Execution of the callback on the destination chain

pub mod controller;
pub mod matcher;
pub mod request;
pub mod status;

pub use controller::FlowController;
pub use matcher::MatcherConfig;
pub use request::FlowRequest;
pub use status::{FlowOutcome, FlowStatus, FlowStep, StepState};
