//! Feather consensus engine: query N independently configured models in
//! parallel, tolerate partial failure, and synthesize the surviving responses
//! into a single streamed answer via a further model call.

pub mod config;
pub mod consensus;
pub mod error;
pub mod message;
pub mod providers;
pub mod relay;
pub mod workflow;
