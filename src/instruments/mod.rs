//! Built-in instruments.
//!
//! Real instrument servers live in their own crates and implement
//! [`Instrument`](crate::driver::Instrument) against a vendor SDK. The mock stage here
//! needs no hardware and backs the `tool-server` binary.

pub mod mock_stage;

pub use mock_stage::{MockStage, MockStageDriver, MockStageParams, MOCK_STAGE_TOOL_TYPE};
