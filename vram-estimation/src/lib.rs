//! VRAM and throughput estimates for self-hosted LLM inference.
//!
//! Every estimate is a closed-form function of published GPU and model
//! figures. [`calculate`] is the single entry point: it returns a
//! [`Calculation`] that is either a full [`Estimate`] or a [`Failure`]
//! explaining why the configuration does not fit.

pub mod calculator;
pub mod capacity;
pub mod catalog;
pub mod error;
pub mod quant;
pub mod spec;
pub mod throughput;
pub mod vram;

pub use calculator::{calculate, CalcRequest, Calculation, Estimate, Failure, FailureReason};
pub use catalog::Catalog;
pub use error::{Error, Result};
pub use quant::QuantKind;
pub use spec::{CustomGpu, CustomModel, GpuSource, GpuSpec, ModelSource, ModelSpec};
