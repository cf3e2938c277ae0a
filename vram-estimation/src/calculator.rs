use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::capacity;
use crate::error::{Error, Result};
use crate::quant::QuantKind;
use crate::spec::{GpuSpec, ModelSpec};
use crate::throughput;
use crate::vram::{kv_cache_gb, model_weights_gb};

/// Everything about one evaluation that is not the GPU or the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalcRequest {
    pub weight_quant: QuantKind,
    pub kv_quant: QuantKind,
    pub max_context_tokens: u64,
    /// Only divides throughput; never gates feasibility.
    pub concurrent_users: u32,
    pub parallel_gpu_count: u32,
    /// Fraction of raw VRAM considered usable, in (0, 1].
    pub vram_utilization: f64,
    pub min_reserve_gb: f64,
}

impl Default for CalcRequest {
    fn default() -> Self {
        Self {
            weight_quant: QuantKind::Int4,
            kv_quant: QuantKind::Fp8,
            max_context_tokens: 8192,
            concurrent_users: 10,
            parallel_gpu_count: 1,
            vram_utilization: 0.9,
            min_reserve_gb: 2.0,
        }
    }
}

impl CalcRequest {
    /// Checks the preconditions the estimators rely on.
    pub fn validate(&self) -> Result<()> {
        if self.max_context_tokens == 0 {
            return Err(Error::InvalidRequest(
                "max_context_tokens must be at least 1".to_string(),
            ));
        }
        if self.concurrent_users == 0 {
            return Err(Error::InvalidRequest(
                "concurrent_users must be at least 1".to_string(),
            ));
        }
        if self.parallel_gpu_count == 0 {
            return Err(Error::InvalidRequest(
                "parallel_gpu_count must be at least 1".to_string(),
            ));
        }
        if !(self.vram_utilization > 0.0 && self.vram_utilization <= 1.0) {
            return Err(Error::InvalidRequest(format!(
                "vram_utilization must be in (0, 1], got {}",
                self.vram_utilization
            )));
        }
        if !(self.min_reserve_gb >= 0.0) {
            return Err(Error::InvalidRequest(format!(
                "min_reserve_gb must not be negative, got {}",
                self.min_reserve_gb
            )));
        }
        Ok(())
    }
}

/// A feasible configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub model_weights_gb: f64,
    pub kv_cache_gb: f64,
    pub total_required_gb: f64,
    pub device_vram_gb: f64,
    pub usable_vram_gb: f64,
    pub usable_kv_cache_gb: f64,
    pub reserved_gb: f64,
    /// Share of raw device memory taken by the weights plus one full-context sequence.
    pub single_request_utilization_pct: f64,
    pub gen_speed: f64,
    pub prompt_speed: f64,
    pub shared_gen: f64,
    pub shared_prompt: f64,
    pub compute_scaling_factor: f64,
    pub bandwidth_scaling_factor: f64,
    pub full_length_sequence_capacity: f64,
    pub max_simultaneous_tokens: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ZeroModelWeights,
    ZeroKvCache,
    NoUsableVram,
    InsufficientVram { required_gb: f64, usable_gb: f64 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroModelWeights => f.write_str("Invalid model VRAM calculation"),
            Self::ZeroKvCache => f.write_str("Invalid KV cache calculation"),
            Self::NoUsableVram => f.write_str("No usable VRAM available"),
            Self::InsufficientVram {
                required_gb,
                usable_gb,
            } => write!(
                f,
                "Insufficient VRAM: need {required_gb:.2} GB but only {usable_gb:.2} GB available"
            ),
        }
    }
}

/// An infeasible or degenerate configuration, with whatever was computed
/// before the gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureReason,
    pub reason: String,
    pub model_weights_gb: f64,
    pub kv_cache_gb: f64,
    pub total_required_gb: f64,
    pub usable_vram_gb: f64,
    pub reserved_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Calculation {
    Success(Estimate),
    Failure(Failure),
}

impl Calculation {
    #[must_use]
    pub const fn is_feasible(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn total_required_gb(&self) -> f64 {
        match self {
            Self::Success(estimate) => estimate.total_required_gb,
            Self::Failure(failure) => failure.total_required_gb,
        }
    }

    #[must_use]
    pub const fn usable_vram_gb(&self) -> f64 {
        match self {
            Self::Success(estimate) => estimate.usable_vram_gb,
            Self::Failure(failure) => failure.usable_vram_gb,
        }
    }

    #[must_use]
    pub const fn estimate(&self) -> Option<&Estimate> {
        match self {
            Self::Success(estimate) => Some(estimate),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Evaluates one configuration.
///
/// Returns `Err` only when an input breaks its preconditions. A
/// configuration that does not fit is an `Ok(Calculation::Failure)`.
pub fn calculate(gpu: &GpuSpec, model: &ModelSpec, request: &CalcRequest) -> Result<Calculation> {
    gpu.validate()?;
    model.validate()?;
    request.validate()?;

    let weights_gb = model_weights_gb(model, request.weight_quant);
    let kv_gb = kv_cache_gb(model, request.kv_quant, request.max_context_tokens);
    let plan = capacity::plan(
        gpu.vram_gb,
        request.parallel_gpu_count,
        request.vram_utilization,
        request.min_reserve_gb,
    );
    let total_required_gb = weights_gb + kv_gb;
    debug!(
        "'{}' on '{}': weights {:.3} GB + KV {:.3} GB = {:.3} GB against {:.3} GB usable",
        model.name, gpu.name, weights_gb, kv_gb, total_required_gb, plan.usable_vram_gb
    );

    let rejection = if weights_gb <= 0.0 {
        Some(FailureReason::ZeroModelWeights)
    } else if kv_gb <= 0.0 {
        Some(FailureReason::ZeroKvCache)
    } else if plan.usable_vram_gb <= 0.0 {
        Some(FailureReason::NoUsableVram)
    } else if !plan.fits(total_required_gb) {
        Some(FailureReason::InsufficientVram {
            required_gb: total_required_gb,
            usable_gb: plan.usable_vram_gb,
        })
    } else {
        None
    };

    if let Some(kind) = rejection {
        info!("'{}' does not fit on '{}': {}", model.name, gpu.name, kind);
        return Ok(Calculation::Failure(Failure {
            kind,
            reason: kind.to_string(),
            model_weights_gb: weights_gb,
            kv_cache_gb: kv_gb,
            total_required_gb,
            usable_vram_gb: plan.usable_vram_gb,
            reserved_gb: plan.reserved_gb,
        }));
    }

    let sequences = plan.sequence_capacity(weights_gb, kv_gb, request.max_context_tokens);
    let speed = throughput::estimate(
        gpu,
        model,
        request.weight_quant,
        request.parallel_gpu_count,
        request.concurrent_users,
    );

    Ok(Calculation::Success(Estimate {
        model_weights_gb: weights_gb,
        kv_cache_gb: kv_gb,
        total_required_gb,
        device_vram_gb: plan.device_vram_gb,
        usable_vram_gb: plan.usable_vram_gb,
        usable_kv_cache_gb: sequences.usable_kv_cache_gb,
        reserved_gb: plan.reserved_gb,
        single_request_utilization_pct: total_required_gb / plan.device_vram_gb * 100.0,
        gen_speed: speed.gen_speed,
        prompt_speed: speed.prompt_speed,
        shared_gen: speed.shared_gen,
        shared_prompt: speed.shared_prompt,
        compute_scaling_factor: speed.compute_scaling_factor,
        bandwidth_scaling_factor: speed.bandwidth_scaling_factor,
        full_length_sequence_capacity: sequences.full_length_sequence_capacity,
        max_simultaneous_tokens: sequences.max_simultaneous_tokens,
    }))
}
