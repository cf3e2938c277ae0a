//! Weight and KV cache footprints.
//!
//! The recomputed weight path multiplies billions of parameters by bytes per
//! parameter and reads the product directly as GB, without a 1e9 / 2^30
//! conversion. The KV cache path counts raw bytes and divides by 2^30.

use log::debug;

use crate::quant::QuantKind;
use crate::spec::ModelSpec;

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Memory needed for the weights of `model` stored at `quant`.
///
/// At the model's native precision the catalog's measured size is returned
/// unchanged.
#[must_use]
pub fn model_weights_gb(model: &ModelSpec, quant: QuantKind) -> f64 {
    if quant == model.native_quant_kind {
        return model.model_size_gb;
    }
    let weights_gb = model.total_params_b * quant.bytes_per_value() * quant.overhead_factor();
    debug!(
        "recomputed weights for '{}' at {}: {:.3} GB (native {} is {:.3} GB)",
        model.name, quant, weights_gb, model.native_quant_kind, model.model_size_gb
    );
    weights_gb
}

/// Memory needed to hold keys and values for one sequence of
/// `max_context_tokens` tokens.
#[must_use]
pub fn kv_cache_gb(model: &ModelSpec, quant: QuantKind, max_context_tokens: u64) -> f64 {
    let per_token = model.per_token_kv_bytes().unwrap_or(0.0);
    #[allow(clippy::cast_precision_loss)]
    let tokens = max_context_tokens as f64;
    // x2: one key tensor and one value tensor per token
    let total_bytes = per_token * quant.bytes_per_value() * tokens * 2.0;
    total_bytes / BYTES_PER_GB
}

/// Per-token bytes for one of K/V at 8-bit precision, where a scalar is one byte.
#[must_use]
pub fn kv_bytes_per_token_fp8(layers: u32, num_kv_heads: u32, head_dim: u32) -> f64 {
    f64::from(layers) * f64::from(num_kv_heads) * f64::from(head_dim)
}

/// Size estimate for a checkpoint that has no measured size, rounded to
/// hundredths of a GB.
#[must_use]
pub fn estimate_model_size_gb(total_params_b: f64, quant: QuantKind) -> f64 {
    let size_gb = total_params_b * quant.bytes_per_value() * quant.overhead_factor();
    (size_gb * 100.0).round() / 100.0
}
