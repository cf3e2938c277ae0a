use log::debug;
use serde::Serialize;

use crate::quant::QuantKind;
use crate::spec::{GpuSpec, ModelSpec};

/// Prefill scales worse than decode across devices.
pub const COMPUTE_SCALING_EXPONENT: f64 = 0.6;
pub const BANDWIDTH_SCALING_EXPONENT: f64 = 0.8;

/// Empirical ratio between the naive 2 x params FLOP count per prompt token
/// and what prefill actually costs.
const PREFILL_CORRECTION: f64 = std::f64::consts::SQRT_2;

/// Tokens per second for a single stream and per user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Throughput {
    pub gen_speed: f64,
    pub prompt_speed: f64,
    pub shared_gen: f64,
    pub shared_prompt: f64,
    pub compute_scaling_factor: f64,
    pub bandwidth_scaling_factor: f64,
}

#[must_use]
pub fn compute_scaling_factor(parallel_gpu_count: u32) -> f64 {
    f64::from(parallel_gpu_count).powf(COMPUTE_SCALING_EXPONENT)
}

#[must_use]
pub fn bandwidth_scaling_factor(parallel_gpu_count: u32) -> f64 {
    f64::from(parallel_gpu_count).powf(BANDWIDTH_SCALING_EXPONENT)
}

/// Bytes streamed per active parameter during decode. Doubled when the
/// device declares its native low-precision paths and `quant` is not one
/// of them.
#[must_use]
pub fn bytes_per_active_param(gpu: &GpuSpec, quant: QuantKind) -> f64 {
    let bytes = quant.bytes_per_value();
    if gpu.has_fast_path(quant) {
        bytes
    } else {
        bytes * 2.0
    }
}

/// Decode is bandwidth bound: every generated token reads the active
/// weights once. Prefill is compute bound.
#[must_use]
pub fn estimate(
    gpu: &GpuSpec,
    model: &ModelSpec,
    weight_quant: QuantKind,
    parallel_gpu_count: u32,
    concurrent_users: u32,
) -> Throughput {
    let compute_scaling_factor = compute_scaling_factor(parallel_gpu_count);
    let bandwidth_scaling_factor = bandwidth_scaling_factor(parallel_gpu_count);

    let effective_bandwidth = gpu.memory_bandwidth_gbs * bandwidth_scaling_factor;
    let gen_speed =
        effective_bandwidth / (model.active_params_b * bytes_per_active_param(gpu, weight_quant));

    let effective_compute = gpu.compute_tflops_for(weight_quant) * compute_scaling_factor;
    let prompt_speed = (effective_compute * 1000.0) / (model.total_params_b * PREFILL_CORRECTION);

    let users = f64::from(concurrent_users);
    debug!(
        "throughput on {} x {}: gen {:.1} tok/s, prompt {:.1} tok/s, shared by {} user(s)",
        parallel_gpu_count, gpu.name, gen_speed, prompt_speed, concurrent_users
    );
    Throughput {
        gen_speed,
        prompt_speed,
        shared_gen: gen_speed / users,
        shared_prompt: prompt_speed / users,
        compute_scaling_factor,
        bandwidth_scaling_factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn setup() -> (GpuSpec, ModelSpec) {
        let catalog = Catalog::builtin();
        (
            catalog.gpu("RTX 4090").unwrap().clone(),
            catalog.model("Qwen3-8B").unwrap().clone(),
        )
    }

    #[test]
    fn test_single_gpu_speeds() {
        let (gpu, model) = setup();
        let t = estimate(&gpu, &model, QuantKind::Fp8, 1, 1);
        assert_eq!(t.compute_scaling_factor, 1.0);
        assert_eq!(t.bandwidth_scaling_factor, 1.0);
        assert!((t.gen_speed - 1008.0 / 8.2).abs() < 1e-9);
        // no fp8 entry on this card, so the fp16 figure is used
        let expected_prompt = 82.6 * 1000.0 / (8.2 * 2f64.sqrt());
        assert!((t.prompt_speed - expected_prompt).abs() < 1e-9);
        assert_eq!(t.shared_gen, t.gen_speed);
    }

    #[test]
    fn test_compute_lookup_by_weight_quant() {
        let catalog = Catalog::builtin();
        let gpu = catalog.gpu("H100 80GB").unwrap();
        let model = catalog.model("Qwen3-8B").unwrap();
        let fp8 = estimate(gpu, model, QuantKind::Fp8, 1, 1);
        let fp16 = estimate(gpu, model, QuantKind::Fp16, 1, 1);
        assert!((fp8.prompt_speed - 2.0 * fp16.prompt_speed).abs() < 1e-6);
        assert!((fp8.gen_speed - 2.0 * fp16.gen_speed).abs() < 1e-9);
    }

    #[test]
    fn test_scaling_factors() {
        assert_eq!(compute_scaling_factor(1), 1.0);
        assert!((compute_scaling_factor(4) - 4f64.powf(0.6)).abs() < 1e-12);
        assert!((bandwidth_scaling_factor(8) - 8f64.powf(0.8)).abs() < 1e-12);
        assert!(bandwidth_scaling_factor(2) < 2.0);
    }

    #[test]
    fn test_slow_path_penalty() {
        let (mut gpu, model) = setup();
        let baseline = estimate(&gpu, &model, QuantKind::Int4, 1, 1);

        gpu.native_fast_paths = Some(vec![QuantKind::Fp8]);
        let penalised = estimate(&gpu, &model, QuantKind::Int4, 1, 1);
        assert!((penalised.gen_speed * 2.0 - baseline.gen_speed).abs() < 1e-9);
        assert_eq!(penalised.prompt_speed, baseline.prompt_speed);

        let native = estimate(&gpu, &model, QuantKind::Fp8, 1, 1);
        assert!((native.gen_speed - 1008.0 / 8.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_compute_gives_zero_prompt_speed() {
        let (mut gpu, model) = setup();
        gpu.compute_tflops = std::collections::BTreeMap::from([(QuantKind::Int8, 10.0)]);
        let t = estimate(&gpu, &model, QuantKind::Int4, 1, 1);
        assert_eq!(t.prompt_speed, 0.0);
    }
}
