use prettytable::{row, Table};
use vram_estimation::{CalcRequest, Calculation, Catalog, GpuSpec, ModelSpec, QuantKind};

use crate::utils::{format_gb, format_speed, format_tokens};

pub fn estimate_table(
    gpu: &GpuSpec,
    model: &ModelSpec,
    request: &CalcRequest,
    calculation: &Calculation,
) -> Table {
    let mut table = Table::new();
    table.add_row(row!["GPU", format!("{} x{}", gpu.name, request.parallel_gpu_count)]);
    table.add_row(row!["Model", model.name]);
    table.add_row(row![
        "Quantization (weights / KV)",
        format!("{} / {}", request.weight_quant, request.kv_quant)
    ]);
    #[allow(clippy::cast_precision_loss)]
    let context = format_tokens(request.max_context_tokens as f64);
    table.add_row(row!["Max context", format!("{context} tokens")]);

    match calculation {
        Calculation::Success(estimate) => {
            table.add_row(row!["Model weights", format_gb(estimate.model_weights_gb)]);
            table.add_row(row!["KV cache (one full sequence)", format_gb(estimate.kv_cache_gb)]);
            table.add_row(row!["Total required", format_gb(estimate.total_required_gb)]);
            table.add_row(row![
                "Usable VRAM",
                format!(
                    "{} of {} ({} reserved)",
                    format_gb(estimate.usable_vram_gb),
                    format_gb(estimate.device_vram_gb),
                    format_gb(estimate.reserved_gb)
                )
            ]);
            table.add_row(row![
                "Memory used by one full request",
                format!("{:.1}%", estimate.single_request_utilization_pct)
            ]);
            table.add_row(row!["Usable KV cache", format_gb(estimate.usable_kv_cache_gb)]);
            table.add_row(row![
                "Full-length sequences",
                format!("{:.2}", estimate.full_length_sequence_capacity)
            ]);
            table.add_row(row![
                "Max simultaneous tokens",
                format_tokens(estimate.max_simultaneous_tokens)
            ]);
            table.add_row(row![
                "Generation",
                format!(
                    "{} (bandwidth scaling x{:.2})",
                    format_speed(estimate.gen_speed),
                    estimate.bandwidth_scaling_factor
                )
            ]);
            table.add_row(row![
                "Prompt processing",
                format!(
                    "{} (compute scaling x{:.2})",
                    format_speed(estimate.prompt_speed),
                    estimate.compute_scaling_factor
                )
            ]);
            table.add_row(row![
                format!("Per user ({} users)", request.concurrent_users),
                format!(
                    "{} generation, {} prompt",
                    format_speed(estimate.shared_gen),
                    format_speed(estimate.shared_prompt)
                )
            ]);
        }
        Calculation::Failure(failure) => {
            table.add_row(row!["Status", failure.reason]);
            table.add_row(row!["Model weights", format_gb(failure.model_weights_gb)]);
            table.add_row(row!["KV cache (one full sequence)", format_gb(failure.kv_cache_gb)]);
            table.add_row(row!["Total required", format_gb(failure.total_required_gb)]);
            table.add_row(row![
                "Usable VRAM",
                format!(
                    "{} ({} reserved)",
                    format_gb(failure.usable_vram_gb),
                    format_gb(failure.reserved_gb)
                )
            ]);
        }
    }
    table
}

/// One row per GPU for the same model and request.
pub fn comparison_table(rows: &[(&GpuSpec, Calculation)]) -> Table {
    let mut table = Table::new();
    table.add_row(row![
        "GPU",
        "Fits",
        "Required",
        "Usable",
        "Generation",
        "Prompt",
        "Per-user Generation",
        "Full-length Sequences"
    ]);
    for (gpu, calculation) in rows {
        match calculation {
            Calculation::Success(estimate) => {
                table.add_row(row![
                    gpu.name,
                    "yes",
                    format_gb(estimate.total_required_gb),
                    format_gb(estimate.usable_vram_gb),
                    format_speed(estimate.gen_speed),
                    format_speed(estimate.prompt_speed),
                    format_speed(estimate.shared_gen),
                    format!("{:.2}", estimate.full_length_sequence_capacity)
                ]);
            }
            Calculation::Failure(failure) => {
                table.add_row(row![
                    gpu.name,
                    "no",
                    format_gb(failure.total_required_gb),
                    format_gb(failure.usable_vram_gb),
                    "-",
                    "-",
                    "-",
                    "-"
                ]);
            }
        }
    }
    table
}

pub fn gpu_table(catalog: &Catalog) -> Table {
    let tflops = |gpu: &GpuSpec, kind: QuantKind| {
        gpu.compute_tflops
            .get(&kind)
            .map_or_else(|| "-".to_string(), |t| format!("{t:.1}"))
    };
    let mut table = Table::new();
    table.add_row(row![
        "GPU",
        "Architecture",
        "VRAM",
        "Bandwidth (GB/s)",
        "FP16 TFLOPS",
        "FP8 TFLOPS",
        "KV Cache Quant"
    ]);
    for gpu in &catalog.gpus {
        let mut architecture = gpu.architecture_label();
        if architecture.is_empty() {
            architecture = "-".to_string();
        }
        table.add_row(row![
            gpu.name,
            architecture,
            format_gb(gpu.vram_gb),
            format!("{:.0}", gpu.memory_bandwidth_gbs),
            tflops(gpu, QuantKind::Fp16),
            tflops(gpu, QuantKind::Fp8),
            gpu.default_kv_quant()
        ]);
    }
    table
}

pub fn model_table(catalog: &Catalog) -> Table {
    let mut table = Table::new();
    table.add_row(row![
        "Model",
        "Total Params (B)",
        "Active Params (B)",
        "Size",
        "Native Quant",
        "KV Bytes/Token (8-bit)"
    ]);
    for model in &catalog.models {
        let active = if model.is_mixture_of_experts() {
            format!("{} (MoE)", model.active_params_b)
        } else {
            model.active_params_b.to_string()
        };
        let kv_bytes = model
            .per_token_kv_bytes()
            .map_or_else(|| "-".to_string(), format_tokens);
        table.add_row(row![
            model.name,
            model.total_params_b,
            active,
            format_gb(model.model_size_gb),
            model.native_quant_kind,
            kv_bytes
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use vram_estimation::calculate;

    #[test]
    fn test_estimate_table_success_and_failure() {
        let catalog = Catalog::builtin();
        let gpu = catalog.gpu("RTX 4090").unwrap();
        let model = catalog.model("Qwen3-8B").unwrap();

        let request = CalcRequest::default();
        let ok = calculate(gpu, model, &request).unwrap();
        assert_eq!(estimate_table(gpu, model, &request, &ok).len(), 15);

        let request = CalcRequest {
            max_context_tokens: 5_000_000,
            ..CalcRequest::default()
        };
        let failed = calculate(gpu, model, &request).unwrap();
        let table = estimate_table(gpu, model, &request, &failed);
        assert_eq!(table.len(), 9);
        assert!(table.to_string().contains("Insufficient VRAM"));
    }

    #[test]
    fn test_comparison_table_has_row_per_gpu() {
        let catalog = Catalog::builtin();
        let model = catalog.model("Qwen3-32B").unwrap();
        let request = CalcRequest::default();
        let rows: Vec<_> = catalog
            .gpus
            .iter()
            .map(|gpu| (gpu, calculate(gpu, model, &request).unwrap()))
            .collect();
        let table = comparison_table(&rows);
        assert_eq!(table.len(), catalog.gpus.len() + 1);
    }

    #[test]
    fn test_catalog_tables() {
        let catalog = Catalog::builtin();
        let gpus = gpu_table(&catalog);
        assert_eq!(gpus.len(), 8);
        assert!(gpus.to_string().contains("Hopper"));

        let models = model_table(&catalog);
        assert_eq!(models.len(), 9);
        assert!(models.to_string().contains("(MoE)"));
        assert!(models.to_string().contains("18,432"));
    }
}
