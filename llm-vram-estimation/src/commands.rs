use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use vram_estimation::{
    CalcRequest, CustomGpu, CustomModel, GpuSource, GpuSpec, ModelSource, QuantKind,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Estimate VRAM requirements and inference speed of large language models
///
/// Combines a GPU's memory size, bandwidth and compute throughput with a
/// model's parameter count and KV cache geometry to tell whether the model
/// fits at a given context length, and how fast it generates once it does.
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a JSON catalog of GPUs and models (defaults to the built-in catalog)
    #[arg(long, value_name = "FILE", global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate VRAM usage and speed of a model on a GPU (or on every catalog GPU)
    Estimate(EstimateArgs),

    /// List the GPUs or models in the catalog
    List {
        #[arg(value_enum, default_value_t = ListKind::Gpus)]
        kind: ListKind,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    Gpus,
    Models,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum QuantArg {
    Fp32,
    Fp16,
    Fp8,
    Int8,
    Int4,
}

impl From<QuantArg> for QuantKind {
    fn from(arg: QuantArg) -> Self {
        match arg {
            QuantArg::Fp32 => Self::Fp32,
            QuantArg::Fp16 => Self::Fp16,
            QuantArg::Fp8 => Self::Fp8,
            QuantArg::Int8 => Self::Int8,
            QuantArg::Int4 => Self::Int4,
        }
    }
}

#[derive(Args)]
pub struct EstimateArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub gpu: GpuArgs,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ModelArgs {
    /// Name of a catalog model
    #[arg(short, long, conflicts_with = "total_params")]
    pub model: Option<String>,

    /// Total parameters in billions (custom model)
    #[arg(long, value_name = "BILLIONS")]
    pub total_params: Option<f64>,

    /// Parameters used per token in billions (custom model, defaults to the total)
    #[arg(long, value_name = "BILLIONS", requires = "total_params", conflicts_with = "model")]
    pub active_params: Option<f64>,

    /// Model size in GB at the selected quantization (custom model, estimated when omitted)
    #[arg(long, value_name = "GB", requires = "total_params", conflicts_with = "model")]
    pub model_size: Option<f64>,

    /// KV cache bytes per token at 8-bit (custom model, derived from the geometry when omitted)
    #[arg(long, value_name = "BYTES", requires = "total_params", conflicts_with = "model")]
    pub kv_bytes_per_token: Option<f64>,

    /// Number of transformer layers (custom model)
    #[arg(long, requires = "total_params", conflicts_with = "model")]
    pub layers: Option<u32>,

    /// Number of KV heads (custom model)
    #[arg(long, requires = "total_params", conflicts_with = "model")]
    pub kv_heads: Option<u32>,

    /// Dimension of each attention head (custom model)
    #[arg(long, requires = "total_params", conflicts_with = "model")]
    pub head_dim: Option<u32>,
}

impl ModelArgs {
    pub fn source(&self) -> Result<ModelSource, String> {
        if let Some(name) = &self.model {
            return Ok(ModelSource::Catalog(name.clone()));
        }
        let Some(total_params_b) = self.total_params else {
            return Err("Either --model or --total-params is required.".to_string());
        };
        let defaults = CustomModel::default();
        Ok(ModelSource::Custom(CustomModel {
            total_params_b,
            active_params_b: self.active_params,
            model_size_gb: self.model_size,
            per_token_kv_bytes_at_fp8: self.kv_bytes_per_token,
            layers: self.layers.or(defaults.layers),
            num_kv_heads: self.kv_heads.or(defaults.num_kv_heads),
            head_dim: self.head_dim.or(defaults.head_dim),
        }))
    }
}

#[derive(Args)]
pub struct GpuArgs {
    /// Name of a catalog GPU (compares every catalog GPU when no GPU is given)
    #[arg(short, long, conflicts_with = "vram")]
    pub gpu: Option<String>,

    /// VRAM per device in GB (custom GPU)
    #[arg(long, value_name = "GB")]
    pub vram: Option<f64>,

    /// Memory bandwidth in GB/s (custom GPU)
    #[arg(long, value_name = "GB/S", requires = "vram", conflicts_with = "gpu")]
    pub bandwidth: Option<f64>,

    /// FP16 compute in TFLOPS (custom GPU)
    #[arg(long, value_name = "TFLOPS", requires = "vram", conflicts_with = "gpu")]
    pub fp16_tflops: Option<f64>,

    /// KV cache precision the custom GPU's backend uses by default
    #[arg(long, value_enum, requires = "vram", conflicts_with = "gpu")]
    pub gpu_kv_quant: Option<QuantArg>,
}

impl GpuArgs {
    /// `None` means no GPU was chosen.
    pub fn source(&self) -> Option<GpuSource> {
        if let Some(name) = &self.gpu {
            return Some(GpuSource::Catalog(name.clone()));
        }
        let defaults = CustomGpu::default();
        self.vram.map(|vram_gb| {
            GpuSource::Custom(CustomGpu {
                vram_gb,
                memory_bandwidth_gbs: self.bandwidth.unwrap_or(defaults.memory_bandwidth_gbs),
                fp16_tflops: self.fp16_tflops.unwrap_or(defaults.fp16_tflops),
                kv_cache_quant_kind: self
                    .gpu_kv_quant
                    .map(QuantKind::from)
                    .or(defaults.kv_cache_quant_kind),
            })
        })
    }
}

#[derive(Args)]
pub struct RequestArgs {
    /// Quantization of the model weights
    #[arg(short, long, value_enum, default_value_t = QuantArg::Int4)]
    pub quant: QuantArg,

    /// Quantization of the KV cache (defaults to the GPU's preferred kind, or fp8)
    #[arg(long, value_enum)]
    pub kv_quant: Option<QuantArg>,

    /// Maximum context length in tokens
    #[arg(short, long, value_name = "TOKENS", default_value_t = 8192)]
    pub context: u64,

    /// Number of users sharing the deployment
    #[arg(short, long, default_value_t = 10)]
    pub users: u32,

    /// Number of GPUs the model is split across
    #[arg(long, default_value_t = 1)]
    pub gpus: u32,

    /// Fraction of VRAM the serving backend may use, in (0, 1]
    #[arg(long, value_name = "FRACTION", default_value_t = 0.9)]
    pub vram_utilization: f64,

    /// VRAM in GB always held back, whatever the utilization fraction
    #[arg(long, value_name = "GB", default_value_t = 2.0)]
    pub min_reserve: f64,
}

impl RequestArgs {
    pub fn to_request(&self, gpu: &GpuSpec) -> CalcRequest {
        CalcRequest {
            weight_quant: self.quant.into(),
            kv_quant: self
                .kv_quant
                .map_or_else(|| gpu.default_kv_quant(), QuantKind::from),
            max_context_tokens: self.context,
            concurrent_users: self.users,
            parallel_gpu_count: self.gpus,
            vram_utilization: self.vram_utilization,
            min_reserve_gb: self.min_reserve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vram_estimation::Catalog;

    fn estimate_args(args: &[&str]) -> EstimateArgs {
        let argv = ["llm-vram-estimation", "estimate"].iter().chain(args.iter());
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Estimate(args)) => args,
            _ => panic!("expected the estimate subcommand"),
        }
    }

    #[test]
    fn test_defaults() {
        let args = estimate_args(&["--model", "Qwen3-8B", "--gpu", "RTX 4090"]);
        let gpu = Catalog::builtin().gpu("RTX 4090").unwrap().clone();
        let request = args.request.to_request(&gpu);
        assert_eq!(request, CalcRequest::default());
        assert!(!args.json);
    }

    #[test]
    fn test_catalog_sources() {
        let args = estimate_args(&["-m", "Qwen3-8B", "-g", "L40"]);
        assert_eq!(
            args.model.source().unwrap(),
            ModelSource::Catalog("Qwen3-8B".to_string())
        );
        assert_eq!(args.gpu.source(), Some(GpuSource::Catalog("L40".to_string())));
    }

    #[test]
    fn test_custom_sources() {
        let args = estimate_args(&[
            "--total-params",
            "70",
            "--active-params",
            "70",
            "--layers",
            "80",
            "--vram",
            "48",
            "--bandwidth",
            "960",
            "--gpu-kv-quant",
            "fp16",
        ]);
        let Ok(ModelSource::Custom(model)) = args.model.source() else {
            panic!("expected a custom model");
        };
        assert_eq!(model.total_params_b, 70.0);
        assert_eq!(model.layers, Some(80));
        assert_eq!(model.num_kv_heads, Some(8));

        let Some(GpuSource::Custom(gpu)) = args.gpu.source() else {
            panic!("expected a custom GPU");
        };
        assert_eq!(gpu.vram_gb, 48.0);
        assert_eq!(gpu.memory_bandwidth_gbs, 960.0);
        assert_eq!(gpu.fp16_tflops, 30.0);
        assert_eq!(gpu.kv_cache_quant_kind, Some(QuantKind::Fp16));

        let request = args.request.to_request(&gpu.into_spec());
        assert_eq!(request.kv_quant, QuantKind::Fp16);
    }

    #[test]
    fn test_explicit_kv_quant_overrides_gpu() {
        let args = estimate_args(&[
            "-m",
            "Qwen3-8B",
            "--vram",
            "24",
            "--gpu-kv-quant",
            "fp16",
            "--kv-quant",
            "int4",
        ]);
        let Some(GpuSource::Custom(gpu)) = args.gpu.source() else {
            panic!("expected a custom GPU");
        };
        assert_eq!(args.request.to_request(&gpu.into_spec()).kv_quant, QuantKind::Int4);
    }

    #[test]
    fn test_no_gpu_means_compare() {
        let args = estimate_args(&["-m", "Qwen3-8B", "--quant", "fp8", "--gpus", "2", "-u", "4"]);
        assert_eq!(args.gpu.source(), None);
        assert_eq!(args.request.quant, QuantArg::Fp8);
        assert_eq!(args.request.gpus, 2);
        assert_eq!(args.request.users, 4);
    }

    #[test]
    fn test_model_required() {
        let args = estimate_args(&["--gpu", "L40"]);
        assert!(args.model.source().is_err());
    }

    #[test]
    fn test_conflicting_sources_rejected() {
        let rejected: [&[&str]; 6] = [
            &["-m", "Qwen3-8B", "--total-params", "7"],
            &["-g", "L40", "--vram", "24"],
            &["-m", "Qwen3-8B", "--layers", "32"],
            &["-m", "Qwen3-8B", "--model-size", "99"],
            &["-m", "Qwen3-8B", "-g", "L40", "--bandwidth", "1"],
            &["-m", "Qwen3-8B", "-g", "L40", "--gpu-kv-quant", "fp16"],
        ];
        for args in rejected {
            let argv = ["llm-vram-estimation", "estimate"].iter().chain(args.iter());
            assert!(Cli::try_parse_from(argv).is_err(), "{args:?} should be rejected");
        }
    }

    #[test]
    fn test_custom_flags_alongside_their_source() {
        let args = estimate_args(&[
            "--total-params",
            "7",
            "--model-size",
            "99",
            "-g",
            "L40",
        ]);
        let Ok(ModelSource::Custom(model)) = args.model.source() else {
            panic!("expected a custom model");
        };
        assert_eq!(model.model_size_gb, Some(99.0));
        assert_eq!(args.gpu.source(), Some(GpuSource::Catalog("L40".to_string())));
    }

    #[test]
    fn test_list_kind() {
        let cli = Cli::try_parse_from(["llm-vram-estimation", "list", "models", "-v"])
            .unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Some(Commands::List { kind: ListKind::Models })));
    }
}
