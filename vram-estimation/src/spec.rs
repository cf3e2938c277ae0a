use std::collections::BTreeMap;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::quant::QuantKind;
use crate::vram::{estimate_model_size_gb, kv_bytes_per_token_fp8};

/// Hardware figures for one accelerator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuSpec {
    pub name: String,
    pub vram_gb: f64,
    pub memory_bandwidth_gbs: f64,
    /// Dense TFLOPS per precision kind.
    pub compute_tflops: BTreeMap<QuantKind, f64>,
    /// Precision the serving backend uses for KV cache on this device by default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kv_cache_quant_kind: Option<QuantKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    /// Low-precision kinds the device executes natively. `None` means the
    /// capability is unknown and no slow-path penalty is applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_fast_paths: Option<Vec<QuantKind>>,
}

impl GpuSpec {
    /// Throughput for `kind`, falling back to the fp16 figure, then to zero.
    #[must_use]
    pub fn compute_tflops_for(&self, kind: QuantKind) -> f64 {
        self.compute_tflops
            .get(&kind)
            .or_else(|| self.compute_tflops.get(&QuantKind::Fp16))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn default_kv_quant(&self) -> QuantKind {
        self.kv_cache_quant_kind.unwrap_or(QuantKind::Fp8)
    }

    #[must_use]
    pub fn has_fast_path(&self, kind: QuantKind) -> bool {
        if !kind.is_low_precision() {
            return true;
        }
        self.native_fast_paths
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&kind))
    }

    /// Explicit architecture, or one guessed from the product name.
    #[must_use]
    pub fn architecture_label(&self) -> String {
        self.architecture
            .clone()
            .unwrap_or_else(|| infer_architecture(&self.name).to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.vram_gb > 0.0) {
            return Err(Error::InvalidSpec(format!(
                "GPU '{}': vram_gb must be positive, got {}",
                self.name, self.vram_gb
            )));
        }
        if !(self.memory_bandwidth_gbs > 0.0) {
            return Err(Error::InvalidSpec(format!(
                "GPU '{}': memory_bandwidth_gbs must be positive, got {}",
                self.name, self.memory_bandwidth_gbs
            )));
        }
        if self.compute_tflops.is_empty() {
            return Err(Error::InvalidSpec(format!(
                "GPU '{}': at least one compute throughput entry is required",
                self.name
            )));
        }
        Ok(())
    }
}

/// Best-effort architecture family from a marketing name.
#[must_use]
pub fn infer_architecture(name: &str) -> &'static str {
    let n = name.to_lowercase();
    let compact: String = n.chars().filter(|c| !c.is_whitespace()).collect();
    if n.contains("h100") || n.contains("h20") || n.contains("hopper") {
        "Hopper"
    } else if n.contains("l40") || n.contains("a40") || n.contains("a800") || n.contains("a100") {
        "Ampere"
    } else if compact.contains("rtx4") {
        "Ada"
    } else if compact.contains("rtx3") {
        "Ampere"
    } else if compact.contains("rtx2") {
        "Turing"
    } else if n.contains("v100") {
        "Volta"
    } else if n.contains("1080") {
        "Pascal"
    } else if compact.contains("rx7") || n.contains("r7") {
        "RDNA3"
    } else {
        ""
    }
}

/// Architecture figures for one model checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub total_params_b: f64,
    pub active_params_b: f64,
    /// Measured footprint at `native_quant_kind`.
    pub model_size_gb: f64,
    pub native_quant_kind: QuantKind,
    /// Bytes per token for one of the K/V tensors at 8-bit precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_token_kv_bytes_at_fp8: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_kv_heads: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_dim: Option<u32>,
}

impl ModelSpec {
    /// The explicit per-token KV size, or one derived from the attention geometry.
    #[must_use]
    pub fn per_token_kv_bytes(&self) -> Option<f64> {
        self.per_token_kv_bytes_at_fp8.or_else(|| {
            match (self.layers, self.num_kv_heads, self.head_dim) {
                (Some(layers), Some(heads), Some(dim)) => {
                    Some(kv_bytes_per_token_fp8(layers, heads, dim))
                }
                _ => None,
            }
        })
    }

    #[must_use]
    pub fn is_mixture_of_experts(&self) -> bool {
        self.active_params_b < self.total_params_b
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.total_params_b > 0.0) {
            return Err(Error::InvalidSpec(format!(
                "model '{}': total_params_b must be positive, got {}",
                self.name, self.total_params_b
            )));
        }
        if !(self.active_params_b > 0.0) || self.active_params_b > self.total_params_b {
            return Err(Error::InvalidSpec(format!(
                "model '{}': active_params_b must be in (0, {}], got {}",
                self.name, self.total_params_b, self.active_params_b
            )));
        }
        if !(self.model_size_gb > 0.0) {
            return Err(Error::InvalidSpec(format!(
                "model '{}': model_size_gb must be positive, got {}",
                self.name, self.model_size_gb
            )));
        }
        match self.per_token_kv_bytes() {
            Some(bytes) if bytes > 0.0 => Ok(()),
            Some(bytes) => Err(Error::InvalidSpec(format!(
                "model '{}': per-token KV size must be positive, got {bytes}",
                self.name
            ))),
            None => Err(Error::InvalidSpec(format!(
                "model '{}': needs per_token_kv_bytes_at_fp8 or layers, num_kv_heads and head_dim",
                self.name
            ))),
        }
    }
}

/// User-entered GPU figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGpu {
    pub vram_gb: f64,
    pub memory_bandwidth_gbs: f64,
    pub fp16_tflops: f64,
    #[serde(default)]
    pub kv_cache_quant_kind: Option<QuantKind>,
}

impl Default for CustomGpu {
    fn default() -> Self {
        Self {
            vram_gb: 24.0,
            memory_bandwidth_gbs: 600.0,
            fp16_tflops: 30.0,
            kv_cache_quant_kind: Some(QuantKind::Fp8),
        }
    }
}

impl CustomGpu {
    #[must_use]
    pub fn into_spec(self) -> GpuSpec {
        GpuSpec {
            name: "Custom GPU".to_string(),
            vram_gb: self.vram_gb,
            memory_bandwidth_gbs: self.memory_bandwidth_gbs,
            compute_tflops: BTreeMap::from([(QuantKind::Fp16, self.fp16_tflops)]),
            kv_cache_quant_kind: self.kv_cache_quant_kind,
            architecture: Some("Custom".to_string()),
            native_fast_paths: None,
        }
    }
}

/// User-entered model figures. Missing values are estimated when resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomModel {
    pub total_params_b: f64,
    /// Defaults to `total_params_b` (dense model).
    #[serde(default)]
    pub active_params_b: Option<f64>,
    /// Estimated from the parameter count at the requested weight precision when absent.
    #[serde(default)]
    pub model_size_gb: Option<f64>,
    #[serde(default)]
    pub per_token_kv_bytes_at_fp8: Option<f64>,
    #[serde(default)]
    pub layers: Option<u32>,
    #[serde(default)]
    pub num_kv_heads: Option<u32>,
    #[serde(default)]
    pub head_dim: Option<u32>,
}

impl Default for CustomModel {
    fn default() -> Self {
        Self {
            total_params_b: 7.0,
            active_params_b: None,
            model_size_gb: None,
            per_token_kv_bytes_at_fp8: None,
            layers: Some(32),
            num_kv_heads: Some(8),
            head_dim: Some(128),
        }
    }
}

impl CustomModel {
    /// A custom model is taken to be stored at the precision it is run at,
    /// so its size is reused as-is by the weight estimator.
    #[must_use]
    pub fn into_spec(self, weight_quant: QuantKind) -> ModelSpec {
        let model_size_gb = self
            .model_size_gb
            .unwrap_or_else(|| estimate_model_size_gb(self.total_params_b, weight_quant));
        ModelSpec {
            name: "Custom Model".to_string(),
            total_params_b: self.total_params_b,
            active_params_b: self.active_params_b.unwrap_or(self.total_params_b),
            model_size_gb,
            native_quant_kind: weight_quant,
            per_token_kv_bytes_at_fp8: self.per_token_kv_bytes_at_fp8,
            layers: self.layers,
            num_kv_heads: self.num_kv_heads,
            head_dim: self.head_dim,
        }
    }
}

/// Where a GPU spec comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuSource {
    Catalog(String),
    Custom(CustomGpu),
}

impl GpuSource {
    pub fn resolve(&self, catalog: &Catalog) -> Result<GpuSpec> {
        let spec = match self {
            Self::Catalog(name) => {
                trace!("resolving GPU '{}' from catalog", name);
                catalog.gpu(name)?.clone()
            }
            Self::Custom(custom) => custom.clone().into_spec(),
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Where a model spec comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Catalog(String),
    Custom(CustomModel),
}

impl ModelSource {
    /// `weight_quant` only matters for custom models, see [`CustomModel::into_spec`].
    pub fn resolve(&self, catalog: &Catalog, weight_quant: QuantKind) -> Result<ModelSpec> {
        let spec = match self {
            Self::Catalog(name) => {
                trace!("resolving model '{}' from catalog", name);
                catalog.model(name)?.clone()
            }
            Self::Custom(custom) => custom.clone().into_spec(weight_quant),
        };
        spec.validate()?;
        Ok(spec)
    }
}
