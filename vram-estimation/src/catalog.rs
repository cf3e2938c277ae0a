use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::quant::QuantKind;
use crate::spec::{GpuSpec, ModelSpec};

/// Read-only reference tables of GPUs and models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub gpus: Vec<GpuSpec>,
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

// name, vram GB, bandwidth GB/s, fp16 TFLOPS, fp8 TFLOPS
const GPUS: &[(&str, f64, f64, f64, Option<f64>)] = &[
    ("A100 80GB", 80.0, 2039.0, 312.0, Some(624.0)),
    ("A100 40GB", 40.0, 1555.0, 312.0, Some(624.0)),
    ("H100 80GB", 80.0, 3350.0, 989.0, Some(1978.0)),
    ("H100 PCIe", 80.0, 2000.0, 989.0, Some(1978.0)),
    ("L40", 48.0, 864.0, 90.5, None),
    ("L40S", 48.0, 864.0, 91.5, None),
    ("RTX 4090", 24.0, 1008.0, 82.6, None),
];

// name, total B, active B, fp8 size GB, per-token KV bytes, layers, KV heads, head dim
const MODELS: &[(&str, f64, f64, f64, f64, u32, u32, u32)] = &[
    ("Qwen3-0.6B", 0.6, 0.6, 0.31, 28672.0, 28, 8, 256),
    ("Qwen3-1.7B", 1.7, 1.7, 0.90, 14336.0, 28, 8, 128),
    ("Qwen3-4B", 4.0, 4.0, 2.10, 18432.0, 36, 8, 128),
    ("Qwen3-30B-A3B", 30.53, 3.0, 16.70, 12288.0, 48, 4, 128),
    ("Qwen3-8B", 8.2, 8.2, 4.86, 18432.0, 36, 8, 128),
    ("Qwen3-14B", 14.8, 14.8, 10.15, 20480.0, 40, 8, 128),
    ("Qwen3-32B", 32.8, 32.8, 19.45, 32768.0, 64, 8, 128),
    ("Qwen3-235B-A22B", 235.09, 22.0, 128.56, 24064.0, 94, 4, 128),
];

impl Catalog {
    /// The tables shipped with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        let gpus = GPUS
            .iter()
            .map(|&(name, vram_gb, memory_bandwidth_gbs, fp16, fp8)| {
                let mut compute_tflops = BTreeMap::from([(QuantKind::Fp16, fp16)]);
                if let Some(fp8) = fp8 {
                    compute_tflops.insert(QuantKind::Fp8, fp8);
                }
                GpuSpec {
                    name: name.to_string(),
                    vram_gb,
                    memory_bandwidth_gbs,
                    compute_tflops,
                    kv_cache_quant_kind: None,
                    architecture: None,
                    native_fast_paths: None,
                }
            })
            .collect();

        // Published per-token KV sizes are kept verbatim rather than derived
        // from the geometry columns.
        let models = MODELS
            .iter()
            .map(|&(name, total, active, size, kv_bytes, layers, heads, dim)| ModelSpec {
                name: name.to_string(),
                total_params_b: total,
                active_params_b: active,
                model_size_gb: size,
                native_quant_kind: QuantKind::Fp8,
                per_token_kv_bytes_at_fp8: Some(kv_bytes),
                layers: Some(layers),
                num_kv_heads: Some(heads),
                head_dim: Some(dim),
            })
            .collect();

        Self { gpus, models }
    }

    /// Parses and validates a catalog from any JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let catalog: Self = serde_json::from_reader(reader)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_reader(json.as_bytes())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Loads `path` when given, falling back to the built-in tables if the
    /// file is missing or invalid.
    #[must_use]
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::load_from_file(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(
                    "Catalog file '{}' could not be used ({}). Using the built-in catalog.",
                    path.display(),
                    e
                );
                Self::builtin()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for gpu in &self.gpus {
            gpu.validate()?;
        }
        for model in &self.models {
            model.validate()?;
        }
        Ok(())
    }

    /// Case-insensitive lookup by name.
    pub fn gpu(&self, name: &str) -> Result<&GpuSpec> {
        trace!("looking up GPU '{}' among {} entries", name, self.gpus.len());
        self.gpus
            .iter()
            .find(|gpu| gpu.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::NotFound(format!("GPU '{name}' is not in the catalog")))
    }

    /// Case-insensitive lookup by name.
    pub fn model(&self, name: &str) -> Result<&ModelSpec> {
        trace!("looking up model '{}' among {} entries", name, self.models.len());
        self.models
            .iter()
            .find(|model| model.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::NotFound(format!("model '{name}' is not in the catalog")))
    }
}
