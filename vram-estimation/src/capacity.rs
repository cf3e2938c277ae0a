use log::debug;
use serde::Serialize;

/// Usable memory across all participating devices after the reserve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CapacityPlan {
    pub device_vram_gb: f64,
    pub reserved_gb: f64,
    pub usable_vram_gb: f64,
}

/// How many full-context sequences fit next to the weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SequenceCapacity {
    pub usable_kv_cache_gb: f64,
    pub full_length_sequence_capacity: f64,
    pub max_simultaneous_tokens: f64,
}

/// The reserve is the larger of the proportional headroom and the fixed
/// floor. Inputs are trusted: `vram_utilization` in (0, 1] and
/// `parallel_gpu_count >= 1` are checked by the caller.
#[must_use]
pub fn plan(
    vram_gb: f64,
    parallel_gpu_count: u32,
    vram_utilization: f64,
    min_reserve_gb: f64,
) -> CapacityPlan {
    let device_vram_gb = vram_gb * f64::from(parallel_gpu_count);
    let proportional_reserve = device_vram_gb * (1.0 - vram_utilization);
    let reserved_gb = proportional_reserve.max(min_reserve_gb);
    let usable_vram_gb = (device_vram_gb - reserved_gb).max(0.0);
    debug!(
        "capacity: {:.2} GB on {} device(s), reserve {:.2} GB \
         (proportional {:.2}, floor {:.2}), usable {:.2} GB",
        device_vram_gb,
        parallel_gpu_count,
        reserved_gb,
        proportional_reserve,
        min_reserve_gb,
        usable_vram_gb
    );
    CapacityPlan {
        device_vram_gb,
        reserved_gb,
        usable_vram_gb,
    }
}

impl CapacityPlan {
    #[must_use]
    pub fn fits(&self, required_gb: f64) -> bool {
        required_gb <= self.usable_vram_gb
    }

    #[must_use]
    pub fn sequence_capacity(
        &self,
        model_weights_gb: f64,
        kv_cache_gb: f64,
        max_context_tokens: u64,
    ) -> SequenceCapacity {
        let usable_kv_cache_gb = (self.usable_vram_gb - model_weights_gb).max(0.0);
        let full_length_sequence_capacity = usable_kv_cache_gb / kv_cache_gb;
        #[allow(clippy::cast_precision_loss)]
        let max_simultaneous_tokens = max_context_tokens as f64 * full_length_sequence_capacity;
        SequenceCapacity {
            usable_kv_cache_gb,
            full_length_sequence_capacity,
            max_simultaneous_tokens,
        }
    }
}
