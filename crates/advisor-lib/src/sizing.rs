//! Resource sizing
//!
//! Converts traffic or usage summaries into CPU (millicore) and memory (MiB)
//! request/limit pairs. Three paths exist:
//! - linear sizing from weighted RPS with configurable coefficients
//! - banded sizing from average usage when no coefficients are configured
//! - headroom sizing from average/max usage, adjusted by trend

use crate::trend::TrendLabel;
use serde::{Deserialize, Serialize};

/// Baseline CPU request in millicores before traffic is added
pub const CPU_REQUEST_BASE: f64 = 100.0;

/// Millicores added per weighted request per second
pub const CPU_PER_RPS: f64 = 0.1;

/// Baseline memory request in MiB before traffic is added
pub const MEMORY_REQUEST_BASE: f64 = 128.0;

/// MiB added per weighted request per second
pub const MEMORY_PER_RPS: f64 = 2.0;

const DEFAULT_REQUEST_FACTOR: f64 = 1.0;
const DEFAULT_LIMIT_FACTOR: f64 = 2.0;

/// Tunable sizing coefficients; a zero field selects its documented default
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingCoefficients {
    pub cpu_request_factor: f64,
    pub cpu_limit_factor: f64,
    pub mem_request_factor: f64,
    pub mem_limit_factor: f64,
    pub pod_redundancy_factor: f64,
}

/// Recommended requests and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceSizing {
    pub cpu_request_millicores: u32,
    pub cpu_limit_millicores: u32,
    pub memory_request_mib: u32,
    pub memory_limit_mib: u32,
}

/// Inputs available to a sizing strategy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SizingSignal {
    pub weighted_rps: f64,
    pub avg_cpu_millicores: f64,
    pub avg_memory_mib: f64,
}

/// Selectable sizing path
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingStrategy {
    /// Linear in weighted RPS
    Linear(SizingCoefficients),
    /// Fixed bands over average usage
    Banded,
}

impl SizingStrategy {
    /// Linear when coefficients are configured (even all-zero), banded otherwise
    pub fn select(coefficients: Option<SizingCoefficients>) -> Self {
        match coefficients {
            Some(c) => SizingStrategy::Linear(c),
            None => SizingStrategy::Banded,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SizingStrategy::Linear(_) => "linear",
            SizingStrategy::Banded => "banded",
        }
    }

    /// Whether the strategy consumes average usage rather than traffic
    pub fn needs_usage(&self) -> bool {
        matches!(self, SizingStrategy::Banded)
    }

    /// Redundancy factor to hand to the decision engine (zero means default)
    pub fn redundancy_factor(&self) -> f64 {
        match self {
            SizingStrategy::Linear(c) => c.pod_redundancy_factor,
            SizingStrategy::Banded => 0.0,
        }
    }

    pub fn size(&self, signal: &SizingSignal) -> ResourceSizing {
        match self {
            SizingStrategy::Linear(c) => linear_sizing(signal.weighted_rps, c),
            SizingStrategy::Banded => {
                banded_sizing(signal.avg_cpu_millicores, signal.avg_memory_mib)
            }
        }
    }
}

fn or_default(factor: f64, default: f64) -> f64 {
    if factor == 0.0 {
        default
    } else {
        factor
    }
}

fn ceil_u32(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.ceil().min(u32::MAX as f64) as u32
}

fn trunc_u32(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.trunc().min(u32::MAX as f64) as u32
}

/// `ceil(100 + rps × 0.1 × factor)`, factor zero means 1.0
pub fn cpu_request(rps: f64, factor: f64) -> u32 {
    let factor = or_default(factor, DEFAULT_REQUEST_FACTOR);
    ceil_u32(CPU_REQUEST_BASE + rps * CPU_PER_RPS * factor)
}

/// Limit scaled from the unfactored request baseline, factor zero means 2.0
pub fn cpu_limit(rps: f64, factor: f64) -> u32 {
    let factor = or_default(factor, DEFAULT_LIMIT_FACTOR);
    ceil_u32(cpu_request(rps, 1.0) as f64 * factor)
}

/// `ceil(128 + rps × 2 × factor)`, factor zero means 1.0
pub fn memory_request(rps: f64, factor: f64) -> u32 {
    let factor = or_default(factor, DEFAULT_REQUEST_FACTOR);
    ceil_u32(MEMORY_REQUEST_BASE + rps * MEMORY_PER_RPS * factor)
}

/// Limit scaled from the unfactored request baseline, factor zero means 2.0
pub fn memory_limit(rps: f64, factor: f64) -> u32 {
    let factor = or_default(factor, DEFAULT_LIMIT_FACTOR);
    ceil_u32(memory_request(rps, 1.0) as f64 * factor)
}

/// Size a service from its weighted request rate
pub fn linear_sizing(rps: f64, coefficients: &SizingCoefficients) -> ResourceSizing {
    ResourceSizing {
        cpu_request_millicores: cpu_request(rps, coefficients.cpu_request_factor),
        cpu_limit_millicores: cpu_limit(rps, coefficients.cpu_limit_factor),
        memory_request_mib: memory_request(rps, coefficients.mem_request_factor),
        memory_limit_mib: memory_limit(rps, coefficients.mem_limit_factor),
    }
}

/// Size a container from coarse usage bands
///
/// CPU below 50m gets a 50m/100m floor, otherwise half the average as request
/// and the average as limit. Memory below 64Mi gets a 64Mi/128Mi floor; above
/// 1024Mi the request is 0.75× average, otherwise 0.8×; limits are 1.5×.
pub fn banded_sizing(avg_cpu_millicores: f64, avg_memory_mib: f64) -> ResourceSizing {
    let cpu = trunc_u32(avg_cpu_millicores);
    let (cpu_request, cpu_limit) = if cpu < 50 { (50, 100) } else { (cpu / 2, cpu) };

    let mem = trunc_u32(avg_memory_mib);
    let (memory_request, memory_limit) = if mem < 64 {
        (64, 128)
    } else if mem > 1024 {
        (trunc_u32(mem as f64 * 0.75), trunc_u32(mem as f64 * 1.5))
    } else {
        (trunc_u32(mem as f64 * 0.8), trunc_u32(mem as f64 * 1.5))
    };

    ResourceSizing {
        cpu_request_millicores: cpu_request,
        cpu_limit_millicores: cpu_limit,
        memory_request_mib: memory_request,
        memory_limit_mib: memory_limit,
    }
}

/// Headroom over observed usage
pub const REQUEST_HEADROOM: f64 = 1.2;
pub const LIMIT_HEADROOM: f64 = 1.5;

/// Size a container from average and peak usage, nudged by its trend
///
/// Requests are 1.2× average and limits 1.5× peak. A rising trend grows both
/// requests by 10%, a falling trend shrinks them by 10%.
pub fn headroom_sizing(
    avg_cpu_millicores: f64,
    max_cpu_millicores: f64,
    avg_memory_mib: f64,
    max_memory_mib: f64,
    trend: TrendLabel,
) -> ResourceSizing {
    let mut cpu_request = trunc_u32(avg_cpu_millicores * REQUEST_HEADROOM);
    let mut memory_request = trunc_u32(avg_memory_mib * REQUEST_HEADROOM);

    let adjust = match trend {
        TrendLabel::Rising => Some(1.1),
        TrendLabel::Falling => Some(0.9),
        TrendLabel::Stable | TrendLabel::InsufficientData => None,
    };
    if let Some(adjust) = adjust {
        cpu_request = trunc_u32(cpu_request as f64 * adjust);
        memory_request = trunc_u32(memory_request as f64 * adjust);
    }

    ResourceSizing {
        cpu_request_millicores: cpu_request,
        cpu_limit_millicores: trunc_u32(max_cpu_millicores * LIMIT_HEADROOM),
        memory_request_mib: memory_request,
        memory_limit_mib: trunc_u32(max_memory_mib * LIMIT_HEADROOM),
    }
}
