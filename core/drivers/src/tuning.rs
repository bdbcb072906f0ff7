//! Transfer tuning: defaults, user overrides and ceilings.
//!
//! Every knob resolves the same way: take the override if one was given,
//! otherwise the default, then apply the knob's ceiling. Out-of-range
//! overrides are clamped, never rejected: large values to the ceiling, zero
//! or negative values to a floor of 1.

use std::num::{NonZeroU32, NonZeroU64};

use crate::location::S3Artifact;

/// Default number of files transferred at once.
pub const DEFAULT_PARALLEL_TRANSFERS: usize = 1;
/// Upper bound on files transferred at once, whatever was requested.
pub const MAX_PARALLEL_TRANSFERS: usize = 32;
/// Default multipart part size (5 MiB, the S3 minimum).
pub const DEFAULT_MULTIPART_PART_SIZE: u64 = 5 * 1024 * 1024;
/// Default number of parts uploaded at once.
pub const DEFAULT_MULTIPART_CONCURRENCY: usize = 4;

/// Resolved transfer settings for a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTuning {
    /// Files in flight at once during directory transfers.
    pub parallel_transfers: usize,
    /// Bytes per multipart part.
    pub multipart_part_size: u64,
    /// Parts in flight at once during one multipart upload.
    pub multipart_concurrency: usize,
}

impl Default for TransferTuning {
    fn default() -> Self {
        resolve_tuning(&TuningOverrides::default())
    }
}

/// User overrides, already raised to the floor. `None` means "not specified".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TuningOverrides {
    pub parallel_transfers: Option<NonZeroU32>,
    pub multipart_part_size: Option<NonZeroU64>,
    pub multipart_concurrency: Option<NonZeroU32>,
}

impl TuningOverrides {
    /// Read the raw override fields of an S3 location. Zero and negative
    /// values become 1.
    pub fn from_s3(s3: &S3Artifact) -> Self {
        Self {
            parallel_transfers: s3.parallel_transfers.map(floor_u32),
            multipart_part_size: s3.multipart_part_size.map(floor_u64),
            multipart_concurrency: s3.multipart_concurrency.map(floor_u32),
        }
    }
}

fn floor_u32(value: i32) -> NonZeroU32 {
    u32::try_from(value)
        .ok()
        .and_then(NonZeroU32::new)
        .unwrap_or(NonZeroU32::MIN)
}

fn floor_u64(value: i64) -> NonZeroU64 {
    u64::try_from(value)
        .ok()
        .and_then(NonZeroU64::new)
        .unwrap_or(NonZeroU64::MIN)
}

/// One tunable: its default and optional ceiling.
struct Knob<T> {
    default: T,
    ceiling: Option<T>,
}

impl<T: Ord + Copy> Knob<T> {
    fn resolve(&self, requested: Option<T>) -> T {
        let value = requested.unwrap_or(self.default);
        match self.ceiling {
            Some(ceiling) => value.min(ceiling),
            None => value,
        }
    }
}

const PARALLEL_TRANSFERS: Knob<usize> = Knob {
    default: DEFAULT_PARALLEL_TRANSFERS,
    ceiling: Some(MAX_PARALLEL_TRANSFERS),
};

const MULTIPART_PART_SIZE: Knob<u64> = Knob {
    default: DEFAULT_MULTIPART_PART_SIZE,
    ceiling: None,
};

const MULTIPART_CONCURRENCY: Knob<usize> = Knob {
    default: DEFAULT_MULTIPART_CONCURRENCY,
    ceiling: None,
};

/// Resolve tuning from overrides. Never fails.
pub fn resolve_tuning(overrides: &TuningOverrides) -> TransferTuning {
    TransferTuning {
        parallel_transfers: PARALLEL_TRANSFERS
            .resolve(overrides.parallel_transfers.map(|v| to_usize(v.get()))),
        multipart_part_size: MULTIPART_PART_SIZE
            .resolve(overrides.multipart_part_size.map(NonZeroU64::get)),
        multipart_concurrency: MULTIPART_CONCURRENCY
            .resolve(overrides.multipart_concurrency.map(|v| to_usize(v.get()))),
    }
}

fn to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
