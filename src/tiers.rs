//! Load tiers and the declarative tables keyed by them.
//!
//! Every per-load tuning constant lives in a [`TierTable`]; derivation code
//! asks the table instead of switching on the load id.

use serde::Serialize;

use crate::error::{CalcError, Result};

// ============================================================================
// Load tier
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LoadTier {
    MostlyReads,
    SomeWrites,
    EqualReadsWrites,
    HeavyWrites,
}

impl LoadTier {
    pub const ALL: [LoadTier; 4] = [
        LoadTier::MostlyReads,
        LoadTier::SomeWrites,
        LoadTier::EqualReadsWrites,
        LoadTier::HeavyWrites,
    ];

    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            1 => Ok(LoadTier::MostlyReads),
            2 => Ok(LoadTier::SomeWrites),
            3 => Ok(LoadTier::EqualReadsWrites),
            4 => Ok(LoadTier::HeavyWrites),
            other => Err(CalcError::invalid(format!("unknown LoadType ID: {other}"))),
        }
    }

    pub fn id(self) -> u32 {
        self.index() as u32 + 1
    }

    fn index(self) -> usize {
        match self {
            LoadTier::MostlyReads => 0,
            LoadTier::SomeWrites => 1,
            LoadTier::EqualReadsWrites => 2,
            LoadTier::HeavyWrites => 3,
        }
    }
}

// ============================================================================
// Tiered lookup
// ============================================================================

/// One value per load tier, in tier order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierTable<T: Copy>([T; 4]);

impl<T: Copy> TierTable<T> {
    pub const fn new(values: [T; 4]) -> Self {
        Self(values)
    }

    pub fn get(&self, tier: LoadTier) -> T {
        self.0[tier.index()]
    }
}

/// How the group-consensus poll spin loop count follows the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinPolicy {
    Max,
    HalfMax,
    Min,
    /// Leave the catalog value untouched.
    Keep,
}

// ============================================================================
// Tables
// ============================================================================

/// Binlog and statement cache size in bytes.
pub const BINLOG_CACHE: TierTable<u64> = TierTable::new([32_768, 131_072, 262_144, 358_400]);
pub const JOIN_BUFFER: TierTable<u64> = TierTable::new([262_144, 524_288, 1_048_576, 1_048_576]);
pub const READ_RND_BUFFER: TierTable<u64> = TierTable::new([262_144, 393_216, 707_788, 707_788]);
pub const SORT_BUFFER: TierTable<u64> = TierTable::new([262_144, 524_288, 1_572_864, 2_097_152]);

/// Share of tmp_table_size a connection is expected to hold in memory.
pub const TMP_TABLE_FRACTION: TierTable<f64> = TierTable::new([0.03, 0.01, 0.04, 0.05]);

/// Redo capacity as a fraction of the ideal buffer pool, before load scaling.
pub const REDO_LOG_BASE: TierTable<f64> = TierTable::new([0.15, 0.20, 0.30, 0.15]);

/// Write-ahead cache multiplier over the redo capacity. Also drives purge threads.
pub const GCACHE_LOAD: TierTable<f64> = TierTable::new([1.0, 1.15, 1.2, 1.0]);

/// Share of the leftover-derived message cache actually granted.
pub const GCS_CACHE_FRACTION: TierTable<f64> = TierTable::new([0.40, 0.60, 0.80, 1.00]);

pub const IO_CAPACITY_MAX: TierTable<u64> = TierTable::new([1400, 1800, 2000, 1400]);
pub const SYNC_WAIT: TierTable<u64> = TierTable::new([0, 3, 3, 0]);
pub const ADAPTIVE_HASH_INDEX: TierTable<bool> = TierTable::new([true, true, false, true]);

pub const POLL_SPIN_LOOPS: TierTable<SpinPolicy> = TierTable::new([
    SpinPolicy::Max,
    SpinPolicy::HalfMax,
    SpinPolicy::Min,
    SpinPolicy::Keep,
]);

/// Group-consensus max message size by catalog dimension id; larger tiers keep the default.
pub fn message_size_for_dimension(dimension_id: u32) -> Option<u64> {
    const MIB: u64 = 1_048_576;
    match dimension_id {
        1 => Some(MIB),
        2 => Some(MIB * 2),
        3 => Some(MIB * 4),
        4 => Some(MIB * 6),
        _ => None,
    }
}
