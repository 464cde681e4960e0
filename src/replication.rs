//! Engine-variant hooks: replication cache sizing and replication tuning.
//!
//! The variant is picked once per request; the derivation pipeline calls the
//! hooks without branching on the engine type itself.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::debug;

use crate::catalog::{FamilyKind, ProviderParam, GROUP_GALERA, GROUP_GROUP_REPLICATION};
use crate::configurator::{References, Workspace};
use crate::error::Result;
use crate::tiers::{self, SpinPolicy};
use crate::types::DbType;

/// Fixed memory the group-consensus message cache structure costs.
pub const GCS_STRUCTURE_COST: u64 = 50 * 1024 * 1024;

/// Share of the write-ahead cache expected to stay resident.
const GCACHE_RESIDENT_SHARE: f64 = 0.3;

/// Memory multiplier over the granted message cache.
const GCS_FOOTPRINT_MULTIPLIER: i64 = 6;

pub trait ReplicationStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stage 5: size the variant's cache. Returns the memory it needs; the
    /// caller charges it to leftover memory.
    fn size_cache(&self, work: &mut Workspace) -> Result<i64>;

    /// Stage 8: replication parameters.
    fn tune(&self, work: &mut Workspace) -> Result<()>;

    /// Diagnostic lines about the cache.
    fn describe_cache(&self, refs: &References, out: &mut String);
}

pub fn stage_for(db_type: DbType) -> &'static dyn ReplicationStage {
    match db_type {
        DbType::Pxc => &Galera,
        DbType::GroupReplication => &GroupReplication,
    }
}

// ============================================================================
// Multi-primary
// ============================================================================

pub struct Galera;

impl ReplicationStage for Galera {
    fn name(&self) -> &'static str {
        "pxc"
    }

    fn size_cache(&self, work: &mut Workspace) -> Result<i64> {
        let refs = &mut work.refs;
        refs.gcache = (refs.redo_log_dim as f64 * tiers::GCACHE_LOAD.get(work.tier)) as i64;
        let footprint = (refs.gcache as f64 * GCACHE_RESIDENT_SHARE).ceil() as i64;
        debug!(gcache = refs.gcache, footprint, "gcache sized");
        Ok(footprint)
    }

    fn tune(&self, work: &mut Workspace) -> Result<()> {
        let refs = &work.refs;
        scale_provider_options(&mut work.provider, refs.gcache, refs.load_factor);
        let options = provider_options_string(&work.provider);

        let families = &mut work.families;
        let m = FamilyKind::Mysql;
        families.set(m, GROUP_GALERA, "wsrep-provider-options", options)?;
        families.set(m, GROUP_GALERA, "wsrep_sync_wait", tiers::SYNC_WAIT.get(work.tier))?;

        let cores = refs.mysql_cores().floor() as u64;
        families.set(m, GROUP_GALERA, "wsrep_slave_threads", (cores / 2).max(1))?;
        Ok(())
    }

    fn describe_cache(&self, refs: &References, out: &mut String) {
        let _ = writeln!(out, "Gcache mem on disk      = {}", refs.gcache);
        let _ = writeln!(out, "Gcache mem Footprint    = {}", refs.cache_footprint);
        out.push('\n');
    }
}

/// Sets every valued option for the given cache size and load factor.
pub fn scale_provider_options(options: &mut BTreeMap<String, ProviderParam>, gcache: i64, load_factor: f64) {
    for (key, opt) in options.iter_mut() {
        match key.as_str() {
            "gcache.size" => opt.value = gcache,
            "evs.stats_report_period" => opt.value = 1,
            _ if opt.value < 0 => {}
            _ if load_factor > 0.0 => opt.value = (opt.max as f64 * load_factor) as i64,
            _ => opt.value = opt.default,
        }
    }
}

/// `key=value;` pairs in key order.
pub fn provider_options_string(options: &BTreeMap<String, ProviderParam>) -> String {
    options.iter().fold(String::new(), |mut acc, (key, opt)| {
        let _ = write!(acc, "{key}={};", opt.render());
        acc
    })
}

// ============================================================================
// Group consensus
// ============================================================================

pub struct GroupReplication;

const GR_PREFIX: &str = "loose_group_replication_";

fn gr(name: &str) -> String {
    format!("{GR_PREFIX}{name}")
}

impl ReplicationStage for GroupReplication {
    fn name(&self) -> &'static str {
        "group_replication"
    }

    fn size_cache(&self, work: &mut Workspace) -> Result<i64> {
        let refs = &mut work.refs;
        let param = work
            .families
            .param_mut(FamilyKind::Mysql, GROUP_GROUP_REPLICATION, &gr("message_cache_size"))?;

        let share = (refs.memory_leftover.max(0) as u64 / 11).saturating_sub(GCS_STRUCTURE_COST);
        let granted = (share as f64 * tiers::GCS_CACHE_FRACTION.get(work.tier)) as u64;
        let cache = granted.min(param.numeric_default()?).max(param.min);
        param.set(cache);

        refs.gcs_cache = cache as i64;
        let footprint = refs.gcs_cache * GCS_FOOTPRINT_MULTIPLIER;
        debug!(cache, footprint, "message cache sized");
        Ok(footprint)
    }

    fn tune(&self, work: &mut Workspace) -> Result<()> {
        let load_factor = work.refs.load_factor;
        let families = &mut work.families;
        let m = FamilyKind::Mysql;
        let g = GROUP_GROUP_REPLICATION;

        for name in ["member_expel_timeout", "autorejoin_tries"] {
            let param = families.param_mut(m, g, &gr(name))?;
            let scaled = (param.max as f64 * load_factor).ceil() as u64;
            let value = scaled.max(param.numeric_default()?);
            param.set(value);
        }

        let message = families.param_mut(m, g, &gr("communication_max_message_size"))?;
        match tiers::message_size_for_dimension(work.dimension_id) {
            Some(size) => message.set(size),
            None => message.value = message.default.clone(),
        }

        let spin = families.param_mut(m, g, &gr("poll_spin_loops"))?;
        match tiers::POLL_SPIN_LOOPS.get(work.tier) {
            SpinPolicy::Max => spin.set(spin.max),
            SpinPolicy::HalfMax => spin.set(spin.max / 2),
            SpinPolicy::Min => spin.set(spin.min),
            SpinPolicy::Keep => {}
        }
        Ok(())
    }

    fn describe_cache(&self, refs: &References, out: &mut String) {
        let _ = writeln!(out, "GCS cache mem limit      = {}", refs.gcs_cache);
        let _ = writeln!(out, "GCS cache mem possible Footprint    = {}", refs.cache_footprint);
        out.push('\n');
    }
}
