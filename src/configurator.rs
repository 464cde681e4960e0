//! Derivation engine.
//!
//! A [`Configurator`] owns one request, a private copy of the catalog's
//! parameters and the [`References`] scratch state. Stages run in a fixed
//! order because each one reads what the previous one wrote:
//!
//! 1. init (overload guard, load factor)
//! 2. connection buffers
//! 3. connection weight check (early exit)
//! 4. redo log
//! 5. replication cache (variant hook; early exit when it does not fit)
//! 6. buffer pool and storage engine threads
//! 7. server parameters
//! 8. replication parameters (variant hook)
//! 9. probes and resources
//!
//! The version filter runs last, including after an early exit.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::catalog::{
    Catalog, Families, FamilyKind, ProviderParam, GROUP_CONNECTION, GROUP_INNODB, GROUP_LIVENESS,
    GROUP_READINESS, GROUP_RESOURCES, GROUP_SERVER,
};
use crate::classify::{self, Evaluation};
use crate::error::{CalcError, Result};
use crate::replication::{self, ReplicationStage};
use crate::tiers::{self, LoadTier};
use crate::types::{ConfigurationRequest, MessageKind, ResponseMessage};
use crate::version_filter;

// ============================================================================
// Constants
// ============================================================================

/// Milli-cores of engine CPU one connection is assumed to need.
pub const CPU_PER_CONNECTION_UNIT: u32 = 4;

/// Explicit connection counts below this are raised to it.
pub const MIN_CONNECTIONS: u32 = 50;

/// Share of engine memory the connection buffers may take before derivation stops.
pub const CONNECTION_WEIGHT_LIMIT: f64 = 0.40;

/// Rule-of-thumb buffer pool share of engine memory, used to size the redo log.
const IDEAL_BUFFER_POOL_SHARE: f64 = 0.65;

/// Share of leftover memory granted to the buffer pool.
const BUFFER_POOL_SHARE: f64 = 0.95;

/// Resource requests are this share of the allocation; limits are all of it.
const REQUEST_SHARE: f64 = 0.95;

const MAX_PURGE_THREADS: u64 = 32;

const GIB: i64 = 1024 * 1024 * 1024;

// ============================================================================
// Working state
// ============================================================================

/// Intermediate quantities of one derivation. Discarded with the configurator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct References {
    /// Dimension totals.
    pub memory: f64,
    pub cpus: u32,

    pub cpus_mysql: f64,
    pub cpus_proxy: f64,
    pub cpus_pmm: f64,
    pub memory_mysql: f64,
    pub memory_proxy: f64,
    pub memory_pmm: f64,

    /// Connections after the minimum floor.
    pub connections: u32,
    /// Connection ceiling the engine CPU can carry.
    pub load_adjustment_max: u32,
    /// Share of the connection ceiling in use, in [0, 1).
    pub load_factor: f64,

    pub tmp_table_footprint: i64,
    pub conn_buffers_mem_tot: i64,
    pub memory_leftover: i64,
    pub ideal_buffer_pool_dim: i64,

    pub redo_log_dim: i64,
    pub redo_log_files: u64,

    /// Write-ahead cache (multi-primary).
    pub gcache: i64,
    /// Message cache (group-consensus).
    pub gcs_cache: i64,
    /// Memory charged for whichever replication cache the variant sized.
    pub cache_footprint: i64,

    pub buffer_pool_size: i64,
    pub buffer_pool_instances: u64,
    pub purge_threads: u64,
}

impl References {
    pub fn mysql_cores(&self) -> f64 {
        self.cpus_mysql / 1000.0
    }

    pub fn connection_weight(&self) -> f64 {
        if self.memory_mysql <= 0.0 {
            return f64::INFINITY;
        }
        self.conn_buffers_mem_tot as f64 / self.memory_mysql
    }
}

/// State the variant hooks read and write.
#[derive(Debug)]
pub struct Workspace {
    pub refs: References,
    pub families: Families,
    pub provider: BTreeMap<String, ProviderParam>,
    pub tier: LoadTier,
    pub dimension_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Initialized,
    Overloaded,
    Processed,
    Evaluated,
}

// ============================================================================
// Configurator
// ============================================================================

pub struct Configurator {
    request: ConfigurationRequest,
    variant: &'static dyn ReplicationStage,
    work: Workspace,
    stage: Stage,
}

impl std::fmt::Debug for Configurator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configurator")
            .field("request", &self.request)
            .field("variant", &self.variant.name())
            .field("work", &self.work)
            .field("stage", &self.stage)
            .finish()
    }
}

impl Configurator {
    /// Stage 1. Builds the working state and applies the connection/CPU guard.
    pub fn init(catalog: &Catalog, request: ConfigurationRequest) -> Result<Self> {
        let tier = LoadTier::from_id(request.loadtype.id)?;
        let dim = &request.dimension;

        let mut connections = request.connections;
        if connections != 0 && connections < MIN_CONNECTIONS {
            connections = MIN_CONNECTIONS;
        }

        let mut refs = References {
            memory: dim.memory_bytes,
            cpus: dim.cpu,
            cpus_mysql: f64::from(dim.mysql_cpu),
            cpus_proxy: f64::from(dim.proxy_cpu),
            cpus_pmm: f64::from(dim.pmm_cpu),
            memory_mysql: dim.mysql_memory,
            memory_proxy: dim.proxy_memory,
            memory_pmm: dim.pmm_memory,
            connections,
            ..References::default()
        };

        refs.load_adjustment_max = dim.mysql_cpu / CPU_PER_CONNECTION_UNIT;
        let load_connection_factor = if refs.load_adjustment_max == 0 {
            f64::INFINITY
        } else {
            f64::from(connections) / f64::from(refs.load_adjustment_max)
        };

        let stage = if load_connection_factor >= 1.0 {
            warn!(
                connections,
                ceiling = refs.load_adjustment_max,
                dimension = %dim.name,
                "too many connections for the engine CPU"
            );
            Stage::Overloaded
        } else {
            refs.load_factor = load_connection_factor;
            refs.ideal_buffer_pool_dim = (refs.memory_mysql * IDEAL_BUFFER_POOL_SHARE) as i64;
            Stage::Initialized
        };

        let work = Workspace {
            refs,
            families: catalog.families(request.dbtype),
            provider: catalog.provider_params(),
            tier,
            dimension_id: dim.id,
        };

        Ok(Self {
            variant: replication::stage_for(request.dbtype),
            request,
            work,
            stage,
        })
    }

    /// The guard's verdict, if init already decided the request is overloaded.
    pub fn overload_message(&self) -> Option<ResponseMessage> {
        (self.stage == Stage::Overloaded).then(|| ResponseMessage {
            kind: MessageKind::OverUtilizing,
            name: "Resources Overload".to_string(),
            text: "Too many connections for the chose dimension. Resource Overload, \
                   decrease number of connections OR choose higher CPUs value"
                .to_string(),
        })
    }

    pub fn is_overloaded(&self) -> bool {
        self.stage == Stage::Overloaded
    }

    /// Stages 2 to 9, then the version filter.
    pub fn process_request(&mut self) -> Result<&Families> {
        match self.stage {
            Stage::Initialized => {}
            Stage::Overloaded => return Err(CalcError::OutOfOrder("request is overloaded")),
            Stage::Processed | Stage::Evaluated => {
                return Err(CalcError::OutOfOrder("request already processed"))
            }
        }

        self.connection_buffers()?;

        let weight = self.work.refs.connection_weight();
        if weight >= CONNECTION_WEIGHT_LIMIT {
            warn!(
                weight,
                limit = CONNECTION_WEIGHT_LIMIT,
                "connection buffers exceed memory share; skipping derivation"
            );
        } else {
            self.redo_log()?;
            if self.replication_cache()? {
                self.innodb_parameters()?;
                self.server_parameters()?;
                self.variant.tune(&mut self.work)?;
                for kind in FamilyKind::ALL {
                    self.probes_and_resources(kind)?;
                }
            }
        }

        version_filter::filter_by_version(&mut self.work.families, self.request.mysqlversion);
        self.stage = Stage::Processed;
        Ok(&self.work.families)
    }

    /// Classifies the derived state. An over-utilized result empties the
    /// parameter set.
    pub fn evaluate_resources(&mut self) -> Result<Evaluation> {
        if self.stage != Stage::Processed {
            return Err(CalcError::OutOfOrder("evaluate before process"));
        }
        let evaluation = classify::evaluate(&self.work.refs, self.request.dbtype);
        if evaluation.over_utilizing {
            self.work.families.clear();
        }
        self.stage = Stage::Evaluated;
        Ok(evaluation)
    }

    pub fn references(&self) -> &References {
        &self.work.refs
    }

    pub fn families(&self) -> &Families {
        &self.work.families
    }

    pub fn into_families(self) -> Families {
        self.work.families
    }

    // ------------------------------------------------------------------------
    // Stage 2: connection buffers
    // ------------------------------------------------------------------------

    fn connection_buffers(&mut self) -> Result<()> {
        let tier = self.work.tier;
        let families = &mut self.work.families;
        let m = FamilyKind::Mysql;

        families.set(m, GROUP_CONNECTION, "binlog_cache_size", tiers::BINLOG_CACHE.get(tier))?;
        families.set(m, GROUP_CONNECTION, "binlog_stmt_cache_size", tiers::BINLOG_CACHE.get(tier))?;
        families.set(m, GROUP_CONNECTION, "join_buffer_size", tiers::JOIN_BUFFER.get(tier))?;
        families.set(m, GROUP_CONNECTION, "read_rnd_buffer_size", tiers::READ_RND_BUFFER.get(tier))?;
        families.set(m, GROUP_CONNECTION, "sort_buffer_size", tiers::SORT_BUFFER.get(tier))?;

        let tmp_table_size = families.param(m, GROUP_CONNECTION, "tmp_table_size")?.numeric_value()?;
        let tmp_footprint = (tmp_table_size as f64 * tiers::TMP_TABLE_FRACTION.get(tier)) as i64;

        let mut per_connection: i64 = 0;
        if let Some(group) = families.group(m, GROUP_CONNECTION) {
            for (key, param) in &group.parameters {
                if key == "tmp_table_size" || key == "max_heap_table_size" {
                    continue;
                }
                per_connection += param.numeric_value()? as i64;
            }
        }

        let refs = &mut self.work.refs;
        let active = f64::from(refs.connections) * refs.load_factor;
        refs.tmp_table_footprint = tmp_footprint;
        refs.conn_buffers_mem_tot =
            per_connection * (active as i64) + (active.floor() as i64) * tmp_footprint;
        refs.memory_leftover = refs.memory_mysql as i64 - refs.conn_buffers_mem_tot;

        debug!(
            per_connection,
            active,
            total = refs.conn_buffers_mem_tot,
            leftover = refs.memory_leftover,
            "connection buffers sized"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Stage 4: redo log
    // ------------------------------------------------------------------------

    fn redo_log(&mut self) -> Result<()> {
        let tier = self.work.tier;
        let refs = &mut self.work.refs;
        let base = tiers::REDO_LOG_BASE.get(tier);
        refs.redo_log_dim =
            (refs.ideal_buffer_pool_dim as f64 * (base + base * refs.load_factor)) as i64;

        let families = &mut self.work.families;
        let m = FamilyKind::Mysql;
        families.set(m, GROUP_INNODB, "innodb_redo_log_capacity", refs.redo_log_dim)?;

        let files = redo_log_files(refs.redo_log_dim, tier);
        refs.redo_log_files = files;
        families.set(m, GROUP_INNODB, "innodb_log_files_in_group", files)?;
        families.set(m, GROUP_INNODB, "innodb_log_file_size", refs.redo_log_dim / files as i64)?;

        debug!(redo = refs.redo_log_dim, files, "redo log sized");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Stage 5: replication cache
    // ------------------------------------------------------------------------

    /// Charges the variant's cache to leftover memory. Returns false, charging
    /// nothing, when the cache does not fit; the empty buffer pool then
    /// classifies as over-utilized.
    fn replication_cache(&mut self) -> Result<bool> {
        let footprint = self.variant.size_cache(&mut self.work)?;
        let refs = &mut self.work.refs;
        if footprint > refs.memory_leftover {
            warn!(
                footprint,
                leftover = refs.memory_leftover,
                variant = self.variant.name(),
                "replication cache does not fit; skipping derivation"
            );
            return Ok(false);
        }
        refs.cache_footprint = footprint;
        refs.memory_leftover -= footprint;
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Stage 6: buffer pool and storage engine threads
    // ------------------------------------------------------------------------

    fn innodb_parameters(&mut self) -> Result<()> {
        let tier = self.work.tier;
        let refs = &mut self.work.refs;
        let families = &mut self.work.families;
        let m = FamilyKind::Mysql;

        let adaptive = if tiers::ADAPTIVE_HASH_INDEX.get(tier) { "True" } else { "False" };
        families.set(m, GROUP_INNODB, "innodb_adaptive_hash_index", adaptive)?;

        refs.buffer_pool_size = (refs.memory_leftover.max(0) as f64 * BUFFER_POOL_SHARE).floor() as i64;
        refs.memory_leftover -= refs.buffer_pool_size;
        families.set(m, GROUP_INNODB, "innodb_buffer_pool_size", refs.buffer_pool_size)?;

        let cores = refs.mysql_cores();
        let instances_param = families.param(m, GROUP_INNODB, "innodb_buffer_pool_instances")?;
        let instances = if refs.cpus > 2000 {
            instances_param.bound(buffer_pool_instances(refs.buffer_pool_size, cores))
        } else {
            1
        };
        refs.buffer_pool_instances = instances;
        families.set(m, GROUP_INNODB, "innodb_buffer_pool_instances", instances)?;
        families.set(m, GROUP_INNODB, "innodb_page_cleaners", instances)?;

        let purge = if cores > 4.0 {
            (cores * tiers::GCACHE_LOAD.get(tier)).ceil() as u64
        } else {
            4
        };
        refs.purge_threads = purge.min(MAX_PURGE_THREADS);
        families.set(m, GROUP_INNODB, "innodb_purge_threads", refs.purge_threads)?;

        families.set(m, GROUP_INNODB, "innodb_io_capacity_max", tiers::IO_CAPACITY_MAX.get(tier))?;

        let read_threads = if cores > 2.0 && cores < 256.0 { cores.floor() as u64 } else { 1 };
        families.set(m, GROUP_INNODB, "innodb_parallel_read_threads", read_threads)?;

        debug!(
            buffer_pool = refs.buffer_pool_size,
            instances,
            purge = refs.purge_threads,
            leftover = refs.memory_leftover,
            "buffer pool sized"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Stage 7: server
    // ------------------------------------------------------------------------

    fn server_parameters(&mut self) -> Result<()> {
        let refs = &self.work.refs;
        let families = &mut self.work.families;
        let m = FamilyKind::Mysql;

        let max_connections = u64::from(refs.connections) + 2;
        families.set(m, GROUP_SERVER, "max_connections", max_connections)?;

        let cores = refs.mysql_cores();
        let pool = if cores > 2.0 && cores <= 256.0 { cores.floor() as u64 * 2 } else { 4 };
        families.set(m, GROUP_SERVER, "thread_pool_size", pool)?;

        // default of 16 fragments memory badly
        families.set(m, GROUP_SERVER, "table_open_cache_instances", 4)?;

        let cache_max = families.param(m, GROUP_SERVER, "thread_cache_size")?.max;
        families.set(m, GROUP_SERVER, "thread_cache_size", (max_connections / 50 + 8).min(cache_max))?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Stage 9: probes and resources
    // ------------------------------------------------------------------------

    fn probes_and_resources(&mut self, kind: FamilyKind) -> Result<()> {
        let refs = &self.work.refs;
        let (cpu, memory) = match kind {
            FamilyKind::Mysql => (refs.cpus_mysql, refs.memory_mysql),
            FamilyKind::Proxy => (refs.cpus_proxy, refs.memory_proxy),
            FamilyKind::Monitor => (refs.cpus_pmm, refs.memory_pmm),
        };
        let load_factor = refs.load_factor;
        let families = &mut self.work.families;

        families.set(kind, GROUP_RESOURCES, "request_memory", format!("{:.0}", memory * REQUEST_SHARE))?;
        families.set(kind, GROUP_RESOURCES, "limit_memory", format!("{memory:.0}"))?;
        families.set(kind, GROUP_RESOURCES, "request_cpu", format!("{:.0}m", cpu * REQUEST_SHARE))?;
        families.set(kind, GROUP_RESOURCES, "limit_cpu", format!("{cpu:.0}m"))?;

        for group in [GROUP_READINESS, GROUP_LIVENESS] {
            let probe = families.param_mut(kind, group, "timeoutSeconds")?;
            let timeout = scaled_timeout(probe.min, probe.max, load_factor);
            probe.set(timeout);
        }
        Ok(())
    }
}

// ============================================================================
// Formulas
// ============================================================================

/// Redo log file count from the total redo size (bytes).
pub fn redo_log_files(redo_bytes: i64, tier: LoadTier) -> u64 {
    let mb = (redo_bytes.max(0) as f64 / 1024.0 / 1024.0).ceil() as u64;
    let reduce = |n: u64| {
        if tier == LoadTier::MostlyReads {
            (n as f64 * 0.7).floor() as u64
        } else {
            n
        }
    };
    match mb {
        0..=499 => 2,
        500..=1000 => reduce(3),
        1001..=2000 => reduce(5),
        2001..=4000 => reduce(8),
        _ => mb / 400,
    }
}

/// Buffer pool instances from whole GiB of pool per engine core.
pub fn buffer_pool_instances(buffer_pool_bytes: i64, cores: f64) -> u64 {
    if cores <= 0.0 {
        return 1;
    }
    let pool_gb = (buffer_pool_bytes.max(0) / GIB) as f64;
    let factor = pool_gb / cores;
    if factor > 1.0 {
        (cores * 2.0) as u64
    } else if factor > 0.4 {
        cores as u64
    } else {
        (cores / 2.0).ceil() as u64
    }
}

/// `ceil(max * load_factor)`, never below `min`.
pub fn scaled_timeout(min: u64, max: u64, load_factor: f64) -> u64 {
    ((max as f64 * load_factor).ceil() as u64).max(min)
}
