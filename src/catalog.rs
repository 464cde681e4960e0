//! Parameter catalog: every tunable the calculator knows about, grouped by
//! service family and subsystem, with bounds and version windows.
//!
//! The catalog is built once and never mutated. Each calculation takes a
//! deep copy through [`Catalog::families`] and works on that copy.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dimensions::{DimensionTable, CONNECTION_TIERS};
use crate::error::{CalcError, Result};
use crate::types::{DbType, Dimension, LoadType, OutputFormat, Version, VersionWindow};

// ============================================================================
// Constants
// ============================================================================

pub const GROUP_CONNECTION: &str = "configuration_connection";
pub const GROUP_SERVER: &str = "configuration_server";
pub const GROUP_INNODB: &str = "configuration_innodb";
pub const GROUP_REPLICA: &str = "configuration_replica";
pub const GROUP_GALERA: &str = "configuration_galera";
pub const GROUP_GROUP_REPLICATION: &str = "configuration_groupReplication";
pub const GROUP_READINESS: &str = "readinessProbe";
pub const GROUP_LIVENESS: &str = "livenessProbe";
pub const GROUP_RESOURCES: &str = "resources";
pub const GROUP_HAPROXY: &str = "haproxyConfig";

/// Engine versions the calculator advertises.
pub const SUPPORTED_VERSIONS: VersionWindow =
    VersionWindow::new(Version::new(8, 0, 32), Version::new(8, 1, 0));

/// Window carried by every engine configuration parameter.
const CONFIG_WINDOW: VersionWindow =
    VersionWindow::new(Version::new(8, 0, 30), Version::new(8, 1, 0));

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub section: String,
    pub group: String,
    /// Textual value as it lands in the config file.
    pub value: String,
    pub default: String,
    pub min: u64,
    /// Zero means unbounded.
    pub max: u64,
    pub mysqlversions: VersionWindow,
}

impl Parameter {
    pub fn numeric_value(&self) -> Result<u64> {
        parse_number(&self.name, "value", &self.value)
    }

    pub fn numeric_default(&self) -> Result<u64> {
        parse_number(&self.name, "default", &self.default)
    }

    /// Clamps `v` into the parameter's bounds; a zero max is unbounded.
    pub fn bound(&self, v: u64) -> u64 {
        let v = v.max(self.min);
        if self.max == 0 {
            v
        } else {
            v.min(self.max)
        }
    }

    pub fn set(&mut self, value: impl ToString) {
        self.value = value.to_string();
    }
}

fn parse_number(name: &str, field: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| CalcError::corrupt(name, format!("{field} {raw:?} is not numeric")))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupObj {
    pub name: String,
    pub parameters: BTreeMap<String, Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Family {
    pub name: String,
    pub groups: BTreeMap<String, GroupObj>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FamilyKind {
    Mysql,
    Proxy,
    Monitor,
}

impl FamilyKind {
    pub const ALL: [FamilyKind; 3] = [FamilyKind::Mysql, FamilyKind::Proxy, FamilyKind::Monitor];

    pub fn key(&self) -> &'static str {
        match self {
            FamilyKind::Mysql => "mysql",
            FamilyKind::Proxy => "proxy",
            FamilyKind::Monitor => "monitor",
        }
    }
}

/// Per-request working copy of the parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Families(BTreeMap<FamilyKind, Family>);

impl Families {
    pub fn family(&self, kind: FamilyKind) -> Option<&Family> {
        self.0.get(&kind)
    }

    pub fn group(&self, kind: FamilyKind, group: &str) -> Option<&GroupObj> {
        self.0.get(&kind).and_then(|f| f.groups.get(group))
    }

    pub fn param(&self, kind: FamilyKind, group: &str, name: &str) -> Result<&Parameter> {
        self.group(kind, group)
            .and_then(|g| g.parameters.get(name))
            .ok_or_else(|| missing(kind, group, name))
    }

    pub fn param_mut(&mut self, kind: FamilyKind, group: &str, name: &str) -> Result<&mut Parameter> {
        self.0
            .get_mut(&kind)
            .and_then(|f| f.groups.get_mut(group))
            .and_then(|g| g.parameters.get_mut(name))
            .ok_or_else(|| missing(kind, group, name))
    }

    /// Overwrites one parameter value.
    pub fn set(&mut self, kind: FamilyKind, group: &str, name: &str, value: impl ToString) -> Result<()> {
        self.param_mut(kind, group, name)?.set(value);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FamilyKind, &Family)> {
        self.0.iter()
    }

    /// Keeps only parameters for which `keep` returns true.
    pub fn retain_parameters(&mut self, mut keep: impl FnMut(&Parameter) -> bool) {
        for family in self.0.values_mut() {
            for group in family.groups.values_mut() {
                group.parameters.retain(|_, p| keep(p));
            }
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.0
            .values()
            .flat_map(|f| f.groups.values())
            .map(|g| g.parameters.len())
            .sum()
    }

    /// True when no family is present at all (suppressed answer).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

fn missing(kind: FamilyKind, group: &str, name: &str) -> CalcError {
    CalcError::MissingParameter {
        family: kind.key(),
        group: group.to_string(),
        name: name.to_string(),
    }
}

/// One entry of the multi-primary provider option string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderParam {
    pub name: String,
    /// printf-style template; `%s` takes the value.
    pub literal: String,
    /// Negative marks a fixed literal with no value slot.
    pub value: i64,
    pub default: i64,
    pub min: i64,
    pub max: i64,
}

impl ProviderParam {
    pub fn render(&self) -> String {
        if self.value >= 0 {
            self.literal.replace("%s", &self.value.to_string())
        } else {
            self.literal.clone()
        }
    }
}

/// Everything a caller can choose from, for discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Supported {
    pub dbtype: Vec<DbType>,
    pub dimension: Vec<Dimension>,
    pub loadtype: Vec<LoadType>,
    pub connections: Vec<u32>,
    pub output: Vec<OutputFormat>,
    pub mysqlversions: VersionWindow,
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone)]
pub struct Catalog {
    tables: DimensionTable,
    common: Families,
    galera: GroupObj,
    group_replication: GroupObj,
    provider: BTreeMap<String, ProviderParam>,
}

impl Catalog {
    /// Built-in catalog. Fails if any entry violates its own bounds.
    pub fn builtin() -> Result<Self> {
        let catalog = Self {
            tables: DimensionTable::builtin()?,
            common: common_families(),
            galera: galera_group(),
            group_replication: group_replication_group(),
            provider: provider_params(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        let groups = self
            .common
            .iter()
            .flat_map(|(_, f)| f.groups.values())
            .chain([&self.galera, &self.group_replication]);
        for group in groups {
            for (key, p) in &group.parameters {
                if p.max != 0 && p.min > p.max {
                    return Err(CalcError::corrupt(key.clone(), format!("min {} > max {}", p.min, p.max)));
                }
                let w = p.mysqlversions;
                if !w.is_unset() && w.min.to_semver() > w.max.to_semver() {
                    return Err(CalcError::corrupt(key.clone(), "version window is inverted"));
                }
            }
        }
        for (key, p) in &self.provider {
            if p.value >= 0 && !p.literal.contains("%s") {
                return Err(CalcError::corrupt(key.clone(), "valued option has no %s slot"));
            }
            if p.min > p.max {
                return Err(CalcError::corrupt(key.clone(), "min > max"));
            }
        }
        Ok(())
    }

    pub fn tables(&self) -> &DimensionTable {
        &self.tables
    }

    /// Fresh deep copy of the parameter set for one engine variant. Only the
    /// variant's own replication group is present.
    pub fn families(&self, db_type: DbType) -> Families {
        let mut families = self.common.clone();
        let (key, group) = match db_type {
            DbType::Pxc => (GROUP_GALERA, self.galera.clone()),
            DbType::GroupReplication => (GROUP_GROUP_REPLICATION, self.group_replication.clone()),
        };
        if let Some(mysql) = families.0.get_mut(&FamilyKind::Mysql) {
            mysql.groups.insert(key.to_string(), group);
        }
        families
    }

    /// Fresh copy of the provider options, keyed by option name.
    pub fn provider_params(&self) -> BTreeMap<String, ProviderParam> {
        self.provider.clone()
    }

    pub fn supported(&self) -> Supported {
        let mut dimension = self.tables.dimensions().to_vec();
        dimension.push(DimensionTable::open_placeholder());
        Supported {
            dbtype: DbType::ALL.to_vec(),
            dimension,
            loadtype: self.tables.loads().to_vec(),
            connections: CONNECTION_TIERS.to_vec(),
            output: OutputFormat::ALL.to_vec(),
            mysqlversions: SUPPORTED_VERSIONS,
        }
    }
}

// ============================================================================
// Built-in entries
// ============================================================================

fn p(
    name: &str,
    section: &str,
    group: &str,
    value: &str,
    default: &str,
    bounds: (u64, u64),
    window: VersionWindow,
) -> (String, Parameter) {
    (
        name.to_string(),
        Parameter {
            name: name.to_string(),
            section: section.to_string(),
            group: group.to_string(),
            value: value.to_string(),
            default: default.to_string(),
            min: bounds.0,
            max: bounds.1,
            mysqlversions: window,
        },
    )
}

/// Engine configuration parameter.
fn cfg(name: &str, group: &str, value: &str, default: &str, min: u64, max: u64) -> (String, Parameter) {
    p(name, "configuration", group, value, default, (min, max), CONFIG_WINDOW)
}

fn group(name: &str, params: Vec<(String, Parameter)>) -> GroupObj {
    GroupObj {
        name: name.to_string(),
        parameters: params.into_iter().collect(),
    }
}

fn connection_group() -> GroupObj {
    let g = "connection";
    group(
        "connections",
        vec![
            cfg("binlog_cache_size", g, "32768", "32768", 32768, 0),
            cfg("binlog_stmt_cache_size", g, "32768", "32768", 32768, 0),
            cfg("join_buffer_size", g, "262144", "262144", 262144, 0),
            cfg("read_rnd_buffer_size", g, "262144", "262144", 262144, 0),
            cfg("sort_buffer_size", g, "524288", "524288", 524288, 0),
            cfg("max_heap_table_size", g, "16777216", "16777216", 16777216, 0),
            cfg("tmp_table_size", g, "16777216", "16777216", 16777216, 0),
        ],
    )
}

fn server_group() -> GroupObj {
    let g = "server";
    let sql_mode = "'ONLY_FULL_GROUP_BY,STRICT_TRANS_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,\
ERROR_FOR_DIVISION_BY_ZERO,NO_ENGINE_SUBSTITUTION,TRADITIONAL,STRICT_ALL_TABLES'";
    group(
        "server",
        vec![
            cfg("max_connections", g, "50", "2", 2, 65536),
            cfg("thread_pool_size", g, "2", "2", 2, 64),
            cfg("table_definition_cache", g, "4096", "4096", 400, 524288),
            cfg("table_open_cache", g, "4096", "4096", 400, 524288),
            cfg("thread_stack", g, "1048576", "1048576", 131072, 393216),
            cfg("table_open_cache_instances", g, "4", "16", 1, 64),
            cfg("tablespace_definition_cache", g, "512", "256", 256, 524288),
            cfg("sync_binlog", g, "1", "1", 0, 1),
            cfg("sql_mode", g, sql_mode, "0", 0, 1),
            cfg("binlog_expire_logs_seconds", g, "604800", "0", 0, 0),
            cfg("binlog_format", g, "ROW", "0", 0, 0),
            cfg("thread_cache_size", g, "8", "8", 4, 16384),
        ],
    )
}

fn innodb_group() -> GroupObj {
    let g = "innodb";
    group(
        "innodb",
        vec![
            cfg("innodb_adaptive_hash_index", g, "1", "1", 0, 1),
            cfg("innodb_buffer_pool_size", g, "1073741824", "134217728", 5242880, 0),
            cfg("innodb_ddl_threads", g, "2", "4", 1, 64),
            cfg("innodb_buffer_pool_instances", g, "1", "8", 1, 64),
            cfg("innodb_flush_method", g, "O_DIRECT", "O_DIRECT", 0, 0),
            cfg("innodb_flush_log_at_trx_commit", g, "2", "1", 0, 2),
            cfg("innodb_log_file_size", g, "119537664", "50331648", 4194304, 0),
            cfg("innodb_log_files_in_group", g, "2", "2", 2, 100),
            cfg("innodb_page_cleaners", g, "1", "4", 1, 64),
            cfg("innodb_purge_threads", g, "1", "4", 1, 32),
            cfg("innodb_io_capacity_max", g, "1000", "1400", 100, 0),
            cfg("innodb_buffer_pool_chunk_size", g, "2097152", "134217728", 1048576, 0),
            cfg("innodb_parallel_read_threads", g, "1", "4", 1, 256),
            cfg("innodb_monitor_enable", g, "ALL", "ALL", 0, 0),
            cfg("innodb_redo_log_capacity", g, "104857600", "104857600", 8388608, 137438953472),
        ],
    )
}

fn replica_group() -> GroupObj {
    let g = "replication";
    group(
        "replica",
        vec![
            cfg("replica_compressed_protocol", g, "1", "1", 0, 1),
            cfg("replica_exec_mode", g, "STRICT", "STRICT", 0, 0),
            cfg("replica_parallel_type", g, "LOGICAL_CLOCK", "LOGICAL_CLOCK", 0, 0),
            cfg("replica_parallel_workers", g, "4", "4", 0, 1024),
            cfg("replica_preserve_commit_order", g, "ON", "ON", 0, 1),
        ],
    )
}

fn galera_group() -> GroupObj {
    let g = "galera";
    group(
        "galera",
        vec![
            cfg("wsrep_sync_wait", g, "0", "0", 0, 8),
            cfg("wsrep_slave_threads", g, "2", "1", 1, 0),
            cfg("wsrep_trx_fragment_size", g, "1048576", "0", 0, 0),
            cfg("wsrep_trx_fragment_unit", g, "bytes", "bytes", 0, 0),
            cfg("wsrep-provider-options", g, "<placeholder>", "", 0, 0),
        ],
    )
}

fn group_replication_group() -> GroupObj {
    let g = "groupReplication";
    group(
        "groupReplication",
        vec![
            cfg("loose_group_replication_member_expel_timeout", g, "5", "5", 0, 20),
            cfg("loose_group_replication_autorejoin_tries", g, "2", "3", 0, 8),
            cfg("loose_group_replication_message_cache_size", g, "268435456", "1073741824", 134217728, u64::MAX),
            cfg("loose_group_replication_communication_max_message_size", g, "2097152", "10485760", 0, 1073741824),
            cfg("loose_group_replication_unreachable_majority_timeout", g, "3600", "0", 300, 3600),
            cfg("loose_group_replication_poll_spin_loops", g, "0", "0", 10000, 40000),
            cfg("loose_group_replication_paxos_single_leader", g, "ON", "OFF", 0, 1),
            cfg("loose_binlog_transaction_dependency_tracking", g, "WRITESET", "COMMIT_ORDER", 0, 0),
        ],
    )
}

fn probe(group_key: &str, timeout: u64, max: u64) -> GroupObj {
    let t = timeout.to_string();
    group(
        group_key,
        vec![p("timeoutSeconds", "", group_key, &t, &t, (timeout, max), VersionWindow::UNSET)],
    )
}

/// Memory bounds are in GiB, cpu bounds in milli-cores.
fn resources(memory: (u64, u64), cpu: (u64, u64)) -> GroupObj {
    let unset = VersionWindow::UNSET;
    let mem = memory.0.to_string();
    let cpu_default = "1000";
    group(
        GROUP_RESOURCES,
        vec![
            (
                "request_memory".to_string(),
                p("memory", "request", GROUP_RESOURCES, &mem, &mem, memory, unset).1,
            ),
            (
                "limit_memory".to_string(),
                p("memory", "limit", GROUP_RESOURCES, &mem, &mem, memory, unset).1,
            ),
            (
                "request_cpu".to_string(),
                p("cpu", "request", GROUP_RESOURCES, cpu_default, cpu_default, cpu, unset).1,
            ),
            (
                "limit_cpu".to_string(),
                p("cpu", "limit", GROUP_RESOURCES, cpu_default, cpu_default, cpu, unset).1,
            ),
        ],
    )
}

fn haproxy_group() -> GroupObj {
    let unset = VersionWindow::UNSET;
    let h = GROUP_HAPROXY;
    group(
        "haproxy",
        vec![
            p("ha_connection_timeout", "", h, "5", "1000", (1000, 5000), unset),
            p("maxconn", "", h, "4048", "2024", (1000, 5000), unset),
            p("timeout_client", "", h, "28800", "14400", (1000, 50000), unset),
            p("timeout_connect", "", h, "100500", "100500", (1000, 500000), unset),
            p("timeout_server", "", h, "28800", "14400", (1000, 50000), unset),
        ],
    )
}

fn family(name: &str, groups: Vec<GroupObj>, keys: &[&str]) -> Family {
    Family {
        name: name.to_string(),
        groups: keys.iter().map(|k| k.to_string()).zip(groups).collect(),
    }
}

fn common_families() -> Families {
    let mysql = family(
        "mysql",
        vec![
            connection_group(),
            server_group(),
            innodb_group(),
            replica_group(),
            probe(GROUP_READINESS, 15, 600),
            probe(GROUP_LIVENESS, 5, 600),
            resources((2, 32), (1000, 8500)),
        ],
        &[
            GROUP_CONNECTION,
            GROUP_SERVER,
            GROUP_INNODB,
            GROUP_REPLICA,
            GROUP_READINESS,
            GROUP_LIVENESS,
            GROUP_RESOURCES,
        ],
    );
    let proxy = family(
        "haproxy",
        vec![
            probe(GROUP_READINESS, 5, 30),
            probe(GROUP_LIVENESS, 5, 60),
            haproxy_group(),
            resources((1, 2), (1000, 2000)),
        ],
        &[GROUP_READINESS, GROUP_LIVENESS, GROUP_HAPROXY, GROUP_RESOURCES],
    );
    let monitor = family(
        "pmm",
        vec![
            probe(GROUP_READINESS, 5, 30),
            probe(GROUP_LIVENESS, 5, 60),
            resources((1, 2), (100, 2000)),
        ],
        &[GROUP_READINESS, GROUP_LIVENESS, GROUP_RESOURCES],
    );

    Families(BTreeMap::from([
        (FamilyKind::Mysql, mysql),
        (FamilyKind::Proxy, proxy),
        (FamilyKind::Monitor, monitor),
    ]))
}

fn provider_params() -> BTreeMap<String, ProviderParam> {
    let opt = |name: &str, literal: &str, value: i64, default: i64, min: i64, max: i64| {
        (
            name.to_string(),
            ProviderParam {
                name: name.to_string(),
                literal: literal.to_string(),
                value,
                default,
                min,
                max,
            },
        )
    };
    BTreeMap::from([
        opt("pc.recovery", "true", -1, 0, 0, 0),
        opt("gcache.size", "%s", 0, 0, 0, 0),
        opt("gcache.recover", "yes", -1, 0, 0, 0),
        opt("evs.delayed_keep_period", "PT%sS", 0, 30, 30, 60),
        opt("evs.delay_margin", "PT%sS", 0, 1, 1, 30),
        opt("evs.send_window", "%s", 0, 4, 4, 1024),
        opt("evs.user_send_window", "%s", 0, 2, 2, 1024),
        opt("evs.inactive_check_period", "PT%sS", 0, 1, 1, 5),
        opt("evs.inactive_timeout", "PT%sS", 0, 15, 15, 120),
        opt("evs.join_retrans_period", "PT%sS", 0, 1, 1, 5),
        opt("evs.suspect_timeout", "PT%sS", 0, 5, 5, 60),
        opt("evs.stats_report_period", "PT%sM", 0, 1, 1, 1),
        opt("gcs.fc_limit", "%s", 0, 16, 16, 128),
        opt("gcs.max_packet_size", "%s", 0, 32616, 32616, 131072),
        opt("gmcast.peer_timeout", "PT%sS", 0, 3, 3, 15),
        opt("gmcast.time_wait", "PT%sS", 0, 5, 5, 18),
        opt("evs.max_install_timeouts", "%s", 0, 1, 1, 5),
        opt("pc.announce_timeout", "PT%sS", 0, 3, 3, 60),
        opt("pc.linger", "PT%sS", 0, 2, 2, 60),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_literal_substitution() {
        let params = provider_params();
        let mut keep = params["evs.delayed_keep_period"].clone();
        keep.value = 45;
        assert_eq!(keep.render(), "PT45S");
        assert_eq!(params["pc.recovery"].render(), "true");
    }

    #[test]
    fn resources_keyed_by_section() {
        let g = resources((2, 32), (1000, 8500));
        assert_eq!(g.parameters["limit_cpu"].section, "limit");
        assert_eq!(g.parameters["request_memory"].name, "memory");
    }
}
