use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::CalcError;

/// Sentinel dimension id for a request sized from raw CPU/memory.
pub const DIMENSION_OPEN: u32 = 999;

// ============================================================================
// Engine version
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// A zero major marks "no version given".
    pub fn is_set(&self) -> bool {
        self.major > 0
    }

    pub fn to_semver(self) -> semver::Version {
        semver::Version::new(self.major, self.minor, self.patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = semver::Version::parse(s.trim())
            .map_err(|err| CalcError::invalid(format!("bad MySQL version {s:?}: {err}")))?;
        Ok(Self::new(v.major, v.minor, v.patch))
    }
}

/// Inclusive engine-version window a parameter applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionWindow {
    pub min: Version,
    pub max: Version,
}

impl VersionWindow {
    pub const UNSET: VersionWindow = VersionWindow {
        min: Version::new(0, 0, 0),
        max: Version::new(0, 0, 0),
    };

    pub const fn new(min: Version, max: Version) -> Self {
        Self { min, max }
    }

    pub fn is_unset(&self) -> bool {
        !self.min.is_set()
    }

    /// Unset windows admit every version.
    pub fn admits(&self, version: Version) -> bool {
        if self.is_unset() {
            return true;
        }
        let v = version.to_semver();
        v >= self.min.to_semver() && v <= self.max.to_semver()
    }
}

// ============================================================================
// Engine variant and output format
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbType {
    /// Multi-primary synchronous replication (Galera).
    #[serde(rename = "pxc")]
    Pxc,
    /// Single-primary group-consensus replication.
    #[serde(rename = "group_replication")]
    GroupReplication,
}

impl DbType {
    pub const ALL: [DbType; 2] = [DbType::GroupReplication, DbType::Pxc];

    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Pxc => "pxc",
            DbType::GroupReplication => "group_replication",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbType {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pxc" => Ok(DbType::Pxc),
            "group_replication" => Ok(DbType::GroupReplication),
            other => Err(CalcError::invalid(format!(
                "DB Type {other:?} is not correct. Supported types are: group_replication, pxc"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Human, OutputFormat::Json];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(CalcError::invalid(format!("unknown output format {other:?}"))),
        }
    }
}

// ============================================================================
// Catalog rows
// ============================================================================

/// A named CPU/memory envelope, pre-split across engine, proxy and monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: u32,
    pub name: String,
    /// Total CPU in milli-cores.
    pub cpu: u32,
    /// Human label for the memory total ("4GB").
    pub memory: String,
    #[serde(rename = "MemoryBytes")]
    pub memory_bytes: f64,
    #[serde(rename = "mysqlCpu")]
    pub mysql_cpu: u32,
    #[serde(rename = "proxyCpu")]
    pub proxy_cpu: u32,
    #[serde(rename = "pmmCpu")]
    pub pmm_cpu: u32,
    #[serde(rename = "mysqlMemory")]
    pub mysql_memory: f64,
    #[serde(rename = "proxyMemory")]
    pub proxy_memory: f64,
    #[serde(rename = "pmmMemory")]
    pub pmm_memory: f64,
}

impl Dimension {
    /// Service splits never exceed the totals.
    pub fn split_within_totals(&self) -> bool {
        let cpu = u64::from(self.mysql_cpu) + u64::from(self.proxy_cpu) + u64::from(self.pmm_cpu);
        let mem = self.mysql_memory + self.proxy_memory + self.pmm_memory;
        cpu <= u64::from(self.cpu) && mem <= self.memory_bytes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadType {
    pub id: u32,
    pub name: String,
    pub example: String,
}

// ============================================================================
// Requests
// ============================================================================

/// Dimension as it arrives on the wire: only the id is required, raw
/// resources matter for the open dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionRequest {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub cpu: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(rename = "MemoryBytes", default)]
    pub memory_bytes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadTypeRequest {
    #[serde(default)]
    pub id: u32,
}

/// Raw incoming request, decoded but not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    #[serde(default)]
    pub dbtype: String,
    #[serde(default)]
    pub dimension: DimensionRequest,
    #[serde(default)]
    pub loadtype: LoadTypeRequest,
    /// Zero asks for the largest supportable count.
    #[serde(default)]
    pub connections: u32,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub mysqlversion: Option<Version>,
}

/// Validated request: every reference resolved to a full catalog row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationRequest {
    pub dbtype: DbType,
    pub dimension: Dimension,
    pub loadtype: LoadType,
    pub connections: u32,
    pub output: OutputFormat,
    pub mysqlversion: Version,
}

// ============================================================================
// Response message
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Ok,
    CloseToLimit,
    OverUtilizing,
    ConnectionRecalculated,
    ErrorExec,
}

impl MessageKind {
    pub fn code(&self) -> u32 {
        match self {
            MessageKind::Ok => 1001,
            MessageKind::CloseToLimit => 2001,
            MessageKind::OverUtilizing => 3001,
            MessageKind::ConnectionRecalculated => 4001,
            MessageKind::ErrorExec => 5001,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MessageKind::Ok => {
                "Execution was successful and resources match the possible requests"
            }
            MessageKind::CloseToLimit => {
                "Execution was successful however resources are close to saturation based on the load requested"
            }
            MessageKind::OverUtilizing => "Resources not enough to cover the requested load ",
            MessageKind::ConnectionRecalculated => {
                "Execution was successful, the number of connections was recalculated to fit the resources"
            }
            MessageKind::ErrorExec => "There is an error while processing. See details: ",
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub name: String,
    pub text: String,
}

impl ResponseMessage {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.label().to_string(),
            text: text.into(),
        }
    }

    pub fn invalid_request(detail: &str) -> Self {
        Self {
            kind: MessageKind::ErrorExec,
            name: "Invalid incoming request".to_string(),
            text: format!("{}{}", MessageKind::ErrorExec.label(), detail),
        }
    }
}
