//! Dimension and load-type tables, plus open-dimension interpolation.

use bytesize::ByteSize;
use tracing::debug;

use crate::error::{CalcError, Result};
use crate::types::{Dimension, LoadType, DIMENSION_OPEN};

// ============================================================================
// Constants
// ============================================================================

/// Connection counts advertised to callers.
pub const CONNECTION_TIERS: [u32; 6] = [50, 100, 200, 500, 1000, 2000];

const GIB: f64 = 1_073_741_824.0;

// ============================================================================
// Table
// ============================================================================

/// Immutable registry of cataloged dimensions and load types.
#[derive(Debug, Clone)]
pub struct DimensionTable {
    dimensions: Vec<Dimension>,
    loads: Vec<LoadType>,
}

impl DimensionTable {
    /// Built-in rows, checked so that no service split exceeds its total.
    pub fn builtin() -> Result<Self> {
        let table = Self {
            dimensions: builtin_dimensions(),
            loads: builtin_loads(),
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(CalcError::corrupt("dimension", "no rows"));
        }
        for dim in &self.dimensions {
            if !dim.split_within_totals() {
                return Err(CalcError::corrupt(
                    dim.name.clone(),
                    "service split exceeds dimension totals",
                ));
            }
            if dim.cpu == 0 || dim.memory_bytes <= 0.0 {
                return Err(CalcError::corrupt(dim.name.clone(), "empty dimension"));
            }
        }
        let ascending = self
            .dimensions
            .windows(2)
            .all(|w| w[0].cpu < w[1].cpu && w[0].memory_bytes < w[1].memory_bytes);
        if !ascending {
            return Err(CalcError::corrupt("dimension", "rows are not ascending"));
        }
        Ok(())
    }

    /// Cataloged rows, smallest first. The open sentinel is not included.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn loads(&self) -> &[LoadType] {
        &self.loads
    }

    pub fn dimension(&self, id: u32) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    pub fn load(&self, id: u32) -> Option<&LoadType> {
        self.loads.iter().find(|l| l.id == id)
    }

    /// Placeholder row advertised for the open dimension.
    pub fn open_placeholder() -> Dimension {
        Dimension {
            id: DIMENSION_OPEN,
            name: "Open request".to_string(),
            memory: "0GB".to_string(),
            ..Dimension::default()
        }
    }

    /// Row whose service split is transferred to an open request.
    ///
    /// Requests at or below the smallest row on either axis use that row;
    /// otherwise the lower row of the first bracketing pair wins; anything
    /// beyond the largest row uses the largest row.
    pub fn reference_row(&self, cpu: u32, memory_bytes: f64) -> &Dimension {
        let rows = &self.dimensions;
        let first = &rows[0];
        if cpu <= first.cpu || memory_bytes <= first.memory_bytes {
            return first;
        }
        for pair in rows.windows(2) {
            let (low, high) = (&pair[0], &pair[1]);
            let cpu_between = cpu >= low.cpu && cpu <= high.cpu;
            let mem_between = memory_bytes >= low.memory_bytes && memory_bytes <= high.memory_bytes;
            if cpu_between || mem_between {
                return low;
            }
        }
        &rows[rows.len() - 1]
    }

    /// Builds the ephemeral dimension for an open request by scaling the
    /// reference row's service ratios to the requested totals.
    pub fn open_dimension(&self, cpu: u32, memory_bytes: f64) -> Result<Dimension> {
        if cpu == 0 || memory_bytes <= 0.0 {
            return Err(CalcError::invalid(format!(
                "Open dimension request missing CPU OR Memory value CPU: {cpu}, Memory {memory_bytes}"
            )));
        }
        let reference = self.reference_row(cpu, memory_bytes);
        debug!(
            cpu,
            memory_bytes,
            reference = %reference.name,
            "open dimension: scaling reference split"
        );

        let cpu_share = |part: u32| (f64::from(cpu) * f64::from(part) / f64::from(reference.cpu)) as u32;
        let mem_share = |part: f64| memory_bytes * part / reference.memory_bytes;

        Ok(Dimension {
            id: DIMENSION_OPEN,
            name: "Open request".to_string(),
            cpu,
            memory: format!("{}GB", (memory_bytes / GIB).round() as u64),
            memory_bytes,
            mysql_cpu: cpu_share(reference.mysql_cpu),
            proxy_cpu: cpu_share(reference.proxy_cpu),
            pmm_cpu: cpu_share(reference.pmm_cpu),
            mysql_memory: mem_share(reference.mysql_memory),
            proxy_memory: mem_share(reference.proxy_memory),
            pmm_memory: mem_share(reference.pmm_memory),
        })
    }
}

// ============================================================================
// Memory strings
// ============================================================================

/// Parses a human memory string ("2.5G", "4GB", "512MiB", "1024") into bytes.
/// Every unit is binary, so "4GB" and "4GiB" are the same amount.
pub fn parse_memory(raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    if number.is_empty() {
        return Err(CalcError::invalid(format!("cannot parse memory {raw:?}")));
    }

    let mut unit = unit.trim().to_ascii_uppercase();
    if unit.ends_with('B') {
        unit.pop();
    }
    if unit.ends_with('I') {
        unit.pop();
    }
    let normalized = match unit.as_str() {
        "" => format!("{number} B"),
        "K" | "M" | "G" | "T" | "P" => format!("{number} {unit}iB"),
        _ => return Err(CalcError::invalid(format!("unknown memory unit in {raw:?}"))),
    };

    normalized
        .parse::<ByteSize>()
        .map(|b| b.as_u64() as f64)
        .map_err(|err| CalcError::invalid(format!("cannot parse memory {raw:?}: {err}")))
}

// ============================================================================
// Built-in rows
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn row(
    id: u32,
    name: &str,
    cpu: u32,
    memory: &str,
    memory_bytes: f64,
    mysql_cpu: u32,
    proxy_cpu: u32,
    pmm_cpu: u32,
    mysql_memory: f64,
    proxy_memory: f64,
    pmm_memory: f64,
) -> Dimension {
    Dimension {
        id,
        name: name.to_string(),
        cpu,
        memory: memory.to_string(),
        memory_bytes,
        mysql_cpu,
        proxy_cpu,
        pmm_cpu,
        mysql_memory,
        proxy_memory,
        pmm_memory,
    }
}

fn builtin_dimensions() -> Vec<Dimension> {
    vec![
        row(1, "XSmall", 1000, "2GB", 2147483648.0, 600, 200, 100, 1825361100.0, 214748364.0, 107374182.0),
        row(2, "Small", 2500, "4GB", 4294967296.0, 2000, 350, 150, 3758096384.0, 429496729.0, 107374182.0),
        row(3, "Medium", 4500, "8GB", 8589934592.0, 3800, 500, 200, 7516192768.0, 751619276.0, 322122547.0),
        row(4, "Large", 6500, "16GB", 17179869184.0, 5500, 700, 300, 15032385536.0, 1610612736.0, 536870912.0),
        row(5, "2XLarge", 8500, "32GB", 34359738368.0, 7400, 800, 300, 32212254720.0, 1610612736.0, 536870912.0),
        row(6, "4XLarge", 16000, "64GB", 68719476736.0, 14000, 1500, 500, 66571993088.0, 1610612736.0, 536870912.0),
        row(7, "8XLarge", 32000, "128GB", 137438953472.0, 29000, 2000, 1000, 135291469824.0, 1610612736.0, 536870912.0),
        row(8, "12XLarge", 48000, "192GB", 206158430208.0, 45000, 2000, 1000, 204010946560.0, 1610612736.0, 536870912.0),
        row(9, "16XLarge", 64000, "256GB", 274877906944.0, 60000, 3000, 1000, 271656681472.0, 2147483648.0, 1073741824.0),
        row(10, "24XLarge", 96000, "384GB", 412316860416.0, 90000, 4000, 2000, 408021893120.0, 2684354560.0, 1610612736.0),
    ]
}

fn builtin_loads() -> Vec<LoadType> {
    let load = |id: u32, name: &str, example: &str| LoadType {
        id,
        name: name.to_string(),
        example: example.to_string(),
    };
    vec![
        load(1, "Mainly Reads", "Blogs ~2% Writes 95% Reads"),
        load(2, "Light OLTP", "Shops online  up to 20% Writes "),
        load(3, "Heavy OLTP", "Intense analitics, telephony, gaming. 50/50% Reads and Writes"),
        load(4, "Heavy Writes", "Ingestion, logging, IoT. 70% or more Writes"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_units_are_binary() {
        assert_eq!(parse_memory("4GB").unwrap(), 4294967296.0);
        assert_eq!(parse_memory("4GiB").unwrap(), 4294967296.0);
        assert_eq!(parse_memory("4g").unwrap(), 4294967296.0);
        assert_eq!(parse_memory("512MiB").unwrap(), 536870912.0);
        assert_eq!(parse_memory("2.5G").unwrap(), 2684354560.0);
        assert_eq!(parse_memory("1024").unwrap(), 1024.0);
    }

    #[test]
    fn memory_garbage_rejected() {
        assert!(parse_memory("").is_err());
        assert!(parse_memory("GB").is_err());
        assert!(parse_memory("12 parsecs").is_err());
    }

    #[test]
    fn builtin_rows_validate() {
        let table = DimensionTable::builtin().unwrap();
        assert_eq!(table.dimensions().len(), 10);
        assert_eq!(table.loads().len(), 4);
        assert!(table.dimension(DIMENSION_OPEN).is_none());
    }
}
