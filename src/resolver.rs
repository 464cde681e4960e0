//! Request resolver: turns a decoded wire request into a fully resolved
//! [`ConfigurationRequest`], or rejects it before any derivation runs.

use tracing::debug;

use crate::catalog::Catalog;
use crate::dimensions::parse_memory;
use crate::error::{CalcError, Result};
use crate::types::{CalculationRequest, ConfigurationRequest, DbType, OutputFormat, DIMENSION_OPEN};

pub fn resolve(request: &CalculationRequest, catalog: &Catalog) -> Result<ConfigurationRequest> {
    let dim_id = request.dimension.id;
    let load_id = request.loadtype.id;
    if dim_id == 0 || load_id == 0 {
        return Err(CalcError::invalid(format!(
            "Dimension ID: {dim_id}; LoadType ID: {load_id}"
        )));
    }

    let dbtype: DbType = request.dbtype.parse()?;

    let mysqlversion = request
        .mysqlversion
        .filter(|v| v.is_set())
        .ok_or_else(|| CalcError::invalid("MySQL version is required"))?;

    let output = match request.output.as_deref() {
        Some(raw) => raw.parse::<OutputFormat>()?,
        None => OutputFormat::default(),
    };

    let tables = catalog.tables();
    let dimension = if dim_id == DIMENSION_OPEN {
        let memory_bytes = open_memory_bytes(request)?;
        tables.open_dimension(request.dimension.cpu, memory_bytes)?
    } else {
        tables
            .dimension(dim_id)
            .cloned()
            .ok_or_else(|| CalcError::invalid(format!("unknown Dimension ID: {dim_id}")))?
    };

    let loadtype = tables
        .load(load_id)
        .cloned()
        .ok_or_else(|| CalcError::invalid(format!("unknown LoadType ID: {load_id}")))?;

    debug!(
        dbtype = %dbtype,
        dimension = %dimension.name,
        load = %loadtype.name,
        connections = request.connections,
        version = %mysqlversion,
        "request resolved"
    );

    Ok(ConfigurationRequest {
        dbtype,
        dimension,
        loadtype,
        connections: request.connections,
        output,
        mysqlversion,
    })
}

/// Explicit byte count wins; otherwise the human memory string is parsed.
fn open_memory_bytes(request: &CalculationRequest) -> Result<f64> {
    let dim = &request.dimension;
    if dim.memory_bytes > 0.0 {
        return Ok(dim.memory_bytes);
    }
    match dim.memory.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_memory(raw),
        _ => Ok(0.0),
    }
}
