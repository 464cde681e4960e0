//! Property tests for the sizing pipeline.

use std::cell::Cell;

use dbcalc::autosize::{self, SearchConfig};
use dbcalc::calculator::Calculator;
use dbcalc::catalog::Catalog;
use dbcalc::configurator::{Configurator, CONNECTION_WEIGHT_LIMIT};
use dbcalc::dimensions::DimensionTable;
use dbcalc::resolver::resolve;
use dbcalc::types::{
    CalculationRequest, DbType, DimensionRequest, LoadTypeRequest, Version, DIMENSION_OPEN,
};
use dbcalc::version_filter::filtered;
use proptest::prelude::*;

fn request(dbtype: DbType, dimension: u32, load: u32, connections: u32) -> CalculationRequest {
    CalculationRequest {
        dbtype: dbtype.as_str().to_string(),
        dimension: DimensionRequest {
            id: dimension,
            ..DimensionRequest::default()
        },
        loadtype: LoadTypeRequest { id: load },
        connections,
        output: None,
        mysqlversion: Some(Version::new(8, 0, 33)),
    }
}

fn open_request(dbtype: DbType, cpu: u32, memory_mib: u32, load: u32, connections: u32) -> CalculationRequest {
    CalculationRequest {
        dimension: DimensionRequest {
            id: DIMENSION_OPEN,
            cpu,
            memory: Some(format!("{memory_mib}MiB")),
            memory_bytes: 0.0,
        },
        ..request(dbtype, DIMENSION_OPEN, load, connections)
    }
}

/// Every derivation that gets past the guard stays inside engine memory.
fn check_fits_engine_memory(req: &CalculationRequest) -> Result<(), TestCaseError> {
    let catalog = Catalog::builtin().unwrap();
    let mut c = Configurator::init(&catalog, resolve(req, &catalog).unwrap()).unwrap();
    if c.is_overloaded() {
        return Ok(());
    }
    c.process_request().unwrap();
    let refs = c.references().clone();
    let evaluation = c.evaluate_resources().unwrap();

    if refs.connection_weight() >= CONNECTION_WEIGHT_LIMIT {
        // stopped right after the connection buffers
        prop_assert!(evaluation.over_utilizing);
        prop_assert_eq!(refs.buffer_pool_size + refs.cache_footprint, 0);
        return Ok(());
    }
    let used = refs.buffer_pool_size + refs.conn_buffers_mem_tot + refs.cache_footprint;
    prop_assert!(
        used as f64 <= refs.memory_mysql,
        "used {} > engine {} (bp {}, conn {}, cache {})",
        used,
        refs.memory_mysql,
        refs.buffer_pool_size,
        refs.conn_buffers_mem_tot,
        refs.cache_footprint
    );
    prop_assert!(refs.memory_leftover >= 0);
    Ok(())
}

fn db_type() -> impl Strategy<Value = DbType> {
    prop_oneof![Just(DbType::Pxc), Just(DbType::GroupReplication)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn calculation_is_deterministic(
        dbtype in db_type(),
        dimension in 1u32..=10,
        load in 1u32..=4,
        connections in 50u32..3000,
    ) {
        let calc = Calculator::builtin().unwrap();
        let req = request(dbtype, dimension, load, connections);
        prop_assert_eq!(calc.calculate(&req).unwrap(), calc.calculate(&req).unwrap());
    }

    #[test]
    fn usable_results_fit_engine_memory(
        dbtype in db_type(),
        dimension in 1u32..=10,
        load in 1u32..=4,
        connections in 50u32..3000,
    ) {
        check_fits_engine_memory(&request(dbtype, dimension, load, connections))?;
    }

    #[test]
    fn open_results_fit_engine_memory(
        dbtype in db_type(),
        cpu in 500u32..8000,
        memory_mib in 256u32..4096,
        load in 1u32..=4,
        connections in 50u32..1500,
    ) {
        check_fits_engine_memory(&open_request(dbtype, cpu, memory_mib, load, connections))?;
    }

    #[test]
    fn engine_cpu_grows_with_requested_cpu(
        cpu in 1u32..200_000,
        extra in 1u32..10_000,
        memory_gib in 1u32..512,
    ) {
        let table = DimensionTable::builtin().unwrap();
        let memory = f64::from(memory_gib) * 1_073_741_824.0;
        let low = table.open_dimension(cpu, memory).unwrap();
        let high = table.open_dimension(cpu + extra, memory).unwrap();
        prop_assert!(low.mysql_cpu <= high.mysql_cpu);
    }

    #[test]
    fn version_filter_is_idempotent(
        dbtype in db_type(),
        major in 5u64..10,
        minor in 0u64..3,
        patch in 0u64..50,
    ) {
        let families = Catalog::builtin().unwrap().families(dbtype);
        let v = Version::new(major, minor, patch);
        let once = filtered(&families, v);
        prop_assert_eq!(filtered(&once, v), once);
    }

    #[test]
    fn auto_search_converges(
        dbtype in db_type(),
        dimension in 1u32..=10,
        load in 1u32..=4,
    ) {
        let calc = Calculator::builtin().unwrap();
        let resolved = resolve(&request(dbtype, dimension, load, 0), calc.catalog()).unwrap();
        let attempts = Cell::new(0u32);
        let outcome = autosize::search(0, &SearchConfig::default(), |connections| {
            attempts.set(attempts.get() + 1);
            calc.attempt(&resolved, connections)
        })
        .unwrap();
        let bound = resolved.dimension.mysql_cpu / 4 / 10 + 2;
        prop_assert!(attempts.get() <= bound, "{} attempts > {}", attempts.get(), bound);
        prop_assert!(outcome.connections() < resolved.dimension.mysql_cpu / 4);
    }
}
