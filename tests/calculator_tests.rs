//! Tests for the calculation facade and the connection search it drives.

use dbcalc::autosize::SearchConfig;
use dbcalc::calculator::Calculator;
use dbcalc::catalog::{Catalog, FamilyKind, GROUP_SERVER};
use dbcalc::types::{CalculationRequest, DimensionRequest, LoadTypeRequest, MessageKind, Version};

fn request(dbtype: &str, dimension: u32, load: u32, connections: u32) -> CalculationRequest {
    CalculationRequest {
        dbtype: dbtype.to_string(),
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

fn calculator() -> Calculator {
    Calculator::builtin().unwrap()
}

fn max_connections(answer: &dbcalc::catalog::Families) -> String {
    answer
        .param(FamilyKind::Mysql, GROUP_SERVER, "max_connections")
        .unwrap()
        .value
        .clone()
}

// ============================================================================
// Explicit counts
// ============================================================================

#[test]
fn test_explicit_ok() {
    let calc = calculator().calculate(&request("pxc", 2, 1, 50)).unwrap();
    assert_eq!(calc.message.kind, MessageKind::Ok);
    assert!(calc.message.text.starts_with("Request ok, resources details: "));
    assert!(calc.message.text.contains("Gcache mem on disk      = 403055837"));
    assert_eq!(calc.incoming.connections, 50);
    assert_eq!(calc.answer.iter().count(), 3);
}

#[test]
fn test_explicit_close_to_limit() {
    let calc = calculator()
        .calculate(&request("group_replication", 1, 1, 50))
        .unwrap();
    assert_eq!(calc.message.kind, MessageKind::CloseToLimit);
    assert!(calc.message.text.starts_with("Request processed however not optimal details: "));
    assert!(calc.message.text.contains("GCS cache mem limit"));
}

#[test]
fn test_explicit_overload_recalculated_by_default() {
    let calc = calculator().calculate(&request("pxc", 2, 1, 600)).unwrap();
    assert_eq!(calc.message.kind, MessageKind::ConnectionRecalculated);
    assert_eq!(calc.message.kind.code(), 4001);
    assert_eq!(calc.incoming.connections, 490);
    assert!(calc.message.text.contains("Original: 600 New Value 490"));
    assert_eq!(max_connections(&calc.answer), "492");
}

#[test]
fn test_explicit_overload_answered_as_is_when_disabled() {
    let search = SearchConfig {
        recalculate_explicit: false,
        ..SearchConfig::default()
    };
    let calc = Calculator::new(Catalog::builtin().unwrap(), search);
    let calc = calc.calculate(&request("pxc", 2, 1, 600)).unwrap();
    assert_eq!(calc.message.kind, MessageKind::OverUtilizing);
    assert_eq!(calc.message.name, "Resources Overload");
    assert_eq!(calc.incoming.connections, 600);
    assert!(calc.answer.is_empty());
}

// ============================================================================
// Auto mode
// ============================================================================

#[test]
fn test_auto_small_pxc() {
    let calc = calculator().calculate(&request("pxc", 2, 1, 0)).unwrap();
    assert_eq!(calc.message.kind, MessageKind::ConnectionRecalculated);
    assert_eq!(calc.message.kind.code(), 4001);
    assert_eq!(calc.incoming.connections, 490);
    assert!(calc
        .message
        .text
        .contains("Original: 0 (auto, seeded at 50) New Value 490 plus additional 2"));
    assert_eq!(max_connections(&calc.answer), "492");
}

#[test]
fn test_auto_medium_pxc() {
    let calc = calculator().calculate(&request("pxc", 3, 1, 0)).unwrap();
    assert_eq!(calc.incoming.connections, 940);
}

#[test]
fn test_auto_respects_iteration_cap() {
    let search = SearchConfig {
        max_iterations: 3,
        ..SearchConfig::default()
    };
    let calc = Calculator::new(Catalog::builtin().unwrap(), search);
    let err = calc.calculate(&request("pxc", 2, 1, 0)).unwrap_err();
    assert_eq!(err.code(), "SEARCH_EXHAUSTED");
    assert!(!err.is_user_error());
}

#[test]
fn test_auto_on_largest_row_fits_default_cap() {
    let calc = calculator().calculate(&request("pxc", 10, 1, 0)).unwrap();
    assert_eq!(calc.message.kind, MessageKind::ConnectionRecalculated);
    assert!(calc.incoming.connections > 2000);
}

// ============================================================================
// Misc
// ============================================================================

#[test]
fn test_user_errors_propagate() {
    let err = calculator().calculate(&request("mariadb", 2, 1, 50)).unwrap_err();
    assert!(err.is_user_error());
    assert_eq!(err.code(), "INVALID_REQUEST");
}

#[test]
fn test_attempt_reports_over_flag() {
    let c = calculator();
    let resolved = dbcalc::resolver::resolve(&request("pxc", 2, 1, 0), c.catalog()).unwrap();
    let (_, over) = c.attempt(&resolved, 100).unwrap();
    assert!(!over);
    let (calc, over) = c.attempt(&resolved, 500).unwrap();
    assert!(over);
    assert_eq!(calc.incoming.connections, 500);
}

#[test]
fn test_repeat_calculation_is_identical() {
    let c = calculator();
    let req = request("group_replication", 5, 3, 300);
    assert_eq!(c.calculate(&req).unwrap(), c.calculate(&req).unwrap());
}
