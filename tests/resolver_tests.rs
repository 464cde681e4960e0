//! Tests for request resolution.

use dbcalc::catalog::Catalog;
use dbcalc::resolver::resolve;
use dbcalc::types::{
    CalculationRequest, DbType, DimensionRequest, LoadTypeRequest, OutputFormat, Version,
    DIMENSION_OPEN,
};

fn request(dbtype: &str, dimension: u32, load: u32) -> CalculationRequest {
    CalculationRequest {
        dbtype: dbtype.to_string(),
        dimension: DimensionRequest {
            id: dimension,
            ..DimensionRequest::default()
        },
        loadtype: LoadTypeRequest { id: load },
        connections: 100,
        output: None,
        mysqlversion: Some(Version::new(8, 0, 33)),
    }
}

fn error_text(req: &CalculationRequest) -> String {
    let err = resolve(req, &Catalog::builtin().unwrap()).unwrap_err();
    assert!(err.is_user_error(), "{err} should be a caller error");
    err.to_string()
}

#[test]
fn test_resolves_catalog_row() {
    let resolved = resolve(&request("pxc", 2, 3), &Catalog::builtin().unwrap()).unwrap();
    assert_eq!(resolved.dbtype, DbType::Pxc);
    assert_eq!(resolved.dimension.name, "Small");
    assert_eq!(resolved.dimension.mysql_cpu, 2000);
    assert_eq!(resolved.loadtype.name, "Heavy OLTP");
    assert_eq!(resolved.connections, 100);
    assert_eq!(resolved.output, OutputFormat::Human);
    assert_eq!(resolved.mysqlversion, Version::new(8, 0, 33));
}

#[test]
fn test_output_is_parsed() {
    let mut req = request("group_replication", 1, 1);
    req.output = Some("json".to_string());
    let resolved = resolve(&req, &Catalog::builtin().unwrap()).unwrap();
    assert_eq!(resolved.output, OutputFormat::Json);
    assert_eq!(resolved.dbtype, DbType::GroupReplication);
}

#[test]
fn test_zero_ids_rejected() {
    let text = error_text(&request("pxc", 0, 1));
    assert!(text.contains("Dimension ID: 0; LoadType ID: 1"), "{text}");
    let text = error_text(&request("pxc", 2, 0));
    assert!(text.contains("LoadType ID: 0"), "{text}");
}

#[test]
fn test_unknown_dbtype_rejected() {
    let text = error_text(&request("galera", 2, 1));
    assert!(text.contains("Supported types are: group_replication, pxc"), "{text}");
}

#[test]
fn test_missing_version_rejected() {
    let mut req = request("pxc", 2, 1);
    req.mysqlversion = None;
    assert!(error_text(&req).contains("MySQL version is required"));

    req.mysqlversion = Some(Version::default());
    assert!(error_text(&req).contains("MySQL version is required"));
}

#[test]
fn test_unknown_output_rejected() {
    let mut req = request("pxc", 2, 1);
    req.output = Some("yaml".to_string());
    assert!(error_text(&req).contains("yaml"));
}

#[test]
fn test_unknown_ids_rejected() {
    assert!(error_text(&request("pxc", 42, 1)).contains("unknown Dimension ID: 42"));
    assert!(error_text(&request("pxc", 2, 7)).contains("unknown LoadType ID: 7"));
}

#[test]
fn test_open_dimension_from_memory_string() {
    let mut req = request("pxc", DIMENSION_OPEN, 1);
    req.dimension.cpu = 3000;
    req.dimension.memory = Some("6GiB".to_string());
    let resolved = resolve(&req, &Catalog::builtin().unwrap()).unwrap();
    assert_eq!(resolved.dimension.id, DIMENSION_OPEN);
    assert_eq!(resolved.dimension.memory, "6GB");
    assert!(resolved.dimension.split_within_totals());
}

#[test]
fn test_open_dimension_without_memory_rejected() {
    let mut req = request("pxc", DIMENSION_OPEN, 1);
    req.dimension.cpu = 3000;
    assert!(error_text(&req).contains("Open dimension request missing CPU OR Memory"));
}

#[test]
fn test_wire_request_decodes() {
    let body = r#"{
        "dbtype": "pxc",
        "dimension": {"id": 999, "cpu": 4000, "memory": "8G"},
        "loadtype": {"id": 2},
        "connections": 200,
        "mysqlversion": {"major": 8, "minor": 0, "patch": 33}
    }"#;
    let req: CalculationRequest = serde_json::from_str(body).unwrap();
    let resolved = resolve(&req, &Catalog::builtin().unwrap()).unwrap();
    assert_eq!(resolved.dimension.cpu, 4000);
    assert_eq!(resolved.dimension.memory_bytes, 8.0 * 1_073_741_824.0);
    assert_eq!(resolved.loadtype.id, 2);
}
