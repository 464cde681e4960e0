//! Tests for dimension tables and open-dimension interpolation.

use dbcalc::dimensions::{parse_memory, DimensionTable, CONNECTION_TIERS};
use dbcalc::types::DIMENSION_OPEN;

const GIB: f64 = 1_073_741_824.0;

fn table() -> DimensionTable {
    DimensionTable::builtin().unwrap()
}

#[test]
fn test_catalog_rows_fit_their_totals() {
    for dim in table().dimensions() {
        assert!(dim.split_within_totals(), "{} overflows", dim.name);
    }
}

#[test]
fn test_four_xlarge_is_64_gib() {
    let t = table();
    let dim = t.dimension(6).unwrap();
    assert_eq!(dim.name, "4XLarge");
    assert_eq!(dim.memory_bytes, 64.0 * GIB);
}

#[test]
fn test_load_names() {
    let t = table();
    let names: Vec<_> = t.loads().iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, ["Mainly Reads", "Light OLTP", "Heavy OLTP", "Heavy Writes"]);
}

#[test]
fn test_connection_tiers_ascending() {
    assert!(CONNECTION_TIERS.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(CONNECTION_TIERS[0], 50);
}

// ============================================================================
// Reference row
// ============================================================================

#[test]
fn test_reference_below_smallest_uses_first_row() {
    let t = table();
    assert_eq!(t.reference_row(500, 64.0 * GIB).name, "XSmall");
    assert_eq!(t.reference_row(64_000, GIB).name, "XSmall");
}

#[test]
fn test_reference_between_rows_uses_lower() {
    let t = table();
    assert_eq!(t.reference_row(3000, 6.0 * GIB).name, "Small");
    assert_eq!(t.reference_row(5000, 12.0 * GIB).name, "Medium");
}

#[test]
fn test_reference_on_boundary_uses_lower_pair() {
    let t = table();
    assert_eq!(t.reference_row(2500, 4.0 * GIB).name, "XSmall");
}

#[test]
fn test_reference_beyond_largest_uses_last_row() {
    let t = table();
    assert_eq!(t.reference_row(200_000, 1024.0 * GIB).name, "24XLarge");
}

// ============================================================================
// Open dimension
// ============================================================================

#[test]
fn test_open_dimension_scales_reference_split() {
    let dim = table().open_dimension(5000, 12.0 * GIB).unwrap();
    assert_eq!(dim.id, DIMENSION_OPEN);
    assert_eq!(dim.name, "Open request");
    assert_eq!(dim.memory, "12GB");
    assert_eq!(dim.cpu, 5000);
    // Medium: 3800 of 4500 milli-cores to the engine
    assert_eq!(dim.mysql_cpu, 4222);
    assert!((dim.mysql_memory - 12.0 * GIB * 0.875).abs() < 1.0);
    assert!(dim.split_within_totals());
}

#[test]
fn test_open_dimension_requires_both_resources() {
    let t = table();
    let err = t.open_dimension(0, 4.0 * GIB).unwrap_err();
    assert!(err.is_user_error());
    assert!(err.to_string().contains("missing CPU OR Memory"));
    assert!(t.open_dimension(4000, 0.0).is_err());
}

// ============================================================================
// Memory strings
// ============================================================================

#[test]
fn test_parse_memory_binary_units() {
    assert_eq!(parse_memory("8GB").unwrap(), 8.0 * GIB);
    assert_eq!(parse_memory(" 8 GiB ").unwrap(), 8.0 * GIB);
    assert_eq!(parse_memory("1T").unwrap(), 1024.0 * GIB);
    assert_eq!(parse_memory("256K").unwrap(), 262_144.0);
}

#[test]
fn test_parse_memory_rejects_unknown_unit() {
    let err = parse_memory("3 furlongs").unwrap_err();
    assert!(err.is_user_error());
}
