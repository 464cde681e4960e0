//! Tests for version-window filtering.

use dbcalc::catalog::{
    Catalog, FamilyKind, GROUP_CONNECTION, GROUP_GALERA, GROUP_HAPROXY, GROUP_INNODB,
    GROUP_LIVENESS, GROUP_READINESS, GROUP_RESOURCES, GROUP_SERVER,
};
use dbcalc::types::{DbType, Version};
use dbcalc::version_filter::{filter_by_version, filtered};

fn group_len(families: &dbcalc::catalog::Families, kind: FamilyKind, group: &str) -> usize {
    families.group(kind, group).map_or(0, |g| g.parameters.len())
}

#[test]
fn test_supported_version_keeps_everything() {
    let families = Catalog::builtin().unwrap().families(DbType::Pxc);
    let kept = filtered(&families, Version::new(8, 0, 33));
    assert_eq!(kept, families);
}

#[test]
fn test_window_bounds_are_inclusive() {
    let families = Catalog::builtin().unwrap().families(DbType::Pxc);
    assert_eq!(filtered(&families, Version::new(8, 0, 30)), families);
    assert_eq!(filtered(&families, Version::new(8, 1, 0)), families);
    assert_ne!(filtered(&families, Version::new(8, 0, 29)), families);
}

#[test]
fn test_newer_version_drops_configuration_only() {
    let mut families = Catalog::builtin().unwrap().families(DbType::Pxc);
    filter_by_version(&mut families, Version::new(8, 2, 0));

    let m = FamilyKind::Mysql;
    for group in [GROUP_CONNECTION, GROUP_SERVER, GROUP_INNODB, GROUP_GALERA] {
        assert_eq!(group_len(&families, m, group), 0, "{group} kept parameters");
    }
    assert_eq!(group_len(&families, m, GROUP_READINESS), 1);
    assert_eq!(group_len(&families, m, GROUP_LIVENESS), 1);
    assert_eq!(group_len(&families, m, GROUP_RESOURCES), 4);
    assert_eq!(group_len(&families, FamilyKind::Proxy, GROUP_HAPROXY), 5);
}

#[test]
fn test_filtered_leaves_input_untouched() {
    let families = Catalog::builtin().unwrap().families(DbType::GroupReplication);
    let before = families.parameter_count();
    let out = filtered(&families, Version::new(5, 7, 44));
    assert_eq!(families.parameter_count(), before);
    assert!(out.parameter_count() < before);
}

#[test]
fn test_filter_is_idempotent() {
    let families = Catalog::builtin().unwrap().families(DbType::Pxc);
    let v = Version::new(9, 0, 1);
    let once = filtered(&families, v);
    assert_eq!(filtered(&once, v), once);
}
