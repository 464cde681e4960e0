//! Drops parameters whose version window does not admit the requested engine version.

use tracing::debug;

use crate::catalog::Families;
use crate::types::Version;

/// Removes every parameter outside its window. Parameters with an unset
/// window are always kept.
pub fn filter_by_version(families: &mut Families, version: Version) {
    let before = families.parameter_count();
    families.retain_parameters(|p| p.mysqlversions.admits(version));
    let dropped = before - families.parameter_count();
    if dropped > 0 {
        debug!(%version, dropped, "parameters outside version window removed");
    }
}

/// Filtered copy, leaving the input untouched.
pub fn filtered(families: &Families, version: Version) -> Families {
    let mut out = families.clone();
    filter_by_version(&mut out, version);
    out
}
