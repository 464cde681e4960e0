//! Feasibility classifier: the buffer pool's share of the dimension's total
//! memory decides whether a derivation is usable.

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::configurator::References;
use crate::replication;
use crate::types::{DbType, MessageKind, ResponseMessage};

/// Above this share the result is comfortably sized.
pub const COMFORT_CEILING: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ok,
    CloseToLimit,
    OverUtilizing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub message: ResponseMessage,
    pub over_utilizing: bool,
    pub ratio: f64,
}

/// Lowest acceptable buffer pool share. Group consensus pays for its message
/// cache, so it is allowed a lower floor.
pub fn floor_for(db_type: DbType) -> f64 {
    match db_type {
        DbType::Pxc => 0.45,
        DbType::GroupReplication => 0.34,
    }
}

/// Buffer pool over total memory, not the engine's share of it.
pub fn buffer_pool_ratio(refs: &References) -> f64 {
    if refs.memory <= 0.0 {
        return 0.0;
    }
    refs.buffer_pool_size as f64 / refs.memory
}

pub fn classify_ratio(ratio: f64, db_type: DbType) -> Verdict {
    if ratio < floor_for(db_type) {
        Verdict::OverUtilizing
    } else if ratio <= COMFORT_CEILING {
        Verdict::CloseToLimit
    } else {
        Verdict::Ok
    }
}

/// Dump of the intermediate quantities, attached to every verdict.
pub fn diagnostics(refs: &References, db_type: DbType) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "\n\nTot Memory Bytes    = {:.0}", refs.memory);
    let _ = writeln!(b, "Tot CPU                 = {}", refs.cpus);
    let _ = writeln!(b, "Tot Connections         = {}", refs.connections);
    b.push('\n');
    let _ = writeln!(b, "memory assign to mysql Bytes   = {:.0}", refs.memory_mysql);
    let _ = writeln!(b, "memory assign to Proxy Bytes   = {:.0}", refs.memory_proxy);
    let _ = writeln!(b, "memory assign to Monitor Bytes = {:.0}", refs.memory_pmm);
    let _ = writeln!(b, "cpus assign to mysql  = {:.0}", refs.cpus_mysql);
    let _ = writeln!(b, "cpus assign to Proxy  = {:.0}", refs.cpus_proxy);
    let _ = writeln!(b, "cpus assign to Monitor= {:.0}", refs.cpus_pmm);
    b.push('\n');
    replication::stage_for(db_type).describe_cache(refs, &mut b);
    let _ = writeln!(b, "Tmp Table mem Footprint = {}", refs.tmp_table_footprint);
    let _ = writeln!(b, "By connection mem tot   = {}", refs.conn_buffers_mem_tot);
    b.push('\n');
    let _ = writeln!(b, "Innodb Bufferpool       = {}", refs.buffer_pool_size);
    let _ = writeln!(b, "% BP over av memory     = {:.2}", buffer_pool_ratio(refs));
    b.push('\n');
    let _ = writeln!(b, "memory leftover         = {}", refs.memory_leftover);
    b.push('\n');
    b
}

pub fn evaluate(refs: &References, db_type: DbType) -> Evaluation {
    let ratio = buffer_pool_ratio(refs);
    let verdict = classify_ratio(ratio, db_type);
    let details = diagnostics(refs, db_type);

    let (kind, prefix) = match verdict {
        Verdict::OverUtilizing => (
            MessageKind::OverUtilizing,
            "Request cancelled not enough resources details: ",
        ),
        Verdict::CloseToLimit => (
            MessageKind::CloseToLimit,
            "Request processed however not optimal details: ",
        ),
        Verdict::Ok => (MessageKind::Ok, "Request ok, resources details: "),
    };

    if verdict == Verdict::OverUtilizing {
        warn!(ratio, connections = refs.connections, "over-utilized");
    } else {
        info!(ratio, connections = refs.connections, verdict = ?verdict, "classified");
    }

    Evaluation {
        message: ResponseMessage::new(kind, format!("{prefix}{details}")),
        over_utilizing: verdict == Verdict::OverUtilizing,
        ratio,
    }
}
