//! Connection auto-sizer: linear search for the largest connection count a
//! dimension supports.
//!
//! The search is generic over the attempt so it can be driven by the real
//! derivation or by a stub in tests.

use tracing::{debug, info, warn};

use crate::error::{CalcError, Result};

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// First count tried in auto mode, and the lowest count ever tried.
    pub floor: u32,
    pub step: u32,
    /// Hard cap on derivation attempts for one request.
    pub max_iterations: u32,
    /// Search downwards when an explicit count is over-utilized. On by default.
    pub recalculate_explicit: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            floor: 50,
            step: 10,
            max_iterations: 5000,
            recalculate_explicit: true,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome<T> {
    /// Requested count used as-is, whatever its classification.
    Direct { connections: u32, value: T },
    /// The search moved the count. `original` is 0 in auto mode.
    Recalculated {
        original: u32,
        connections: u32,
        value: T,
    },
    /// Even the floor is over-utilized.
    Infeasible { connections: u32, value: T },
}

impl<T> SearchOutcome<T> {
    pub fn connections(&self) -> u32 {
        match self {
            SearchOutcome::Direct { connections, .. }
            | SearchOutcome::Recalculated { connections, .. }
            | SearchOutcome::Infeasible { connections, .. } => *connections,
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Runs `attempt(connections) -> (value, over_utilized)` until the search settles.
///
/// `requested == 0` climbs from the floor by `step` and keeps the last count
/// that was not over-utilized. An explicit count is used directly unless it
/// is over-utilized and `recalculate_explicit` is set, in which case the count
/// walks down by `step` towards the floor.
pub fn search<T, F>(requested: u32, cfg: &SearchConfig, mut attempt: F) -> Result<SearchOutcome<T>>
where
    F: FnMut(u32) -> Result<(T, bool)>,
{
    let step = cfg.step.max(1);
    let mut iterations = 0u32;
    let mut run = |connections: u32, iterations: &mut u32| -> Result<(T, bool)> {
        if *iterations >= cfg.max_iterations {
            return Err(CalcError::SearchExhausted {
                iterations: *iterations,
                connections,
            });
        }
        *iterations += 1;
        let result = attempt(connections)?;
        debug!(connections, over = result.1, attempt = *iterations, "sizing attempt");
        Ok(result)
    };

    if requested == 0 {
        let mut connections = cfg.floor;
        let (first, over) = run(connections, &mut iterations)?;
        if over {
            warn!(connections, "floor connection count is already over-utilized");
            return Ok(SearchOutcome::Infeasible { connections, value: first });
        }
        let mut best = first;
        loop {
            let next = connections.saturating_add(step);
            let (value, over) = run(next, &mut iterations)?;
            if over {
                break;
            }
            connections = next;
            best = value;
        }
        info!(connections, iterations, "auto-sized connections");
        return Ok(SearchOutcome::Recalculated {
            original: 0,
            connections,
            value: best,
        });
    }

    let (value, over) = run(requested, &mut iterations)?;
    if !over || !cfg.recalculate_explicit {
        return Ok(SearchOutcome::Direct {
            connections: requested,
            value,
        });
    }

    let mut connections = requested;
    let mut value = value;
    loop {
        if connections <= cfg.floor {
            warn!(requested, connections, "no supportable connection count above the floor");
            return Ok(SearchOutcome::Infeasible { connections, value });
        }
        connections = connections.saturating_sub(step).max(cfg.floor);
        let (next, over) = run(connections, &mut iterations)?;
        value = next;
        if !over {
            break;
        }
    }
    info!(requested, connections, iterations, "recalculated connections");
    Ok(SearchOutcome::Recalculated {
        original: requested,
        connections,
        value,
    })
}
