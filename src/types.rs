//! Core type definitions for the streaming engine.
//!
//! This module defines the fundamental identifier and time types used
//! throughout the engine.

/// Engine time in nanoseconds.
///
/// All ticks, alarms and cycle boundaries use the same `Time` representation,
/// giving every node and adapter a unified, monotonically non-decreasing
/// timeline. In simulation mode this is a virtual clock; in real-time mode it
/// tracks wall clock.
pub type Time = u64;

/// A span of engine time in nanoseconds.
pub type Span = u64;

/// Unique identifier for a node in the graph.
///
/// Node ids index into the engine's node table. Dynamically instantiated
/// nodes receive fresh ids past the static range.
pub type NodeId = u32;

/// Unique identifier for an edge (time series) in the graph.
pub type EdgeId = u32;

/// Intra-cycle firing priority of a node.
///
/// Ranks are assigned at graph finalization by longest-path topological
/// numbering; every producer has a strictly smaller rank than its consumers.
pub type Rank = u32;

/// Globally monotonic sequence number used as the scheduler's tie-breaker.
pub type Seq = u64;

/// One nanosecond, the base unit of [`Time`].
pub const NANOS: Span = 1;
/// Nanoseconds per microsecond.
pub const MICROS: Span = 1_000;
/// Nanoseconds per millisecond.
pub const MILLIS: Span = 1_000_000;
/// Nanoseconds per second.
pub const SECONDS: Span = 1_000_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_units() {
        let t: Time = 3 * SECONDS + 500 * MILLIS;
        assert_eq!(t, 3_500_000_000);
        assert_eq!(MICROS * 1000, MILLIS);
        assert_eq!(MILLIS * 1000, SECONDS);
        assert_eq!(NANOS, 1);
    }
}
