#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident aggregation and population joining.
//!
//! [`Accumulator`] performs the two-level grouping (subtype counts per
//! spatial key, rolled up into category counts) with a merge operation
//! that makes the result independent of input ordering and chunking. The
//! [`join`] module attaches population and computes normalized rates in
//! the two structurally distinct directions the system needs: event-driven
//! for hex cells and catalog-driven for municipalities.
//!
//! The three-way count reconciliation invariant
//! (`total == sum(categories) == sum(subtypes)`) holds by construction:
//! category counts and totals are only ever derived from the subtype
//! groups, never tracked separately.

pub mod accumulator;
pub mod join;

pub use accumulator::{Accumulator, Diagnostics, RawAggregate};
pub use join::{ReliabilityThresholds, join_catalog, join_cells, rate_per_10000};
