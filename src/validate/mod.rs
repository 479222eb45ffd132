//! Replication checks against external cohorts.

pub mod direction;

pub use direction::{
    direction_match, validate_direction, DirectionConfig, DirectionTable, StatsTable,
};
