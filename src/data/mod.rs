//! Data structures for cohort differential abundance analysis.

mod abundance_table;
mod groups;
pub mod io;
mod membership;
mod result;

pub use abundance_table::AbundanceTable;
pub use groups::{Group, GroupColumns, GroupMap};
pub use membership::ModuleSet;
pub use result::{
    format_float, FeatureStatsRow, FeatureStatsTable, ModuleStatsRow, ModuleStatsTable,
    ResultSummary, PVALUE_DECIMALS, STAT_DECIMALS,
};
