//! Row filtering for raw abundance tables.

pub mod stratified;

pub use stratified::{
    export_levels, filter_rows, RowFilter, RowFilterReport, RowSelection, TaxonomicLevel,
};
