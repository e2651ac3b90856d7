//! Shared utilities for the longitudinal survey analysis crates.

pub mod cells;

pub use cells::{
    MISSING_TOKENS, NumericCell, cell_text, format_numeric, is_missing_token, numeric_cell,
};
