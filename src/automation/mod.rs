//! Automation for the slot game.
//!
//! This module provides:
//! - The browser play sequence (`run_play`)
//! - CSV result output for scored screenshots

pub mod csv_writer;
pub mod runner;

pub use csv_writer::{append_to_csv, init_csv};
pub use runner::{PlayOutcome, run_play};
