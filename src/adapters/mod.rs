//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod sqlite_store;
pub mod csv_candle_adapter;
pub mod paper_execution;
pub mod heuristic_judgment;
pub mod snapshot_writer;
