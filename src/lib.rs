//! Inventory-to-order workflow for cannabis retailers running on a COVA
//! point-of-sale backend.
//!
//! The pipeline pulls a trailing window of daily inventory-on-hand
//! snapshots, derives stock-cycle analytics per SKU and location, layers in
//! two sales windows and the current inventory position, reconciles the
//! result against a vendor order form, and writes a multi-sheet order
//! workbook.

pub mod clients;
pub mod columns;
pub mod config;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod reports;
pub mod services;
