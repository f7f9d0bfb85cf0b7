//! Service layer for the monitor.
//!
//! This module contains the business logic for:
//! - Catalog download and extraction (`CatalogExtractor`)
//! - Per-product update probing (`UpdateProber`)

mod catalog;
mod prober;

pub use catalog::{CatalogExtractor, Row, download_catalog, rows_from_xlsx};
pub use prober::{FeedEntry, NO_DATE, NO_LINK, NO_TITLE, ProbeOutcome, UpdateProber, parse_first_item};
