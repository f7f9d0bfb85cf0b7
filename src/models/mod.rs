// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod product;

// Re-export all public types
pub use config::{CatalogConfig, Config, FeedConfig, HttpConfig, MonitorConfig};
pub use product::{Product, UpdateItem};

/// Products matched for one monitored substance, in catalog row order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubstanceMatches {
    pub substance: String,
    pub products: Vec<Product>,
}

/// Products grouped by substance, in monitored-substance order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogMatches {
    pub groups: Vec<SubstanceMatches>,
}

impl CatalogMatches {
    /// Total number of matched products across all substances.
    pub fn product_count(&self) -> usize {
        self.groups.iter().map(|g| g.products.len()).sum()
    }

    /// Products matched for `substance`, if it is monitored.
    pub fn get(&self, substance: &str) -> Option<&[Product]> {
        self.groups
            .iter()
            .find(|g| g.substance == substance)
            .map(|g| g.products.as_slice())
    }

    /// All products in substance order, then row order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.groups.iter().flat_map(|g| g.products.iter())
    }
}
