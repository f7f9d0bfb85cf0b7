//! Catalog products and the update items probed for them.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::utils::date::parse_pub_date;

/// A catalog row matched to one monitored substance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Medicine name as listed in the catalog
    pub name: String,

    /// The monitored substance this row matched
    pub substance: String,

    /// Product page on the regulator's site
    pub source_url: String,
}

/// The latest syndication entry found for a product.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItem {
    pub substance: String,
    pub product: String,
    pub title: String,

    /// Date text exactly as the source feed wrote it
    pub raw_date: String,

    /// `raw_date` parsed, if any supported format matched
    pub parsed_timestamp: Option<DateTime<FixedOffset>>,

    pub link: String,
    pub description: String,

    /// Unique identifier; the link unless the source supplied one
    pub id: String,
}

impl UpdateItem {
    /// Build an item for `product`, parsing the date and defaulting the id to the link.
    pub fn new(
        product: &Product,
        title: impl Into<String>,
        raw_date: impl Into<String>,
        link: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let raw_date = raw_date.into();
        let link = link.into();
        Self {
            substance: product.substance.clone(),
            product: product.name.clone(),
            title: title.into(),
            parsed_timestamp: parse_pub_date(&raw_date),
            raw_date,
            id: link.clone(),
            link,
            description: description.into(),
        }
    }

    /// Change-detection key: two items are the same update iff signatures match.
    pub fn signature(&self) -> String {
        format!("{}_{}", self.raw_date, self.title)
    }

    /// Identifier for the output feed's guid.
    pub fn guid(&self) -> &str {
        if self.id.is_empty() { &self.link } else { &self.id }
    }

    /// Format for console display.
    pub fn summary_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.substance.to_uppercase(),
            self.product,
            self.title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ozempx() -> Product {
        Product {
            name: "OzempX".to_string(),
            substance: "semaglutide".to_string(),
            source_url: "https://ema/ozempx".to_string(),
        }
    }

    #[test]
    fn test_signature_combines_date_and_title() {
        let item = UpdateItem::new(
            &ozempx(),
            "Label update",
            "Tue, 30 Sep 2025 13:49:00 +0200",
            "https://ema/ozempx/1",
            "",
        );
        assert_eq!(
            item.signature(),
            "Tue, 30 Sep 2025 13:49:00 +0200_Label update"
        );
        assert!(item.parsed_timestamp.is_some());
    }

    #[test]
    fn test_id_defaults_to_link() {
        let item = UpdateItem::new(&ozempx(), "t", "No Date", "https://ema/x", "");
        assert_eq!(item.id, "https://ema/x");
        assert_eq!(item.guid(), "https://ema/x");
        assert!(item.parsed_timestamp.is_none());
    }

    #[test]
    fn test_summary_line() {
        let item = UpdateItem::new(&ozempx(), "Label update", "", "", "");
        assert_eq!(item.summary_line(), "[SEMAGLUTIDE] OzempX: Label update");
    }
}
