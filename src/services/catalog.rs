// src/services/catalog.rs

//! Catalog download and extraction.
//!
//! The regulator publishes its medicine list as a single workbook. The header
//! row sits somewhere near the top, and its column titles drift between
//! releases, so required columns are found by substring match rather than by
//! position.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use crate::error::{AppError, Result};
use crate::models::{CatalogMatches, Config, Product, SubstanceMatches};
use crate::utils::http::{Fetch, get_bytes_with_retry};

/// One catalog row, every cell rendered as text.
pub type Row = Vec<String>;

/// Marker that identifies the header row.
const HEADER_MARKER: &str = "active substance";

/// Logical columns the extractor needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Substance,
    Url,
}

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Name => "medicine name",
            Field::Substance => "active substance",
            Field::Url => "medicine URL",
        }
    }
}

fn is_name_header(h: &str) -> bool {
    h.contains("name") && h.contains("medicine")
}

fn is_substance_header(h: &str) -> bool {
    h.contains(HEADER_MARKER)
}

fn is_url_header(h: &str) -> bool {
    h.contains("url") && h.contains("medicine")
}

/// Header predicates, checked in order; a column belongs to the first field it matches.
const SCHEMA: [(Field, fn(&str) -> bool); 3] = [
    (Field::Name, is_name_header),
    (Field::Substance, is_substance_header),
    (Field::Url, is_url_header),
];

/// Resolved column indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    name: usize,
    substance: usize,
    url: usize,
}

impl Columns {
    /// Resolve the schema against a header row. The first matching column wins.
    fn resolve(header: &[String]) -> Result<Self> {
        let mut found: [Option<usize>; 3] = [None; 3];

        for (idx, cell) in header.iter().enumerate() {
            let title = cell.trim().to_lowercase();
            if title.is_empty() {
                continue;
            }
            if let Some(slot) = SCHEMA.iter().position(|(_, matches)| matches(&title)) {
                found[slot].get_or_insert(idx);
            }
        }

        let missing: Vec<&str> = SCHEMA
            .iter()
            .zip(found.iter())
            .filter(|(_, idx)| idx.is_none())
            .map(|((field, _), _)| field.label())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::catalog_format(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        match found {
            [Some(name), Some(substance), Some(url)] => Ok(Self {
                name,
                substance,
                url,
            }),
            _ => Err(AppError::catalog_format("column resolution failed")),
        }
    }

    fn span(&self) -> usize {
        self.name.max(self.substance).max(self.url) + 1
    }
}

/// Narrows a catalog to the monitored substances.
#[derive(Debug, Clone)]
pub struct CatalogExtractor {
    substances: Vec<String>,
    header_scan_rows: usize,
}

impl CatalogExtractor {
    pub fn new(substances: Vec<String>, header_scan_rows: usize) -> Self {
        let substances = substances
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            substances,
            header_scan_rows,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.substances(), config.catalog.header_scan_rows)
    }

    /// Group matching catalog rows by monitored substance.
    ///
    /// A row is emitted once for every monitored substance contained in its
    /// active-substance cell, so combination products appear under each.
    pub fn extract(&self, rows: &[Row]) -> Result<CatalogMatches> {
        let header_idx = rows
            .iter()
            .take(self.header_scan_rows)
            .position(|row| {
                row.iter()
                    .any(|cell| cell.to_lowercase().contains(HEADER_MARKER))
            })
            .ok_or_else(|| {
                AppError::catalog_format(format!(
                    "no header row within the first {} rows",
                    self.header_scan_rows
                ))
            })?;

        let columns = Columns::resolve(&rows[header_idx])?;
        log::debug!(
            "Catalog header at row {}: name={}, substance={}, url={}",
            header_idx + 1,
            columns.name,
            columns.substance,
            columns.url
        );

        let needles: Vec<String> = self.substances.iter().map(|s| s.to_lowercase()).collect();
        let mut groups: Vec<SubstanceMatches> = self
            .substances
            .iter()
            .map(|s| SubstanceMatches {
                substance: s.clone(),
                products: Vec::new(),
            })
            .collect();

        for row in &rows[header_idx + 1..] {
            if row.len() < columns.span() {
                continue;
            }
            let cell = row[columns.substance].to_lowercase();
            for (group, needle) in groups.iter_mut().zip(&needles) {
                if cell.contains(needle.as_str()) {
                    group.products.push(Product {
                        name: row[columns.name].trim().to_string(),
                        substance: group.substance.clone(),
                        source_url: row[columns.url].trim().to_string(),
                    });
                }
            }
        }

        Ok(CatalogMatches { groups })
    }
}

/// Render one spreadsheet cell as text.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Read the first worksheet of an xlsx workbook into text rows.
///
/// Leading empty rows are kept so row numbers match the sheet.
pub fn rows_from_xlsx(bytes: &[u8]) -> Result<Vec<Row>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| AppError::catalog_format(format!("unreadable workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::catalog_format("workbook has no worksheets"))?
        .map_err(|e| AppError::catalog_format(format!("unreadable worksheet: {e}")))?;

    let leading = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows: Vec<Row> = vec![Vec::new(); leading];
    rows.extend(
        range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Row>()),
    );
    Ok(rows)
}

/// Download the catalog workbook. Any failure here is fatal to the run.
pub async fn download_catalog(fetcher: &dyn Fetch, config: &Config) -> Result<Vec<u8>> {
    let url = config.catalog.report_url()?;
    log::info!("Downloading medicines catalog from {}", url);

    let bytes = get_bytes_with_retry(
        fetcher,
        &url,
        config.http.catalog_retries,
        config.http.retry_backoff_ms,
    )
    .await
    .map_err(|e| AppError::catalog_fetch(&url, e))?;

    log::info!("Catalog downloaded ({} bytes)", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::testing::StaticFetcher;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sample_catalog() -> Vec<Row> {
        vec![
            row(&["Medicines output report"]),
            row(&["Generated 2025-10-01"]),
            row(&[]),
            row(&[
                "Category",
                "Name of medicine",
                "Active substance",
                "International non-proprietary name (INN) / common name",
                "Medicine URL",
            ]),
            row(&["Human", "OzempX", "semaglutide, other", "sema", "https://ema/ozempx"]),
            row(&["Human", "Victoza", "Liraglutide", "lira", "https://ema/victoza"]),
            row(&["Human", "Aspirin", "acetylsalicylic acid", "asa", "https://ema/asa"]),
            row(&["Human", "Xultophy", "insulin degludec / liraglutide", "x", "https://ema/xultophy"]),
            row(&["Human", "Short", "semaglutide"]),
        ]
    }

    fn extractor(substances: &[&str]) -> CatalogExtractor {
        CatalogExtractor::new(substances.iter().map(|s| s.to_string()).collect(), 10)
    }

    #[test]
    fn test_extract_matches_substring() {
        let matches = extractor(&["semaglutide"]).extract(&sample_catalog()).unwrap();
        let products = matches.get("semaglutide").unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(
            products[0],
            Product {
                name: "OzempX".to_string(),
                substance: "semaglutide".to_string(),
                source_url: "https://ema/ozempx".to_string(),
            }
        );
    }

    #[test]
    fn test_extract_groups_in_substance_then_row_order() {
        let matches = extractor(&["liraglutide", "semaglutide", "tirzepatide"])
            .extract(&sample_catalog())
            .unwrap();

        let substances: Vec<&str> = matches.groups.iter().map(|g| g.substance.as_str()).collect();
        assert_eq!(substances, vec!["liraglutide", "semaglutide", "tirzepatide"]);

        let lira: Vec<&str> = matches
            .get("liraglutide")
            .unwrap()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(lira, vec!["Victoza", "Xultophy"]);
        assert!(matches.get("tirzepatide").unwrap().is_empty());
        assert_eq!(matches.product_count(), 3);
    }

    #[test]
    fn test_row_can_match_several_substances() {
        let matches = extractor(&["insulin", "liraglutide"])
            .extract(&sample_catalog())
            .unwrap();
        assert_eq!(matches.get("insulin").unwrap()[0].name, "Xultophy");
        assert!(
            matches
                .get("liraglutide")
                .unwrap()
                .iter()
                .any(|p| p.name == "Xultophy")
        );
    }

    #[test]
    fn test_every_product_contains_its_substance() {
        let matches = extractor(&["glutide", "acid", "INSULIN"])
            .extract(&sample_catalog())
            .unwrap();
        let catalog = sample_catalog();
        for product in matches.products() {
            let row = catalog.iter().find(|r| r.get(1) == Some(&product.name)).unwrap();
            assert!(row[2].to_lowercase().contains(&product.substance.to_lowercase()));
        }
        assert_eq!(matches.get("INSULIN").unwrap().len(), 1);
    }

    #[test]
    fn test_short_rows_skipped() {
        let matches = extractor(&["semaglutide"]).extract(&sample_catalog()).unwrap();
        assert!(matches.products().all(|p| p.name != "Short"));
    }

    #[test]
    fn test_missing_header_is_format_error() {
        let mut catalog = vec![row(&["filler"]); 10];
        catalog.push(row(&["Name of medicine", "Active substance", "Medicine URL"]));

        let err = extractor(&["semaglutide"]).extract(&catalog).unwrap_err();
        assert!(matches!(err, AppError::CatalogFormat(_)));
    }

    #[test]
    fn test_missing_column_is_format_error() {
        let catalog = vec![row(&["Name of medicine", "Active substance"])];
        let err = extractor(&["semaglutide"]).extract(&catalog).unwrap_err();
        assert!(err.to_string().contains("medicine URL"));
    }

    #[test]
    fn test_first_matching_column_wins() {
        let catalog = vec![
            row(&[
                "Medicine name",
                "Active substance",
                "Medicine URL",
                "Previous medicine name",
                "Medicine URL (archived)",
            ]),
            row(&["Current", "semaglutide", "https://ema/current", "Old", "https://ema/old"]),
        ];
        let matches = extractor(&["semaglutide"]).extract(&catalog).unwrap();
        let product = &matches.get("semaglutide").unwrap()[0];
        assert_eq!(product.name, "Current");
        assert_eq!(product.source_url, "https://ema/current");
    }

    #[test]
    fn test_no_matching_substances() {
        let matches = extractor(&["tirzepatide"]).extract(&sample_catalog()).unwrap();
        assert_eq!(matches.product_count(), 0);
        assert_eq!(matches.groups.len(), 1);
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("Ozempic".into())), "Ozempic");
        assert_eq!(cell_text(&Data::Float(42.0)), "42");
    }

    #[test]
    fn test_garbage_workbook_is_format_error() {
        let err = rows_from_xlsx(b"<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, AppError::CatalogFormat(_)));
    }

    /// Workbook whose header sits on sheet row 7 below six empty rows.
    fn workbook_with_offset_header() -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = ["Category", "Name of medicine", "Active substance", "Medicine URL"];
        for (col, title) in header.iter().enumerate() {
            sheet.write_string(6, col as u16, *title).unwrap();
        }
        sheet.write_string(7, 0, "Human").unwrap();
        sheet.write_string(7, 1, "OzempX").unwrap();
        sheet.write_string(7, 2, "Semaglutide").unwrap();
        sheet.write_string(7, 3, "https://ema/ozempx").unwrap();
        sheet.write_string(8, 0, "Human").unwrap();
        sheet.write_number(8, 1, 1234.0).unwrap();
        sheet.write_string(8, 2, "liraglutide").unwrap();
        sheet.write_string(8, 3, "https://ema/1234").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_workbook_rows_keep_sheet_numbering() {
        let rows = rows_from_xlsx(&workbook_with_offset_header()).unwrap();

        assert_eq!(rows.len(), 9);
        assert!(rows[..6].iter().all(|r| r.is_empty()));
        assert_eq!(rows[6][2], "Active substance");
        assert_eq!(rows[7], row(&["Human", "OzempX", "Semaglutide", "https://ema/ozempx"]));
        assert_eq!(rows[8][1], "1234");
    }

    #[test]
    fn test_workbook_header_scan_window_counts_from_top() {
        let rows = rows_from_xlsx(&workbook_with_offset_header()).unwrap();
        let substances = vec!["semaglutide".to_string(), "liraglutide".to_string()];

        let matches = CatalogExtractor::new(substances.clone(), 7).extract(&rows).unwrap();
        assert_eq!(matches.get("semaglutide").unwrap()[0].name, "OzempX");
        assert_eq!(matches.get("liraglutide").unwrap()[0].name, "1234");

        let err = CatalogExtractor::new(substances, 6).extract(&rows).unwrap_err();
        assert!(matches!(err, AppError::CatalogFormat(_)));
    }

    #[tokio::test]
    async fn test_download_failure_is_catalog_fetch_error() {
        let mut config = Config::default();
        config.http.catalog_retries = 1;
        config.http.retry_backoff_ms = 1;
        let fetcher = StaticFetcher::new();

        let err = download_catalog(&fetcher, &config).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogFetch { .. }));
        assert!(err.is_fatal());
    }
}
