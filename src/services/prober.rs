// src/services/prober.rs

//! Update prober service.
//!
//! Resolves a product page to its RSS feed and reads the newest entry.

use std::sync::Arc;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Product, UpdateItem};
use crate::utils::http::Fetch;
use crate::utils::resolve_url;

/// Placeholders for missing feed fields.
pub const NO_TITLE: &str = "No Title";
pub const NO_DATE: &str = "No Date";
pub const NO_LINK: &str = "No Link";

/// What a probe found when nothing went wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The newest feed entry, with a usable date
    Found(UpdateItem),
    /// The product page has no marked feed link
    NoFeed,
    /// The feed exists but has no items
    EmptyFeed,
    /// The newest item has no date, so it can't be tracked
    NoUsableDate,
}

/// Raw fields of the first `<item>` of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub pub_date: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum EntryField {
    Title,
    PubDate,
    Link,
    Description,
}

impl EntryField {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Self::Title),
            b"pubDate" => Some(Self::PubDate),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            _ => None,
        }
    }
}

impl FeedEntry {
    fn append(&mut self, field: EntryField, text: &str) {
        let slot = match field {
            EntryField::Title => &mut self.title,
            EntryField::PubDate => &mut self.pub_date,
            EntryField::Link => &mut self.link,
            EntryField::Description => &mut self.description,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    /// Trim every field and drop the ones left empty.
    fn normalized(self) -> Self {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        Self {
            title: clean(self.title),
            pub_date: clean(self.pub_date),
            link: clean(self.link),
            description: clean(self.description),
        }
    }
}

/// Read the first `<item>` of an RSS document.
///
/// Only direct children of the item are recorded; namespaced elements such as
/// `atom:link` are ignored. Returns `Ok(None)` when the feed has no items.
pub fn parse_first_item(xml: &[u8]) -> std::result::Result<Option<FeedEntry>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut item_depth: Option<usize> = None;
    let mut field: Option<EntryField> = None;
    let mut entry = FeedEntry::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                match item_depth {
                    None if e.name().as_ref() == b"item" => item_depth = Some(depth),
                    Some(d) if depth == d + 1 => field = EntryField::from_tag(e.name().as_ref()),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if item_depth.is_none() && e.name().as_ref() == b"item" {
                    return Ok(Some(FeedEntry::default()));
                }
            }
            Event::End(_) => {
                match item_depth {
                    Some(d) if depth == d => return Ok(Some(entry.normalized())),
                    Some(d) if depth == d + 1 => field = None,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(t) => {
                if let Some(f) = field {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    entry.append(f, &text);
                }
            }
            Event::CData(c) => {
                if let Some(f) = field {
                    entry.append(f, &String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

/// Probes product pages for their latest RSS entry.
pub struct UpdateProber {
    fetcher: Arc<dyn Fetch>,
    base_url: Url,
    feed_link: Selector,
    timeout: Duration,
}

impl UpdateProber {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        base_url: &str,
        feed_link_class: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let feed_link = Self::parse_selector(&format!(
            r#"a[href][class*="{}"]"#,
            feed_link_class.trim()
        ))?;
        Ok(Self {
            fetcher,
            base_url: Url::parse(base_url)?,
            feed_link,
            timeout,
        })
    }

    pub fn from_config(fetcher: Arc<dyn Fetch>, config: &Config) -> Result<Self> {
        Self::new(
            fetcher,
            &config.catalog.base_url,
            &config.catalog.feed_link_class,
            Duration::from_secs(config.http.probe_timeout_secs),
        )
    }

    /// Probe one product, giving up once the probe timeout elapses.
    pub async fn probe(&self, product: &Product) -> Result<ProbeOutcome> {
        match tokio::time::timeout(self.timeout, self.probe_inner(product)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::probe_fetch(
                &product.name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    async fn probe_inner(&self, product: &Product) -> Result<ProbeOutcome> {
        let html = self
            .fetcher
            .get_text(&product.source_url)
            .await
            .map_err(|e| AppError::probe_fetch(&product.name, e))?;

        let Some(href) = self.find_feed_link(&html) else {
            log::debug!("No feed link on {} ({})", product.name, product.source_url);
            return Ok(ProbeOutcome::NoFeed);
        };
        let feed_url = resolve_url(&self.base_url, &href);
        log::debug!("Feed for {}: {}", product.name, feed_url);

        let xml = self
            .fetcher
            .get_bytes(&feed_url)
            .await
            .map_err(|e| AppError::probe_fetch(&product.name, e))?;
        let entry = parse_first_item(&xml)
            .map_err(|e| AppError::probe_parse(&product.name, format!("{feed_url}: {e}")))?;

        let Some(entry) = entry else {
            return Ok(ProbeOutcome::EmptyFeed);
        };
        let date = match entry.pub_date {
            Some(date) if date != NO_DATE => date,
            _ => return Ok(ProbeOutcome::NoUsableDate),
        };

        Ok(ProbeOutcome::Found(UpdateItem::new(
            product,
            entry.title.unwrap_or_else(|| NO_TITLE.to_string()),
            date,
            entry.link.unwrap_or_else(|| NO_LINK.to_string()),
            entry.description.unwrap_or_default(),
        )))
    }

    /// First marked anchor's href, if the page has one.
    fn find_feed_link(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.feed_link)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .find(|href| !href.is_empty())
            .map(String::from)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::config(format!("Invalid selector '{s}': {e:?}")))
    }
}
