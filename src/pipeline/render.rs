//! RSS 2.0 feed rendering.
//!
//! The feed is rebuilt from scratch on every run: items are ordered newest
//! first, capped, and serialized with stable two-space indentation.

use std::path::Path;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{AppError, Result};
use crate::models::{FeedConfig, UpdateItem};
use crate::services::NO_TITLE;
use crate::storage::write_atomic;
use crate::utils::date::format_rfc2822;

/// `pubDate` text for items whose date could not be parsed.
pub const DATE_UNAVAILABLE: &str = "No Date Available";

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Channel-level metadata of the generated feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Absolute URL of the feed itself
    pub feed_url: String,
}

/// Renders update items into an RSS document.
#[derive(Debug, Clone)]
pub struct FeedRenderer {
    channel: Channel,
    max_items: usize,
}

impl FeedRenderer {
    pub fn new(channel: Channel, max_items: usize) -> Self {
        Self { channel, max_items }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(
            Channel {
                title: config.title.clone(),
                link: config.link.clone(),
                description: config.description.clone(),
                feed_url: config.feed_url.clone(),
            },
            config.max_items,
        )
    }

    /// Items ordered newest first; undated items last, ties keep input order.
    pub fn sorted<'a>(items: &'a [UpdateItem]) -> Vec<&'a UpdateItem> {
        let mut sorted: Vec<&UpdateItem> = items.iter().collect();
        sorted.sort_by(|a, b| b.parsed_timestamp.cmp(&a.parsed_timestamp));
        sorted
    }

    /// Render using the current time as fallback build date.
    pub fn render(&self, items: &[UpdateItem]) -> Result<String> {
        self.render_at(items, Utc::now())
    }

    /// Render with `now` as the build date used when there are no dated items.
    pub fn render_at(&self, items: &[UpdateItem], now: DateTime<Utc>) -> Result<String> {
        let sorted = Self::sorted(items);

        let last_build_date = sorted
            .first()
            .and_then(|item| item.parsed_timestamp)
            .map(|dt| format_rfc2822(&dt))
            .unwrap_or_else(|| now.to_rfc2822());

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        rss.push_attribute(("xmlns:atom", ATOM_NS));
        rss.push_attribute(("xmlns:content", CONTENT_NS));
        rss.push_attribute(("xmlns:dc", DC_NS));
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        write_text(&mut writer, "title", &self.channel.title)?;
        write_text(&mut writer, "link", &self.channel.link)?;
        write_cdata(&mut writer, "description", &self.channel.description)?;
        write_text(&mut writer, "lastBuildDate", &last_build_date)?;

        let mut self_link = BytesStart::new("atom:link");
        self_link.push_attribute(("href", self.channel.feed_url.as_str()));
        self_link.push_attribute(("rel", "self"));
        self_link.push_attribute(("type", "application/rss+xml"));
        writer.write_event(Event::Empty(self_link))?;

        for item in sorted.iter().take(self.max_items) {
            write_item(&mut writer, item)?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| AppError::validation(format!("feed is not UTF-8: {e}")))
    }

    /// Render and replace the file at `path`. Returns the number of items written.
    pub async fn write(&self, path: &Path, items: &[UpdateItem]) -> Result<usize> {
        let document = self.render(items)?;
        write_atomic(path, document.as_bytes()).await?;

        let written = items.len().min(self.max_items);
        log::info!("RSS feed written to {} ({} items)", path.display(), written);
        Ok(written)
    }
}

fn write_item(writer: &mut Writer<Vec<u8>>, item: &UpdateItem) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    let title = if item.title.is_empty() { NO_TITLE } else { item.title.as_str() };
    write_text(writer, "title", title)?;
    write_text(writer, "link", &item.link)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "true"));
    writer.write_event(Event::Start(guid))?;
    writer.write_event(Event::Text(BytesText::new(item.guid())))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;

    let fallback;
    let description = if item.description.is_empty() {
        fallback = format!("Update for {}", item.product);
        fallback.as_str()
    } else {
        item.description.as_str()
    };
    write_cdata(writer, "description", description)?;

    let pub_date = item
        .parsed_timestamp
        .map(|dt| format_rfc2822(&dt))
        .unwrap_or_else(|| DATE_UNAVAILABLE.to_string());
    write_text(writer, "pubDate", &pub_date)?;

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// CDATA section, or escaped text when the content would terminate the section early.
fn write_cdata(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    if text.contains("]]>") {
        return write_text(writer, tag, text);
    }
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::CData(BytesCData::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
