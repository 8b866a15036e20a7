use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::Html;
use std::borrow::Cow;

use crate::models::FeedEntry;

const UNTITLED: &str = "Untitled";

/// Feed title (when the document declares one) plus its entries in document order
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Rss,
    Atom,
}

/// Minimal XML tree keyed by local names, so `content:encoded` and
/// `atom:link` are addressed as `encoded` and `link`.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.context("Malformed XML attribute")?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value);
            let value = match quick_xml::escape::unescape(&raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.to_string(),
            };
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Trimmed text of the first child with this name
    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn has_descendant(&self, name: &str) -> bool {
        self.children
            .iter()
            .any(|c| c.name == name || c.has_descendant(name))
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        bail!("Malformed XML: more than one root element");
    }
    *root = Some(element);
    Ok(())
}

fn resolve_reference(name: &str) -> String {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        if let Some(c) = parsed.and_then(char::from_u32) {
            return c.to_string();
        }
    } else if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(name) {
        return resolved.to_string();
    }
    // Unknown entities (no DTD) are kept verbatim
    format!("&{};", name)
}

/// `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration
fn declared_encoding(xml: &[u8]) -> Option<&'static Encoding> {
    let rest = xml.strip_prefix(b"<?xml")?;
    let end = rest.windows(2).position(|w| w == b"?>")?;
    let declaration = std::str::from_utf8(&rest[..end]).ok()?;

    let after = &declaration[declaration.find("encoding")? + "encoding".len()..];
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after[1..];
    let label = &value[..value.find(quote)?];

    // The bytes are ASCII-compatible if the declaration was readable
    Encoding::for_label(label.as_bytes()).map(Encoding::output_encoding)
}

/// Decode by BOM, then by the XML declaration, else as UTF-8
fn decode_source(xml: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(xml) {
        return encoding.decode_without_bom_handling(&xml[bom_len..]).0;
    }
    let encoding = declared_encoding(xml).unwrap_or(UTF_8);
    encoding.decode_without_bom_handling(xml).0
}

fn parse_document(xml: &[u8]) -> Result<Element> {
    let source = decode_source(xml);
    let mut reader = Reader::from_str(&source);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().context("Malformed XML")? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().context("Malformed XML: unexpected closing tag")?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                match stack.last_mut() {
                    Some(current) => match quick_xml::escape::unescape(&raw) {
                        Ok(value) => current.text.push_str(&value),
                        Err(_) => current.text.push_str(&raw),
                    },
                    None if raw.trim().is_empty() => {}
                    None => bail!("Malformed XML: text outside the root element"),
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(current) = stack.last_mut() {
                    let name = String::from_utf8_lossy(&reference);
                    current.text.push_str(&resolve_reference(&name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        bail!("Malformed XML: document ended inside <{}>", open.name);
    }
    root.context("Malformed XML: no root element")
}

/// Parse an RSS/Atom date: RFC 2822 first, then ISO 8601.
/// Timestamps without a zone are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in &["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Unescape entities, replace tags with spaces and collapse whitespace
pub fn clean_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(raw);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

fn build_entry(title: Option<&str>, body: Option<&str>, link: String, date: Option<&str>) -> FeedEntry {
    let title = non_empty(title).unwrap_or(UNTITLED).to_string();
    let message = clean_text(non_empty(body).unwrap_or(title.as_str()));
    let message = if message.is_empty() {
        UNTITLED.to_string()
    } else {
        message
    };

    FeedEntry {
        title,
        message,
        link,
        timestamp: date.and_then(parse_timestamp),
    }
}

fn rss_item(item: &Element) -> FeedEntry {
    let body = non_empty(item.child_text("description")).or(item.child_text("encoded"));
    build_entry(
        item.child_text("title"),
        body,
        item.child_text("link").unwrap_or_default().to_string(),
        item.child_text("pubDate"),
    )
}

fn atom_link(entry: &Element) -> String {
    let mut link = "";
    for candidate in entry.children_named("link") {
        let Some(href) = non_empty(candidate.attr("href")) else {
            continue;
        };
        // A link without rel is an alternate link
        if candidate.attr("rel").unwrap_or("alternate") == "alternate" {
            return href.to_string();
        }
        if link.is_empty() {
            link = href;
        }
    }
    link.to_string()
}

fn atom_entry(entry: &Element) -> FeedEntry {
    let body = non_empty(entry.child_text("summary")).or(entry.child_text("content"));
    let date = non_empty(entry.child_text("updated")).or(entry.child_text("published"));
    build_entry(entry.child_text("title"), body, atom_link(entry), date)
}

fn rss_entries(root: &Element) -> Vec<FeedEntry> {
    let Some(channel) = root.child("channel") else {
        return Vec::new();
    };
    channel.children_named("item").map(rss_item).collect()
}

fn atom_entries(root: &Element) -> Vec<FeedEntry> {
    root.children_named("entry").map(atom_entry).collect()
}

fn detect_dialect(root: &Element) -> Dialect {
    match root.name.as_str() {
        "rss" => Dialect::Rss,
        "feed" => Dialect::Atom,
        _ if root.has_descendant("item") => Dialect::Rss,
        _ => Dialect::Atom,
    }
}

/// Parse an RSS 2.0 or Atom document. Malformed XML is an error; a bad or
/// missing date only leaves that entry without a timestamp.
pub fn parse_feed(xml: &[u8]) -> Result<ParsedFeed> {
    let root = parse_document(xml)?;

    let title = match root.name.as_str() {
        "rss" => root
            .child("channel")
            .and_then(|c| c.child_text("title"))
            .map(str::to_string),
        "feed" => root.child_text("title").map(str::to_string),
        _ => None,
    };

    let entries = match detect_dialect(&root) {
        Dialect::Atom => atom_entries(&root),
        Dialect::Rss if root.name == "rss" => rss_entries(&root),
        Dialect::Rss => {
            // RSS 1.0 (RDF) keeps items next to the channel, not inside it
            let entries = rss_entries(&root);
            if entries.is_empty() {
                root.children_named("item").map(rss_item).collect()
            } else {
                entries
            }
        }
    };

    Ok(ParsedFeed { title, entries })
}
