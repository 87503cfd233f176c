use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map};

use super::{text::decode, ParsedDocument};
use crate::error::{Result, ShowcaseError};

const BLOCKS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "td", "th", "pre", "blockquote"];

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ShowcaseError::DocumentError(format!("Invalid selector {}: {}", css, e)).into())
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inside_block(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| BLOCKS.contains(&a.value().name()))
}

/// Block-level text of an HTML page, one block per line, with its title,
/// description and headings.
pub fn parse(bytes: &[u8]) -> Result<ParsedDocument> {
    let (source, encoding, _) = decode(bytes);
    let document = Html::parse_document(&source);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| element_text(&t))
        .unwrap_or_default();
    let description = document
        .select(&selector("meta[name='description']")?)
        .next()
        .and_then(|m| m.value().attr("content"))
        .unwrap_or_default()
        .to_string();

    let mut blocks = Vec::new();
    let mut headings = Vec::new();
    for element in document.select(&selector(&BLOCKS.join(", "))?) {
        // nested blocks are covered by their outermost block
        if inside_block(&element) {
            continue;
        }
        let text = element_text(&element);
        if text.is_empty() {
            continue;
        }
        let name = element.value().name();
        if let Some(level) = name.strip_prefix('h').and_then(|l| l.parse::<u8>().ok()) {
            headings.push(json!({"level": level, "text": text}));
        }
        blocks.push(text);
    }

    let link_count = document.select(&selector("a[href]")?).count();

    let mut structure = Map::new();
    structure.insert("block_count".into(), json!(blocks.len()));
    structure.insert("headings".into(), json!(headings));
    structure.insert("link_count".into(), json!(link_count));

    let mut metadata = Map::new();
    metadata.insert("title".into(), json!(title));
    metadata.insert("description".into(), json!(description));
    metadata.insert("encoding".into(), json!(encoding));

    Ok(ParsedDocument {
        document_type: "html",
        full_text: blocks.join("\n"),
        structure,
        metadata,
    })
}
