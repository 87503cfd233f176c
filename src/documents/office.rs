//! DOCX, PPTX and XLSX are zip archives of XML parts. Only the text-bearing
//! parts are read; styling and layout are ignored.

use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::ParsedDocument;
use crate::error::{Result, ShowcaseError};

struct Patterns {
    docx_table: Regex,
    docx_paragraph: Regex,
    docx_text: Regex,
    docx_style: Regex,
    table_row: Regex,
    table_cell: Regex,
    drawing_paragraph: Regex,
    drawing_text: Regex,
    shape: Regex,
    slide_part: Regex,
    shared_item: Regex,
    plain_text: Regex,
    sheet_entry: Regex,
    row: Regex,
    cell: Regex,
    cell_value: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            docx_table: pattern(r"(?s)<w:tbl>.*?</w:tbl>")?,
            docx_paragraph: pattern(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>")?,
            docx_text: pattern(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>")?,
            docx_style: pattern(r#"<w:pStyle w:val="([^"]*)""#)?,
            table_row: pattern(r"(?s)<w:tr(?:\s[^>]*)?>(.*?)</w:tr>")?,
            table_cell: pattern(r"(?s)<w:tc(?:\s[^>]*)?>(.*?)</w:tc>")?,
            drawing_paragraph: pattern(r"(?s)<a:p(?:\s[^>]*)?>(.*?)</a:p>")?,
            drawing_text: pattern(r"(?s)<a:t(?:\s[^>]*)?>(.*?)</a:t>")?,
            shape: pattern(r"(?s)<p:sp(?:\s[^>]*)?>(.*?)</p:sp>")?,
            slide_part: pattern(r"^ppt/slides/slide(\d+)\.xml$")?,
            shared_item: pattern(r"(?s)<si(?:\s[^>]*)?>(.*?)</si>")?,
            plain_text: pattern(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>")?,
            sheet_entry: pattern(r#"<sheet\s[^>]*?name="([^"]*)"[^>]*?/>"#)?,
            row: pattern(r"(?s)<row(?:\s[^>]*)?>(.*?)</row>")?,
            cell: pattern(r#"(?s)<c\s([^>]*?)(?:/>|>(.*?)</c>)"#)?,
            cell_value: pattern(r"(?s)<v>(.*?)</v>")?,
        })
    }
}

fn pattern(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| ShowcaseError::DocumentError(format!("Invalid pattern {}: {}", source, e)).into())
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn joined_text(re: &Regex, xml: &str) -> String {
    re.captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| unescape(m.as_str()))
        .collect()
}

struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    fn open(bytes: &[u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| ShowcaseError::DocumentError(format!("Not a valid Office package: {}", e)))?;
        Ok(Self { archive })
    }

    fn part(&mut self, name: &str) -> Result<String> {
        let mut file = self.archive.by_name(name)?;
        let mut xml = String::new();
        file.read_to_string(&mut xml)?;
        Ok(xml)
    }

    fn optional_part(&mut self, name: &str) -> Option<String> {
        self.part(name).ok()
    }

    fn names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Dublin Core properties from docProps/core.xml.
    fn core_properties(&mut self) -> Map<String, Value> {
        let xml = self.optional_part("docProps/core.xml").unwrap_or_default();
        let mut props = Map::new();
        for (key, tag) in [
            ("title", "dc:title"),
            ("author", "dc:creator"),
            ("subject", "dc:subject"),
            ("keywords", "cp:keywords"),
            ("created", "dcterms:created"),
            ("modified", "dcterms:modified"),
            ("last_modified_by", "cp:lastModifiedBy"),
        ] {
            props.insert(key.to_string(), json!(element_text(&xml, tag)));
        }
        props
    }
}

/// Text content of the first `<tag ...>...</tag>` element.
fn element_text(xml: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let Some(start) = xml.find(&open) else {
        return String::new();
    };
    let Some(body_start) = xml[start..].find('>').map(|i| start + i + 1) else {
        return String::new();
    };
    match xml[body_start..].find(&close) {
        Some(end) => unescape(xml[body_start..body_start + end].trim()),
        None => String::new(),
    }
}

pub fn parse_docx(bytes: &[u8]) -> Result<ParsedDocument> {
    let mut package = Package::open(bytes)?;
    let body = package.part("word/document.xml")?;
    let p = &Patterns::new()?;

    let tables: Vec<Vec<Vec<String>>> = p
        .docx_table
        .find_iter(&body)
        .map(|table| {
            p.table_row
                .captures_iter(table.as_str())
                .map(|row| {
                    p.table_cell
                        .captures_iter(&row[1])
                        .map(|cell| joined_text(&p.docx_text, &cell[1]).trim().to_string())
                        .collect()
                })
                .collect()
        })
        .collect();

    let outside_tables = p.docx_table.replace_all(&body, "");
    let paragraphs: Vec<Value> = p
        .docx_paragraph
        .captures_iter(&outside_tables)
        .map(|c| {
            let style = p
                .docx_style
                .captures(&c[1])
                .map(|s| s[1].to_string())
                .unwrap_or_else(|| "Normal".to_string());
            json!({"text": joined_text(&p.docx_text, &c[1]).trim(), "style": style})
        })
        .collect();

    let mut lines: Vec<String> = paragraphs
        .iter()
        .filter_map(|para| para["text"].as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    for table in &tables {
        for row in table {
            lines.push(row.join(" | "));
        }
    }

    let mut structure = Map::new();
    structure.insert(
        "paragraph_count".into(),
        json!(paragraphs.iter().filter(|para| para["text"] != "").count()),
    );
    structure.insert("paragraphs".into(), json!(paragraphs));
    structure.insert("table_count".into(), json!(tables.len()));
    structure.insert("tables".into(), json!(tables));

    Ok(ParsedDocument {
        document_type: "docx",
        full_text: lines.join("\n"),
        structure,
        metadata: package.core_properties(),
    })
}

pub fn parse_pptx(bytes: &[u8]) -> Result<ParsedDocument> {
    let mut package = Package::open(bytes)?;
    let p = &Patterns::new()?;

    let mut slide_parts: Vec<(u32, String)> = package
        .names()
        .into_iter()
        .filter_map(|name| {
            let number = p.slide_part.captures(&name)?.get(1)?.as_str().parse().ok()?;
            Some((number, name))
        })
        .collect();
    slide_parts.sort();

    let mut slides = Vec::new();
    let mut full_text = String::new();
    for (index, (_, name)) in slide_parts.iter().enumerate() {
        let xml = package.part(name)?;
        let shapes: Vec<String> = p
            .shape
            .captures_iter(&xml)
            .map(|shape| {
                p.drawing_paragraph
                    .captures_iter(&shape[1])
                    .map(|para| joined_text(&p.drawing_text, &para[1]))
                    .filter(|t| !t.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .filter(|t| !t.trim().is_empty())
            .collect();

        let slide_text = shapes.join("\n");
        full_text.push_str(&format!("Slide {}:\n{}\n\n", index + 1, slide_text));
        slides.push(json!({
            "slide_number": index + 1,
            "text": slide_text,
            "shape_count": shapes.len(),
            "shapes": shapes,
        }));
    }

    let mut structure = Map::new();
    structure.insert("slide_count".into(), json!(slides.len()));
    structure.insert("slides".into(), json!(slides));

    Ok(ParsedDocument {
        document_type: "pptx",
        full_text: full_text.trim().to_string(),
        structure,
        metadata: package.core_properties(),
    })
}

pub fn parse_xlsx(bytes: &[u8]) -> Result<ParsedDocument> {
    let mut package = Package::open(bytes)?;
    let p = &Patterns::new()?;

    let shared: Vec<String> = package
        .optional_part("xl/sharedStrings.xml")
        .map(|xml| {
            p.shared_item
                .captures_iter(&xml)
                .map(|item| joined_text(&p.plain_text, &item[1]))
                .collect()
        })
        .unwrap_or_default();

    let workbook = package.part("xl/workbook.xml")?;
    let sheet_names: Vec<String> = p.sheet_entry.captures_iter(&workbook).map(|c| unescape(&c[1])).collect();

    let mut sheets = Vec::new();
    let mut full_text = String::new();
    for (index, sheet_name) in sheet_names.iter().enumerate() {
        // sheets are stored in workbook order as sheet1.xml, sheet2.xml, ...
        let Some(xml) = package.optional_part(&format!("xl/worksheets/sheet{}.xml", index + 1)) else {
            continue;
        };

        let rows: Vec<Vec<String>> = p
            .row
            .captures_iter(&xml)
            .map(|row| {
                p.cell
                    .captures_iter(&row[1])
                    .map(|cell| cell_text(p, &cell[1], cell.get(2).map_or("", |m| m.as_str()), &shared))
                    .collect::<Vec<_>>()
            })
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .collect();

        let sheet_text = rows.iter().map(|r| r.join("\t")).collect::<Vec<_>>().join("\n");
        full_text.push_str(&format!("Sheet: {}\n{}\n\n", sheet_name, sheet_text));
        sheets.push(json!({
            "name": sheet_name,
            "row_count": rows.len(),
            "col_count": rows.iter().map(Vec::len).max().unwrap_or(0),
            "data": rows,
            "text": sheet_text,
        }));
    }

    let mut structure = Map::new();
    structure.insert("sheet_count".into(), json!(sheets.len()));
    structure.insert("sheets".into(), json!(sheets));

    Ok(ParsedDocument {
        document_type: "xlsx",
        full_text: full_text.trim().to_string(),
        structure,
        metadata: package.core_properties(),
    })
}

fn cell_text(p: &Patterns, attributes: &str, body: &str, shared: &[String]) -> String {
    let kind: HashMap<&str, &str> = attributes
        .split_whitespace()
        .filter_map(|attr| attr.split_once('='))
        .map(|(k, v)| (k, v.trim_matches('"')))
        .collect();

    match kind.get("t").copied() {
        Some("s") => p
            .cell_value
            .captures(body)
            .and_then(|v| v[1].trim().parse::<usize>().ok())
            .and_then(|i| shared.get(i).cloned())
            .unwrap_or_default(),
        Some("inlineStr") => joined_text(&p.plain_text, body),
        _ => p
            .cell_value
            .captures(body)
            .map(|v| unescape(v[1].trim()))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const CORE: &str = r#"<cp:coreProperties><dc:title>Vendor Contract</dc:title><dc:creator>Legal &amp; Ops</dc:creator></cp:coreProperties>"#;

    #[test]
    fn test_docx_paragraphs_tables_and_metadata() {
        let document = r#"<w:document><w:body>
            <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Executive Summary</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Revenue grew </w:t></w:r><w:r><w:t>12%.</w:t></w:r></w:p>
            <w:p/>
            <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cost</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>$500</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
        </w:body></w:document>"#;
        let bytes = package(&[("word/document.xml", document), ("docProps/core.xml", CORE)]);

        let parsed = parse_docx(&bytes).unwrap();
        assert_eq!(parsed.full_text, "Executive Summary\nRevenue grew 12%.\nCost | $500");
        assert_eq!(parsed.structure["paragraphs"][0]["style"], "Heading1");
        assert_eq!(parsed.structure["paragraph_count"], 2);
        assert_eq!(parsed.structure["tables"][0][0][1], "$500");
        assert_eq!(parsed.metadata["title"], "Vendor Contract");
        assert_eq!(parsed.metadata["author"], "Legal & Ops");
        assert_eq!(parsed.metadata["subject"], "");
    }

    #[test]
    fn test_pptx_slides_in_numeric_order() {
        let slide = |text: &str| format!(r#"<p:sld><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:sld>"#, text);
        let (s1, s2, s10) = (slide("Intro"), slide("Roadmap"), slide("Close"));
        let bytes = package(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);

        let parsed = parse_pptx(&bytes).unwrap();
        assert_eq!(parsed.structure["slide_count"], 3);
        assert_eq!(parsed.structure["slides"][1]["text"], "Roadmap");
        assert!(parsed.full_text.starts_with("Slide 1:\nIntro"));
        assert!(parsed.full_text.ends_with("Slide 3:\nClose"));
    }

    #[test]
    fn test_xlsx_shared_and_inline_strings() {
        let workbook = r#"<workbook><sheets><sheet name="Budget" sheetId="1" r:id="rId1"/></sheets></workbook>"#;
        let strings = r#"<sst><si><t>Item</t></si><si><t>Cloud</t></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Cost</t></is></c></row>
            <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>1500</v></c></row>
            <row r="3"><c r="A3"/></row>
        </sheetData></worksheet>"#;
        let bytes = package(&[
            ("xl/workbook.xml", workbook),
            ("xl/sharedStrings.xml", strings),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        let parsed = parse_xlsx(&bytes).unwrap();
        assert_eq!(parsed.structure["sheets"][0]["name"], "Budget");
        assert_eq!(parsed.structure["sheets"][0]["row_count"], 2);
        assert_eq!(parsed.structure["sheets"][0]["data"][1], json!(["Cloud", "1500"]));
        assert_eq!(parsed.full_text, "Sheet: Budget\nItem\tCost\nCloud\t1500");
    }

    #[test]
    fn test_not_a_zip() {
        let err = parse_docx(b"plain text").unwrap_err();
        assert!(err.to_string().contains("Not a valid Office package"));
    }
}
