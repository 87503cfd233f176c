//! Minimal single page PDF 1.4 writer using the built-in Helvetica fonts.

use chrono::Local;

use super::{list, text_or, title_case, ReportData};

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: f64 = 56.0;
const WRAP_COLUMNS: usize = 90;

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Title(String),
    Heading(String),
    Text(String),
    Blank,
}

impl Line {
    fn font(&self) -> (&'static str, f64, f64) {
        // (font resource, size, leading)
        match self {
            Line::Title(_) => ("F2", 20.0, 30.0),
            Line::Heading(_) => ("F2", 14.0, 22.0),
            Line::Text(_) => ("F1", 10.0, 14.0),
            Line::Blank => ("F1", 10.0, 8.0),
        }
    }

    fn text(&self) -> &str {
        match self {
            Line::Title(t) | Line::Heading(t) | Line::Text(t) => t,
            Line::Blank => "",
        }
    }
}

/// Literal string for a content stream: ASCII only, with the delimiters
/// escaped.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out.push(')');
    out
}

/// Greedy word wrap at `width` characters.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Renders `lines` top to bottom on one page; whatever does not fit is
/// dropped.
pub fn render(lines: &[Line]) -> Vec<u8> {
    let mut content = String::new();
    let mut y = PAGE_HEIGHT as f64 - MARGIN;
    for line in lines {
        let (font, size, leading) = line.font();
        y -= leading;
        if y < MARGIN {
            break;
        }
        if matches!(line, Line::Blank) {
            continue;
        }
        content.push_str(&format!(
            "BT /{} {} Tf {} {:.1} Td {} Tj ET\n",
            font,
            size,
            MARGIN,
            y,
            pdf_string(line.text())
        ));
    }

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 4 0 R /F2 5 0 R >> >> /Contents 6 0 R >>",
            PAGE_WIDTH, PAGE_HEIGHT
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_string(),
        format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content),
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    out.extend_from_slice(xref.as_bytes());
    out
}

/// 1234567 -> "1,234,567".
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Summary page: document facts followed by up to five key findings.
pub fn report_lines(data: &ReportData) -> Vec<Line> {
    let doc = &data.document;
    let mut lines = vec![
        Line::Title("Document Analysis Report".to_string()),
        Line::Heading("Executive Summary".to_string()),
        Line::Text(format!("Document: {}", doc.filename)),
        Line::Text(format!("Document Type: {}", title_case(&doc.document_type))),
        Line::Text(format!("Word Count: {}", group_thousands(doc.word_count))),
        Line::Text(format!(
            "Overall Sentiment: {}",
            title_case(&text_or(&data.sentiment["overall_sentiment"], "neutral"))
        )),
        Line::Text(format!(
            "Risk Level: {}",
            title_case(&text_or(&data.risk["overall_risk_level"], "unknown"))
        )),
        Line::Text(format!("Analysis Date: {}", Local::now().format("%B %d, %Y"))),
    ];

    let findings = list(&data.insights["key_findings"]);
    if !findings.is_empty() {
        lines.push(Line::Blank);
        lines.push(Line::Heading("Key Findings".to_string()));
        for (i, finding) in findings.iter().take(5).enumerate() {
            for (j, part) in wrap(&format!("Finding {}: {}", i + 1, finding), WRAP_COLUMNS).into_iter().enumerate() {
                lines.push(Line::Text(if j == 0 { part } else { format!("    {}", part) }));
            }
        }
    }
    lines
}
