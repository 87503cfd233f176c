use serde_json::{Map, Value};
use std::fmt::Write;

use super::title_case;

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }
h1, h2, h3 { color: #2c3e50; }
.chart { text-align: center; margin: 20px 0; }
.chart img { max-width: 100%; border: 1px solid #ddd; border-radius: 8px; }
.summary-box { background: #f8f9fa; padding: 15px; border-left: 4px solid #007bff; margin: 20px 0; }
pre { background: #f4f4f4; padding: 15px; border-radius: 5px; overflow-x: auto; white-space: pre-wrap; }";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Standalone page with the charts as SVG data URIs above the escaped
/// detailed report.
pub fn render(detailed_report: &str, charts: &Map<String, Value>, generated_at: &str) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Document Analysis Report</title>\n");
    let _ = writeln!(out, "<style>\n{}\n</style>\n</head>\n<body>", STYLE);

    out.push_str("<div class=\"summary-box\">\n<h2>Document Analysis Report</h2>\n");
    let _ = writeln!(out, "<p><strong>Generated:</strong> {}</p>", escape(generated_at));
    out.push_str("<p><strong>Agent:</strong> report_generator</p>\n</div>\n");

    let drawable: Vec<(&String, &str)> = charts
        .iter()
        .filter_map(|(name, data)| data.as_str().filter(|d| !d.is_empty()).map(|d| (name, d)))
        .collect();
    if !drawable.is_empty() {
        out.push_str("<div class=\"charts\">\n<h2>Visualizations</h2>\n");
        for (name, data) in drawable {
            let _ = writeln!(
                out,
                "<div class=\"chart\">\n<h3>{}</h3>\n<img src=\"data:image/svg+xml;base64,{}\" alt=\"{}\">\n</div>",
                escape(&title_case(name)),
                data,
                escape(name)
            );
        }
        out.push_str("</div>\n");
    }

    let _ = writeln!(out, "<div class=\"report-content\">\n<pre>{}</pre>\n</div>", escape(detailed_report));
    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<b>"R&D"</b>"#), "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;");
        assert_eq!(escape("it's"), "it&#39;s");
    }

    #[test]
    fn test_render_embeds_charts_and_escapes_report() {
        let mut charts = Map::new();
        charts.insert("risk_assessment".into(), json!("PHN2Zz4="));
        charts.insert("empty".into(), json!(""));

        let html = render("# Report\nCosts < budget & on time", &charts, "today");
        assert!(html.contains("<h3>Risk Assessment</h3>"));
        assert!(html.contains("src=\"data:image/svg+xml;base64,PHN2Zz4=\""));
        assert!(!html.contains("<h3>Empty</h3>"));
        assert!(html.contains("Costs &lt; budget &amp; on time"));
    }

    #[test]
    fn test_no_charts_section_when_empty() {
        let html = render("text", &Map::new(), "today");
        assert!(!html.contains("Visualizations"));
        assert!(html.ends_with("</html>\n"));
    }
}
