//! Small hand-drawn SVG charts. Each chart is returned base64-encoded so it
//! can be embedded as a data URI or stored alongside the JSON report.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use std::f64::consts::PI;
use std::fmt::Write;

use super::html::escape;
use super::{list, title_case, ReportData};

const EMOTION_COLORS: &[&str] = &["#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F"];
const BUSINESS_COLORS: &[&str] = &["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b"];
const SEVERITY_COLORS: &[(&str, &str)] = &[("low", "#28a745"), ("medium", "#ffc107"), ("high", "#dc3545")];
const UNKNOWN_SEVERITY: &str = "#6c757d";

pub const SENTIMENT_CHART: &str = "sentiment_analysis";
pub const RISK_CHART: &str = "risk_assessment";
pub const TOPICS_CHART: &str = "topics_distribution";
pub const METRICS_CHART: &str = "business_metrics";

/// Gauge colour for a 0..=100 sentiment score.
pub fn sentiment_color(score: f64) -> &'static str {
    if score < 40.0 {
        "#DC143C"
    } else if score < 60.0 {
        "#FFD700"
    } else {
        "#2E8B57"
    }
}

pub fn severity_color(severity: &str) -> &'static str {
    SEVERITY_COLORS
        .iter()
        .find(|(s, _)| *s == severity)
        .map(|(_, c)| *c)
        .unwrap_or(UNKNOWN_SEVERITY)
}

struct Svg {
    width: u32,
    height: u32,
    body: String,
}

impl Svg {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, body: String::new() }
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str) {
        let _ = write!(
            self.body,
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
            x, y, w, h, fill
        );
    }

    fn text(&mut self, x: f64, y: f64, anchor: &str, size: u32, content: &str) {
        let _ = write!(
            self.body,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="{}" font-size="{}" font-family="Arial, sans-serif">{}</text>"#,
            x,
            y,
            anchor,
            size,
            escape(content)
        );
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        let _ = write!(
            self.body,
            r##"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#333" stroke-width="1"/>"##,
            x1, y1, x2, y2
        );
    }

    fn slice(&mut self, cx: f64, cy: f64, r: f64, start: f64, end: f64, fill: &str) {
        if end - start >= 2.0 * PI - 1e-9 {
            let _ = write!(self.body, r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"/>"#, cx, cy, r, fill);
            return;
        }
        let (x0, y0) = (cx + r * start.sin(), cy - r * start.cos());
        let (x1, y1) = (cx + r * end.sin(), cy - r * end.cos());
        let large = if end - start > PI { 1 } else { 0 };
        let _ = write!(
            self.body,
            r#"<path d="M {:.1} {:.1} L {:.1} {:.1} A {:.1} {:.1} 0 {} 1 {:.1} {:.1} Z" fill="{}"/>"#,
            cx, cy, x0, y0, r, r, large, x1, y1, fill
        );
    }

    fn finish(self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" fill="white"/>{body}</svg>"#,
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

/// Vertical bar chart with value labels. `bars` are (label, value, colour).
fn bar_chart(title: &str, y_label: &str, bars: &[(String, f64, &str)]) -> String {
    let (width, height) = (640.0, 360.0);
    let (left, right, top, bottom) = (60.0, 20.0, 40.0, 80.0);
    let plot_w = width - left - right;
    let plot_h = height - top - bottom;
    let max = bars.iter().map(|(_, v, _)| *v).fold(0.0, f64::max).max(1.0);

    let mut svg = Svg::new(width as u32, height as u32);
    svg.text(width / 2.0, 24.0, "middle", 16, title);
    svg.text(16.0, top + plot_h / 2.0, "middle", 11, y_label);
    svg.line(left, top, left, top + plot_h);
    svg.line(left, top + plot_h, left + plot_w, top + plot_h);

    let slot = plot_w / bars.len().max(1) as f64;
    for (i, (label, value, color)) in bars.iter().enumerate() {
        let h = value / max * (plot_h - 20.0);
        let x = left + slot * i as f64 + slot * 0.15;
        let y = top + plot_h - h;
        svg.rect(x, y, slot * 0.7, h, color);
        svg.text(x + slot * 0.35, y - 4.0, "middle", 11, &format_value(*value));
        svg.text(x + slot * 0.35, top + plot_h + 16.0, "middle", 11, label);
    }
    svg.finish()
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}

fn encode(svg: String) -> String {
    STANDARD.encode(svg.as_bytes())
}

/// Sentiment gauge next to the emotion shares.
pub fn sentiment_chart(data: &ReportData) -> String {
    let score = data.sentiment["sentiment_score"].as_f64().unwrap_or(50.0).clamp(0.0, 100.0);
    let mut svg = Svg::new(720, 300);

    svg.text(170.0, 28.0, "middle", 16, "Overall Sentiment");
    svg.rect(30.0, 120.0, 280.0, 36.0, "#eeeeee");
    svg.rect(30.0, 120.0, 280.0 * score / 100.0, 36.0, sentiment_color(score));
    svg.text(170.0, 185.0, "middle", 13, &format!("{}%", format_value(score)));
    svg.text(30.0, 205.0, "start", 10, "0");
    svg.text(310.0, 205.0, "end", 10, "100");

    svg.text(530.0, 28.0, "middle", 16, "Emotional Profile");
    let detected: Vec<String> = list(&data.emotions["emotions_detected"]).into_iter().take(6).collect();
    let shares: Vec<f64> = detected
        .iter()
        .map(|e| data.emotions["emotion_percentages"][e.as_str()].as_f64().unwrap_or(0.0))
        .collect();
    let total: f64 = shares.iter().sum();

    if total <= 0.0 {
        svg.text(530.0, 160.0, "middle", 13, "No emotions detected");
    } else {
        let (cx, cy, r) = (480.0, 160.0, 100.0);
        let mut angle = 0.0;
        for (i, (emotion, share)) in detected.iter().zip(&shares).enumerate() {
            let sweep = share / total * 2.0 * PI;
            let color = EMOTION_COLORS[i % EMOTION_COLORS.len()];
            svg.slice(cx, cy, r, angle, angle + sweep, color);
            angle += sweep;

            let y = 70.0 + i as f64 * 22.0;
            svg.rect(600.0, y - 10.0, 12.0, 12.0, color);
            svg.text(618.0, y, "start", 11, &format!("{} {:.1}%", title_case(emotion), share));
        }
    }
    encode(svg.finish())
}

/// Indicator counts per detected risk category, coloured by severity.
pub fn risk_chart(data: &ReportData) -> Option<String> {
    let risks = data.risk["detected_risks"].as_object().filter(|r| !r.is_empty())?;
    let bars: Vec<(String, f64, &str)> = risks
        .iter()
        .map(|(kind, details)| {
            (
                title_case(kind),
                details["count"].as_f64().unwrap_or(0.0),
                severity_color(details["severity"].as_str().unwrap_or("")),
            )
        })
        .collect();
    Some(encode(bar_chart("Risk Assessment by Category", "Indicators", &bars)))
}

pub fn topics_chart(data: &ReportData) -> Option<String> {
    let topics = data.topics["categorized_topics"].as_object().filter(|t| !t.is_empty())?;
    let bars: Vec<(String, f64, &str)> = topics
        .iter()
        .enumerate()
        .map(|(i, (category, phrases))| {
            (
                title_case(category),
                phrases.as_array().map_or(0, Vec::len) as f64,
                BUSINESS_COLORS[i % BUSINESS_COLORS.len()],
            )
        })
        .collect();
    Some(encode(bar_chart("Topic Distribution by Category", "Topics", &bars)))
}

/// Overview of which kinds of business metric were found. Only drawn when
/// financial data or performance indicators exist.
pub fn metrics_chart(data: &ReportData) -> Option<String> {
    let metrics = &data.metrics;
    let has_financial = metrics["has_financial_data"].as_bool().unwrap_or(false);
    let performance = list(&metrics["performance_indicators"]);
    if !has_financial && performance.is_empty() {
        return None;
    }

    let mut entries: Vec<(&str, f64)> = Vec::new();
    if has_financial {
        entries.push(("Financial Data", 100.0));
    }
    if metrics["has_performance_data"].as_bool().unwrap_or(false) {
        entries.push(("Performance Data", 100.0));
    }
    let roi = list(&metrics["roi_indicators"]);
    if !roi.is_empty() {
        entries.push(("ROI Indicators", roi.len() as f64 * 20.0));
    }
    if !performance.is_empty() {
        entries.push(("Performance Metrics", performance.len() as f64 * 15.0));
    }

    let bars: Vec<(String, f64, &str)> = entries
        .into_iter()
        .enumerate()
        .map(|(i, (label, value))| (label.to_string(), value, BUSINESS_COLORS[i % BUSINESS_COLORS.len()]))
        .collect();
    Some(encode(bar_chart("Business Metrics Overview", "Score", &bars)))
}

/// Every chart the data supports, keyed by chart name.
pub fn render_all(data: &ReportData) -> Map<String, Value> {
    let mut charts = Map::new();
    charts.insert(SENTIMENT_CHART.into(), Value::String(sentiment_chart(data)));
    if let Some(chart) = risk_chart(data) {
        charts.insert(RISK_CHART.into(), Value::String(chart));
    }
    if let Some(chart) = topics_chart(data) {
        charts.insert(TOPICS_CHART.into(), Value::String(chart));
    }
    if let Some(chart) = metrics_chart(data) {
        charts.insert(METRICS_CHART.into(), Value::String(chart));
    }
    charts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_request;
    use serde_json::json;

    fn decode(chart: &str) -> String {
        String::from_utf8(STANDARD.decode(chart).unwrap()).unwrap()
    }

    #[test]
    fn test_sentiment_colors() {
        assert_eq!(sentiment_color(20.0), "#DC143C");
        assert_eq!(sentiment_color(40.0), "#FFD700");
        assert_eq!(sentiment_color(59.9), "#FFD700");
        assert_eq!(sentiment_color(60.0), "#2E8B57");
        assert_eq!(severity_color("high"), "#dc3545");
        assert_eq!(severity_color("extreme"), UNKNOWN_SEVERITY);
    }

    #[test]
    fn test_all_charts_for_full_data() {
        let data = ReportData::from_request(&sample_request());
        let charts = render_all(&data);
        assert_eq!(charts.len(), 4);

        let risk = decode(charts[RISK_CHART].as_str().unwrap());
        assert!(risk.starts_with("<svg"));
        assert!(risk.contains("#ffc107"));
        assert!(risk.contains(">Financial</text>"));

        let sentiment = decode(charts[SENTIMENT_CHART].as_str().unwrap());
        assert!(sentiment.contains("#2E8B57"));
        assert!(sentiment.contains("Trust 60.0%"));
    }

    #[test]
    fn test_sparse_data_only_sentiment() {
        let data = ReportData::from_request(&json!({}));
        let charts = render_all(&data);
        assert_eq!(charts.len(), 1);
        assert!(decode(charts[SENTIMENT_CHART].as_str().unwrap()).contains("No emotions detected"));
    }

    #[test]
    fn test_single_emotion_draws_full_circle() {
        let data = ReportData::from_request(&json!({
            "emotions": {"emotions_detected": ["joy"], "emotion_percentages": {"joy": 100.0}}
        }));
        assert!(decode(&sentiment_chart(&data)).contains("<circle"));
    }
}
