use chrono::{Datelike, NaiveDate, Utc};

/// Upper bound for a manually entered cost figure (1000億円).
pub const MAX_COST_INPUT: u64 = 100_000_000_000;

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Groups the integer part with commas and keeps up to two decimals,
/// trimming trailing zeros ("1234567.5" -> "1,234,567.5").
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let negative = value < 0.0;
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let frac = frac_part.trim_end_matches('0');
    let mut out = String::new();
    if negative && (int_part != "0" || !frac.is_empty()) {
        out.push('-');
    }
    out.push_str(&grouped);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn format_yen(value: f64) -> String {
    format!("¥{}", format_number(value))
}

pub fn format_rate(rate: f64) -> String {
    let rate = if rate.is_finite() { rate } else { 0.0 };
    let text = format!("{:.1}", rate);
    if text == "-0.0" {
        return "0.0%".to_string();
    }
    format!("{}%", text)
}

/// "2023-01-05" -> "2023年1月5日"
pub fn format_date_jp(date: NaiveDate) -> String {
    format!("{}年{}月{}日", date.year(), date.month(), date.day())
}

/// Parses a typed amount, tolerating thousands separators and a leading yen sign.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .trim_start_matches('¥')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Cost inputs accept digits and comma grouping only. Anything else is
/// dropped, an empty result counts as zero and the value is capped.
pub fn parse_cost_input(value: &str) -> u64 {
    if value.trim_start().starts_with('-') {
        return 0;
    }
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    digits
        .parse::<u64>()
        .unwrap_or(MAX_COST_INPUT)
        .min(MAX_COST_INPUT)
}

pub fn normalize_date(value: Option<String>) -> Option<NaiveDate> {
    let raw = value?.trim().to_string();
    if raw.is_empty() {
        return None;
    }

    let formats = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&raw, fmt).ok())
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
