//! Local file sources and HTML scraping.

use super::json::{normalize_nested, value_to_table};
use super::read_table;
use crate::error::{EtlError, Result};
use crate::types::FileFormat;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{error, info};

// Opening tags only; the matching close tag is found by `span_text`.
static CURRENT_TEMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span[^>]*class\s*=\s*["'][^"']*\bwfCurrentTemp\b[^"']*["'][^>]*>"#)
        .expect("Invalid regex: CURRENT_TEMP")
});

static FEELS_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<span[^>]*class\s*=\s*["'][^"']*\bwfCurrentFeelTemp\b[^"']*["'][^>]*>"#)
        .expect("Invalid regex: FEELS_LIKE")
});

static SPAN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)span\b[^>]*>").expect("Invalid regex: SPAN_TAG"));

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("Invalid regex: TAGS"));

fn read_json_file(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| {
        error!("Error reading JSON file {}: {}", path.display(), e);
        EtlError::read_failed(path.display().to_string(), e)
    })?;
    serde_json::from_str(&text).map_err(|e| {
        error!("Error parsing JSON file {}: {}", path.display(), e);
        EtlError::read_failed(path.display().to_string(), e)
    })
}

/// Read a JSON records file into a table.
pub fn read_json_records(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    info!("Starting extraction of records from {}", path.display());
    let df = value_to_table(&read_json_file(path)?)?;
    info!("Extracted {:?} from {}", df.shape(), path.display());
    Ok(df)
}

/// Read a JSON file and explode one nested array into rows.
///
/// Each child record of `record_path` becomes a row carrying the parent's
/// `meta` fields.
pub fn read_nested_json(path: impl AsRef<Path>, record_path: &str, meta: &[&str]) -> Result<DataFrame> {
    let path = path.as_ref();
    info!("Starting extraction of nested records from {}", path.display());
    let df = normalize_nested(&read_json_file(path)?, record_path, meta)?;
    info!("Extracted and flattened {:?} from {}", df.shape(), path.display());
    Ok(df)
}

/// Read a local CSV, JSON or Parquet file by its extension.
pub fn read_local_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let format = FileFormat::from_extension(&name)
        .ok_or_else(|| EtlError::read_failed(&name, "unrecognised file extension"))?;
    let bytes = fs::read(path).map_err(|e| EtlError::read_failed(&name, e))?;
    read_table(bytes, format, &name)
}

/// Text of the span opened by `open`, up to its matching `</span>`.
///
/// Nested spans are kept; an unclosed span yields `None`.
fn span_text(open: &Regex, html: &str) -> Option<String> {
    let body = &html[open.find(html)?.end()..];

    let mut depth = 1usize;
    for tag in SPAN_TAG.captures_iter(body) {
        if tag.get(1).is_some_and(|close| close.is_empty()) {
            depth += 1;
            continue;
        }
        depth -= 1;
        if depth == 0 {
            let inner = &body[..tag.get(0)?.start()];
            let text = TAGS.replace_all(inner, "");
            return Some(text.trim().to_string());
        }
    }
    None
}

/// Uppercase the first character, lowercase the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Pull the current and felt temperature out of a forecast page.
///
/// Returns one row `{city, temperature, feels_like}`. Fails when either
/// span is missing.
pub fn scrape_current_weather(city: &str, html: &str) -> Result<DataFrame> {
    let temperature = span_text(&CURRENT_TEMP, html);
    let feels_like = span_text(&FEELS_LIKE, html);

    let (Some(temperature), Some(feels_like)) = (temperature, feels_like) else {
        error!("Could not find temperature data on the page");
        return Err(EtlError::read_failed(
            "weather page",
            "could not find temperature data on the page",
        ));
    };

    let city_label = capitalize(city);
    let df = df!(
        "city" => [city_label.as_str()],
        "temperature" => [temperature.as_str()],
        "feels_like" => [feels_like.as_str()]
    )?;
    info!("Extracted weather data for {}", city);
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::str_values;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"
        <div class="wfCurrentContainer">
          <span class="wfCurrentTemp">+21&deg;</span>
          <span class="wfCurrentFeelTemp"> <b>+19&deg;</b> </span>
        </div>"#;

    #[test]
    fn test_scrape_current_weather() {
        let df = scrape_current_weather("sofia", PAGE).unwrap();
        assert_eq!(str_values(&df, "city").unwrap(), vec![Some("Sofia".to_string())]);
        assert_eq!(
            str_values(&df, "temperature").unwrap(),
            vec![Some("+21&deg;".to_string())]
        );
        assert_eq!(
            str_values(&df, "feels_like").unwrap(),
            vec![Some("+19&deg;".to_string())]
        );
    }

    #[test]
    fn test_scrape_keeps_text_after_nested_span() {
        let page = r#"<span class="wfCurrentTemp"><span class="sign">+</span>21&deg;</span>
            <span class="wfCurrentFeelTemp">19</span>"#;
        let df = scrape_current_weather("sofia", page).unwrap();
        assert_eq!(
            str_values(&df, "temperature").unwrap(),
            vec![Some("+21&deg;".to_string())]
        );
    }

    #[test]
    fn test_unclosed_span_is_missing() {
        assert_eq!(span_text(&CURRENT_TEMP, r#"<span class="wfCurrentTemp">21"#), None);
    }

    #[test]
    fn test_scrape_missing_node_fails() {
        let err = scrape_current_weather("sofia", "<span class=\"wfCurrentTemp\">1</span>").unwrap_err();
        assert_eq!(err.error_code(), "READ_FAILED");
    }

    #[test]
    fn test_read_local_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let customers = dir.path().join("customers.json");
        fs::write(&customers, r#"[{"customer_id": 1, "name": "Ann", "email": "ann@x.io"}]"#).unwrap();
        let orders = dir.path().join("orders.json");
        fs::write(
            &orders,
            r#"[{"order_id": 7, "customer_id": 1, "order_details": [{"product": "pen", "quantity": 2, "price": 1.5}]}]"#,
        )
        .unwrap();

        let df = read_json_records(&customers).unwrap();
        assert_eq!(df.shape(), (1, 3));

        let df = read_nested_json(&orders, "order_details", &["order_id", "customer_id"]).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["product", "quantity", "price", "order_id", "customer_id"]);

        assert!(read_json_records(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("sOFIA"), "Sofia");
        assert_eq!(capitalize(""), "");
    }
}
