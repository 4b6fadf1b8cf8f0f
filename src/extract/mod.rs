use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::core::{FindingRecord, ReportShape};
use crate::error::ErrorKind;

mod host;
mod web;

const SCAN_INFO: &str = "/categories/0/data";

/// A fragment that is missing or empty stands for a paragraph break in the
/// scanner's text lists.
const FRAGMENT_BREAK: &str = "\r\n";

pub fn extract(shape: ReportShape, payload: &Value) -> Result<Vec<FindingRecord>, ErrorKind> {
    match shape {
        ReportShape::HostScan => host::extract(payload),
        ReportShape::WebScan => web::extract(payload),
    }
}

/// Any JSON scalar rendered as display text. `null` becomes the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Text(String);

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Text(render(&Value::deserialize(deserializer)?)))
    }
}

/// Text stored either as one string or as a list of optional fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Fragments(String);

impl<'de> Deserialize<'de> for Fragments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let joined = match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => FRAGMENT_BREAK.to_string(),
                    Value::String(s) if s.is_empty() => FRAGMENT_BREAK.to_string(),
                    other => render(other),
                })
                .collect(),
            other => render(&other),
        };
        Ok(Fragments(joined))
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ScanInfo {
    target: Text,
    #[serde(rename = "timeStart")]
    time_start: Text,
    #[serde(rename = "timeEnd")]
    time_end: Text,
}

fn scan_info(payload: &Value) -> Result<ScanInfo, ErrorKind> {
    parse_at(node(payload, SCAN_INFO)?, SCAN_INFO)
}

fn node<'a>(payload: &'a Value, pointer: &str) -> Result<&'a Value, ErrorKind> {
    payload
        .pointer(pointer)
        .ok_or_else(|| ErrorKind::schema(pointer, "路径不存在"))
}

fn items<'a>(payload: &'a Value, pointer: &str) -> Result<&'a [Value], ErrorKind> {
    node(payload, pointer)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ErrorKind::schema(pointer, "应为数组"))
}

fn parse_at<T: DeserializeOwned>(value: &Value, pointer: &str) -> Result<T, ErrorKind> {
    T::deserialize(value).map_err(|e| ErrorKind::schema(pointer, e))
}
