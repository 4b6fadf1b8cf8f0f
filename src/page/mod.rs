use std::path::Path;

use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{ErrorKind, PageError, Stage};

const ASSIGNMENT_TARGET: &str = "window.data";

pub fn load(path: &Path) -> Result<Value, PageError> {
    let html = std::fs::read_to_string(path).map_err(|e| ErrorKind::Io(e).at(path, Stage::Load))?;
    decode_payload(&html).map_err(|kind| kind.at(path, Stage::Load))
}

pub fn decode_payload(html: &str) -> Result<Value, ErrorKind> {
    let script = first_script_text(html)?;
    let json = strip_assignment(&script)?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| ErrorKind::MalformedPage(format!("JSON 解析失败: {e}")))?;
    if !value.is_object() {
        return Err(ErrorKind::MalformedPage(
            "window.data 不是 JSON 对象".to_string(),
        ));
    }
    Ok(value)
}

fn first_script_text(html: &str) -> Result<String, ErrorKind> {
    let selector = Selector::parse("script")
        .map_err(|e| ErrorKind::MalformedPage(format!("选择器无效: {e:?}")))?;
    let document = Html::parse_document(html);
    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| ErrorKind::MalformedPage("未找到 <script> 元素".to_string()))?;
    Ok(script.text().collect())
}

fn strip_assignment(script: &str) -> Result<&str, ErrorKind> {
    let body = script
        .trim()
        .strip_prefix(ASSIGNMENT_TARGET)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or_else(|| {
            ErrorKind::MalformedPage(format!("第一个 <script> 不是 `{ASSIGNMENT_TARGET} = ...` 赋值"))
        })?
        .trim();
    Ok(body.strip_suffix(';').unwrap_or(body).trim_end())
}
