use serde_json::Value;

use crate::core::ReportShape;
use crate::error::ErrorKind;

const SITE_LIST: &str = "站点列表";
const VULN_LIST: &str = "漏洞列表";
const HOST_INFO: &str = "主机信息";
const VULN_INFO: &str = "漏洞信息";

const TEMPLATE_POINTER: &str = "/categories/0/children/0/data/vulnTemplate";

pub fn detect(index: &Value) -> Result<ReportShape, ErrorKind> {
    let titles = section_titles(index);
    let template = template_name(index);
    let Some(shape) = classify_titles(&titles) else {
        return Err(ErrorKind::UnsupportedShape {
            template: template.unwrap_or_else(|| "<unknown>".to_string()),
            titles,
        });
    };

    if let Some(name) = template.as_deref() {
        match ReportShape::from_template(name) {
            Some(by_template) if by_template != shape => {
                tracing::warn!(
                    template = name,
                    by_titles = %shape,
                    by_template = %by_template,
                    "模板名称与章节标题判定的报表类型不一致，以章节标题为准"
                );
            }
            None => tracing::debug!(template = name, shape = %shape, "未登记的模板名称"),
            _ => {}
        }
    }

    Ok(shape)
}

/// Shape named by a report page's own section titles, if they name exactly one.
pub fn page_shape(payload: &Value) -> Option<ReportShape> {
    classify_titles(&section_titles(payload))
}

fn classify_titles(titles: &[String]) -> Option<ReportShape> {
    let has = |marker: &str| titles.iter().any(|t| t == marker);

    let web = has(SITE_LIST) && has(VULN_LIST);
    let host = has(HOST_INFO) && has(VULN_INFO);
    match (web, host) {
        (true, false) => Some(ReportShape::WebScan),
        (false, true) => Some(ReportShape::HostScan),
        _ => None,
    }
}

pub fn section_titles(payload: &Value) -> Vec<String> {
    payload
        .get("categories")
        .and_then(Value::as_array)
        .map(|categories| {
            categories
                .iter()
                .filter_map(|c| c.get("title").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn template_name(payload: &Value) -> Option<String> {
    match payload.pointer(TEMPLATE_POINTER)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
