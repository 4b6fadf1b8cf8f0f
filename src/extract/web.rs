use serde::Deserialize;
use serde_json::Value;

use super::{Fragments, Text, items, parse_at, scan_info};
use crate::core::{FindingRecord, SeverityLevel, WebFinding, danger_label};
use crate::error::ErrorKind;

const VULS_LIST: &str = "/categories/2/children/1/data/risk_distribution/web_scan_vuls_list";

#[derive(Debug, Deserialize)]
struct VulnGroup {
    i18n_name: Text,
    severity_points: Text,
    risk_level: Text,
    web_vuln_obj: VulnInfo,
    pages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct VulnInfo {
    cvss: Text,
    i18n_description: Fragments,
    i18n_solution: Fragments,
    is_dangerous: Value,
}

#[derive(Debug, Deserialize)]
struct AffectedPage {
    url: Text,
    #[serde(default)]
    method: Text,
    #[serde(default)]
    param: Text,
    #[serde(default)]
    verification: Text,
    #[serde(default)]
    raw_data: Vec<RawExchange>,
}

#[derive(Debug, Deserialize)]
struct RawExchange {
    request: RawRequest,
    response: RawResponse,
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    url: Text,
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    status: Text,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    contents: Vec<Text>,
}

/// A `[name, value, ...]` header entry. Entries past the value are ignored.
#[derive(Debug, Deserialize)]
#[serde(try_from = "Vec<Text>")]
struct Header(Text, Text);

impl TryFrom<Vec<Text>> for Header {
    type Error = String;

    fn try_from(entry: Vec<Text>) -> Result<Self, Self::Error> {
        let len = entry.len();
        let mut it = entry.into_iter();
        match (it.next(), it.next()) {
            (Some(name), Some(value)) => Ok(Header(name, value)),
            _ => Err(format!("请求头应至少包含名称和值，实际 {len} 项")),
        }
    }
}

pub(super) fn extract(payload: &Value) -> Result<Vec<FindingRecord>, ErrorKind> {
    let scan = scan_info(payload)?;
    let mut records = Vec::new();

    for (i, group) in items(payload, VULS_LIST)?.iter().enumerate() {
        let group_ptr = format!("{VULS_LIST}/{i}");
        let group: VulnGroup = parse_at(group, &group_ptr)?;
        let level = group.risk_level.0.parse::<SeverityLevel>()?;
        let dangerous = danger_label(&group.web_vuln_obj.is_dangerous)?;

        for (j, page) in group.pages.iter().enumerate() {
            let page: AffectedPage = parse_at(page, &format!("{group_ptr}/pages/{j}"))?;
            let (raw_request, raw_response) = match page.raw_data.first() {
                Some(exchange) => (
                    request_text(&exchange.request),
                    response_text(&exchange.response),
                ),
                None => (String::new(), String::new()),
            };

            records.push(FindingRecord::Web(WebFinding {
                ip: scan.target.0.clone(),
                url: page.url.0,
                method: page.method.0,
                param: page.param.0,
                verification: page.verification.0,
                name: group.i18n_name.0.clone(),
                severity_points: group.severity_points.0.clone(),
                level: level.label().to_string(),
                cvss: group.web_vuln_obj.cvss.0.clone(),
                description: group.web_vuln_obj.i18n_description.0.clone(),
                solution: group.web_vuln_obj.i18n_solution.0.clone(),
                dangerous: dangerous.to_string(),
                raw_request,
                raw_response,
                scan_start: scan.time_start.0.clone(),
                scan_end: scan.time_end.0.clone(),
            }));
        }
    }

    Ok(records)
}

fn request_text(request: &RawRequest) -> String {
    let mut out = format!("{}\n", request.url.0);
    push_headers(&mut out, &request.headers);
    out
}

fn response_text(response: &RawResponse) -> String {
    let mut out = format!("{}\n", response.status.0);
    push_headers(&mut out, &response.headers);
    for chunk in &response.contents {
        out.push_str(&chunk.0);
        out.push('\n');
    }
    out
}

fn push_headers(out: &mut String, headers: &[Header]) {
    for Header(name, value) in headers {
        out.push_str(&format!("{}: {}\n", name.0, value.0));
    }
}
