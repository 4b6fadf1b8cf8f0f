use crate::core::ReportShape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFinding {
    pub ip: String,
    pub port: String,
    pub service: String,
    pub protocol: String,
    pub name: String,
    pub level: String,
    pub description: String,
    pub solution: String,
    pub severity_points: String,
    pub dangerous: String,
    pub date_found: String,
    pub cve_id: String,
    pub scan_start: String,
    pub scan_end: String,
    pub vul_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebFinding {
    pub ip: String,
    pub url: String,
    pub method: String,
    pub param: String,
    pub verification: String,
    pub name: String,
    pub severity_points: String,
    pub level: String,
    pub cvss: String,
    pub description: String,
    pub solution: String,
    pub dangerous: String,
    pub raw_request: String,
    pub raw_response: String,
    pub scan_start: String,
    pub scan_end: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindingRecord {
    Host(HostFinding),
    Web(WebFinding),
}

impl FindingRecord {
    pub const fn shape(&self) -> ReportShape {
        match self {
            FindingRecord::Host(_) => ReportShape::HostScan,
            FindingRecord::Web(_) => ReportShape::WebScan,
        }
    }

    /// Cells in the column order of `self.shape().columns()`.
    pub fn into_cells(self) -> Vec<String> {
        match self {
            FindingRecord::Host(f) => vec![
                f.ip,
                f.port,
                f.service,
                f.protocol,
                f.name,
                f.level,
                f.description,
                f.solution,
                f.severity_points,
                f.dangerous,
                f.date_found,
                f.cve_id,
                f.scan_start,
                f.scan_end,
                f.vul_id,
            ],
            FindingRecord::Web(f) => vec![
                f.ip,
                f.url,
                f.method,
                f.param,
                f.verification,
                f.name,
                f.severity_points,
                f.level,
                f.cvss,
                f.description,
                f.solution,
                f.dangerous,
                f.raw_request,
                f.raw_response,
                f.scan_start,
                f.scan_end,
            ],
        }
    }
}
