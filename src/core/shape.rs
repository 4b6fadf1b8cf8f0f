use serde::{Deserialize, Serialize};
use std::fmt;

pub const HOST_COLUMNS: [&str; 15] = [
    "IP地址",
    "端口",
    "服务",
    "协议",
    "漏洞名称",
    "漏洞级别",
    "详细描述",
    "解决方案",
    "威胁分值",
    "危险插件",
    "发现日期",
    "CVE编号",
    "扫描起始时间",
    "扫描结束时间",
    "漏洞ID",
];

pub const WEB_COLUMNS: [&str; 16] = [
    "IP地址",
    "URL",
    "请求方式",
    "问题参数",
    "参考（验证）",
    "漏洞名称",
    "威胁分值",
    "漏洞级别",
    "CVSS评分",
    "详细描述",
    "解决办法",
    "危险插件",
    "原始请求",
    "原始响应",
    "扫描起始时间",
    "扫描结束时间",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportShape {
    #[serde(rename = "host")]
    HostScan,
    #[serde(rename = "web")]
    WebScan,
}

impl ReportShape {
    pub const fn as_str(self) -> &'static str {
        match self {
            ReportShape::HostScan => "host",
            ReportShape::WebScan => "web",
        }
    }

    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            ReportShape::HostScan => &HOST_COLUMNS,
            ReportShape::WebScan => &WEB_COLUMNS,
        }
    }

    /// Maps the scanner's `vulnTemplate` name to a shape. `自动匹配扫描` is the
    /// legacy name of the all-vulnerability template.
    pub fn from_template(name: &str) -> Option<Self> {
        match name.trim() {
            "全部漏洞扫描" | "自动匹配扫描" => Some(ReportShape::HostScan),
            "Web全部应用漏洞" => Some(ReportShape::WebScan),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ReportShape::HostScan => "主机漏洞扫描",
            ReportShape::WebScan => "Web应用扫描",
        }
    }
}

impl fmt::Display for ReportShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
