use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Middle,
    High,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 3] = [
        SeverityLevel::High,
        SeverityLevel::Middle,
        SeverityLevel::Low,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SeverityLevel::Low => "low",
            SeverityLevel::Middle => "middle",
            SeverityLevel::High => "high",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SeverityLevel::Low => "低",
            SeverityLevel::Middle => "中",
            SeverityLevel::High => "高",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.label() == label)
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(SeverityLevel::Low),
            "middle" => Ok(SeverityLevel::Middle),
            "high" => Ok(SeverityLevel::High),
            other => Err(ErrorKind::UnknownSeverityLevel(other.to_string())),
        }
    }
}

pub fn danger_label(value: &Value) -> Result<&'static str, ErrorKind> {
    match value {
        Value::Bool(true) => Ok("是"),
        Value::Bool(false) => Ok("否"),
        other => Err(ErrorKind::UnknownFlagValue(other.to_string())),
    }
}
