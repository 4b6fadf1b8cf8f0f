use serde::Deserialize;
use serde_json::Value;

use super::{Fragments, Text, items, parse_at, scan_info};
use crate::core::{FindingRecord, HostFinding, SeverityLevel, danger_label};
use crate::error::ErrorKind;

const VUL_ITEMS: &str = "/categories/1/children/1/data/vul_items";

#[derive(Debug, Deserialize)]
struct ServiceGroup {
    port: Text,
    service: Text,
    protocol: Text,
    vuls: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Occurrence {
    vul_level: Text,
    vul_id: Text,
    vul_msg: VulMsg,
}

#[derive(Debug, Deserialize)]
struct VulMsg {
    i18n_name: Text,
    i18n_description: Fragments,
    i18n_solution: Fragments,
    severity_points: Text,
    is_dangerous: Value,
    date_found: Text,
    cve_id: Text,
}

pub(super) fn extract(payload: &Value) -> Result<Vec<FindingRecord>, ErrorKind> {
    let scan = scan_info(payload)?;
    let mut records = Vec::new();

    for (i, group) in items(payload, VUL_ITEMS)?.iter().enumerate() {
        let group_ptr = format!("{VUL_ITEMS}/{i}");
        let group: ServiceGroup = parse_at(group, &group_ptr)?;

        for (j, occurrence) in group.vuls.iter().enumerate() {
            let occ: Occurrence = parse_at(occurrence, &format!("{group_ptr}/vuls/{j}"))?;
            let level = occ.vul_level.0.parse::<SeverityLevel>()?;
            let dangerous = danger_label(&occ.vul_msg.is_dangerous)?;

            records.push(FindingRecord::Host(HostFinding {
                ip: scan.target.0.clone(),
                port: group.port.0.clone(),
                service: group.service.0.clone(),
                protocol: group.protocol.0.clone(),
                name: occ.vul_msg.i18n_name.0,
                level: level.label().to_string(),
                description: occ.vul_msg.i18n_description.0,
                solution: occ.vul_msg.i18n_solution.0,
                severity_points: occ.vul_msg.severity_points.0,
                dangerous: dangerous.to_string(),
                date_found: occ.vul_msg.date_found.0,
                cve_id: occ.vul_msg.cve_id.0,
                scan_start: scan.time_start.0.clone(),
                scan_end: scan.time_end.0.clone(),
                vul_id: occ.vul_id.0,
            }));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn occurrence(id: u64, level: &str, name: &str, cve: &str) -> Value {
        json!({
            "vul_id": id,
            "vul_level": level,
            "vul_msg": {
                "i18n_name": name,
                "i18n_description": ["描述一", null, "描述二"],
                "i18n_solution": ["升级到最新版本"],
                "severity_points": 7.5,
                "is_dangerous": false,
                "date_found": "2024-03-01",
                "cve_id": cve
            }
        })
    }

    fn payload(groups: Value) -> Value {
        json!({
            "categories": [
                {
                    "title": "概述",
                    "data": {
                        "target": "192.168.1.10",
                        "timeStart": "2024-05-01 09:00:00",
                        "timeEnd": "2024-05-01 10:30:00"
                    }
                },
                {
                    "title": "漏洞信息",
                    "children": [
                        { "data": {} },
                        { "data": { "vul_items": groups } }
                    ]
                }
            ]
        })
    }

    fn host(record: &FindingRecord) -> &HostFinding {
        match record {
            FindingRecord::Host(h) => h,
            other => panic!("expected host record, got {other:?}"),
        }
    }

    #[test]
    fn one_group_two_occurrences_share_service_and_scan_fields() {
        let p = payload(json!([{
            "port": 22,
            "service": "ssh",
            "protocol": "tcp",
            "vuls": [
                occurrence(101, "high", "OpenSSH 命令注入", "CVE-2020-15778"),
                occurrence(102, "low", "SSH 弱加密算法", "")
            ]
        }]));

        let records = extract(&p).expect("extract");
        assert_eq!(records.len(), 2);

        let (a, b) = (host(&records[0]), host(&records[1]));
        for r in [a, b] {
            assert_eq!(r.ip, "192.168.1.10");
            assert_eq!(r.port, "22");
            assert_eq!(r.service, "ssh");
            assert_eq!(r.protocol, "tcp");
            assert_eq!(r.scan_start, "2024-05-01 09:00:00");
            assert_eq!(r.scan_end, "2024-05-01 10:30:00");
            assert_eq!(r.description, "描述一\r\n描述二");
            assert_eq!(r.severity_points, "7.5");
            assert_eq!(r.dangerous, "否");
        }
        assert_eq!((a.name.as_str(), b.name.as_str()), ("OpenSSH 命令注入", "SSH 弱加密算法"));
        assert_eq!((a.level.as_str(), b.level.as_str()), ("高", "低"));
        assert_eq!((a.cve_id.as_str(), b.cve_id.as_str()), ("CVE-2020-15778", ""));
        assert_eq!((a.vul_id.as_str(), b.vul_id.as_str()), ("101", "102"));
    }

    #[test]
    fn every_record_has_fifteen_cells() {
        let p = payload(json!([
            { "port": 80, "service": "http", "protocol": "tcp",
              "vuls": [occurrence(1, "middle", "a", "")] },
            { "port": 0, "service": "", "protocol": "icmp", "vuls": [] },
            { "port": "161", "service": "snmp", "protocol": "udp",
              "vuls": [occurrence(2, "low", "b", ""), occurrence(3, "high", "c", "")] }
        ]));
        let records = extract(&p).expect("extract");
        assert_eq!(records.len(), 3);
        for r in records {
            assert_eq!(r.into_cells().len(), 15);
        }
    }

    #[test]
    fn unknown_level_aborts_page() {
        let p = payload(json!([{
            "port": 22, "service": "ssh", "protocol": "tcp",
            "vuls": [occurrence(1, "low", "ok", ""), occurrence(2, "critical", "bad", "")]
        }]));
        match extract(&p) {
            Err(ErrorKind::UnknownSeverityLevel(v)) => assert_eq!(v, "critical"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_boolean_danger_flag_aborts_page() {
        let mut occ = occurrence(1, "low", "x", "");
        occ["vul_msg"]["is_dangerous"] = json!("yes");
        let p = payload(json!([{ "port": 1, "service": "s", "protocol": "tcp", "vuls": [occ] }]));
        assert!(matches!(extract(&p), Err(ErrorKind::UnknownFlagValue(_))));
    }

    #[test]
    fn missing_field_names_its_location() {
        let mut occ = occurrence(1, "low", "x", "");
        occ["vul_msg"].as_object_mut().unwrap().remove("cve_id");
        let p = payload(json!([{ "port": 1, "service": "s", "protocol": "tcp", "vuls": [occ] }]));
        match extract(&p) {
            Err(ErrorKind::Schema { pointer, message }) => {
                assert_eq!(pointer, format!("{VUL_ITEMS}/0/vuls/0"));
                assert!(message.contains("cve_id"), "{message}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_summary_section_is_schema_error() {
        let p = json!({
            "categories": [{ "data": { "target": "1", "timeStart": "", "timeEnd": "" } }]
        });
        assert!(matches!(extract(&p), Err(ErrorKind::Schema { .. })));
    }
}
