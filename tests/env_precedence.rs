use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

fn base_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rsasconv"));
    cmd.env("HOME", home);
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("RSASCONV_CONFIG");
    cmd.env_remove("RSASCONV_RSAS_VERSION");
    cmd.env_remove("RSASCONV_BUNDLE_HTMLS_FOLDER");
    cmd.env_remove("RSASCONV_BUNDLE_HTML_NAME_TEMPLATE");
    cmd.env_remove("RSASCONV_BUNDLE_INDEX_HTML");
    cmd.env_remove("RSASCONV_RUN_WORKERS");
    cmd.env_remove("RSASCONV_RUN_TMP_FOLDER");
    cmd.env_remove("RSASCONV_OUTPUT_SHEET_NAME");
    cmd.env_remove("RSASCONV_LOGS_ENABLED");
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!("rsasconv-env-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

fn show_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd
        .args(["config", "--show", "--json"])
        .output()
        .expect("run rsasconv");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("parse json")
}

#[test]
fn env_overrides_config_file() {
    let home = make_temp_home();
    write_file(
        home.join(".config/rsasconv/config.toml").as_path(),
        r#"
[run]
workers = 2

[output]
sheet_name = "来自文件"

[logs]
enabled = true
"#
        .as_bytes(),
    );

    let v = {
        let mut cmd = base_cmd(&home);
        cmd.env("RSASCONV_RUN_WORKERS", "5");
        cmd.env("RSASCONV_OUTPUT_SHEET_NAME", "来自环境");
        cmd.env("RSASCONV_LOGS_ENABLED", "off");
        show_json(&mut cmd)
    };
    assert_eq!(v["run"]["workers"], 5);
    assert_eq!(v["output"]["sheet_name"], "来自环境");
    assert_eq!(v["logs"]["enabled"], false);

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn env_config_path_is_used_when_flag_absent() {
    let home = make_temp_home();
    let custom = home.join("elsewhere/rsasconv.toml");
    write_file(&custom, b"[bundle]\nhtml_name_template = \"*.htm*\"\n");

    let v = {
        let mut cmd = base_cmd(&home);
        cmd.env("RSASCONV_CONFIG", &custom);
        show_json(&mut cmd)
    };
    assert_eq!(v["bundle"]["html_name_template"], "*.htm*");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn invalid_env_values_exit_2() {
    let home = make_temp_home();
    for (key, value) in [
        ("RSASCONV_RUN_WORKERS", "many"),
        ("RSASCONV_LOGS_ENABLED", "maybe"),
        ("RSASCONV_BUNDLE_HTML_NAME_TEMPLATE", "["),
        ("RSASCONV_OUTPUT_SHEET_NAME", "a:b"),
    ] {
        let out = base_cmd(&home)
            .env(key, value)
            .args(["config", "--show"])
            .output()
            .expect("run rsasconv");
        assert_eq!(out.status.code(), Some(2), "{key}={value}");
    }
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn empty_htmls_folder_env_reads_pages_from_bundle_root() {
    let home = make_temp_home();
    let root = home.join("bundle");
    let page = |payload: serde_json::Value| {
        format!("<html><head><script>window.data = {payload};</script></head></html>")
    };
    write_file(
        &root.join("index.html"),
        page(serde_json::json!({ "categories": [
            { "title": "概述", "children": [{ "data": { "vulnTemplate": "全部漏洞扫描" } }] },
            { "title": "主机信息" },
            { "title": "漏洞信息" }
        ] }))
        .as_bytes(),
    );
    write_file(
        &root.join("10.0.0.1.html"),
        page(serde_json::json!({ "categories": [
            { "data": { "target": "10.0.0.1", "timeStart": "s", "timeEnd": "e" } },
            { "children": [{}, { "data": { "vul_items": [{
                "port": 22, "service": "ssh", "protocol": "tcp",
                "vuls": [{
                    "vul_id": 7,
                    "vul_level": "high",
                    "vul_msg": {
                        "i18n_name": "弱口令",
                        "i18n_description": ["d"],
                        "i18n_solution": ["s"],
                        "severity_points": 9,
                        "is_dangerous": true,
                        "date_found": "2024-01-01",
                        "cve_id": ""
                    }
                }]
            }] } }] }
        ] }))
        .as_bytes(),
    );
    let output = home.join("out.json");

    let out = base_cmd(&home)
        .env("RSASCONV_BUNDLE_HTMLS_FOLDER", "")
        .args(["convert", "-i"])
        .arg(&root)
        .arg("-o")
        .arg(&output)
        .output()
        .expect("run rsasconv");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    let v: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&output).expect("read output")).expect("json");
    let rows = v["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "10.0.0.1");

    let _ = std::fs::remove_dir_all(&home);
}
