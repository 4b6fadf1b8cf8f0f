use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::BundleConfig;

#[derive(Debug, Clone)]
pub struct ReportBundle {
    pub root: PathBuf,
    pub index: PathBuf,
    pub pages: Vec<PathBuf>,
}

/// A bundle plus the temporary directory it was extracted into, if any. The
/// directory is removed when this value is dropped.
#[derive(Debug)]
pub struct OpenedBundle {
    pub bundle: ReportBundle,
    pub extracted_entries: Option<usize>,
    workdir: Option<TempDir>,
}

impl OpenedBundle {
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(TempDir::path)
    }
}

pub fn open(input: &Path, layout: &BundleConfig, tmp_parent: Option<&Path>) -> Result<OpenedBundle> {
    if input.is_dir() {
        let bundle = ReportBundle::discover(input, layout)?;
        return Ok(OpenedBundle {
            bundle,
            extracted_entries: None,
            workdir: None,
        });
    }

    let mut builder = tempfile::Builder::new();
    builder.prefix("rsasconv-");
    let workdir = match tmp_parent {
        Some(parent) => {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("临时目录的父目录创建失败: {}", parent.display()))?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    }
    .context("临时目录创建失败")?;

    let entries = extract_zip(input, workdir.path())
        .with_context(|| format!("压缩包解压失败: {}", input.display()))?;
    tracing::debug!(
        input = %input.display(),
        workdir = %workdir.path().display(),
        entries,
        "压缩包已解压"
    );

    let bundle = ReportBundle::discover(workdir.path(), layout)?;
    Ok(OpenedBundle {
        bundle,
        extracted_entries: Some(entries),
        workdir: Some(workdir),
    })
}

impl ReportBundle {
    pub fn discover(root: &Path, layout: &BundleConfig) -> Result<Self> {
        let matcher = name_matcher(&layout.html_name_template)?;
        let pages_root = root.join(&layout.htmls_folder);
        let index = root.join(&layout.index_html);

        let mut pages = Vec::new();
        if pages_root.is_dir() {
            for entry in WalkDir::new(&pages_root).follow_links(false) {
                let entry = entry
                    .with_context(|| format!("报表目录遍历失败: {}", pages_root.display()))?;
                if entry.file_type().is_file()
                    && matcher.is_match(entry.file_name())
                    && entry.path() != index
                {
                    pages.push(entry.into_path());
                }
            }
        } else {
            tracing::warn!(dir = %pages_root.display(), "报表页面目录不存在");
        }
        pages.sort();

        Ok(Self {
            root: root.to_path_buf(),
            index,
            pages,
        })
    }
}

pub fn validate_name_template(template: &str) -> Result<()> {
    let _ = name_matcher(template)?;
    Ok(())
}

fn name_matcher(template: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(template)
        .with_context(|| format!("页面文件名模式不正确: {template}"))?
        .compile_matcher())
}

fn extract_zip(zip_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(zip_path)
        .with_context(|| format!("无法打开压缩包: {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("不是有效的 zip 文件")?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            tracing::warn!(name = entry.name(), "跳过路径越界的压缩包条目");
            continue;
        };
        let out_path = dest.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .with_context(|| format!("目录创建失败: {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("目录创建失败: {}", parent.display()))?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("文件写入失败: {}", out_path.display()))?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("文件写入失败: {}", out_path.display()))?;
        extracted += 1;
    }

    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn make_temp_dir(tag: &str) -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "rsasconv-bundle-{tag}-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("create dir");
        dir
    }

    fn write_file(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdirs");
        }
        std::fs::write(path, bytes).expect("write");
    }

    #[test]
    fn discover_finds_matching_pages_recursively_and_sorted() {
        let root = make_temp_dir("discover");
        write_file(&root.join("index.html"), b"index");
        write_file(&root.join("host/10.0.0.2.html"), b"b");
        write_file(&root.join("host/sub/10.0.0.1.html"), b"a");
        write_file(&root.join("host/readme.txt"), b"skip");
        write_file(&root.join("other/10.0.0.3.html"), b"outside");

        let bundle = ReportBundle::discover(&root, &BundleConfig::default()).expect("discover");
        assert_eq!(bundle.index, root.join("index.html"));
        assert_eq!(
            bundle.pages,
            vec![root.join("host/10.0.0.2.html"), root.join("host/sub/10.0.0.1.html")]
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn discover_without_pages_folder_yields_no_pages() {
        let root = make_temp_dir("empty");
        let bundle = ReportBundle::discover(&root, &BundleConfig::default()).expect("discover");
        assert!(bundle.pages.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn pages_at_bundle_root_skip_the_index() {
        let root = make_temp_dir("flat");
        write_file(&root.join("index.html"), b"index");
        write_file(&root.join("10.0.0.1.html"), b"a");
        let layout = BundleConfig {
            htmls_folder: String::new(),
            ..BundleConfig::default()
        };

        let bundle = ReportBundle::discover(&root, &layout).expect("discover");
        assert_eq!(bundle.index, root.join("index.html"));
        assert_eq!(bundle.pages, vec![root.join("10.0.0.1.html")]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn invalid_template_is_rejected() {
        assert!(validate_name_template("[").is_err());
        assert!(validate_name_template("*.html").is_ok());
    }

    #[test]
    fn open_zip_extracts_into_workdir_and_cleans_up_on_drop() {
        let dir = make_temp_dir("zip");
        let zip_path = dir.join("bundle.zip");
        {
            let file = File::create(&zip_path).expect("create zip");
            let mut zw = zip::ZipWriter::new(file);
            let opts = zip::write::SimpleFileOptions::default();
            zw.start_file("index.html", opts).expect("start");
            zw.write_all(b"<html></html>").expect("write");
            zw.start_file("host/10.0.0.9.html", opts).expect("start");
            zw.write_all(b"<html></html>").expect("write");
            zw.finish().expect("finish");
        }

        let tmp_parent = dir.join("work");
        let opened =
            open(&zip_path, &BundleConfig::default(), Some(&tmp_parent)).expect("open zip");
        assert_eq!(opened.extracted_entries, Some(2));
        let workdir = opened.workdir().expect("workdir").to_path_buf();
        assert!(workdir.starts_with(&tmp_parent));
        assert!(opened.bundle.index.is_file());
        assert_eq!(opened.bundle.pages.len(), 1);

        drop(opened);
        assert!(!workdir.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_rejects_non_zip_file() {
        let dir = make_temp_dir("notzip");
        let path = dir.join("bundle.zip");
        write_file(&path, b"not a zip");
        assert!(open(&path, &BundleConfig::default(), Some(&dir)).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
