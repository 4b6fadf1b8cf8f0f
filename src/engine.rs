use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use serde::Serialize;

use crate::bundle::ReportBundle;
use crate::core::{PageRecords, ReportShape, ReportTable};
use crate::error::{ConvertError, ErrorKind, PageError, Stage};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub workers: usize,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct Engine {
    opts: EngineOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub shape: ReportShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub titles: Vec<String>,
    pub pages: usize,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        Self { opts }
    }

    pub fn inspect(&self, bundle: &ReportBundle) -> Result<Inspection, ConvertError> {
        let index = crate::page::load(&bundle.index).map_err(ConvertError::Index)?;
        let shape = classify(&bundle.index, &index)?;
        Ok(Inspection {
            shape,
            template: crate::detect::template_name(&index),
            titles: crate::detect::section_titles(&index),
            pages: bundle.pages.len(),
        })
    }

    pub fn convert(&self, bundle: &ReportBundle) -> Result<ReportTable, ConvertError> {
        let index = crate::page::load(&bundle.index).map_err(ConvertError::Index)?;
        let shape = classify(&bundle.index, &index)?;
        tracing::debug!(%shape, pages = bundle.pages.len(), "报表类型已确定");

        let results = self.dispatch(shape, &bundle.pages);

        let total = results.len();
        let mut pages = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(page) => pages.push(page),
                Err(err) => {
                    tracing::warn!(
                        path = %err.path.display(),
                        stage = %err.stage,
                        error = %err.kind,
                        "页面处理失败"
                    );
                    failures.push(err);
                }
            }
        }
        if !failures.is_empty() {
            return Err(ConvertError::Pages {
                shape,
                failures,
                total,
            });
        }

        ReportTable::merge(shape, pages).map_err(|err| ConvertError::Pages {
            shape,
            failures: vec![err],
            total,
        })
    }

    fn dispatch(&self, shape: ReportShape, paths: &[PathBuf]) -> Vec<Result<PageRecords, PageError>> {
        use std::io::IsTerminal;
        let progress_enabled = self.opts.show_progress && std::io::stderr().is_terminal();
        let pb = if progress_enabled && !paths.is_empty() {
            let pb = indicatif::ProgressBar::new(paths.len() as u64);
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb.set_message("正在解析报表页面...");
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let run = |path: &PathBuf| {
            let result = process_page(shape, path);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            result
        };

        let parallel = self.opts.workers > 1 && paths.len() > 1;
        let results: Vec<Result<PageRecords, PageError>> = if parallel {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.opts.workers)
                .build()
            {
                Ok(pool) => pool.install(|| paths.par_iter().map(run).collect()),
                Err(err) => {
                    tracing::warn!(error = %err, "线程池创建失败，改为顺序处理");
                    paths.iter().map(run).collect()
                }
            }
        } else {
            paths.iter().map(run).collect()
        };

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        results
    }
}

fn classify(path: &Path, index: &serde_json::Value) -> Result<ReportShape, ConvertError> {
    crate::detect::detect(index)
        .map_err(|kind| ConvertError::Index(kind.at(path, Stage::Classify)))
}

fn process_page(shape: ReportShape, path: &Path) -> Result<PageRecords, PageError> {
    let payload = crate::page::load(path)?;
    if let Some(found) = crate::detect::page_shape(&payload) {
        if found != shape {
            return Err(ErrorKind::ShapeMismatch {
                expected: shape,
                found,
            }
            .at(path, Stage::Classify));
        }
    }
    let records =
        crate::extract::extract(shape, &payload).map_err(|kind| kind.at(path, Stage::Extract))?;
    tracing::debug!(path = %path.display(), records = records.len(), "页面已解析");
    Ok(PageRecords {
        path: path.to_path_buf(),
        records,
    })
}
