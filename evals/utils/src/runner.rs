//! 批量评估运行器.
//!
//! 病例按发现顺序逐个评估; `--jobs N` 时切成连续块交给
//! `thread::scope` 工作线程, 按块顺序合并结果, 因此报告行顺序
//! 与顺序执行完全一致. 任一病例失败即中止整个批次, 不产生部分结果.

use std::path::Path;
use std::thread;

use either::Either;
use log::info;

use tube_berry::consts::TRACHEA_DILATE_ITERS;
use tube_berry::dataset::{self, CasePaths, DiscoverError};
use tube_berry::metrics::EvalError;
use tube_berry::{EvalGrids, LoadError, TubeMask};

use crate::args::{EvalConfig, Preprocess};

/// 单个病例的评估结果行.
#[derive(Debug, Clone)]
pub struct CaseRecord {
    /// 病例名.
    pub name: String,

    /// 指标值, 与请求的指标顺序一一对应.
    pub values: Vec<f64>,
}

/// 运行整个评估批次, 返回与病例发现顺序一致的结果行.
pub fn run(config: &EvalConfig) -> Result<Vec<CaseRecord>, String> {
    let cases = dataset::discover_cases(
        &config.input_masks_dir,
        &config.input_cenlines_dir,
        &config.strip_suffix,
    )
    .map_err(describe_discover)?;
    info!("{} case(s) to evaluate", cases.len());

    let jobs = resolve_jobs(config.jobs, cases.len());
    let ans = if jobs <= 1 {
        Either::Left(run_sequential(config, &cases))
    } else {
        Either::Right(run_parallel(config, &cases, jobs))
    };
    ans.into_inner()
}

/// 实际工作线程数: `0` 代表全部核心, 并且不会超过病例数.
fn resolve_jobs(jobs: usize, cases: usize) -> usize {
    let jobs = if jobs == 0 { crate::cpus() } else { jobs };
    jobs.min(cases.max(1))
}

fn run_sequential(config: &EvalConfig, cases: &[CasePaths]) -> Result<Vec<CaseRecord>, String> {
    cases.iter().map(|case| eval_case(config, case)).collect()
}

fn run_parallel(
    config: &EvalConfig,
    cases: &[CasePaths],
    jobs: usize,
) -> Result<Vec<CaseRecord>, String> {
    let chunk_len = cases.len().div_ceil(jobs);

    thread::scope(|s| {
        let handles: Vec<_> = cases
            .chunks(chunk_len)
            .map(|chunk| {
                s.spawn(move || -> Result<Vec<CaseRecord>, String> {
                    chunk.iter().map(|case| eval_case(config, case)).collect()
                })
            })
            .collect();

        // 块本身连续且按序合并, 结果顺序与顺序执行一致.
        let mut records = Vec::with_capacity(cases.len());
        for handle in handles {
            records.extend(handle.join().expect("Thread joining error")?);
        }
        Ok(records)
    })
}

/// 评估单个病例: 组装参考路径, 载入四个网格, 预处理, 逐指标计算.
fn eval_case(config: &EvalConfig, case: &CasePaths) -> Result<CaseRecord, String> {
    info!(
        "case `{}`: `{}` + `{}`",
        case.name,
        case.predicted_mask.display(),
        case.predicted_cenline.display()
    );

    let refer = config.refer_datadir.as_path();
    let reference_mask = config.layout.mask_path(refer, &case.name);
    let reference_cenline = config.layout.cenline_path(refer, &case.name);
    require_file(&reference_mask)?;
    require_file(&reference_cenline)?;

    let grids = EvalGrids::open(
        &reference_mask,
        &case.predicted_mask,
        &reference_cenline,
        &case.predicted_cenline,
    )
    .map_err(describe_load)?;
    let grids = preprocess(config, case, grids)?;

    let spacing = grids.spacing();
    let values = config
        .metrics
        .iter()
        .map(|metric| {
            metric
                .compute(&grids, Some(spacing))
                .map_err(describe_eval)
        })
        .collect::<Result<Vec<f64>, String>>()?;

    Ok(CaseRecord {
        name: case.name.clone(),
        values,
    })
}

fn preprocess(
    config: &EvalConfig,
    case: &CasePaths,
    grids: EvalGrids,
) -> Result<EvalGrids, String> {
    match config.preprocess {
        Preprocess::None => Ok(grids),
        Preprocess::RemoveTrachea => {
            let coarse_path = config
                .layout
                .coarse_path(config.refer_datadir.as_path(), &case.name)
                .ok_or_else(|| {
                    "reference layout has no coarse-airways subdirectory".to_owned()
                })?;
            require_file(&coarse_path)?;

            let coarse = TubeMask::open(&coarse_path)
                .map_err(|e| format!("cannot read `{}`: {e}", coarse_path.display()))?;
            info!(
                "removing trachea and main bronchi (coarse airways dilated {TRACHEA_DILATE_ITERS} levels)"
            );
            grids
                .exclude(&coarse.dilate(TRACHEA_DILATE_ITERS))
                .map_err(describe_load)
        }
        Preprocess::DilateReference(iterations) => {
            info!("inflating ({iterations}x) the reference masks");
            // 膨胀不改变形状与分辨率, 可以直接替换参考 mask.
            Ok(EvalGrids {
                reference_mask: grids.reference_mask.dilate(iterations),
                ..grids
            })
        }
    }
}

fn require_file(path: &Path) -> Result<(), String> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("missing reference file `{}`", path.display()))
    }
}

fn describe_discover(e: DiscoverError) -> String {
    match e {
        DiscoverError::Io { path, source } => {
            format!("cannot list `{}`: {source}", path.display())
        }
        DiscoverError::CountMismatch { masks, cenlines } => format!(
            "input dirs for predicted masks and centrelines \
             have different number of files ({masks} vs {cenlines})"
        ),
    }
}

fn describe_load(e: LoadError) -> String {
    match e {
        LoadError::Nifti { path, source } => {
            format!("cannot read `{}`: {source}", path.display())
        }
        LoadError::ShapeMismatch { expected, found } => {
            format!("grid shape mismatch: expected {expected:?}, found {found:?}")
        }
        LoadError::SpacingMismatch { expected, found } => {
            format!("voxel spacing mismatch: expected {expected:?} mm, found {found:?} mm")
        }
    }
}

fn describe_eval(e: EvalError) -> String {
    match e {
        EvalError::MissingVoxelSpacing { metric } => {
            format!("metric `{}` requires voxel spacing", metric.name())
        }
        EvalError::UnknownMetric(name) => format!("unknown metric `{name}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_jobs() {
        assert_eq!(resolve_jobs(1, 10), 1);
        assert_eq!(resolve_jobs(4, 10), 4);
        // 线程数不超过病例数.
        assert_eq!(resolve_jobs(16, 3), 3);
        // 空批次也至少保留一个线程名额.
        assert_eq!(resolve_jobs(4, 0), 1);
        // 0 代表全部核心.
        assert!(resolve_jobs(0, 1000) >= 1);
    }

    #[test]
    fn test_count_mismatch_message() {
        let msg = describe_discover(DiscoverError::CountMismatch {
            masks: 12,
            cenlines: 11,
        });
        assert_eq!(
            msg,
            "input dirs for predicted masks and centrelines \
             have different number of files (12 vs 11)"
        );
    }

    #[test]
    fn test_require_file() {
        assert!(require_file(Path::new("/no/such/file.nii.gz")).is_err());
    }
}
