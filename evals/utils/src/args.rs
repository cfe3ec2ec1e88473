//! 命令行参数解析.
//!
//! 两个评估二进制共用同一个解析循环; 各自的默认值 (病例名后缀、
//! 参考文件布局) 与专属开关由 [`CliSpec`] 和 [`Structure`] 区分.

use std::path::{Path, PathBuf};

use tube_berry::dataset::ReferenceLayout;
use tube_berry::metrics::MetricKind;

/// 被评估的管状结构类型. 决定二进制接受的专属开关.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Structure {
    /// 气道树: 默认剔除气管与主支气管, `--keep-trachea` 关闭.
    Airway,

    /// 血管树: `--dilate-reference N` 先膨胀参考 mask.
    Vessel,
}

/// 评估前对病例网格的预处理.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Preprocess {
    /// 不做处理.
    None,

    /// 膨胀粗分割并从四个网格中剔除气管与主支气管.
    RemoveTrachea,

    /// 参考 mask 先膨胀给定轮数.
    DilateReference(usize),
}

/// 二进制在解析前固定下来的自身信息.
#[derive(Debug, Clone)]
pub struct CliSpec {
    /// 程序名, 用于帮助与错误信息.
    pub program: &'static str,

    /// 结构类型.
    pub structure: Structure,

    /// 预测 mask 文件名中病例名之后的后缀.
    pub strip_suffix: &'static str,

    /// 参考文件命名规则.
    pub layout: ReferenceLayout,
}

/// 一次评估批次的完整配置.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// 预测 mask 目录.
    pub input_masks_dir: PathBuf,

    /// 预测中心线目录.
    pub input_cenlines_dir: PathBuf,

    /// 参考数据基本目录.
    pub refer_datadir: PathBuf,

    /// 病例名后缀 (见 [`CliSpec::strip_suffix`]).
    pub strip_suffix: String,

    /// 参考文件命名规则.
    pub layout: ReferenceLayout,

    /// 请求的指标, 按请求顺序排列.
    pub metrics: Vec<MetricKind>,

    /// 输出报告路径.
    pub output_file: PathBuf,

    /// 预处理方式.
    pub preprocess: Preprocess,

    /// 并行工作线程数. 1 为顺序执行, 0 表示取可用核心数.
    pub jobs: usize,

    /// 是否输出 debug 级日志.
    pub verbose: bool,
}

/// 帮助文本.
pub fn usage(spec: &CliSpec) -> String {
    let extra = match spec.structure {
        Structure::Airway => {
            "  --keep-trachea            keep trachea and main bronchi in the metrics\n"
        }
        Structure::Vessel => {
            "  --dilate-reference <N>    inflate the reference masks N times first\n"
        }
    };
    format!(
        "Usage: {} [OPTIONS]\n\n\
         Options:\n\
         \x20 --input-basedir <DIR>     base dir for inputs and output (default `.`)\n\
         \x20 --input-masks-dir <DIR>   predicted masks dir (default `BinaryMasks`)\n\
         \x20 --input-cenlines-dir <DIR> predicted centrelines dir (default `Centrelines`)\n\
         \x20 --refer-datadir <DIR>     reference data dir (default `$TUBE_REFER_DATADIR`,\n\
         \x20                           else `~/dataset/reference`)\n\
         \x20 --metrics <A,B,...>       metrics to compute (default: the full catalog)\n\
         \x20 --output-file <FILE>      report path (default `result_metrics.csv`)\n\
         \x20 --jobs <N>                worker threads; 0 = all cores (default 1)\n\
         {extra}\
         \x20 --verbose                 debug-level logging\n\
         \x20 --help                    show this message\n",
        spec.program
    )
}

/// 解析命令行参数 (不含程序名自身).
///
/// `--help` 会打印帮助并直接退出进程; 其余错误以 `Err` 返回.
pub fn parse_cli<I: IntoIterator<Item = String>>(
    spec: CliSpec,
    args: I,
) -> Result<EvalConfig, String> {
    let mut basedir = PathBuf::from(".");
    let mut masks_dir = PathBuf::from("BinaryMasks");
    let mut cenlines_dir = PathBuf::from("Centrelines");
    let mut refer_datadir: Option<PathBuf> = None;
    let mut metrics: Vec<MetricKind> = MetricKind::ALL.to_vec();
    let mut output_file = PathBuf::from("result_metrics.csv");
    let mut preprocess = match spec.structure {
        Structure::Airway => Preprocess::RemoveTrachea,
        Structure::Vessel => Preprocess::None,
    };
    let mut jobs = 1usize;
    let mut verbose = false;

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print!("{}", usage(&spec));
                std::process::exit(0);
            }
            "--verbose" => verbose = true,
            "--input-basedir" => basedir = PathBuf::from(next_value(&mut it, &arg)?),
            "--input-masks-dir" => masks_dir = PathBuf::from(next_value(&mut it, &arg)?),
            "--input-cenlines-dir" => cenlines_dir = PathBuf::from(next_value(&mut it, &arg)?),
            "--refer-datadir" => refer_datadir = Some(PathBuf::from(next_value(&mut it, &arg)?)),
            "--metrics" => metrics = parse_metrics(&next_value(&mut it, &arg)?)?,
            "--output-file" => output_file = PathBuf::from(next_value(&mut it, &arg)?),
            "--jobs" => jobs = parse_number(&next_value(&mut it, &arg)?, &arg)?,
            "--keep-trachea" if spec.structure == Structure::Airway => {
                preprocess = Preprocess::None;
            }
            "--dilate-reference" if spec.structure == Structure::Vessel => {
                let n = parse_number(&next_value(&mut it, &arg)?, &arg)?;
                preprocess = Preprocess::DilateReference(n);
            }
            _ => {
                return Err(format!(
                    "unknown flag `{arg}`, try `{} --help`",
                    spec.program
                ));
            }
        }
    }

    Ok(EvalConfig {
        input_masks_dir: resolve(&basedir, masks_dir),
        input_cenlines_dir: resolve(&basedir, cenlines_dir),
        refer_datadir: refer_datadir.unwrap_or_else(crate::refer_datadir_from_env_or_home),
        strip_suffix: spec.strip_suffix.to_owned(),
        layout: spec.layout,
        metrics,
        output_file: resolve(&basedir, output_file),
        preprocess,
        jobs,
        verbose,
    })
}

/// 将相对路径解析到 `basedir` 下; 绝对路径保持不变.
fn resolve(basedir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        basedir.join(path)
    }
}

fn next_value<I: Iterator<Item = String>>(it: &mut I, flag: &str) -> Result<String, String> {
    it.next()
        .ok_or_else(|| format!("flag `{flag}` expects a value"))
}

fn parse_number(value: &str, flag: &str) -> Result<usize, String> {
    value
        .parse()
        .map_err(|_| format!("flag `{flag}` expects a non-negative integer, got `{value}`"))
}

/// 解析逗号分隔的指标名列表. 未知指标名立刻报错, 早于任何病例处理.
fn parse_metrics(value: &str) -> Result<Vec<MetricKind>, String> {
    let metrics: Vec<MetricKind> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| MetricKind::from_name(name).map_err(|_| format!("unknown metric `{name}`")))
        .collect::<Result<_, _>>()?;

    if metrics.is_empty() {
        return Err("flag `--metrics` expects at least one metric name".to_owned());
    }
    Ok(metrics)
}
