//! 评估二进制依赖的通用组件: 命令行解析、批量运行器与报告输出.

use std::env;
use std::path::PathBuf;

pub mod args;
pub mod report;
pub mod runner;

pub use args::{parse_cli, CliSpec, EvalConfig, Preprocess, Structure};
pub use report::write_report;
pub use runner::{run, CaseRecord};

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 获取参考数据基本路径.
///
/// 1. 若环境变量 `$TUBE_REFER_DATADIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/reference`.
pub fn refer_datadir_from_env_or_home() -> PathBuf {
    match env::var("TUBE_REFER_DATADIR") {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => tube_berry::dataset::home_dataset_dir_with(["reference"]).unwrap(),
    }
}
