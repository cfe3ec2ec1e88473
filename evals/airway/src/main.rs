//! 气道分割评估命令行入口.
//!
//! 评估预测的气道树 mask/中心线与专家标注的一致性,
//! 默认先剔除气管与主支气管, 使指标反映外周分支的精度.

use log::info;
use simple_logger::SimpleLogger;

use tube_berry::dataset::ReferenceLayout;
use utils::args::{self, CliSpec, Preprocess, Structure};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let spec = CliSpec {
        program: "airway-eval",
        structure: Structure::Airway,
        strip_suffix: "_binmask",
        layout: ReferenceLayout::airway(),
    };
    let config = args::parse_cli(spec, std::env::args().skip(1))?;

    SimpleLogger::new()
        .with_level(if config.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init()
        .map_err(|e| format!("logger init failed: {e}"))?;

    let names: Vec<_> = config.metrics.iter().map(|m| m.name()).collect();
    info!("metrics: {}", names.join(", "));
    if config.preprocess == Preprocess::RemoveTrachea {
        info!("trachea and main bronchi will be removed from the metrics");
    }

    let records = utils::runner::run(&config)?;
    utils::report::write_report(&config.output_file, &config.metrics, &records)
        .map_err(|e| format!("cannot write `{}`: {e}", config.output_file.display()))?;
    info!("report written to `{}`", config.output_file.display());

    Ok(())
}
