//! 血管分割评估命令行入口.
//!
//! 评估预测的血管树 mask/中心线与专家标注的一致性.
//! 可选地先膨胀参考 mask (`--dilate-reference N`), 以宽容近壁分歧.

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
        program: "vessel-eval",
        structure: Structure::Vessel,
        strip_suffix: "",
        layout: ReferenceLayout::vessel(),
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
    if let Preprocess::DilateReference(n) = config.preprocess {
        info!("reference vessels will be inflated {n}x before the metrics");
    }

    let records = utils::runner::run(&config)?;
    utils::report::write_report(&config.output_file, &config.metrics, &records)
        .map_err(|e| format!("cannot write `{}`: {e}", config.output_file.display()))?;
    info!("report written to `{}`", config.output_file.display());

    Ok(())
}
