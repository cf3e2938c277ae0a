mod commands;
mod report;
mod utils;

use clap::Parser;
use log::{info, LevelFilter};
use serde::Serialize;
use vram_estimation::{calculate, Calculation, Catalog, GpuSpec, ModelSpec};

use crate::commands::{Cli, Commands, EstimateArgs, ListKind, RequestArgs};

#[derive(Serialize)]
struct GpuComparison<'a> {
    gpu: &'a str,
    #[serde(flatten)]
    result: &'a Calculation,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let catalog = Catalog::load_or_builtin(cli.catalog.as_deref());

    let outcome = match cli.command {
        Some(Commands::Estimate(args)) => run_estimate(&catalog, &args),
        Some(Commands::List { kind }) => {
            let table = match kind {
                ListKind::Gpus => report::gpu_table(&catalog),
                ListKind::Models => report::model_table(&catalog),
            };
            table.printstd();
            Ok(())
        }
        None => {
            eprintln!("No command provided. Use --help for more information.");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run_estimate(
    catalog: &Catalog,
    args: &EstimateArgs,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let weight_quant = args.request.quant.into();
    let model = args.model.source()?.resolve(catalog, weight_quant)?;

    if let Some(source) = args.gpu.source() {
        let gpu = source.resolve(catalog)?;
        let request = args.request.to_request(&gpu);
        let calculation = calculate(&gpu, &model, &request)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&calculation)?);
        } else {
            report::estimate_table(&gpu, &model, &request, &calculation).printstd();
        }
        return Ok(());
    }

    info!(
        "no GPU selected, comparing '{}' across {} catalog GPUs",
        model.name,
        catalog.gpus.len()
    );
    let rows = compare_gpus(catalog, &model, &args.request)?;
    if args.json {
        println!("{}", comparison_json(&rows)?);
    } else {
        report::comparison_table(&rows).printstd();
    }
    Ok(())
}

/// Runs the same model and request against every catalog GPU, in catalog order.
fn compare_gpus<'a>(
    catalog: &'a Catalog,
    model: &ModelSpec,
    request: &RequestArgs,
) -> vram_estimation::Result<Vec<(&'a GpuSpec, Calculation)>> {
    catalog
        .gpus
        .iter()
        .map(|gpu| {
            let request = request.to_request(gpu);
            calculate(gpu, model, &request).map(|calculation| (gpu, calculation))
        })
        .collect()
}

fn comparison_json(rows: &[(&GpuSpec, Calculation)]) -> serde_json::Result<String> {
    let comparisons: Vec<GpuComparison> = rows
        .iter()
        .map(|(gpu, result)| GpuComparison {
            gpu: &gpu.name,
            result,
        })
        .collect();
    serde_json::to_string_pretty(&comparisons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn estimate_args(args: &[&str]) -> EstimateArgs {
        let argv = ["llm-vram-estimation", "estimate"].iter().chain(args.iter());
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Estimate(args)) => args,
            _ => panic!("expected the estimate subcommand"),
        }
    }

    #[test]
    fn test_compare_covers_every_gpu() {
        let catalog = Catalog::builtin();
        let model = catalog.model("Qwen3-32B").unwrap();
        let args = estimate_args(&["-m", "Qwen3-32B", "--quant", "fp16"]);

        let rows = compare_gpus(&catalog, model, &args.request).unwrap();
        assert_eq!(rows.len(), catalog.gpus.len());
        for ((gpu, _), expected) in rows.iter().zip(&catalog.gpus) {
            assert_eq!(gpu.name, expected.name);
        }
        // 32B at fp16 fits on the 80 GB parts but not on 24 GB cards.
        assert!(rows.iter().any(|(_, result)| result.is_feasible()));
        assert!(rows.iter().any(|(_, result)| !result.is_feasible()));
    }

    #[test]
    fn test_comparison_json_tags_each_gpu() {
        let catalog = Catalog::builtin();
        let model = catalog.model("Qwen3-32B").unwrap();
        let args = estimate_args(&["-m", "Qwen3-32B", "--quant", "fp16"]);
        let rows = compare_gpus(&catalog, model, &args.request).unwrap();

        let json: Value = serde_json::from_str(&comparison_json(&rows).unwrap()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), rows.len());
        for (entry, (gpu, result)) in entries.iter().zip(&rows) {
            assert_eq!(entry["gpu"], gpu.name.as_str());
            let expected = if result.is_feasible() { "success" } else { "failure" };
            assert_eq!(entry["status"], expected);
            let required = entry["total_required_gb"].as_f64().unwrap();
            assert!((required - result.total_required_gb()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_compare_rejects_invalid_request() {
        let catalog = Catalog::builtin();
        let model = catalog.model("Qwen3-8B").unwrap();
        let args = estimate_args(&["-m", "Qwen3-8B", "--gpus", "0"]);
        assert!(compare_gpus(&catalog, model, &args.request).is_err());
    }

    #[test]
    fn test_run_estimate_errors() {
        let catalog = Catalog::builtin();
        let args = estimate_args(&["-m", "Llama-9000", "-g", "L40"]);
        assert!(run_estimate(&catalog, &args).is_err());
        let args = estimate_args(&["-g", "L40"]);
        assert!(run_estimate(&catalog, &args).is_err());
    }
}
