use std::path::PathBuf;

use clap::Parser;
use workflow::config::{InputSpec, WorkflowConfig};
use workflow::runner::Runner;

use crate::generator::profile::GeneratorConfig;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Flags ship-exhaust contamination in merged underway data")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Directory holding stored exhaust labels
    #[arg(long, default_value = "exhaust")]
    store: PathBuf,
    /// First day (YYYY-MM-DD) or instant (RFC 3339) to process
    #[arg(long)]
    start: Option<String>,
    /// Last day (inclusive) or instant to process
    #[arg(long)]
    end: Option<String>,
    /// CSV table of voyage,start,end used to name results
    #[arg(long)]
    voyage_index: Option<PathBuf>,
    /// time,value table of CO mixing ratio
    #[arg(long)]
    co: Option<PathBuf>,
    /// time,value table of particle number concentration
    #[arg(long)]
    cn: Option<PathBuf>,
    /// time,value table of black-carbon concentration
    #[arg(long)]
    bc: Option<PathBuf>,
    /// Resample every input table onto this grid step (seconds)
    #[arg(long)]
    resample: Option<f64>,
    /// Use a generated underway record instead of input tables
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Recompute even if a stored result exists
    #[arg(long, default_value_t = false)]
    force_reload: bool,
    /// Store diagnostic columns next to the exhaust flag
    #[arg(long, default_value_t = false)]
    full: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        let mut config = WorkflowConfig::from_args(args.store.clone(), args.start.clone(), args.end.clone());
        config.voyage_index = args.voyage_index.clone();
        for (name, path) in [("co", &args.co), ("cn", &args.cn), ("bc", &args.bc)] {
            if let Some(path) = path {
                config.inputs.insert(
                    name.to_string(),
                    InputSpec {
                        path: path.clone(),
                        resample_seconds: args.resample,
                    },
                );
            }
        }
        if args.synthetic {
            config.synthetic = Some(GeneratorConfig {
                seed: args.seed,
                ..Default::default()
            });
        }
        config
    };
    if args.force_reload {
        workflow_config.detector.force_reload = true;
    }
    if args.full {
        workflow_config.detector.abridged = false;
    }

    let result = Runner::new(workflow_config).execute()?;

    println!("{}", result.summary());
    match &result.persist_error {
        Some(err) => eprintln!("warning: result was not cached: {}", err),
        None => println!("dataset: {}", result.dataset_path.display()),
    }

    Ok(())
}
