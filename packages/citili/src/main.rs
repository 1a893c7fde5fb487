use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use citili_lib::{
    config::CitiliConfig,
    formula::operators::OperatorCatalog,
    logger::{LogLevel, init_tracing},
    net::{discovery::DiscoveryReport, discovery::discover_models, pnml::PnmlParser},
    oracle::{KeepAllOracle, OracleWrapper, smc::SmcOracle},
    orchestrator::{ModelOutcome, Orchestrator},
    threading::slot_pool::run_in_slots,
};
use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "Citili")]
#[command(version = "0.1")]
#[command(about = "Generate CTL and reachability formulas for Petri net models", long_about = None)]
struct Args {
    /// Configuration file, `.json` or `.toml`.
    #[arg(short, long)]
    config: Option<String>,

    /// Directory containing one sub-directory per model.
    #[arg(short, long)]
    input_dir: Option<String>,

    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long)]
    workers: Option<usize>,

    /// Keep every generated formula instead of running the checker.
    #[arg(long)]
    no_filter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub model: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started: String,
    pub finished: String,
    pub seed: u64,
    pub discovery: DiscoveryReport,
    pub outcomes: Vec<ModelOutcome>,
    pub failures: Vec<JobFailure>,
}

impl RunSummary {
    fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary: {}", path.display()))
    }

    fn print(&self) {
        let written: usize = self.outcomes.iter().map(|o| o.total_written()).sum();
        let random: usize = self.outcomes.iter().map(|o| o.total_random_fill()).sum();

        println!(
            "[{}] {} jobs done, {} formulas written ({} unfiltered)",
            LogLevel::Info.to_string(),
            self.outcomes.len(),
            written,
            random
        );
        if self.discovery.total_skipped() > 0 {
            println!(
                "[{}] {} entries of the input directory skipped",
                LogLevel::Warn.to_string(),
                self.discovery.total_skipped()
            );
        }
        for failure in &self.failures {
            println!(
                "[{}] {}: {}",
                LogLevel::Error.to_string(),
                failure.model,
                failure.error
            );
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<CitiliConfig> {
    let mut config = CitiliConfig::from_optional_file(args.config.as_ref()).with_context(|| {
        format!(
            "failed to load config: {}",
            args.config.as_deref().unwrap_or("<default>")
        )
    })?;

    if let Some(input_dir) = &args.input_dir {
        config.set_input_dir(input_dir.clone());
    }
    if let Some(seed) = args.seed {
        config.set_seed(seed);
    }
    if let Some(workers) = args.workers {
        config.set_num_workers(workers);
    }
    if args.no_filter {
        let filter = config.get_filter().clone().with_enabled(false);
        config.set_filter(filter);
    }

    config.validate().context("invalid configuration")?;

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(log_file) = init_tracing(config.get_logger())? {
        tracing::info!("logging to {}", log_file);
    }

    let started = Local::now();
    let input_dir = PathBuf::from(config.get_input_dir());
    let (arena, discovery) = discover_models(&input_dir)?;
    discovery.log();

    let jobs = arena.into_jobs();
    let names: Vec<String> = jobs.iter().map(|j| j.model.full_name()).collect();

    let catalog = OperatorCatalog::new(*config.get_generation().get_max_arity());
    let oracle: OracleWrapper = if *config.get_filter().get_enabled() {
        SmcOracle::from_config(config.get_filter()).into()
    } else {
        tracing::info!("filtering disabled, keeping all generated formulas");
        KeepAllOracle.into()
    };
    let parser = PnmlParser;
    let orchestrator = Orchestrator::new(&config, &catalog, &oracle, &parser);

    tracing::info!(
        jobs = jobs.len(),
        workers = config.get_num_workers(),
        seed = config.get_seed(),
        "starting generation"
    );

    let seed = *config.get_seed();
    let results = run_in_slots(*config.get_num_workers(), jobs, |slot, index, job| {
        let span = tracing::info_span!(
            "model",
            worker = slot,
            name = %job.model.name,
            instance = %job.model.instance
        );
        let _enter = span.enter();

        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
        let result = orchestrator.run(job, &mut rng);
        if let Err(e) = &result {
            tracing::error!("model skipped: {:#}", e);
        }
        result
    });

    let mut outcomes = vec![];
    let mut failures = vec![];
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(Ok(outcome)) => outcomes.push(outcome),
            Ok(Err(e)) => failures.push(JobFailure {
                model: name,
                error: format!("{:#}", e),
            }),
            Err(panic) => failures.push(JobFailure {
                model: name,
                error: panic.to_string(),
            }),
        }
    }

    let summary = RunSummary {
        started: started.to_rfc3339(),
        finished: Local::now().to_rfc3339(),
        seed,
        discovery,
        outcomes,
        failures,
    };
    summary.write(&input_dir.join("summary.json"))?;
    summary.print();

    Ok(())
}
