use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use vigilent_core::{ContractFacts, RedFlag, RiskScore};
use vigilent_runtime::{
    analyze_batch, AnalysisCache, AnalysisOrchestratorBuilder, AnalyzeOptions, JsonFileStore,
    LlmProvider, ProviderRegistry, RecordStore, RuntimeConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "vigilent",
    author,
    version,
    about = "Procurement contract risk analysis"
)]
struct Cli {
    /// Runtime configuration (YAML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// JSON file holding cached model analyses
    #[arg(long, value_name = "FILE", global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score contracts with the deterministic rules only
    Rules {
        /// Contract facts (.json, .yaml or .yml; one record or a list)
        file: PathBuf,
    },

    /// Full analysis: rules, escalation and model analysis
    Analyze {
        /// Contract facts (.json, .yaml or .yml; one record or a list)
        file: PathBuf,

        /// Never call the model
        #[arg(long, conflicts_with = "force_ai")]
        no_ai: bool,

        /// Call the model even when escalation does not trigger
        #[arg(long)]
        force_ai: bool,

        /// Ignore cached analyses (results are still cached)
        #[arg(long)]
        bypass_cache: bool,

        /// Contracts analyzed at once; defaults to the configured value
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
    },

    /// Inspect or maintain the analysis cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Entry count, tokens saved and entry age range
    Stats,

    /// Delete expired entries
    Purge,
}

/// Rule result for one record in `vigilent rules`.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum RulesOutcome {
    Scored {
        contract_id: String,
        risk_score: RiskScore,
        red_flags: Vec<RedFlag>,
    },
    Rejected {
        contract_id: String,
        error: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Rules { file } => run_rules(&file)?,
        Commands::Analyze {
            file,
            no_ai,
            force_ai,
            bypass_cache,
            concurrency,
        } => {
            let force_ai = match (no_ai, force_ai) {
                (true, _) => Some(false),
                (_, true) => Some(true),
                _ => None,
            };
            let options = AnalyzeOptions {
                force_ai,
                bypass_cache,
                ..Default::default()
            };
            run_analyze(&file, config, cli.store.as_deref(), &options, concurrency).await?
        }
        Commands::Cache { action } => {
            let Some(store_path) = cli.store.as_deref() else {
                bail!("cache commands need --store <FILE>");
            };
            let store: Arc<dyn RecordStore> = Arc::new(open_store(store_path));
            let cache = AnalysisCache::new(store, config.store_timeout);
            run_cache(&cache, action).await?
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn open_store(path: &Path) -> JsonFileStore {
    let store = JsonFileStore::new(path);
    tracing::debug!(path = %store.path().display(), "Using file record store");
    store
}

fn load_contracts(file: &Path) -> Result<Vec<ContractFacts>> {
    ContractFacts::load_file(file)
        .with_context(|| format!("failed to load contracts from {}", file.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_rules(file: &Path) -> Result<()> {
    let outcomes: Vec<RulesOutcome> = load_contracts(file)?
        .into_iter()
        .map(|facts| match vigilent_core::evaluate(&facts) {
            Ok(analysis) => RulesOutcome::Scored {
                contract_id: facts.contract_id,
                risk_score: analysis.risk_score,
                red_flags: analysis.red_flags,
            },
            Err(e) => RulesOutcome::Rejected {
                contract_id: facts.contract_id,
                error: e.to_string(),
            },
        })
        .collect();
    print_json(&outcomes)
}

async fn run_analyze(
    file: &Path,
    config: RuntimeConfig,
    store_path: Option<&Path>,
    options: &AnalyzeOptions,
    concurrency: Option<usize>,
) -> Result<()> {
    let contracts = load_contracts(file)?;
    let concurrency = concurrency.unwrap_or(config.batch_concurrency);

    let mut builder = AnalysisOrchestratorBuilder::new();
    if options.force_ai != Some(false) {
        if let Some(provider) = build_provider(&config) {
            builder = builder.provider(provider);
        }
    }
    if let Some(path) = store_path {
        builder = builder.store(Arc::new(open_store(path)));
    }
    let orchestrator = builder.config(config).build()?;

    let report = analyze_batch(&orchestrator, contracts, options, concurrency).await;
    let usage = orchestrator.usage();
    tracing::info!(
        llm_calls = usage.llm_calls,
        cache_hits = usage.cache_hits,
        total_tokens = usage.total_tokens,
        estimated_cost = usage.estimated_cost,
        "Model usage"
    );
    print_json(&report)
}

/// Provider from config, or `None` (rules only) when it cannot be built.
fn build_provider(config: &RuntimeConfig) -> Option<Arc<dyn LlmProvider>> {
    let registry = ProviderRegistry::with_defaults();
    match registry.create(&config.provider.kind, &config.provider.settings) {
        Ok(provider) => Some(provider),
        Err(e) => {
            tracing::warn!(
                provider = %config.provider.kind,
                error = %e,
                "Model provider unavailable, contracts will be scored by rules only"
            );
            None
        }
    }
}

async fn run_cache(cache: &AnalysisCache, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Stats => {
            let stats = cache.stats().await.context("failed to read cache stats")?;
            print_json(&stats)
        }
        CacheAction::Purge => {
            let deleted = cache
                .purge_expired()
                .await
                .context("failed to purge expired entries")?;
            print_json(&serde_json::json!({ "deleted": deleted }))
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
