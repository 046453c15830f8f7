mod assets;
mod cache;
mod compare;
mod companion;
mod journal;
mod trend;

use std::sync::Arc;

use haven_core::{
    AssetId, DataOrigin, Envelope, EnvelopeError, HavenConfig, Journal, StageId, TextGenerator,
    TrendCache, TrendNormalizer,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{CacheCommand, Cli, Command, JournalCommand};
use crate::error::CliError;
use crate::metadata::Metadata;
use crate::offline::OfflineGenerator;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub stage_chain: Vec<StageId>,
    pub origin: Option<(DataOrigin, &'static str)>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            latency_ms: 0,
            cache_hit: false,
            stage_chain: Vec::new(),
            origin: None,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_cache_hit(mut self, cache_hit: bool) -> Self {
        self.cache_hit = cache_hit;
        self
    }

    pub fn with_stage_chain(mut self, stage_chain: Vec<StageId>) -> Self {
        self.stage_chain = stage_chain;
        self
    }

    pub fn with_origin(mut self, origin: DataOrigin, status: &'static str) -> Self {
        self.origin = Some((origin, status));
        self
    }
}

/// Everything a command needs, assembled once from flags and environment.
pub struct AppContext {
    pub normalizer: TrendNormalizer,
    pub generator: Arc<dyn TextGenerator>,
    pub journal: Journal,
    pub warnings: Vec<String>,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = HavenConfig::from_env();
        if let Some(timeout_ms) = cli.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        debug!(?config, "resolved configuration");

        let cache = if cli.no_cache {
            TrendCache::disabled()
        } else {
            config.file_cache()
        };
        let mut builder = TrendNormalizer::builder()
            .with_calibration(config.calibration()?)
            .with_cache(cache);

        let mut warnings = Vec::new();
        let client = if cli.mock {
            None
        } else {
            config.gemini_client()
        };
        let generator: Arc<dyn TextGenerator> = match client {
            Some(client) => {
                let client: Arc<dyn TextGenerator> = Arc::new(client);
                builder = builder.with_generator(Arc::clone(&client));
                client
            }
            None => {
                if !cli.mock {
                    warnings.push(String::from(
                        "no generation api key configured (HAVEN_GEMINI_API_KEY); running offline",
                    ));
                }
                Arc::new(OfflineGenerator)
            }
        };

        Ok(Self {
            normalizer: builder.build(),
            generator,
            journal: config.journal(),
            warnings,
        })
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let context = AppContext::from_cli(cli)?;

    let command_result = match &cli.command {
        Command::Trend(args) => trend::run(args, &context).await?,
        Command::Compare(args) => compare::run(args, &context).await?,
        Command::Assets => assets::run(&context)?,
        Command::Denoise(args) => companion::denoise(args, &context).await?,
        Command::Wisdom => companion::wisdom(&context).await?,
        Command::Letter(args) => companion::letter(args, &context).await?,
        Command::Quote(args) => companion::quote(args)?,
        Command::Journal(args) => match &args.command {
            JournalCommand::Add(add_args) => journal::add(add_args, &context.journal).await?,
            JournalCommand::List(list_args) => journal::list(list_args, &context.journal).await?,
            JournalCommand::Clear => journal::clear(&context.journal).await?,
            JournalCommand::Streak(streak_args) => {
                journal::streak_of(streak_args, &context.journal).await?
            }
        },
        Command::Cache(args) => match &args.command {
            CacheCommand::Clear(clear_args) => cache::clear(clear_args, &context).await?,
        },
    };

    let CommandResult {
        data,
        warnings,
        errors,
        latency_ms,
        cache_hit,
        stage_chain,
        origin,
    } = command_result;

    let mut metadata = Metadata::new(stage_chain, latency_ms, cache_hit);
    metadata.origin = origin;
    for warning in context.warnings.into_iter().chain(warnings) {
        metadata.push_warning(warning);
    }

    let meta = metadata.into_envelope_meta()?;
    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}

pub(crate) fn parse_assets(raw: &[String]) -> Result<Vec<AssetId>, CliError> {
    let assets = raw
        .iter()
        .map(|value| value.parse::<AssetId>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assets)
}
