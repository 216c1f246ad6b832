use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use geofetch_lib::geofetch_api::JsonClient;
use geofetch_lib::{
    BindingSnapshot, DataBinding, DataCache, EndpointRequest, FetchOutcome, MemoryCache,
    RateLimiter, Scope, Settings,
};

use crate::output::{print_rows, truncate, FetchRow, OutputFormat};

#[derive(Args)]
pub struct FetchArgs {
    /// Base URL of the JSON API (e.g. https://api.example.com)
    #[arg(long)]
    pub base_url: String,

    /// Endpoint path (e.g. /stats/daily)
    pub endpoint: String,

    /// Query parameter as KEY=VALUE. Repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Number of times to bind and mount the endpoint
    #[arg(long, default_value = "2")]
    pub repeat: u32,

    /// Minimum spacing between the starts of two attempts, in milliseconds
    #[arg(long, default_value = "0")]
    pub pause_ms: u64,

    /// Signal focus instead of remounting after the first attempt
    #[arg(long)]
    pub focus: bool,

    /// Force a fetch on every attempt, ignoring the cache
    #[arg(long, conflicts_with = "focus")]
    pub force: bool,
}

pub async fn run(args: &FetchArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let mut request = EndpointRequest::new(&args.endpoint);
    for raw in &args.params {
        let (name, value) = parse_param(raw)?;
        request = request.with_param(name, value);
    }

    let client = JsonClient::with_timeout(
        &args.base_url,
        Duration::from_millis(settings.resolver.timeout_ms),
    )?;
    let store = Arc::new(MemoryCache::new(Duration::from_secs(settings.cache.ttl_secs)));
    let sweeper = settings
        .sweep_interval()
        .map(|interval| store.spawn_sweeper(interval));
    let cache = DataCache::new(store, client);
    let options = settings.binding_options();

    let scope = Scope::new();
    let _guard = scope.guard();
    let mut rows = Vec::new();
    let mut focused: Option<DataBinding<JsonClient>> = None;
    let pacing = RateLimiter::new(Duration::from_millis(args.pause_ms));

    for attempt in 1..=args.repeat.max(1) {
        pacing.acquire().await;

        let (outcome, snapshot) = match &focused {
            Some(binding) => {
                let outcome = match binding.on_focus() {
                    Some(refresh) => refresh.await?,
                    None => FetchOutcome::Skipped,
                };
                (outcome, binding.snapshot())
            }
            None => {
                let binding = cache.bind(request.clone(), options, scope.clone());
                let outcome = if args.force {
                    binding.refetch().await
                } else {
                    binding.mount().await
                };
                let snapshot = binding.snapshot();
                if args.focus {
                    focused = Some(binding);
                }
                (outcome, snapshot)
            }
        };

        tracing::debug!(attempt, ?outcome, "fetch attempt finished");
        rows.push(fetch_row(attempt, &outcome, &snapshot));
    }

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    let stats = cache.store().stats();
    tracing::info!(
        entries = stats.total,
        active = stats.active,
        "fetched {} {} time(s)",
        request.endpoint,
        rows.len()
    );

    print_rows(&rows, format);
    Ok(())
}

fn fetch_row(
    attempt: u32,
    outcome: &FetchOutcome,
    snapshot: &BindingSnapshot<serde_json::Value>,
) -> FetchRow {
    let outcome = match outcome {
        FetchOutcome::Applied => "fetched".to_string(),
        FetchOutcome::FromCache => "cache".to_string(),
        FetchOutcome::Failed(err) => format!("failed: {}", err),
        FetchOutcome::Ignored => "ignored".to_string(),
        FetchOutcome::Skipped => "fresh".to_string(),
    };
    FetchRow {
        attempt,
        outcome,
        cached: snapshot.cached,
        updated: snapshot
            .last_updated
            .map(|at| at.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_default(),
        data: snapshot
            .data
            .as_ref()
            .map(|data| truncate(&data.to_string(), 60))
            .unwrap_or_default(),
    }
}

pub fn parse_param(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("Invalid parameter '{}': expected KEY=VALUE", raw),
    }
}
