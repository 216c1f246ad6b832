use anyhow::{bail, Context, Result};
use clap::Args;
use geofetch_lib::geofetch_api::Client;
use geofetch_lib::{AddressResolver, Lookup, Nominatim, ResolvedAddress, Scope, Settings};
use tokio::task::JoinSet;

use crate::output::{print_rows, AddressRow, OutputFormat};

#[derive(Args)]
pub struct ResolveArgs {
    /// Coordinates as LAT,LON (e.g. 40.4168,-3.7038). Repeat to resolve several at once
    #[arg(required = true, allow_hyphen_values = true)]
    pub coords: Vec<String>,

    /// Leave unresolvable coordinates blank instead of printing them back
    #[arg(long)]
    pub no_fallback: bool,

    /// Override the geocoder base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

pub async fn run(args: &ResolveArgs, settings: &Settings, format: OutputFormat) -> Result<()> {
    let points = args
        .coords
        .iter()
        .map(|raw| parse_coordinate(raw))
        .collect::<Result<Vec<_>>>()?;

    let base_url = args
        .base_url
        .as_deref()
        .unwrap_or(&settings.resolver.base_url);
    let client = Client::with_base_url(base_url, &settings.resolver.user_agent)?;
    let geocoder = Nominatim::new(client)
        .with_zoom(settings.resolver.zoom)
        .with_language(settings.resolver.language.as_deref());
    let resolver = AddressResolver::new(geocoder, settings.resolver_config());

    let mut options = settings.resolve_options();
    if args.no_fallback {
        options.fallback_to_coords = false;
    }

    let scope = Scope::new();
    let mut tasks = JoinSet::new();
    for (index, (lat, lon)) in points.iter().copied().enumerate() {
        let resolver = resolver.clone();
        let scope = scope.clone();
        tasks.spawn(async move {
            let lookup = resolver.lookup(Some(lat), Some(lon), options, &scope);
            let skipped = matches!(lookup, Lookup::Skipped);
            let settled = lookup.settle(&scope).await;
            (index, skipped, settled)
        });
    }

    let mut rows: Vec<Option<AddressRow>> = (0..points.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, skipped, settled) = joined.context("resolve task panicked")?;
        rows[index] = Some(address_row(&args.coords[index], skipped, settled));
    }
    let rows: Vec<AddressRow> = rows.into_iter().flatten().collect();

    let stats = resolver.stats();
    tracing::info!(
        dispatched = stats.dispatched,
        coalesced = stats.coalesced,
        cache_hits = stats.cache_hits,
        failed = stats.failed,
        "resolved {} coordinate(s)",
        rows.len()
    );

    print_rows(&rows, format);
    Ok(())
}

fn address_row(input: &str, skipped: bool, settled: Option<ResolvedAddress>) -> AddressRow {
    let (address, source) = match settled {
        _ if skipped => (String::new(), "invalid"),
        Some(ResolvedAddress {
            text: Some(text),
            fallback: false,
        }) => (text, "resolved"),
        Some(ResolvedAddress {
            text: Some(text),
            fallback: true,
        }) => (text, "fallback"),
        Some(ResolvedAddress { text: None, .. }) => (String::new(), "unresolved"),
        None => (String::new(), "cancelled"),
    };
    AddressRow {
        input: input.to_string(),
        address,
        source: source.to_string(),
    }
}

/// Parses `LAT,LON`. Range checks are left to the resolver.
pub fn parse_coordinate(raw: &str) -> Result<(f64, f64)> {
    let Some((lat, lon)) = raw.split_once(',') else {
        bail!("Invalid coordinate '{}': expected LAT,LON", raw);
    };
    let lat: f64 = lat
        .trim()
        .parse()
        .with_context(|| format!("Invalid latitude in '{}'", raw))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .with_context(|| format!("Invalid longitude in '{}'", raw))?;
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lat_lon_pair() {
        assert_eq!(parse_coordinate("40.4168,-3.7038").unwrap(), (40.4168, -3.7038));
        assert_eq!(parse_coordinate(" 1.5 , 2 ").unwrap(), (1.5, 2.0));
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(parse_coordinate("40.4168").is_err());
        assert!(parse_coordinate("north,-3.7").is_err());
        assert!(parse_coordinate("40.4,").is_err());
    }

    #[test]
    fn rows_label_their_source() {
        let row = address_row(
            "1,2",
            false,
            Some(ResolvedAddress {
                text: Some("1.0000, 2.0000".into()),
                fallback: true,
            }),
        );
        assert_eq!(row.source, "fallback");
        assert_eq!(row.address, "1.0000, 2.0000");

        assert_eq!(address_row("95,0", true, None).source, "invalid");
        assert_eq!(address_row("1,2", false, None).source, "cancelled");
    }
}
