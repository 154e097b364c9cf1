use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;

use trendsig_core::{SeriesId, SignalStatus};

use crate::cli::ScanArgs;
use crate::error::CliError;

use super::{parse_symbols, AppContext, CommandResult};

#[derive(Debug, Serialize)]
struct ScanEntry {
    id: String,
    name: String,
    fast_ma: f64,
    slow_ma: f64,
    divergence_pct: f64,
    last_crossover: Option<CrossoverEntry>,
}

#[derive(Debug, Serialize)]
struct CrossoverEntry {
    date: String,
    direction: String,
}

#[derive(Debug, Serialize)]
struct ScanFailure {
    id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct ScanResponse {
    window: String,
    groups: BTreeMap<String, Vec<ScanEntry>>,
    errors: Vec<ScanFailure>,
}

pub async fn run(args: &ScanArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let symbols = parse_symbols(&args.symbols)?;

    let mut grouped: BTreeMap<SignalStatus, Vec<(Option<Date>, ScanEntry)>> = BTreeMap::new();
    let mut errors = Vec::new();

    for id in symbols {
        match classify_one(context, &id, args).await {
            Ok((status, crossover_date, entry)) => {
                grouped
                    .entry(status)
                    .or_default()
                    .push((crossover_date, entry));
            }
            Err(error) => errors.push(ScanFailure {
                id: id.storage_key(),
                error: error.to_string(),
            }),
        }
    }

    // Within each status group the freshest crossover comes first; series
    // without one sink to the bottom.
    let mut groups = BTreeMap::new();
    for (status, mut entries) in grouped {
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        groups.insert(
            status.as_str().to_owned(),
            entries.into_iter().map(|(_, entry)| entry).collect(),
        );
    }

    let item_failures = errors.len();
    let response = ScanResponse {
        window: args.window.as_str().to_owned(),
        groups,
        errors,
    };

    Ok(CommandResult::ok(serde_json::to_value(response)?).with_item_failures(item_failures))
}

async fn classify_one(
    context: &AppContext,
    id: &SeriesId,
    args: &ScanArgs,
) -> Result<(SignalStatus, Option<Date>, ScanEntry), trendsig_core::CacheError> {
    let result = context.cache.classify_series(id, args.window).await?;

    // Metadata is best-effort; a source without a profile endpoint keeps
    // the plain code as the display name.
    let name = match context.cache.profile(id).await {
        Ok(profile) => profile.name,
        Err(_) => id.code().to_owned(),
    };

    let crossover_date = result.last_crossover.map(|cross| cross.date);
    let entry = ScanEntry {
        id: id.storage_key(),
        name,
        fast_ma: result.fast_ma,
        slow_ma: result.slow_ma,
        divergence_pct: result.divergence_pct,
        last_crossover: result.last_crossover.map(|cross| CrossoverEntry {
            date: cross.date.to_string(),
            direction: cross.direction.as_str().to_owned(),
        }),
    };

    Ok((result.status, crossover_date, entry))
}
