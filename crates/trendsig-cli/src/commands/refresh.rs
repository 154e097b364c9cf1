use std::sync::Arc;

use serde::Serialize;

use trendsig_core::RefreshRunner;

use crate::cli::RefreshArgs;
use crate::error::CliError;
use crate::watchlist::{watchlist_path, Watchlist};

use super::{parse_symbols, AppContext, CommandResult};

#[derive(Debug, Serialize)]
struct NewSignalEntry {
    id: String,
    date: String,
    direction: String,
    status: String,
}

#[derive(Debug, Serialize)]
struct RefreshFailure {
    id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    window: String,
    total: usize,
    new_signals: Vec<NewSignalEntry>,
    unchanged: usize,
    no_signal: usize,
    errors: Vec<RefreshFailure>,
}

pub async fn run(args: &RefreshArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let raw_symbols = if args.symbols.is_empty() {
        let watchlist = Watchlist::load(&watchlist_path(&context.trendsig_home))?;
        let symbols = watchlist.all_symbols();
        if symbols.is_empty() {
            return Err(CliError::Command(String::from(
                "no symbols given and the watchlist is empty",
            )));
        }
        symbols
    } else {
        args.symbols.clone()
    };
    let symbols = parse_symbols(&raw_symbols)?;

    let runner = RefreshRunner::new(Arc::clone(&context.cache), args.jobs);
    let report = runner.run(symbols, args.window).await;

    let response = RefreshResponse {
        window: args.window.as_str().to_owned(),
        total: report.total(),
        new_signals: report
            .new_signals
            .iter()
            .map(|change| NewSignalEntry {
                id: change.id.storage_key(),
                date: change.crossover.date.to_string(),
                direction: change.crossover.direction.as_str().to_owned(),
                status: change.status.as_str().to_owned(),
            })
            .collect(),
        unchanged: report.unchanged,
        no_signal: report.no_signal,
        errors: report
            .errors
            .iter()
            .map(|(id, error)| RefreshFailure {
                id: id.storage_key(),
                error: error.clone(),
            })
            .collect(),
    };

    let item_failures = response.errors.len();
    Ok(CommandResult::ok(serde_json::to_value(response)?).with_item_failures(item_failures))
}
