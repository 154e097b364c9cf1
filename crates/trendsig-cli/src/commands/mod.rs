mod refresh;
mod scan;
mod watchlist;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use trendsig_core::{
    ChartAdapter, FredAdapter, HttpClient, NoopHttpClient, ProviderPacer, ProviderRouter,
    ReqwestHttpClient, SeriesCache, SeriesId, SeriesStore, StoreConfig,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command produced: the JSON payload plus how many requested items
/// failed along the way.
pub struct CommandResult {
    pub data: Value,
    pub item_failures: usize,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            item_failures: 0,
        }
    }

    pub fn with_item_failures(mut self, item_failures: usize) -> Self {
        self.item_failures = item_failures;
        self
    }
}

/// Shared state handed to every command.
pub struct AppContext {
    pub cache: Arc<SeriesCache>,
    pub trendsig_home: PathBuf,
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Scan(args) => {
            let context = build_context(cli, args.min_interval_ms)?;
            scan::run(args, &context).await
        }
        Command::Refresh(args) => {
            let context = build_context(cli, args.min_interval_ms)?;
            refresh::run(args, &context).await
        }
        Command::Watchlist(args) => {
            let context = build_context(cli, 0)?;
            watchlist::run(args, &context)
        }
    }
}

fn build_context(cli: &Cli, min_interval_ms: u64) -> Result<AppContext, CliError> {
    let config = match &cli.db {
        Some(path) => StoreConfig::at_db_path(path),
        None => StoreConfig::default(),
    };
    let trendsig_home = config.trendsig_home.clone();
    let store = Arc::new(SeriesStore::open(config)?);

    let transport: Arc<dyn HttpClient> = if cli.offline {
        Arc::new(NoopHttpClient)
    } else {
        Arc::new(ReqwestHttpClient::new())
    };
    let chart = Arc::new(ChartAdapter::new(Arc::clone(&transport)));
    let rates = Arc::new(FredAdapter::new(transport));
    let router = Arc::new(ProviderRouter::new(chart, rates));

    let cache = Arc::new(SeriesCache::new(
        store,
        router,
        ProviderPacer::from_millis(min_interval_ms),
    ));

    Ok(AppContext {
        cache,
        trendsig_home,
    })
}

/// Parse a user-supplied symbol into a series id.
///
/// A `kind:CODE` form is taken verbatim; a bare code defaults to an equity.
pub fn parse_symbol(raw: &str) -> Result<SeriesId, CliError> {
    let id = if raw.contains(':') {
        SeriesId::from_str(raw)?
    } else {
        SeriesId::equity(raw)?
    };
    Ok(id)
}

pub fn parse_symbols(raw: &[String]) -> Result<Vec<SeriesId>, CliError> {
    raw.iter().map(|value| parse_symbol(value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendsig_core::SeriesKind;

    #[test]
    fn bare_code_parses_as_equity() {
        let id = parse_symbol("aapl").expect("must parse");
        assert_eq!(id.kind(), SeriesKind::Equity);
        assert_eq!(id.storage_key(), "equity:AAPL");
    }

    #[test]
    fn prefixed_code_keeps_its_kind() {
        let id = parse_symbol("rate:dff").expect("must parse");
        assert_eq!(id.kind(), SeriesKind::PolicyRate);
    }

    #[test]
    fn invalid_code_maps_to_validation_error() {
        let error = parse_symbol("9AAPL").expect_err("must fail");
        assert_eq!(error.exit_code(), 2);
    }
}
