use serde_json::json;

use crate::cli::{WatchlistArgs, WatchlistCommand, WatchlistEditArgs};
use crate::error::CliError;
use crate::watchlist::{watchlist_path, Watchlist};

use super::{parse_symbols, AppContext, CommandResult};

pub fn run(args: &WatchlistArgs, context: &AppContext) -> Result<CommandResult, CliError> {
    let path = watchlist_path(&context.trendsig_home);
    let mut watchlist = Watchlist::load(&path)?;

    let data = match &args.command {
        WatchlistCommand::List => serde_json::to_value(&watchlist)?,
        WatchlistCommand::Groups => {
            let names: Vec<&String> = watchlist.groups.keys().collect();
            json!({ "groups": names })
        }
        WatchlistCommand::Add(edit) => {
            let symbols = canonical_symbols(edit)?;
            watchlist.add(&edit.group, &symbols);
            watchlist.save(&path)?;
            serde_json::to_value(&watchlist)?
        }
        WatchlistCommand::Remove(edit) => {
            let symbols = canonical_symbols(edit)?;
            watchlist.remove(&edit.group, &symbols);
            watchlist.save(&path)?;
            serde_json::to_value(&watchlist)?
        }
    };

    Ok(CommandResult::ok(data))
}

/// Validate and canonicalize the edit's symbols before touching the file.
fn canonical_symbols(edit: &WatchlistEditArgs) -> Result<Vec<String>, CliError> {
    Ok(parse_symbols(&edit.symbols)?
        .into_iter()
        .map(|id| id.storage_key())
        .collect())
}
