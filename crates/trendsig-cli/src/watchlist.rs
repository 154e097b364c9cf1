//! Grouped symbol watchlist persisted as a JSON file.
//!
//! The file lives next to the database under the trendsig home directory
//! and maps group names to canonical series ids.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CliError;

pub const WATCHLIST_FILE: &str = "watchlist.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watchlist {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Watchlist {
    /// Load the watchlist, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Add symbols to a group, keeping the group sorted and free of
    /// duplicates.
    pub fn add(&mut self, group: &str, symbols: &[String]) {
        let entry = self.groups.entry(group.to_owned()).or_default();
        for symbol in symbols {
            if !entry.contains(symbol) {
                entry.push(symbol.clone());
            }
        }
        entry.sort();
    }

    /// Remove symbols from a group, dropping the group once empty.
    pub fn remove(&mut self, group: &str, symbols: &[String]) {
        if let Some(entry) = self.groups.get_mut(group) {
            entry.retain(|existing| !symbols.contains(existing));
            if entry.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    /// Every symbol across all groups, deduplicated and sorted.
    pub fn all_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .groups
            .values()
            .flat_map(|group| group.iter().cloned())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

pub fn watchlist_path(trendsig_home: &Path) -> PathBuf {
    trendsig_home.join(WATCHLIST_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_deduplicates_and_sorts_within_a_group() {
        let mut watchlist = Watchlist::default();
        watchlist.add(
            "tech",
            &[String::from("equity:MSFT"), String::from("equity:AAPL")],
        );
        watchlist.add("tech", &[String::from("equity:AAPL")]);

        assert_eq!(
            watchlist.groups.get("tech").map(Vec::as_slice),
            Some(&["equity:AAPL".to_owned(), "equity:MSFT".to_owned()][..])
        );
    }

    #[test]
    fn removing_the_last_symbol_drops_the_group() {
        let mut watchlist = Watchlist::default();
        watchlist.add("solo", &[String::from("equity:AAPL")]);
        watchlist.remove("solo", &[String::from("equity:AAPL")]);

        assert!(watchlist.groups.is_empty());
    }

    #[test]
    fn round_trips_through_the_file() {
        let temp = tempdir().expect("tempdir");
        let path = watchlist_path(temp.path());

        let mut watchlist = Watchlist::default();
        watchlist.add("macro", &[String::from("macro:^VIX")]);
        watchlist.save(&path).expect("save");

        let loaded = Watchlist::load(&path).expect("load");
        assert_eq!(loaded, watchlist);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let temp = tempdir().expect("tempdir");
        let loaded = Watchlist::load(&watchlist_path(temp.path())).expect("load");
        assert!(loaded.groups.is_empty());
    }

    #[test]
    fn all_symbols_spans_groups_without_duplicates() {
        let mut watchlist = Watchlist::default();
        watchlist.add("a", &[String::from("equity:AAPL")]);
        watchlist.add(
            "b",
            &[String::from("equity:AAPL"), String::from("rate:DFF")],
        );

        assert_eq!(
            watchlist.all_symbols(),
            vec!["equity:AAPL".to_owned(), "rate:DFF".to_owned()]
        );
    }
}
