use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::deal::Deal;
use crate::extract;

/// Entries kept across runs; oldest are dropped first.
const MAX_ENTRIES: usize = 100;

/// Bounded list of product ids already posted, persisted as JSON between
/// runs. Loading tolerates a missing or corrupt file by starting empty;
/// ids are appended only after a publish is confirmed.
#[derive(Debug, Default)]
pub struct PostedHistory {
    ids: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct HistoryFile {
    posted_ids: Vec<String>,
}

/// Accept both the object wrapper and a bare array on disk.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryShape {
    Wrapped(HistoryFile),
    Bare(Vec<String>),
}

impl PostedHistory {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::info!(path = %path.display(), "No posted history, starting empty");
                return Self::default();
            }
        };

        match serde_json::from_str::<HistoryShape>(&content) {
            Ok(HistoryShape::Wrapped(file)) => Self::from_ids(file.posted_ids),
            Ok(HistoryShape::Bare(ids)) => Self::from_ids(ids),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable posted history, starting empty");
                Self::default()
            }
        }
    }

    fn from_ids(ids: Vec<String>) -> Self {
        tracing::info!(count = ids.len(), "Loaded posted history");
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keep only deals whose posted id is absent from history. Deals with no
    /// derivable id are dropped too: they cannot be tracked across runs.
    pub fn filter_new(&self, deals: Vec<Deal>) -> Vec<Deal> {
        deals
            .into_iter()
            .filter(|deal| match posted_id(deal) {
                Some(id) if self.contains(&id) => {
                    tracing::info!(title = %deal.title, "Skipping previously posted deal");
                    false
                }
                Some(_) => true,
                None => {
                    tracing::warn!(title = %deal.title, "Deal has no trackable id, skipping");
                    false
                }
            })
            .collect()
    }

    /// Merge newly-posted ids into history, dedup preserving first
    /// occurrence, keep the most recent entries, and write back. A write
    /// failure is logged, not fatal; the next run simply retries.
    pub fn append_and_save(&mut self, new_ids: &[String], path: impl AsRef<Path>) {
        for id in new_ids {
            if !self.contains(id) {
                self.ids.push(id.clone());
            }
        }
        if self.ids.len() > MAX_ENTRIES {
            let excess = self.ids.len() - MAX_ENTRIES;
            self.ids.drain(..excess);
        }

        let path = path.as_ref();
        let file = HistoryFile {
            posted_ids: self.ids.clone(),
        };
        let result = serde_json::to_string_pretty(&file)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(path, json).map_err(anyhow::Error::from));
        match result {
            Ok(()) => {
                tracing::info!(added = new_ids.len(), total = self.ids.len(), "Saved posted history")
            }
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to save posted history"),
        }
    }
}

/// The cross-run identity of a deal is its marketplace product id.
pub fn posted_id(deal: &Deal) -> Option<String> {
    extract::product_id(&deal.link)
}
