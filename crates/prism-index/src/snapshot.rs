//! Immutable name snapshots and the swappable index handle.
//!
//! A snapshot is a sorted, deduplicated list of normalized package names.
//! The index handle starts empty (`Loading`) and is filled by a background
//! corpus load; readers either take the current snapshot or wait for one
//! under a deadline. Replacing a snapshot is an atomic swap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

/// Sorted, deduplicated, immutable list of package names.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NameSnapshot {
    names: Vec<String>,
}

impl NameSnapshot {
    /// Build from arbitrary names: sorts and deduplicates.
    pub fn from_names(mut names: Vec<String>) -> Self {
        names.sort_unstable();
        names.dedup();
        Self { names }
    }

    /// Build from newline-separated text (the `names.snapshot` file format).
    pub fn from_lines(text: &str) -> Self {
        Self::from_names(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Serialize to the `names.snapshot` file format.
    pub fn to_lines(&self) -> String {
        let mut out = String::new();
        for name in &self.names {
            out.push_str(name);
            out.push('\n');
        }
        out
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Exact membership test.
    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    /// The contiguous run of names starting with `prefix`.
    pub fn prefix_matches(&self, prefix: &str) -> &[String] {
        let start = self.names.partition_point(|n| n.as_str() < prefix);
        let rest = &self.names[start..];
        let end = rest.partition_point(|n| n.starts_with(prefix));
        &rest[..end]
    }
}

/// Swappable handle over the current snapshot.
///
/// `None` means the corpus is still loading; facades degrade to upstream
/// search until a snapshot is installed.
#[derive(Debug)]
pub struct NameIndex {
    tx: watch::Sender<Option<Arc<NameSnapshot>>>,
}

impl NameIndex {
    /// Create an empty (loading) index.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Atomically install a snapshot.
    pub fn install(&self, snapshot: NameSnapshot) {
        info!(names = snapshot.len(), "name index snapshot installed");
        // send_replace stores the value even with no live subscribers
        self.tx.send_replace(Some(Arc::new(snapshot)));
    }

    /// The current snapshot, if loading has finished.
    pub fn snapshot(&self) -> Option<Arc<NameSnapshot>> {
        self.tx.borrow().clone()
    }

    /// Whether a snapshot is installed.
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait for a snapshot, bounded by `deadline`.
    pub async fn wait_ready(&self, deadline: Duration) -> Option<Arc<NameSnapshot>> {
        if let Some(snapshot) = self.snapshot() {
            return Some(snapshot);
        }
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(deadline, async {
            loop {
                if let Some(snapshot) = rx.borrow_and_update().clone() {
                    return snapshot;
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;
        waited.ok()
    }
}

impl Default for NameIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> NameSnapshot {
        NameSnapshot::from_names(vec![
            "react".into(),
            "react-dom".into(),
            "redux".into(),
            "express".into(),
            "lodash".into(),
            "react".into(), // duplicate
        ])
    }

    #[test]
    fn sorts_and_dedupes() {
        let snap = snapshot();
        assert_eq!(snap.len(), 5);
        assert_eq!(snap.names()[0], "express");
        assert!(snap.contains("react"));
        assert!(!snap.contains("vue"));
    }

    #[test]
    fn prefix_matches_are_contiguous_and_complete() {
        let snap = snapshot();
        let matches: Vec<&str> = snap.prefix_matches("react").iter().map(String::as_str).collect();
        assert_eq!(matches, vec!["react", "react-dom"]);
        assert!(snap.prefix_matches("zzz").is_empty());
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let snap = snapshot();
        assert_eq!(snap.prefix_matches("").len(), snap.len());
    }

    #[test]
    fn lines_round_trip() {
        let snap = snapshot();
        let reloaded = NameSnapshot::from_lines(&snap.to_lines());
        assert_eq!(snap, reloaded);
    }

    #[tokio::test]
    async fn index_starts_loading_then_becomes_ready() {
        let index = NameIndex::new();
        assert!(!index.is_ready());
        assert!(index.wait_ready(Duration::from_millis(10)).await.is_none());

        index.install(snapshot());
        assert!(index.is_ready());
        assert_eq!(index.snapshot().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn waiters_are_woken_by_install() {
        let index = Arc::new(NameIndex::new());
        let waiter = {
            let index = Arc::clone(&index);
            tokio::spawn(async move { index.wait_ready(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        index.install(snapshot());
        let got = waiter.await.unwrap();
        assert_eq!(got.unwrap().len(), 5);
    }

    #[test]
    fn install_replaces_atomically() {
        let index = NameIndex::new();
        index.install(NameSnapshot::from_names(vec!["a".into()]));
        index.install(NameSnapshot::from_names(vec!["a".into(), "b".into()]));
        assert_eq!(index.snapshot().unwrap().len(), 2);
    }
}
