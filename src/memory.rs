//! Interaction memory: an append-only log of turns plus per-command success
//! statistics.
//!
//! Saving is periodic: the full document is rewritten only when the total
//! number of appended records reaches a multiple of [`SAVE_EVERY`]. Up to
//! `SAVE_EVERY - 1` of the newest records can be lost on abnormal exit unless
//! [`InteractionMemory::flush`] runs at shutdown.
//!
//! The in-memory log is bounded by `max_records`; once it is full the oldest
//! records are dropped. Pattern statistics are never dropped and keep
//! counting every record ever stored.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::context::ContextSnapshot;
use crate::persist::{JsonDocument, StoreResult, now_secs};
use crate::similarity::{self, SAME_THRESHOLD};

/// Records between periodic saves.
pub const SAVE_EVERY: u64 = 10;

/// Default bound on the in-memory log.
pub const DEFAULT_MAX_RECORDS: usize = 1000;

/// Number of entries in each ranked list returned by [`InteractionMemory::analyze`].
pub const TOP_PATTERNS: usize = 10;

/// One completed turn. Never modified after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: u64,
    pub command: String,
    pub response: String,
    pub success: bool,
    pub context: ContextSnapshot,
}

/// Usage counters for one lowercase command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStats {
    pub total: u64,
    pub successful: u64,
}

impl PatternStats {
    /// `successful / total`, or 0 when nothing was recorded.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

/// Aggregate view over the whole memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryAnalysis {
    /// Records currently held in memory.
    pub total: usize,
    /// Fraction of held records that succeeded (0 when empty).
    pub overall_success_rate: f64,
    /// Most frequent commands by total count, descending.
    pub common_patterns: Vec<(String, u64)>,
    /// Most frequent commands by successful count, descending.
    pub successful_patterns: Vec<(String, u64)>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryState {
    #[serde(default)]
    interactions: Vec<InteractionRecord>,
    #[serde(default)]
    patterns: BTreeMap<String, PatternStats>,
    #[serde(default)]
    appended: u64,
    #[serde(default)]
    last_updated: u64,
}

#[derive(Serialize)]
struct MemoryStateRef<'a> {
    interactions: &'a VecDeque<InteractionRecord>,
    patterns: &'a BTreeMap<String, PatternStats>,
    appended: u64,
    last_updated: u64,
}

/// Durable record of past turns with success statistics.
#[derive(Debug)]
pub struct InteractionMemory {
    records: VecDeque<InteractionRecord>,
    patterns: BTreeMap<String, PatternStats>,
    /// Total records ever stored, including ones evicted from `records`.
    appended: u64,
    max_records: usize,
    document: Option<JsonDocument>,
}

impl InteractionMemory {
    /// Memory that never touches the filesystem.
    pub fn in_memory(max_records: usize) -> Self {
        Self {
            records: VecDeque::new(),
            patterns: BTreeMap::new(),
            appended: 0,
            max_records: max_records.max(1),
            document: None,
        }
    }

    /// Open memory backed by a JSON document, restoring saved state.
    pub fn open(path: impl Into<PathBuf>, max_records: usize) -> Self {
        let document = JsonDocument::new(path);
        let state: MemoryState = document.load_or_default();

        let mut memory = Self {
            document: Some(document),
            ..Self::in_memory(max_records)
        };
        memory.appended = state.appended.max(state.interactions.len() as u64);
        memory.patterns = state.patterns;
        memory.records = state.interactions.into();
        memory.enforce_bound();

        tracing::debug!(
            records = memory.records.len(),
            patterns = memory.patterns.len(),
            "interaction memory loaded"
        );
        memory
    }

    /// Append a record and update the command's statistics.
    pub fn store(&mut self, command: &str, response: &str, success: bool, context: ContextSnapshot) {
        self.records.push_back(InteractionRecord {
            timestamp: now_secs(),
            command: command.to_string(),
            response: response.to_string(),
            success,
            context,
        });
        self.enforce_bound();

        let stats = self.patterns.entry(command.to_lowercase()).or_default();
        stats.total += 1;
        if success {
            stats.successful += 1;
        }

        self.appended += 1;
        if self.appended % SAVE_EVERY == 0 {
            if let Err(e) = self.flush() {
                tracing::warn!(error = %e, "periodic interaction memory save failed");
            }
        }
    }

    /// Success ratio for a command, 0 if it was never seen.
    pub fn success_rate(&self, command: &str) -> f64 {
        self.patterns
            .get(&command.to_lowercase())
            .map(PatternStats::rate)
            .unwrap_or(0.0)
    }

    /// Counters for a command, if any.
    pub fn stats(&self, command: &str) -> Option<PatternStats> {
        self.patterns.get(&command.to_lowercase()).copied()
    }

    /// Successful records whose command is at least `threshold` similar.
    ///
    /// Results keep insertion order; they are not ranked by similarity.
    pub fn similar_successful(&self, command: &str, threshold: f64) -> Vec<&InteractionRecord> {
        self.records
            .iter()
            .filter(|r| r.success && similarity::similarity(command, &r.command) >= threshold)
            .collect()
    }

    /// [`similar_successful`](Self::similar_successful) at the shared threshold.
    pub fn similar_successful_default(&self, command: &str) -> Vec<&InteractionRecord> {
        self.similar_successful(command, SAME_THRESHOLD)
    }

    pub fn analyze(&self) -> MemoryAnalysis {
        let total = self.records.len();
        let overall_success_rate = if total == 0 {
            0.0
        } else {
            self.records.iter().filter(|r| r.success).count() as f64 / total as f64
        };

        MemoryAnalysis {
            total,
            overall_success_rate,
            common_patterns: top_by(&self.patterns, |s| s.total),
            successful_patterns: top_by(&self.patterns, |s| s.successful),
        }
    }

    /// Records currently held, oldest first.
    pub fn records(&self) -> impl ExactSizeIterator<Item = &InteractionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total records ever stored.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Write the full document now, regardless of the periodic boundary.
    pub fn flush(&self) -> StoreResult<()> {
        let Some(document) = &self.document else {
            return Ok(());
        };
        document.write(&MemoryStateRef {
            interactions: &self.records,
            patterns: &self.patterns,
            appended: self.appended,
            last_updated: now_secs(),
        })
    }

    fn enforce_bound(&mut self) {
        while self.records.len() > self.max_records {
            self.records.pop_front();
        }
    }
}

/// Top [`TOP_PATTERNS`] commands by `key`, descending; ties by command text.
fn top_by(
    patterns: &BTreeMap<String, PatternStats>,
    key: impl Fn(&PatternStats) -> u64,
) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = patterns
        .iter()
        .map(|(cmd, stats)| (cmd.clone(), key(stats)))
        .filter(|(_, count)| *count > 0)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TOP_PATTERNS);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ContextSnapshot {
        ContextSnapshot::default()
    }

    #[test]
    fn unseen_command_has_zero_rate() {
        let memory = InteractionMemory::in_memory(DEFAULT_MAX_RECORDS);
        assert_eq!(memory.success_rate("never said"), 0.0);
    }

    #[test]
    fn success_rate_is_case_insensitive_ratio() {
        let mut memory = InteractionMemory::in_memory(DEFAULT_MAX_RECORDS);
        memory.store("Open Chrome", "ok", true, ctx());
        memory.store("open chrome", "failed", false, ctx());
        memory.store("OPEN CHROME", "ok", true, ctx());
        let rate = memory.success_rate("open chrome");
        assert!((rate - 2.0 / 3.0).abs() < 1e-12);
        let stats = memory.stats("open chrome").unwrap();
        assert!(stats.successful <= stats.total);
    }

    #[test]
    fn similar_successful_keeps_insertion_order() {
        let mut memory = InteractionMemory::in_memory(DEFAULT_MAX_RECORDS);
        memory.store("open chrom", "ok", true, ctx());
        memory.store("open chrome", "failed", false, ctx());
        memory.store("play music", "ok", true, ctx());
        memory.store("open chrome", "ok", true, ctx());

        let found = memory.similar_successful_default("open chrome");
        let commands: Vec<&str> = found.iter().map(|r| r.command.as_str()).collect();
        assert_eq!(commands, vec!["open chrom", "open chrome"]);
    }

    #[test]
    fn analyze_empty_memory_is_zero() {
        let memory = InteractionMemory::in_memory(DEFAULT_MAX_RECORDS);
        let analysis = memory.analyze();
        assert_eq!(analysis.total, 0);
        assert_eq!(analysis.overall_success_rate, 0.0);
        assert!(analysis.common_patterns.is_empty());
    }

    #[test]
    fn analyze_ranks_patterns() {
        let mut memory = InteractionMemory::in_memory(DEFAULT_MAX_RECORDS);
        for _ in 0..3 {
            memory.store("play music", "ok", true, ctx());
        }
        memory.store("open chrome", "ok", true, ctx());
        memory.store("fly", "no", false, ctx());
        memory.store("fly", "no", false, ctx());

        let analysis = memory.analyze();
        assert_eq!(analysis.total, 6);
        assert!((analysis.overall_success_rate - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(analysis.common_patterns[0], ("play music".to_string(), 3));
        assert_eq!(analysis.common_patterns[1], ("fly".to_string(), 2));
        assert_eq!(
            analysis.successful_patterns,
            vec![("play music".to_string(), 3), ("open chrome".to_string(), 1)]
        );
    }

    #[test]
    fn analyze_caps_lists_at_ten() {
        let mut memory = InteractionMemory::in_memory(DEFAULT_MAX_RECORDS);
        for i in 0..25 {
            memory.store(&format!("command {i}"), "ok", true, ctx());
        }
        let analysis = memory.analyze();
        assert_eq!(analysis.common_patterns.len(), TOP_PATTERNS);
        assert_eq!(analysis.successful_patterns.len(), TOP_PATTERNS);
    }

    #[test]
    fn bounded_log_drops_oldest_but_keeps_stats() {
        let mut memory = InteractionMemory::in_memory(3);
        for i in 0..5 {
            memory.store(&format!("cmd {i}"), "ok", i % 2 == 0, ctx());
        }
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.records().next().unwrap().command, "cmd 2");
        assert_eq!(memory.appended(), 5);
        assert_eq!(memory.success_rate("cmd 0"), 1.0);
    }

    #[test]
    fn saves_only_on_multiples_of_ten() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("memory_state.json");
        let mut memory = InteractionMemory::open(&path, DEFAULT_MAX_RECORDS);

        for i in 0..9 {
            memory.store(&format!("cmd {i}"), "ok", true, ctx());
        }
        assert!(!path.exists());

        memory.store("cmd 9", "ok", true, ctx());
        assert!(path.exists());

        memory.store("cmd 10", "ok", true, ctx());
        let reloaded = InteractionMemory::open(&path, DEFAULT_MAX_RECORDS);
        assert_eq!(reloaded.len(), 10);
    }
}
