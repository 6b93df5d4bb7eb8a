use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::detection::DetectionRecord;
use crate::frame::Frame;
use crate::sink::TickResult;
use crate::source::SourceKind;

/// Bound on result history.
///
/// Each retained entry holds an annotated frame (about 1 MB at 640x480), so
/// a live run without `max_entries` is capped at `live_max_entries` instead
/// of growing until stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Keep annotated frames so they can be exported later.
    pub retain_frames: bool,
    /// Oldest entries are dropped beyond this count. `None` keeps everything
    /// for finite sources.
    pub max_entries: Option<usize>,
    /// Cap used for live sources when `max_entries` is `None`.
    pub live_max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retain_frames: true,
            max_entries: None,
            live_max_entries: 1800,
        }
    }
}

impl HistoryConfig {
    pub fn limit_for(&self, kind: SourceKind) -> Option<usize> {
        match (self.max_entries, kind) {
            (Some(max), _) => Some(max),
            (None, SourceKind::Live) => Some(self.live_max_entries),
            (None, _) => None,
        }
    }
}

/// What the pipeline remembers about one processed frame.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub frame_index: u64,
    pub timestamp: DateTime<Local>,
    pub records: Vec<DetectionRecord>,
    pub info_lines: Vec<String>,
    pub annotated: Option<Arc<Frame>>,
}

/// Results accumulated over one run, cleared on start and reset.
#[derive(Debug, Clone, Default)]
pub struct ResultHistory {
    config: HistoryConfig,
    limit: Option<usize>,
    entries: VecDeque<HistoryEntry>,
}

impl ResultHistory {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            limit: config.max_entries,
            config,
            entries: VecDeque::new(),
        }
    }

    /// Clear previous results and bound the history for a run over `kind`.
    pub fn begin_run(&mut self, kind: SourceKind) {
        self.entries.clear();
        self.limit = self.config.limit_for(kind);
    }

    pub fn record(&mut self, result: &TickResult) {
        if !self.config.enabled {
            return;
        }
        self.entries.push_back(HistoryEntry {
            frame_index: result.frame_index,
            timestamp: result.timestamp,
            records: result.records.clone(),
            info_lines: result.info_lines(),
            annotated: self.config.retain_frames.then(|| result.annotated.clone()),
        });
        if let Some(max) = self.limit {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &HistoryEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
