//! Priority classes, operation kinds and the headroom each class must leave free.

use std::fmt;

/// Urgency of a request. Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Best-effort work, denied first when memory tightens.
    Background,
    /// Regular work.
    Normal,
    /// Work the user notices when it fails.
    Important,
    /// Work the appliance cannot function without.
    Critical,
}

impl Priority {
    /// All tiers, least urgent first.
    pub const ALL: [Priority; 4] = [
        Priority::Background,
        Priority::Normal,
        Priority::Important,
        Priority::Critical,
    ];

    /// Stable lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Background => "background",
            Priority::Normal => "normal",
            Priority::Important => "important",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of memory-heavy operation a grant covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Parsing a fetched document.
    JsonParsing,
    /// Network round-trip with response buffering.
    HttpRequest,
    /// Generic in-memory transformation.
    DataProcessing,
    /// Building a frame or sprite.
    DisplayUpdate,
    /// Reading or rewriting configuration.
    ConfigOperation,
}

impl Operation {
    /// Stable name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::JsonParsing => "json_parsing",
            Operation::HttpRequest => "http_request",
            Operation::DataProcessing => "data_processing",
            Operation::DisplayUpdate => "display_update",
            Operation::ConfigOperation => "config_operation",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heap thresholds in effect at one instant.
///
/// Headroom per tier:
/// - `Critical`   → `critical / 2`
/// - `Important`  → `critical`
/// - `Normal`     → `max(low, critical)`
/// - `Background` → `max(low, critical) + background_margin`
///
/// The `max` keeps the tiers ordered when `low` is configured below
/// `critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Free heap below which memory is low.
    pub low: usize,
    /// Free heap below which memory is critical.
    pub critical: usize,
    /// Extra headroom for background work.
    pub background_margin: usize,
}

impl Thresholds {
    /// Free bytes that must remain after a grant of the given priority.
    pub fn headroom(&self, priority: Priority) -> usize {
        match priority {
            Priority::Critical => self.critical / 2,
            Priority::Important => self.critical,
            Priority::Normal => self.normal_floor(),
            Priority::Background => self.normal_floor().saturating_add(self.background_margin),
        }
    }

    /// True when `low` sits below `critical`.
    pub fn is_inverted(&self) -> bool {
        self.low < self.critical
    }

    fn normal_floor(&self) -> usize {
        self.low.max(self.critical)
    }

    /// `estimated + headroom(priority)`, saturating.
    pub fn required(&self, priority: Priority, estimated: usize) -> usize {
        estimated.saturating_add(self.headroom(priority))
    }
}
