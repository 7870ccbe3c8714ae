use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Accessor handle for the table container. The harvester never resolves it
/// itself; every surface call receives it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRef {
    pub selector: String,
}

impl ContainerRef {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.selector)
    }
}

/// A row exactly as the render surface reported it, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub text: String,
    #[serde(default)]
    pub cells: Vec<String>,
    /// Stable per-row identity exposed by the renderer (`aria-rowindex`,
    /// `data-row-id`, ...), when there is one.
    #[serde(default)]
    pub identity: Option<String>,
}

impl RawRow {
    pub fn from_cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cells: Vec<String> = cells.into_iter().map(Into::into).collect();
        Self {
            text: cells.join("\t"),
            cells,
            identity: None,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }
}

/// A normalized row: trimmed field values plus the raw text it came from
/// when columnar structure had to be guessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

/// One output record: column name → field value, in column order.
pub type Record = IndexMap<String, String>;

/// Which scroller the advance driver is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollScope {
    /// Nearest ancestor of the container with `overflow-y: auto|scroll`.
    Ancestor,
    /// First such element inside the container (custom list wrappers).
    Descendant,
    /// The document scroller itself.
    Document,
}

/// Vertical scroll geometry of one scroller, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollGeometry {
    pub offset: f64,
    pub viewport: f64,
    pub max_offset: f64,
}

impl ScrollGeometry {
    /// Offsets within one pixel of the maximum count as the end.
    pub fn at_ceiling(&self) -> bool {
        self.offset >= self.max_offset - 1.0
    }

    pub fn has_extent(&self) -> bool {
        self.max_offset > 1.0
    }

    pub fn next_offset(&self) -> f64 {
        (self.offset + self.viewport.max(1.0)).min(self.max_offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickOutcome {
    Clicked,
    Disabled,
    Missing,
}

/// Result of one "reveal more" action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvanceReport {
    /// The scroll offset (or page) actually moved.
    pub changed: bool,
    /// The offset equals the computed maximum.
    pub at_ceiling: bool,
    /// Some scroller had any extent at all. `false` means the whole list
    /// already fits on screen.
    pub scrollable: bool,
    pub scope: Option<ScrollScope>,
}

impl AdvanceReport {
    /// What we report when the surface could not be read: nothing moved, but
    /// nothing proves we are at the end either.
    pub fn unknown() -> Self {
        Self {
            changed: false,
            at_ceiling: false,
            scrollable: true,
            scope: None,
        }
    }
}

/// "showing X of Y" as advertised by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCount {
    pub shown: u64,
    pub total: u64,
}

/// Why a run stopped successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergeReason {
    /// Ledger size reached the advertised total.
    TargetReached,
    /// The whole list fit on screen; there was nothing to scroll.
    FullyRendered,
    /// Stagnated at the end of the scroll range; best effort.
    EndOfContent,
}

/// Why a run hit a safety stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustReason {
    WallClock,
    Attempts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    ContainerMissing,
    NoRowsObserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Converged(ConvergeReason),
    Exhausted(ExhaustReason),
    Empty(EmptyReason),
}

impl Outcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Outcome::Converged(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Outcome::Exhausted(_))
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Converged(r) => write!(f, "CONVERGED ({:?})", r),
            Outcome::Exhausted(r) => write!(f, "EXHAUSTED ({:?})", r),
            Outcome::Empty(r) => write!(f, "EMPTY ({:?})", r),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    pub run_id: uuid::Uuid,
    pub container: String,
    pub outcome: Outcome,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    #[serde(default)]
    pub target: Option<TargetCount>,
    pub attempts: u64,
    /// Pages visited in the pagination phase, not counting the first.
    pub pages: u32,
    pub virtualized: bool,
    pub elapsed_ms: u64,
    pub finished_at: String,
}

impl HarvestReport {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows collected against the advertised total, capped at 100.
    pub fn completion_pct(&self) -> Option<f64> {
        let total = self.target?.total;
        if total == 0 {
            return Some(100.0);
        }
        Some((self.rows.len() as f64 / total as f64 * 100.0).min(100.0))
    }
}
