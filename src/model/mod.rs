use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a reporting source (one ship).
pub type SourceId = String;

/// One row of a source worksheet, before validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub tour_name: String,
    pub allotment: f64,
    pub sold: f64,
    pub pax_on_board: f64,
    pub pax_on_tour: f64,
}

impl RawRecord {
    /// Record for `tour_name` with every count at zero.
    pub fn new(tour_name: impl Into<String>) -> Self {
        Self {
            tour_name: tour_name.into(),
            ..Self::default()
        }
    }

    /// Sets the allotment and sold counts.
    pub fn with_counts(mut self, allotment: f64, sold: f64) -> Self {
        self.allotment = allotment;
        self.sold = sold;
        self
    }

    /// Sets the passengers on board and on tour.
    pub fn with_pax(mut self, on_board: f64, on_tour: f64) -> Self {
        self.pax_on_board = on_board;
        self.pax_on_tour = on_tour;
        self
    }
}

/// Closed set of canonical tour categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TourType {
    Catamaran,
    Champagne,
    Invisible,
}

impl TourType {
    /// Every category, in report order.
    pub const ALL: [TourType; 3] = [TourType::Catamaran, TourType::Champagne, TourType::Invisible];

    /// The only tour name accepted for this category.
    pub fn canonical_name(self) -> &'static str {
        match self {
            TourType::Catamaran => "Catamaran Sail & Snorkel",
            TourType::Champagne => "Champagne Adults Only",
            TourType::Invisible => "Invisible Boat Family",
        }
    }

    /// Exact-match lookup of a tour name; no trimming or case folding.
    pub fn from_tour_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tour_type| tour_type.canonical_name() == name)
    }

    /// Lowercase key used in template markers and serialized output.
    pub fn key(self) -> &'static str {
        match self {
            TourType::Catamaran => "catamaran",
            TourType::Champagne => "champagne",
            TourType::Invisible => "invisible",
        }
    }
}

impl fmt::Display for TourType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A raw record whose tour name matched one of the known categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    #[serde(flatten)]
    pub record: RawRecord,
    pub tour_type: TourType,
}

/// What one source currently reports.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceExtract {
    pub date: String,
    pub operator: String,
    pub source_name: String,
    pub records: Vec<RawRecord>,
    /// Numeric cells that could not be parsed and were read as `0`.
    #[serde(default)]
    pub degraded_cells: usize,
}

/// A validated record tagged with the source that reported it.
///
/// Only the merger creates these; the fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedRecord {
    #[serde(flatten)]
    record: ValidatedRecord,
    source_id: SourceId,
    source_name: String,
    date: String,
    operator: String,
}

impl AttributedRecord {
    pub(crate) fn new(
        record: ValidatedRecord,
        source_id: SourceId,
        source_name: String,
        date: String,
        operator: String,
    ) -> Self {
        Self {
            record,
            source_id,
            source_name,
            date,
            operator,
        }
    }

    /// Counts as read from the source worksheet.
    pub fn record(&self) -> &RawRecord {
        &self.record.record
    }

    /// Category the tour name matched.
    pub fn tour_type(&self) -> TourType {
        self.record.tour_type
    }

    /// Id of the reporting source.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Display name of the source, such as `Ship A`.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Report date of the source, as displayed.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Operator named in the source header.
    pub fn operator(&self) -> &str {
        &self.operator
    }
}

/// A tour type reported by more than one source in the same run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TourConflict {
    pub tour_type: TourType,
    /// Source ids in the order they were first seen.
    pub source_ids: Vec<SourceId>,
}

/// Result of one consolidation run, rebuilt from scratch every time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsolidatedDataset {
    pub contributing_sources: Vec<SourceId>,
    pub records: Vec<AttributedRecord>,
    pub total_record_count: usize,
    /// Source that triggered the run; display only, never a merge key.
    pub last_updated_by_source: SourceId,
    #[serde(default)]
    pub conflicts: Vec<TourConflict>,
}

impl ConsolidatedDataset {
    /// The conflict recorded for `tour_type`, if any.
    pub fn conflict_for(&self, tour_type: TourType) -> Option<&TourConflict> {
        self.conflicts
            .iter()
            .find(|conflict| conflict.tour_type == tour_type)
    }
}
