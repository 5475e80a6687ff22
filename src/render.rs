//! Writes datasets into template worksheets.
//!
//! Single-source reports fill placeholder markers in fixed template rows
//! with per-tour totals. Consolidated reports write one header row and one
//! data row per attributed record, starting at the first empty row below a
//! fixed anchor.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::coerce::coerce_text;
use crate::grid::{CellRef, CellValue, DEFAULT_SHEET_NAME, Grid};
use crate::model::{ConsolidatedDataset, SourceExtract, TourType, ValidatedRecord};
use crate::names::SourceNames;
use crate::validate::validate;

/// What happens to rows already present in a consolidated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// New rows go after the existing ones; reruns accumulate history.
    #[default]
    Append,
    /// Rows belonging to a source in the current dataset are removed first,
    /// so each contributing source appears once with its latest data.
    ReplaceContributing,
}

/// Cell positions of the consolidated template. Rows are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidatedLayout {
    pub updated_by_cell: CellRef,
    pub sources_cell: CellRef,
    pub count_cell: CellRef,
    pub anchor_row: u32,
    pub columns: DataColumns,
}

/// Zero-based columns of one consolidated data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataColumns {
    pub tour: u16,
    pub tour_type: u16,
    pub date: u16,
    pub operator: u16,
    pub allotment: u16,
    pub sold: u16,
    pub pax_on_board: u16,
    pub pax_on_tour: u16,
    pub source_id: u16,
}

impl DataColumns {
    fn last(&self) -> u16 {
        [
            self.tour,
            self.tour_type,
            self.date,
            self.operator,
            self.allotment,
            self.sold,
            self.pax_on_board,
            self.pax_on_tour,
            self.source_id,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Layout of the built-in consolidated template.
pub const CONSOLIDATED_LAYOUT: ConsolidatedLayout = ConsolidatedLayout {
    updated_by_cell: CellRef::new(1, 1), // B2
    sources_cell: CellRef::new(1, 3),    // D2
    count_cell: CellRef::new(1, 5),      // F2
    anchor_row: 4,                       // row 5
    columns: DataColumns {
        tour: 0,
        tour_type: 1,
        date: 2,
        operator: 3,
        allotment: 4,
        sold: 5,
        pax_on_board: 6,
        pax_on_tour: 7,
        source_id: 8,
    },
};

/// Rows of the single-source template that may hold placeholder markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaxTemplateLayout {
    pub header_row: u32,
    pub totals_row: u32,
}

pub const PAX_TEMPLATE_LAYOUT: PaxTemplateLayout = PaxTemplateLayout {
    header_row: 1, // row 2
    totals_row: 5, // row 6
};

/// Wraps a key in the marker syntax used by templates, e.g. `{{ship}}`.
pub fn placeholder(key: &str) -> String {
    format!("{{{{{key}}}}}")
}

/// Sold and allotment sums for one tour type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TourTotals {
    pub sold: f64,
    pub allotment: f64,
}

impl TourTotals {
    pub fn available(&self) -> f64 {
        self.allotment - self.sold
    }
}

/// Per-tour-type totals plus passenger grand totals of one source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceTotals {
    pub tours: BTreeMap<TourType, TourTotals>,
    pub pax_on_board: f64,
    pub pax_on_tour: f64,
}

impl SourceTotals {
    pub fn from_records(records: &[ValidatedRecord]) -> Self {
        let mut totals = Self::default();
        for validated in records {
            let tour = totals.tours.entry(validated.tour_type).or_default();
            tour.sold += validated.record.sold;
            tour.allotment += validated.record.allotment;
            totals.pax_on_board += validated.record.pax_on_board;
            totals.pax_on_tour += validated.record.pax_on_tour;
        }
        totals
    }

    pub fn tour(&self, tour_type: TourType) -> TourTotals {
        self.tours.get(&tour_type).copied().unwrap_or_default()
    }

    /// Marker key and value of every aggregate a template can reference.
    fn marker_values(&self) -> Vec<(String, f64)> {
        let mut values = Vec::with_capacity(TourType::ALL.len() * 3 + 2);
        for tour_type in TourType::ALL {
            let tour = self.tour(tour_type);
            let key = tour_type.key();
            values.push((format!("{key}_sold"), tour.sold));
            values.push((format!("{key}_allotment"), tour.allotment));
            values.push((format!("{key}_available"), tour.available()));
        }
        values.push(("pax_on_board".to_string(), self.pax_on_board));
        values.push(("pax_on_tour".to_string(), self.pax_on_tour));
        values
    }
}

/// Fills a single-source template with the totals of `extract`.
///
/// Only cells in the layout's header and totals rows are inspected. A cell
/// whose text contains a known marker has its whole value replaced; every
/// other cell is left as it was. Returns the number of cells replaced.
pub fn render_source_totals(
    grid: &mut Grid,
    extract: &SourceExtract,
    ship_name: &str,
    layout: &PaxTemplateLayout,
) -> usize {
    let totals = SourceTotals::from_records(&validate(&extract.records));

    let mut markers: Vec<(String, CellValue)> = vec![
        (placeholder("date"), CellValue::from(extract.date.as_str())),
        (placeholder("operator"), CellValue::from(extract.operator.as_str())),
        (placeholder("ship"), CellValue::from(ship_name)),
    ];
    markers.extend(
        totals
            .marker_values()
            .into_iter()
            .map(|(key, value)| (placeholder(&key), CellValue::Number(value))),
    );

    let mut replacements = Vec::new();
    for row in [layout.header_row, layout.totals_row] {
        for (col, value) in grid.row(row) {
            if !matches!(value, CellValue::Text(_) | CellValue::RichText(_)) {
                continue;
            }
            let text = coerce_text(value);
            if let Some((_, replacement)) = markers.iter().find(|(marker, _)| text.contains(marker)) {
                replacements.push((CellRef::new(row, col), replacement.clone()));
            }
        }
    }

    let replaced = replacements.len();
    for (cell, value) in replacements {
        grid.set(cell, value);
    }
    debug!(replaced, "template markers filled");
    replaced
}

/// Outcome of writing a dataset into a consolidated worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    /// First row written (zero-based).
    pub first_row: u32,
    pub rows_written: usize,
    pub rows_removed: usize,
}

/// Writes the consolidated dataset into `grid`.
///
/// Header cells are overwritten on every call. Data rows are written from
/// the first empty row at or after the anchor, so with [`RowPolicy::Append`]
/// a second render of the same dataset lands after the first one instead of
/// replacing it.
pub fn render_consolidated(
    grid: &mut Grid,
    dataset: &ConsolidatedDataset,
    names: &SourceNames,
    policy: RowPolicy,
    layout: &ConsolidatedLayout,
) -> RenderSummary {
    let updated_by = display_name(dataset, names, &dataset.last_updated_by_source);
    let sources = dataset
        .contributing_sources
        .iter()
        .map(|id| display_name(dataset, names, id))
        .collect::<Vec<_>>()
        .join(", ");
    grid.set(layout.updated_by_cell, updated_by);
    grid.set(layout.sources_cell, sources);
    grid.set(layout.count_cell, dataset.total_record_count as f64);

    let rows_removed = match policy {
        RowPolicy::Append => 0,
        RowPolicy::ReplaceContributing => {
            let contributing: HashSet<&str> = dataset
                .contributing_sources
                .iter()
                .map(String::as_str)
                .collect();
            remove_source_rows(grid, layout, &contributing)
        }
    };

    let first_row = first_empty_row(grid, layout);
    let columns = &layout.columns;
    for (offset, record) in dataset.records.iter().enumerate() {
        let row = first_row + offset as u32;
        let at = |col: u16| CellRef::new(row, col);
        let raw = record.record();
        grid.set(
            at(columns.tour),
            format!("{} - {}", record.source_name(), raw.tour_name),
        );
        grid.set(at(columns.tour_type), record.tour_type().key());
        grid.set(at(columns.date), record.date());
        grid.set(at(columns.operator), record.operator());
        grid.set(at(columns.allotment), raw.allotment);
        grid.set(at(columns.sold), raw.sold);
        grid.set(at(columns.pax_on_board), raw.pax_on_board);
        grid.set(at(columns.pax_on_tour), raw.pax_on_tour);
        grid.set(at(columns.source_id), record.source_id());
    }

    info!(
        ?policy,
        first_row = first_row + 1,
        rows_written = dataset.records.len(),
        rows_removed,
        "consolidated rows rendered"
    );
    RenderSummary {
        first_row,
        rows_written: dataset.records.len(),
        rows_removed,
    }
}

/// First row at or below the anchor whose data columns are all blank.
pub fn first_empty_row(grid: &Grid, layout: &ConsolidatedLayout) -> u32 {
    let last_col = layout.columns.last();
    let mut row = layout.anchor_row;
    while !grid.is_row_blank(row, 0..=last_col) {
        row += 1;
    }
    row
}

/// Drops the data rows owned by `sources` and moves the remaining rows of
/// the block up so the block stays contiguous.
fn remove_source_rows(
    grid: &mut Grid,
    layout: &ConsolidatedLayout,
    sources: &HashSet<&str>,
) -> usize {
    let block_end = first_empty_row(grid, layout);
    let source_col = layout.columns.source_id;

    let mut kept = Vec::new();
    let mut removed = 0;
    for row in layout.anchor_row..block_end {
        let cells = grid.take_row(row);
        let owner = cells.get(&source_col).map(coerce_text).unwrap_or_default();
        if sources.contains(owner.as_str()) {
            removed += 1;
        } else {
            kept.push(cells);
        }
    }

    for (offset, cells) in kept.into_iter().enumerate() {
        let row = layout.anchor_row + offset as u32;
        for (col, value) in cells {
            grid.set(CellRef::new(row, col), value);
        }
    }
    removed
}

fn display_name(dataset: &ConsolidatedDataset, names: &SourceNames, id: &str) -> String {
    let fallback = dataset
        .records
        .iter()
        .find(|record| record.source_id() == id)
        .map(|record| record.source_name())
        .unwrap_or(id);
    names.display_name(id, fallback)
}

/// Built-in consolidated template: captions above the data anchor and labels
/// beside the header cells.
pub fn default_consolidated_template() -> Grid {
    let layout = &CONSOLIDATED_LAYOUT;
    let mut grid = Grid::new(DEFAULT_SHEET_NAME);
    grid.set(CellRef::new(0, 0), "Consolidated PAX");
    let label = |cell: CellRef| CellRef::new(cell.row, cell.col.saturating_sub(1));
    grid.set(label(layout.updated_by_cell), "Updated by");
    grid.set(label(layout.sources_cell), "Sources");
    grid.set(label(layout.count_cell), "Records");

    let caption_row = layout.anchor_row - 1;
    let columns = &layout.columns;
    for (col, caption) in [
        (columns.tour, "Tour"),
        (columns.tour_type, "Type"),
        (columns.date, "Date"),
        (columns.operator, "Operator"),
        (columns.allotment, "Allotment"),
        (columns.sold, "Sold"),
        (columns.pax_on_board, "Pax on board"),
        (columns.pax_on_tour, "Pax on tour"),
        (columns.source_id, "Source"),
    ] {
        grid.set(CellRef::new(caption_row, col), caption);
    }
    grid
}

/// Built-in single-source template referencing every marker.
pub fn default_pax_template() -> Grid {
    let layout = &PAX_TEMPLATE_LAYOUT;
    let mut grid = Grid::new(DEFAULT_SHEET_NAME);
    grid.set(CellRef::new(0, 0), "PAX report");
    for (col, (label, key)) in [("Ship", "ship"), ("Date", "date"), ("Operator", "operator")]
        .into_iter()
        .enumerate()
    {
        let col = col as u16 * 2;
        grid.set(CellRef::new(layout.header_row, col), label);
        grid.set(CellRef::new(layout.header_row, col + 1), placeholder(key));
    }

    let mut columns = Vec::new();
    for tour_type in TourType::ALL {
        let name = tour_type.canonical_name();
        let key = tour_type.key();
        columns.push((format!("{name} sold"), format!("{key}_sold")));
        columns.push((format!("{name} allotment"), format!("{key}_allotment")));
        columns.push((format!("{name} available"), format!("{key}_available")));
    }
    columns.push(("Pax on board".to_string(), "pax_on_board".to_string()));
    columns.push(("Pax on tour".to_string(), "pax_on_tour".to_string()));

    for (col, (label, key)) in columns.into_iter().enumerate() {
        let col = col as u16;
        grid.set(CellRef::new(layout.totals_row - 1, col), label);
        grid.set(CellRef::new(layout.totals_row, col), placeholder(&key));
    }
    grid
}
