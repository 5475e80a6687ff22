//! Record extraction from fixed-layout worksheets.
//!
//! Two document shapes are understood. Each is described by a [`Layout`]
//! (header cells, scan window and column offsets) so the scan itself is
//! shared.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coerce::{CoercionStats, coerce_header, coerce_number, coerce_verbatim};
use crate::grid::{CellRef, Grid};
use crate::model::{RawRecord, SourceExtract};

/// Which worksheet layout a document follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetShape {
    /// A source's own upload, with wide column spacing.
    RawSource,
    /// A previously rendered per-source export with a compact layout.
    ProcessedExport,
}

/// Column offsets of the per-row fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordColumns {
    pub tour_name: u16,
    pub allotment: u16,
    pub sold: u16,
    pub pax_on_board: u16,
    pub pax_on_tour: u16,
}

/// Fixed cell coordinates of one document shape. Rows are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub date_cell: CellRef,
    pub operator_cell: CellRef,
    pub source_name_cell: CellRef,
    /// First body row.
    pub anchor_row: u32,
    /// Last body row that is still scanned.
    pub ceiling_row: u32,
    pub columns: RecordColumns,
    /// Column caption repeated as data; such rows are skipped.
    pub header_sentinel: &'static str,
    /// Label that ends the body, when the shape has one.
    pub stop_sentinel: Option<&'static str>,
}

const RAW_SOURCE_LAYOUT: Layout = Layout {
    date_cell: CellRef::new(1, 1),        // B2
    operator_cell: CellRef::new(2, 1),    // B3
    source_name_cell: CellRef::new(3, 1), // B4
    anchor_row: 7,                        // row 8
    ceiling_row: 199,                     // row 200
    columns: RecordColumns {
        tour_name: 1,    // B
        allotment: 5,    // F
        sold: 7,         // H
        pax_on_board: 9, // J
        pax_on_tour: 11, // L
    },
    header_sentinel: "Tour Name",
    stop_sentinel: None,
};

const PROCESSED_EXPORT_LAYOUT: Layout = Layout {
    date_cell: CellRef::new(0, 1),        // B1
    operator_cell: CellRef::new(1, 1),    // B2
    source_name_cell: CellRef::new(2, 1), // B3
    anchor_row: 4,                        // row 5
    ceiling_row: 99,                      // row 100
    columns: RecordColumns {
        tour_name: 0,
        allotment: 1,
        sold: 2,
        pax_on_board: 3,
        pax_on_tour: 4,
    },
    header_sentinel: "Tour",
    stop_sentinel: Some("TOTAL"),
};

impl Layout {
    pub const fn for_shape(shape: SheetShape) -> &'static Layout {
        match shape {
            SheetShape::RawSource => &RAW_SOURCE_LAYOUT,
            SheetShape::ProcessedExport => &PROCESSED_EXPORT_LAYOUT,
        }
    }
}

/// Extracts header fields and body records from a worksheet.
///
/// The scan stops at the first row (inside the window) whose tour-name cell
/// is blank, or at the stop sentinel for shapes that define one. Rows after
/// the stopping row are never read.
pub fn extract(grid: &Grid, shape: SheetShape) -> SourceExtract {
    let layout = Layout::for_shape(shape);
    let mut stats = CoercionStats::default();
    let mut records = Vec::new();

    for row in layout.anchor_row..=layout.ceiling_row {
        // Kept as written: validation relies on exact matches.
        let raw_name = coerce_verbatim(grid.get(CellRef::new(row, layout.columns.tour_name)));
        let tour_name = raw_name.trim();
        if tour_name.is_empty() {
            debug!(row = row + 1, "blank tour name ends the scan");
            break;
        }
        if layout.stop_sentinel == Some(tour_name) {
            debug!(row = row + 1, "stop label ends the scan");
            break;
        }
        if tour_name == layout.header_sentinel {
            continue;
        }

        let mut number = |col: u16| coerce_number(grid.get(CellRef::new(row, col)), &mut stats);
        records.push(RawRecord {
            tour_name: raw_name,
            allotment: number(layout.columns.allotment),
            sold: number(layout.columns.sold),
            pax_on_board: number(layout.columns.pax_on_board),
            pax_on_tour: number(layout.columns.pax_on_tour),
        });
    }

    let extract = SourceExtract {
        date: coerce_header(grid.get(layout.date_cell)),
        operator: coerce_header(grid.get(layout.operator_cell)),
        source_name: coerce_header(grid.get(layout.source_name_cell)),
        records,
        degraded_cells: stats.degraded(),
    };

    if extract.degraded_cells > 0 {
        warn!(
            ?shape,
            degraded_cells = extract.degraded_cells,
            "unparsable numeric cells read as zero"
        );
    }
    debug!(?shape, record_count = extract.records.len(), "worksheet extracted");
    extract
}
