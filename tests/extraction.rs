mod common;

use common::{CATAMARAN, CHAMPAGNE, export_bytes, export_grid, raw_source_bytes, raw_source_grid};
use pax_consolidate::extract::{Layout, SheetShape, extract};
use pax_consolidate::grid::{CellRef, CellValue, TextRun};
use pax_consolidate::io::excel_read::read_first_sheet;
use pax_consolidate::model::{RawRecord, TourType};
use pax_consolidate::validate::validate;

const HEADER: (&str, &str, &str) = ("01/06/2024", "Blue Lagoon Tours", "MV Aurora");

#[test]
fn raw_source_rows_and_headers_are_read() {
    let grid = raw_source_grid(
        HEADER,
        &[(CATAMARAN, 10.0, 5.0, 120.0, 30.0), (CHAMPAGNE, 4.0, 2.0, 0.0, 6.0)],
    );

    let extract = extract(&grid, SheetShape::RawSource);

    assert_eq!(extract.date, "01/06/2024");
    assert_eq!(extract.operator, "Blue Lagoon Tours");
    assert_eq!(extract.source_name, "MV Aurora");
    assert_eq!(
        extract.records,
        vec![
            RawRecord::new(CATAMARAN).with_counts(10.0, 5.0).with_pax(120.0, 30.0),
            RawRecord::new(CHAMPAGNE).with_counts(4.0, 2.0).with_pax(0.0, 6.0),
        ]
    );
    assert_eq!(extract.degraded_cells, 0);
}

#[test]
fn scan_stops_at_first_blank_name() {
    let mut grid = raw_source_grid(
        HEADER,
        &[
            (CATAMARAN, 10.0, 5.0, 0.0, 0.0),
            (CHAMPAGNE, 4.0, 2.0, 0.0, 0.0),
            (CATAMARAN, 8.0, 8.0, 0.0, 0.0),
        ],
    );
    // Blank the name of the second body row; its numbers stay.
    grid.set(CellRef::new(8, 1), CellValue::Empty);

    let extract = extract(&grid, SheetShape::RawSource);

    assert_eq!(extract.records.len(), 1);
    assert_eq!(extract.records[0].allotment, 10.0);
}

#[test]
fn whitespace_name_counts_as_blank() {
    let mut grid = raw_source_grid(HEADER, &[(CATAMARAN, 1.0, 1.0, 0.0, 0.0)]);
    grid.set(CellRef::new(7, 1), "   ");

    assert!(extract(&grid, SheetShape::RawSource).records.is_empty());
}

#[test]
fn repeated_caption_rows_are_skipped_not_terminal() {
    let grid = raw_source_grid(
        HEADER,
        &[
            (CATAMARAN, 10.0, 5.0, 0.0, 0.0),
            ("Tour Name", 0.0, 0.0, 0.0, 0.0),
            (CHAMPAGNE, 4.0, 2.0, 0.0, 0.0),
        ],
    );

    let names: Vec<_> = extract(&grid, SheetShape::RawSource)
        .records
        .into_iter()
        .map(|record| record.tour_name)
        .collect();

    assert_eq!(names, vec![CATAMARAN.to_string(), CHAMPAGNE.to_string()]);
}

#[test]
fn rows_past_the_ceiling_are_ignored() {
    let layout = Layout::for_shape(SheetShape::RawSource);
    let rows: Vec<_> = (0..250).map(|_| (CATAMARAN, 1.0, 1.0, 0.0, 0.0)).collect();
    let grid = raw_source_grid(HEADER, &rows);

    let extract = extract(&grid, SheetShape::RawSource);

    let window = (layout.ceiling_row - layout.anchor_row + 1) as usize;
    assert_eq!(window, 193);
    assert_eq!(extract.records.len(), window);
}

#[test]
fn processed_export_stops_at_total_label() {
    let mut grid = export_grid(HEADER, &[(CATAMARAN, 10.0, 5.0, 1.0, 2.0)]);
    grid.set(CellRef::new(5, 0), "TOTAL");
    grid.set(CellRef::new(6, 0), CHAMPAGNE);

    let extract = extract(&grid, SheetShape::ProcessedExport);

    assert_eq!(extract.source_name, "MV Aurora");
    assert_eq!(
        extract.records,
        vec![RawRecord::new(CATAMARAN).with_counts(10.0, 5.0).with_pax(1.0, 2.0)]
    );
}

#[test]
fn shapes_read_different_cells() {
    let grid = raw_source_grid(HEADER, &[(CATAMARAN, 10.0, 5.0, 0.0, 0.0)]);

    let as_export = extract(&grid, SheetShape::ProcessedExport);

    assert_eq!(as_export.date, "");
    assert_eq!(as_export.operator, "01/06/2024");
    assert!(as_export.records.is_empty());
}

#[test]
fn malformed_numbers_degrade_and_are_counted() {
    let mut grid = raw_source_grid(HEADER, &[(CATAMARAN, 0.0, 0.0, 0.0, 0.0)]);
    grid.set(CellRef::new(7, 5), "ten");
    grid.set(CellRef::new(7, 7), CellValue::RichText(vec![TextRun::new("1"), TextRun::new("2")]));
    grid.set(
        CellRef::new(7, 9),
        CellValue::Formula {
            formula: "=J1/0".into(),
            result: Some(Box::new(CellValue::Error("#DIV/0!".into()))),
        },
    );
    grid.set(CellRef::new(7, 11), " 7 ");

    let extract = extract(&grid, SheetShape::RawSource);

    let record = &extract.records[0];
    assert_eq!(record.allotment, 0.0);
    assert_eq!(record.sold, 12.0);
    assert_eq!(record.pax_on_board, 0.0);
    assert_eq!(record.pax_on_tour, 7.0);
    assert_eq!(extract.degraded_cells, 2);
}

#[test]
fn header_date_serial_is_rendered_as_date() {
    let mut grid = raw_source_grid(HEADER, &[]);
    grid.set(CellRef::new(1, 1), 45000.0);

    assert_eq!(extract(&grid, SheetShape::RawSource).date, "15/03/2023");
}

#[test]
fn tour_names_keep_trailing_whitespace() {
    let grid = raw_source_grid(HEADER, &[("Champagne Adults Only ", 4.0, 2.0, 0.0, 0.0)]);

    let extract = extract(&grid, SheetShape::RawSource);

    assert_eq!(extract.records[0].tour_name, "Champagne Adults Only ");
}

#[test]
fn rich_text_and_formula_names_are_not_trimmed() {
    let mut grid = raw_source_grid(
        HEADER,
        &[
            (CATAMARAN, 1.0, 1.0, 0.0, 0.0),
            (CATAMARAN, 2.0, 2.0, 0.0, 0.0),
            (CHAMPAGNE, 3.0, 3.0, 0.0, 0.0),
        ],
    );
    grid.set(
        CellRef::new(7, 1),
        CellValue::RichText(vec![TextRun::new("Catamaran Sail & Snorkel "), TextRun::new(" ")]),
    );
    grid.set(
        CellRef::new(8, 1),
        CellValue::Formula {
            formula: "=\" \"&A1".to_string(),
            result: Some(Box::new(CellValue::Text(" Catamaran Sail & Snorkel".to_string()))),
        },
    );
    grid.set(
        CellRef::new(9, 1),
        CellValue::Formula {
            formula: "=A2".to_string(),
            result: Some(Box::new(CellValue::Text(CHAMPAGNE.to_string()))),
        },
    );

    let extract = extract(&grid, SheetShape::RawSource);
    let names: Vec<&str> = extract.records.iter().map(|r| r.tour_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Catamaran Sail & Snorkel  ", " Catamaran Sail & Snorkel", CHAMPAGNE]
    );

    let validated = validate(&extract.records);
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].tour_type, TourType::Champagne);
}

#[test]
fn workbooks_are_extracted_from_bytes() {
    let bytes = raw_source_bytes(HEADER, &[(CATAMARAN, 10.0, 5.0, 100.0, 20.0)]);
    let grid = read_first_sheet(&bytes, "source-1").expect("workbook read");

    let extract = extract(&grid, SheetShape::RawSource);

    assert_eq!(extract.operator, "Blue Lagoon Tours");
    assert_eq!(
        extract.records,
        vec![RawRecord::new(CATAMARAN).with_counts(10.0, 5.0).with_pax(100.0, 20.0)]
    );

    let export = export_bytes(HEADER, &[(CHAMPAGNE, 4.0, 2.0, 0.0, 0.0)]);
    let grid = read_first_sheet(&export, "source-2").expect("export read");
    let exported = pax_consolidate::extract::extract(&grid, SheetShape::ProcessedExport);
    assert_eq!(exported.records.len(), 1);
    assert_eq!(exported.records[0].tour_name, CHAMPAGNE);
}
