#![allow(dead_code)]

use pax_consolidate::grid::{CellRef, Grid};
use pax_consolidate::pipeline::SourceDocument;
use pax_consolidate::extract::SheetShape;
use rust_xlsxwriter::Workbook;

pub const CATAMARAN: &str = "Catamaran Sail & Snorkel";
pub const CHAMPAGNE: &str = "Champagne Adults Only";
pub const INVISIBLE: &str = "Invisible Boat Family";

/// Tour name, allotment, sold, pax on board, pax on tour.
pub type Row<'a> = (&'a str, f64, f64, f64, f64);

/// Header values: date, operator, ship name.
pub type Header<'a> = (&'a str, &'a str, &'a str);

pub fn raw_source_grid(header: Header, rows: &[Row]) -> Grid {
    let mut grid = Grid::new("Report");
    grid.set(CellRef::new(1, 1), header.0);
    grid.set(CellRef::new(2, 1), header.1);
    grid.set(CellRef::new(3, 1), header.2);
    grid.set(CellRef::new(6, 1), "Tour Name");
    for (index, row) in rows.iter().enumerate() {
        let r = 7 + index as u32;
        grid.set(CellRef::new(r, 1), row.0);
        grid.set(CellRef::new(r, 5), row.1);
        grid.set(CellRef::new(r, 7), row.2);
        grid.set(CellRef::new(r, 9), row.3);
        grid.set(CellRef::new(r, 11), row.4);
    }
    grid
}

pub fn export_grid(header: Header, rows: &[Row]) -> Grid {
    let mut grid = Grid::new("Export");
    grid.set(CellRef::new(0, 1), header.0);
    grid.set(CellRef::new(1, 1), header.1);
    grid.set(CellRef::new(2, 1), header.2);
    grid.set(CellRef::new(3, 0), "Tour");
    for (index, row) in rows.iter().enumerate() {
        let r = 4 + index as u32;
        grid.set(CellRef::new(r, 0), row.0);
        grid.set(CellRef::new(r, 1), row.1);
        grid.set(CellRef::new(r, 2), row.2);
        grid.set(CellRef::new(r, 3), row.3);
        grid.set(CellRef::new(r, 4), row.4);
    }
    grid
}

/// Builds a raw-source workbook the way a ship's own export looks.
pub fn raw_source_bytes(header: Header, rows: &[Row]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Report").expect("sheet named");
    sheet.write_string(1, 1, header.0).expect("date written");
    sheet.write_string(2, 1, header.1).expect("operator written");
    sheet.write_string(3, 1, header.2).expect("ship written");
    sheet.write_string(6, 1, "Tour Name").expect("caption written");
    for (index, row) in rows.iter().enumerate() {
        let r = 7 + index as u32;
        sheet.write_string(r, 1, row.0).expect("name written");
        sheet.write_number(r, 5, row.1).expect("allotment written");
        sheet.write_number(r, 7, row.2).expect("sold written");
        sheet.write_number(r, 9, row.3).expect("on board written");
        sheet.write_number(r, 11, row.4).expect("on tour written");
    }
    workbook.save_to_buffer().expect("workbook saved")
}

/// Builds a processed-export workbook terminated by a `TOTAL` row.
pub fn export_bytes(header: Header, rows: &[Row]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 1, header.0).expect("date written");
    sheet.write_string(1, 1, header.1).expect("operator written");
    sheet.write_string(2, 1, header.2).expect("ship written");
    sheet.write_string(3, 0, "Tour").expect("caption written");
    let mut r = 4;
    for row in rows {
        sheet.write_string(r, 0, row.0).expect("name written");
        sheet.write_number(r, 1, row.1).expect("allotment written");
        sheet.write_number(r, 2, row.2).expect("sold written");
        sheet.write_number(r, 3, row.3).expect("on board written");
        sheet.write_number(r, 4, row.4).expect("on tour written");
        r += 1;
    }
    sheet.write_string(r, 0, "TOTAL").expect("total written");
    workbook.save_to_buffer().expect("workbook saved")
}

pub fn raw_document(source_id: &str, header: Header, rows: &[Row]) -> SourceDocument {
    SourceDocument {
        source_id: source_id.to_string(),
        shape: SheetShape::RawSource,
        bytes: raw_source_bytes(header, rows),
    }
}
