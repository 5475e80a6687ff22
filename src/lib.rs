//! Consolidation engine for per-ship passenger and tour workbooks.
//!
//! Each source ("ship") reports its tours in a fixed-layout spreadsheet. The
//! crate reads those worksheets ([`io`], [`extract`]), coerces cell values
//! ([`coerce`]), keeps the records naming a known tour type ([`validate`]),
//! merges all sources into one attributed dataset ([`merge`]), finds the
//! current consolidated artifact ([`locate`]) and renders the result back into
//! a workbook ([`render`]). [`pipeline`] ties the stages together for the
//! command-line interface and embedding services.

pub mod coerce;
pub mod config;
pub mod error;
pub mod extract;
pub mod grid;
pub mod io;
pub mod locate;
pub mod merge;
pub mod model;
pub mod names;
pub mod pipeline;
pub mod render;
pub mod validate;

pub use error::{ConsolidateError, Result};
