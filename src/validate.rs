use tracing::info;

use crate::model::{RawRecord, TourType, ValidatedRecord};

/// Keeps the records whose tour name exactly matches a known tour type.
///
/// Anything else is dropped and logged; a trailing space or a case
/// difference is enough to lose a record.
pub fn validate(records: &[RawRecord]) -> Vec<ValidatedRecord> {
    records
        .iter()
        .filter_map(|record| match TourType::from_tour_name(&record.tour_name) {
            Some(tour_type) => Some(ValidatedRecord {
                record: record.clone(),
                tour_type,
            }),
            None => {
                info!(tour_name = %record.tour_name, "dropping record with unknown tour name");
                None
            }
        })
        .collect()
}
