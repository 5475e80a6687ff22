use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::model::{AttributedRecord, ConsolidatedDataset, SourceExtract, SourceId, TourConflict};
use crate::names::SourceNames;
use crate::validate::validate;

/// Source extracts keyed by source id, in processing order.
pub type SourceExtracts = IndexMap<SourceId, SourceExtract>;

/// Combines every source's validated records into one attributed list.
#[derive(Debug, Clone)]
pub struct CrossSourceMerger {
    names: SourceNames,
}

impl CrossSourceMerger {
    pub fn new(names: SourceNames) -> Self {
        Self { names }
    }

    /// Validates, attributes and concatenates the records of `extracts`.
    ///
    /// Sources are visited in map order and records are never deduplicated:
    /// two sources reporting the same tour type give two rows. Conflicts are
    /// reported on the dataset but do not change its records.
    pub fn merge(&self, extracts: &SourceExtracts, triggered_by: &str) -> ConsolidatedDataset {
        let mut records = Vec::new();

        for (source_id, extract) in extracts {
            let validated = validate(&extract.records);
            let display_name = self.names.display_name(source_id, &extract.source_name);
            info!(
                %source_id,
                raw = extract.records.len(),
                valid = validated.len(),
                "source records validated"
            );

            records.extend(validated.into_iter().map(|record| {
                AttributedRecord::new(
                    record,
                    source_id.clone(),
                    display_name.clone(),
                    extract.date.clone(),
                    extract.operator.clone(),
                )
            }));
        }

        let conflicts = detect_conflicts(&records);
        for conflict in &conflicts {
            warn!(
                tour_type = %conflict.tour_type,
                sources = ?conflict.source_ids,
                "tour type reported by more than one source"
            );
        }

        ConsolidatedDataset {
            contributing_sources: extracts.keys().cloned().collect(),
            total_record_count: records.len(),
            records,
            last_updated_by_source: triggered_by.to_string(),
            conflicts,
        }
    }
}

/// Lists the tour types reported under more than one distinct source id.
pub fn detect_conflicts(records: &[AttributedRecord]) -> Vec<TourConflict> {
    let mut reporters: BTreeMap<_, Vec<SourceId>> = BTreeMap::new();
    for record in records {
        let sources = reporters.entry(record.tour_type()).or_default();
        if !sources.iter().any(|id| id == record.source_id()) {
            sources.push(record.source_id().to_string());
        }
    }

    reporters
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(tour_type, source_ids)| TourConflict {
            tour_type,
            source_ids,
        })
        .collect()
}
