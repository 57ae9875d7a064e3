//! Citation list helpers

use chatflow_api::SourceDocument;
use std::collections::HashSet;

/// Drop repeated web sources.
///
/// The first document for each URL locator is kept; documents whose locator
/// is not a URL are all kept. Order is preserved.
pub fn dedupe_sources(documents: &[SourceDocument]) -> Vec<SourceDocument> {
    let mut seen = HashSet::new();
    documents
        .iter()
        .filter(|doc| match (doc.url(), doc.locator()) {
            (Some(_), Some(locator)) => seen.insert(locator.to_string()),
            _ => true,
        })
        .cloned()
        .collect()
}
