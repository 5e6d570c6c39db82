//! Near-duplicate detection.
//!
//! Arbitrary text is reduced to an elite set of at most
//! [`ELITE_TERM_COUNT`] body terms. Every document is scored by how many of
//! those terms it contains, and the count is normalized by the elite set
//! size, so an absolute threshold can decide "same document".

use std::collections::BTreeMap;

use crate::{
    document::Document,
    error::Result,
    query::QueryCompiler,
    ranking::{SortOrder, Weighting},
    search::MatchSet,
    tantivy_index::SearchIndex,
};

/// Number of terms in the elite set.
pub const ELITE_TERM_COUNT: usize = 42;

/// Normalized scores at or below this are not duplicates.
pub const SIMILARITY_THRESHOLD: f32 = 0.9;

/// Pick the elite set for `text`: the analyzed terms that occur in the
/// index, most frequent in `text` first, rarer in the index on ties.
pub fn elite_terms(index: &SearchIndex, text: &str) -> Result<Vec<String>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for token in index.analyze(text)? {
        *counts.entry(token).or_default() += 1;
    }

    let searcher = index.searcher();
    let body = index.fields().body;
    let mut candidates = Vec::with_capacity(counts.len());
    for (token, count) in counts {
        let doc_freq = searcher
            .doc_freq(&tantivy::Term::from_field_text(body, &token))?;
        if doc_freq > 0 {
            candidates.push((count, doc_freq, token));
        }
    }

    candidates.sort_by(|a, b| {
        b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then_with(|| a.2.cmp(&b.2))
    });
    candidates.truncate(ELITE_TERM_COUNT);
    Ok(candidates.into_iter().map(|(_, _, token)| token).collect())
}

/// Documents similar to a text, best first. Ends at the first document
/// whose score does not exceed [`SIMILARITY_THRESHOLD`].
#[derive(Debug)]
pub struct SimilarDocuments<'a> {
    matches: MatchSet<'a>,
}

impl Iterator for SimilarDocuments<'_> {
    type Item = Result<(Document, f32)>;

    fn next(&mut self) -> Option<Self::Item> {
        let m = self.matches.next()?;
        Some(m.map(|m| (m.document, m.weight / ELITE_TERM_COUNT as f32)))
    }
}

pub fn find_similar<'a>(
    index: &'a SearchIndex,
    text: &str,
) -> Result<SimilarDocuments<'a>> {
    let elite = elite_terms(index, text)?;
    tracing::debug!(terms = elite.len(), "similarity query");

    let query = QueryCompiler::new(index, Weighting::Coordinate)
        .any_token(index.fields().body, &elite);
    let cutoff = SIMILARITY_THRESHOLD * ELITE_TERM_COUNT as f32;
    let matches =
        MatchSet::execute(index, query.as_ref(), SortOrder::Relevance, 0)?
            .while_weight_above(cutoff);
    Ok(SimilarDocuments { matches })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{doc_id::DocId, indexer::DocumentRecord, schema::Term};

    fn words(n: usize, offset: usize) -> String {
        (offset..offset + n)
            .map(|i| format!("word{i}x"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn index_with(bodies: &[&str]) -> SearchIndex {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        let mut writer = idx.writer().unwrap();
        for (i, body) in bodies.iter().enumerate() {
            let docid = i as u64 + 1;
            let record = DocumentRecord {
                docid: DocId::new(docid),
                terms: BTreeSet::from([Term::new("Q", docid.to_string())]),
                year: None,
                title: None,
                authors: vec![],
                body: body.to_string(),
            };
            writer.add_document(idx.to_tantivy(&record)).unwrap();
        }
        SearchIndex::commit(&mut writer, bodies.len() as u64).unwrap();
        idx.reload().unwrap();
        idx
    }

    #[test]
    fn identical_text_scores_one() {
        let text = words(50, 0);
        let other = words(50, 100);
        let idx = index_with(&[&other, &text]);

        let results: Vec<(Document, f32)> = find_similar(&idx, &text)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.docid, DocId::new(2));
        assert!((results[0].1 - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_overlap_below_threshold_is_dropped() {
        // 40 of 42 shared terms scores above 0.9; 30 of 42 does not.
        let base = words(42, 0);
        let close = format!("{} {}", words(40, 0), words(10, 500));
        let far = format!("{} {}", words(30, 0), words(20, 700));
        let idx = index_with(&[&close, &far]);

        let results: Vec<(Document, f32)> = find_similar(&idx, &base)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.docid, DocId::new(1));
        assert!((results[0].1 - 40.0 / 42.0).abs() < 1e-6);
    }

    #[test]
    fn elite_set_is_bounded_and_indexed_only() {
        let idx = index_with(&[&words(60, 0)]);
        let text = format!("{} unknownterm", words(60, 0));
        let elite = elite_terms(&idx, &text).unwrap();
        assert_eq!(elite.len(), ELITE_TERM_COUNT);
        assert!(!elite.contains(&"unknownterm".to_string()));
    }

    #[test]
    fn empty_text_matches_nothing() {
        let idx = index_with(&[&words(50, 0)]);
        assert_eq!(find_similar(&idx, "").unwrap().count(), 0);
    }
}
