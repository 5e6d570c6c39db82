use std::cmp::Ordering;

use tantivy::{DocAddress, Score};

use crate::doc_id::DocId;

/// Result ordering selected by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    /// Relevance weight, then year ascending.
    #[default]
    Relevance,
    /// Year ascending, then relevance weight.
    Year,
}

/// How probabilistic clauses are weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Weighting {
    /// BM25 over the text fields.
    #[default]
    Bm25,
    /// Each matching clause contributes exactly 1.0.
    Coordinate,
}

/// One match before its document is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub docid: DocId,
    pub weight: Score,
    pub year: Option<u64>,
    pub address: DocAddress,
}

impl SortOrder {
    /// Total order over hits. Documents without a year sort before any
    /// year; equal keys fall back to the newest docid first.
    pub fn compare(self, a: &Hit, b: &Hit) -> Ordering {
        let by_weight = b.weight.total_cmp(&a.weight);
        let by_year = a.year.cmp(&b.year);
        let primary = match self {
            SortOrder::Relevance => by_weight.then(by_year),
            SortOrder::Year => by_year.then(by_weight),
        };
        primary.then_with(|| b.docid.cmp(&a.docid))
    }

    pub fn sort(self, hits: &mut [Hit]) {
        hits.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(docid: u64, weight: f32, year: Option<u64>) -> Hit {
        Hit {
            docid: DocId::new(docid),
            weight,
            year,
            address: DocAddress::new(0, docid as u32),
        }
    }

    fn order(sort: SortOrder, mut hits: Vec<Hit>) -> Vec<u64> {
        sort.sort(&mut hits);
        hits.iter().map(|h| h.docid.get()).collect()
    }

    #[test]
    fn relevance_then_year_then_newest() {
        let hits = vec![
            hit(1, 1.0, Some(2010)),
            hit(2, 2.0, Some(2010)),
            hit(3, 1.0, Some(2001)),
            hit(4, 1.0, Some(2001)),
        ];
        assert_eq!(order(SortOrder::Relevance, hits), vec![2, 4, 3, 1]);
    }

    #[test]
    fn year_then_relevance_then_newest() {
        let hits = vec![
            hit(1, 0.0, Some(2010)),
            hit(2, 0.0, Some(2001)),
            hit(3, 0.5, Some(2001)),
            hit(4, 0.0, Some(2001)),
        ];
        assert_eq!(order(SortOrder::Year, hits), vec![3, 4, 2, 1]);
    }

    #[test]
    fn missing_year_sorts_first() {
        let hits = vec![hit(1, 0.0, Some(1990)), hit(2, 0.0, None)];
        assert_eq!(order(SortOrder::Year, hits), vec![2, 1]);
    }
}
