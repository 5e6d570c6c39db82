use std::{collections::BTreeSet, path::Path};

use tantivy::{
    Searcher,
    TantivyDocument,
    collector::{Count, TopDocs},
    query::Query as TantivyQuery,
};

use crate::{
    data_dir::BIBTEX_FILE,
    doc_id::DocId,
    document::Document,
    error::{Error, Result},
    ranking::{Hit, SortOrder},
    tantivy_index::{SearchIndex, fields},
};

/// A matched document and its relevance weight.
#[derive(Debug, Clone)]
pub struct Match {
    pub document: Document,
    pub weight: f32,
}

/// Ordered matches of one query.
///
/// Ranking happens up front over docids and weights only; documents are
/// loaded from the pinned snapshot as the set is iterated. Single pass.
pub struct MatchSet<'a> {
    index: &'a SearchIndex,
    searcher: Searcher,
    hits: std::vec::IntoIter<Hit>,
}

impl<'a> MatchSet<'a> {
    /// Run `query` and rank every match. `limit` 0 keeps all of them.
    pub fn execute(
        index: &'a SearchIndex,
        query: &dyn TantivyQuery,
        sort: SortOrder,
        limit: usize,
    ) -> Result<Self> {
        let searcher = index.searcher();
        let total = searcher.num_docs() as usize;
        let top = searcher.search(query, &TopDocs::with_limit(total.max(1)))?;

        // Per segment: (docid, year) fast-field columns.
        let columns = searcher
            .segment_readers()
            .iter()
            .map(|segment| {
                let fast = segment.fast_fields();
                Ok((fast.u64(fields::DOCID)?, fast.u64(fields::YEAR)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut hits = Vec::with_capacity(top.len());
        for (weight, address) in top {
            let Some((docid, year)) =
                columns.get(address.segment_ord as usize)
            else {
                continue;
            };
            let Some(docid) = docid.first(address.doc_id) else {
                continue;
            };
            hits.push(Hit {
                docid: DocId::new(docid),
                weight,
                year: year.first(address.doc_id),
                address,
            });
        }

        sort.sort(&mut hits);
        if limit > 0 {
            hits.truncate(limit);
        }

        Ok(Self {
            index,
            searcher,
            hits: hits.into_iter(),
        })
    }

    /// Number of matches, without ranking or loading anything.
    pub fn count(index: &SearchIndex, query: &dyn TantivyQuery) -> Result<usize> {
        Ok(index.searcher().search(query, &Count)?)
    }

    /// Matches not yet consumed.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.len() == 0
    }

    /// Keep only the leading matches whose weight exceeds `cutoff`.
    pub fn while_weight_above(self, cutoff: f32) -> Self {
        let hits: Vec<Hit> =
            self.hits.take_while(|hit| hit.weight > cutoff).collect();
        Self {
            hits: hits.into_iter(),
            ..self
        }
    }

    /// Remaining docids in order, without loading documents.
    pub fn docids(self) -> Vec<DocId> {
        self.hits.map(|hit| hit.docid).collect()
    }

    fn load(&self, hit: &Hit) -> Result<Document> {
        match self.searcher.doc::<TantivyDocument>(hit.address) {
            Ok(stored) => self.index.to_document(&stored),
            Err(_) if self.index.is_stale()? => Err(Error::Modified),
            Err(e) => Err(e.into()),
        }
    }
}

impl Iterator for MatchSet<'_> {
    type Item = Result<Match>;

    fn next(&mut self) -> Option<Self::Item> {
        let hit = self.hits.next()?;
        Some(self.load(&hit).map(|document| Match {
            document,
            weight: hit.weight,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}

impl std::fmt::Debug for MatchSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchSet")
            .field("remaining", &self.hits.len())
            .finish_non_exhaustive()
    }
}

/// What a search prints for its matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One summary line per document
    #[default]
    Summary,
    /// The stored bibtex entry of each document
    Bibtex,
    /// Source ids
    Sources,
    /// Bibliographic keys
    Keys,
    /// Tags, merged across documents
    Tags,
    /// Absolute paths of indexed files
    Files,
    /// A JSON array of documents
    Json,
}

/// Render matches in the requested format, one line per entry.
///
/// Summary, files and JSON output are per document; sources, keys and tags
/// print the sorted union over all matches.
pub fn render(
    matches: &[Match],
    format: OutputFormat,
    root: &Path,
) -> Result<Vec<String>> {
    let lines = match format {
        OutputFormat::Summary => {
            matches.iter().map(|m| m.document.summary()).collect()
        }
        OutputFormat::Files => matches
            .iter()
            .flat_map(|m| m.document.full_paths(root))
            .map(|p| p.display().to_string())
            .collect(),
        OutputFormat::Sources => union(matches, |doc| {
            doc.source_ids().iter().map(ToString::to_string).collect()
        }),
        OutputFormat::Keys => union(matches, |doc| {
            doc.key().map(String::from).into_iter().collect()
        }),
        OutputFormat::Tags => union(matches, |doc| {
            doc.tags().into_iter().map(String::from).collect()
        }),
        OutputFormat::Bibtex => {
            let mut out = Vec::new();
            for m in matches {
                let path = root
                    .join(m.document.docid.dir_name())
                    .join(BIBTEX_FILE);
                match std::fs::read_to_string(&path) {
                    Ok(bibtex) => out.push(bibtex.trim_end().to_string()),
                    Err(_) => tracing::warn!(
                        doc = %m.document.docid,
                        "no bibtex for document"
                    ),
                }
            }
            out
        }
        OutputFormat::Json => {
            let docs: Vec<serde_json::Value> =
                matches.iter().map(|m| to_json(m, root)).collect();
            vec![serde_json::to_string_pretty(&docs)?]
        }
    };
    Ok(lines)
}

fn union(
    matches: &[Match],
    values: impl Fn(&Document) -> Vec<String>,
) -> Vec<String> {
    let set: BTreeSet<String> =
        matches.iter().flat_map(|m| values(&m.document)).collect();
    set.into_iter().collect()
}

pub fn to_json(m: &Match, root: &Path) -> serde_json::Value {
    let doc = &m.document;
    serde_json::json!({
        "id": doc.docid.get(),
        "weight": m.weight,
        "key": doc.key(),
        "title": doc.title,
        "authors": doc.authors,
        "year": doc.year,
        "tags": doc.tags(),
        "sources": doc
            .source_ids()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "files": doc
            .full_paths(root)
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
    })
}
