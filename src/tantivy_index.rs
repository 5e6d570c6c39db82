use std::path::Path;

use serde::{Deserialize, Serialize};
use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    ReloadPolicy,
    Searcher,
    TantivyDocument,
    TantivyError,
    schema::{
        FAST,
        Field,
        INDEXED,
        IndexRecordOption,
        STORED,
        STRING,
        Schema,
        TextFieldIndexing,
        TextOptions,
        Value,
    },
    tokenizer::{
        Language,
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
        TokenStream,
    },
};

use crate::{
    doc_id::DocId,
    document::Document,
    error::{Error, Result},
    indexer::DocumentRecord,
};

/// Field names used in the schema.
pub mod fields {
    pub const DOCID: &str = "docid";
    pub const TERMS: &str = "terms";
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const BODY: &str = "body";
    pub const YEAR: &str = "year";
}

/// Name of the stemming analyzer used by all free-text fields.
pub const ANALYZER: &str = "en_stem";

/// Written by tantivy on the first commit of an index directory.
const META_FILE: &str = "meta.json";

/// Writer heap, shared by its single indexing thread.
const WRITER_MEMORY: usize = 50_000_000;

/// Resolved field handles for the schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFields {
    pub docid: Field,
    /// Boolean terms, `prefix + value`, untokenized.
    pub terms: Field,
    pub title: Field,
    pub author: Field,
    pub body: Field,
    /// Numeric facet slot 0.
    pub year: Field,
}

impl SchemaFields {
    fn resolve(schema: &Schema) -> Result<Self> {
        Ok(Self {
            docid: schema.get_field(fields::DOCID)?,
            terms: schema.get_field(fields::TERMS)?,
            title: schema.get_field(fields::TITLE)?,
            author: schema.get_field(fields::AUTHOR)?,
            body: schema.get_field(fields::BODY)?,
            year: schema.get_field(fields::YEAR)?,
        })
    }
}

/// Stored alongside every commit.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CommitPayload {
    last_docid: u64,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_u64_field(fields::DOCID, INDEXED | STORED | FAST);
    builder.add_text_field(fields::TERMS, STRING | STORED);

    let text_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(ANALYZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    builder.add_text_field(fields::TITLE, text_opts.clone());
    builder.add_text_field(fields::AUTHOR, text_opts.clone());
    builder.add_text_field(fields::BODY, text_opts);

    builder.add_u64_field(fields::YEAR, INDEXED | STORED | FAST);

    builder.build()
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(Language::English))
        .build();
    index.tokenizers().register(ANALYZER, en_stem);
}

/// The tantivy index backing a document store.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
    /// Commit opstamp the reader's snapshot was taken at.
    snapshot_opstamp: u64,
}

impl SearchIndex {
    /// Open the index at `dir`, creating it when `create` is set.
    ///
    /// Without `create`, a directory holding no index yields
    /// [`Error::Uninitialized`].
    pub fn open(dir: &Path, create: bool) -> Result<Self> {
        let index = if dir.join(META_FILE).is_file() {
            Index::open_in_dir(dir)?
        } else if create {
            std::fs::create_dir_all(dir)?;
            Index::create_in_dir(dir, build_schema())?
        } else {
            return Err(Error::Uninitialized(dir.to_path_buf()));
        };

        Self::from_index(index)
    }

    /// Create an in-memory index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        register_tokenizers(&index);
        let fields = SchemaFields::resolve(&index.schema())?;
        let snapshot_opstamp = index.load_metas()?.opstamp;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            fields,
            snapshot_opstamp,
        })
    }

    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Acquire the single writer. Another live writer on the same index
    /// yields [`Error::Lock`].
    pub fn writer(&self) -> Result<IndexWriter> {
        self.index
            .writer_with_num_threads(1, WRITER_MEMORY)
            .map_err(|e| match e {
                TantivyError::LockFailure(lock, _) => {
                    Error::Lock(lock.to_string())
                }
                other => Error::Tantivy(other),
            })
    }

    /// Move the reader's snapshot to the latest commit.
    pub fn reload(&mut self) -> Result<()> {
        let opstamp = self.index.load_metas()?.opstamp;
        self.reader.reload()?;
        self.snapshot_opstamp = opstamp;
        Ok(())
    }

    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    pub fn snapshot_opstamp(&self) -> u64 {
        self.snapshot_opstamp
    }

    /// Whether a commit has landed since the snapshot was taken.
    pub fn is_stale(&self) -> Result<bool> {
        Ok(self.index.load_metas()?.opstamp != self.snapshot_opstamp)
    }

    /// Highest docid ever allocated, as recorded by the last commit.
    pub fn last_docid(&self) -> Result<u64> {
        let metas = self.index.load_metas()?;
        match metas.payload.as_deref() {
            Some(payload) if !payload.is_empty() => {
                let payload: CommitPayload = serde_json::from_str(payload)?;
                Ok(payload.last_docid)
            }
            _ => Ok(0),
        }
    }

    /// Commit pending operations, recording `last_docid` with them.
    pub fn commit(writer: &mut IndexWriter, last_docid: u64) -> Result<()> {
        let payload = serde_json::to_string(&CommitPayload { last_docid })?;
        let mut prepared = writer.prepare_commit()?;
        prepared.set_payload(&payload);
        prepared.commit()?;
        Ok(())
    }

    pub fn docid_term(&self, docid: DocId) -> tantivy::Term {
        tantivy::Term::from_field_u64(self.fields.docid, docid.get())
    }

    /// Build the stored form of a record.
    pub fn to_tantivy(&self, record: &DocumentRecord) -> TantivyDocument {
        let f = self.fields;
        let mut doc = TantivyDocument::default();
        doc.add_u64(f.docid, record.docid.get());
        for term in &record.terms {
            doc.add_text(f.terms, term.to_string());
        }
        if let Some(title) = &record.title {
            doc.add_text(f.title, title);
        }
        for author in &record.authors {
            doc.add_text(f.author, author);
        }
        if !record.body.is_empty() {
            doc.add_text(f.body, &record.body);
        }
        if let Some(year) = record.year {
            doc.add_u64(f.year, year);
        }
        doc
    }

    /// Read a stored document back.
    pub fn to_document(&self, doc: &TantivyDocument) -> Result<Document> {
        let f = self.fields;
        let docid = doc
            .get_first(f.docid)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::Parse("stored document has no docid".into()))?;

        Ok(Document {
            docid: DocId::new(docid),
            terms: doc
                .get_all(f.terms)
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect(),
            title: doc
                .get_first(f.title)
                .and_then(|v| v.as_str())
                .map(String::from),
            authors: doc
                .get_all(f.author)
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect(),
            year: doc.get_first(f.year).and_then(|v| v.as_u64()),
            body: doc
                .get_first(f.body)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
        })
    }

    /// Run the free-text analyzer over `text`, returning the stemmed tokens
    /// in order, repeats included.
    pub fn analyze(&self, text: &str) -> Result<Vec<String>> {
        let mut analyzer =
            self.index.tokenizers().get(ANALYZER).ok_or_else(|| {
                Error::Config(format!("analyzer '{ANALYZER}' not registered"))
            })?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        Ok(tokens)
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("snapshot_opstamp", &self.snapshot_opstamp)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tantivy::{collector::TopDocs, query::TermQuery};

    use super::*;
    use crate::schema::Term;

    fn record(docid: u64, body: &str) -> DocumentRecord {
        DocumentRecord {
            docid: DocId::new(docid),
            terms: BTreeSet::from([
                Term::new("Q", docid.to_string()),
                Term::new("K", "foo"),
            ]),
            year: Some(2001),
            title: Some("A Title".into()),
            authors: vec!["Smith".into(), "Doe".into()],
            body: body.into(),
        }
    }

    #[test]
    fn stored_document_roundtrip() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        let mut writer = idx.writer().unwrap();
        writer
            .add_document(idx.to_tantivy(&record(1, "hello world")))
            .unwrap();
        SearchIndex::commit(&mut writer, 1).unwrap();
        idx.reload().unwrap();

        let searcher = idx.searcher();
        let query = TermQuery::new(
            idx.docid_term(DocId::new(1)),
            IndexRecordOption::Basic,
        );
        let hits = searcher.search(&query, &TopDocs::with_limit(10)).unwrap();
        assert_eq!(hits.len(), 1);

        let stored: TantivyDocument = searcher.doc(hits[0].1).unwrap();
        let doc = idx.to_document(&stored).unwrap();
        assert_eq!(doc.docid, DocId::new(1));
        assert_eq!(doc.tags(), vec!["foo"]);
        assert_eq!(doc.authors, vec!["Smith", "Doe"]);
        assert_eq!(doc.year, Some(2001));
        assert_eq!(doc.body, "hello world");
    }

    #[test]
    fn commit_payload_tracks_last_docid() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        assert_eq!(idx.last_docid().unwrap(), 0);

        let mut writer = idx.writer().unwrap();
        writer.add_document(idx.to_tantivy(&record(7, ""))).unwrap();
        SearchIndex::commit(&mut writer, 7).unwrap();
        idx.reload().unwrap();
        assert_eq!(idx.last_docid().unwrap(), 7);
    }

    #[test]
    fn manual_reload_controls_visibility() {
        let mut idx = SearchIndex::open_in_ram().unwrap();
        let mut writer = idx.writer().unwrap();
        writer.add_document(idx.to_tantivy(&record(1, "x"))).unwrap();
        SearchIndex::commit(&mut writer, 1).unwrap();

        assert_eq!(idx.searcher().num_docs(), 0);
        assert!(idx.is_stale().unwrap());

        idx.reload().unwrap();
        assert_eq!(idx.searcher().num_docs(), 1);
        assert!(!idx.is_stale().unwrap());
    }

    #[test]
    fn analyzer_stems_and_lowercases() {
        let idx = SearchIndex::open_in_ram().unwrap();
        let tokens = idx.analyze("The Runners were RUNNING").unwrap();
        assert_eq!(tokens, vec!["the", "runner", "were", "run"]);
    }

    #[test]
    fn second_writer_is_locked_out() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tantivy");
        let first = SearchIndex::open(&dir, true).unwrap();
        let _writer = first.writer().unwrap();

        let second = SearchIndex::open(&dir, false).unwrap();
        assert!(matches!(second.writer(), Err(Error::Lock(_))));
    }

    #[test]
    fn open_without_create_is_uninitialized() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tantivy");
        assert!(matches!(
            SearchIndex::open(&dir, false),
            Err(Error::Uninitialized(_))
        ));
    }

    #[test]
    fn disk_persistence() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tantivy");

        {
            let idx = SearchIndex::open(&dir, true).unwrap();
            let mut writer = idx.writer().unwrap();
            writer.add_document(idx.to_tantivy(&record(3, "kept"))).unwrap();
            SearchIndex::commit(&mut writer, 3).unwrap();
        }

        let idx = SearchIndex::open(&dir, false).unwrap();
        assert_eq!(idx.last_docid().unwrap(), 3);
        assert_eq!(idx.searcher().num_docs(), 1);
    }
}
