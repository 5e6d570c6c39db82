use std::{collections::BTreeSet, path::Path};

use paperdex::{
    DataDir,
    Database,
    DocId,
    Document,
    DocumentBuilder,
    Error,
    OpenOptions,
    SortOrder,
    SourceCatalog,
    SourceId,
    bibtex::{BibParser, SimpleBibtex},
    data_dir::STORE_DIR,
    extract::PlainTextExtractor,
    restore,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn create(root: &Path) -> Result<Database, Error> {
    Database::open(
        &DataDir::at(root),
        OpenOptions::writable().create(true).force(true),
        SourceCatalog::builtin(),
    )
}

fn all_docs(db: &Database) -> Result<Vec<Document>, Error> {
    let mut docs: Vec<Document> = db
        .search("*", SortOrder::Relevance, 0)?
        .map(|m| m.map(|m| m.document))
        .collect::<Result<_, _>>()?;
    docs.sort_by_key(|doc| doc.docid);
    Ok(docs)
}

fn docids(db: &Database, query: &str, sort: SortOrder) -> Vec<u64> {
    db.search(query, sort, 0)
        .unwrap()
        .docids()
        .into_iter()
        .map(DocId::get)
        .collect()
}

fn doc(key: &str, year: Option<u64>, tags: &[&str]) -> DocumentBuilder {
    let mut fields = DocumentBuilder::new();
    fields.set_key(key).add_tags(tags.iter().copied());
    if let Some(year) = year {
        fields.set_year(year);
    }
    fields
}

fn words(n: usize, offset: usize) -> String {
    (offset..offset + n)
        .map(|i| format!("token{i}q"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn lookup_by_unique_term_returns_the_indexed_document() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;

    for n in 1..=3u64 {
        let mut fields = doc(&format!("key{n}"), None, &[]);
        fields
            .add_source(SourceId::new("doi", format!("10.1000/{n}")))
            .add_file(
                format!("{}/paper.txt", DocId::new(n).dir_name()),
                "text/plain",
            );
        db.sync(db.generate_docid()?, &fields)?;
    }

    for n in 1..=3u64 {
        let docid = DocId::new(n);
        let by_key = db.doc_for_key(&format!("key{n}"))?.ok_or("no key")?;
        let by_sid = db
            .doc_for_source(&SourceId::new("doi", format!("10.1000/{n}")))?
            .ok_or("no sid")?;
        let by_path = db
            .doc_for_path(&format!("{}/paper.txt", docid.dir_name()))?
            .ok_or("no path")?;
        assert_eq!(by_key.docid, docid);
        assert_eq!(by_sid, by_key);
        assert_eq!(by_path, by_key);
    }
    Ok(())
}

#[test]
fn upsert_twice_is_the_same_as_once() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;
    let fields = doc("smith2001", Some(2001), &["a", "b"]);

    db.sync(DocId::new(1), &fields)?;
    let once = all_docs(&db)?;
    let terms_once: Vec<String> = db.term_iter_prefix("")?.collect();

    db.sync(DocId::new(1), &fields)?;
    assert_eq!(all_docs(&db)?, once);
    assert_eq!(db.term_iter_prefix("")?.collect::<Vec<_>>(), terms_once);
    assert_eq!(db.doc_count(), 1);
    Ok(())
}

#[test]
fn count_equals_unlimited_search_length() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;
    db.sync(DocId::new(1), &doc("a", Some(1999), &["x"]))?;
    db.sync(DocId::new(2), &doc("b", Some(2005), &["x", "y"]))?;
    db.sync(DocId::new(3), &doc("c", None, &["y"]))?;

    for query in ["*", "tag:x", "tag:y -tag:x", "year:2000..", "nothing", "+"] {
        let set = db.search(query, SortOrder::Relevance, 0)?;
        assert_eq!(db.count(query)?, set.len(), "query {query}");
    }
    Ok(())
}

#[test]
fn tag_filters_are_conjunctive() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;
    db.sync(DocId::new(1), &doc("k", None, &["a", "b"]))?;

    assert_eq!(db.count("tag:a tag:b")?, 1);
    assert_eq!(db.count("tag:a tag:c")?, 0);
    Ok(())
}

#[test]
fn exclusive_filters_are_disjunctive() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;

    let mut arxiv = doc("one", None, &[]);
    arxiv.add_source(SourceId::new("arxiv", "1234.5678"));
    let mut isbn = doc("two", None, &[]);
    isbn.add_source(SourceId::new("isbn", "9780262033848"));
    db.sync(DocId::new(1), &arxiv)?;
    db.sync(DocId::new(2), &isbn)?;

    assert_eq!(db.count("source:arxiv source:isbn")?, 2);
    assert_eq!(db.count("source:arxiv")?, 1);
    assert_eq!(db.count("key:one key:two")?, 2);
    assert_eq!(db.count("arxiv:1234.5678")?, 1);
    Ok(())
}

#[test]
fn year_ranges() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;
    let years = [1999u64, 2001, 2005, 2009, 2010, 2011];
    for (n, year) in years.into_iter().enumerate() {
        let docid = DocId::new(n as u64 + 1);
        db.sync(docid, &doc(&year.to_string(), Some(year), &[]))?;
    }

    let years = |query: &str| -> Vec<u64> {
        let mut years: Vec<u64> = db
            .search(query, SortOrder::Year, 0)
            .unwrap()
            .map(|m| m.unwrap().document.year.unwrap())
            .collect();
        years.sort();
        years
    };

    assert_eq!(years("year:2000..2010"), vec![2001, 2005, 2009, 2010]);
    assert_eq!(years("year:..2000"), vec![1999]);
    assert_eq!(years("year:2010.."), vec![2010, 2011]);
    Ok(())
}

#[test]
fn similar_finds_exact_text_first_with_full_score() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;
    let text = words(60, 0);

    let mut other = doc("other", None, &[]);
    other.set_body(words(60, 1000));
    let mut same = doc("same", None, &[]);
    same.set_body(text.clone());
    db.sync(DocId::new(1), &other)?;
    db.sync(DocId::new(2), &same)?;

    let similar: Vec<(Document, f32)> =
        db.find_similar(&text)?.collect::<Result<_, _>>()?;
    assert_eq!(similar[0].0.docid, DocId::new(2));
    assert!((similar[0].1 - 1.0).abs() < 1e-6);
    assert_eq!(similar.len(), 1);
    Ok(())
}

#[test]
fn year_sort_then_newest_docid() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;
    db.sync(DocId::new(1), &doc("late", Some(2010), &["t"]))?;
    db.sync(DocId::new(2), &doc("early", Some(2001), &["t"]))?;
    db.sync(DocId::new(3), &doc("early2", Some(2001), &["t"]))?;

    assert_eq!(docids(&db, "tag:t", SortOrder::Year), vec![3, 2, 1]);
    Ok(())
}

#[test]
fn free_text_ranks_by_relevance() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;

    let mut weak = doc("weak", None, &[]);
    weak.set_body("graphs appear once among many other unrelated words here");
    let mut strong = doc("strong", None, &[]);
    strong.set_title("Graphs").set_body("graphs graphs graphs");
    db.sync(DocId::new(1), &weak)?;
    db.sync(DocId::new(2), &strong)?;

    assert_eq!(docids(&db, "graph", SortOrder::Relevance), vec![2, 1]);
    assert_eq!(docids(&db, "title:graphs", SortOrder::Relevance), vec![2]);
    Ok(())
}

#[test]
fn deleted_ids_are_never_reused() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let mut db = create(tmp.path())?;
    for key in ["a", "b", "c"] {
        db.sync(db.generate_docid()?, &doc(key, None, &[]))?;
    }
    db.delete(DocId::new(3))?;
    assert_eq!(db.generate_docid()?, DocId::new(4));

    // Survives reopening the store.
    drop(db);
    let db = create(tmp.path())?;
    assert_eq!(db.generate_docid()?, DocId::new(4));
    Ok(())
}

#[test]
fn second_writer_is_rejected() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let _writer = create(tmp.path())?;
    assert!(matches!(create(tmp.path()), Err(Error::Lock(_))));

    // Readers are not affected.
    let reader = Database::open(
        &DataDir::at(tmp.path()),
        OpenOptions::read_only(),
        SourceCatalog::builtin(),
    )?;
    assert_eq!(reader.doc_count(), 0);
    Ok(())
}

#[test]
fn malformed_query_names_the_fragment() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let db = create(tmp.path())?;
    match db.count("(tag:a") {
        Err(Error::QuerySyntax { fragment, .. }) => {
            assert!(fragment.contains('('), "fragment {fragment:?}");
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
    Ok(())
}

fn write_fixture(root: &Path, n: u64) -> std::io::Result<()> {
    let dir = root.join(DocId::new(n).dir_name());
    std::fs::create_dir_all(&dir)?;
    std::fs::write(
        dir.join("bibtex"),
        format!(
            "@article{{paper{n},\n  title = {{Paper number {n}}},\n  \
             author = {{Smith, A. and Doe, B.}},\n  year = {{{}}},\n  \
             doi = {{10.1000/{n}}}\n}}\n",
            2000 + n
        ),
    )?;
    std::fs::write(dir.join("tags"), "foo\nbar")?;
    std::fs::write(
        dir.join("paper.txt"),
        format!("Body of paper {n}. {}", words(10, n as usize * 10)),
    )?;
    Ok(())
}

#[test]
fn restore_matches_incremental_build() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    for n in 1..=3 {
        write_fixture(root, n)?;
    }

    // Incremental: index each directory's artifacts through the API.
    let mut db = create(root)?;
    for n in 1..=3u64 {
        let docid = DocId::new(n);
        let dir = root.join(docid.dir_name());
        let entry =
            SimpleBibtex.parse(&std::fs::read_to_string(dir.join("bibtex"))?)?;
        let text = std::fs::read_to_string(dir.join("paper.txt"))?;

        let mut fields = DocumentBuilder::new();
        fields
            .set_bib_entry(&entry, db.catalog())
            .add_tags(["foo", "bar"])
            .add_file(format!("{}/paper.txt", docid.dir_name()), "text/plain")
            .add_text(&text);
        db.sync(db.generate_docid()?, &fields)?;
    }
    let incremental = all_docs(&db)?;
    let incremental_terms: BTreeSet<String> =
        db.term_iter_prefix("")?.collect();
    assert_eq!(incremental.len(), 3);
    assert_eq!(incremental[0].tags(), vec!["bar", "foo"]);
    drop(db);

    // Lose the index, keep the document directories.
    std::fs::remove_dir_all(root.join(STORE_DIR))?;
    let mut db = create(root)?;
    assert_eq!(db.doc_count(), 0);

    let report = restore::restore(&mut db, &PlainTextExtractor, &SimpleBibtex)?;
    assert!(report.is_clean());
    assert_eq!(
        report.restored,
        vec![DocId::new(1), DocId::new(2), DocId::new(3)]
    );

    assert_eq!(all_docs(&db)?, incremental);
    assert_eq!(
        db.term_iter_prefix("")?.collect::<BTreeSet<_>>(),
        incremental_terms
    );
    assert_eq!(db.generate_docid()?, DocId::new(4));
    assert_eq!(db.count("tag:foo tag:bar doi:10.1000/2")?, 1);
    assert_eq!(db.count("author:smith year:2002..")?, 2);

    // Re-running changes nothing.
    restore::restore(&mut db, &PlainTextExtractor, &SimpleBibtex)?;
    assert_eq!(all_docs(&db)?, incremental);
    Ok(())
}
