use std::{collections::BTreeSet, io::BufRead, path::Path};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use paperdex::{
    bibtex::{BibParser, SimpleBibtex},
    cli::{
        AddArgs,
        Cli,
        Command,
        DbAction,
        SourceAction,
        TagOp,
    },
    config_db::ConfigDb,
    data_dir::DataDir,
    database::{Database, OpenOptions},
    document::Document,
    error::{self, Error},
    extract::{PlainTextExtractor, TextExtractor},
    indexer::DocumentBuilder,
    ranking::SortOrder,
    restore,
    search::{self, Match, OutputFormat},
    source::{SourceCatalog, SourceDefinition},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("PAPERDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.root.as_deref())?;

    match cli.command {
        Command::Add(args) => cmd_add(&data_dir, &args)?,
        Command::Tag(args) => {
            cmd_tag(&data_dir, &args.query.join(" "), &args.operations())?;
        }
        Command::Delete(args) => {
            cmd_delete(&data_dir, &args.query.join(" "), args.force)?;
        }
        Command::Search(args) => cmd_search(
            &data_dir,
            &args.query.join(" "),
            args.output,
            args.sort,
            args.limit,
        )?,
        Command::Tags(args) => cmd_search(
            &data_dir,
            &args.query_or_all(),
            OutputFormat::Tags,
            SortOrder::Relevance,
            0,
        )?,
        Command::Bibtex(args) => cmd_search(
            &data_dir,
            &args.query_or_all(),
            OutputFormat::Bibtex,
            SortOrder::Year,
            0,
        )?,
        Command::Count(args) => {
            let db = open_db(&data_dir, OpenOptions::read_only())?;
            println!("{}", db.count(&args.query_or_all())?);
        }
        Command::Similar(args) => cmd_similar(&data_dir, &args.file)?,
        Command::Export(args) => {
            cmd_export(&data_dir, &args.dir, &args.query.join(" "))?;
        }
        Command::Restore => cmd_restore(&data_dir)?,
        Command::Db { action } => match action {
            DbAction::Dump { prefix, query } => {
                cmd_dump(&data_dir, prefix.as_deref(), &query.query_or_all())?;
            }
            DbAction::Maxid => {
                let db = open_db(&data_dir, OpenOptions::read_only())?;
                println!("{}", db.max_docid()?);
            }
        },
        Command::Source { action } => cmd_source(&data_dir, action)?,
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

/// Built-in sources plus the user's, if the root has a store yet.
fn load_catalog(data_dir: &DataDir) -> error::Result<SourceCatalog> {
    if data_dir.is_initialized() {
        SourceCatalog::load(&ConfigDb::open(&data_dir.config_db())?)
    } else {
        Ok(SourceCatalog::builtin())
    }
}

fn open_db(
    data_dir: &DataDir,
    options: OpenOptions,
) -> error::Result<Database> {
    Database::open(data_dir, options, load_catalog(data_dir)?)
}

fn collect_matches(
    db: &Database,
    query: &str,
    sort: SortOrder,
    limit: usize,
) -> error::Result<Vec<Match>> {
    db.search(query, sort, limit)?.collect()
}

fn read_text(path: &Path) -> error::Result<String> {
    PlainTextExtractor.extract(&std::fs::read(path)?)
}

fn cmd_add(data_dir: &DataDir, args: &AddArgs) -> error::Result<()> {
    if args.source.is_none() && args.file.is_none() {
        return Err(Error::Config(
            "must specify either --source or --file".into(),
        ));
    }

    let mut db = open_db(data_dir, OpenOptions::writable().create(true))?;
    let extractor = PlainTextExtractor;

    // Update an existing document, or start a new one.
    let (docid, mut fields) = if args.query.is_empty() {
        (db.generate_docid()?, DocumentBuilder::new())
    } else {
        let query = args.query.join(" ");
        let mut matches =
            collect_matches(&db, &query, SortOrder::Relevance, 0)?;
        if matches.len() != 1 {
            return Err(Error::Config(format!(
                "query matched {} documents, expected exactly one: {query}",
                matches.len()
            )));
        }
        let doc = matches.remove(0).document;
        (doc.docid, DocumentBuilder::from_document(&doc))
    };

    let text = match &args.file {
        Some(path) => {
            let text = extractor.extract(&std::fs::read(path)?)?;
            let similar: Vec<(Document, f32)> =
                db.find_similar(&text)?.collect::<error::Result<_>>()?;
            if let Some((doc, _)) =
                similar.iter().find(|(doc, _)| doc.docid != docid)
            {
                eprintln!("Document appears to already be in the database:");
                for (doc, score) in &similar {
                    eprintln!("{} ({score:.2})", doc.summary());
                }
                if !args.force {
                    return Err(Error::Duplicate {
                        what: "file".into(),
                        docid: doc.docid.get(),
                    });
                }
            }
            Some(text)
        }
        None => None,
    };

    let mut bib_entry = None;
    if let Some(source) = &args.source {
        if Path::new(source).is_file() {
            let entry = SimpleBibtex.parse(&std::fs::read_to_string(source)?)?;
            if let Some(existing) = db.doc_for_key(&entry.key)?
                && existing.docid != docid
            {
                return Err(Error::Duplicate {
                    what: format!("key {}", entry.key),
                    docid: existing.docid.get(),
                });
            }
            fields.set_bib_entry(&entry, db.catalog());
            bib_entry = Some(entry);
        } else {
            let sid = db.catalog().match_source(source)?;
            if let Some(existing) = db.doc_for_source(&sid)?
                && existing.docid != docid
            {
                eprintln!("{}", existing.summary());
                return Err(Error::Duplicate {
                    what: sid.to_string(),
                    docid: existing.docid.get(),
                });
            }
            fields.add_source(sid);
        }
    }

    // Sources given on the command line ride along in the bibtex so a
    // restore finds them again.
    if let Some(entry) = &mut bib_entry {
        for sid in &fields.sources {
            entry
                .fields
                .entry(sid.source.clone())
                .or_insert_with(|| sid.id.clone());
        }
        data_dir.write_bibtex(docid, &entry.to_bibtex())?;
    }

    if let (Some(path), Some(text)) = (&args.file, &text) {
        let reference = data_dir.import_file(docid, path)?;
        fields
            .add_file(reference, extractor.content_type())
            .add_text(text);
    }

    if let Some(tags) = &args.tags {
        fields.add_tags(tags.split(',').filter(|t| !t.trim().is_empty()));
    }

    db.sync(docid, &fields)?;
    if let Some(doc) = db.get(docid)? {
        println!("{}", doc.summary());
    }
    Ok(())
}

fn cmd_tag(
    data_dir: &DataDir,
    query: &str,
    operations: &[TagOp],
) -> error::Result<()> {
    let mut db = open_db(data_dir, OpenOptions::writable())?;
    let matches = collect_matches(&db, query, SortOrder::Relevance, 0)?;
    if matches.is_empty() {
        return Err(Error::NotFound {
            kind: "document",
            name: query.to_string(),
        });
    }

    for m in matches {
        let mut fields = DocumentBuilder::from_document(&m.document);
        for op in operations {
            match op {
                TagOp::Add(tag) => fields.add_tags([tag]),
                TagOp::Remove(tag) => fields.remove_tags([tag]),
            };
        }
        db.sync(m.document.docid, &fields)?;
    }
    Ok(())
}

fn cmd_delete(
    data_dir: &DataDir,
    query: &str,
    force: bool,
) -> error::Result<()> {
    let mut db = open_db(data_dir, OpenOptions::writable())?;
    let matches = collect_matches(&db, query, SortOrder::Relevance, 0)?;
    if matches.is_empty() {
        return Err(Error::NotFound {
            kind: "document",
            name: query.to_string(),
        });
    }

    let stdin = std::io::stdin();
    for m in matches {
        let docid = m.document.docid;
        if !force {
            eprintln!("The following document will be deleted:");
            eprintln!("{}", m.document.summary());
            eprint!("Type 'yes' to confirm: ");
            let mut answer = String::new();
            stdin.lock().read_line(&mut answer)?;
            if answer.trim() != "yes" {
                eprintln!("Aborting.");
                return Ok(());
            }
        }
        db.delete(docid)?;
        data_dir.remove_doc_dir(docid)?;
        eprintln!("deleted {docid}");
    }
    Ok(())
}

fn cmd_search(
    data_dir: &DataDir,
    query: &str,
    output: OutputFormat,
    sort: SortOrder,
    limit: usize,
) -> error::Result<()> {
    let db = open_db(data_dir, OpenOptions::read_only())?;
    let matches = collect_matches(&db, query, sort, limit)?;

    for line in search::render(&matches, output, data_dir.root())? {
        println!("{line}");
        if output == OutputFormat::Bibtex {
            println!();
        }
    }
    Ok(())
}

fn cmd_similar(data_dir: &DataDir, file: &Path) -> error::Result<()> {
    let text = read_text(file)?;
    let db = open_db(data_dir, OpenOptions::read_only())?;
    for result in db.find_similar(&text)? {
        let (doc, score) = result?;
        println!("{} ({score:.2})", doc.summary());
    }
    Ok(())
}

fn cmd_export(
    data_dir: &DataDir,
    dir: &Path,
    query: &str,
) -> error::Result<()> {
    std::fs::create_dir_all(dir)?;
    let db = open_db(data_dir, OpenOptions::read_only())?;

    for m in collect_matches(&db, query, SortOrder::Relevance, 0)? {
        let paths = m.document.full_paths(data_dir.root());
        let count = paths.len();
        for (i, path) in paths.iter().enumerate() {
            let stem = match &m.document.title {
                Some(title) => title.replace(' ', "_"),
                None => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| m.document.docid.dir_name()),
            };
            let mut name = stem;
            if count > 1 {
                name.push_str(&format!(".{i}"));
            }
            if let Some(ext) = path.extension() {
                name.push('.');
                name.push_str(&ext.to_string_lossy());
            }

            let target = dir.join(name);
            std::fs::copy(path, &target)?;
            println!("{}", target.display());
        }
    }
    Ok(())
}

fn cmd_restore(data_dir: &DataDir) -> error::Result<()> {
    let mut db = open_db(
        data_dir,
        OpenOptions::writable().create(true).force(true),
    )?;
    let report = restore::restore(&mut db, &PlainTextExtractor, &SimpleBibtex)?;

    eprintln!(
        "Restored {} documents ({} empty, {} failed).",
        report.restored.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (docid, e) in &report.failed {
        eprintln!("  {docid}: {e}");
    }
    report.ensure_clean()
}

fn cmd_dump(
    data_dir: &DataDir,
    prefix: Option<&str>,
    query: &str,
) -> error::Result<()> {
    let db = open_db(data_dir, OpenOptions::read_only())?;
    let prefix = prefix.unwrap_or("");

    if query == "*" {
        for term in db.term_iter_prefix(prefix)? {
            println!("{term}");
        }
    } else {
        let mut terms = BTreeSet::new();
        for m in collect_matches(&db, query, SortOrder::Relevance, 0)? {
            terms.extend(
                m.document
                    .term_iter(prefix)
                    .map(|value| format!("{prefix}{value}")),
            );
        }
        for term in terms {
            println!("{term}");
        }
    }
    Ok(())
}

fn cmd_source(data_dir: &DataDir, action: SourceAction) -> error::Result<()> {
    match action {
        SourceAction::List { json } => {
            let catalog = load_catalog(data_dir)?;
            let builtin = SourceCatalog::builtin();
            if json {
                let list: Vec<&SourceDefinition> = catalog.iter().collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for source in catalog.iter() {
                    let origin = if builtin.get(&source.name) == Some(source) {
                        "builtin"
                    } else {
                        "config"
                    };
                    println!(
                        "{}: {} ({}) [{origin}]",
                        source.name,
                        source.description,
                        source.url.as_deref().unwrap_or("")
                    );
                }
            }
        }
        SourceAction::Url { sid } => {
            let catalog = load_catalog(data_dir)?;
            let sid = catalog.match_source(&sid)?;
            let url = catalog.item_url(&sid).ok_or_else(|| Error::NotFound {
                kind: "source URL",
                name: sid.to_string(),
            })?;
            println!("{url}");
        }
        SourceAction::Add {
            name,
            description,
            url,
            url_format,
            url_regex,
            scan_regex,
        } => {
            data_dir.ensure_initialized()?;
            let definition = SourceDefinition {
                name,
                description,
                url,
                url_format,
                url_regex,
                scan_regex,
            };
            // Compiles the patterns before anything is persisted.
            SourceCatalog::empty().insert(definition.clone())?;
            ConfigDb::open(&data_dir.config_db())?.set_source(&definition)?;
            println!("Added source '{}'", definition.name);
        }
        SourceAction::Remove { name } => {
            data_dir.ensure_initialized()?;
            if !ConfigDb::open(&data_dir.config_db())?.remove_source(&name)? {
                return Err(Error::NotFound { kind: "source", name });
            }
            println!("Removed source '{name}'");
        }
        SourceAction::Scan { file } => {
            let catalog = load_catalog(data_dir)?;
            for sid in catalog.scan_text(&read_text(&file)?) {
                println!("{sid}");
            }
        }
    }
    Ok(())
}
