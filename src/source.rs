//! External sources: catalogs that hand out identifiers for documents
//! (arXiv ids, DOIs, ISBNs...). Each known source gets its own exclusive
//! term prefix so documents can be found by their external identifier.

use std::{collections::BTreeMap, str::FromStr};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    bibtex::BibEntry,
    config_db::ConfigDb,
    error::{Error, Result},
    schema::TermSchema,
};

/// Declarative description of a source, as persisted in the config
/// database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Home page of the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Item URL template; `{id}` is replaced by the identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_format: Option<String>,
    /// Regex matched against the start of a URL; group 1 is the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_regex: Option<String>,
    /// Regex searched for in document text; group 1 is the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_regex: Option<String>,
}

impl SourceDefinition {
    pub fn prefix(&self) -> String {
        TermSchema::source_prefix(&self.name)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::Source(format!(
                "invalid source name: {:?}",
                self.name
            )));
        }
        if TermSchema::builtin().source_collides(&self.name) {
            return Err(Error::Source(format!(
                "source name collides with a field: {}",
                self.name
            )));
        }
        Ok(())
    }
}

fn builtin_definitions() -> Vec<SourceDefinition> {
    vec![
        SourceDefinition {
            name: "arxiv".into(),
            description: "Open access e-print service".into(),
            url: Some("https://arxiv.org/".into()),
            url_format: Some("https://arxiv.org/abs/{id}".into()),
            url_regex: Some(r"https?://arxiv.org/(?:abs|pdf|format)/([^/]*)".into()),
            scan_regex: Some(r"arXiv:([0-9]{4}\.[0-9]{4,5})(?:v[0-9]+)?".into()),
        },
        SourceDefinition {
            name: "doi".into(),
            description: "Digital Object Identifier".into(),
            url: Some("https://doi.org/".into()),
            url_format: Some("https://doi.org/{id}".into()),
            url_regex: Some(r"https?://(?:dx\.)?doi.org/(10\..+)".into()),
            scan_regex: Some(r#"(?i)doi:\s*(10\.\d{4,9}/[^\s"<>]+)"#.into()),
        },
        SourceDefinition {
            name: "isbn".into(),
            description: "International Standard Book Number (ISBN)".into(),
            scan_regex: Some(r"isbn:([0-9]{10}|[0-9]{13})".into()),
            ..SourceDefinition::default()
        },
        SourceDefinition {
            name: "cryptoeprint".into(),
            description: "Cryptology ePrint Archive".into(),
            url: Some("https://eprint.iacr.org/".into()),
            url_format: Some("https://eprint.iacr.org/{id}".into()),
            url_regex: Some(r"https?://eprint.iacr.org/(\d{4,}/\d{3,})".into()),
            scan_regex: None,
        },
    ]
}

/// A definition with its patterns compiled.
#[derive(Debug, Clone)]
struct Source {
    definition: SourceDefinition,
    url_regex: Option<Regex>,
    scan_regex: Option<Regex>,
}

impl Source {
    fn compile(definition: SourceDefinition) -> Result<Self> {
        definition.validate()?;
        let url_regex = definition
            .url_regex
            .as_deref()
            .map(|re| Regex::new(&format!("^(?:{re})")))
            .transpose()?;
        let scan_regex =
            definition.scan_regex.as_deref().map(Regex::new).transpose()?;
        Ok(Self {
            definition,
            url_regex,
            scan_regex,
        })
    }
}

/// A document's identifier within an external source, written
/// `source:id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId {
    pub source: String,
    pub id: String,
}

impl SourceId {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

impl FromStr for SourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((source, id)) if !source.is_empty() && !id.is_empty() => {
                Ok(Self::new(source.to_lowercase(), id))
            }
            _ => Err(Error::Source(format!(
                "could not parse source id: {s:?} (expected source:id)"
            ))),
        }
    }
}

/// The set of sources known to a database handle.
///
/// Constructed once, then handed to the term schema and to the indexer as
/// plain data. Sources added later are only visible to handles opened
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: BTreeMap<String, Source>,
}

impl SourceCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in sources.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for definition in builtin_definitions() {
            // Built-in patterns are known to compile.
            if let Ok(source) = Source::compile(definition) {
                catalog
                    .sources
                    .insert(source.definition.name.clone(), source);
            }
        }
        catalog
    }

    /// Built-ins overlaid with the given definitions. A definition whose
    /// name matches a built-in replaces it.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = SourceDefinition>,
    ) -> Result<Self> {
        let mut catalog = Self::builtin();
        for definition in definitions {
            catalog.insert(definition)?;
        }
        Ok(catalog)
    }

    /// Built-ins plus the user's sources from the config database.
    pub fn load(config: &ConfigDb) -> Result<Self> {
        let catalog = Self::from_definitions(config.list_sources()?)?;
        tracing::debug!(sources = catalog.len(), "loaded source catalog");
        Ok(catalog)
    }

    pub fn insert(&mut self, definition: SourceDefinition) -> Result<()> {
        let source = Source::compile(definition)?;
        self.sources.insert(source.definition.name.clone(), source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SourceDefinition> {
        self.sources.get(name).map(|s| &s.definition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDefinition> {
        self.sources.values().map(|s| &s.definition)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Parse `source:id`, requiring the source to be known.
    pub fn parse_sid(&self, sid: &str) -> Result<SourceId> {
        let parsed: SourceId = sid.parse()?;
        if !self.contains(&parsed.source) {
            return Err(Error::Source(format!(
                "unknown source: {}",
                parsed.source
            )));
        }
        Ok(parsed)
    }

    /// Map a URL or a `source:id` string to a source id.
    pub fn match_source(&self, input: &str) -> Result<SourceId> {
        if input.starts_with("http://") || input.starts_with("https://") {
            return self.match_url(input).ok_or_else(|| {
                Error::Source(format!("URL matches no known source: {input}"))
            });
        }
        self.parse_sid(input)
    }

    /// Match a URL against every source's URL pattern.
    pub fn match_url(&self, url: &str) -> Option<SourceId> {
        self.sources.values().find_map(|source| {
            let captures = source.url_regex.as_ref()?.captures(url)?;
            let id = captures.get(1)?.as_str();
            Some(SourceId::new(&source.definition.name, id))
        })
    }

    /// The item URL for a source id, if the source has a URL template.
    pub fn item_url(&self, sid: &SourceId) -> Option<String> {
        let format = self.get(&sid.source)?.url_format.as_ref()?;
        Some(format.replace("{id}", &sid.id))
    }

    /// Find source identifiers mentioned in a document's text.
    pub fn scan_text(&self, text: &str) -> Vec<SourceId> {
        let mut found = Vec::new();
        for source in self.sources.values() {
            let Some(regex) = &source.scan_regex else {
                continue;
            };
            for captures in regex.captures_iter(text) {
                if let Some(id) = captures.get(1) {
                    let sid =
                        SourceId::new(&source.definition.name, id.as_str());
                    if !found.contains(&sid) {
                        found.push(sid);
                    }
                }
            }
        }
        found
    }

    /// Source identifiers carried by a bibliographic entry: any field
    /// named after a known source, plus `eprint` as an arXiv id.
    pub fn scan_bib_entry(&self, entry: &BibEntry) -> Vec<SourceId> {
        let mut found = Vec::new();
        for (field, value) in &entry.fields {
            let field = field.to_lowercase();
            if self.contains(&field) && !value.is_empty() {
                found.push(SourceId::new(field, value.as_str()));
            }
        }
        if let Some(eprint) = entry.fields.get("eprint")
            && self.contains("arxiv")
        {
            let sid = SourceId::new("arxiv", eprint.as_str());
            if !found.contains(&sid) {
                found.push(sid);
            }
        }
        found.sort();
        found.dedup();
        found
    }
}
