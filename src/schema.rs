//! Term schema: which field names exist, what kind of field each one is,
//! and the prefix its terms carry in the index.
//!
//! Adding a field is an edit to [`FIELD_TABLE`] (and [`FACET_TABLE`] for
//! numeric slots); nothing else dispatches on field names.

use std::collections::BTreeMap;

use crate::source::SourceCatalog;

/// Term prefixes. Single upper-case letters or `X...|`, so a stored term
/// string can always be split back into prefix and value.
pub mod prefix {
    pub const ID: &str = "Q";
    pub const KEY: &str = "XBIB|";
    pub const SOURCE: &str = "XSOURCE|";
    pub const YEAR: &str = "Y";
    pub const TAG: &str = "K";
    pub const FILE: &str = "P";
    pub const TYPE: &str = "T";
    pub const TITLE: &str = "S";
    pub const AUTHOR: &str = "A";
    /// Body text is unprefixed.
    pub const BODY: &str = "";
}

/// How terms of a field behave at index and query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// One value per document. Same-prefix query terms are alternatives.
    ExclusiveBoolean,
    /// Many values per document. Same-prefix query terms must all match.
    MultiBoolean,
    /// Used for structural lookups only, never exposed to queries.
    InternalBoolean,
    /// Stemmed free text contributing to relevance.
    ProbabilisticText,
    /// A numeric value slot with no term of its own.
    NumericFacet,
}

impl FieldKind {
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Self::ExclusiveBoolean | Self::MultiBoolean | Self::InternalBoolean
        )
    }
}

/// A numeric value slot, usable for range filters and sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FacetSlot(pub u32);

impl FacetSlot {
    pub const YEAR: Self = Self(0);
}

const FIELD_TABLE: &[(&str, FieldKind, &str)] = &[
    ("id", FieldKind::ExclusiveBoolean, prefix::ID),
    ("key", FieldKind::ExclusiveBoolean, prefix::KEY),
    ("source", FieldKind::ExclusiveBoolean, prefix::SOURCE),
    ("year", FieldKind::ExclusiveBoolean, prefix::YEAR),
    ("y", FieldKind::ExclusiveBoolean, prefix::YEAR),
    ("tag", FieldKind::MultiBoolean, prefix::TAG),
    ("file", FieldKind::InternalBoolean, prefix::FILE),
    ("type", FieldKind::InternalBoolean, prefix::TYPE),
    ("title", FieldKind::ProbabilisticText, prefix::TITLE),
    ("t", FieldKind::ProbabilisticText, prefix::TITLE),
    ("author", FieldKind::ProbabilisticText, prefix::AUTHOR),
    ("a", FieldKind::ProbabilisticText, prefix::AUTHOR),
];

const FACET_TABLE: &[(&str, FacetSlot)] =
    &[("year", FacetSlot::YEAR), ("y", FacetSlot::YEAR)];

/// Everything the registry knows about one field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    /// Term prefix. Empty for pure numeric facets.
    pub prefix: String,
    pub facet: Option<FacetSlot>,
}

/// A single index term: a registered prefix plus a value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Term {
    prefix: String,
    value: String,
}

impl Term {
    pub fn new(prefix: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            value: value.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.value)
    }
}

/// The field-name registry used by the indexer and the query parser.
///
/// Built once per database handle and read-only afterwards.
#[derive(Debug, Clone)]
pub struct TermSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl TermSchema {
    /// The static fields, without any source prefixes.
    pub fn builtin() -> Self {
        let mut fields = BTreeMap::new();
        for &(name, kind, prefix) in FIELD_TABLE {
            fields.insert(
                name.to_string(),
                FieldSpec {
                    kind,
                    prefix: prefix.to_string(),
                    facet: None,
                },
            );
        }
        for &(name, slot) in FACET_TABLE {
            fields
                .entry(name.to_string())
                .or_insert_with(|| FieldSpec {
                    kind: FieldKind::NumericFacet,
                    prefix: String::new(),
                    facet: None,
                })
                .facet = Some(slot);
        }
        Self { fields }
    }

    /// The static fields plus one exclusive prefix per catalog source.
    pub fn build(catalog: &SourceCatalog) -> Self {
        let mut schema = Self::builtin();
        for name in catalog.names() {
            schema.register_source_prefix(name);
        }
        schema
    }

    /// Prefix carried by terms holding a source's external identifiers.
    pub fn source_prefix(name: &str) -> String {
        format!("X{}|", name.to_uppercase())
    }

    /// Whether `name` cannot be used for a source: it is a built-in field,
    /// or its prefix is already carried by a different field.
    pub fn source_collides(&self, name: &str) -> bool {
        let prefix = Self::source_prefix(name);
        let builtin = FIELD_TABLE.iter().any(|&(field, _, _)| field == name)
            || FACET_TABLE.iter().any(|&(field, _)| field == name);
        builtin
            || match self.fields.get(name) {
                Some(def) => def.prefix != prefix,
                None => self.is_registered_prefix(&prefix),
            }
    }

    /// Register the exclusive prefix for a source name. Registering the same
    /// name twice is a no-op. A colliding source (see
    /// [`source_collides`](Self::source_collides)) is ignored and `None`
    /// is returned.
    pub fn register_source_prefix(
        &mut self,
        name: &str,
    ) -> Option<&FieldSpec> {
        if self.source_collides(name) {
            tracing::warn!(
                source = name,
                "source collides with a field; ignored"
            );
            return None;
        }

        let prefix = Self::source_prefix(name);
        Some(self.fields.entry(name.to_string()).or_insert_with(|| {
            FieldSpec {
                kind: FieldKind::ExclusiveBoolean,
                prefix,
                facet: None,
            }
        }))
    }

    pub fn resolve(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Like [`resolve`](Self::resolve), but hides internal fields, which the
    /// query grammar does not expose.
    pub fn resolve_queryable(&self, name: &str) -> Option<&FieldSpec> {
        self.resolve(name)
            .filter(|def| def.kind != FieldKind::InternalBoolean)
    }

    pub fn prefix_for(&self, name: &str) -> Option<&str> {
        self.resolve(name)
            .map(|def| def.prefix.as_str())
            .filter(|prefix| !prefix.is_empty())
    }

    pub fn facet_for(&self, name: &str) -> Option<FacetSlot> {
        self.resolve(name).and_then(|def| def.facet)
    }

    /// Whether a term prefix belongs to a registered field.
    pub fn is_registered_prefix(&self, prefix: &str) -> bool {
        self.fields.values().any(|def| def.prefix == prefix)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl Default for TermSchema {
    fn default() -> Self {
        Self::builtin()
    }
}
