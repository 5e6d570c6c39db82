//! Query strings.
//!
//! ```text
//! query    := '*' | '+' | or_expr
//! or_expr  := and_expr (OR and_expr)*
//! and_expr := unary ((AND)? unary)*
//! unary    := (NOT | '-') unary | primary
//! primary  := '(' or_expr ')' | '*' | field ':' value | QUOTED | WORD
//! value    := QUOTED | WORD | NUMBER? '..' NUMBER?
//! ```
//!
//! Field names go through the [`TermSchema`]. Unknown (and internal) field
//! names are not errors: `foo:bar` is searched as free text.

use std::{collections::BTreeMap, ops::Bound};

use tantivy::{
    Score,
    query::{
        AllQuery,
        BooleanQuery,
        BoostQuery,
        ConstScoreQuery,
        EmptyQuery,
        Occur,
        PhraseQuery,
        Query as TantivyQuery,
        RangeQuery,
        TermQuery,
    },
    schema::{Field, IndexRecordOption},
};

use crate::{
    error::{Error, Result},
    ranking::Weighting,
    schema::{FacetSlot, FieldKind, Term, TermSchema, prefix},
    tantivy_index::SearchIndex,
};

/// Boost applied to title matches of unqualified free text.
const TITLE_BOOST: Score = 2.0;

/// Which text fields a free-text clause searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    /// Body, title and author.
    Any,
    Title,
    Author,
}

/// A parsed query, independent of the index it will run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    MatchAll,
    /// Free text. `phrase` keeps the words adjacent and in order.
    Text {
        field: TextField,
        text: String,
        phrase: bool,
    },
    /// A single boolean term; scores nothing.
    Filter(Term),
    /// Alternatives for one exclusive field.
    AnyOf(Vec<Term>),
    Range {
        slot: FacetSlot,
        lo: Option<u64>,
        hi: Option<u64>,
    },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::MatchAll => write!(f, "<all>"),
            Query::Text { field, text, phrase } => {
                let field = match field {
                    TextField::Any => "",
                    TextField::Title => "S:",
                    TextField::Author => "A:",
                };
                if *phrase {
                    write!(f, "{field}\"{text}\"")
                } else {
                    write!(f, "{field}{text}")
                }
            }
            Query::Filter(term) => write!(f, "[{term}]"),
            Query::AnyOf(terms) => {
                let terms: Vec<String> =
                    terms.iter().map(|t| t.to_string()).collect();
                write!(f, "[{}]", terms.join("|"))
            }
            Query::Range { slot, lo, hi } => {
                write!(f, "slot{}:", slot.0)?;
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                write!(f, "..")?;
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                Ok(())
            }
            Query::And(qs) => write_joined(f, "AND", qs),
            Query::Or(qs) => write_joined(f, "OR", qs),
            Query::Not(q) => write!(f, "NOT {q}"),
        }
    }
}

fn write_joined(
    f: &mut std::fmt::Formatter<'_>,
    op: &str,
    queries: &[Query],
) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, q) in queries.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{q}")?;
    }
    write!(f, ")")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Star,
    Word(String),
    Quoted(String),
    Field {
        name: String,
        value: String,
        quoted: bool,
    },
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    /// Source text, for error messages.
    raw: String,
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn lex(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map_or(input.len(), |&(b, _)| b);
    let mut tokens = Vec::new();
    let mut i = 0;

    // Reads a quoted string whose opening quote is at `start`.
    let read_quoted = |start: usize| -> Result<(String, usize)> {
        let mut j = start + 1;
        while j < chars.len() && chars[j].1 != '"' {
            j += 1;
        }
        if j >= chars.len() {
            return Err(Error::syntax(
                &input[byte_at(start)..],
                "unterminated quote",
            ));
        }
        Ok((input[byte_at(start + 1)..byte_at(j)].to_string(), j + 1))
    };

    while i < chars.len() {
        let c = chars[i].1;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = match c {
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            '"' => {
                let (text, next) = read_quoted(i)?;
                i = next;
                TokenKind::Quoted(text)
            }
            '-' => {
                i += 1;
                TokenKind::Not
            }
            _ => {
                while i < chars.len()
                    && !chars[i].1.is_whitespace()
                    && !matches!(chars[i].1, '(' | ')' | '"')
                {
                    i += 1;
                }
                let word = &input[byte_at(start)..byte_at(i)];
                match word.split_once(':') {
                    Some((name, "")) if is_field_name(name) => {
                        if chars.get(i).is_some_and(|&(_, c)| c == '"') {
                            let (value, next) = read_quoted(i)?;
                            i = next;
                            TokenKind::Field {
                                name: name.to_string(),
                                value,
                                quoted: true,
                            }
                        } else {
                            TokenKind::Field {
                                name: name.to_string(),
                                value: String::new(),
                                quoted: false,
                            }
                        }
                    }
                    Some((name, value)) if is_field_name(name) => {
                        TokenKind::Field {
                            name: name.to_string(),
                            value: value.to_string(),
                            quoted: false,
                        }
                    }
                    _ => match word {
                        "AND" => TokenKind::And,
                        "OR" => TokenKind::Or,
                        "NOT" => TokenKind::Not,
                        "*" => TokenKind::Star,
                        _ => TokenKind::Word(word.to_string()),
                    },
                }
            }
        };
        tokens.push(Token {
            kind,
            raw: input[byte_at(start)..byte_at(i)].to_string(),
        });
    }

    Ok(tokens)
}

/// Parses query strings against a fixed schema.
#[derive(Debug, Clone, Copy)]
pub struct QueryParser<'a> {
    schema: &'a TermSchema,
}

impl<'a> QueryParser<'a> {
    pub fn new(schema: &'a TermSchema) -> Self {
        Self { schema }
    }

    pub fn parse(&self, input: &str) -> Result<Query> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::syntax(input, "empty query"));
        }
        if trimmed == "*" || trimmed == "+" {
            return Ok(Query::MatchAll);
        }

        let tokens = lex(trimmed)?;
        let mut parser = Parser {
            schema: self.schema,
            tokens,
            pos: 0,
        };
        let query = parser.or_expr()?;
        if let Some(token) = parser.peek() {
            let reason = if token.kind == TokenKind::RParen {
                "unbalanced parenthesis"
            } else {
                "unexpected token"
            };
            return Err(Error::syntax(&token.raw, reason));
        }
        tracing::debug!(input = trimmed, parsed = %query, "parsed query");
        Ok(query)
    }
}

struct Parser<'a> {
    schema: &'a TermSchema,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn starts_unary(token: &Token) -> bool {
        !matches!(
            token.kind,
            TokenKind::RParen | TokenKind::Or | TokenKind::And
        )
    }

    /// Error for an operator with nothing (usable) after it.
    fn dangling(&self, op: &Token) -> Error {
        Error::syntax(&op.raw, "dangling operator")
    }

    fn or_expr(&mut self) -> Result<Query> {
        let mut alternatives = vec![self.and_expr()?];
        while let Some(token) = self.peek() {
            if token.kind != TokenKind::Or {
                break;
            }
            let op = token.clone();
            self.pos += 1;
            if !self.peek().is_some_and(Self::starts_unary) {
                return Err(self.dangling(&op));
            }
            alternatives.push(self.and_expr()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Query::Or(alternatives)
        })
    }

    fn and_expr(&mut self) -> Result<Query> {
        let mut clauses = Vec::new();
        loop {
            match self.peek() {
                Some(token) if token.kind == TokenKind::And => {
                    let op = token.clone();
                    self.pos += 1;
                    if clauses.is_empty()
                        || !self.peek().is_some_and(Self::starts_unary)
                    {
                        return Err(self.dangling(&op));
                    }
                }
                Some(token) if Self::starts_unary(token) => {
                    clauses.push(self.unary()?);
                }
                Some(token) => {
                    if clauses.is_empty() {
                        return Err(self.dangling(&token.clone()));
                    }
                    break;
                }
                None => break,
            }
        }
        if clauses.is_empty() {
            return Err(Error::syntax("", "expected a search term"));
        }
        Ok(group_filters(clauses))
    }

    fn unary(&mut self) -> Result<Query> {
        if let Some(token) = self.peek()
            && token.kind == TokenKind::Not
        {
            let op = token.clone();
            self.pos += 1;
            if !self.peek().is_some_and(Self::starts_unary) {
                return Err(self.dangling(&op));
            }
            return Ok(Query::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Query> {
        let Some(token) = self.next() else {
            return Err(Error::syntax("", "expected a search term"));
        };
        match token.kind {
            TokenKind::LParen => {
                if self
                    .peek()
                    .is_some_and(|t| t.kind == TokenKind::RParen)
                {
                    return Err(Error::syntax("()", "empty group"));
                }
                let inner = self.or_expr()?;
                match self.next() {
                    Some(t) if t.kind == TokenKind::RParen => Ok(inner),
                    _ => Err(Error::syntax(&token.raw, "unbalanced parenthesis")),
                }
            }
            TokenKind::Star => Ok(Query::MatchAll),
            TokenKind::Word(text) => Ok(Query::Text {
                field: TextField::Any,
                text,
                phrase: false,
            }),
            TokenKind::Quoted(text) => Ok(Query::Text {
                field: TextField::Any,
                text,
                phrase: true,
            }),
            TokenKind::Field {
                name,
                value,
                quoted,
            } => self.field(&token.raw, &name, value, quoted),
            TokenKind::RParen => {
                Err(Error::syntax(&token.raw, "unbalanced parenthesis"))
            }
            TokenKind::And | TokenKind::Or | TokenKind::Not => {
                Err(Error::syntax(&token.raw, "dangling operator"))
            }
        }
    }

    fn field(
        &self,
        raw: &str,
        name: &str,
        value: String,
        quoted: bool,
    ) -> Result<Query> {
        let Some(def) = self.schema.resolve_queryable(name) else {
            // Not a field: the whole thing is free text.
            return Ok(Query::Text {
                field: TextField::Any,
                text: if quoted {
                    format!("{name} {value}")
                } else {
                    raw.to_string()
                },
                phrase: quoted,
            });
        };

        if value.trim().is_empty() {
            return Err(Error::syntax(raw, "empty field value"));
        }

        if let Some(slot) = def.facet
            && !quoted
            && value.contains("..")
        {
            return parse_range(raw, slot, &value);
        }

        match def.kind {
            FieldKind::ProbabilisticText => Ok(Query::Text {
                field: if def.prefix == prefix::AUTHOR {
                    TextField::Author
                } else {
                    TextField::Title
                },
                text: value,
                phrase: quoted,
            }),
            FieldKind::NumericFacet => {
                let slot = def.facet.unwrap_or(FacetSlot::YEAR);
                let n = parse_bound(raw, &value)?;
                Ok(Query::Range {
                    slot,
                    lo: Some(n),
                    hi: Some(n),
                })
            }
            FieldKind::ExclusiveBoolean
            | FieldKind::MultiBoolean
            | FieldKind::InternalBoolean => {
                Ok(Query::Filter(Term::new(def.prefix.clone(), value)))
            }
        }
    }
}

fn parse_bound(raw: &str, text: &str) -> Result<u64> {
    text.trim()
        .parse()
        .map_err(|_| Error::syntax(raw, format!("'{text}' is not a number")))
}

fn parse_range(raw: &str, slot: FacetSlot, value: &str) -> Result<Query> {
    let (lo, hi) = value
        .split_once("..")
        .ok_or_else(|| Error::syntax(raw, "expected lo..hi"))?;
    let lo = (!lo.is_empty()).then(|| parse_bound(raw, lo)).transpose()?;
    let hi = (!hi.is_empty()).then(|| parse_bound(raw, hi)).transpose()?;
    match (lo, hi) {
        (None, None) => Err(Error::syntax(raw, "range needs at least one bound")),
        (Some(lo), Some(hi)) if lo > hi => {
            Err(Error::syntax(raw, "range lower bound exceeds upper bound"))
        }
        _ => Ok(Query::Range { slot, lo, hi }),
    }
}

/// Merge exclusive filters that share a prefix into one alternative group.
/// Multi-valued filters stay separate, so each must match.
fn group_filters(clauses: Vec<Query>) -> Query {
    let mut exclusive: BTreeMap<String, Vec<Term>> = BTreeMap::new();
    let mut order: Vec<Option<String>> = Vec::new();
    let mut rest = Vec::new();

    for clause in clauses {
        match clause {
            Query::Filter(term) if is_exclusive_prefix(term.prefix()) => {
                let prefix = term.prefix().to_string();
                let group = exclusive.entry(prefix.clone()).or_default();
                if group.is_empty() {
                    order.push(Some(prefix));
                }
                if !group.contains(&term) {
                    group.push(term);
                }
            }
            other => {
                order.push(None);
                rest.push(other);
            }
        }
    }

    let mut rest = rest.into_iter();
    let mut merged: Vec<Query> = order
        .into_iter()
        .filter_map(|slot| match slot {
            Some(prefix) => {
                let mut terms = exclusive.remove(&prefix)?;
                Some(if terms.len() == 1 {
                    Query::Filter(terms.remove(0))
                } else {
                    Query::AnyOf(terms)
                })
            }
            None => rest.next(),
        })
        .collect();

    if merged.len() == 1 {
        merged.remove(0)
    } else {
        Query::And(merged)
    }
}

/// Tags are the only multi-valued field; every other queryable boolean
/// prefix is exclusive.
fn is_exclusive_prefix(term_prefix: &str) -> bool {
    term_prefix != prefix::TAG
}

/// Turns a parsed [`Query`] into a tantivy query against one index.
pub struct QueryCompiler<'a> {
    index: &'a SearchIndex,
    weighting: Weighting,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(index: &'a SearchIndex, weighting: Weighting) -> Self {
        Self { index, weighting }
    }

    pub fn compile(&self, query: &Query) -> Result<Box<dyn TantivyQuery>> {
        let f = self.index.fields();
        Ok(match query {
            Query::MatchAll => filter(Box::new(AllQuery)),
            Query::Text { field, text, .. } => {
                let fields: &[(Field, Score)] = match field {
                    TextField::Any => {
                        &[(f.body, 1.0), (f.title, TITLE_BOOST), (f.author, 1.0)]
                    }
                    TextField::Title => &[(f.title, 1.0)],
                    TextField::Author => &[(f.author, 1.0)],
                };
                self.text(fields, text)?
            }
            Query::Filter(term) => filter(self.term_query(term)),
            Query::AnyOf(terms) => filter(Box::new(BooleanQuery::new(
                terms
                    .iter()
                    .map(|t| (Occur::Should, self.term_query(t)))
                    .collect(),
            ))),
            // Slot 0 (year) is the only numeric slot.
            Query::Range { lo, hi, .. } => {
                let bound = |v: &Option<u64>| match v {
                    Some(v) => {
                        Bound::Included(tantivy::Term::from_field_u64(f.year, *v))
                    }
                    None => Bound::Unbounded,
                };
                filter(Box::new(RangeQuery::new(bound(lo), bound(hi))))
            }
            Query::And(clauses) => {
                let mut occurs = Vec::with_capacity(clauses.len() + 1);
                for clause in clauses {
                    match clause {
                        Query::Not(inner) => {
                            occurs.push((Occur::MustNot, self.compile(inner)?))
                        }
                        other => occurs.push((Occur::Must, self.compile(other)?)),
                    }
                }
                if occurs.iter().all(|(occur, _)| *occur == Occur::MustNot) {
                    occurs.push((Occur::Must, filter(Box::new(AllQuery))));
                }
                Box::new(BooleanQuery::new(occurs))
            }
            Query::Or(alternatives) => Box::new(BooleanQuery::new(
                alternatives
                    .iter()
                    .map(|q| Ok((Occur::Should, self.compile(q)?)))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Query::Not(inner) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, filter(Box::new(AllQuery))),
                (Occur::MustNot, self.compile(inner)?),
            ])),
        })
    }

    fn term_query(&self, term: &Term) -> Box<dyn TantivyQuery> {
        let term = tantivy::Term::from_field_text(
            self.index.fields().terms,
            &term.to_string(),
        );
        Box::new(TermQuery::new(term, IndexRecordOption::Basic))
    }

    /// Free text over one or more fields. Text that analyzes to several
    /// words (`foo-bar`, a quoted string) becomes a phrase.
    fn text(
        &self,
        fields: &[(Field, Score)],
        text: &str,
    ) -> Result<Box<dyn TantivyQuery>> {
        let tokens = self.index.analyze(text)?;
        if tokens.is_empty() {
            return Ok(Box::new(EmptyQuery));
        }

        let per_field = |field: Field| -> Box<dyn TantivyQuery> {
            let terms: Vec<tantivy::Term> = tokens
                .iter()
                .map(|t| tantivy::Term::from_field_text(field, t))
                .collect();
            if terms.len() == 1 {
                Box::new(TermQuery::new(
                    terms[0].clone(),
                    IndexRecordOption::WithFreqs,
                ))
            } else {
                Box::new(PhraseQuery::new(terms))
            }
        };

        let mut alternatives: Vec<(Occur, Box<dyn TantivyQuery>)> = fields
            .iter()
            .map(|&(field, boost)| {
                let q = per_field(field);
                let q: Box<dyn TantivyQuery> = if boost == 1.0 {
                    q
                } else {
                    Box::new(BoostQuery::new(q, boost))
                };
                (Occur::Should, q)
            })
            .collect();

        let query: Box<dyn TantivyQuery> = if alternatives.len() == 1 {
            alternatives.remove(0).1
        } else {
            Box::new(BooleanQuery::new(alternatives))
        };

        Ok(self.weigh(query))
    }

    /// OR over already analyzed `tokens` in one text field. Under
    /// [`Weighting::Coordinate`] a document scores the number of tokens it
    /// contains.
    pub fn any_token(
        &self,
        field: Field,
        tokens: &[String],
    ) -> Box<dyn TantivyQuery> {
        if tokens.is_empty() {
            return Box::new(EmptyQuery);
        }
        Box::new(BooleanQuery::new(
            tokens
                .iter()
                .map(|token| {
                    let term = tantivy::Term::from_field_text(field, token);
                    let query: Box<dyn TantivyQuery> = Box::new(
                        TermQuery::new(term, IndexRecordOption::WithFreqs),
                    );
                    (Occur::Should, self.weigh(query))
                })
                .collect(),
        ))
    }

    fn weigh(&self, query: Box<dyn TantivyQuery>) -> Box<dyn TantivyQuery> {
        match self.weighting {
            Weighting::Bm25 => query,
            Weighting::Coordinate => Box::new(ConstScoreQuery::new(query, 1.0)),
        }
    }
}

/// A pure filter: matches like `query` but contributes no weight.
fn filter(query: Box<dyn TantivyQuery>) -> Box<dyn TantivyQuery> {
    Box::new(ConstScoreQuery::new(query, 0.0))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{schema::prefix, source::SourceCatalog};

    fn schema() -> TermSchema {
        TermSchema::build(&SourceCatalog::builtin())
    }

    fn parse(input: &str) -> Result<Query> {
        QueryParser::new(&schema()).parse(input)
    }

    fn text(s: &str) -> Query {
        Query::Text {
            field: TextField::Any,
            text: s.into(),
            phrase: false,
        }
    }

    fn filter_term(p: &str, v: &str) -> Query {
        Query::Filter(Term::new(p, v))
    }

    fn assert_syntax_error(input: &str) {
        match parse(input) {
            Err(Error::QuerySyntax { .. }) => {}
            other => panic!("expected syntax error for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn match_all_shortcuts() {
        assert_eq!(parse("*").unwrap(), Query::MatchAll);
        assert_eq!(parse("  +  ").unwrap(), Query::MatchAll);
    }

    #[test]
    fn implicit_and_of_words() {
        assert_eq!(
            parse("quantum gravity").unwrap(),
            Query::And(vec![text("quantum"), text("gravity")])
        );
        assert_eq!(
            parse("quantum AND gravity").unwrap(),
            parse("quantum gravity").unwrap()
        );
    }

    #[test]
    fn quoted_phrase() {
        assert_eq!(
            parse("\"black hole\"").unwrap(),
            Query::Text {
                field: TextField::Any,
                text: "black hole".into(),
                phrase: true,
            }
        );
    }

    #[test]
    fn or_binds_looser_than_and() {
        assert_eq!(
            parse("a b OR c").unwrap(),
            Query::Or(vec![Query::And(vec![text("a"), text("b")]), text("c")])
        );
        assert_eq!(
            parse("a (b OR c)").unwrap(),
            Query::And(vec![text("a"), Query::Or(vec![text("b"), text("c")])])
        );
    }

    #[test]
    fn negation() {
        assert_eq!(
            parse("a -tag:old").unwrap(),
            Query::And(vec![
                text("a"),
                Query::Not(Box::new(filter_term(prefix::TAG, "old"))),
            ])
        );
        assert_eq!(parse("NOT a").unwrap(), Query::Not(Box::new(text("a"))));
    }

    #[test]
    fn tags_stay_conjunctive() {
        assert_eq!(
            parse("tag:a tag:b").unwrap(),
            Query::And(vec![
                filter_term(prefix::TAG, "a"),
                filter_term(prefix::TAG, "b"),
            ])
        );
    }

    #[test]
    fn exclusive_filters_merge_into_alternatives() {
        assert_eq!(
            parse("source:arxiv source:isbn").unwrap(),
            Query::AnyOf(vec![
                Term::new(prefix::SOURCE, "arxiv"),
                Term::new(prefix::SOURCE, "isbn"),
            ])
        );
        assert_eq!(
            parse("year:2001 y:2002 tag:x").unwrap(),
            Query::And(vec![
                Query::AnyOf(vec![
                    Term::new(prefix::YEAR, "2001"),
                    Term::new(prefix::YEAR, "2002"),
                ]),
                filter_term(prefix::TAG, "x"),
            ])
        );
    }

    #[test]
    fn source_prefixes_resolve() {
        assert_eq!(
            parse("arxiv:1402.1234").unwrap(),
            filter_term("XARXIV|", "1402.1234")
        );
        assert_eq!(parse("key:smith2001").unwrap(), filter_term("XBIB|", "smith2001"));
        assert_eq!(parse("id:3").unwrap(), filter_term("Q", "3"));
    }

    #[test]
    fn text_fields() {
        assert_eq!(
            parse("title:\"grand theory\"").unwrap(),
            Query::Text {
                field: TextField::Title,
                text: "grand theory".into(),
                phrase: true,
            }
        );
        assert_eq!(
            parse("a:smith").unwrap(),
            Query::Text {
                field: TextField::Author,
                text: "smith".into(),
                phrase: false,
            }
        );
    }

    #[test]
    fn unknown_and_internal_fields_are_free_text() {
        assert_eq!(parse("foo:bar").unwrap(), text("foo:bar"));
        assert_eq!(parse("file:x.pdf").unwrap(), text("file:x.pdf"));
        assert_eq!(parse("http://x").unwrap(), text("http://x"));
    }

    #[test]
    fn year_ranges() {
        let range = |lo, hi| Query::Range {
            slot: FacetSlot::YEAR,
            lo,
            hi,
        };
        assert_eq!(parse("year:2000..2010").unwrap(), range(Some(2000), Some(2010)));
        assert_eq!(parse("y:..2000").unwrap(), range(None, Some(2000)));
        assert_eq!(parse("year:2010..").unwrap(), range(Some(2010), None));
    }

    #[test]
    fn syntax_errors() {
        for input in [
            "",
            "   ",
            "(a b",
            "a b)",
            "()",
            "\"open quote",
            "title:\"open",
            "a OR",
            "OR a",
            "a AND",
            "AND a",
            "NOT",
            "a -",
            "tag:",
            "year:..",
            "year:abc..2000",
            "year:2010..2000",
        ] {
            assert_syntax_error(input);
        }
    }

    #[test]
    fn syntax_error_names_fragment() {
        match parse("year:2010..2000") {
            Err(Error::QuerySyntax { fragment, .. }) => {
                assert_eq!(fragment, "year:2010..2000")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn display_is_readable() {
        let q = parse("a tag:x (b OR year:2000..)").unwrap();
        assert_eq!(q.to_string(), "(a AND [Kx] AND (b OR slot0:2000..))");
    }

    proptest! {
        #[test]
        fn parse_never_panics(input in "\\PC{0,40}") {
            let _ = parse(&input);
        }

        #[test]
        fn parse_never_panics_on_operator_soup(
            input in "[ a-c()\"*+:.\\-]{0,12}( OR | AND | NOT )?[ a-c()\"*:.0-9]{0,12}",
        ) {
            let _ = parse(&input);
        }
    }
}
