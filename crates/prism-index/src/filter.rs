//! Filter expression grammar.
//!
//! Expressions are `&`-joined clauses with `=` / `!=` comparators over a
//! closed field taxonomy. Values may contain `*` wildcards, which compile
//! to anchored case-insensitive regexes; plain values compare
//! case-insensitively. `name` clauses are cheap (answerable from the
//! index); everything else requires package metadata.

use std::fmt;

use regex::Regex;
use regex::RegexBuilder;

use crate::error::FilterError;
use crate::error::Result;

/// The closed set of filterable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    /// Package name; answerable from the name index.
    Name,
    /// Free-text description.
    Description,
    /// Author name.
    Author,
    /// License expression.
    License,
    /// Homepage URL.
    Homepage,
    /// Keyword list.
    Keywords,
    /// Default version identifier.
    Version,
    /// Repository URL.
    Repository,
}

impl Field {
    /// Parse a field name.
    pub fn parse(input: &str) -> Result<Self> {
        match input {
            "name" => Ok(Field::Name),
            "description" => Ok(Field::Description),
            "author" => Ok(Field::Author),
            "license" => Ok(Field::License),
            "homepage" => Ok(Field::Homepage),
            "keywords" => Ok(Field::Keywords),
            "version" => Ok(Field::Version),
            "repository" => Ok(Field::Repository),
            other => Err(FilterError::UnknownField { field: other.to_string() }),
        }
    }

    /// Canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Description => "description",
            Field::Author => "author",
            Field::License => "license",
            Field::Homepage => "homepage",
            Field::Keywords => "keywords",
            Field::Version => "version",
            Field::Repository => "repository",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clause comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Op {
    /// Value must match.
    Eq,
    /// Value must not match.
    Ne,
}

/// Compiled match pattern for one clause value.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Plain value, compared case-insensitively.
    Literal(String),
    /// Wildcard value, compiled to an anchored case-insensitive regex.
    Wildcard(Regex),
}

impl Pattern {
    fn compile(value: &str) -> Result<Self> {
        if !value.contains('*') {
            return Ok(Pattern::Literal(value.to_string()));
        }
        let mut pattern = String::with_capacity(value.len() + 8);
        pattern.push('^');
        for (i, segment) in value.split('*').enumerate() {
            if i > 0 {
                pattern.push_str(".*");
            }
            pattern.push_str(&regex::escape(segment));
        }
        pattern.push('$');
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| FilterError::Malformed { detail: e.to_string() })?;
        Ok(Pattern::Wildcard(regex))
    }

    /// Whether a single value satisfies the pattern.
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Pattern::Literal(literal) => literal.eq_ignore_ascii_case(value),
            Pattern::Wildcard(regex) => regex.is_match(value),
        }
    }
}

/// One parsed clause.
#[derive(Debug, Clone)]
pub struct Clause {
    /// The field the clause constrains.
    pub field: Field,
    /// Comparator.
    pub op: Op,
    /// Compiled value pattern.
    pub pattern: Pattern,
    /// The raw value, kept for normalization and prefix extraction.
    pub raw_value: String,
}

impl Clause {
    /// Whether a set of extracted field values satisfies this clause.
    ///
    /// `Eq` requires some value to match; `Ne` requires that none do.
    pub fn matches_values<'a, I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let any = values.into_iter().any(|v| self.pattern.is_match(v));
        match self.op {
            Op::Eq => any,
            Op::Ne => !any,
        }
    }

    /// Whether a single value satisfies this clause.
    pub fn matches(&self, value: &str) -> bool {
        self.matches_values([value])
    }

    /// Literal prefix usable for index range scans (`Eq` clauses only).
    pub fn index_prefix(&self) -> &str {
        match self.op {
            Op::Eq => self.raw_value.split('*').next().unwrap_or(""),
            Op::Ne => "",
        }
    }

    fn normalized(&self) -> String {
        let op = match self.op {
            Op::Eq => "=",
            Op::Ne => "!=",
        };
        format!("{}{}{}", self.field, op, self.raw_value)
    }
}

/// A parsed filter expression: the conjunction of its clauses.
#[derive(Debug, Clone)]
pub struct FilterExpr {
    clauses: Vec<Clause>,
}

impl FilterExpr {
    /// Parse `field=value&field!=value&...`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut clauses = Vec::new();
        for raw in input.split('&') {
            if raw.is_empty() {
                return Err(FilterError::Malformed { detail: "empty clause".to_string() });
            }
            let (field_str, op, value) = if let Some((f, v)) = raw.split_once("!=") {
                (f, Op::Ne, v)
            } else if let Some((f, v)) = raw.split_once('=') {
                (f, Op::Eq, v)
            } else {
                return Err(FilterError::Malformed {
                    detail: format!("clause '{raw}' has no comparator"),
                });
            };

            let field = Field::parse(field_str)?;
            clauses.push(Clause {
                field,
                op,
                pattern: Pattern::compile(value)?,
                raw_value: value.to_string(),
            });
        }

        if clauses.is_empty() {
            return Err(FilterError::Malformed { detail: "empty expression".to_string() });
        }
        Ok(Self { clauses })
    }

    /// All clauses.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Clauses answerable from the name index.
    pub fn name_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.field == Field::Name)
    }

    /// Clauses requiring package metadata.
    pub fn metadata_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.field != Field::Name)
    }

    /// Whether step 2 (metadata enrichment) is needed at all.
    pub fn needs_metadata(&self) -> bool {
        self.metadata_clauses().next().is_some()
    }

    /// Whether a name satisfies every name clause.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name_clauses().all(|c| c.matches(name))
    }

    /// The primary index prefix: the first `name=` clause's literal prefix.
    pub fn primary_prefix(&self) -> &str {
        self.name_clauses()
            .map(Clause::index_prefix)
            .find(|p| !p.is_empty())
            .unwrap_or("")
    }

    /// The first `name=` clause's raw value, for upstream search fallback.
    pub fn search_term(&self) -> Option<&str> {
        self.name_clauses()
            .find(|c| c.op == Op::Eq)
            .map(|c| c.raw_value.trim_matches('*'))
    }

    /// Canonical form used as a cache key: clauses sorted and rejoined.
    pub fn normalized(&self) -> String {
        let mut parts: Vec<String> = self.clauses.iter().map(Clause::normalized).collect();
        parts.sort_unstable();
        parts.join("&")
    }
}
