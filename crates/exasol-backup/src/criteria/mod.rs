//! Wildcard selection of schema objects.
//!
//! A pattern string is a comma separated list of `schema[.object]` globs where
//! `*` matches any substring and matching is case-insensitive. The same
//! pattern compiles to two equivalent forms:
//!
//! - a SQL predicate used to scope catalog queries server-side
//!   ([`Criteria::sql_predicate`]), and
//! - a local matcher used when diffing an existing backup tree
//!   ([`Criteria::matches`]).
//!
//! Catalog queries alias their schema column as `s` and their object column
//! as `o`; the predicate refers to them through Exasol's `local.` prefix.

use regex::{Regex, RegexBuilder};

use crate::error::{BackupError, Result};

/// Pattern used when no match pattern is configured.
pub const MATCH_ALL: &str = "*.*";

/// One `schema.object` glob.
#[derive(Debug, Clone)]
struct Pattern {
    schema_glob: String,
    object_glob: String,
    schema_re: Regex,
    object_re: Regex,
}

impl Pattern {
    fn parse(entry: &str) -> Result<Self> {
        let (schema_glob, object_glob) = match entry.split_once('.') {
            Some((schema, object)) => (schema.trim(), object.trim()),
            None => (entry.trim(), "*"),
        };
        let object_glob = if object_glob.is_empty() { "*" } else { object_glob };

        Ok(Self {
            schema_re: compile_glob(schema_glob, entry)?,
            object_re: compile_glob(object_glob, entry)?,
            schema_glob: schema_glob.to_string(),
            object_glob: object_glob.to_string(),
        })
    }

    /// Empty `object` only tests schema membership.
    fn matches(&self, schema: &str, object: &str) -> bool {
        self.schema_re.is_match(schema) && (object.is_empty() || self.object_re.is_match(object))
    }

    fn schema_sql_clause(&self) -> String {
        format!(
            "UPPER(local.s) LIKE UPPER('{}')",
            glob_to_like(&self.schema_glob)
        )
    }

    fn sql_clause(&self) -> String {
        format!(
            "(UPPER(local.s) LIKE UPPER('{}') AND UPPER(local.o) LIKE UPPER('{}'))",
            glob_to_like(&self.schema_glob),
            glob_to_like(&self.object_glob),
        )
    }
}

/// Anchored, case-insensitive regex for a glob. Only `*` is special.
fn compile_glob(glob: &str, entry: &str) -> Result<Regex> {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");

    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
        .map_err(|e| BackupError::Criteria {
            pattern: entry.to_string(),
            message: e.to_string(),
        })
}

fn glob_to_like(glob: &str) -> String {
    glob.replace('\'', "''").replace('*', "%")
}

fn parse_patterns(patterns: &str) -> Result<Vec<Pattern>> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Pattern::parse)
        .collect()
}

/// Match/skip selection shared by every schema object type.
///
/// Immutable once built: both pattern lists are compiled up front.
#[derive(Debug, Clone)]
pub struct Criteria {
    match_str: String,
    skip_str: String,
    matches: Vec<Pattern>,
    skips: Vec<Pattern>,
}

impl Criteria {
    /// Compile a match pattern string and an optional skip pattern string.
    ///
    /// An empty match is rejected: callers default it to [`MATCH_ALL`].
    pub fn new(match_patterns: &str, skip_patterns: &str) -> Result<Self> {
        let matches = parse_patterns(match_patterns)?;
        if matches.is_empty() {
            return Err(BackupError::Config(
                "match pattern must not be empty (use '*.*' to select everything)".into(),
            ));
        }

        Ok(Self {
            match_str: match_patterns.trim().to_string(),
            skip_str: skip_patterns.trim().to_string(),
            matches,
            skips: parse_patterns(skip_patterns)?,
        })
    }

    /// The match pattern string this was built from.
    pub fn match_patterns(&self) -> &str {
        &self.match_str
    }

    /// The skip pattern string this was built from.
    pub fn skip_patterns(&self) -> &str {
        &self.skip_str
    }

    /// SQL predicate over the `local.s` / `local.o` aliases.
    pub fn sql_predicate(&self) -> String {
        let included = join_clauses(&self.matches);
        if self.skips.is_empty() {
            included
        } else {
            format!("({}) AND NOT ({})", included, join_clauses(&self.skips))
        }
    }

    /// SQL predicate over `local.s` alone, selecting whole schemas.
    ///
    /// Agrees with [`Criteria::matches`] called with an empty object.
    pub fn schema_sql_predicate(&self) -> String {
        let included = self
            .matches
            .iter()
            .map(Pattern::schema_sql_clause)
            .collect::<Vec<_>>()
            .join(" OR ");
        if self.skips.is_empty() {
            return included;
        }
        let skipped = self
            .skips
            .iter()
            .map(Pattern::schema_sql_clause)
            .collect::<Vec<_>>()
            .join(" OR ");
        format!("({}) AND NOT ({})", included, skipped)
    }

    /// Whether `schema.object` is selected.
    ///
    /// An empty `object` compares only the schema globs, skips included,
    /// so a skip like `prod.secret` takes all of `prod` out of scope.
    pub fn matches(&self, schema: &str, object: &str) -> bool {
        self.matches.iter().any(|p| p.matches(schema, object))
            && !self.skips.iter().any(|p| p.matches(schema, object))
    }
}

fn join_clauses(patterns: &[Pattern]) -> String {
    patterns
        .iter()
        .map(Pattern::sql_clause)
        .collect::<Vec<_>>()
        .join(" OR ")
}
