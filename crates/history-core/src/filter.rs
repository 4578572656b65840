//! The attribute-filter compiler.
//!
//! Clients describe a search as loosely-typed text in one of two syntaxes:
//!
//! - a conjunction string, `version_type == change* && duration <= 9`
//! - query parameters whose values are comma lists, `duration=<=9,>7`
//!
//! Both normalise into a [`FilterSet`]: field name → one or more
//! `(operator, value)` clauses. [`FilterSet::render`] turns a set into a
//! conjunctive `WHERE` clause with bound parameters for one
//! [`RecordKind`]. Only allow-listed column names and fixed operator tokens
//! are ever written into the clause text.

use std::collections::BTreeMap;

use crate::{
  Error, Result,
  kind::{ColumnType, RecordKind},
  record::{decode_timestamp, encode_timestamp},
};

// ─── Operators ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
  Eq,
  Like,
  Lt,
  Le,
  Gt,
  Ge,
}

/// Trial order matters: two-character tokens before their one-character
/// prefixes.
const COMPARATORS: [(&str, Operator); 4] = [
  ("<=", Operator::Le),
  (">=", Operator::Ge),
  ("<", Operator::Lt),
  (">", Operator::Gt),
];

impl Operator {
  pub fn as_sql(self) -> &'static str {
    match self {
      Self::Eq => "=",
      Self::Like => "LIKE",
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Gt => ">",
      Self::Ge => ">=",
    }
  }
}

// ─── Clauses ─────────────────────────────────────────────────────────────────

/// Escape character for `LIKE` patterns built by [`Clause::equality`].
const LIKE_ESCAPE: char = '\\';

/// One predicate on a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
  pub operator: Operator,
  pub value:    String,
}

impl Clause {
  pub fn new(operator: Operator, value: impl Into<String>) -> Self {
    Self { operator, value: value.into() }
  }

  /// Plain equality, or a `LIKE` when the value carries `*` wildcards.
  /// `*` is the only wildcard; `%`, `_` and `\` match themselves.
  pub fn equality(value: &str) -> Self {
    if value.contains('*') {
      let mut pattern = String::with_capacity(value.len());
      for c in value.chars() {
        match c {
          '*' => pattern.push('%'),
          '%' | '_' | LIKE_ESCAPE => {
            pattern.push(LIKE_ESCAPE);
            pattern.push(c);
          }
          c => pattern.push(c),
        }
      }
      Self::new(Operator::Like, pattern)
    } else {
      Self::new(Operator::Eq, value)
    }
  }
}

// ─── FilterSet ───────────────────────────────────────────────────────────────

/// A conjunction of clauses keyed by field name. Every clause of every
/// field must hold; there is no OR and no negation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
  fields: BTreeMap<String, Vec<Clause>>,
}

impl FilterSet {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, field: impl Into<String>, clause: Clause) {
    self.fields.entry(field.into()).or_default().push(clause);
  }

  /// Builder-style [`Self::push`].
  pub fn with(mut self, field: impl Into<String>, clause: Clause) -> Self {
    self.push(field, clause);
    self
  }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  pub fn clauses(&self, field: &str) -> &[Clause] {
    self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
  }

  /// Parse the conjunction-string syntax: clauses joined by `&&`, each
  /// either `field==value` or `field<op>value`.
  pub fn parse_conjunction(input: &str) -> Result<Self> {
    let mut set = Self::new();
    for raw in input.split("&&") {
      let raw = raw.trim();
      if raw.is_empty() {
        continue;
      }

      let (field, clause) = if let Some((field, value)) = raw.split_once("==")
      {
        (field, Clause::equality(value.trim()))
      } else {
        let (field, operator, value) = COMPARATORS
          .iter()
          .find_map(|(token, op)| {
            raw.split_once(token).map(|(f, v)| (f, *op, v))
          })
          .ok_or_else(|| {
            Error::MalformedFilter(format!("no operator in clause {raw:?}"))
          })?;
        (field, comparator_clause(raw, operator, value)?)
      };

      set.push(field_name(raw, field)?, clause);
    }
    Ok(set)
  }

  /// Parse the comma-list syntax used by query parameters. Each comma
  /// segment of a value becomes its own clause on that field, so
  /// `duration=<=9,>7` expresses a range.
  pub fn from_params<I, K, V>(params: I) -> Result<Self>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let mut set = Self::new();
    for (key, raw) in params {
      let key = key.as_ref();
      let field = field_name(key, key)?;
      for segment in raw.as_ref().split(',') {
        let segment = segment.trim();
        let comparator = COMPARATORS.iter().find_map(|(token, op)| {
          segment.strip_prefix(token).map(|rest| (*op, rest))
        });
        let clause = match comparator {
          Some((operator, value)) => {
            comparator_clause(segment, operator, value)?
          }
          None => Clause::equality(segment),
        };
        set.push(field.clone(), clause);
      }
    }
    Ok(set)
  }

  /// True when every field is a column of `kind` and there is at least one.
  pub fn applies_to(&self, kind: RecordKind) -> bool {
    !self.is_empty() && self.fields().all(|f| kind.column(f).is_some())
  }

  /// Render the set against `kind`'s columns.
  ///
  /// Returns `Ok(None)` when the set does not apply to `kind` (empty, or a
  /// field outside its column set). Callers must treat that as "no
  /// results", never as "no filter".
  pub fn render(&self, kind: RecordKind) -> Result<Option<CompiledFilter>> {
    if !self.applies_to(kind) {
      return Ok(None);
    }

    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for (field, clauses) in &self.fields {
      // applies_to guarantees the lookup; the static name is what we emit.
      let Some(column) = kind.column(field) else {
        return Ok(None);
      };
      for clause in clauses {
        let n = params.len() + 1;
        if clause.operator == Operator::Like {
          conditions.push(format!(
            "CAST({} AS TEXT) LIKE ?{n} ESCAPE '{LIKE_ESCAPE}'",
            column.name
          ));
          params.push(FilterParam::Text(clause.value.clone()));
        } else {
          conditions.push(format!(
            "{} {} ?{n}",
            column.name,
            clause.operator.as_sql()
          ));
          params.push(typed_param(field, column.ty, &clause.value)?);
        }
      }
    }

    Ok(Some(CompiledFilter {
      where_clause: conditions.join(" AND "),
      params,
    }))
  }
}

fn field_name(raw: &str, field: &str) -> Result<String> {
  let field = field.trim();
  if field.is_empty() {
    return Err(Error::MalformedFilter(format!(
      "missing field name in {raw:?}"
    )));
  }
  Ok(field.to_owned())
}

fn comparator_clause(
  raw: &str,
  operator: Operator,
  value: &str,
) -> Result<Clause> {
  let value = value.trim();
  if value.is_empty() {
    return Err(Error::MalformedFilter(format!(
      "comparator without a value in {raw:?}"
    )));
  }
  Ok(Clause::new(operator, value))
}

fn typed_param(field: &str, ty: ColumnType, value: &str) -> Result<FilterParam> {
  match ty {
    ColumnType::Integer => value.parse().map(FilterParam::Integer).map_err(|_| {
      Error::MalformedFilter(format!(
        "{field} expects an integer, got {value:?}"
      ))
    }),
    ColumnType::Timestamp => Ok(FilterParam::Text(
      decode_timestamp(value)
        .map(encode_timestamp)
        .unwrap_or_else(|| value.to_owned()),
    )),
    ColumnType::Text | ColumnType::Json => {
      Ok(FilterParam::Text(value.to_owned()))
    }
  }
}

// ─── Compiled output ─────────────────────────────────────────────────────────

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterParam {
  Integer(i64),
  Text(String),
}

/// A conjunctive `WHERE` body (without the keyword) using `?1`, `?2`, …
/// placeholders, and the values to bind to them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
  pub where_clause: String,
  pub params:       Vec<FilterParam>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn conjunction_equality_and_wildcard() {
    let set =
      FilterSet::parse_conjunction("version_type == change* && result==ok")
        .unwrap();
    assert_eq!(set.clauses("version_type"), &[Clause::new(
      Operator::Like,
      "change%"
    )]);
    assert_eq!(set.clauses("result"), &[Clause::new(Operator::Eq, "ok")]);
  }

  #[test]
  fn conjunction_prefers_two_character_comparators() {
    let set = FilterSet::parse_conjunction("duration <= 9 && duration>7")
      .unwrap();
    assert_eq!(set.clauses("duration"), &[
      Clause::new(Operator::Le, "9"),
      Clause::new(Operator::Gt, "7"),
    ]);
  }

  #[test]
  fn conjunction_skips_empty_clauses() {
    let set = FilterSet::parse_conjunction(" && build_id==3 && ").unwrap();
    assert_eq!(set.fields().collect::<Vec<_>>(), ["build_id"]);
  }

  #[test]
  fn conjunction_rejects_unclassifiable_clause() {
    let err = FilterSet::parse_conjunction("duration 9").unwrap_err();
    assert!(matches!(err, Error::MalformedFilter(_)));
    let err = FilterSet::parse_conjunction("==9").unwrap_err();
    assert!(matches!(err, Error::MalformedFilter(_)));
    let err = FilterSet::parse_conjunction("duration>=").unwrap_err();
    assert!(matches!(err, Error::MalformedFilter(_)));
  }

  #[test]
  fn comma_list_segments_classified_independently() {
    let set = FilterSet::from_params([
      ("duration", "<=9, >7"),
      ("unique_thing_name", "*.tar.gz"),
      ("version", "1.0.0"),
    ])
    .unwrap();
    assert_eq!(set.clauses("duration"), &[
      Clause::new(Operator::Le, "9"),
      Clause::new(Operator::Gt, "7"),
    ]);
    assert_eq!(set.clauses("unique_thing_name"), &[Clause::new(
      Operator::Like,
      "%.tar.gz"
    )]);
    assert_eq!(set.clauses("version"), &[Clause::new(Operator::Eq, "1.0.0")]);
  }

  #[test]
  fn comma_list_wildcard_is_per_segment() {
    let set = FilterSet::from_params([("version", "1.*,2.0.0")]).unwrap();
    assert_eq!(set.clauses("version"), &[
      Clause::new(Operator::Like, "1.%"),
      Clause::new(Operator::Eq, "2.0.0"),
    ]);
  }

  #[test]
  fn wildcard_escapes_like_metacharacters() {
    assert_eq!(
      Clause::equality("app_v1*"),
      Clause::new(Operator::Like, r"app\_v1%")
    );
    assert_eq!(
      Clause::equality(r"50%\*"),
      Clause::new(Operator::Like, r"50\%\\%")
    );
    // Without a `*` the value is compared verbatim.
    assert_eq!(Clause::equality("a_b"), Clause::new(Operator::Eq, "a_b"));
  }

  #[test]
  fn comma_list_rejects_bare_comparator() {
    let err = FilterSet::from_params([("duration", ">=")]).unwrap_err();
    assert!(matches!(err, Error::MalformedFilter(_)));
  }

  #[test]
  fn render_binds_values_and_casts_wildcards() {
    let set = FilterSet::new()
      .with("duration", Clause::new(Operator::Le, "9"))
      .with("duration", Clause::new(Operator::Gt, "7"))
      .with("job_url", Clause::equality("http://ci/*"));
    let compiled = set.render(RecordKind::Build).unwrap().unwrap();
    assert_eq!(
      compiled.where_clause,
      "duration <= ?1 AND duration > ?2 AND CAST(job_url AS TEXT) LIKE ?3 \
       ESCAPE '\\'"
    );
    assert_eq!(compiled.params, [
      FilterParam::Integer(9),
      FilterParam::Integer(7),
      FilterParam::Text("http://ci/%".into()),
    ]);
  }

  #[test]
  fn render_never_interpolates_values() {
    let set = FilterSet::new()
      .with("result", Clause::equality("x' OR '1'='1"));
    let compiled = set.render(RecordKind::Build).unwrap().unwrap();
    assert_eq!(compiled.where_clause, "result = ?1");
  }

  #[test]
  fn render_outside_allow_list_is_no_results() {
    let set = FilterSet::new().with("servername", Clause::equality("web01"));
    assert_eq!(set.render(RecordKind::Artifact).unwrap(), None);
    assert!(set.render(RecordKind::Deploy).unwrap().is_some());

    let mixed = set.with("duration", Clause::equality("3"));
    assert_eq!(mixed.render(RecordKind::Deploy).unwrap(), None);

    assert_eq!(FilterSet::new().render(RecordKind::Build).unwrap(), None);
  }

  #[test]
  fn render_rejects_non_integer_for_integer_column() {
    let set = FilterSet::new().with("duration", Clause::equality("long"));
    let err = set.render(RecordKind::Build).unwrap_err();
    assert!(matches!(err, Error::MalformedFilter(_)));
  }

  #[test]
  fn render_normalises_rfc3339_timestamps() {
    let set = FilterSet::new().with(
      "insertion_time",
      Clause::new(Operator::Ge, "2024-01-01T00:00:00Z"),
    );
    let compiled = set.render(RecordKind::Promote).unwrap().unwrap();
    assert_eq!(compiled.params, [FilterParam::Text(
      "2024-01-01T00:00:00.000000Z".into()
    )]);

    let prefix = FilterSet::new()
      .with("insertion_time", Clause::new(Operator::Lt, "2024-02"));
    let compiled = prefix.render(RecordKind::Promote).unwrap().unwrap();
    assert_eq!(compiled.params, [FilterParam::Text("2024-02".into())]);
  }
}
