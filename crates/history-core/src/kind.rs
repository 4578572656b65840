//! [`RecordKind`]: the closed set of ledger record kinds.
//!
//! Each kind knows the view it is read through and its enumerated column
//! set. That column set doubles as the allow-list for attribute filters:
//! a field name that is not listed here never reaches generated SQL.

use serde::Serialize;
use strum::{
  Display, EnumIter, EnumString, IntoEnumIterator as _, IntoStaticStr,
};

use crate::{Error, Result};

// ─── Columns ─────────────────────────────────────────────────────────────────

/// How filter values for a column are typed before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Integer,
  Text,
  /// Stored as fixed-width RFC 3339 text.
  Timestamp,
  /// Opaque JSON stored as text.
  Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub name: &'static str,
  pub ty:   ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
  Column { name, ty }
}

use ColumnType::{Integer, Json, Text, Timestamp};

const BUILD_COLUMNS: &[Column] = &[
  col("build_id", Integer),
  col("insertion_time", Timestamp),
  col("version_type", Text),
  col("version", Text),
  col("version_id", Integer),
  col("job_url", Text),
  col("job_description", Text),
  col("duration", Integer),
  col("result", Text),
  col("misc", Json),
];

const ARTIFACT_COLUMNS: &[Column] = &[
  col("artifact_id", Integer),
  col("insertion_time", Timestamp),
  col("thing_id", Integer),
  col("thing_type", Text),
  col("unique_thing_name", Text),
  col("version_type", Text),
  col("version_id", Integer),
  col("version", Text),
  col("build_id", Integer),
  col("job_url", Text),
  col("job_description", Text),
  col("duration", Integer),
  col("result", Text),
  col("misc", Json),
];

const PROMOTE_COLUMNS: &[Column] = &[
  col("promote_id", Integer),
  col("insertion_time", Timestamp),
  col("thing_type", Text),
  col("thing_name", Text),
  col("thing_time", Timestamp),
  col("environment", Text),
  col("misc", Json),
];

const DEPLOY_COLUMNS: &[Column] = &[
  col("deploy_id", Integer),
  col("insertion_time", Timestamp),
  col("thing_type", Text),
  col("thing_name", Text),
  col("version_type", Text),
  col("version_id", Integer),
  col("version", Text),
  col("environment", Text),
  col("servername", Text),
  col("misc", Json),
];

// ─── RecordKind ──────────────────────────────────────────────────────────────

/// A ledger record kind.
///
/// Displays as the singular name (`build`), parses from the singular or
/// plural in any case (`builds`, `BUILDS`), and serialises as the plural,
/// which is the key used in multi-kind search results.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum RecordKind {
  #[serde(rename = "builds")]
  #[strum(to_string = "build", serialize = "builds")]
  Build,
  #[serde(rename = "artifacts")]
  #[strum(to_string = "artifact", serialize = "artifacts")]
  Artifact,
  #[serde(rename = "promotes")]
  #[strum(to_string = "promote", serialize = "promotes")]
  Promote,
  #[serde(rename = "deploys")]
  #[strum(to_string = "deploy", serialize = "deploys")]
  Deploy,
}

impl RecordKind {
  pub const ALL: [RecordKind; 4] =
    [Self::Build, Self::Artifact, Self::Promote, Self::Deploy];

  /// The singular name, as used in URL paths and error messages.
  pub fn name(self) -> &'static str { self.into() }

  /// The enumerated column set; also the filter allow-list.
  pub fn columns(self) -> &'static [Column] {
    match self {
      Self::Build => BUILD_COLUMNS,
      Self::Artifact => ARTIFACT_COLUMNS,
      Self::Promote => PROMOTE_COLUMNS,
      Self::Deploy => DEPLOY_COLUMNS,
    }
  }

  pub fn column(self, name: &str) -> Option<&'static Column> {
    self.columns().iter().find(|c| c.name == name)
  }

  pub fn column_names(self) -> Vec<&'static str> {
    self.columns().iter().map(|c| c.name).collect()
  }

  /// The read view whose columns are exactly [`Self::columns`].
  pub fn view(self) -> &'static str {
    match self {
      Self::Build => "builds_view",
      Self::Artifact => "artifacts_view",
      Self::Promote => "promotes_view",
      Self::Deploy => "deploys_view",
    }
  }

  /// The primary-key column within the view.
  pub fn id_column(self) -> &'static str {
    match self {
      Self::Build => "build_id",
      Self::Artifact => "artifact_id",
      Self::Promote => "promote_id",
      Self::Deploy => "deploy_id",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::MalformedFilter(format!("unknown record kind: {s:?}")))
  }

  /// Parse a search selector: `ALL` or a single kind name.
  pub fn parse_selector(s: &str) -> Result<Vec<Self>> {
    if s.eq_ignore_ascii_case("all") {
      return Ok(Self::iter().collect());
    }
    Ok(vec![Self::parse(s)?])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_names() {
    assert_eq!(RecordKind::Build.to_string(), "build");
    assert_eq!(RecordKind::Artifact.name(), "artifact");
    assert_eq!(RecordKind::parse("ARTIFACTS").unwrap(), RecordKind::Artifact);
    assert_eq!(RecordKind::parse("deploy").unwrap(), RecordKind::Deploy);
    assert!(RecordKind::parse("releases").is_err());
    assert_eq!(
      serde_json::to_value(RecordKind::Promote).unwrap(),
      serde_json::json!("promotes")
    );
  }

  #[test]
  fn name_matches_display() {
    for kind in RecordKind::ALL {
      assert_eq!(kind.name(), kind.to_string());
    }
    assert_eq!(RecordKind::Deploy.name(), "deploy");
  }

  #[test]
  fn selector_all_covers_every_kind() {
    assert_eq!(RecordKind::parse_selector("ALL").unwrap(), RecordKind::ALL);
    assert_eq!(
      RecordKind::parse_selector("BUILDS").unwrap(),
      vec![RecordKind::Build]
    );
  }

  #[test]
  fn id_column_is_a_listed_integer_column() {
    for kind in RecordKind::ALL {
      let col = kind.column(kind.id_column()).unwrap();
      assert_eq!(col.ty, ColumnType::Integer);
    }
  }

  #[test]
  fn servername_is_only_a_deploy_column() {
    assert!(RecordKind::Deploy.column("servername").is_some());
    assert!(RecordKind::Artifact.column("servername").is_none());
    assert!(RecordKind::Build.column("servername").is_none());
  }
}
