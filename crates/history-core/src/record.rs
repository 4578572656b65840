//! Identity and ledger record types.
//!
//! Identity rows (versions, things, servernames, versioned things) are
//! created lazily on first reference and never change afterwards. Ledger
//! rows (builds, artifacts, promotes, deploys) are appended once per
//! assertion and never revisited.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result, kind::RecordKind};

/// Surrogate primary key assigned by the store.
pub type RowId = i64;

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Encode an instant the way the store persists `*_time` columns.
///
/// Fixed-width UTC with microseconds, so lexical order equals time order.
pub fn encode_timestamp(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

// ─── Enumerations ────────────────────────────────────────────────────────────

fn parse_enum<T: FromStr>(what: &str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| {
    Error::ConstraintViolation(format!("unknown {what}: {s:?}"))
  })
}

/// What a version string identifies.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  Display, EnumString, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VersionType {
  /// A released package version such as `1.0.0`.
  Package,
  /// A source-control changeset hash.
  Changeset,
}

impl VersionType {
  pub fn parse(s: &str) -> Result<Self> { parse_enum("version type", s) }

  pub fn as_str(self) -> &'static str { self.into() }
}

/// The class of a named thing.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  Display, EnumString, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThingType {
  Filename,
  Config,
  Dockerimage,
  GitRepo,
}

impl ThingType {
  pub fn parse(s: &str) -> Result<Self> { parse_enum("thing type", s) }

  pub fn as_str(self) -> &'static str { self.into() }
}

/// A delivery environment that things are promoted or deployed to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  Display, EnumString, IntoStaticStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
  Production,
  Qa,
  System,
}

impl Environment {
  pub fn parse(s: &str) -> Result<Self> { parse_enum("environment", s) }

  pub fn as_str(self) -> &'static str { self.into() }
}

// ─── Identity rows ───────────────────────────────────────────────────────────

/// A content identifier, unique on `(version_type, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
  pub id:             RowId,
  pub insertion_time: DateTime<Utc>,
  pub version_type:   VersionType,
  pub version:        String,
}

/// A named thing at a specific version; the key artifacts and deploys
/// attach to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedThing {
  pub versioned_id:      RowId,
  pub insertion_time:    DateTime<Utc>,
  pub version_id:        RowId,
  pub version_type:      VersionType,
  pub version:           String,
  pub thing_id:          RowId,
  pub thing_type:        ThingType,
  pub unique_thing_name: String,
}

// ─── Ledger rows ─────────────────────────────────────────────────────────────

/// A recorded CI job run against a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
  pub build_id:        RowId,
  pub insertion_time:  DateTime<Utc>,
  pub version_type:    VersionType,
  pub version:         String,
  pub version_id:      RowId,
  pub job_url:         String,
  pub job_description: String,
  /// Job duration in seconds.
  pub duration:        i64,
  pub result:          String,
  pub misc:            serde_json::Value,
}

/// A file produced by a build, at a version. Build fields are carried by
/// join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  pub artifact_id:       RowId,
  pub insertion_time:    DateTime<Utc>,
  pub thing_id:          RowId,
  pub thing_type:        ThingType,
  pub unique_thing_name: String,
  pub version_type:      VersionType,
  pub version_id:        RowId,
  pub version:           String,
  pub build_id:          RowId,
  pub job_url:           String,
  pub job_description:   String,
  pub duration:          i64,
  pub result:            String,
  pub misc:              serde_json::Value,
}

/// A named thing moved to an environment.
///
/// Promotion is recorded against the thing, not a versioned thing: it says
/// "this thing moved to qa" independent of which version did. Deploys, by
/// contrast, are always version-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promote {
  pub promote_id:     RowId,
  pub insertion_time: DateTime<Utc>,
  pub thing_type:     ThingType,
  pub thing_name:     String,
  /// When the promoted thing was first seen.
  pub thing_time:     DateTime<Utc>,
  pub environment:    Environment,
  pub misc:           serde_json::Value,
}

/// A specific version of a thing going live in an environment, optionally
/// on a named server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deploy {
  pub deploy_id:      RowId,
  pub insertion_time: DateTime<Utc>,
  pub thing_type:     ThingType,
  pub thing_name:     String,
  pub version_type:   VersionType,
  pub version_id:     RowId,
  pub version:        String,
  pub environment:    Environment,
  /// Absent when the deploy was recorded without a server.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub servername:     Option<String>,
  pub misc:           serde_json::Value,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Any ledger row. Serialises as the flat column mapping of the inner
/// record, so heterogeneous query results share one shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
  Build(Build),
  Artifact(Artifact),
  Promote(Promote),
  Deploy(Deploy),
}

impl Record {
  pub fn kind(&self) -> RecordKind {
    match self {
      Self::Build(_) => RecordKind::Build,
      Self::Artifact(_) => RecordKind::Artifact,
      Self::Promote(_) => RecordKind::Promote,
      Self::Deploy(_) => RecordKind::Deploy,
    }
  }

  pub fn id(&self) -> RowId {
    match self {
      Self::Build(b) => b.build_id,
      Self::Artifact(a) => a.artifact_id,
      Self::Promote(p) => p.promote_id,
      Self::Deploy(d) => d.deploy_id,
    }
  }

  pub fn into_build(self) -> Option<Build> {
    match self {
      Self::Build(b) => Some(b),
      _ => None,
    }
  }

  pub fn into_artifact(self) -> Option<Artifact> {
    match self {
      Self::Artifact(a) => Some(a),
      _ => None,
    }
  }

  pub fn into_promote(self) -> Option<Promote> {
    match self {
      Self::Promote(p) => Some(p),
      _ => None,
    }
  }

  pub fn into_deploy(self) -> Option<Deploy> {
    match self {
      Self::Deploy(d) => Some(d),
      _ => None,
    }
  }
}

// ─── Append inputs ───────────────────────────────────────────────────────────

fn empty_misc() -> serde_json::Value { serde_json::json!({}) }

/// Input to [`crate::store::HistoryStore::append_build`].
/// `insertion_time` is always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBuild {
  pub version_type:    VersionType,
  pub version:         String,
  pub job_url:         String,
  pub job_description: String,
  pub duration:        i64,
  #[serde(default)]
  pub result:          String,
  #[serde(default = "empty_misc")]
  pub misc:            serde_json::Value,
}

/// Input to [`crate::store::HistoryStore::append_artifact`]. The artifact's
/// thing is always a [`ThingType::Filename`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArtifact {
  pub version_type: VersionType,
  pub version:      String,
  pub filename:     String,
  pub build_id:     RowId,
  #[serde(default = "empty_misc")]
  pub misc:         serde_json::Value,
}

/// Input to [`crate::store::HistoryStore::append_promote`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPromote {
  pub thing_type:  ThingType,
  pub thing_name:  String,
  pub environment: Environment,
  #[serde(default = "empty_misc")]
  pub misc:        serde_json::Value,
}

/// Input to [`crate::store::HistoryStore::append_deploy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeploy {
  pub thing_type:   ThingType,
  pub thing_name:   String,
  pub version_type: VersionType,
  pub version:      String,
  pub environment:  Environment,
  /// `None` is its own insert shape, not a null sentinel.
  #[serde(default)]
  pub servername:   Option<String>,
  #[serde(default = "empty_misc")]
  pub misc:         serde_json::Value,
}
