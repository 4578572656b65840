//! The `HistoryStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `history-store-sqlite`).
//! Adapters (`history-api`, `history-server`) depend on this abstraction, not
//! on any concrete backend.

use std::{collections::BTreeMap, future::Future};

use crate::{
  filter::FilterSet,
  kind::RecordKind,
  record::{
    Artifact, Build, Deploy, Environment, NewArtifact, NewBuild, NewDeploy,
    NewPromote, Promote, Record, RowId, Version, VersionType, VersionedThing,
    ThingType,
  },
};

/// Per-kind search results. Kinds without matches are absent, never
/// present with an empty list.
pub type SearchResults = BTreeMap<RecordKind, Vec<Record>>;

/// Abstraction over a delivery-history backend.
///
/// Identity operations (`ensure_*`) are idempotent: for one natural key
/// exactly one row is ever created, and concurrent callers converge on its
/// id. Ledger operations (`append_*`) only ever insert. Nothing is updated
/// or deleted.
///
/// Every write runs as one logical unit: its identity resolutions and its
/// ledger insert commit together or not at all.
pub trait HistoryStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Identity ──────────────────────────────────────────────────────────

  fn ensure_version(
    &self,
    version_type: VersionType,
    version: String,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  fn ensure_thing(
    &self,
    thing_type: ThingType,
    name: String,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  fn ensure_servername(
    &self,
    servername: String,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  /// Resolve the version, then the thing, then their pairing.
  fn ensure_versioned_thing(
    &self,
    version_type: VersionType,
    version: String,
    thing_type: ThingType,
    name: String,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  /// Retrieve a version by id; `NotFound` if absent.
  fn get_version(
    &self,
    id: RowId,
  ) -> impl Future<Output = Result<Version, Self::Error>> + Send + '_;

  /// Every versioned thing at `(version_type, version)`. Never creates the
  /// version.
  fn get_versioned_things(
    &self,
    version_type: VersionType,
    version: String,
  ) -> impl Future<Output = Result<Vec<VersionedThing>, Self::Error>> + Send + '_;

  // ── Ledger: append-only writes ───────────────────────────────────────

  fn append_build(
    &self,
    input: NewBuild,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  /// Fails with a constraint violation if `build_id` does not exist.
  fn append_artifact(
    &self,
    input: NewArtifact,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  fn append_promote(
    &self,
    input: NewPromote,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  fn append_deploy(
    &self,
    input: NewDeploy,
  ) -> impl Future<Output = Result<RowId, Self::Error>> + Send + '_;

  // ── Builds ────────────────────────────────────────────────────────────

  fn get_build(
    &self,
    id: RowId,
  ) -> impl Future<Output = Result<Build, Self::Error>> + Send + '_;

  fn get_build_by_url(
    &self,
    job_url: String,
  ) -> impl Future<Output = Result<Vec<Build>, Self::Error>> + Send + '_;

  fn get_build_by_version(
    &self,
    version_type: VersionType,
    version: String,
  ) -> impl Future<Output = Result<Vec<Build>, Self::Error>> + Send + '_;

  /// Full scan.
  fn get_all_builds(
    &self,
  ) -> impl Future<Output = Result<Vec<Build>, Self::Error>> + Send + '_;

  // ── Artifacts ─────────────────────────────────────────────────────────

  fn get_artifact(
    &self,
    id: RowId,
  ) -> impl Future<Output = Result<Artifact, Self::Error>> + Send + '_;

  fn get_artifact_by_filename(
    &self,
    filename: String,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + '_;

  fn get_artifact_by_build_id(
    &self,
    build_id: RowId,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + '_;

  fn get_artifact_by_version(
    &self,
    version_type: VersionType,
    version: String,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + '_;

  /// Full scan.
  fn get_all_artifacts(
    &self,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + '_;

  // ── Promotes ──────────────────────────────────────────────────────────

  fn get_promote(
    &self,
    id: RowId,
  ) -> impl Future<Output = Result<Promote, Self::Error>> + Send + '_;

  fn get_promote_by_thing(
    &self,
    thing_type: ThingType,
    name: String,
  ) -> impl Future<Output = Result<Vec<Promote>, Self::Error>> + Send + '_;

  fn get_promote_by_environment(
    &self,
    environment: Environment,
  ) -> impl Future<Output = Result<Vec<Promote>, Self::Error>> + Send + '_;

  /// Full scan.
  fn get_all_promotes(
    &self,
  ) -> impl Future<Output = Result<Vec<Promote>, Self::Error>> + Send + '_;

  // ── Deploys ───────────────────────────────────────────────────────────

  fn get_deploy(
    &self,
    id: RowId,
  ) -> impl Future<Output = Result<Deploy, Self::Error>> + Send + '_;

  fn get_deploy_by_environment(
    &self,
    environment: Environment,
  ) -> impl Future<Output = Result<Vec<Deploy>, Self::Error>> + Send + '_;

  /// Deploys of things named `name`, optionally limited to one thing type.
  fn get_deploy_by_thing_name(
    &self,
    name: String,
    thing_type: Option<ThingType>,
  ) -> impl Future<Output = Result<Vec<Deploy>, Self::Error>> + Send + '_;

  fn get_deploy_by_version(
    &self,
    version_type: VersionType,
    version: String,
  ) -> impl Future<Output = Result<Vec<Deploy>, Self::Error>> + Send + '_;

  /// Full scan.
  fn get_all_deploys(
    &self,
  ) -> impl Future<Output = Result<Vec<Deploy>, Self::Error>> + Send + '_;

  // ── Attribute queries ─────────────────────────────────────────────────

  /// Records of `kind` matching every clause of `filters`. A filter that
  /// names a field outside the kind's columns matches nothing.
  fn find_by_attrs<'a>(
    &'a self,
    kind: RecordKind,
    filters: &'a FilterSet,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;

  /// Run `filters` against each of `kinds`, keeping only kinds with
  /// matches.
  fn search<'a>(
    &'a self,
    kinds: &'a [RecordKind],
    filters: &'a FilterSet,
  ) -> impl Future<Output = Result<SearchResults, Self::Error>> + Send + 'a;
}
