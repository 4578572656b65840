//! [`SqliteStore`], the SQLite implementation of [`HistoryStore`].

use std::{path::PathBuf, time::Duration};

use chrono::Utc;
use history_core::{
  filter::{CompiledFilter, FilterParam, FilterSet},
  kind::RecordKind,
  record::{
    Artifact, Build, Deploy, Environment, NewArtifact, NewBuild, NewDeploy,
    NewPromote, Promote, Record, RowId, ThingType, Version, VersionType,
    VersionedThing, encode_timestamp,
  },
  store::{HistoryStore, SearchResults},
};
use rusqlite::{
  OptionalExtension as _, Transaction, TransactionBehavior, types::Value,
};

use crate::{
  Error, Result,
  encode::{RawRecord, RawVersion, RawVersionedThing, encode_misc},
  identity,
  schema::SCHEMA,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Connection parameters, built once at start-up and handed to
/// [`SqliteStore::open`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
  pub path:         PathBuf,
  /// How long a writer waits on another connection's lock before failing.
  pub busy_timeout: Duration,
}

impl StoreConfig {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into(), busy_timeout: Duration::from_secs(5) }
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// A `WHERE` body plus its positional parameters.
struct Selection {
  clause: Option<String>,
  params: Vec<Value>,
}

impl Selection {
  fn all() -> Self { Self { clause: None, params: Vec::new() } }

  fn by(clause: &str, params: Vec<Value>) -> Self {
    Self { clause: Some(clause.to_owned()), params }
  }
}

impl From<CompiledFilter> for Selection {
  fn from(f: CompiledFilter) -> Self {
    let params = f
      .params
      .into_iter()
      .map(|p| match p {
        FilterParam::Integer(i) => Value::Integer(i),
        FilterParam::Text(s) => Value::Text(s),
      })
      .collect();
    Self { clause: Some(f.where_clause), params }
  }
}

fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A delivery history store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every
/// request runs its whole unit of work in one call on that connection, so
/// a transaction is never shared between requests.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store described by `config` and run schema
  /// initialisation.
  pub async fn open(config: &StoreConfig) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(&config.path).await?;
    let store = Self { conn };
    store.init(config.busy_timeout).await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(Duration::from_secs(5)).await?;
    Ok(store)
  }

  async fn init(&self, busy_timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `work` inside an immediate transaction.
  ///
  /// The transaction commits only if `work` succeeds. On any error it is
  /// dropped, which rolls it back, so no partial identity or ledger row is
  /// ever visible.
  async fn write<F, R>(&self, work: F) -> Result<R>
  where
    F: FnOnce(&Transaction<'_>, &str) -> rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let now = encode_timestamp(Utc::now());
    let out = self
      .conn
      .call(move |conn| {
        let tx =
          conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = work(&tx, &now)?;
        tx.commit()?;
        Ok(out)
      })
      .await?;
    Ok(out)
  }

  /// Read rows of `kind` from its view, ordered by primary key.
  async fn fetch(
    &self,
    kind: RecordKind,
    selection: Selection,
  ) -> Result<Vec<Record>> {
    let mut sql = format!(
      "SELECT {} FROM {}",
      kind.column_names().join(", "),
      kind.view()
    );
    if let Some(clause) = &selection.clause {
      sql.push_str(" WHERE ");
      sql.push_str(clause);
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(kind.id_column());

    let params = selection.params;
    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            RawRecord::from_row(kind, row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn fetch_one(&self, kind: RecordKind, id: RowId) -> Result<Record> {
    let clause = format!("{} = ?1", kind.id_column());
    self
      .fetch(kind, Selection::by(&clause, vec![Value::Integer(id)]))
      .await?
      .into_iter()
      .next()
      .ok_or(Error::NotFound { entity: kind.name(), id })
  }

  async fn fetch_as<T>(
    &self,
    kind: RecordKind,
    selection: Selection,
    pick: fn(Record) -> Option<T>,
  ) -> Result<Vec<T>> {
    Ok(self.fetch(kind, selection).await?.into_iter().filter_map(pick).collect())
  }

  async fn builds(&self, selection: Selection) -> Result<Vec<Build>> {
    self.fetch_as(RecordKind::Build, selection, Record::into_build).await
  }

  async fn artifacts(&self, selection: Selection) -> Result<Vec<Artifact>> {
    self.fetch_as(RecordKind::Artifact, selection, Record::into_artifact).await
  }

  async fn promotes(&self, selection: Selection) -> Result<Vec<Promote>> {
    self.fetch_as(RecordKind::Promote, selection, Record::into_promote).await
  }

  async fn deploys(&self, selection: Selection) -> Result<Vec<Deploy>> {
    self.fetch_as(RecordKind::Deploy, selection, Record::into_deploy).await
  }

  fn by_version(version_type: VersionType, version: String) -> Selection {
    Selection::by("version_type = ?1 AND version = ?2", vec![
      text(version_type.as_str()),
      text(version),
    ])
  }
}

// ─── HistoryStore impl ───────────────────────────────────────────────────────

impl HistoryStore for SqliteStore {
  type Error = Error;

  // ── Identity ──────────────────────────────────────────────────────────────

  async fn ensure_version(
    &self,
    version_type: VersionType,
    version: String,
  ) -> Result<RowId> {
    self
      .write(move |tx, now| {
        identity::ensure_version(tx, version_type, &version, now)
      })
      .await
  }

  async fn ensure_thing(&self, thing_type: ThingType, name: String) -> Result<RowId> {
    self
      .write(move |tx, now| identity::ensure_thing(tx, thing_type, &name, now))
      .await
  }

  async fn ensure_servername(&self, servername: String) -> Result<RowId> {
    self
      .write(move |tx, now| identity::ensure_servername(tx, &servername, now))
      .await
  }

  async fn ensure_versioned_thing(
    &self,
    version_type: VersionType,
    version:      String,
    thing_type:   ThingType,
    name:         String,
  ) -> Result<RowId> {
    self
      .write(move |tx, now| {
        identity::ensure_versioned_thing(
          tx,
          version_type,
          &version,
          thing_type,
          &name,
          now,
        )
      })
      .await
  }

  async fn get_version(&self, id: RowId) -> Result<Version> {
    let raw: Option<RawVersion> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT id, insertion_time, version_type, version
             FROM version WHERE id = ?1",
            rusqlite::params![id],
            RawVersion::from_row,
          )
          .optional()?)
      })
      .await?;

    raw
      .ok_or(Error::NotFound { entity: "version", id })?
      .into_version()
  }

  async fn get_versioned_things(
    &self,
    version_type: VersionType,
    version:      String,
  ) -> Result<Vec<VersionedThing>> {
    let version_type = version_type.as_str();
    let raws: Vec<RawVersionedThing> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT versioned_id, insertion_time, version_id, version_type,
                  version, thing_id, thing_type, unique_thing_name
           FROM versioned_things_view
           WHERE version_type = ?1 AND version = ?2
           ORDER BY versioned_id",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![version_type, version],
            RawVersionedThing::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawVersionedThing::into_versioned_thing)
      .collect()
  }

  // ── Ledger: append-only writes ───────────────────────────────────────────

  async fn append_build(&self, input: NewBuild) -> Result<RowId> {
    let misc = encode_misc(&input.misc)?;
    let id = self
      .write(move |tx, now| {
        let version_id =
          identity::ensure_version(tx, input.version_type, &input.version, now)?;
        tx.execute(
          "INSERT INTO build (
             insertion_time, version_id, job_url, job_description,
             duration, result, misc
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            now,
            version_id,
            input.job_url,
            input.job_description,
            input.duration,
            input.result,
            misc,
          ],
        )?;
        Ok(tx.last_insert_rowid())
      })
      .await?;

    tracing::debug!(build_id = id, "recorded build");
    Ok(id)
  }

  async fn append_artifact(&self, input: NewArtifact) -> Result<RowId> {
    let misc = encode_misc(&input.misc)?;
    let id = self
      .write(move |tx, now| {
        let versioned_thing_id = identity::ensure_versioned_thing(
          tx,
          input.version_type,
          &input.version,
          ThingType::Filename,
          &input.filename,
          now,
        )?;
        tx.execute(
          "INSERT INTO artifact (insertion_time, versioned_thing_id, build_id, misc)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![now, versioned_thing_id, input.build_id, misc],
        )?;
        Ok(tx.last_insert_rowid())
      })
      .await?;

    tracing::debug!(artifact_id = id, "recorded artifact");
    Ok(id)
  }

  async fn append_promote(&self, input: NewPromote) -> Result<RowId> {
    let misc = encode_misc(&input.misc)?;
    let id = self
      .write(move |tx, now| {
        let thing_id =
          identity::ensure_thing(tx, input.thing_type, &input.thing_name, now)?;
        tx.execute(
          "INSERT INTO promote (insertion_time, thing_id, environment, misc)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![now, thing_id, input.environment.as_str(), misc],
        )?;
        Ok(tx.last_insert_rowid())
      })
      .await?;

    tracing::debug!(promote_id = id, "recorded promote");
    Ok(id)
  }

  async fn append_deploy(&self, input: NewDeploy) -> Result<RowId> {
    let misc = encode_misc(&input.misc)?;
    let servername = input.servername.filter(|s| !s.is_empty());
    let environment = input.environment.as_str();

    let id = self
      .write(move |tx, now| {
        let versioned_thing_id = identity::ensure_versioned_thing(
          tx,
          input.version_type,
          &input.version,
          input.thing_type,
          &input.thing_name,
          now,
        )?;

        // Two distinct insert shapes; "no server" never becomes a value.
        match servername {
          Some(servername) => {
            let servername_id =
              identity::ensure_servername(tx, &servername, now)?;
            tx.execute(
              "INSERT INTO deploy (
                 insertion_time, versioned_thing_id, servername_id,
                 environment, misc
               ) VALUES (?1, ?2, ?3, ?4, ?5)",
              rusqlite::params![
                now,
                versioned_thing_id,
                servername_id,
                environment,
                misc,
              ],
            )?;
          }
          None => {
            tx.execute(
              "INSERT INTO deploy (insertion_time, versioned_thing_id, environment, misc)
               VALUES (?1, ?2, ?3, ?4)",
              rusqlite::params![now, versioned_thing_id, environment, misc],
            )?;
          }
        }
        Ok(tx.last_insert_rowid())
      })
      .await?;

    tracing::debug!(deploy_id = id, "recorded deploy");
    Ok(id)
  }

  // ── Builds ────────────────────────────────────────────────────────────────

  async fn get_build(&self, id: RowId) -> Result<Build> {
    let record = self.fetch_one(RecordKind::Build, id).await?;
    record.into_build().ok_or(Error::NotFound { entity: "build", id })
  }

  async fn get_build_by_url(&self, job_url: String) -> Result<Vec<Build>> {
    self.builds(Selection::by("job_url = ?1", vec![text(job_url)])).await
  }

  async fn get_build_by_version(
    &self,
    version_type: VersionType,
    version:      String,
  ) -> Result<Vec<Build>> {
    self.builds(Self::by_version(version_type, version)).await
  }

  async fn get_all_builds(&self) -> Result<Vec<Build>> {
    self.builds(Selection::all()).await
  }

  // ── Artifacts ─────────────────────────────────────────────────────────────

  async fn get_artifact(&self, id: RowId) -> Result<Artifact> {
    let record = self.fetch_one(RecordKind::Artifact, id).await?;
    record
      .into_artifact()
      .ok_or(Error::NotFound { entity: "artifact", id })
  }

  async fn get_artifact_by_filename(
    &self,
    filename: String,
  ) -> Result<Vec<Artifact>> {
    self
      .artifacts(Selection::by(
        "thing_type = ?1 AND unique_thing_name = ?2",
        vec![text(ThingType::Filename.as_str()), text(filename)],
      ))
      .await
  }

  async fn get_artifact_by_build_id(
    &self,
    build_id: RowId,
  ) -> Result<Vec<Artifact>> {
    self
      .artifacts(Selection::by("build_id = ?1", vec![Value::Integer(build_id)]))
      .await
  }

  async fn get_artifact_by_version(
    &self,
    version_type: VersionType,
    version:      String,
  ) -> Result<Vec<Artifact>> {
    self.artifacts(Self::by_version(version_type, version)).await
  }

  async fn get_all_artifacts(&self) -> Result<Vec<Artifact>> {
    self.artifacts(Selection::all()).await
  }

  // ── Promotes ──────────────────────────────────────────────────────────────

  async fn get_promote(&self, id: RowId) -> Result<Promote> {
    let record = self.fetch_one(RecordKind::Promote, id).await?;
    record
      .into_promote()
      .ok_or(Error::NotFound { entity: "promote", id })
  }

  async fn get_promote_by_thing(
    &self,
    thing_type: ThingType,
    name:       String,
  ) -> Result<Vec<Promote>> {
    self
      .promotes(Selection::by("thing_type = ?1 AND thing_name = ?2", vec![
        text(thing_type.as_str()),
        text(name),
      ]))
      .await
  }

  async fn get_promote_by_environment(
    &self,
    environment: Environment,
  ) -> Result<Vec<Promote>> {
    self
      .promotes(Selection::by("environment = ?1", vec![text(
        environment.as_str(),
      )]))
      .await
  }

  async fn get_all_promotes(&self) -> Result<Vec<Promote>> {
    self.promotes(Selection::all()).await
  }

  // ── Deploys ───────────────────────────────────────────────────────────────

  async fn get_deploy(&self, id: RowId) -> Result<Deploy> {
    let record = self.fetch_one(RecordKind::Deploy, id).await?;
    record
      .into_deploy()
      .ok_or(Error::NotFound { entity: "deploy", id })
  }

  async fn get_deploy_by_environment(
    &self,
    environment: Environment,
  ) -> Result<Vec<Deploy>> {
    tracing::debug!(%environment, "getting deploys by environment");
    self
      .deploys(Selection::by("environment = ?1", vec![text(
        environment.as_str(),
      )]))
      .await
  }

  async fn get_deploy_by_thing_name(
    &self,
    name:       String,
    thing_type: Option<ThingType>,
  ) -> Result<Vec<Deploy>> {
    let selection = match thing_type {
      Some(t) => Selection::by("thing_name = ?1 AND thing_type = ?2", vec![
        text(name),
        text(t.as_str()),
      ]),
      None => Selection::by("thing_name = ?1", vec![text(name)]),
    };
    self.deploys(selection).await
  }

  async fn get_deploy_by_version(
    &self,
    version_type: VersionType,
    version:      String,
  ) -> Result<Vec<Deploy>> {
    self.deploys(Self::by_version(version_type, version)).await
  }

  async fn get_all_deploys(&self) -> Result<Vec<Deploy>> {
    self.deploys(Selection::all()).await
  }

  // ── Attribute queries ─────────────────────────────────────────────────────

  async fn find_by_attrs<'a>(
    &'a self,
    kind:    RecordKind,
    filters: &'a FilterSet,
  ) -> Result<Vec<Record>> {
    match filters.render(kind)? {
      Some(compiled) => self.fetch(kind, compiled.into()).await,
      None => {
        tracing::debug!(%kind, "filter does not apply; no results");
        Ok(Vec::new())
      }
    }
  }

  async fn search<'a>(
    &'a self,
    kinds:   &'a [RecordKind],
    filters: &'a FilterSet,
  ) -> Result<SearchResults> {
    let mut results = SearchResults::new();
    for &kind in kinds {
      let records = self.find_by_attrs(kind, filters).await?;
      if !records.is_empty() {
        results.insert(kind, records);
      }
    }
    Ok(results)
  }
}
