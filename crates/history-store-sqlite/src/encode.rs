//! Decoding helpers between SQLite rows and domain types.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (see
//! [`history_core::record::encode_timestamp`]). Enumerations are stored as
//! their snake_case names. `misc` is stored as compact JSON text.

use chrono::{DateTime, Utc};
use history_core::{
  kind::RecordKind,
  record::{
    Artifact, Build, Deploy, Environment, Promote, Record, ThingType, Version,
    VersionType, VersionedThing, decode_timestamp,
  },
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  decode_timestamp(s).ok_or_else(|| Error::Decode(format!("bad timestamp: {s:?}")))
}

pub fn encode_misc(misc: &serde_json::Value) -> Result<String> {
  Ok(serde_json::to_string(misc)?)
}

pub fn decode_misc(s: &str) -> Result<serde_json::Value> {
  Ok(serde_json::from_str(s)?)
}

// ─── Identity rows ───────────────────────────────────────────────────────────

pub struct RawVersion {
  pub id:             i64,
  pub insertion_time: String,
  pub version_type:   String,
  pub version:        String,
}

impl RawVersion {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get("id")?,
      insertion_time: row.get("insertion_time")?,
      version_type:   row.get("version_type")?,
      version:        row.get("version")?,
    })
  }

  pub fn into_version(self) -> Result<Version> {
    Ok(Version {
      id:             self.id,
      insertion_time: decode_dt(&self.insertion_time)?,
      version_type:   VersionType::parse(&self.version_type)?,
      version:        self.version,
    })
  }
}

pub struct RawVersionedThing {
  pub versioned_id:      i64,
  pub insertion_time:    String,
  pub version_id:        i64,
  pub version_type:      String,
  pub version:           String,
  pub thing_id:          i64,
  pub thing_type:        String,
  pub unique_thing_name: String,
}

impl RawVersionedThing {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      versioned_id:      row.get("versioned_id")?,
      insertion_time:    row.get("insertion_time")?,
      version_id:        row.get("version_id")?,
      version_type:      row.get("version_type")?,
      version:           row.get("version")?,
      thing_id:          row.get("thing_id")?,
      thing_type:        row.get("thing_type")?,
      unique_thing_name: row.get("unique_thing_name")?,
    })
  }

  pub fn into_versioned_thing(self) -> Result<VersionedThing> {
    Ok(VersionedThing {
      versioned_id:      self.versioned_id,
      insertion_time:    decode_dt(&self.insertion_time)?,
      version_id:        self.version_id,
      version_type:      VersionType::parse(&self.version_type)?,
      version:           self.version,
      thing_id:          self.thing_id,
      thing_type:        ThingType::parse(&self.thing_type)?,
      unique_thing_name: self.unique_thing_name,
    })
  }
}

// ─── Ledger rows ─────────────────────────────────────────────────────────────

/// Raw values read directly from one of the ledger views. Column names are
/// those of [`RecordKind::columns`].
pub enum RawRecord {
  Build {
    build_id:        i64,
    insertion_time:  String,
    version_type:    String,
    version:         String,
    version_id:      i64,
    job_url:         String,
    job_description: String,
    duration:        i64,
    result:          String,
    misc:            String,
  },
  Artifact {
    artifact_id:       i64,
    insertion_time:    String,
    thing_id:          i64,
    thing_type:        String,
    unique_thing_name: String,
    version_type:      String,
    version_id:        i64,
    version:           String,
    build_id:          i64,
    job_url:           String,
    job_description:   String,
    duration:          i64,
    result:            String,
    misc:              String,
  },
  Promote {
    promote_id:     i64,
    insertion_time: String,
    thing_type:     String,
    thing_name:     String,
    thing_time:     String,
    environment:    String,
    misc:           String,
  },
  Deploy {
    deploy_id:      i64,
    insertion_time: String,
    thing_type:     String,
    thing_name:     String,
    version_type:   String,
    version_id:     i64,
    version:        String,
    environment:    String,
    servername:     Option<String>,
    misc:           String,
  },
}

impl RawRecord {
  pub fn from_row(kind: RecordKind, row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(match kind {
      RecordKind::Build => Self::Build {
        build_id:        row.get("build_id")?,
        insertion_time:  row.get("insertion_time")?,
        version_type:    row.get("version_type")?,
        version:         row.get("version")?,
        version_id:      row.get("version_id")?,
        job_url:         row.get("job_url")?,
        job_description: row.get("job_description")?,
        duration:        row.get("duration")?,
        result:          row.get("result")?,
        misc:            row.get("misc")?,
      },
      RecordKind::Artifact => Self::Artifact {
        artifact_id:       row.get("artifact_id")?,
        insertion_time:    row.get("insertion_time")?,
        thing_id:          row.get("thing_id")?,
        thing_type:        row.get("thing_type")?,
        unique_thing_name: row.get("unique_thing_name")?,
        version_type:      row.get("version_type")?,
        version_id:        row.get("version_id")?,
        version:           row.get("version")?,
        build_id:          row.get("build_id")?,
        job_url:           row.get("job_url")?,
        job_description:   row.get("job_description")?,
        duration:          row.get("duration")?,
        result:            row.get("result")?,
        misc:              row.get("misc")?,
      },
      RecordKind::Promote => Self::Promote {
        promote_id:     row.get("promote_id")?,
        insertion_time: row.get("insertion_time")?,
        thing_type:     row.get("thing_type")?,
        thing_name:     row.get("thing_name")?,
        thing_time:     row.get("thing_time")?,
        environment:    row.get("environment")?,
        misc:           row.get("misc")?,
      },
      RecordKind::Deploy => Self::Deploy {
        deploy_id:      row.get("deploy_id")?,
        insertion_time: row.get("insertion_time")?,
        thing_type:     row.get("thing_type")?,
        thing_name:     row.get("thing_name")?,
        version_type:   row.get("version_type")?,
        version_id:     row.get("version_id")?,
        version:        row.get("version")?,
        environment:    row.get("environment")?,
        servername:     row.get("servername")?,
        misc:           row.get("misc")?,
      },
    })
  }

  pub fn into_record(self) -> Result<Record> {
    Ok(match self {
      Self::Build {
        build_id,
        insertion_time,
        version_type,
        version,
        version_id,
        job_url,
        job_description,
        duration,
        result,
        misc,
      } => Record::Build(Build {
        build_id,
        insertion_time: decode_dt(&insertion_time)?,
        version_type: VersionType::parse(&version_type)?,
        version,
        version_id,
        job_url,
        job_description,
        duration,
        result,
        misc: decode_misc(&misc)?,
      }),
      Self::Artifact {
        artifact_id,
        insertion_time,
        thing_id,
        thing_type,
        unique_thing_name,
        version_type,
        version_id,
        version,
        build_id,
        job_url,
        job_description,
        duration,
        result,
        misc,
      } => Record::Artifact(Artifact {
        artifact_id,
        insertion_time: decode_dt(&insertion_time)?,
        thing_id,
        thing_type: ThingType::parse(&thing_type)?,
        unique_thing_name,
        version_type: VersionType::parse(&version_type)?,
        version_id,
        version,
        build_id,
        job_url,
        job_description,
        duration,
        result,
        misc: decode_misc(&misc)?,
      }),
      Self::Promote {
        promote_id,
        insertion_time,
        thing_type,
        thing_name,
        thing_time,
        environment,
        misc,
      } => Record::Promote(Promote {
        promote_id,
        insertion_time: decode_dt(&insertion_time)?,
        thing_type: ThingType::parse(&thing_type)?,
        thing_name,
        thing_time: decode_dt(&thing_time)?,
        environment: Environment::parse(&environment)?,
        misc: decode_misc(&misc)?,
      }),
      Self::Deploy {
        deploy_id,
        insertion_time,
        thing_type,
        thing_name,
        version_type,
        version_id,
        version,
        environment,
        servername,
        misc,
      } => Record::Deploy(Deploy {
        deploy_id,
        insertion_time: decode_dt(&insertion_time)?,
        thing_type: ThingType::parse(&thing_type)?,
        thing_name,
        version_type: VersionType::parse(&version_type)?,
        version_id,
        version,
        environment: Environment::parse(&environment)?,
        // A LEFT JOIN miss is the only way this is NULL.
        servername,
        misc: decode_misc(&misc)?,
      }),
    })
  }
}
