//! Identity resolution: the lookup-or-create step for versions, things,
//! servernames and versioned things.
//!
//! These run on a connection that is already inside the caller's
//! transaction. Each one reads by natural key first and only writes when
//! the key is new. The insert uses `ON CONFLICT DO NOTHING`, and the row
//! is then read again, so a writer that lost a race against another
//! connection converges on the winner's id instead of failing.

use history_core::record::{RowId, ThingType, VersionType};
use rusqlite::{Connection, OptionalExtension as _, ToSql};

fn ensure_row(
  conn: &Connection,
  table: &'static str,
  select: &str,
  insert: &str,
  key: &[&dyn ToSql],
  now: &str,
) -> rusqlite::Result<RowId> {
  if let Some(id) = conn.query_row(select, key, |r| r.get(0)).optional()? {
    return Ok(id);
  }

  let mut insert_params: Vec<&dyn ToSql> = Vec::with_capacity(key.len() + 1);
  insert_params.push(&now);
  insert_params.extend_from_slice(key);

  if conn.execute(insert, insert_params.as_slice())? == 0 {
    tracing::debug!(table, "identity row created concurrently; re-reading");
  }

  let id: RowId = conn.query_row(select, key, |r| r.get(0))?;
  tracing::debug!(table, id, "resolved new identity row");
  Ok(id)
}

pub fn ensure_version(
  conn: &Connection,
  version_type: VersionType,
  version: &str,
  now: &str,
) -> rusqlite::Result<RowId> {
  ensure_row(
    conn,
    "version",
    "SELECT id FROM version WHERE version_type = ?1 AND version = ?2",
    "INSERT INTO version (insertion_time, version_type, version)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (version_type, version) DO NOTHING",
    &[&version_type.as_str(), &version],
    now,
  )
}

pub fn ensure_thing(
  conn: &Connection,
  thing_type: ThingType,
  name: &str,
  now: &str,
) -> rusqlite::Result<RowId> {
  ensure_row(
    conn,
    "thing",
    "SELECT id FROM thing WHERE thing_type = ?1 AND unique_thing_name = ?2",
    "INSERT INTO thing (insertion_time, thing_type, unique_thing_name)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (thing_type, unique_thing_name) DO NOTHING",
    &[&thing_type.as_str(), &name],
    now,
  )
}

pub fn ensure_servername(
  conn: &Connection,
  servername: &str,
  now: &str,
) -> rusqlite::Result<RowId> {
  ensure_row(
    conn,
    "servername",
    "SELECT id FROM servername WHERE servername = ?1",
    "INSERT INTO servername (insertion_time, servername)
     VALUES (?1, ?2)
     ON CONFLICT (servername) DO NOTHING",
    &[&servername],
    now,
  )
}

/// Three dependent resolutions: version, thing, then their pairing.
pub fn ensure_versioned_thing(
  conn: &Connection,
  version_type: VersionType,
  version: &str,
  thing_type: ThingType,
  name: &str,
  now: &str,
) -> rusqlite::Result<RowId> {
  let version_id = ensure_version(conn, version_type, version, now)?;
  let thing_id = ensure_thing(conn, thing_type, name, now)?;
  ensure_row(
    conn,
    "versioned_thing",
    "SELECT id FROM versioned_thing WHERE version_id = ?1 AND thing_id = ?2",
    "INSERT INTO versioned_thing (insertion_time, version_id, thing_id)
     VALUES (?1, ?2, ?3)
     ON CONFLICT (version_id, thing_id) DO NOTHING",
    &[&version_id, &thing_id],
    now,
  )
}
