//! SQL schema for the history SQLite store.
//!
//! Executed once at connection startup. Identity tables carry the natural
//! key uniqueness constraints that `ensure_*` relies on; every table is
//! guarded by triggers that reject UPDATE and DELETE.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA case_sensitive_like = ON;

-- ── Identity ────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS version (
    id             INTEGER PRIMARY KEY,
    insertion_time TEXT NOT NULL,
    version_type   TEXT NOT NULL CHECK (version_type IN ('package', 'changeset')),
    version        TEXT NOT NULL,
    UNIQUE (version_type, version)
);

CREATE TABLE IF NOT EXISTS thing (
    id                INTEGER PRIMARY KEY,
    insertion_time    TEXT NOT NULL,
    thing_type        TEXT NOT NULL
                      CHECK (thing_type IN ('filename', 'config', 'dockerimage', 'git_repo')),
    unique_thing_name TEXT NOT NULL,
    UNIQUE (thing_type, unique_thing_name)
);

CREATE TABLE IF NOT EXISTS servername (
    id             INTEGER PRIMARY KEY,
    insertion_time TEXT NOT NULL,
    servername     TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS versioned_thing (
    id             INTEGER PRIMARY KEY,
    insertion_time TEXT NOT NULL,
    version_id     INTEGER NOT NULL REFERENCES version(id),
    thing_id       INTEGER NOT NULL REFERENCES thing(id),
    UNIQUE (version_id, thing_id)
);

-- ── Ledger ──────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS build (
    id              INTEGER PRIMARY KEY,
    insertion_time  TEXT    NOT NULL,
    version_id      INTEGER NOT NULL REFERENCES version(id),
    job_url         TEXT    NOT NULL,
    job_description TEXT    NOT NULL,
    duration        INTEGER NOT NULL,
    result          TEXT    NOT NULL DEFAULT '',
    misc            TEXT    NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS artifact (
    id                 INTEGER PRIMARY KEY,
    insertion_time     TEXT    NOT NULL,
    versioned_thing_id INTEGER NOT NULL REFERENCES versioned_thing(id),
    build_id           INTEGER NOT NULL REFERENCES build(id),
    misc               TEXT    NOT NULL DEFAULT '{}'
);

-- Keyed to the thing, not a versioned thing: promotion is version-agnostic.
CREATE TABLE IF NOT EXISTS promote (
    id             INTEGER PRIMARY KEY,
    insertion_time TEXT    NOT NULL,
    thing_id       INTEGER NOT NULL REFERENCES thing(id),
    environment    TEXT    NOT NULL CHECK (environment IN ('production', 'qa', 'system')),
    misc           TEXT    NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS deploy (
    id                 INTEGER PRIMARY KEY,
    insertion_time     TEXT    NOT NULL,
    versioned_thing_id INTEGER NOT NULL REFERENCES versioned_thing(id),
    servername_id      INTEGER REFERENCES servername(id),   -- NULL: no server
    environment        TEXT    NOT NULL CHECK (environment IN ('production', 'qa', 'system')),
    misc               TEXT    NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS build_version_idx        ON build(version_id);
CREATE INDEX IF NOT EXISTS build_job_url_idx        ON build(job_url);
CREATE INDEX IF NOT EXISTS artifact_vt_idx          ON artifact(versioned_thing_id);
CREATE INDEX IF NOT EXISTS artifact_build_idx       ON artifact(build_id);
CREATE INDEX IF NOT EXISTS promote_thing_idx        ON promote(thing_id);
CREATE INDEX IF NOT EXISTS deploy_vt_idx            ON deploy(versioned_thing_id);
CREATE INDEX IF NOT EXISTS versioned_thing_thing_idx ON versioned_thing(thing_id);

-- ── Append-only guards ──────────────────────────────────────────────────

CREATE TRIGGER IF NOT EXISTS version_no_update BEFORE UPDATE ON version
BEGIN SELECT RAISE(ABORT, 'version rows are immutable'); END;
CREATE TRIGGER IF NOT EXISTS version_no_delete BEFORE DELETE ON version
BEGIN SELECT RAISE(ABORT, 'version rows are immutable'); END;

CREATE TRIGGER IF NOT EXISTS thing_no_update BEFORE UPDATE ON thing
BEGIN SELECT RAISE(ABORT, 'thing rows are immutable'); END;
CREATE TRIGGER IF NOT EXISTS thing_no_delete BEFORE DELETE ON thing
BEGIN SELECT RAISE(ABORT, 'thing rows are immutable'); END;

CREATE TRIGGER IF NOT EXISTS servername_no_update BEFORE UPDATE ON servername
BEGIN SELECT RAISE(ABORT, 'servername rows are immutable'); END;
CREATE TRIGGER IF NOT EXISTS servername_no_delete BEFORE DELETE ON servername
BEGIN SELECT RAISE(ABORT, 'servername rows are immutable'); END;

CREATE TRIGGER IF NOT EXISTS versioned_thing_no_update BEFORE UPDATE ON versioned_thing
BEGIN SELECT RAISE(ABORT, 'versioned_thing rows are immutable'); END;
CREATE TRIGGER IF NOT EXISTS versioned_thing_no_delete BEFORE DELETE ON versioned_thing
BEGIN SELECT RAISE(ABORT, 'versioned_thing rows are immutable'); END;

CREATE TRIGGER IF NOT EXISTS build_no_update BEFORE UPDATE ON build
BEGIN SELECT RAISE(ABORT, 'build rows are append-only'); END;
CREATE TRIGGER IF NOT EXISTS build_no_delete BEFORE DELETE ON build
BEGIN SELECT RAISE(ABORT, 'build rows are append-only'); END;

CREATE TRIGGER IF NOT EXISTS artifact_no_update BEFORE UPDATE ON artifact
BEGIN SELECT RAISE(ABORT, 'artifact rows are append-only'); END;
CREATE TRIGGER IF NOT EXISTS artifact_no_delete BEFORE DELETE ON artifact
BEGIN SELECT RAISE(ABORT, 'artifact rows are append-only'); END;

CREATE TRIGGER IF NOT EXISTS promote_no_update BEFORE UPDATE ON promote
BEGIN SELECT RAISE(ABORT, 'promote rows are append-only'); END;
CREATE TRIGGER IF NOT EXISTS promote_no_delete BEFORE DELETE ON promote
BEGIN SELECT RAISE(ABORT, 'promote rows are append-only'); END;

CREATE TRIGGER IF NOT EXISTS deploy_no_update BEFORE UPDATE ON deploy
BEGIN SELECT RAISE(ABORT, 'deploy rows are append-only'); END;
CREATE TRIGGER IF NOT EXISTS deploy_no_delete BEFORE DELETE ON deploy
BEGIN SELECT RAISE(ABORT, 'deploy rows are append-only'); END;

-- ── Read views ──────────────────────────────────────────────────────────
-- Column lists must match RecordKind::columns in history-core.

CREATE VIEW IF NOT EXISTS versioned_things_view AS
SELECT
    vt.id                  AS versioned_id,
    vt.insertion_time      AS insertion_time,
    v.id                   AS version_id,
    v.version_type         AS version_type,
    v.version              AS version,
    t.id                   AS thing_id,
    t.thing_type           AS thing_type,
    t.unique_thing_name    AS unique_thing_name
FROM versioned_thing vt
JOIN version v ON v.id = vt.version_id
JOIN thing   t ON t.id = vt.thing_id;

CREATE VIEW IF NOT EXISTS builds_view AS
SELECT
    b.id                   AS build_id,
    b.insertion_time       AS insertion_time,
    v.version_type         AS version_type,
    v.version              AS version,
    b.version_id           AS version_id,
    b.job_url              AS job_url,
    b.job_description      AS job_description,
    b.duration             AS duration,
    b.result               AS result,
    b.misc                 AS misc
FROM build b
JOIN version v ON v.id = b.version_id;

CREATE VIEW IF NOT EXISTS artifacts_view AS
SELECT
    a.id                   AS artifact_id,
    a.insertion_time       AS insertion_time,
    t.id                   AS thing_id,
    t.thing_type           AS thing_type,
    t.unique_thing_name    AS unique_thing_name,
    v.version_type         AS version_type,
    v.id                   AS version_id,
    v.version              AS version,
    b.id                   AS build_id,
    b.job_url              AS job_url,
    b.job_description      AS job_description,
    b.duration             AS duration,
    b.result               AS result,
    a.misc                 AS misc
FROM artifact a
JOIN versioned_thing vt ON vt.id = a.versioned_thing_id
JOIN version         v  ON v.id  = vt.version_id
JOIN thing           t  ON t.id  = vt.thing_id
JOIN build           b  ON b.id  = a.build_id;

CREATE VIEW IF NOT EXISTS promotes_view AS
SELECT
    p.id                   AS promote_id,
    p.insertion_time       AS insertion_time,
    t.thing_type           AS thing_type,
    t.unique_thing_name    AS thing_name,
    t.insertion_time       AS thing_time,
    p.environment          AS environment,
    p.misc                 AS misc
FROM promote p
JOIN thing t ON t.id = p.thing_id;

CREATE VIEW IF NOT EXISTS deploys_view AS
SELECT
    d.id                   AS deploy_id,
    d.insertion_time       AS insertion_time,
    t.thing_type           AS thing_type,
    t.unique_thing_name    AS thing_name,
    v.version_type         AS version_type,
    v.id                   AS version_id,
    v.version              AS version,
    d.environment          AS environment,
    s.servername           AS servername,
    d.misc                 AS misc
FROM deploy d
JOIN versioned_thing vt ON vt.id = d.versioned_thing_id
JOIN version         v  ON v.id  = vt.version_id
JOIN thing           t  ON t.id  = vt.thing_id
LEFT JOIN servername s  ON s.id  = d.servername_id;

PRAGMA user_version = 1;
";
