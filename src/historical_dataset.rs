use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use thiserror::Error;

use crate::features::{FeatureVector, TrainingExample};
use crate::overs;

pub const DEFAULT_SEASON_FILTER: &str = "IPL";
pub const DB_PATH_ENV: &str = "CHASE_DB_PATH";

const DB_FILE: &str = "data/chase_history.sqlite";

const MATCH_COLUMNS: [&str; 6] = ["id", "season", "city", "team1", "team2", "winner"];
const DELIVERY_COLUMNS: [&str; 8] = [
    "match_id",
    "inning",
    "over",
    "ball",
    "batting_team",
    "bowling_team",
    "total_runs",
    "player_dismissed",
];

/// Fatal table-shape problems, raised before any row is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("table {table} not found")]
    MissingTable { table: &'static str },
    #[error("table {table} is missing required column {column}")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// One row of the match-level table.
#[derive(Debug, Clone)]
pub struct MatchRow {
    pub id: i64,
    pub season: String,
    pub city: Option<String>,
    pub team1: String,
    pub team2: String,
    pub winner: Option<String>,
}

/// One row of the ball-by-ball table.
#[derive(Debug, Clone)]
pub struct DeliveryRow {
    pub match_id: i64,
    pub inning: i64,
    pub over: i64,
    pub ball: i64,
    pub batting_team: String,
    pub bowling_team: String,
    pub total_runs: i64,
    pub player_dismissed: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildSummary {
    pub matches_in_scope: usize,
    pub deliveries_total: usize,
    pub examples_built: usize,
    pub rows_dropped: usize,
}

pub fn default_db_path() -> PathBuf {
    match env::var(DB_PATH_ENV) {
        Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw.trim()),
        _ => PathBuf::from(DB_FILE),
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY,
            season TEXT NOT NULL,
            city TEXT NULL,
            team1 TEXT NOT NULL,
            team2 TEXT NOT NULL,
            winner TEXT NULL
        );
        CREATE TABLE IF NOT EXISTS deliveries (
            match_id INTEGER NOT NULL,
            inning INTEGER NOT NULL,
            over INTEGER NOT NULL,
            ball INTEGER NOT NULL,
            batting_team TEXT NOT NULL,
            bowling_team TEXT NOT NULL,
            total_runs INTEGER NOT NULL,
            player_dismissed TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_deliveries_match ON deliveries(match_id);
        CREATE TABLE IF NOT EXISTS training_examples (
            batting_team TEXT NOT NULL,
            bowling_team TEXT NOT NULL,
            city TEXT NOT NULL,
            runs_left INTEGER NOT NULL,
            balls_left INTEGER NOT NULL,
            wickets_left INTEGER NOT NULL,
            crr REAL NULL,
            rrr REAL NULL,
            result INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Check both input tables for the required columns. Runs before any row is
/// read so a malformed table never fails mid-pipeline.
pub fn validate_schema(conn: &Connection) -> Result<(), SchemaError> {
    check_table(conn, "matches", &MATCH_COLUMNS)?;
    check_table(conn, "deliveries", &DELIVERY_COLUMNS)?;
    Ok(())
}

fn check_table(
    conn: &Connection,
    table: &'static str,
    required: &[&'static str],
) -> Result<(), SchemaError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|_| SchemaError::MissingTable { table })?;
    let mut present = Vec::new();
    let mut rows = stmt
        .query([])
        .map_err(|_| SchemaError::MissingTable { table })?;
    while let Ok(Some(row)) = rows.next() {
        if let Ok(name) = row.get::<_, String>(1) {
            present.push(name);
        }
    }
    if present.is_empty() {
        return Err(SchemaError::MissingTable { table });
    }
    for column in required {
        if !present.iter().any(|name| name == column) {
            return Err(SchemaError::MissingColumn { table, column });
        }
    }
    Ok(())
}

/// Load matches whose season names the target competition (substring match).
pub fn load_matches(conn: &Connection, season_filter: &str) -> Result<Vec<MatchRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, season, city, team1, team2, winner
             FROM matches
             WHERE instr(season, ?1) > 0
             ORDER BY rowid ASC",
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map(params![season_filter], |row| {
            Ok(MatchRow {
                id: row.get(0)?,
                season: row.get(1)?,
                city: row.get(2)?,
                team1: row.get(3)?,
                team2: row.get(4)?,
                winner: row.get(5)?,
            })
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

/// Load every delivery in insertion order. The replay below depends on this
/// ordering being stable across runs.
pub fn load_deliveries(conn: &Connection) -> Result<Vec<DeliveryRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT match_id, inning, over, ball, batting_team, bowling_team,
                    total_runs, player_dismissed
             FROM deliveries
             ORDER BY rowid ASC",
        )
        .context("prepare load deliveries query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(DeliveryRow {
                match_id: row.get(0)?,
                inning: row.get(1)?,
                over: row.get(2)?,
                ball: row.get(3)?,
                batting_team: row.get(4)?,
                bowling_team: row.get(5)?,
                total_runs: row.get(6)?,
                player_dismissed: row.get(7)?,
            })
        })
        .context("query load deliveries")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode delivery row")?);
    }
    Ok(out)
}

/// Training-time overs progress for a delivery. This intentionally differs
/// from the runtime whole.tenths convention in `overs::overs_to_balls`; the
/// two formulas stay separate so stored models keep seeing the feature
/// definition they were fit against. Unifying them would shift every
/// training feature.
pub fn delivery_overs(over: i64, ball: i64) -> f64 {
    (over - 1) as f64 + (ball - 1) as f64 / 6.0
}

#[derive(Default)]
struct InningProgress {
    runs: i64,
    wickets: i64,
}

/// Replay the historical record into one labelled example per delivery.
///
/// The chase target is the total runs scored across the whole match (a
/// documented approximation, not the first-innings total), the running score
/// includes the current ball, and the wicket count is strictly prior to it.
/// First-ball rows carry a NaN crr and are removed later by the classifier's
/// invariant filter.
pub fn build_training_examples(
    matches: &[MatchRow],
    deliveries: &[DeliveryRow],
) -> (Vec<TrainingExample>, BuildSummary) {
    let by_id: HashMap<i64, &MatchRow> = matches.iter().map(|m| (m.id, m)).collect();

    let mut targets: HashMap<i64, i64> = HashMap::with_capacity(by_id.len());
    for d in deliveries {
        *targets.entry(d.match_id).or_insert(0) += d.total_runs;
    }

    let mut summary = BuildSummary {
        matches_in_scope: matches.len(),
        deliveries_total: deliveries.len(),
        ..BuildSummary::default()
    };

    let mut progress: HashMap<(i64, i64), InningProgress> = HashMap::new();
    let mut out = Vec::with_capacity(deliveries.len());

    for d in deliveries {
        let inning = progress.entry((d.match_id, d.inning)).or_default();
        inning.runs += d.total_runs;
        let current_score = inning.runs;
        let wickets_fallen = inning.wickets;
        if d.player_dismissed.is_some() {
            inning.wickets += 1;
        }

        let Some(m) = by_id.get(&d.match_id) else {
            summary.rows_dropped += 1;
            continue;
        };
        let Some(city) = m.city.as_deref().filter(|c| !c.trim().is_empty()) else {
            summary.rows_dropped += 1;
            continue;
        };
        let Some(winner) = m.winner.as_deref().filter(|w| !w.trim().is_empty()) else {
            summary.rows_dropped += 1;
            continue;
        };

        let target = targets.get(&d.match_id).copied().unwrap_or(0);
        let overs_done = delivery_overs(d.over, d.ball);
        let balls_left =
            overs::BALLS_PER_INNINGS as i64 - overs::overs_to_balls(overs_done) as i64;
        let runs_left = target - current_score;
        let wickets_left = overs::WICKETS_PER_INNINGS as i64 - wickets_fallen;

        let crr = if overs_done > 0.0 {
            current_score as f64 / overs_done
        } else {
            f64::NAN
        };
        let rrr = if balls_left > 0 {
            runs_left as f64 * 6.0 / balls_left as f64
        } else {
            0.0
        };

        out.push(TrainingExample {
            features: FeatureVector {
                batting_team: d.batting_team.clone(),
                bowling_team: d.bowling_team.clone(),
                city: city.to_string(),
                runs_left,
                balls_left,
                wickets_left,
                crr,
                rrr,
            },
            result: d.batting_team == winner,
        });
        summary.examples_built += 1;
    }

    (out, summary)
}

/// Replace the stored example set with a freshly built one.
pub fn store_training_examples(
    conn: &mut Connection,
    examples: &[TrainingExample],
) -> Result<usize> {
    let tx = conn.transaction().context("begin examples transaction")?;
    tx.execute("DELETE FROM training_examples", [])
        .context("clear training examples")?;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO training_examples (
                    batting_team, bowling_team, city,
                    runs_left, balls_left, wickets_left, crr, rrr, result
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .context("prepare insert example")?;
        for example in examples {
            let f = &example.features;
            // sqlite has no NaN; NULL stands in for the undefined first-ball
            // run rate and is restored on load.
            stmt.execute(params![
                f.batting_team,
                f.bowling_team,
                f.city,
                f.runs_left,
                f.balls_left,
                f.wickets_left,
                finite_or_null(f.crr),
                finite_or_null(f.rrr),
                example.result as i64,
            ])
            .context("insert training example")?;
        }
    }
    tx.commit().context("commit examples transaction")?;
    Ok(examples.len())
}

pub fn load_training_examples(conn: &Connection) -> Result<Vec<TrainingExample>> {
    let mut stmt = conn
        .prepare(
            "SELECT batting_team, bowling_team, city,
                    runs_left, balls_left, wickets_left, crr, rrr, result
             FROM training_examples
             ORDER BY rowid ASC",
        )
        .context("prepare load examples query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(TrainingExample {
                features: FeatureVector {
                    batting_team: row.get(0)?,
                    bowling_team: row.get(1)?,
                    city: row.get(2)?,
                    runs_left: row.get(3)?,
                    balls_left: row.get(4)?,
                    wickets_left: row.get(5)?,
                    crr: row.get::<_, Option<f64>>(6)?.unwrap_or(f64::NAN),
                    rrr: row.get::<_, Option<f64>>(7)?.unwrap_or(f64::NAN),
                },
                result: row.get::<_, i64>(8)? != 0,
            })
        })
        .context("query load examples")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode training example")?);
    }
    Ok(out)
}

fn finite_or_null(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
