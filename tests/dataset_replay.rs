use rusqlite::{Connection, params};

use t20_chase::features::TrainingExample;
use t20_chase::historical_dataset::{self, SchemaError};

/// Two-match fixture: match 1 is in scope, match 2 has the wrong season,
/// match 3 has no recorded city.
fn seeded_db() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    historical_dataset::init_schema(&conn).expect("init schema");

    let matches = [
        (1, "IPL 2023", Some("Chennai"), "CSK", "MI", Some("Chennai Super Kings")),
        (2, "BBL 2023", Some("Perth"), "SCO", "HUR", Some("Perth Scorchers")),
        (3, "IPL 2023", None::<&str>, "RR", "KKR", Some("Rajasthan Royals")),
    ];
    for (id, season, city, team1, team2, winner) in matches {
        conn.execute(
            "INSERT INTO matches (id, season, city, team1, team2, winner)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, season, city, team1, team2, winner],
        )
        .expect("insert match");
    }

    // (match_id, inning, over, ball, batting, bowling, runs, dismissed)
    let deliveries = [
        (1, 1, 1, 1, "Chennai Super Kings", "Mumbai Indians", 4, None::<&str>),
        (1, 1, 1, 2, "Chennai Super Kings", "Mumbai Indians", 1, Some("R. Sharma")),
        (1, 1, 1, 3, "Chennai Super Kings", "Mumbai Indians", 6, None),
        (1, 2, 1, 1, "Mumbai Indians", "Chennai Super Kings", 2, None),
        (1, 2, 1, 2, "Mumbai Indians", "Chennai Super Kings", 5, None),
        (2, 1, 1, 1, "Perth Scorchers", "Hobart Hurricanes", 3, None),
        (3, 1, 1, 1, "Rajasthan Royals", "Kolkata Knight Riders", 1, None),
    ];
    for (match_id, inning, over, ball, batting, bowling, runs, dismissed) in deliveries {
        conn.execute(
            "INSERT INTO deliveries (match_id, inning, over, ball, batting_team,
                                     bowling_team, total_runs, player_dismissed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![match_id, inning, over, ball, batting, bowling, runs, dismissed],
        )
        .expect("insert delivery");
    }

    conn
}

fn build(conn: &Connection) -> (Vec<TrainingExample>, historical_dataset::BuildSummary) {
    let matches = historical_dataset::load_matches(conn, "IPL").expect("load matches");
    let deliveries = historical_dataset::load_deliveries(conn).expect("load deliveries");
    historical_dataset::build_training_examples(&matches, &deliveries)
}

#[test]
fn replay_reconstructs_running_state() {
    let conn = seeded_db();
    let (examples, summary) = build(&conn);

    // Match 2 (wrong season) and match 3 (no city) are dropped.
    assert_eq!(summary.examples_built, 5);
    assert_eq!(summary.rows_dropped, 2);
    assert_eq!(examples.len(), 5);

    // Target is the whole-match total (4+1+6 + 2+5 = 18), not the
    // first-innings total: the chasing side's runs_left counts down from 18.
    let second_inning: Vec<_> = examples
        .iter()
        .filter(|e| e.features.batting_team == "Mumbai Indians")
        .collect();
    assert_eq!(
        second_inning
            .iter()
            .map(|e| e.features.runs_left)
            .collect::<Vec<_>>(),
        vec![18 - 2, 18 - 7]
    );

    // Running score includes the current ball; wicket count is strictly prior.
    let first_inning: Vec<_> = examples
        .iter()
        .filter(|e| e.features.batting_team == "Chennai Super Kings")
        .collect();
    assert_eq!(first_inning.len(), 3);
    assert_eq!(scores(&first_inning), vec![4, 5, 11]);
    assert_eq!(
        first_inning
            .iter()
            .map(|e| e.features.wickets_left)
            .collect::<Vec<_>>(),
        vec![10, 10, 9]
    );

    // First ball of each innings has zero overs bowled: crr is NaN there and
    // the row is excluded by the invariant filter, never by the builder.
    assert!(first_inning[0].features.crr.is_nan());
    assert!(!first_inning[0].features.passes_invariants());
    assert!(first_inning[1].features.crr.is_finite());

    // Labels follow the match winner.
    assert!(first_inning.iter().all(|e| e.result));
    assert!(second_inning.iter().all(|e| !e.result));
}

fn scores(examples: &[&TrainingExample]) -> Vec<i64> {
    examples
        .iter()
        .map(|e| 18 - e.features.runs_left)
        .collect()
}

#[test]
fn replay_is_deterministic() {
    let conn = seeded_db();
    let (first, _) = build(&conn);
    let (second, _) = build(&conn);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.features.batting_team, b.features.batting_team);
        assert_eq!(a.features.runs_left, b.features.runs_left);
        assert_eq!(a.features.balls_left, b.features.balls_left);
        assert_eq!(a.features.wickets_left, b.features.wickets_left);
        // Bitwise so NaN first-ball rows compare equal too.
        assert_eq!(a.features.crr.to_bits(), b.features.crr.to_bits());
        assert_eq!(a.features.rrr.to_bits(), b.features.rrr.to_bits());
        assert_eq!(a.result, b.result);
    }
}

#[test]
fn stored_examples_round_trip() {
    let mut conn = seeded_db();
    let (examples, _) = build(&conn);
    let stored = historical_dataset::store_training_examples(&mut conn, &examples)
        .expect("store examples");
    assert_eq!(stored, examples.len());

    let loaded = historical_dataset::load_training_examples(&conn).expect("load examples");
    assert_eq!(loaded.len(), examples.len());
    for (a, b) in examples.iter().zip(&loaded) {
        assert_eq!(a.features.city, b.features.city);
        assert_eq!(a.features.balls_left, b.features.balls_left);
        assert_eq!(a.features.crr.to_bits(), b.features.crr.to_bits());
        assert_eq!(a.result, b.result);
    }
}

#[test]
fn missing_column_fails_before_any_row() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(
        "CREATE TABLE matches (id INTEGER, season TEXT, city TEXT, team1 TEXT, team2 TEXT, winner TEXT);
         CREATE TABLE deliveries (match_id INTEGER, inning INTEGER, over INTEGER,
                                  batting_team TEXT, bowling_team TEXT,
                                  total_runs INTEGER, player_dismissed TEXT);",
    )
    .expect("create tables");

    assert_eq!(
        historical_dataset::validate_schema(&conn),
        Err(SchemaError::MissingColumn {
            table: "deliveries",
            column: "ball"
        })
    );
}

#[test]
fn missing_table_fails_before_any_row() {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(
        "CREATE TABLE matches (id INTEGER, season TEXT, city TEXT, team1 TEXT, team2 TEXT, winner TEXT);",
    )
    .expect("create tables");

    assert_eq!(
        historical_dataset::validate_schema(&conn),
        Err(SchemaError::MissingTable { table: "deliveries" })
    );
}
