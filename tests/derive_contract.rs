use t20_chase::features::{InputError, MatchState, derive};
use t20_chase::overs::overs_to_balls;

fn snapshot() -> MatchState {
    MatchState {
        batting_team: "Rajasthan Royals".to_string(),
        bowling_team: "Kolkata Knight Riders".to_string(),
        city: "Jaipur".to_string(),
        target: 120,
        current_score: 40,
        overs_done: 8.5,
        wickets_fallen: 2,
    }
}

#[test]
fn overs_to_balls_reads_tenths_digit() {
    assert_eq!(overs_to_balls(8.5), 53);
    assert_eq!(overs_to_balls(0.0), 0);
    assert_eq!(overs_to_balls(19.5), 117);
}

#[test]
fn reference_chase_derives_expected_features() {
    let fv = derive(&snapshot()).expect("valid snapshot");
    assert_eq!(fv.runs_left, 80);
    assert_eq!(fv.balls_left, 67);
    assert_eq!(fv.wickets_left, 8);
    assert!((fv.crr - 4.70588235).abs() < 1e-6);
    assert!((fv.rrr - 7.16417910).abs() < 1e-6);
}

#[test]
fn spent_innings_always_rejects() {
    for overs in [20.0, 20.1] {
        let mut state = snapshot();
        state.overs_done = overs;
        assert_eq!(derive(&state), Err(InputError::OversExceeded), "overs={overs}");
    }
}

#[test]
fn chase_already_won_rejects() {
    let mut state = snapshot();
    state.current_score = 125;
    assert_eq!(derive(&state), Err(InputError::ScoreExceedsTarget));
}

#[test]
fn unselected_team_rejects_after_numeric_checks() {
    let mut state = snapshot();
    state.batting_team = String::new();
    assert_eq!(derive(&state), Err(InputError::IncompleteSelection));

    // Numeric failures take precedence over the selection check.
    state.overs_done = 20.0;
    assert_eq!(derive(&state), Err(InputError::OversExceeded));
}
