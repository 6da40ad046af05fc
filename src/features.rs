use thiserror::Error;

use crate::overs;

/// User-correctable input problems, surfaced directly to the caller. None of
/// these warrant a retry: the same input always fails the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("overs cannot exceed the match limit")]
    OversExceeded,
    #[error("current score cannot exceed the target")]
    ScoreExceedsTarget,
    #[error("batting team, bowling team and city must all be selected")]
    IncompleteSelection,
}

/// One live snapshot of a chase, as entered by the caller.
#[derive(Debug, Clone)]
pub struct MatchState {
    pub batting_team: String,
    pub bowling_team: String,
    pub city: String,
    pub target: u32,
    pub current_score: u32,
    pub overs_done: f64,
    pub wickets_fallen: u8,
}

/// The fixed vector the classifier consumes: three passthrough categoricals
/// plus five derived numerics. Immutable once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub batting_team: String,
    pub bowling_team: String,
    pub city: String,
    pub runs_left: i64,
    pub balls_left: i64,
    pub wickets_left: i64,
    pub crr: f64,
    pub rrr: f64,
}

impl FeatureVector {
    pub const NUMERIC_NAMES: [&'static str; 5] =
        ["runs_left", "balls_left", "wickets_left", "crr", "rrr"];

    pub fn numeric(&self) -> [f64; 5] {
        [
            self.runs_left as f64,
            self.balls_left as f64,
            self.wickets_left as f64,
            self.crr,
            self.rrr,
        ]
    }

    /// Invariants that must hold before a row reaches the classifier.
    pub fn passes_invariants(&self) -> bool {
        self.runs_left >= 0
            && self.balls_left > 0
            && self.wickets_left >= 0
            && self.crr.is_finite()
            && self.rrr.is_finite()
    }
}

/// One historical delivery turned into a labelled example. Created once by
/// the dataset builder and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub result: bool,
}

/// Derive the classifier's feature vector from a live match snapshot.
///
/// Validation is ordered and fail-fast: overs limit first, then target
/// overshoot, then unselected categoricals. A snapshot with zero overs bowled
/// has no run rate yet; crr defaults to 0.0 rather than NaN.
pub fn derive(state: &MatchState) -> Result<FeatureVector, InputError> {
    let balls_left = overs::balls_remaining(state.overs_done);
    let runs_left = state.target as i64 - state.current_score as i64;
    let wickets_left = overs::WICKETS_PER_INNINGS as i64 - state.wickets_fallen as i64;

    if balls_left <= 0 {
        return Err(InputError::OversExceeded);
    }
    if runs_left < 0 {
        return Err(InputError::ScoreExceedsTarget);
    }
    if is_blank(&state.batting_team) || is_blank(&state.bowling_team) || is_blank(&state.city) {
        return Err(InputError::IncompleteSelection);
    }

    let crr = if state.overs_done > 0.0 {
        state.current_score as f64 / state.overs_done
    } else {
        0.0
    };
    let rrr = if balls_left > 0 {
        runs_left as f64 * 6.0 / balls_left as f64
    } else {
        0.0
    };

    Ok(FeatureVector {
        batting_team: state.batting_team.clone(),
        bowling_team: state.bowling_team.clone(),
        city: state.city.clone(),
        runs_left,
        balls_left,
        wickets_left,
        crr,
        rrr,
    })
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
