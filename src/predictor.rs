use anyhow::Result;
use thiserror::Error;

use crate::features::{self, InputError, MatchState};
use crate::vocab::{self, Vocabulary};
use crate::win_model::{self, ChaseModel, ModelError};

/// Failures of a live prediction. Input problems propagate untouched from
/// the feature deriver; model problems only arise from a broken artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PredictError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Probability pair plus the derived summary fields the caller displays.
#[derive(Debug, Clone, Copy)]
pub struct LivePrediction {
    pub win_probability: f64,
    pub loss_probability: f64,
    pub runs_left: i64,
    pub balls_left: i64,
    pub wickets_left: i64,
    pub crr: f64,
    pub rrr: f64,
}

/// Everything a live prediction needs, loaded once at startup and shared by
/// reference. Immutable after construction, so concurrent callers need no
/// coordination.
#[derive(Debug, Clone)]
pub struct PredictorContext {
    model: ChaseModel,
    teams: Vocabulary,
    cities: Vocabulary,
}

impl PredictorContext {
    pub fn new(model: ChaseModel, teams: Vocabulary, cities: Vocabulary) -> Self {
        Self {
            model,
            teams,
            cities,
        }
    }

    /// Load the model and vocabulary artifacts from their configured paths.
    pub fn load() -> Result<Self> {
        let model = win_model::load_model(&win_model::default_model_path())?;
        let teams = vocab::load_vocabulary(&vocab::team_vocab_path())?;
        let cities = vocab::load_vocabulary(&vocab::city_vocab_path())?;
        Ok(Self::new(model, teams, cities))
    }

    pub fn model(&self) -> &ChaseModel {
        &self.model
    }

    pub fn teams(&self) -> &Vocabulary {
        &self.teams
    }

    pub fn cities(&self) -> &Vocabulary {
        &self.cities
    }

    /// The sole externally callable entry point: derive features from the
    /// snapshot, classify, and bundle the summary fields. Idempotent and
    /// side-effect free.
    pub fn predict_live(&self, state: &MatchState) -> Result<LivePrediction, PredictError> {
        let fv = features::derive(state)?;
        let (win_probability, loss_probability) = self.model.predict(&fv)?;
        Ok(LivePrediction {
            win_probability,
            loss_probability,
            runs_left: fv.runs_left,
            balls_left: fv.balls_left,
            wickets_left: fv.wickets_left,
            crr: fv.crr,
            rrr: fv.rrr,
        })
    }
}
