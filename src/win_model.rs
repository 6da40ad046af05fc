use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{FeatureVector, TrainingExample};

pub const MODEL_VERSION: u32 = 1;
pub const MODEL_PATH_ENV: &str = "CHASE_MODEL_PATH";

const MODEL_FILE: &str = "assets/chase_model_v1.json";

/// Iteration budget for the fit; the optimizer stops early once the loss
/// stops moving, and never loops past this.
pub const MAX_ITERS: usize = 1000;
const LR_START: f64 = 0.5;
const L2: f64 = 1e-4;
const CONVERGE_EPS: f64 = 1e-9;

/// Integration failures around the trained artifact. These are programmer
/// errors, not user input errors, and are not expected in correct usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model has not been trained")]
    ModelNotTrained,
    #[error("feature vector does not match the schema fixed at training time")]
    FeatureSchemaMismatch,
    #[error("no training examples left after invariant filtering")]
    EmptyTrainingSet,
}

/// Serialized form of a fitted model. The vocabularies are the categorical
/// values observed at training time, sorted; the first entry of each is the
/// dropped reference category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaseModelArtifact {
    pub version: u32,
    pub generated_at: String,
    #[serde(default)]
    pub source: Option<String>,
    pub batting_teams: Vec<String>,
    pub bowling_teams: Vec<String>,
    pub cities: Vec<String>,
    pub numeric_names: Vec<String>,
    pub numeric_means: Vec<f64>,
    pub numeric_stds: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default)]
    pub l2: f64,
    #[serde(default)]
    pub iters_run: usize,
    #[serde(default)]
    pub train_log_loss: f64,
    #[serde(default)]
    pub train_samples: usize,
}

/// A fitted logistic-regression win model with its encoding baked in.
#[derive(Debug, Clone)]
pub struct ChaseModel {
    artifact: ChaseModelArtifact,
    batting_index: HashMap<String, usize>,
    bowling_index: HashMap<String, usize>,
    city_index: HashMap<String, usize>,
}

impl ChaseModel {
    pub fn from_artifact(artifact: ChaseModelArtifact) -> Self {
        let batting_index = index_of(&artifact.batting_teams);
        let bowling_index = index_of(&artifact.bowling_teams);
        let city_index = index_of(&artifact.cities);
        Self {
            artifact,
            batting_index,
            bowling_index,
            city_index,
        }
    }

    pub fn artifact(&self) -> &ChaseModelArtifact {
        &self.artifact
    }

    pub fn set_source(&mut self, source: Option<String>) {
        self.artifact.source = source;
    }

    /// Width of the encoded vector: one indicator per non-reference category
    /// of each field, plus the five numerics.
    pub fn encoded_width(&self) -> usize {
        indicator_width(&self.artifact.batting_teams)
            + indicator_width(&self.artifact.bowling_teams)
            + indicator_width(&self.artifact.cities)
            + FeatureVector::NUMERIC_NAMES.len()
    }

    /// One-hot encode the categoricals (reference category dropped, unseen
    /// values all-zero) and standardize the numerics.
    pub fn encode(&self, features: &FeatureVector) -> Vec<f64> {
        let mut x = vec![0.0; self.encoded_width()];
        let mut offset = 0;

        offset = set_indicator(
            &mut x,
            offset,
            &self.batting_index,
            &self.artifact.batting_teams,
            &features.batting_team,
        );
        offset = set_indicator(
            &mut x,
            offset,
            &self.bowling_index,
            &self.artifact.bowling_teams,
            &features.bowling_team,
        );
        offset = set_indicator(
            &mut x,
            offset,
            &self.city_index,
            &self.artifact.cities,
            &features.city,
        );

        for (idx, raw) in features.numeric().into_iter().enumerate() {
            let mean = self.artifact.numeric_means.get(idx).copied().unwrap_or(0.0);
            let std = self
                .artifact
                .numeric_stds
                .get(idx)
                .copied()
                .unwrap_or(1.0)
                .max(1e-6);
            x[offset + idx] = (raw - mean) / std;
        }
        x
    }

    /// Win/loss probability pair for a validated feature vector. The pair is
    /// a binary complement; both values are in [0, 1].
    pub fn predict(&self, features: &FeatureVector) -> Result<(f64, f64), ModelError> {
        if self.artifact.weights.is_empty() {
            return Err(ModelError::ModelNotTrained);
        }
        if self.artifact.numeric_names != FeatureVector::NUMERIC_NAMES {
            return Err(ModelError::FeatureSchemaMismatch);
        }
        let x = self.encode(features);
        if x.len() != self.artifact.weights.len() {
            return Err(ModelError::FeatureSchemaMismatch);
        }

        let z = self.artifact.bias + dot(&self.artifact.weights, &x);
        let win = sigmoid(z);
        Ok((win, 1.0 - win))
    }
}

/// Fit a logistic regression on the surviving examples.
///
/// Rows violating the invariant set (negative runs_left, spent innings,
/// non-finite rates) are filtered before fitting. The optimizer is
/// full-batch gradient descent with a decaying step and a small L2 penalty,
/// capped at `MAX_ITERS`.
pub fn train(examples: &[TrainingExample]) -> Result<ChaseModel, ModelError> {
    let kept: Vec<&TrainingExample> = examples
        .iter()
        .filter(|e| e.features.passes_invariants())
        .collect();
    if kept.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }

    let batting_teams = observed(kept.iter().map(|e| e.features.batting_team.as_str()));
    let bowling_teams = observed(kept.iter().map(|e| e.features.bowling_team.as_str()));
    let cities = observed(kept.iter().map(|e| e.features.city.as_str()));
    let (numeric_means, numeric_stds) = numeric_norm_stats(&kept);

    let mut model = ChaseModel::from_artifact(ChaseModelArtifact {
        version: MODEL_VERSION,
        generated_at: Utc::now().to_rfc3339(),
        source: None,
        batting_teams,
        bowling_teams,
        cities,
        numeric_names: FeatureVector::NUMERIC_NAMES
            .iter()
            .map(|s| s.to_string())
            .collect(),
        numeric_means,
        numeric_stds,
        weights: Vec::new(),
        bias: 0.0,
        l2: L2,
        iters_run: 0,
        train_log_loss: 0.0,
        train_samples: kept.len(),
    });

    let rows: Vec<(Vec<f64>, f64)> = kept
        .iter()
        .map(|e| (model.encode(&e.features), if e.result { 1.0 } else { 0.0 }))
        .collect();
    let dim = model.encoded_width();
    let n = rows.len() as f64;

    let mut weights = vec![0.0; dim];
    let mut bias = 0.0;
    let mut prev_loss = f64::INFINITY;
    let mut iters_run = 0;
    let mut train_log_loss = f64::INFINITY;

    for iter in 0..MAX_ITERS {
        let (grad, grad_bias, loss_sum) = rows
            .par_iter()
            .fold(
                || (vec![0.0; dim], 0.0, 0.0),
                |mut acc, (x, y)| {
                    let z = bias + dot(&weights, x);
                    let p = sigmoid(z);
                    let dz = p - y;
                    for (g, xi) in acc.0.iter_mut().zip(x) {
                        *g += dz * xi;
                    }
                    acc.1 += dz;
                    let p_true = if *y > 0.5 { p } else { 1.0 - p };
                    acc.2 -= p_true.max(1e-12).ln();
                    acc
                },
            )
            .reduce(
                || (vec![0.0; dim], 0.0, 0.0),
                |mut a, b| {
                    for (ai, bi) in a.0.iter_mut().zip(&b.0) {
                        *ai += bi;
                    }
                    (a.0, a.1 + b.1, a.2 + b.2)
                },
            );

        let loss = loss_sum / n;
        let lr = LR_START / (1.0 + iter as f64 * 0.01);
        for (w, g) in weights.iter_mut().zip(&grad) {
            *w -= lr * (g / n + L2 * *w);
        }
        bias -= lr * grad_bias / n;

        iters_run = iter + 1;
        train_log_loss = loss;
        if (prev_loss - loss).abs() < CONVERGE_EPS {
            break;
        }
        prev_loss = loss;
    }

    model.artifact.weights = weights;
    model.artifact.bias = bias;
    model.artifact.iters_run = iters_run;
    model.artifact.train_log_loss = train_log_loss;
    Ok(model)
}

pub fn default_model_path() -> PathBuf {
    match env::var(MODEL_PATH_ENV) {
        Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw.trim()),
        _ => PathBuf::from(MODEL_FILE),
    }
}

pub fn load_model(path: &Path) -> Result<ChaseModel> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read model {}", path.display()))?;
    let artifact = serde_json::from_str::<ChaseModelArtifact>(&raw)
        .with_context(|| format!("parse model {}", path.display()))?;
    if artifact.version != MODEL_VERSION {
        return Err(anyhow!(
            "model {} has version {}, expected {}",
            path.display(),
            artifact.version,
            MODEL_VERSION
        ));
    }
    Ok(ChaseModel::from_artifact(artifact))
}

pub fn save_model(path: &Path, model: &ChaseModel) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let raw = serde_json::to_string_pretty(model.artifact()).context("serialize model")?;
    fs::write(path, raw).with_context(|| format!("write model {}", path.display()))?;
    Ok(())
}

fn observed<'a, I: IntoIterator<Item = &'a str>>(values: I) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn numeric_norm_stats(kept: &[&TrainingExample]) -> (Vec<f64>, Vec<f64>) {
    let count = FeatureVector::NUMERIC_NAMES.len();
    let n = kept.len() as f64;
    let mut means = vec![0.0; count];
    for e in kept {
        for (m, v) in means.iter_mut().zip(e.features.numeric()) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut stds = vec![0.0; count];
    for e in kept {
        for ((s, m), v) in stds.iter_mut().zip(&means).zip(e.features.numeric()) {
            let d = v - m;
            *s += d * d;
        }
    }
    for s in &mut stds {
        *s = (*s / n).sqrt().max(1e-6);
    }
    (means, stds)
}

fn index_of(values: &[String]) -> HashMap<String, usize> {
    values
        .iter()
        .enumerate()
        .map(|(idx, v)| (v.clone(), idx))
        .collect()
}

fn indicator_width(values: &[String]) -> usize {
    values.len().saturating_sub(1)
}

fn set_indicator(
    x: &mut [f64],
    offset: usize,
    index: &HashMap<String, usize>,
    values: &[String],
    value: &str,
) -> usize {
    // Index 0 is the dropped reference; an unknown value leaves the whole
    // block zero rather than erroring.
    if let Some(&idx) = index.get(value)
        && idx > 0
    {
        x[offset + idx - 1] = 1.0;
    }
    offset + indicator_width(values)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(ai, bi)| ai * bi).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(
        batting: &str,
        bowling: &str,
        city: &str,
        runs_left: i64,
        balls_left: i64,
        won: bool,
    ) -> TrainingExample {
        let overs_done = (120 - balls_left) as f64 / 6.0;
        TrainingExample {
            features: FeatureVector {
                batting_team: batting.to_string(),
                bowling_team: bowling.to_string(),
                city: city.to_string(),
                runs_left,
                balls_left,
                wickets_left: 7,
                crr: if overs_done > 0.0 {
                    60.0 / overs_done
                } else {
                    0.0
                },
                rrr: runs_left as f64 * 6.0 / balls_left as f64,
            },
            result: won,
        }
    }

    fn toy_examples() -> Vec<TrainingExample> {
        let mut out = Vec::new();
        for i in 0..30 {
            let city = if i % 2 == 0 { "Chennai" } else { "Mumbai" };
            out.push(example("CSK", "MI", city, 10 + i % 5, 60, true));
            out.push(example("MI", "CSK", city, 90 + i % 5, 24, false));
        }
        out
    }

    #[test]
    fn probabilities_are_complementary() {
        let examples = toy_examples();
        let model = train(&examples).unwrap();
        let (win, loss) = model.predict(&examples[0].features).unwrap();
        assert!((win + loss - 1.0).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&win));
    }

    #[test]
    fn easy_chase_beats_steep_chase() {
        let model = train(&toy_examples()).unwrap();
        let easy = example("CSK", "MI", "Chennai", 12, 60, true);
        let steep = example("CSK", "MI", "Chennai", 92, 24, false);
        let (p_easy, _) = model.predict(&easy.features).unwrap();
        let (p_steep, _) = model.predict(&steep.features).unwrap();
        assert!(p_easy > p_steep);
    }

    #[test]
    fn unknown_categorical_degrades_gracefully() {
        let model = train(&toy_examples()).unwrap();
        let stranger = example("Gujarat Titans", "MI", "Vizag", 40, 50, true);
        let (win, loss) = model.predict(&stranger.features).unwrap();
        assert!((win + loss - 1.0).abs() < 1e-12);
        assert!(win.is_finite());
    }

    #[test]
    fn invariant_violations_are_filtered_before_fitting() {
        let mut examples = toy_examples();
        let mut bad = example("CSK", "MI", "Chennai", 10, 60, true);
        bad.features.crr = f64::NAN;
        examples.push(bad);
        let mut bad = example("CSK", "MI", "Chennai", -5, 60, true);
        bad.features.rrr = -0.5;
        examples.push(bad);

        let model = train(&examples).unwrap();
        assert_eq!(model.artifact().train_samples, toy_examples().len());
    }

    #[test]
    fn empty_training_set_is_an_error() {
        let mut bad = example("CSK", "MI", "Chennai", 10, 60, true);
        bad.features.balls_left = 0;
        assert_eq!(train(&[bad]).unwrap_err(), ModelError::EmptyTrainingSet);
    }

    #[test]
    fn untrained_artifact_refuses_to_predict() {
        let trained = train(&toy_examples()).unwrap();
        let mut artifact = trained.artifact().clone();
        artifact.weights.clear();
        let model = ChaseModel::from_artifact(artifact);
        let fv = toy_examples()[0].features.clone();
        assert_eq!(model.predict(&fv), Err(ModelError::ModelNotTrained));
    }

    #[test]
    fn truncated_weights_are_a_schema_mismatch() {
        let trained = train(&toy_examples()).unwrap();
        let mut artifact = trained.artifact().clone();
        artifact.weights.pop();
        let model = ChaseModel::from_artifact(artifact);
        let fv = toy_examples()[0].features.clone();
        assert_eq!(model.predict(&fv), Err(ModelError::FeatureSchemaMismatch));
    }

    #[test]
    fn fit_stays_within_iteration_budget() {
        let model = train(&toy_examples()).unwrap();
        assert!(model.artifact().iters_run <= MAX_ITERS);
        assert!(model.artifact().iters_run > 0);
        assert!(model.artifact().train_log_loss.is_finite());
    }

    #[test]
    fn reference_category_encodes_to_zero_block() {
        let model = train(&toy_examples()).unwrap();
        // Sorted vocab puts "CSK" first for batting; its indicator block is
        // all zero, same as an unknown value's.
        let reference = example("CSK", "MI", "Chennai", 40, 50, true);
        let unknown = example("Punjab Kings", "MI", "Chennai", 40, 50, true);
        let x_ref = model.encode(&reference.features);
        let x_unk = model.encode(&unknown.features);
        let bt_width = model.artifact().batting_teams.len() - 1;
        assert!(x_ref[..bt_width].iter().all(|v| *v == 0.0));
        assert_eq!(x_ref[..bt_width], x_unk[..bt_width]);
    }
}
