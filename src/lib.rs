pub mod eval;
pub mod features;
pub mod historical_dataset;
pub mod overs;
pub mod predictor;
pub mod vocab;
pub mod win_model;
