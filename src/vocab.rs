use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const VOCAB_VERSION: u32 = 1;

pub const TEAM_VOCAB_ENV: &str = "CHASE_TEAM_VOCAB_PATH";
pub const CITY_VOCAB_ENV: &str = "CHASE_CITY_VOCAB_PATH";

const TEAM_VOCAB_FILE: &str = "assets/team_vocab_v1.json";
const CITY_VOCAB_FILE: &str = "assets/city_vocab_v1.json";

/// Serialized form of a categorical vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyArtifact {
    pub version: u32,
    pub generated_at: String,
    #[serde(default)]
    pub source: Option<String>,
    pub values: Vec<String>,
}

/// Ordered set of valid categorical values. Used to populate selection
/// inputs; the classifier itself tolerates values outside the set.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    values: Vec<String>,
}

impl Vocabulary {
    /// Build from observed values: trimmed, deduplicated, sorted.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        out.sort();
        out.dedup();
        Self { values: out }
    }

    pub fn from_artifact(artifact: VocabularyArtifact) -> Self {
        Self::from_values(artifact.values)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, value: &str) -> bool {
        let want = value.trim();
        self.values.iter().any(|v| v == want)
    }

    pub fn to_artifact(&self, source: Option<String>) -> VocabularyArtifact {
        VocabularyArtifact {
            version: VOCAB_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            source,
            values: self.values.clone(),
        }
    }
}

/// Curated franchise list kept in sync with the historical record.
pub fn curated_teams() -> Vocabulary {
    Vocabulary::from_values([
        "Sunrisers Hyderabad",
        "Mumbai Indians",
        "Gujarat Titans",
        "Royal Challengers Bangalore",
        "Kolkata Knight Riders",
        "Kings XI Punjab",
        "Chennai Super Kings",
        "Rajasthan Royals",
        "Delhi Capitals",
    ])
}

/// Curated host-city list.
pub fn curated_cities() -> Vocabulary {
    Vocabulary::from_values([
        "Ahmedabad",
        "Bangalore",
        "Chennai",
        "Delhi",
        "Hyderabad",
        "Kolkata",
        "Mumbai",
        "Chandigarh",
        "Jaipur",
        "Vizag",
    ])
}

pub fn team_vocab_path() -> PathBuf {
    path_from_env_or_default(TEAM_VOCAB_ENV, TEAM_VOCAB_FILE)
}

pub fn city_vocab_path() -> PathBuf {
    path_from_env_or_default(CITY_VOCAB_ENV, CITY_VOCAB_FILE)
}

pub fn load_vocabulary(path: &Path) -> Result<Vocabulary> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read vocabulary {}", path.display()))?;
    let artifact = serde_json::from_str::<VocabularyArtifact>(&raw)
        .with_context(|| format!("parse vocabulary {}", path.display()))?;
    if artifact.version != VOCAB_VERSION {
        return Err(anyhow!(
            "vocabulary {} has version {}, expected {}",
            path.display(),
            artifact.version,
            VOCAB_VERSION
        ));
    }
    Ok(Vocabulary::from_artifact(artifact))
}

pub fn save_vocabulary(path: &Path, vocab: &Vocabulary, source: Option<String>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let raw = serde_json::to_string_pretty(&vocab.to_artifact(source))
        .context("serialize vocabulary")?;
    fs::write(path, raw).with_context(|| format!("write vocabulary {}", path.display()))?;
    Ok(())
}

fn path_from_env_or_default(key: &str, default: &str) -> PathBuf {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw.trim()),
        _ => PathBuf::from(default),
    }
}
