//! Pretrained model registry.
//!
//! Models are keyed by the EEG electrode site and the animal age profile
//! they were trained on. The registry is an ordinary value passed to the
//! pipeline, so tests can register stub classifiers.
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::gbdt::GbdtModel;
use super::StageClassifier;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EegSite {
    Frontal,
    Parietal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeProfile {
    Young,
    Adult,
    Aged,
}

impl EegSite {
    pub const ALL: [EegSite; 2] = [Self::Frontal, Self::Parietal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frontal => "frontal",
            Self::Parietal => "parietal",
        }
    }
}

impl AgeProfile {
    pub const ALL: [AgeProfile; 3] = [Self::Young, Self::Adult, Self::Aged];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Young => "young",
            Self::Adult => "adult",
            Self::Aged => "aged",
        }
    }
}

impl FromStr for EegSite {
    type Err = Error;

    /// Accepts `frontal`/`F` and `parietal`/`P`, case-insensitive.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "frontal" | "f" => Ok(Self::Frontal),
            "parietal" | "p" => Ok(Self::Parietal),
            _ => Err(Error::param(format!("unknown EEG site '{s}'"))),
        }
    }
}

impl FromStr for AgeProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::param(format!("unknown age profile '{s}'")))
    }
}

impl fmt::Display for EegSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AgeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub site: EegSite,
    pub age: AgeProfile,
}

impl ModelKey {
    pub fn new(site: EegSite, age: AgeProfile) -> Self {
        Self { site, age }
    }

    /// File name of this model inside a model directory, e.g. `frontal_adult.json`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.site, self.age)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site, self.age)
    }
}

impl FromStr for ModelKey {
    type Err = Error;

    /// Parses `site/age` or `site_age`, e.g. `parietal/adult` or `F_aged`.
    fn from_str(s: &str) -> Result<Self> {
        let (site, age) = s
            .split_once(['/', '_'])
            .ok_or_else(|| Error::param(format!("model key '{s}' is not of the form site/age")))?;
        Ok(Self::new(site.parse()?, age.parse()?))
    }
}

type BoxedClassifier = Box<dyn StageClassifier + Send + Sync>;

#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<ModelKey, BoxedClassifier>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `<site>_<age>.json` GBDT model present in `dir`.
    ///
    /// Absent combinations are skipped; a present but broken file is an error.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut registry = Self::new();
        for site in EegSite::ALL {
            for age in AgeProfile::ALL {
                let key = ModelKey::new(site, age);
                let path = dir.join(key.file_name());
                if !path.is_file() {
                    debug!(path = %path.display(), "no model file");
                    continue;
                }
                registry.insert(key, GbdtModel::load(&path)?);
            }
        }
        info!(dir = %dir.display(), models = registry.len(), "model registry loaded");
        Ok(registry)
    }

    pub fn insert(&mut self, key: ModelKey, model: impl StageClassifier + Send + Sync + 'static) {
        self.models.insert(key, Box::new(model));
    }

    /// The model for `key`, or [`Error::MissingModel`].
    pub fn get(&self, key: ModelKey) -> Result<&(dyn StageClassifier + Send + Sync)> {
        self.models
            .get(&key)
            .map(|m| &**m)
            .ok_or_else(|| Error::MissingModel(key.to_string()))
    }

    pub fn contains(&self, key: ModelKey) -> bool {
        self.models.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("keys", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_site_and_age() {
        assert_eq!("F".parse::<EegSite>().unwrap(), EegSite::Frontal);
        assert_eq!("parietal".parse::<EegSite>().unwrap(), EegSite::Parietal);
        assert_eq!("Aged".parse::<AgeProfile>().unwrap(), AgeProfile::Aged);
        assert!("occipital".parse::<EegSite>().is_err());
    }

    #[test]
    fn key_round_trips_through_display() {
        let key = ModelKey::new(EegSite::Parietal, AgeProfile::Young);
        assert_eq!(key.to_string().parse::<ModelKey>().unwrap(), key);
        assert_eq!("F_aged".parse::<ModelKey>().unwrap(), ModelKey::new(EegSite::Frontal, AgeProfile::Aged));
        assert!("frontal".parse::<ModelKey>().is_err());
    }

    #[test]
    fn missing_model_is_reported() {
        let r = ModelRegistry::new();
        let key = ModelKey::new(EegSite::Frontal, AgeProfile::Adult);
        assert_eq!(key.file_name(), "frontal_adult.json");
        match r.get(key) {
            Err(Error::MissingModel(k)) => assert_eq!(k, "frontal/adult"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
