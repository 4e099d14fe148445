//! Gradient-boosted decision tree ensembles.
//!
//! A model file is JSON:
//!
//! ```json
//! {
//!   "feature_names": ["EEG_std", "..."],
//!   "n_classes": 3,
//!   "init_scores": [0.0, 0.0, 0.0],
//!   "trees": [
//!     { "class": 0, "nodes": [
//!         { "feature": 0, "threshold": 0.5, "left": 1, "right": 2, "default_left": true },
//!         { "value": -0.3 },
//!         { "value": 0.8 } ] }
//!   ]
//! }
//! ```
//!
//! Each tree adds its leaf value to the raw score of its class; the class
//! scores go through a softmax. A split sends `x <= threshold` left and a
//! missing (NaN) value to the `default_left` side. Node 0 is the root and
//! children always come after their parent, so evaluation terminates.
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::StageClassifier;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub class: usize,
    pub nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split { feature, threshold, left, right, default_left } => {
                    let x = row[feature];
                    idx = if x.is_nan() {
                        if default_left { left } else { right }
                    } else if x <= threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtModel {
    pub feature_names: Vec<String>,
    pub n_classes: usize,
    #[serde(default)]
    pub init_scores: Vec<f64>,
    pub trees: Vec<Tree>,
}

impl GbdtModel {
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        debug!(trees = model.trees.len(), classes = model.n_classes, "loaded GBDT model");
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Check indices so that evaluation can never go out of bounds or loop.
    pub fn validate(&self) -> Result<()> {
        if self.n_classes < 2 {
            return Err(Error::param(format!("model needs at least 2 classes, has {}", self.n_classes)));
        }
        if !self.init_scores.is_empty() && self.init_scores.len() != self.n_classes {
            return Err(Error::shape(format!(
                "{} init scores for {} classes",
                self.init_scores.len(),
                self.n_classes
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.class >= self.n_classes {
                return Err(Error::param(format!("tree {t} targets class {}", tree.class)));
            }
            if tree.nodes.is_empty() {
                return Err(Error::param(format!("tree {t} has no nodes")));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                if let Node::Split { feature, left, right, .. } = *node {
                    let bad_child = |c: usize| c <= i || c >= tree.nodes.len();
                    if feature >= self.feature_names.len() || bad_child(left) || bad_child(right) {
                        return Err(Error::param(format!("tree {t} node {i} has an invalid split")));
                    }
                }
            }
        }
        Ok(())
    }

    /// Raw (pre-softmax) class scores of one row.
    pub fn raw_scores(&self, row: &[f64]) -> Vec<f64> {
        let mut scores = if self.init_scores.is_empty() {
            vec![0.0; self.n_classes]
        } else {
            self.init_scores.clone()
        };
        for tree in &self.trees {
            scores[tree.class] += tree.leaf_value(row);
        }
        scores
    }
}

impl StageClassifier for GbdtModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.feature_names.len() {
            return Err(Error::shape(format!(
                "model expects {} features, got {}",
                self.feature_names.len(),
                features.ncols()
            )));
        }
        let mut out = Array2::<f64>::zeros((features.nrows(), self.n_classes));
        let mut row = vec![0.0; features.ncols()];
        for (r, feat) in features.rows().into_iter().enumerate() {
            row.iter_mut().zip(feat.iter()).for_each(|(d, &s)| *d = s);
            let p = softmax(&self.raw_scores(&row));
            out.row_mut(r).iter_mut().zip(p).for_each(|(d, s)| *d = s);
        }
        Ok(out)
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}
