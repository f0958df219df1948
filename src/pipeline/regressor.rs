//! Fitted regressors mapping a feature vector to a delivery time in minutes.

use serde::{Deserialize, Serialize};

use crate::error::RegressionError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTransform {
    #[default]
    Identity,
    /// Model was fitted on `ln(1 + y)`; predictions are mapped back with `exp(x) - 1`.
    Log1p,
}

impl TargetTransform {
    fn inverse(self, value: f64) -> f64 {
        match self {
            TargetTransform::Identity => value,
            TargetTransform::Log1p => value.exp_m1(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Boosted trees: leaf values add up.
    #[default]
    Sum,
    /// Bagged trees: leaf values are averaged.
    Mean,
}

/// One node of a flat binary tree. Splits send `x[feature] <= threshold` left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Children always sit after their parent, so traversal terminates.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!("node {} splits on feature {} of {}", i, feature, n_features));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", i));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                    }
                }
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("leaf {} has a non-finite value", i));
                }
                Node::Leaf { .. } => {}
            }
        }
        Ok(())
    }

    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    TreeEnsemble {
        n_features: usize,
        #[serde(default)]
        base_score: f64,
        #[serde(default)]
        aggregation: Aggregation,
        trees: Vec<Tree>,
    },
}

/// Persisted regressor artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regressor {
    #[serde(default)]
    pub target_transform: TargetTransform,
    pub model: Model,
}

impl Regressor {
    pub fn n_features(&self) -> usize {
        match &self.model {
            Model::Linear { coefficients, .. } => coefficients.len(),
            Model::TreeEnsemble { n_features, .. } => *n_features,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.model {
            Model::Linear {
                intercept,
                coefficients,
            } => {
                if coefficients.is_empty() {
                    return Err("linear model has no coefficients".to_string());
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("linear model has a non-finite parameter".to_string());
                }
                Ok(())
            }
            Model::TreeEnsemble {
                n_features,
                base_score,
                trees,
                ..
            } => {
                if trees.is_empty() {
                    return Err("tree ensemble has no trees".to_string());
                }
                if !base_score.is_finite() {
                    return Err("tree ensemble has a non-finite base score".to_string());
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(*n_features).map_err(|e| format!("tree {}: {}", i, e))?;
                }
                Ok(())
            }
        }
    }

    /// Predicted delivery time, never negative.
    pub fn predict(&self, features: &[f64]) -> Result<f64, RegressionError> {
        let expected = self.n_features();
        if features.len() != expected {
            return Err(RegressionError::WidthMismatch {
                expected,
                actual: features.len(),
            });
        }

        let raw = match &self.model {
            Model::Linear {
                intercept,
                coefficients,
            } => intercept + coefficients.iter().zip(features).map(|(w, x)| w * x).sum::<f64>(),
            Model::TreeEnsemble {
                base_score,
                aggregation,
                trees,
                ..
            } => {
                let total: f64 = trees.iter().map(|t| t.evaluate(features)).sum();
                match aggregation {
                    Aggregation::Sum => base_score + total,
                    Aggregation::Mean => base_score + total / trees.len() as f64,
                }
            }
        };

        let prediction = self.target_transform.inverse(raw);
        if !prediction.is_finite() {
            return Err(RegressionError::NonFinite(prediction));
        }
        Ok(if prediction <= 0.0 { 0.0 } else { prediction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: left },
                Node::Leaf { value: right },
            ],
        }
    }

    #[test]
    fn test_linear_prediction() {
        let regressor = Regressor {
            target_transform: TargetTransform::Identity,
            model: Model::Linear {
                intercept: 10.0,
                coefficients: vec![2.0, -1.0],
            },
        };

        assert_eq!(regressor.predict(&[3.0, 4.0]).unwrap(), 12.0);
    }

    #[test]
    fn test_negative_output_clamped() {
        let regressor = Regressor {
            target_transform: TargetTransform::Identity,
            model: Model::Linear {
                intercept: -5.0,
                coefficients: vec![1.0],
            },
        };

        assert_eq!(regressor.predict(&[1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_tree_ensemble_sum_and_mean() {
        let trees = vec![stump(0, 0.5, 1.0, 3.0), stump(1, 10.0, 2.0, 4.0)];
        let mut regressor = Regressor {
            target_transform: TargetTransform::Identity,
            model: Model::TreeEnsemble {
                n_features: 2,
                base_score: 20.0,
                aggregation: Aggregation::Sum,
                trees: trees.clone(),
            },
        };
        assert!(regressor.validate().is_ok());
        assert_eq!(regressor.predict(&[1.0, 5.0]).unwrap(), 25.0);

        regressor.model = Model::TreeEnsemble {
            n_features: 2,
            base_score: 0.0,
            aggregation: Aggregation::Mean,
            trees,
        };
        assert_eq!(regressor.predict(&[0.0, 11.0]).unwrap(), 2.5);
    }

    #[test]
    fn test_log1p_target_inverted() {
        let regressor = Regressor {
            target_transform: TargetTransform::Log1p,
            model: Model::Linear {
                intercept: 0.0,
                coefficients: vec![1.0],
            },
        };

        let prediction = regressor.predict(&[(26.0f64).ln()]).unwrap();
        assert!((prediction - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_width_mismatch() {
        let regressor = Regressor {
            target_transform: TargetTransform::Identity,
            model: Model::Linear {
                intercept: 0.0,
                coefficients: vec![1.0, 1.0],
            },
        };

        assert_eq!(
            regressor.predict(&[1.0]).unwrap_err(),
            RegressionError::WidthMismatch { expected: 2, actual: 1 }
        );
    }

    #[test]
    fn test_non_finite_output_is_error() {
        let regressor = Regressor {
            target_transform: TargetTransform::Log1p,
            model: Model::Linear {
                intercept: 0.0,
                coefficients: vec![1.0],
            },
        };

        assert!(matches!(
            regressor.predict(&[1000.0]),
            Err(RegressionError::NonFinite(_))
        ));
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let mut tree = stump(0, 0.5, 1.0, 2.0);
        tree.nodes[0] = Node::Split {
            feature: 0,
            threshold: 0.5,
            left: 0,
            right: 2,
        };
        let regressor = Regressor {
            target_transform: TargetTransform::Identity,
            model: Model::TreeEnsemble {
                n_features: 1,
                base_score: 0.0,
                aggregation: Aggregation::Sum,
                trees: vec![tree],
            },
        };

        assert!(regressor.validate().unwrap_err().contains("invalid child"));
    }

    #[test]
    fn test_deserializes_leaf_and_split_nodes() {
        let json = r#"{
            "model": {
                "kind": "tree_ensemble",
                "n_features": 1,
                "trees": [{"nodes": [
                    {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                    {"value": 10.0},
                    {"value": 30.0}
                ]}]
            }
        }"#;

        let regressor: Regressor = serde_json::from_str(json).unwrap();

        assert_eq!(regressor.target_transform, TargetTransform::Identity);
        assert_eq!(regressor.predict(&[0.9]).unwrap(), 30.0);
    }
}
