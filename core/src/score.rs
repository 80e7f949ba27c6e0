use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mean {
    #[default]
    Geometric,
    Arithmetic,
}

impl Mean {
    /// `None` for no scores.
    pub fn aggregate(&self, scores: &[f64]) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mean = match self {
            Mean::Arithmetic => scores.iter().sum::<f64>() / n,
            Mean::Geometric => {
                if scores.iter().any(|&s| s <= 0.0) {
                    return Some(0.0);
                }
                (scores.iter().map(|s| s.ln()).sum::<f64>() / n).exp()
            }
        };
        Some(mean)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub name: String,
    pub score: f64,
}

/// `rival / candidate` as a percentage, capped at 100 and floored at 0.
pub fn relative_score(candidate_ms: f64, rival_ms: f64) -> f64 {
    if candidate_ms <= 0.0 {
        return 100.0;
    }
    (rival_ms / candidate_ms * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod test {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-2
    }

    #[test]
    fn aggregate_empty_and_single() {
        assert_eq!(Mean::Geometric.aggregate(&[]), None);
        assert_eq!(Mean::Arithmetic.aggregate(&[]), None);
        assert!(approx(Mean::Geometric.aggregate(&[42.0]).unwrap(), 42.0));
        assert!(approx(Mean::Arithmetic.aggregate(&[42.0]).unwrap(), 42.0));
    }

    #[test]
    fn aggregate_two() {
        assert!(approx(Mean::Geometric.aggregate(&[50.0, 100.0]).unwrap(), 70.71));
        assert!(approx(Mean::Arithmetic.aggregate(&[50.0, 100.0]).unwrap(), 75.0));
    }

    #[test]
    fn geometric_mean_of_long_suite_does_not_overflow() {
        let scores = vec![100.0; 10_000];
        assert!(approx(Mean::Geometric.aggregate(&scores).unwrap(), 100.0));
    }

    #[test]
    fn geometric_mean_with_zero_score() {
        assert_eq!(Mean::Geometric.aggregate(&[0.0, 100.0]), Some(0.0));
    }

    #[test]
    fn relative_score_is_capped() {
        assert_eq!(relative_score(10.0, 20.0), 100.0);
        assert_eq!(relative_score(20.0, 10.0), 50.0);
        assert_eq!(relative_score(20.0, -5.0), 0.0);
    }

    #[test]
    fn mean_names() {
        assert_eq!(Mean::default(), Mean::Geometric);
        assert_eq!(Mean::Arithmetic.to_string(), "arithmetic");
        #[derive(Deserialize)]
        struct T {
            mean: Mean,
        }
        let t: T = toml::from_str(r#"mean = "arithmetic""#).unwrap();
        assert_eq!(t.mean, Mean::Arithmetic);
    }
}
