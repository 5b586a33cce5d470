//! Core identifiers and value types for blockquiz.
//!
//! Every persisted entity is addressed by a typed id so a block id can never
//! be passed where an element id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default tolerance used when comparing achieved grades with thresholds.
pub const GRADE_EPSILON: f64 = 1e-6;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identifies a quiz instance.
    QuizId
);
id_type!(
    /// Identifies a block within a quiz.
    BlockId
);
id_type!(
    /// Identifies a slot-positioned element of a block.
    ElementId
);
id_type!(
    /// Identifies a question instance owned by the host.
    QuestionId
);
id_type!(
    /// Identifies a condition.
    ConditionId
);
id_type!(
    /// Identifies a single part of a condition.
    PartId
);
id_type!(
    /// Identifies a feedback block.
    FeedbackId
);
id_type!(
    /// Identifies one learner's pass through a quiz.
    AttemptId
);

/// What a block element points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementTarget {
    Question(QuestionId),
    Block(BlockId),
}

impl fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementTarget::Question(id) => write!(f, "question {id}"),
            ElementTarget::Block(id) => write!(f, "block {id}"),
        }
    }
}

/// Numeric comparison applied by a grade condition part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl Comparator {
    /// Compare `achieved` against `threshold`, treating values closer than
    /// `epsilon` as equal.
    pub fn holds(self, achieved: f64, threshold: f64, epsilon: f64) -> bool {
        let equal = (achieved - threshold).abs() <= epsilon;
        match self {
            Comparator::Less => achieved < threshold && !equal,
            Comparator::LessOrEqual => achieved < threshold || equal,
            Comparator::Greater => achieved > threshold && !equal,
            Comparator::GreaterOrEqual => achieved > threshold || equal,
            Comparator::Equal => equal,
            Comparator::NotEqual => !equal,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Less => "<",
            Comparator::LessOrEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "<" | "lt" => Ok(Comparator::Less),
            "<=" | "≤" | "le" => Ok(Comparator::LessOrEqual),
            ">" | "gt" => Ok(Comparator::Greater),
            ">=" | "≥" | "ge" => Ok(Comparator::GreaterOrEqual),
            "=" | "==" | "eq" => Ok(Comparator::Equal),
            "!=" | "≠" | "<>" | "ne" => Ok(Comparator::NotEqual),
            other => Err(format!("unknown comparator: {other}")),
        }
    }
}

/// Returns `true` if `value` can be used as a max grade or threshold.
pub(crate) fn is_valid_grade(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparator_display_and_parse() {
        assert_eq!(Comparator::GreaterOrEqual.to_string(), ">=");
        assert_eq!(">=".parse::<Comparator>().unwrap(), Comparator::GreaterOrEqual);
        assert_eq!("≠".parse::<Comparator>().unwrap(), Comparator::NotEqual);
        assert_eq!("LE".parse::<Comparator>().unwrap(), Comparator::LessOrEqual);
        assert!("~".parse::<Comparator>().is_err());
    }

    #[test]
    fn comparator_uses_epsilon() {
        let eps = GRADE_EPSILON;
        assert!(!Comparator::NotEqual.holds(5.000_000_1, 5.0, eps));
        assert!(Comparator::Equal.holds(5.000_000_1, 5.0, eps));
        assert!(!Comparator::Less.holds(4.999_999_9, 5.0, eps));
        assert!(Comparator::LessOrEqual.holds(5.000_000_1, 5.0, eps));
        assert!(Comparator::GreaterOrEqual.holds(4.999_999_9, 5.0, eps));
        assert!(!Comparator::Greater.holds(5.000_000_1, 5.0, eps));
        assert!(Comparator::Greater.holds(5.1, 5.0, eps));
        assert!(Comparator::NotEqual.holds(5.1, 5.0, eps));
    }

    #[test]
    fn element_target_serde() {
        let json = serde_json::to_string(&ElementTarget::Question(QuestionId(7))).unwrap();
        assert_eq!(json, r#"{"question":7}"#);
        let back: ElementTarget = serde_json::from_str(r#"{"block":3}"#).unwrap();
        assert_eq!(back, ElementTarget::Block(BlockId(3)));
    }
}
