//! Comparison operations available to each filter kind.

use encounter_state::EnumCode;
use serde::{Deserialize, Serialize};

/// Operations on boolean operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    Equal,
    NotEqual,
}

impl BoolOp {
    pub fn apply(&self, lhs: bool, rhs: bool) -> bool {
        match self {
            BoolOp::Equal => lhs == rhs,
            BoolOp::NotEqual => lhs != rhs,
        }
    }
}

/// Operations on integer operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl IntOp {
    pub fn apply(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            IntOp::Equal => lhs == rhs,
            IntOp::NotEqual => lhs != rhs,
            IntOp::Less => lhs < rhs,
            IntOp::LessOrEqual => lhs <= rhs,
            IntOp::Greater => lhs > rhs,
            IntOp::GreaterOrEqual => lhs >= rhs,
        }
    }
}

/// Operations on float operands.
///
/// Equality is tested within an epsilon; ordering is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl FloatOp {
    /// Equality holds within `epsilon`; a non-positive epsilon means exact.
    pub fn apply(&self, lhs: f64, rhs: f64, epsilon: f64) -> bool {
        let equal = if epsilon > 0.0 {
            (lhs - rhs).abs() < epsilon
        } else {
            lhs == rhs
        };
        match self {
            FloatOp::Equal => equal,
            FloatOp::NotEqual => !equal,
            FloatOp::Less => lhs < rhs,
            FloatOp::LessOrEqual => lhs <= rhs,
            FloatOp::Greater => lhs > rhs,
            FloatOp::GreaterOrEqual => lhs >= rhs,
        }
    }
}

/// Operations on string operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringOp {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
}

impl StringOp {
    pub fn apply(&self, lhs: &str, rhs: &str) -> bool {
        match self {
            StringOp::Equal => lhs == rhs,
            StringOp::NotEqual => lhs != rhs,
            StringOp::Contains => lhs.contains(rhs),
            StringOp::StartsWith => lhs.starts_with(rhs),
            StringOp::EndsWith => lhs.ends_with(rhs),
        }
    }
}

/// Operations on enumeration codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnumOp {
    /// Every bit of the right operand is set on the left one.
    HasFlag,
    NotHasFlag,
    Equal,
    NotEqual,
}

impl EnumOp {
    pub fn apply(&self, lhs: &EnumCode, rhs: &EnumCode) -> bool {
        match self {
            EnumOp::HasFlag => lhs.has_flag(rhs),
            EnumOp::NotHasFlag => !lhs.has_flag(rhs),
            EnumOp::Equal => lhs.bits == rhs.bits,
            EnumOp::NotEqual => lhs.bits != rhs.bits,
        }
    }
}

/// Unary presence checks (inventory tags, module traits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceOp {
    Has,
    Lacks,
}

impl PresenceOp {
    pub fn apply(&self, present: bool) -> bool {
        match self {
            PresenceOp::Has => present,
            PresenceOp::Lacks => !present,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_ops() {
        assert!(IntOp::Greater.apply(2, 0));
        assert!(!IntOp::Greater.apply(0, 0));
        assert!(IntOp::GreaterOrEqual.apply(0, 0));
        assert!(IntOp::Less.apply(-1, 0));
        assert!(IntOp::LessOrEqual.apply(3, 3));
        assert!(IntOp::NotEqual.apply(3, 4));
    }

    #[test]
    fn test_float_equality_uses_epsilon() {
        let epsilon = 1e-3;
        assert!(FloatOp::Equal.apply(1.0, 1.0005, epsilon));
        assert!(!FloatOp::Equal.apply(1.0, 1.002, epsilon));
        assert!(FloatOp::NotEqual.apply(1.0, 1.002, epsilon));
        assert!(!FloatOp::NotEqual.apply(1.0, 1.0005, epsilon));
    }

    #[test]
    fn test_zero_epsilon_is_exact_equality() {
        assert!(FloatOp::Equal.apply(0.25, 0.25, 0.0));
        assert!(!FloatOp::Equal.apply(0.25, 0.25 + f64::EPSILON, 0.0));
        assert!(FloatOp::NotEqual.apply(1.0, 2.0, -1.0));
        assert!(!FloatOp::NotEqual.apply(1.0, 1.0, -1.0));
    }

    #[test]
    fn test_float_ordering_is_exact() {
        let epsilon = 1e-3;
        assert!(FloatOp::Less.apply(1.0, 1.0005, epsilon));
        assert!(!FloatOp::Greater.apply(1.0, 1.0005, epsilon));
    }

    #[test]
    fn test_string_ops() {
        assert!(StringOp::Contains.apply("ice moon", "moon"));
        assert!(StringOp::StartsWith.apply("ice moon", "ice"));
        assert!(StringOp::EndsWith.apply("ice moon", "moon"));
        assert!(!StringOp::EndsWith.apply("ice moon", "ice"));
        assert!(StringOp::Equal.apply("", ""));
    }

    #[test]
    fn test_enum_ops() {
        let code = EnumCode::new("Hazard", 0b110);
        assert!(EnumOp::HasFlag.apply(&code, &EnumCode::new("Hazard", 0b010)));
        assert!(EnumOp::NotHasFlag.apply(&code, &EnumCode::new("Hazard", 0b001)));
        assert!(EnumOp::Equal.apply(&code, &EnumCode::new("Hazard", 0b110)));
        assert!(EnumOp::NotEqual.apply(&code, &EnumCode::zero("Hazard")));
    }

    #[test]
    fn test_presence_ops() {
        assert!(PresenceOp::Has.apply(true));
        assert!(PresenceOp::Lacks.apply(false));
    }
}
