//! Type descriptors for the semantic model.
//!
//! Every expression the engine touches gets a `TypeDesc`: a data type plus
//! an expression classification (scalar / aggregate / analytic). The
//! classification decides which clauses may legally consume the expression
//! and composes monotonically: an expression is at least as "high" as its
//! highest operand.

use serde::{Deserialize, Serialize};

/// Sub-kind of a numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberKind {
    Integer,
    Float,
}

/// The data type of an expression or field.
///
/// `Number { kind: None }` is a number whose sub-kind could not be
/// determined (e.g. an unparseable literal); that is not an error at
/// classification time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    String,
    Number { kind: Option<NumberKind> },
    Date,
    Timestamp,
    Boolean,
    /// A view: a named, reusable query definition.
    Turtle,
    /// A struct-valued (joined) field.
    Struct,
    /// Could not be determined; the resolver owns the diagnostic.
    Unknown,
}

impl DataType {
    /// An integer number.
    pub fn integer() -> Self {
        DataType::Number {
            kind: Some(NumberKind::Integer),
        }
    }

    /// A floating-point number.
    pub fn float() -> Self {
        DataType::Number {
            kind: Some(NumberKind::Float),
        }
    }

    /// A number of undetermined sub-kind.
    pub fn number() -> Self {
        DataType::Number { kind: None }
    }

    /// True for any numeric type, regardless of sub-kind.
    pub fn is_number(&self) -> bool {
        matches!(self, DataType::Number { .. })
    }
}

/// Expression classification, ordered: scalar < aggregate < analytic.
///
/// The ordering is the composition rule: combining operands yields at least
/// the maximum of their classifications, unless a scope boundary (new
/// pipeline stage, new nest) resets context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum ExpressionType {
    #[default]
    Scalar,
    Aggregate,
    Analytic,
}

impl ExpressionType {
    /// Parse a classification from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scalar" => Some(ExpressionType::Scalar),
            "aggregate" => Some(ExpressionType::Aggregate),
            "analytic" => Some(ExpressionType::Analytic),
            _ => None,
        }
    }
}

/// A data type paired with an expression classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDesc {
    pub data_type: DataType,
    pub expression_type: ExpressionType,
}

impl TypeDesc {
    /// A scalar of the given data type.
    pub fn scalar(data_type: DataType) -> Self {
        Self {
            data_type,
            expression_type: ExpressionType::Scalar,
        }
    }

    /// An aggregate of the given data type.
    pub fn aggregate(data_type: DataType) -> Self {
        Self {
            data_type,
            expression_type: ExpressionType::Aggregate,
        }
    }

    /// An analytic of the given data type.
    pub fn analytic(data_type: DataType) -> Self {
        Self {
            data_type,
            expression_type: ExpressionType::Analytic,
        }
    }

    /// An unknown scalar, used for unresolved references.
    pub fn unknown() -> Self {
        Self::scalar(DataType::Unknown)
    }

    /// Compose this descriptor with another operand's classification.
    ///
    /// Keeps this descriptor's data type; lifts the classification to the
    /// maximum of the two.
    pub fn compose_with(mut self, other: ExpressionType) -> Self {
        self.expression_type = self.expression_type.max(other);
        self
    }
}
