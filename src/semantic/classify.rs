//! Expression type classification.
//!
//! Computes a `TypeDesc` (data type + scalar/aggregate/analytic) for any
//! expression. Literal classification is purely syntactic; references are
//! resolved through a field space; compound expressions follow the
//! monotonic composition rule (the result is at least the maximum of the
//! operand classifications).

use crate::ast::{AggFunc, Expr, FieldPath};
use crate::model::types::{DataType, ExpressionType, TypeDesc};

use super::space::{FieldSpace, LookupResult};

/// Classify a numeric literal from its raw text.
///
/// Unparseable text classifies as `number` with no sub-kind — the NaN case
/// is deferred to later validation, not an error here. A parseable value
/// with no fractional part is an integer, otherwise a float.
pub fn classify_number_literal(text: &str) -> TypeDesc {
    match text.parse::<f64>() {
        Err(_) => TypeDesc::scalar(DataType::number()),
        Ok(value) => {
            if value.fract() == 0.0 {
                TypeDesc::scalar(DataType::integer())
            } else {
                TypeDesc::scalar(DataType::float())
            }
        }
    }
}

/// Classify an expression, resolving references in the given space.
///
/// Unresolved references classify as unknown scalars; the resolver that
/// walked the reference owns the diagnostic.
pub fn classify(expr: &Expr, space: &FieldSpace) -> TypeDesc {
    classify_inner(expr, &mut |path| match space.lookup(&path.segments) {
        LookupResult::Found(entry) => Some(entry.type_desc()),
        LookupResult::NotFound(_) => None,
    })
}

/// Classify an expression with no resolution scope.
///
/// References classify as unknown; used for lazily typing abstract
/// parameter declarations, which are literal-built by construction.
pub fn classify_standalone(expr: &Expr) -> TypeDesc {
    classify_inner(expr, &mut |_| None)
}

/// Classify an expression, resolving references through a caller-supplied
/// scope chain.
pub fn classify_with(
    expr: &Expr,
    mut resolve: impl FnMut(&FieldPath) -> Option<TypeDesc>,
) -> TypeDesc {
    classify_inner(expr, &mut resolve)
}

fn classify_inner(expr: &Expr, resolve: &mut dyn FnMut(&FieldPath) -> Option<TypeDesc>) -> TypeDesc {
    match expr {
        Expr::NumberLit(text) => classify_number_literal(text),
        Expr::StringLit(_) => TypeDesc::scalar(DataType::String),
        Expr::BoolLit(_) => TypeDesc::scalar(DataType::Boolean),
        Expr::FieldRef(path) => resolve(path).unwrap_or_else(TypeDesc::unknown),
        Expr::Binary { left, op, right } => {
            let lhs = classify_inner(&left.value, resolve);
            let rhs = classify_inner(&right.value, resolve);
            let data_type = if op.is_comparison() {
                DataType::Boolean
            } else if lhs.data_type.is_number() {
                lhs.data_type.clone()
            } else {
                DataType::number()
            };
            let expression_type = lhs.expression_type.max(rhs.expression_type);
            TypeDesc {
                data_type,
                expression_type,
            }
        }
        Expr::Agg { func, arg } => {
            let inner = arg
                .as_ref()
                .map(|a| classify_inner(&a.value, resolve))
                .unwrap_or_else(|| TypeDesc::scalar(DataType::integer()));
            let data_type = match func {
                AggFunc::Count => DataType::integer(),
                AggFunc::Avg => DataType::float(),
                _ => inner.data_type,
            };
            TypeDesc {
                data_type,
                expression_type: inner.expression_type.max(ExpressionType::Aggregate),
            }
        }
        Expr::Analytic { arg, .. } => {
            let inner = arg
                .as_ref()
                .map(|a| classify_inner(&a.value, resolve))
                .unwrap_or_else(|| TypeDesc::scalar(DataType::integer()));
            TypeDesc {
                data_type: inner.data_type,
                expression_type: ExpressionType::Analytic,
            }
        }
    }
}
