//! Fixed operator overload tables.
//!
//! Overloads are looked up by (operator, operand type(s)); a miss is an
//! operator-type error at the call site (the binder may first try to
//! convert the right operand of a binary expression to the left's type).

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::bound::{
    BoundBinaryOperator, BoundBinaryOperatorKind, BoundUnaryOperator, BoundUnaryOperatorKind,
};
use crate::symbols::TypeSymbol;

pub fn bind_unary_operator(
    operator: UnaryOperator,
    operand: &TypeSymbol,
) -> Option<BoundUnaryOperator> {
    let (kind, result) = match (operator, operand) {
        (UnaryOperator::Identity, TypeSymbol::Int) => {
            (BoundUnaryOperatorKind::Identity, TypeSymbol::Int)
        }
        (UnaryOperator::Identity, TypeSymbol::Float) => {
            (BoundUnaryOperatorKind::Identity, TypeSymbol::Float)
        }
        (UnaryOperator::Negation, TypeSymbol::Int) => {
            (BoundUnaryOperatorKind::Negation, TypeSymbol::Int)
        }
        (UnaryOperator::Negation, TypeSymbol::Float) => {
            (BoundUnaryOperatorKind::Negation, TypeSymbol::Float)
        }
        (UnaryOperator::LogicalNegation, TypeSymbol::Bool) => {
            (BoundUnaryOperatorKind::LogicalNegation, TypeSymbol::Bool)
        }
        _ => return None,
    };
    Some(BoundUnaryOperator {
        kind,
        operand_type: operand.clone(),
        result_type: result,
    })
}

fn binary_kind(operator: BinaryOperator) -> BoundBinaryOperatorKind {
    match operator {
        BinaryOperator::Addition => BoundBinaryOperatorKind::Addition,
        BinaryOperator::Subtraction => BoundBinaryOperatorKind::Subtraction,
        BinaryOperator::Multiplication => BoundBinaryOperatorKind::Multiplication,
        BinaryOperator::Division => BoundBinaryOperatorKind::Division,
        BinaryOperator::Modulus => BoundBinaryOperatorKind::Modulus,
        BinaryOperator::BitwiseAnd => BoundBinaryOperatorKind::BitwiseAnd,
        BinaryOperator::BitwiseOr => BoundBinaryOperatorKind::BitwiseOr,
        BinaryOperator::BitwiseXor => BoundBinaryOperatorKind::BitwiseXor,
        BinaryOperator::Equals => BoundBinaryOperatorKind::Equals,
        BinaryOperator::NotEquals => BoundBinaryOperatorKind::NotEquals,
        BinaryOperator::Less => BoundBinaryOperatorKind::Less,
        BinaryOperator::LessOrEquals => BoundBinaryOperatorKind::LessOrEquals,
        BinaryOperator::Greater => BoundBinaryOperatorKind::Greater,
        BinaryOperator::GreaterOrEquals => BoundBinaryOperatorKind::GreaterOrEquals,
        BinaryOperator::LogicalAnd => BoundBinaryOperatorKind::LogicalAnd,
        BinaryOperator::LogicalOr => BoundBinaryOperatorKind::LogicalOr,
    }
}

pub fn bind_binary_operator(
    operator: BinaryOperator,
    left: &TypeSymbol,
    right: &TypeSymbol,
) -> Option<BoundBinaryOperator> {
    if left != right {
        return None;
    }
    use BinaryOperator::*;
    use TypeSymbol::*;

    let result = match (operator, left) {
        // Arithmetic
        (Addition | Subtraction | Multiplication | Division | Modulus, Int) => Int,
        (Addition | Subtraction | Multiplication | Division | Modulus, Float) => Float,
        // String concatenation
        (Addition, String) => String,
        // Bitwise (no xor on bool)
        (BitwiseAnd | BitwiseOr | BitwiseXor, Int) => Int,
        (BitwiseAnd | BitwiseOr, Bool) => Bool,
        // Comparison
        (Equals | NotEquals, Int | Float | Bool | String) => Bool,
        (Less | LessOrEquals | Greater | GreaterOrEquals, Int | Float) => Bool,
        // Logic
        (LogicalAnd | LogicalOr, Bool) => Bool,
        _ => return None,
    };

    Some(BoundBinaryOperator {
        kind: binary_kind(operator),
        left_type: left.clone(),
        right_type: right.clone(),
        result_type: result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_supports_concat_and_equality_only() {
        assert!(bind_binary_operator(BinaryOperator::Addition, &TypeSymbol::String, &TypeSymbol::String).is_some());
        assert!(bind_binary_operator(BinaryOperator::Equals, &TypeSymbol::String, &TypeSymbol::String).is_some());
        assert!(bind_binary_operator(BinaryOperator::Less, &TypeSymbol::String, &TypeSymbol::String).is_none());
        assert!(bind_binary_operator(BinaryOperator::Subtraction, &TypeSymbol::String, &TypeSymbol::String).is_none());
    }

    #[test]
    fn bool_has_no_xor() {
        assert!(bind_binary_operator(BinaryOperator::BitwiseXor, &TypeSymbol::Bool, &TypeSymbol::Bool).is_none());
        assert!(bind_binary_operator(BinaryOperator::BitwiseXor, &TypeSymbol::Int, &TypeSymbol::Int).is_some());
    }

    #[test]
    fn mixed_operand_types_miss() {
        assert!(bind_binary_operator(BinaryOperator::Addition, &TypeSymbol::Int, &TypeSymbol::Float).is_none());
    }

    #[test]
    fn comparisons_produce_bool() {
        let op = bind_binary_operator(BinaryOperator::Less, &TypeSymbol::Int, &TypeSymbol::Int)
            .expect("overload");
        assert_eq!(op.result_type, TypeSymbol::Bool);
    }

    #[test]
    fn negation_rejects_bool() {
        assert!(bind_unary_operator(UnaryOperator::Negation, &TypeSymbol::Bool).is_none());
        assert!(bind_unary_operator(UnaryOperator::LogicalNegation, &TypeSymbol::Bool).is_some());
    }
}
