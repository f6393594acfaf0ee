//! Tests for unary and binary operators

use super::helpers::{error_code, eval};
use crate::executor::errors;
use crate::executor::Val;

/* ===================== Arithmetic Operators ===================== */

#[tokio::test]
async fn test_arithmetic_precedence() {
    // 2 + (3 * 4), not (2 + 3) * 4
    assert_eq!(eval("return 2 + 3 * 4").await.unwrap(), Val::Num(14.0));
    assert_eq!(eval("return (2 + 3) * 4").await.unwrap(), Val::Num(20.0));
}

#[tokio::test]
async fn test_modulo_and_division() {
    assert_eq!(eval("return 7 % 3").await.unwrap(), Val::Num(1.0));
    assert_eq!(eval("return 7 / 2").await.unwrap(), Val::Num(3.5));
}

#[tokio::test]
async fn test_division_by_zero() {
    assert_eq!(error_code(eval("return 1 / 0").await), errors::DIVISION_BY_ZERO);
    assert_eq!(error_code(eval("return 1 % 0").await), errors::DIVISION_BY_ZERO);
}

#[tokio::test]
async fn test_negation() {
    assert_eq!(eval("return -(2 + 3)").await.unwrap(), Val::Num(-5.0));
    assert_eq!(error_code(eval("return -\"a\"").await), errors::TYPE_ERROR);
}

/* ===================== String and List Operators ===================== */

#[tokio::test]
async fn test_string_concatenation() {
    assert_eq!(
        eval("return \"n=\" + 3").await.unwrap(),
        Val::Str("n=3".to_string())
    );
    assert_eq!(
        eval("return 1.5 + \"x\"").await.unwrap(),
        Val::Str("1.5x".to_string())
    );
}

#[tokio::test]
async fn test_list_concatenation() {
    assert_eq!(
        eval("return [1] + [2]").await.unwrap(),
        Val::List(vec![Val::Num(1.0), Val::Num(2.0)])
    );
}

#[tokio::test]
async fn test_mismatched_operands() {
    assert_eq!(error_code(eval("return true - 1").await), errors::TYPE_ERROR);
    assert_eq!(error_code(eval("return \"a\" < 1").await), errors::TYPE_ERROR);
}

/* ===================== Comparison and Logic ===================== */

#[tokio::test]
async fn test_comparisons() {
    assert_eq!(eval("return 1 <= 1").await.unwrap(), Val::Bool(true));
    assert_eq!(eval("return \"a\" < \"b\"").await.unwrap(), Val::Bool(true));
    assert_eq!(eval("return [1, 2] == [1, 2]").await.unwrap(), Val::Bool(true));
    assert_eq!(eval("return 1 != \"1\"").await.unwrap(), Val::Bool(true));
}

#[tokio::test]
async fn test_logical_operators_short_circuit() {
    // The right side would throw if evaluated
    assert_eq!(eval("return false && (1 / 0)").await.unwrap(), Val::Bool(false));
    assert_eq!(eval("return 5 || (1 / 0)").await.unwrap(), Val::Num(5.0));
    assert_eq!(eval("return 0 || \"fallback\"").await.unwrap(), Val::Str("fallback".to_string()));
}

#[tokio::test]
async fn test_nullish_keeps_falsy_values() {
    assert_eq!(eval("return 0 ?? 7").await.unwrap(), Val::Num(0.0));
    assert_eq!(eval("return null ?? 7").await.unwrap(), Val::Num(7.0));
}

#[tokio::test]
async fn test_not_and_ternary() {
    assert_eq!(eval("return !\"\"").await.unwrap(), Val::Bool(true));
    assert_eq!(eval("return 0 ? \"a\" : \"b\"").await.unwrap(), Val::Str("b".to_string()));
}
