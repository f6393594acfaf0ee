//! Tests for error propagation, lines and try/catch

use super::helpers::{error_code, eval, Harness};
use crate::executor::errors;
use crate::executor::{Failure, Val};

#[tokio::test]
async fn test_undefined_variable() {
    let result = eval("let a = 1\nlet b = missing_name").await;
    let Err(Failure::Throw { error, line }) = result else {
        unreachable!("Expected Throw, got {:?}", result);
    };
    assert_eq!(error.code, errors::UNDEFINED_VARIABLE);
    assert!(error.message.contains("'missing_name'"));
    assert_eq!(line, 2);
}

#[tokio::test]
async fn test_line_is_innermost_statement() {
    let result = eval("if (true) {\n  let ok = 1\n  let bad = 1 / 0\n}").await;
    assert_eq!(result.unwrap_err().line(), Some(3));
}

#[tokio::test]
async fn test_error_leaves_earlier_bindings() {
    let h = Harness::new();
    let result = h.run("let before = 1\nlet after = nope").await;

    assert!(result.is_err());
    assert_eq!(h.get("before"), Some(Val::Num(1.0)));
    assert_eq!(h.get("after"), None);
}

#[tokio::test]
async fn test_property_on_null() {
    assert_eq!(error_code(eval("let n = null\nreturn n.x").await), errors::TYPE_ERROR);
}

#[tokio::test]
async fn test_calling_a_non_function() {
    assert_eq!(error_code(eval("let f = 3\nf()").await), errors::NOT_A_FUNCTION);
}

#[tokio::test]
async fn test_assignment_to_constant() {
    let h = Harness::new();
    let result = h.run("const k = 1\nk = 2").await;

    assert_eq!(error_code(result), errors::TYPE_ERROR);
    assert_eq!(h.get("k"), Some(Val::Num(1.0)));
}

#[tokio::test]
async fn test_catch_binds_error() {
    let h = Harness::new();
    h.run("try {\n  x = 1 / 0\n} catch (e) {\n  code = e.code\n  msg = e.message\n}")
        .await
        .unwrap();

    assert_eq!(h.get("code"), Some(Val::Str(errors::DIVISION_BY_ZERO.to_string())));
    assert_eq!(h.get("msg"), Some(Val::Str("division by zero".to_string())));
    assert_eq!(h.get("e"), None, "catch binding is block scoped");
}

#[tokio::test]
async fn test_catch_sees_missing_module() {
    let h = Harness::new();
    h.run("try {\n  import nothing_here\n} catch (e) {\n  code = e.code\n}")
        .await
        .unwrap();

    assert_eq!(h.get("code"), Some(Val::Str(errors::MODULE_NOT_FOUND.to_string())));
}

#[tokio::test]
async fn test_exit_is_not_catchable() {
    let h = Harness::new();
    let result = h.run("try {\n  exit(2)\n} catch (e) {\n  caught = true\n}").await;

    assert_eq!(result.unwrap_err(), Failure::Exit(2));
    assert_eq!(h.get("caught"), None);
}

#[tokio::test]
async fn test_missing_module_carries_line() {
    let result = eval("let a = 1\nimport not_installed").await;
    assert_eq!(
        result.unwrap_err(),
        Failure::MissingModule {
            name: "not_installed".to_string(),
            line: 2
        }
    );
}
