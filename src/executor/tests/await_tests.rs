//! Tests for promises and await

use super::helpers::{error_code, Harness};
use crate::executor::errors;
use crate::executor::Val;

#[tokio::test]
async fn test_await_sleep_resolves_null() {
    let h = Harness::new();
    h.run("import time\nlet r = await time.sleep(1)").await.unwrap();
    assert_eq!(h.get("r"), Some(Val::Null));
}

#[tokio::test]
async fn test_promise_is_a_value_until_awaited() {
    let h = Harness::new();
    h.run("import time\nlet p = time.tick()\nlet t = type(p)").await.unwrap();

    assert_eq!(h.get("t"), Some(Val::Str("promise".to_string())));
    h.run("let r = await p\nlet again = await p").await.unwrap();
    assert_eq!(h.get("again"), Some(Val::Null));
}

#[tokio::test]
async fn test_await_plain_value() {
    let h = Harness::new();
    h.run("let v = await 5").await.unwrap();
    assert_eq!(h.get("v"), Some(Val::Num(5.0)));
}

#[tokio::test]
async fn test_negative_sleep() {
    let h = Harness::new();
    assert_eq!(
        error_code(h.run("import time\nawait time.sleep(-1)").await),
        errors::WRONG_ARG_TYPE
    );
}

#[tokio::test]
async fn test_statement_suspends_only_at_await() {
    use futures::FutureExt;

    let h = Harness::new();
    // No await: the unit finishes on its first poll
    let body = crate::parser::parse_program("import time\nlet p = time.sleep(50)\nx = 1").unwrap();
    let done = crate::executor::run_statements(&body, h.ctx.clone(), false).now_or_never();
    assert!(matches!(done, Some(Ok(Val::Null))));
    assert_eq!(h.get("x"), Some(Val::Num(1.0)));
}
