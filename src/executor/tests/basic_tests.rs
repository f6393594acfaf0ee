//! Tests for bindings, literals and member access

use maplit::btreemap;

use super::helpers::{eval, Harness};
use crate::executor::Val;

#[tokio::test]
async fn test_return_literal() {
    assert_eq!(eval("return 42").await.unwrap(), Val::Num(42.0));
}

#[tokio::test]
async fn test_no_return_is_null() {
    assert_eq!(eval("x = 1").await.unwrap(), Val::Null);
}

#[tokio::test]
async fn test_top_level_bindings_persist_across_units() {
    let h = Harness::new();
    h.run("let a = 1").await.unwrap();
    h.run("b = a + 1").await.unwrap();

    assert_eq!(h.get("a"), Some(Val::Num(1.0)));
    assert_eq!(h.get("b"), Some(Val::Num(2.0)));
}

#[tokio::test]
async fn test_redeclaration_replaces_binding() {
    let h = Harness::new();
    h.run("const a = 1").await.unwrap();
    h.run("let a = 2\na = 3").await.unwrap();

    assert_eq!(h.get("a"), Some(Val::Num(3.0)));
}

#[tokio::test]
async fn test_block_scope_does_not_leak() {
    let h = Harness::new();
    h.run("{\n  let inner = 1\n  outer = inner\n}").await.unwrap();

    assert_eq!(h.get("inner"), None);
    assert_eq!(h.get("outer"), Some(Val::Num(1.0)));
}

#[tokio::test]
async fn test_assignment_updates_nearest_binding() {
    let h = Harness::new();
    h.run("let x = 1\n{\n  let x = 10\n  x = 20\n}").await.unwrap();

    assert_eq!(h.get("x"), Some(Val::Num(1.0)));
}

#[tokio::test]
async fn test_object_literal_and_member_access() {
    let h = Harness::new();
    h.run("let o = { a: 1, b: { c: \"deep\" } }\nlet v = o.b.c\nlet missing = o.zzz")
        .await
        .unwrap();

    assert_eq!(h.get("v"), Some(Val::Str("deep".to_string())));
    assert_eq!(h.get("missing"), Some(Val::Null));
}

#[tokio::test]
async fn test_nested_assignment_path() {
    let h = Harness::new();
    h.run("let o = { items: [1, 2, 3] }\no.items[1] = 20\no.name = \"n\"")
        .await
        .unwrap();

    assert_eq!(
        h.get("o"),
        Some(Val::Obj(btreemap! {
            "items".to_string() => Val::List(vec![Val::Num(1.0), Val::Num(20.0), Val::Num(3.0)]),
            "name".to_string() => Val::Str("n".to_string()),
        }))
    );
}

#[tokio::test]
async fn test_const_object_fields_are_mutable() {
    let h = Harness::new();
    h.run("const o = {}\no.x = 1").await.unwrap();

    assert_eq!(
        h.get("o"),
        Some(Val::Obj(btreemap! { "x".to_string() => Val::Num(1.0) }))
    );
}

#[tokio::test]
async fn test_destructuring_declaration() {
    let h = Harness::new();
    h.run("const { a, c } = { a: 1, b: 2 }").await.unwrap();

    assert_eq!(h.get("a"), Some(Val::Num(1.0)));
    assert_eq!(h.get("c"), Some(Val::Null));
}

#[tokio::test]
async fn test_indexing() {
    assert_eq!(eval("return [10, 20][1]").await.unwrap(), Val::Num(20.0));
    assert_eq!(eval("return [10, 20][5]").await.unwrap(), Val::Null);
    assert_eq!(
        eval("return \"héllo\"[1]").await.unwrap(),
        Val::Str("é".to_string())
    );
    assert_eq!(
        eval("return { k: true }[\"k\"]").await.unwrap(),
        Val::Bool(true)
    );
}

#[tokio::test]
async fn test_length_property() {
    assert_eq!(eval("return [1, 2, 3].length").await.unwrap(), Val::Num(3.0));
    assert_eq!(eval("return \"abcd\".length").await.unwrap(), Val::Num(4.0));
}

#[tokio::test]
async fn test_optional_member_on_null() {
    assert_eq!(eval("let n = null\nreturn n?.x").await.unwrap(), Val::Null);
}

#[tokio::test]
async fn test_builtins_are_shadowed_by_bindings() {
    let h = Harness::new();
    h.run("let len = 5\nlet v = len").await.unwrap();
    assert_eq!(h.get("v"), Some(Val::Num(5.0)));
}
