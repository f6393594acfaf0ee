use super::*;

fn parse_one(source: &str) -> Stmt {
    let mut statements = parse_program(source).expect("Should parse");
    assert_eq!(statements.len(), 1, "expected one statement in {:?}", source);
    statements.remove(0)
}

fn parse_expr(source: &str) -> Expr {
    match parse_one(source) {
        Stmt::Expr { expr, .. } => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

/* ===================== Literals ===================== */

#[test]
fn test_parse_number() {
    match parse_expr("42.5") {
        Expr::LitNum { v, .. } => assert_eq!(v, 42.5),
        other => panic!("Expected LitNum, got {:?}", other),
    }
}

#[test]
fn test_parse_negative_number_is_unary() {
    match parse_expr("-3") {
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
            ..
        } => assert!(matches!(*operand, Expr::LitNum { v, .. } if v == 3.0)),
        other => panic!("Expected Unary Neg, got {:?}", other),
    }
}

#[test]
fn test_parse_string_escapes() {
    match parse_expr(r#""a\tb\n\"c\"""#) {
        Expr::LitStr { v, .. } => assert_eq!(v, "a\tb\n\"c\""),
        other => panic!("Expected LitStr, got {:?}", other),
    }
    match parse_expr("'single'") {
        Expr::LitStr { v, .. } => assert_eq!(v, "single"),
        other => panic!("Expected LitStr, got {:?}", other),
    }
}

#[test]
fn test_parse_object_literal() {
    match parse_expr(r#"({ a: 1, "b c": 2, d })"#) {
        Expr::LitObj { properties, .. } => {
            let keys: Vec<&str> = properties.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["a", "b c", "d"]);
            assert!(matches!(&properties[2].1, Expr::Ident { name, .. } if name == "d"));
        }
        other => panic!("Expected LitObj, got {:?}", other),
    }
}

#[test]
fn test_parse_array_trailing_comma() {
    match parse_expr("[1, 2, 3,]") {
        Expr::LitList { elements, .. } => assert_eq!(elements.len(), 3),
        other => panic!("Expected LitList, got {:?}", other),
    }
}

/* ===================== Operators ===================== */

#[test]
fn test_multiplication_binds_tighter() {
    match parse_expr("2 + 3 * 4") {
        Expr::BinaryOp {
            op: BinaryOp::Add,
            right,
            ..
        } => assert!(matches!(*right, Expr::BinaryOp { op: BinaryOp::Mul, .. })),
        other => panic!("Expected Add at the root, got {:?}", other),
    }
}

#[test]
fn test_binary_ops_are_left_associative() {
    match parse_expr("10 - 4 - 3") {
        Expr::BinaryOp {
            op: BinaryOp::Sub,
            left,
            right,
            ..
        } => {
            assert!(matches!(*left, Expr::BinaryOp { op: BinaryOp::Sub, .. }));
            assert!(matches!(*right, Expr::LitNum { v, .. } if v == 3.0));
        }
        other => panic!("Expected Sub at the root, got {:?}", other),
    }
}

#[test]
fn test_parse_ternary_and_nullish() {
    assert!(matches!(parse_expr("a ? 1 : 2"), Expr::Ternary { .. }));
    assert!(matches!(
        parse_expr("a ?? b"),
        Expr::BinaryOp {
            op: BinaryOp::Nullish,
            ..
        }
    ));
}

#[test]
fn test_parse_optional_member_and_call() {
    match parse_expr("a?.b.c(1, 2)") {
        Expr::Call { callee, args, .. } => {
            assert_eq!(args.len(), 2);
            match *callee {
                Expr::Member {
                    object, property, optional: false, ..
                } => {
                    assert_eq!(property, "c");
                    assert!(matches!(*object, Expr::Member { optional: true, .. }));
                }
                other => panic!("Expected Member callee, got {:?}", other),
            }
        }
        other => panic!("Expected Call, got {:?}", other),
    }
}

#[test]
fn test_parse_await() {
    match parse_expr("await time.sleep(5)") {
        Expr::Await { inner, .. } => assert!(matches!(*inner, Expr::Call { .. })),
        other => panic!("Expected Await, got {:?}", other),
    }
}

/* ===================== Statements ===================== */

#[test]
fn test_parse_assignment_path() {
    match parse_one("obj.items[0] = 5") {
        Stmt::Assign { var, path, .. } => {
            assert_eq!(var, "obj");
            assert_eq!(path.len(), 2);
            assert!(matches!(&path[0], PathSegment::Field(field) if field == "items"));
            assert!(matches!(&path[1], PathSegment::Index(_)));
        }
        other => panic!("Expected Assign, got {:?}", other),
    }
}

#[test]
fn test_equality_is_not_assignment() {
    assert!(matches!(parse_one("x == 1"), Stmt::Expr { .. }));
}

#[test]
fn test_parse_destructure() {
    match parse_one("const { a, b } = obj") {
        Stmt::Declare {
            var_kind: VarKind::Const,
            target: Binding::Fields(names),
            init: Some(_),
            ..
        } => assert_eq!(names, vec!["a".to_string(), "b".to_string()]),
        other => panic!("Expected destructuring Declare, got {:?}", other),
    }
}

#[test]
fn test_destructure_requires_initializer() {
    let err = parse_program("let { a }").unwrap_err();
    assert!(err.message().contains("requires an initializer"));
}

#[test]
fn test_parse_imports() {
    match parse_one("import greet as g") {
        Stmt::Import { module, alias, .. } => {
            assert_eq!(module, "greet");
            assert_eq!(alias.as_deref(), Some("g"));
        }
        other => panic!("Expected Import, got {:?}", other),
    }

    match parse_one("from greet import hello, bye") {
        Stmt::FromImport { module, names, .. } => {
            assert_eq!(module, "greet");
            let names: Vec<&str> = names.iter().map(|n| n.name.as_str()).collect();
            assert_eq!(names, vec!["hello", "bye"]);
        }
        other => panic!("Expected FromImport, got {:?}", other),
    }
}

#[test]
fn test_keyword_prefix_is_an_identifier() {
    assert!(matches!(
        parse_expr("imported"),
        Expr::Ident { ref name, .. } if name == "imported"
    ));
}

#[test]
fn test_parse_for_loops() {
    match parse_one("for (let k in obj) { print(k) }") {
        Stmt::ForLoop { kind, binding, .. } => {
            assert_eq!(kind, ForLoopKind::In);
            assert_eq!(binding, "k");
        }
        other => panic!("Expected ForLoop, got {:?}", other),
    }
    assert!(matches!(
        parse_one("for (const v of [1, 2]) {}"),
        Stmt::ForLoop {
            kind: ForLoopKind::Of,
            ..
        }
    ));
}

#[test]
fn test_parse_if_else_chain() {
    match parse_one("if (a) { x = 1 } else if (b) { x = 2 } else { x = 3 }") {
        Stmt::If {
            else_s: Some(else_s),
            ..
        } => assert!(matches!(*else_s, Stmt::If { else_s: Some(_), .. })),
        other => panic!("Expected If with else, got {:?}", other),
    }
}

#[test]
fn test_parse_try_catch() {
    match parse_one("try {\n  x = 1 / 0\n} catch (e) {\n  print(e.code)\n}") {
        Stmt::Try { catch_var, .. } => assert_eq!(catch_var, "e"),
        other => panic!("Expected Try, got {:?}", other),
    }
}

/* ===================== Line Separation ===================== */

#[test]
fn test_statements_on_one_line_are_rejected() {
    let err = parse_program("unknowncmd foo").unwrap_err();
    let span = err.span().expect("error has a location");
    assert_eq!((span.start_line, span.start_col), (0, 11));

    assert!(parse_program("x = 1 y = 2").is_err());
    assert!(parse_program("if (a) { x = 1 y = 2 }").is_err());
}

#[test]
fn test_statements_on_separate_lines() {
    let statements = parse_program("x = 1\ny = 2\n\n// done\n").unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[1].span().line(), 2);
}

#[test]
fn test_trailing_optional_rules_keep_their_line() {
    let statements = parse_program("let a = 1\nlet b = 2").unwrap();
    assert_eq!(statements.len(), 2);
    let first = statements[0].span();
    assert_eq!((first.end_line, first.end_col), (0, 9));

    let statements = parse_program("import time\nfrom greet import hello\nx = 1\n").unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[2].span().line(), 3);
}

#[test]
fn test_block_with_several_statements() {
    let statements = parse_program("if (true) {\n  x = 1\n} else {\n  y = 2\n}\nz = 3").unwrap();
    assert_eq!(statements.len(), 2);

    let statements = parse_program("if (true) {\n  import time\n  x = 1\n}").unwrap();
    match &statements[0] {
        Stmt::If { then_s, .. } => {
            assert!(matches!(&**then_s, Stmt::Block { body, .. } if body.len() == 2))
        }
        other => panic!("Expected If, got {:?}", other),
    }
}

#[test]
fn test_trailing_comment_is_not_part_of_span() {
    let statements = parse_program("x = 1 /* note */\ny = \"a // b\" // done\nz = 3").unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[0].span().end_line, 0);
    assert_eq!(statements[1].span().end_col, 12);
}

#[test]
fn test_semicolon_is_invalid() {
    assert!(parse_program("x = 1;").is_err());
    assert!(parse_program("ls; pwd").is_err());
}

/* ===================== Open Delimiters ===================== */

#[test]
fn test_open_delimiters() {
    assert!(has_open_delimiters("if (true) {"));
    assert!(has_open_delimiters("x = [1,\n2"));
    assert!(has_open_delimiters("/* still open"));
    assert!(!has_open_delimiters("x = )"));
    assert!(!has_open_delimiters("s = \"{\""));
    assert!(!has_open_delimiters("x = 1 // {"));
    assert!(!has_open_delimiters("if (a) { x = 1 }"));
}

#[test]
fn test_string_open_only_with_continuation() {
    assert!(has_open_delimiters("x = \"abc\\"));
    assert!(has_open_delimiters("f('a\\\nb', ["));
    assert!(!has_open_delimiters("x = \"abc"));
    assert!(!has_open_delimiters("echo it's"));
    assert!(!has_open_delimiters("x = [\"abc\n"));
}
