//! Whole-program grammar tests: realistic sources through lex and parse.

use marrow_core::ast::{DeclArg, Expr, Literal, Stmt};
use marrow_core::{lex, parse_source, NoCapabilities, ParseError, StaticCatalog, TokenKind};

fn web() -> StaticCatalog {
    StaticCatalog::new().with("web", &["route", "respond"])
}

const SHOP: &str = r#"declare web 8080
# inventory service
blueprint Priced =>
  task price
end
group Item =>
  immutable name
  mutable stock: Number = 0
  task restock(n) =>
    stock := stock + n
  end
end
do Priced for Item =>
  task price =>
    9.99
  end
end
mutable items = [Item("pen"), Item("ink")]
route post "/restock" =>
  each item in items =>
    item.restock 5
  end
  respond {"ok": true}, 201
end
"#;

#[test]
fn token_texts_rebuild_a_full_program() {
    let tokens = lex(SHOP);
    let rebuilt: String = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(rebuilt, SHOP);
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Comment));
}

#[test]
fn full_program_parses_into_expected_shape() {
    let program = parse_source(SHOP, &web()).unwrap();

    assert_eq!(program.declarations.len(), 1);
    assert_eq!(program.declarations[0].name, "web");
    assert_eq!(
        program.declarations[0].argument,
        Some(DeclArg::Number("8080".to_string()))
    );

    let kinds: Vec<&str> = program
        .body
        .iter()
        .map(|stmt| match stmt {
            Stmt::Blueprint(_) => "blueprint",
            Stmt::Group(_) => "group",
            Stmt::Do(_) => "do",
            Stmt::Variable(_) => "variable",
            Stmt::Route(_) => "route",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["blueprint", "group", "do", "variable", "route"]);

    let Stmt::Group(item) = &program.body[1] else {
        panic!("expected group")
    };
    assert_eq!(item.fields.len(), 2);
    assert!(!item.fields[0].mutable);
    assert_eq!(item.fields[1].type_annotation.as_deref(), Some("Number"));
    assert_eq!(item.methods[0].params, vec!["n".to_string()]);

    let Stmt::Route(route) = &program.body[4] else {
        panic!("expected route")
    };
    assert_eq!(route.method, "POST");
    assert_eq!(route.path, "/restock");
    assert_eq!(route.body.len(), 2);
    assert_eq!(route.line, 19);
}

#[test]
fn bare_member_call_inside_loop() {
    let program = parse_source(SHOP, &web()).unwrap();
    let Stmt::Route(route) = &program.body[4] else {
        panic!("expected route")
    };
    let Stmt::Each(each) = &route.body[0] else {
        panic!("expected each")
    };
    match &each.body[0] {
        Stmt::Expr(statement) => match &statement.expr {
            Expr::Call { callee, args } => {
                assert!(matches!(**callee, Expr::Member { ref property, .. } if property == "restock"));
                assert_eq!(args, &vec![Expr::Literal(Literal::Number("5".to_string()))]);
            }
            other => panic!("expected call, got {:?}", other),
        },
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn same_program_without_capabilities_is_rejected() {
    let err = parse_source(SHOP, &NoCapabilities).unwrap_err();
    assert_eq!(
        err,
        ParseError::UnknownCapability {
            name: "web".to_string(),
            location: marrow_core::Location::new(1, 9),
        }
    );
}

#[test]
fn respond_without_declaration_reports_position() {
    let err = parse_source("print 1\nrespond \"x\"\n", &web()).unwrap_err();
    match err {
        ParseError::MissingCapability {
            keyword,
            capability,
            location,
        } => {
            assert_eq!(keyword, "respond");
            assert_eq!(capability, "web");
            assert_eq!((location.line, location.column), (2, 1));
        }
        other => panic!("expected MissingCapability, got {:?}", other),
    }
}

#[test]
fn task_keyword_starts_declaration_or_inline_task() {
    let program = parse_source(
        "task named =>\n  1\nend\ntask (x) =>\n  x\nend\n",
        &NoCapabilities,
    )
    .unwrap();
    assert!(matches!(&program.body[0], Stmt::Task(decl) if decl.name == "named"));
    assert!(matches!(
        &program.body[1],
        Stmt::Expr(statement) if matches!(&statement.expr, Expr::Task(decl) if decl.name.is_empty())
    ));
}

#[test]
fn select_cases_need_their_own_end() {
    let ok = "select x =>\n  case 1 =>\n    print 1\n  end\n  case \"a\" when y =>\n    print 2\n  end\nend\n";
    let program = parse_source(ok, &NoCapabilities).unwrap();
    let Stmt::Select(select) = &program.body[0] else {
        panic!("expected select")
    };
    assert_eq!(select.cases.len(), 2);
    assert!(select.cases[1].guard.is_some());

    let missing = "select x =>\n  case 1 =>\n    print 1\nend\n";
    assert!(parse_source(missing, &NoCapabilities).is_err());
}

#[test]
fn parse_errors_serialize_with_kind_tag() {
    let err = parse_source("mutable x = @\n", &NoCapabilities).unwrap_err();
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["kind"], "invalid_character");
    assert_eq!(json["text"], "@");
    assert_eq!(json["location"]["line"], 1);
    assert_eq!(json["location"]["column"], 13);
}
