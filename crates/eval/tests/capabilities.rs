//! Capability hooks, the web dispatcher and the shipped builtins.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use async_trait::async_trait;
use marrow_core::ast::{DeclArg, Declaration, Expr, Literal, Program, RespondStatement, RouteStatement, Stmt};
use marrow_core::parse_source;
use marrow_eval::capability::web::{Response, WebCapability};
use marrow_eval::{
    Capability, CapabilityRegistry, Env, EvalOptions, Evaluator, Mutability, RuntimeError,
    ScriptedInput, Value, WebOptions,
};

async fn run_with(registry: Rc<CapabilityRegistry>, src: &str) -> (Evaluator, Result<(), RuntimeError>) {
    let program = parse_source(src, registry.as_ref()).expect("program should parse");
    let mut evaluator =
        Evaluator::new(registry, EvalOptions::quiet()).with_input(ScriptedInput::default());
    let result = evaluator.run(&program).await;
    (evaluator, result)
}

fn registry_with_web() -> (Rc<CapabilityRegistry>, Rc<WebCapability>) {
    let web = Rc::new(WebCapability::new(WebOptions::default()));
    let mut registry = CapabilityRegistry::with_defaults();
    registry.register(web.clone());
    (Rc::new(registry), web)
}

// ──────────────────────────────────────────────
// Hook order
// ──────────────────────────────────────────────

struct Recorder {
    name: &'static str,
    log: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl Capability for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn on_declare(&self, argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        let arg = argument.map(DeclArg::as_str).unwrap_or("-");
        self.log
            .borrow_mut()
            .push(format!("{}:declare:{}", self.name, arg));
        Ok(())
    }

    fn register_builtins(&self, root: &Env, _argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        self.log.borrow_mut().push(format!("{}:builtins", self.name));
        root.define_or_replace(
            format!("{}_marker", self.name),
            Value::text(self.name),
            Mutability::Immutable,
        );
        Ok(())
    }

    async fn on_file_complete(
        &self,
        declared: &BTreeSet<String>,
        evaluator: &mut Evaluator,
    ) -> Result<(), RuntimeError> {
        self.log.borrow_mut().push(format!(
            "{}:complete:{}:{}",
            self.name,
            declared.len(),
            evaluator.output().len()
        ));
        Ok(())
    }
}

#[tokio::test]
async fn hooks_run_in_declaration_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut registry = CapabilityRegistry::empty();
    for name in ["alpha", "beta"] {
        registry.register(Rc::new(Recorder {
            name,
            log: Rc::clone(&log),
        }));
    }

    let (evaluator, result) = run_with(
        Rc::new(registry),
        "declare beta 3\ndeclare alpha\nprint beta_marker, alpha_marker\n",
    )
    .await;
    result.unwrap();

    assert_eq!(evaluator.output(), ["betaalpha".to_string()]);
    assert_eq!(evaluator.declared(), ["beta".to_string(), "alpha".to_string()]);
    assert_eq!(
        *log.borrow(),
        vec![
            "beta:declare:3",
            "beta:builtins",
            "alpha:declare:-",
            "alpha:builtins",
            "beta:complete:2:1",
            "alpha:complete:2:1",
        ]
    );
}

#[tokio::test]
async fn undeclared_capability_keywords_fail_at_runtime() {
    // Built by hand: the parser would already reject this program.
    let program = Program {
        declarations: vec![],
        body: vec![Stmt::Route(RouteStatement {
            method: "GET".to_string(),
            path: "/".to_string(),
            body: Rc::new(vec![]),
            line: 1,
        })],
    };
    let mut evaluator = Evaluator::new(Rc::new(CapabilityRegistry::with_defaults()), EvalOptions::quiet());
    let err = evaluator.run(&program).await.unwrap_err();
    assert_eq!(
        err.kind(),
        &RuntimeError::CapabilityNotDeclared {
            keyword: "route".to_string(),
            capability: "web".to_string(),
        }
    );
}

#[tokio::test]
async fn unknown_declarations_fail_at_runtime() {
    let program = Program {
        declarations: vec![Declaration {
            name: "gpio".to_string(),
            argument: None,
            line: 1,
        }],
        body: vec![],
    };
    let mut evaluator = Evaluator::new(Rc::new(CapabilityRegistry::with_defaults()), EvalOptions::quiet());
    let err = evaluator.run(&program).await.unwrap_err();
    assert_eq!(
        err.kind(),
        &RuntimeError::UnknownCapability {
            name: "gpio".to_string()
        }
    );
}

// ──────────────────────────────────────────────
// web
// ──────────────────────────────────────────────

const SERVICE: &str = "\
declare web
mutable hits = 0
route \"/hello\" =>
  respond \"hi\"
  print \"unreachable\"
end
route post \"/echo\" =>
  respond request.body, 201
end
route \"/count\" =>
  hits := hits + 1
  respond {\"hits\": hits}
end
route \"/quiet\" =>
  print \"handled \", request.method, \" \", request.path
end
";

#[tokio::test]
async fn routes_are_registered_in_order() {
    let (registry, web) = registry_with_web();
    let (_, result) = run_with(registry, SERVICE).await;
    result.unwrap();
    assert_eq!(web.port(), None);
    assert_eq!(
        web.routes(),
        vec![
            ("GET".to_string(), "/hello".to_string()),
            ("POST".to_string(), "/echo".to_string()),
            ("GET".to_string(), "/count".to_string()),
            ("GET".to_string(), "/quiet".to_string()),
        ]
    );
}

#[tokio::test]
async fn respond_stops_the_handler() {
    let (registry, web) = registry_with_web();
    let (mut evaluator, result) = run_with(registry, SERVICE).await;
    result.unwrap();

    let response = web
        .dispatch(&mut evaluator, "GET", "/hello", Value::Null)
        .await
        .unwrap();
    assert_eq!(
        response,
        Some(Response {
            status: 200,
            body: Value::text("hi")
        })
    );
    assert!(evaluator.output().is_empty());
}

#[tokio::test]
async fn handlers_see_request_and_custom_status() {
    let (registry, web) = registry_with_web();
    let (mut evaluator, result) = run_with(registry, SERVICE).await;
    result.unwrap();

    let response = web
        .dispatch(&mut evaluator, "post", "/echo", Value::text("payload"))
        .await
        .unwrap()
        .expect("route should match");
    assert_eq!(response.status, 201);
    assert_eq!(response.body, Value::text("payload"));

    // Method must match.
    let missing = web
        .dispatch(&mut evaluator, "GET", "/echo", Value::Null)
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn handlers_share_program_state() {
    let (registry, web) = registry_with_web();
    let (mut evaluator, result) = run_with(registry, SERVICE).await;
    result.unwrap();

    for expected in 1..=2 {
        let response = web
            .dispatch(&mut evaluator, "GET", "/count", Value::Null)
            .await
            .unwrap()
            .expect("route should match");
        assert_eq!(response.body.to_json(), serde_json::json!({"hits": expected}));
    }
    assert_eq!(evaluator.root().lookup("hits"), Some(Value::number(2)));
}

#[tokio::test]
async fn handler_without_respond_answers_no_content() {
    let (registry, web) = registry_with_web();
    let (mut evaluator, result) = run_with(registry, SERVICE).await;
    result.unwrap();

    let response = web
        .dispatch(&mut evaluator, "GET", "/quiet", Value::Null)
        .await
        .unwrap()
        .expect("route should match");
    assert_eq!(response.status, 204);
    assert_eq!(evaluator.output(), ["handled GET /quiet".to_string()]);
}

#[tokio::test]
async fn invalid_status_is_a_capability_error() {
    let (registry, web) = registry_with_web();
    let src = "declare web\nroute \"/bad\" =>\n  respond \"x\", 42\nend\n";
    let (mut evaluator, result) = run_with(registry, src).await;
    result.unwrap();

    let err = web
        .dispatch(&mut evaluator, "GET", "/bad", Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.line(), Some(3));
    assert!(matches!(
        err.kind(),
        RuntimeError::Capability { capability, .. } if capability == "web"
    ));
}

#[test]
fn respond_statement_shape() {
    // `respond` carries an optional status expression.
    let registry = CapabilityRegistry::with_defaults();
    let program = parse_source("declare web\nrespond \"ok\", 201\n", &registry).unwrap();
    assert_eq!(
        program.body,
        vec![Stmt::Respond(RespondStatement {
            body: Expr::Literal(Literal::Text("ok".to_string())),
            status: Some(Expr::Literal(Literal::Number("201".to_string()))),
            line: 2,
        })]
    );
}

// ──────────────────────────────────────────────
// time, random, files
// ──────────────────────────────────────────────

#[tokio::test]
async fn time_builtins_need_declaration() {
    let registry = Rc::new(CapabilityRegistry::with_defaults());
    let (evaluator, result) = run_with(
        Rc::clone(&registry),
        "declare time\nimmutable stamp = now()\nwait(1)\nprint type_of(stamp)\n",
    )
    .await;
    result.unwrap();
    assert_eq!(evaluator.output(), ["Text".to_string()]);

    let (_, result) = run_with(Rc::clone(&registry), "print now()\n").await;
    let err = result.unwrap_err();
    assert_eq!(
        err.kind(),
        &RuntimeError::CapabilityNotDeclared {
            keyword: "now".to_string(),
            capability: "time".to_string(),
        }
    );
    assert_eq!(err.line(), Some(1));

    let (_, result) = run_with(Rc::clone(&registry), "declare time\nprint random_int(1, 2)\n").await;
    assert_eq!(
        result.unwrap_err().kind(),
        &RuntimeError::CapabilityNotDeclared {
            keyword: "random_int".to_string(),
            capability: "random".to_string(),
        }
    );

    let (_, result) = run_with(registry, "print nothing_here\n").await;
    assert_eq!(
        result.unwrap_err().kind(),
        &RuntimeError::UndefinedVariable {
            name: "nothing_here".to_string()
        }
    );
}

#[tokio::test]
async fn user_bindings_shadow_capability_builtin_names() {
    let (evaluator, result) = run_with(
        Rc::new(CapabilityRegistry::with_defaults()),
        "task now() =>\n  \"noon\"\nend\nprint now()\n",
    )
    .await;
    result.unwrap();
    assert_eq!(evaluator.output(), ["noon".to_string()]);
}

#[tokio::test]
async fn seeded_random_is_reproducible() {
    let src = "\
declare random 1234
march i from 1 to 5 =>
  print random_int(1, 6)
end
print random_pick([\"a\", \"b\", \"c\"])
";
    let registry = Rc::new(CapabilityRegistry::with_defaults());
    let (first, result) = run_with(Rc::clone(&registry), src).await;
    result.unwrap();
    let (second, result) = run_with(registry, src).await;
    result.unwrap();

    assert_eq!(first.output().len(), 6);
    assert_eq!(first.output(), second.output());
    for line in &first.output()[..5] {
        let n: i64 = line.parse().unwrap();
        assert!((1..=6).contains(&n));
    }
}

#[tokio::test]
async fn files_resolve_against_base_directory() {
    let dir = tempfile::tempdir().unwrap();
    let src = format!(
        "\
declare files \"{}\"
write_file(\"note.txt\", \"remember the milk\")
print read_file(\"note.txt\")
print file_exists(\"note.txt\"), \" \", file_exists(\"other.txt\")
",
        dir.path().display()
    );
    let registry = Rc::new(CapabilityRegistry::with_defaults());
    let (evaluator, result) = run_with(registry, &src).await;
    result.unwrap();

    assert_eq!(
        evaluator.output(),
        ["remember the milk".to_string(), "true false".to_string()]
    );
    let written = std::fs::read_to_string(dir.path().join("note.txt")).unwrap();
    assert_eq!(written, "remember the milk");
}

#[tokio::test]
async fn reading_a_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let src = format!("declare files \"{}\"\nread_file(\"absent.txt\")\n", dir.path().display());
    let (_, result) = run_with(Rc::new(CapabilityRegistry::with_defaults()), &src).await;
    let err = result.unwrap_err();
    assert_eq!(err.line(), Some(2));
    assert!(matches!(
        err.kind(),
        RuntimeError::Capability { capability, .. } if capability == "files"
    ));
}
