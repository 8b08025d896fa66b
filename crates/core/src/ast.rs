//! AST types produced by the parser and walked by the evaluator.
//!
//! Nodes are immutable once built. Task bodies sit behind `Rc` so closures
//! created at runtime share them instead of copying.

use std::rc::Rc;

// ──────────────────────────────────────────────
// Program and capability declarations
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    pub body: Vec<Stmt>,
}

/// `declare <name> [argument]`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub argument: Option<DeclArg>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclArg {
    Text(String),
    /// Numeric arguments keep their source spelling.
    Number(String),
    Ident(String),
}

impl DeclArg {
    pub fn as_str(&self) -> &str {
        match self {
            DeclArg::Text(s) | DeclArg::Number(s) | DeclArg::Ident(s) => s,
        }
    }
}

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Route(RouteStatement),
    Respond(RespondStatement),
    Group(Rc<GroupDeclaration>),
    Blueprint(Rc<BlueprintDeclaration>),
    Do(DoImplementation),
    Task(Rc<TaskDeclaration>),
    Variable(VariableDeclaration),
    Assign(Assignment),
    Print(PrintStatement),
    If(IfStatement),
    Each(EachLoop),
    March(MarchLoop),
    Select(SelectStatement),
    Expr(ExpressionStatement),
}

impl Stmt {
    /// Source line of the statement's first token.
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Route(s) => s.line,
            Stmt::Respond(s) => s.line,
            Stmt::Group(s) => s.line,
            Stmt::Blueprint(s) => s.line,
            Stmt::Do(s) => s.line,
            Stmt::Task(s) => s.line,
            Stmt::Variable(s) => s.line,
            Stmt::Assign(s) => s.line,
            Stmt::Print(s) => s.line,
            Stmt::If(s) => s.line,
            Stmt::Each(s) => s.line,
            Stmt::March(s) => s.line,
            Stmt::Select(s) => s.line,
            Stmt::Expr(s) => s.line,
        }
    }

    /// The capability-owned keyword that introduces this statement, if any.
    pub fn capability_keyword(&self) -> Option<&'static str> {
        match self {
            Stmt::Route(_) => Some("route"),
            Stmt::Respond(_) => Some("respond"),
            _ => None,
        }
    }
}

/// `route [method] "/path" => ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStatement {
    pub method: String,
    pub path: String,
    pub body: Rc<Vec<Stmt>>,
    pub line: u32,
}

/// `respond body [, status]`
#[derive(Debug, Clone, PartialEq)]
pub struct RespondStatement {
    pub body: Expr,
    pub status: Option<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    pub name: String,
    pub type_annotation: Option<String>,
    pub initializer: Option<Expr>,
    pub mutable: bool,
}

/// `group Name => fields and tasks end`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDeclaration {
    pub name: String,
    pub fields: Vec<FieldDeclaration>,
    pub methods: Vec<Rc<TaskDeclaration>>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<String>,
}

/// `blueprint Name => task signatures end`
#[derive(Debug, Clone, PartialEq)]
pub struct BlueprintDeclaration {
    pub name: String,
    pub signatures: Vec<MethodSignature>,
    pub line: u32,
}

/// `do Blueprint for Group => tasks end`
#[derive(Debug, Clone, PartialEq)]
pub struct DoImplementation {
    pub blueprint: String,
    pub group: String,
    pub methods: Vec<Rc<TaskDeclaration>>,
    pub line: u32,
}

/// A named task, a group method, or (with an empty name) an inline callback.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDeclaration {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub mutable: bool,
    pub type_annotation: Option<String>,
    pub initializer: Option<Expr>,
    pub line: u32,
}

/// `target := value`; the target is an identifier, member or index expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expr,
    pub value: Expr,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrintStatement {
    pub values: Vec<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub guard: Expr,
    pub body: Vec<Stmt>,
}

/// `if` branch, any `elif` branches, optional `else`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub branches: Vec<Branch>,
    pub default: Option<Vec<Stmt>>,
    pub line: u32,
}

/// `each var in list => ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct EachLoop {
    pub variable: String,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
    pub line: u32,
}

/// `march var from start to end => ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct MarchLoop {
    pub variable: String,
    pub start: Expr,
    pub end: Expr,
    pub body: Vec<Stmt>,
    pub line: u32,
}

/// `case key [when guard] => ... end`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectCase {
    pub key: Literal,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub subject: Expr,
    pub cases: Vec<SelectCase>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expr: Expr,
    pub line: u32,
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Decimal spelling as written in the source.
    Number(String),
    Text(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `object.property` or `object/property`
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Literal(Literal),
    Identifier(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    /// Blocking input: `ask prompt`
    Ask(Box<Expr>),
    /// Inline callback: `task (x) => ... end`
    Task(Rc<TaskDeclaration>),
}

impl Expr {
    /// Identifiers and member chains: the only shapes that may take bare arguments.
    pub fn is_callee_shaped(&self) -> bool {
        matches!(self, Expr::Identifier(_) | Expr::Member { .. })
    }
}
