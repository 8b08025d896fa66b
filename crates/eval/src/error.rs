use marrow_core::ParseError;

/// Errors raised while evaluating a program. None are recovered from
/// inside the language; they unwind to the caller of [`crate::Evaluator::run`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("cannot assign to immutable binding '{name}'")]
    ImmutableAssignment { name: String },

    #[error("'{name}' is already declared in this scope")]
    AlreadyDeclared { name: String },

    #[error("value of type {type_name} is not callable")]
    NotCallable { type_name: &'static str },

    #[error("'each' needs a List, got {type_name}")]
    NotIterable { type_name: &'static str },

    #[error("malformed instantiation of group '{group}': {message}")]
    Instantiation { group: String, message: String },

    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("numeric overflow in '{op}'")]
    Overflow { op: String },

    #[error("{type_name} has no member '{member}'")]
    UnknownMember { type_name: String, member: String },

    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: String, length: usize },

    #[error("unknown group '{name}'")]
    UnknownGroup { name: String },

    #[error("unknown blueprint '{name}'")]
    UnknownBlueprint { name: String },

    #[error("group '{group}' does not implement '{method}' required by blueprint '{blueprint}'")]
    MissingImplementation {
        group: String,
        blueprint: String,
        method: String,
    },

    #[error("group '{group}' already implements blueprint '{blueprint}'")]
    DuplicateImplementation { group: String, blueprint: String },

    #[error("'{name}' takes {expected} argument(s) but {got} were given")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("'{keyword}' requires capability '{capability}', which this file did not declare")]
    CapabilityNotDeclared { keyword: String, capability: String },

    #[error("unknown capability '{name}'")]
    UnknownCapability { name: String },

    #[error("capability '{capability}': {message}")]
    Capability { capability: String, message: String },

    #[error("'respond' used outside of a route handler")]
    RespondOutsideRoute,

    #[error("call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("input error: {message}")]
    Input { message: String },

    /// Any of the above, tagged with the line of the failing statement.
    #[error("line {line}: {source}")]
    At {
        line: u32,
        #[source]
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    /// Attach a source line unless one is already attached.
    pub fn at(self, line: u32) -> RuntimeError {
        match self {
            located @ RuntimeError::At { .. } => located,
            other => RuntimeError::At {
                line,
                source: Box::new(other),
            },
        }
    }

    /// The error without its line tag.
    pub fn kind(&self) -> &RuntimeError {
        match self {
            RuntimeError::At { source, .. } => source.kind(),
            other => other,
        }
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            RuntimeError::At { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub(crate) fn capability(capability: &str, message: impl Into<String>) -> Self {
        RuntimeError::Capability {
            capability: capability.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// Anything the lex → parse → evaluate pipeline can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
