/// Recursive-descent parser from the token stream to a [`Program`].
///
/// Trivia tokens are dropped up front, but each remaining token remembers
/// whether whitespace preceded it; slash member access and bare call
/// arguments depend on that and on line numbers.
use std::collections::BTreeSet;

use crate::ast::{DeclArg, Declaration, Program, Stmt};
use crate::catalog::CapabilityCatalog;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

mod constructs;
mod expressions;
mod flow;

/// Keywords the grammar reserves for capabilities. They parse only when a
/// registered capability owns them and that capability was declared.
pub const CAPABILITY_KEYWORDS: &[&str] = &["route", "respond"];

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Significant {
    token: Token,
    /// Whitespace, a comment or a newline came right before this token.
    spaced: bool,
}

struct Parser<'a> {
    tokens: Vec<Significant>,
    pos: usize,
    catalog: &'a dyn CapabilityCatalog,
    declared: BTreeSet<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &[Token], catalog: &'a dyn CapabilityCatalog) -> Self {
        let mut significant = Vec::with_capacity(tokens.len());
        let mut spaced = false;
        for token in tokens {
            if token.kind.is_trivia() {
                spaced = true;
                continue;
            }
            significant.push(Significant {
                token: token.clone(),
                spaced,
            });
            spaced = false;
        }
        if significant.last().map(|s| s.token.kind) != Some(TokenKind::Eof) {
            let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
            significant.push(Significant {
                token: Token {
                    kind: TokenKind::Eof,
                    text: String::new(),
                    line,
                    column,
                },
                spaced,
            });
        }
        Parser {
            tokens: significant,
            pos: 0,
            catalog,
            declared: BTreeSet::new(),
        }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Significant {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    /// Line of the most recently consumed token.
    fn prev_line(&self) -> u32 {
        if self.pos == 0 {
            return 0;
        }
        self.tokens[(self.pos - 1).min(self.tokens.len() - 1)]
            .token
            .line
    }

    fn on_same_line(&self) -> bool {
        self.pos > 0 && self.cur_line() == self.prev_line()
    }

    fn at_eof(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        let t = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.cur().is_keyword(keyword)
    }

    fn at_any_keyword(&self, keywords: &[&str]) -> bool {
        self.cur().kind == TokenKind::Keyword && keywords.contains(&self.cur().text.as_str())
    }

    fn at_operator(&self, op: &str) -> bool {
        self.cur().is_operator(op)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.cur().is_punct(punct)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Token, ParseError> {
        if self.at_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(format!("'{}'", keyword)))
        }
    }

    fn expect_operator(&mut self, op: &str) -> Result<Token, ParseError> {
        if self.at_operator(op) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(format!("'{}'", op)))
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<Token, ParseError> {
        if self.at_punct(punct) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(format!("'{}'", punct)))
        }
    }

    fn expect_arrow(&mut self) -> Result<(), ParseError> {
        self.expect_operator("=>").map(|_| ())
    }

    fn take_ident(&mut self) -> Result<String, ParseError> {
        if self.cur().kind == TokenKind::Identifier {
            Ok(self.advance().text)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn take_str(&mut self) -> Result<String, ParseError> {
        if self.cur().kind == TokenKind::Str {
            let tok = self.advance();
            Ok(tok.string_value().unwrap_or_default())
        } else {
            Err(self.unexpected("string literal"))
        }
    }

    /// Error for the current token. Lexically broken tokens report as such.
    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Invalid => ParseError::InvalidCharacter {
                text: tok.text.clone(),
                location: tok.location(),
            },
            TokenKind::UnterminatedStr => ParseError::UnterminatedString {
                text: tok.text.clone(),
                location: tok.location(),
            },
            TokenKind::Eof => ParseError::Unexpected {
                expected: expected.into(),
                found: "end of input".to_string(),
                location: tok.location(),
            },
            _ => ParseError::Unexpected {
                expected: expected.into(),
                found: tok.text.clone(),
                location: tok.location(),
            },
        }
    }

    // -- Program ------------------------------------------------

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut declarations = Vec::new();
        while self.at_keyword("declare") {
            declarations.push(self.parse_declaration()?);
        }

        let mut body = Vec::new();
        while !self.at_eof() {
            if self.at_keyword("declare") {
                let location = self.cur().location();
                self.advance();
                let name = self.peek_at(0).token.text.clone();
                return Err(ParseError::MisplacedDeclaration { name, location });
            }
            body.push(self.parse_statement()?);
        }

        Ok(Program { declarations, body })
    }

    fn parse_declaration(&mut self) -> Result<Declaration, ParseError> {
        let line = self.expect_keyword("declare")?.line;
        let location = self.cur().location();
        let name = self.take_ident()?;
        if self.declared.contains(&name) {
            return Err(ParseError::DuplicateDeclaration { name, location });
        }
        if !self.catalog.is_known(&name) {
            return Err(ParseError::UnknownCapability { name, location });
        }

        let argument = if self.on_same_line() {
            match self.cur().kind {
                TokenKind::Str => Some(DeclArg::Text(self.take_str()?)),
                TokenKind::Number => Some(DeclArg::Number(self.advance().text)),
                TokenKind::Identifier => Some(DeclArg::Ident(self.advance().text)),
                _ => None,
            }
        } else {
            None
        };

        self.declared.insert(name.clone());
        Ok(Declaration {
            name,
            argument,
            line,
        })
    }

    // -- Statements ---------------------------------------------

    /// Reject capability keywords whose owner has not been declared.
    fn check_gate(&self) -> Result<(), ParseError> {
        let tok = self.cur();
        if tok.kind != TokenKind::Keyword {
            return Ok(());
        }
        match self.catalog.keyword_owner(&tok.text) {
            Some(owner) if self.declared.contains(owner) => Ok(()),
            Some(owner) => Err(ParseError::MissingCapability {
                keyword: tok.text.clone(),
                capability: owner.to_string(),
                location: tok.location(),
            }),
            None if CAPABILITY_KEYWORDS.contains(&tok.text.as_str()) => {
                Err(ParseError::UnavailableKeyword {
                    keyword: tok.text.clone(),
                    location: tok.location(),
                })
            }
            None => Ok(()),
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        self.check_gate()?;
        let line = self.cur_line();
        if self.cur().kind == TokenKind::Keyword {
            match self.cur().text.as_str() {
                "group" => return self.parse_group(line),
                "blueprint" => return self.parse_blueprint(line),
                "do" => return self.parse_do(line),
                "task" if self.peek_at(1).token.kind == TokenKind::Identifier => {
                    return self.parse_task_statement()
                }
                "mutable" | "immutable" => return self.parse_variable(line),
                "print" => return self.parse_print(line),
                "if" => return self.parse_if(line),
                "each" => return self.parse_each(line),
                "march" => return self.parse_march(line),
                "select" => return self.parse_select(line),
                "route" => return self.parse_route(line),
                "respond" => return self.parse_respond(line),
                _ => {}
            }
        }
        self.parse_expression_statement(line)
    }

    /// Statements until one of `terminators` (not consumed).
    fn parse_block(&mut self, terminators: &[&str]) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        while !self.at_any_keyword(terminators) {
            if self.at_eof() {
                let expected = terminators
                    .iter()
                    .map(|t| format!("'{}'", t))
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(self.unexpected(expected));
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }
}

/// Parse an already-lexed token stream.
pub fn parse(tokens: &[Token], catalog: &dyn CapabilityCatalog) -> Result<Program, ParseError> {
    let mut p = Parser::new(tokens, catalog);
    p.parse_program()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
