use std::rc::Rc;

use super::Parser;
use crate::ast::{BinaryOp, Expr, Literal, TaskDeclaration, UnaryOp};
use crate::error::ParseError;
use crate::lexer::TokenKind;

impl<'a> Parser<'a> {
    // -- Literal parsing ----------------------------------------

    pub(super) fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let tok = self.cur().clone();
        let lit = match tok.kind {
            TokenKind::Number => Literal::Number(tok.text.clone()),
            TokenKind::Str => Literal::Text(tok.string_value().unwrap_or_default()),
            TokenKind::Keyword if tok.text == "true" => Literal::Bool(true),
            TokenKind::Keyword if tok.text == "false" => Literal::Bool(false),
            TokenKind::Keyword if tok.text == "null" => Literal::Null,
            _ => return Err(self.unexpected("literal value")),
        };
        self.advance();
        Ok(lit)
    }

    // -- Expression parsing --------------------------------------

    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or_expr()
    }

    /// Whether the current token can begin an expression.
    pub(super) fn at_expr_start(&self) -> bool {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Str | TokenKind::Number | TokenKind::Identifier => true,
            TokenKind::Keyword => matches!(
                tok.text.as_str(),
                "true" | "false" | "null" | "not" | "ask" | "task"
            ),
            TokenKind::Punct => matches!(tok.text.as_str(), "(" | "[" | "{"),
            TokenKind::Operator => matches!(tok.text.as_str(), "-" | "!"),
            _ => false,
        }
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.at_keyword("or") || self.at_operator("||") {
            self.advance();
            let right = self.parse_and_expr()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_comparison()?;
        while self.at_keyword("and") || self.at_operator("&&") {
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur().kind {
                TokenKind::Operator => match self.cur().text.as_str() {
                    "==" => BinaryOp::Eq,
                    "!=" => BinaryOp::NotEq,
                    "<" => BinaryOp::Lt,
                    "<=" => BinaryOp::LtEq,
                    ">" => BinaryOp::Gt,
                    ">=" => BinaryOp::GtEq,
                    _ => break,
                },
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.at_operator("+") {
                BinaryOp::Add
            } else if self.at_operator("-") {
                BinaryOp::Sub
            } else {
                break;
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.at_operator("*") {
                BinaryOp::Mul
            } else if self.at_operator("/") {
                BinaryOp::Div
            } else if self.at_operator("%") {
                BinaryOp::Rem
            } else {
                break;
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.at_operator("-") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.at_keyword("not") || self.at_operator("!") {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix(true)
    }

    // -- Postfix: member access, calls, indexing ----------------

    /// A `/` that touches an identifier on both sides reads as member access.
    fn at_slash_member(&self, object: &Expr) -> bool {
        if !object.is_callee_shaped() || !self.at_operator("/") {
            return false;
        }
        let slash = self.peek_at(0);
        let next = self.peek_at(1);
        !slash.spaced && !next.spaced && next.token.kind == TokenKind::Identifier
    }

    /// A string, number or plain identifier on the callee's line.
    fn at_bare_argument(&self) -> bool {
        self.on_same_line()
            && matches!(
                self.cur().kind,
                TokenKind::Str | TokenKind::Number | TokenKind::Identifier
            )
    }

    pub(super) fn parse_postfix(&mut self, allow_bare_call: bool) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.at_punct(".") {
                self.advance();
                let property = self.take_ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.at_slash_member(&expr) {
                self.advance();
                let property = self.take_ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                };
            } else if self.at_punct("(")
                && self.on_same_line()
                && !matches!(expr, Expr::Literal(_))
            {
                let args = self.parse_paren_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.at_punct("[") && self.on_same_line() {
                self.advance();
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if allow_bare_call && expr.is_callee_shaped() && self.at_bare_argument() {
                let args = self.parse_bare_args()?;
                return Ok(Expr::Call {
                    callee: Box::new(expr),
                    args,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_paren_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.at_punct(")") {
            args.push(self.parse_expr()?);
            if self.at_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    /// Greedy comma-separated run of argument-shaped operands.
    ///
    /// Each argument is a postfix expression that may not itself take bare
    /// arguments. The run may continue past a newline only right after a
    /// comma.
    fn parse_bare_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = vec![self.parse_postfix(false)?];
        while self.at_punct(",") {
            self.advance();
            args.push(self.parse_postfix(false)?);
        }
        Ok(args)
    }

    // -- Primary ------------------------------------------------

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.cur().clone();
        match tok.kind {
            TokenKind::Number | TokenKind::Str => Ok(Expr::Literal(self.parse_literal()?)),
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier(tok.text))
            }
            TokenKind::Keyword => match tok.text.as_str() {
                "true" | "false" | "null" => Ok(Expr::Literal(self.parse_literal()?)),
                "ask" => {
                    self.advance();
                    let prompt = self.parse_unary()?;
                    Ok(Expr::Ask(Box::new(prompt)))
                }
                "task" => self.parse_inline_task(),
                _ => Err(self.unexpected("expression")),
            },
            TokenKind::Punct => match tok.text.as_str() {
                "(" => {
                    self.advance();
                    let inner = self.parse_expr()?;
                    self.expect_punct(")")?;
                    Ok(inner)
                }
                "[" => self.parse_array(),
                "{" => self.parse_object(),
                _ => Err(self.unexpected("expression")),
            },
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        self.expect_punct("[")?;
        let mut items = Vec::new();
        while !self.at_punct("]") {
            items.push(self.parse_expr()?);
            if self.at_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct("]")?;
        Ok(Expr::Array(items))
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        self.expect_punct("{")?;
        let mut entries = Vec::new();
        while !self.at_punct("}") {
            let key = match self.cur().kind {
                TokenKind::Str => self.take_str()?,
                TokenKind::Identifier => self.advance().text,
                _ => return Err(self.unexpected("object key")),
            };
            self.expect_punct(":")?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if self.at_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(entries))
    }

    /// `task [params] => body end` in expression position.
    fn parse_inline_task(&mut self) -> Result<Expr, ParseError> {
        let line = self.expect_keyword("task")?.line;
        let params = self.parse_params()?;
        self.expect_arrow()?;
        let body = self.parse_block(&["end"])?;
        self.expect_keyword("end")?;
        Ok(Expr::Task(Rc::new(TaskDeclaration {
            name: String::new(),
            params,
            body,
            line,
        })))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
