use std::rc::Rc;

use super::Parser;
use crate::ast::{
    Branch, EachLoop, IfStatement, MarchLoop, PrintStatement, RespondStatement, RouteStatement,
    SelectCase, SelectStatement, Stmt,
};
use crate::error::ParseError;
use crate::lexer::TokenKind;

impl<'a> Parser<'a> {
    /// `print a, b, ...`; a bare `print` writes an empty line.
    pub(super) fn parse_print(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("print")?;
        let mut values = Vec::new();
        if self.on_same_line() && self.at_expr_start() {
            values.push(self.parse_expr()?);
            while self.at_punct(",") {
                self.advance();
                values.push(self.parse_expr()?);
            }
        }
        Ok(Stmt::Print(PrintStatement { values, line }))
    }

    pub(super) fn parse_if(&mut self, line: u32) -> Result<Stmt, ParseError> {
        const BRANCH_END: &[&str] = &["elif", "else", "end"];

        self.expect_keyword("if")?;
        let guard = self.parse_expr()?;
        self.expect_arrow()?;
        let body = self.parse_block(BRANCH_END)?;
        let mut branches = vec![Branch { guard, body }];

        while self.at_keyword("elif") {
            self.advance();
            let guard = self.parse_expr()?;
            self.expect_arrow()?;
            let body = self.parse_block(BRANCH_END)?;
            branches.push(Branch { guard, body });
        }

        let default = if self.at_keyword("else") {
            self.advance();
            self.expect_arrow()?;
            Some(self.parse_block(&["end"])?)
        } else {
            None
        };
        self.expect_keyword("end")?;

        Ok(Stmt::If(IfStatement {
            branches,
            default,
            line,
        }))
    }

    pub(super) fn parse_each(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("each")?;
        let variable = self.take_ident()?;
        self.expect_keyword("in")?;
        let iterable = self.parse_expr()?;
        self.expect_arrow()?;
        let body = self.parse_block(&["end"])?;
        self.expect_keyword("end")?;
        Ok(Stmt::Each(EachLoop {
            variable,
            iterable,
            body,
            line,
        }))
    }

    pub(super) fn parse_march(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("march")?;
        let variable = self.take_ident()?;
        self.expect_keyword("from")?;
        let start = self.parse_expr()?;
        self.expect_keyword("to")?;
        let end = self.parse_expr()?;
        self.expect_arrow()?;
        let body = self.parse_block(&["end"])?;
        self.expect_keyword("end")?;
        Ok(Stmt::March(MarchLoop {
            variable,
            start,
            end,
            body,
            line,
        }))
    }

    /// `select subject => (case key [when guard] => body end)* end`
    pub(super) fn parse_select(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("select")?;
        let subject = self.parse_expr()?;
        self.expect_arrow()?;

        let mut cases = Vec::new();
        while self.at_keyword("case") {
            self.advance();
            let key = self.parse_literal()?;
            let guard = if self.at_keyword("when") {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect_arrow()?;
            let body = self.parse_block(&["end"])?;
            self.expect_keyword("end")?;
            cases.push(SelectCase { key, guard, body });
        }
        if !self.at_keyword("end") {
            return Err(self.unexpected("'case' or 'end'"));
        }
        self.advance();

        Ok(Stmt::Select(SelectStatement {
            subject,
            cases,
            line,
        }))
    }

    /// `route [method] "/path" => body end`
    pub(super) fn parse_route(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("route")?;
        let method = if self.cur().kind == TokenKind::Identifier {
            self.advance().text.to_ascii_uppercase()
        } else {
            "GET".to_string()
        };
        let path = self.take_str()?;
        self.expect_arrow()?;
        let body = self.parse_block(&["end"])?;
        self.expect_keyword("end")?;
        Ok(Stmt::Route(RouteStatement {
            method,
            path,
            body: Rc::new(body),
            line,
        }))
    }

    /// `respond body [, status]`
    pub(super) fn parse_respond(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("respond")?;
        let body = self.parse_expr()?;
        let status = if self.at_punct(",") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Respond(RespondStatement { body, status, line }))
    }
}
