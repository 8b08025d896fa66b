use std::rc::Rc;

use super::Parser;
use crate::ast::{
    Assignment, BlueprintDeclaration, DoImplementation, Expr, ExpressionStatement,
    FieldDeclaration, GroupDeclaration, MethodSignature, Stmt, TaskDeclaration,
    VariableDeclaration,
};
use crate::error::ParseError;
use crate::lexer::TokenKind;

impl<'a> Parser<'a> {
    /// `(a, b)` or a bare `a, b` list; may be empty.
    pub(super) fn parse_params(&mut self) -> Result<Vec<String>, ParseError> {
        let mut params = Vec::new();
        if self.at_punct("(") {
            self.advance();
            while !self.at_punct(")") {
                params.push(self.take_ident()?);
                if self.at_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect_punct(")")?;
            return Ok(params);
        }
        while self.cur().kind == TokenKind::Identifier {
            params.push(self.take_ident()?);
            if self.at_punct(",") {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    /// `task name params => body end`
    fn parse_task(&mut self) -> Result<TaskDeclaration, ParseError> {
        let line = self.expect_keyword("task")?.line;
        let name = self.take_ident()?;
        let params = self.parse_params()?;
        self.expect_arrow()?;
        let body = self.parse_block(&["end"])?;
        self.expect_keyword("end")?;
        Ok(TaskDeclaration {
            name,
            params,
            body,
            line,
        })
    }

    pub(super) fn parse_task_statement(&mut self) -> Result<Stmt, ParseError> {
        Ok(Stmt::Task(Rc::new(self.parse_task()?)))
    }

    /// Shared tail of variable and field declarations:
    /// `name [: Type] [= initializer]` after the mutability keyword.
    fn parse_binding_tail(
        &mut self,
    ) -> Result<(String, Option<String>, Option<Expr>), ParseError> {
        let name = self.take_ident()?;
        let type_annotation = if self.at_punct(":") {
            self.advance();
            Some(self.take_ident()?)
        } else {
            None
        };
        let initializer = if self.at_operator("=") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok((name, type_annotation, initializer))
    }

    fn take_mutability(&mut self) -> Result<bool, ParseError> {
        if self.at_keyword("mutable") {
            self.advance();
            Ok(true)
        } else if self.at_keyword("immutable") {
            self.advance();
            Ok(false)
        } else {
            Err(self.unexpected("'mutable' or 'immutable'"))
        }
    }

    pub(super) fn parse_variable(&mut self, line: u32) -> Result<Stmt, ParseError> {
        let mutable = self.take_mutability()?;
        let (name, type_annotation, initializer) = self.parse_binding_tail()?;
        Ok(Stmt::Variable(VariableDeclaration {
            name,
            mutable,
            type_annotation,
            initializer,
            line,
        }))
    }

    pub(super) fn parse_group(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("group")?;
        let name = self.take_ident()?;
        self.expect_arrow()?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at_keyword("end") {
            if self.at_keyword("mutable") || self.at_keyword("immutable") {
                let mutable = self.take_mutability()?;
                let (name, type_annotation, initializer) = self.parse_binding_tail()?;
                fields.push(FieldDeclaration {
                    name,
                    type_annotation,
                    initializer,
                    mutable,
                });
            } else if self.at_keyword("task") {
                methods.push(Rc::new(self.parse_task()?));
            } else {
                return Err(self.unexpected("field, task or 'end'"));
            }
        }
        self.expect_keyword("end")?;

        Ok(Stmt::Group(Rc::new(GroupDeclaration {
            name,
            fields,
            methods,
            line,
        })))
    }

    pub(super) fn parse_blueprint(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("blueprint")?;
        let name = self.take_ident()?;
        self.expect_arrow()?;

        let mut signatures = Vec::new();
        while !self.at_keyword("end") {
            if !self.at_keyword("task") {
                return Err(self.unexpected("task signature or 'end'"));
            }
            self.advance();
            let method = self.take_ident()?;
            let params = self.parse_params()?;
            if self.at_operator("=>") {
                return Err(self.unexpected("task signature without a body"));
            }
            signatures.push(MethodSignature {
                name: method,
                params,
            });
        }
        self.expect_keyword("end")?;

        Ok(Stmt::Blueprint(Rc::new(BlueprintDeclaration {
            name,
            signatures,
            line,
        })))
    }

    /// `do Blueprint for Group => tasks end`
    pub(super) fn parse_do(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.expect_keyword("do")?;
        let blueprint = self.take_ident()?;
        self.expect_keyword("for")?;
        let group = self.take_ident()?;
        self.expect_arrow()?;

        let mut methods = Vec::new();
        while !self.at_keyword("end") {
            if !self.at_keyword("task") {
                return Err(self.unexpected("task or 'end'"));
            }
            methods.push(Rc::new(self.parse_task()?));
        }
        self.expect_keyword("end")?;

        Ok(Stmt::Do(DoImplementation {
            blueprint,
            group,
            methods,
            line,
        }))
    }

    /// An expression, or an assignment when `:=` follows a place expression.
    pub(super) fn parse_expression_statement(&mut self, line: u32) -> Result<Stmt, ParseError> {
        let expr = self.parse_expr()?;
        if !self.at_operator(":=") {
            return Ok(Stmt::Expr(ExpressionStatement { expr, line }));
        }
        if !matches!(
            expr,
            Expr::Identifier(_) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            return Err(self.unexpected("end of statement (only names, members and indexes can be assigned)"));
        }
        self.advance();
        let value = self.parse_expr()?;
        Ok(Stmt::Assign(Assignment {
            target: expr,
            value,
            line,
        }))
    }
}
