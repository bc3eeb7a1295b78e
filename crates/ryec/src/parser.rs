//! Recursive-descent parser for Rye.
//!
//! Consumes the token stream from `crate::lexer` and produces the untyped
//! parse tree in `crate::ast`. Like every other phase the parser is
//! fail-fast: the first unexpected token aborts with a diagnostic.

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticResult, ErrorKind};
use crate::lexer::{Lexer, Token, TokenKind};

/// Parses a whole source file.
pub fn parse_program(source: &str) -> DiagnosticResult<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser { tokens, pos: 0 }.parse_program_members()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, so clamping is safe.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_ahead(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> DiagnosticResult<Token> {
        if *self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            let tok = self.peek();
            Err(Diagnostic::error_with_span(
                "PARSER",
                ErrorKind::UnexpectedToken,
                format!("expected {} but found \"{}\"", what, tok.text),
                tok.span.clone(),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> DiagnosticResult<Ident> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let tok = self.advance();
                Ok(Ident {
                    name,
                    span: tok.span,
                })
            }
            _ => {
                let tok = self.peek();
                Err(Diagnostic::error_with_span(
                    "PARSER",
                    ErrorKind::UnexpectedToken,
                    format!("expected {} but found \"{}\"", what, tok.text),
                    tok.span.clone(),
                ))
            }
        }
    }

    fn parse_program_members(mut self) -> DiagnosticResult<Program> {
        let mut members = Vec::new();
        while *self.peek_kind() != TokenKind::Eof {
            if *self.peek_kind() == TokenKind::Function {
                members.push(Member::Function(self.parse_function_declaration()?));
            } else {
                members.push(Member::Statement(self.parse_statement()?));
            }
        }
        Ok(Program { members })
    }

    fn parse_function_declaration(&mut self) -> DiagnosticResult<FunctionDecl> {
        let start = self.expect(TokenKind::Function, "\"function\"")?.span.start;
        let name = self.expect_ident("a function name")?;
        self.expect(TokenKind::OpenParen, "\"(\"")?;

        let mut params = Vec::new();
        if *self.peek_kind() != TokenKind::CloseParen {
            loop {
                let pname = self.expect_ident("a parameter name")?;
                let clause = self.parse_type_clause()?;
                params.push(Param {
                    name: pname,
                    type_clause: clause,
                });
                if *self.peek_kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::CloseParen, "\")\"")?;

        // An identifier before the body is the return type clause.
        let return_clause = if matches!(self.peek_kind(), TokenKind::Ident(_)) {
            Some(self.parse_type_clause()?)
        } else {
            None
        };

        let body = self.parse_block_statement()?;
        let span = start..body.span().end;
        Ok(FunctionDecl {
            name,
            params,
            return_clause,
            body,
            span,
        })
    }

    fn parse_type_clause(&mut self) -> DiagnosticResult<TypeClause> {
        let name = self.expect_ident("a type name")?;
        let mut span = name.span.clone();
        let mut sub_clauses = Vec::new();
        // Only complex types take subclauses: `array(int)`.
        if name.name == "array" && *self.peek_kind() == TokenKind::OpenParen {
            self.advance();
            loop {
                sub_clauses.push(self.parse_type_clause()?);
                if *self.peek_kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            let close = self.expect(TokenKind::CloseParen, "\")\"")?;
            span = span.start..close.span.end;
        }
        Ok(TypeClause {
            name,
            sub_clauses,
            span,
        })
    }

    fn parse_block_statement(&mut self) -> DiagnosticResult<Stmt> {
        let open = self.expect(TokenKind::OpenBrace, "\"{\"")?;
        let mut statements = Vec::new();
        while *self.peek_kind() != TokenKind::CloseBrace && *self.peek_kind() != TokenKind::Eof {
            statements.push(self.parse_statement()?);
        }
        let close = self.expect(TokenKind::CloseBrace, "\"}\"")?;
        Ok(Stmt::Block {
            statements,
            span: open.span.start..close.span.end,
        })
    }

    fn parse_statement(&mut self) -> DiagnosticResult<Stmt> {
        match self.peek_kind() {
            TokenKind::OpenBrace => self.parse_block_statement(),
            TokenKind::Var | TokenKind::Set => {
                let decl = self.parse_variable_declaration()?;
                self.expect(TokenKind::Semicolon, "\";\"")?;
                Ok(decl)
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Return => {
                let kw = self.advance();
                let expression = if *self.peek_kind() != TokenKind::Semicolon {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                let semi = self.expect(TokenKind::Semicolon, "\";\"")?;
                Ok(Stmt::Return {
                    expression,
                    span: kw.span.start..semi.span.end,
                })
            }
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::From => self.parse_from_to_statement(),
            TokenKind::Break => {
                let kw = self.advance();
                self.expect(TokenKind::Semicolon, "\";\"")?;
                Ok(Stmt::Break { span: kw.span })
            }
            TokenKind::Continue => {
                let kw = self.advance();
                self.expect(TokenKind::Semicolon, "\";\"")?;
                Ok(Stmt::Continue { span: kw.span })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semicolon, "\";\"")?;
                Ok(Stmt::Expression(expr))
            }
        }
    }

    /// `('var'|'set') name typeClause? ('<-' expr)?` without the semicolon,
    /// shared between statements and for-initializers.
    fn parse_variable_declaration(&mut self) -> DiagnosticResult<Stmt> {
        let keyword = self.advance();
        let global = keyword.kind == TokenKind::Set;
        let name = self.expect_ident("a variable name")?;

        let type_clause = if matches!(self.peek_kind(), TokenKind::Ident(_)) {
            Some(self.parse_type_clause()?)
        } else {
            None
        };

        let initializer = if *self.peek_kind() == TokenKind::Assign {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        let end = initializer
            .as_ref()
            .map(|e| e.span().end)
            .or_else(|| type_clause.as_ref().map(|c| c.span.end))
            .unwrap_or(name.span.end);
        Ok(Stmt::VariableDeclaration {
            global,
            name,
            type_clause,
            initializer,
            span: keyword.span.start..end,
        })
    }

    fn parse_if_statement(&mut self) -> DiagnosticResult<Stmt> {
        let kw = self.advance();
        self.expect(TokenKind::OpenParen, "\"(\"")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen, "\")\"")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if *self.peek_kind() == TokenKind::Else {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|s| s.span().end)
            .unwrap_or(then_branch.span().end);
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: kw.span.start..end,
        })
    }

    fn parse_for_statement(&mut self) -> DiagnosticResult<Stmt> {
        let kw = self.advance();
        self.expect(TokenKind::OpenParen, "\"(\"")?;
        let initializer = Box::new(self.parse_variable_declaration()?);
        self.expect(TokenKind::Semicolon, "\";\"")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "\";\"")?;
        let update = Box::new(Stmt::Expression(self.parse_expression()?));
        self.expect(TokenKind::CloseParen, "\")\"")?;
        let body = Box::new(self.parse_statement()?);
        let span = kw.span.start..body.span().end;
        Ok(Stmt::For {
            initializer,
            condition,
            update,
            body,
            span,
        })
    }

    fn parse_while_statement(&mut self) -> DiagnosticResult<Stmt> {
        let kw = self.advance();
        self.expect(TokenKind::OpenParen, "\"(\"")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::CloseParen, "\")\"")?;
        let body = Box::new(self.parse_statement()?);
        let span = kw.span.start..body.span().end;
        Ok(Stmt::While {
            condition,
            body,
            span,
        })
    }

    fn parse_from_to_statement(&mut self) -> DiagnosticResult<Stmt> {
        let kw = self.advance();
        let counter = self.expect_ident("a counter name")?;
        self.expect(TokenKind::Assign, "\"<-\"")?;
        let lower = self.parse_expression()?;
        self.expect(TokenKind::To, "\"to\"")?;
        let upper = self.parse_expression()?;
        let body = Box::new(self.parse_statement()?);
        let span = kw.span.start..body.span().end;
        Ok(Stmt::FromTo {
            counter,
            lower,
            upper,
            body,
            span,
        })
    }

    // --- Expressions -----------------------------------------------------

    fn parse_expression(&mut self) -> DiagnosticResult<Expr> {
        self.parse_assignment_expression()
    }

    fn parse_assignment_expression(&mut self) -> DiagnosticResult<Expr> {
        // `name <- expr` is only an assignment when the name is not part
        // of a larger postfix expression; look ahead for the arrow.
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            if self.peek_ahead(1).kind == TokenKind::Assign {
                let ident_tok = self.advance();
                self.advance(); // <-
                let value = self.parse_assignment_expression()?;
                let span = ident_tok.span.start..value.span().end;
                return Ok(Expr::Assignment {
                    name: Ident {
                        name,
                        span: ident_tok.span,
                    },
                    value: Box::new(value),
                    span,
                });
            }

            // Compound editors: `x += e`, `x -= e`, `x *= e`, `x /= e`.
            let editor_op = match self.peek_ahead(1).kind {
                TokenKind::PlusAssign => Some(BinaryOperator::Addition),
                TokenKind::MinusAssign => Some(BinaryOperator::Subtraction),
                TokenKind::StarAssign => Some(BinaryOperator::Multiplication),
                TokenKind::SlashAssign => Some(BinaryOperator::Division),
                _ => None,
            };
            if let Some(operator) = editor_op {
                let ident_tok = self.advance();
                self.advance(); // the compound operator
                let value = self.parse_assignment_expression()?;
                let span = ident_tok.span.start..value.span().end;
                return Ok(Expr::VariableEditor {
                    name: Ident {
                        name,
                        span: ident_tok.span,
                    },
                    operator,
                    value: Some(Box::new(value)),
                    span,
                });
            }
        }
        self.parse_ternary_expression()
    }

    fn parse_ternary_expression(&mut self) -> DiagnosticResult<Expr> {
        let condition = self.parse_binary_expression(0)?;
        if *self.peek_kind() == TokenKind::Question {
            self.advance();
            let then_branch = self.parse_expression()?;
            self.expect(TokenKind::Colon, "\":\"")?;
            let else_branch = self.parse_expression()?;
            let span = condition.span().start..else_branch.span().end;
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
                span,
            });
        }
        Ok(condition)
    }

    fn binary_operator(kind: &TokenKind) -> Option<(BinaryOperator, u8)> {
        // Higher binds tighter.
        match kind {
            TokenKind::PipePipe => Some((BinaryOperator::LogicalOr, 1)),
            TokenKind::AmpAmp => Some((BinaryOperator::LogicalAnd, 2)),
            TokenKind::Pipe => Some((BinaryOperator::BitwiseOr, 3)),
            TokenKind::Caret => Some((BinaryOperator::BitwiseXor, 4)),
            TokenKind::Amp => Some((BinaryOperator::BitwiseAnd, 5)),
            TokenKind::EqEq => Some((BinaryOperator::Equals, 6)),
            TokenKind::NotEq => Some((BinaryOperator::NotEquals, 6)),
            TokenKind::Lt => Some((BinaryOperator::Less, 7)),
            TokenKind::LtEq => Some((BinaryOperator::LessOrEquals, 7)),
            TokenKind::Gt => Some((BinaryOperator::Greater, 7)),
            TokenKind::GtEq => Some((BinaryOperator::GreaterOrEquals, 7)),
            TokenKind::Plus => Some((BinaryOperator::Addition, 8)),
            TokenKind::Minus => Some((BinaryOperator::Subtraction, 8)),
            TokenKind::Star => Some((BinaryOperator::Multiplication, 9)),
            TokenKind::Slash => Some((BinaryOperator::Division, 9)),
            TokenKind::Percent => Some((BinaryOperator::Modulus, 9)),
            _ => None,
        }
    }

    fn parse_binary_expression(&mut self, min_precedence: u8) -> DiagnosticResult<Expr> {
        let mut left = self.parse_unary_expression()?;
        while let Some((operator, precedence)) = Self::binary_operator(self.peek_kind()) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary_expression(precedence + 1)?;
            let span = left.span().start..right.span().end;
            left = Expr::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> DiagnosticResult<Expr> {
        let operator = match self.peek_kind() {
            TokenKind::Plus => Some(UnaryOperator::Identity),
            TokenKind::Minus => Some(UnaryOperator::Negation),
            TokenKind::Bang => Some(UnaryOperator::LogicalNegation),
            _ => None,
        };
        if let Some(operator) = operator {
            let tok = self.advance();
            let operand = self.parse_unary_expression()?;
            let span = tok.span.start..operand.span().end;
            return Ok(Expr::Unary {
                operator,
                operator_span: tok.span,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> DiagnosticResult<Expr> {
        let mut expr = self.parse_primary_expression()?;
        loop {
            match self.peek_kind() {
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let close = self.expect(TokenKind::CloseBracket, "\"]\"")?;
                    // `base[i] <- v` is an array assignment, not an index
                    // followed by a dangling arrow.
                    if *self.peek_kind() == TokenKind::Assign {
                        self.advance();
                        let value = self.parse_expression()?;
                        let span = expr.span().start..value.span().end;
                        expr = Expr::ArrayAssignment {
                            base: Box::new(expr),
                            index: Box::new(index),
                            value: Box::new(value),
                            span,
                        };
                    } else {
                        let span = expr.span().start..close.span.end;
                        expr = Expr::ArrayAccess {
                            base: Box::new(expr),
                            index: Box::new(index),
                            span,
                        };
                    }
                }
                TokenKind::Arrow => {
                    self.advance();
                    let method = self.expect_ident("a method name")?;
                    self.expect(TokenKind::OpenParen, "\"(\"")?;
                    let (arguments, close) = self.parse_argument_list()?;
                    let span = expr.span().start..close.span.end;
                    expr = Expr::TypeCall {
                        base: Box::new(expr),
                        method,
                        arguments,
                        span,
                    };
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    if let Expr::Name(name) = expr {
                        let tok = self.advance();
                        let operator = if tok.kind == TokenKind::PlusPlus {
                            BinaryOperator::Addition
                        } else {
                            BinaryOperator::Subtraction
                        };
                        let span = name.span.start..tok.span.end;
                        expr = Expr::VariableEditor {
                            name,
                            operator,
                            value: None,
                            span,
                        };
                    } else {
                        let tok = self.peek();
                        return Err(Diagnostic::error_with_span(
                            "PARSER",
                            ErrorKind::UnexpectedToken,
                            format!("\"{}\" requires a variable operand", tok.text),
                            tok.span.clone(),
                        ));
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_argument_list(&mut self) -> DiagnosticResult<(Vec<Expr>, Token)> {
        let mut arguments = Vec::new();
        if *self.peek_kind() != TokenKind::CloseParen {
            loop {
                arguments.push(self.parse_expression()?);
                if *self.peek_kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let close = self.expect(TokenKind::CloseParen, "\")\"")?;
        Ok((arguments, close))
    }

    fn parse_primary_expression(&mut self) -> DiagnosticResult<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Literal(value) => {
                let tok = self.advance();
                Ok(Expr::Literal {
                    value,
                    span: tok.span,
                })
            }
            TokenKind::OpenParen => {
                let open = self.advance();
                let inner = self.parse_expression()?;
                let close = self.expect(TokenKind::CloseParen, "\")\"")?;
                Ok(Expr::Parenthesized {
                    inner: Box::new(inner),
                    span: open.span.start..close.span.end,
                })
            }
            TokenKind::Thread => {
                let kw = self.advance();
                let function = self.expect_ident("a function name")?;
                let span = kw.span.start..function.span.end;
                Ok(Expr::Thread { function, span })
            }
            TokenKind::Make => {
                let kw = self.advance();
                let element_clause = self.parse_type_clause()?;
                self.expect(TokenKind::OpenParen, "\"(\"")?;
                let length = self.parse_expression()?;
                let close = self.expect(TokenKind::CloseParen, "\")\"")?;
                Ok(Expr::MakeArray {
                    element_clause,
                    length: Box::new(length),
                    span: kw.span.start..close.span.end,
                })
            }
            TokenKind::Ident(name) => {
                // `array(int)(x)` is a cast carrying a full type clause;
                // `f(x)` is a call (which the binder may still resolve to
                // a primitive cast); a bare name is a variable reference.
                if name == "array" && self.peek_ahead(1).kind == TokenKind::OpenParen {
                    let clause = self.parse_type_clause()?;
                    self.expect(TokenKind::OpenParen, "\"(\"")?;
                    let (arguments, close) = self.parse_argument_list()?;
                    let span = clause.span.start..close.span.end;
                    return Ok(Expr::Call {
                        callee: clause.name.clone(),
                        casting_clause: Some(clause),
                        arguments,
                        span,
                    });
                }
                let ident_tok = self.advance();
                let ident = Ident {
                    name,
                    span: ident_tok.span,
                };
                if *self.peek_kind() == TokenKind::OpenParen {
                    self.advance();
                    let (arguments, close) = self.parse_argument_list()?;
                    let span = ident.span.start..close.span.end;
                    Ok(Expr::Call {
                        callee: ident,
                        casting_clause: None,
                        arguments,
                        span,
                    })
                } else {
                    Ok(Expr::Name(ident))
                }
            }
            _ => {
                let tok = self.peek();
                Err(Diagnostic::error_with_span(
                    "PARSER",
                    ErrorKind::UnexpectedToken,
                    format!("expected an expression but found \"{}\"", tok.text),
                    tok.span.clone(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_declaration_and_call() {
        let program = parse_program("set x int <- 3; Print(string(x));").expect("parse failed");
        assert_eq!(program.members.len(), 2);
        match &program.members[0] {
            Member::Statement(Stmt::VariableDeclaration { global, name, .. }) => {
                assert!(*global);
                assert_eq!(name.name, "x");
            }
            other => panic!("unexpected member: {:?}", other),
        }
    }

    #[test]
    fn parses_function_with_return_clause() {
        let program =
            parse_program("function add(a int, b int) int { return a + b; }").expect("parse");
        match &program.members[0] {
            Member::Function(decl) => {
                assert_eq!(decl.name.name, "add");
                assert_eq!(decl.params.len(), 2);
                assert!(decl.return_clause.is_some());
            }
            other => panic!("unexpected member: {:?}", other),
        }
    }

    #[test]
    fn parses_from_to() {
        let program = parse_program("from i <- 1 to 3 { Print(string(i)); }").expect("parse");
        assert!(matches!(
            program.members[0],
            Member::Statement(Stmt::FromTo { .. })
        ));
    }

    #[test]
    fn parses_array_cast_clause() {
        let program = parse_program("var a <- array(int)(b);").expect("parse");
        match &program.members[0] {
            Member::Statement(Stmt::VariableDeclaration {
                initializer: Some(Expr::Call { casting_clause, .. }),
                ..
            }) => {
                let clause = casting_clause.as_ref().expect("casting clause");
                assert_eq!(clause.name.name, "array");
                assert_eq!(clause.sub_clauses.len(), 1);
            }
            other => panic!("unexpected member: {:?}", other),
        }
    }

    #[test]
    fn parses_type_call_chain() {
        let program = parse_program("var n <- s->GetLength();").expect("parse");
        match &program.members[0] {
            Member::Statement(Stmt::VariableDeclaration {
                initializer: Some(Expr::TypeCall { method, .. }),
                ..
            }) => assert_eq!(method.name, "GetLength"),
            other => panic!("unexpected member: {:?}", other),
        }
    }

    #[test]
    fn missing_semicolon_is_fatal() {
        let err = parse_program("var x <- 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);
    }

    #[test]
    fn parses_variable_editor_forms() {
        let program = parse_program("i++; i += 2;").expect("parse");
        assert_eq!(program.members.len(), 2);
        match &program.members[1] {
            Member::Statement(Stmt::Expression(Expr::VariableEditor {
                operator, value, ..
            })) => {
                assert_eq!(*operator, BinaryOperator::Addition);
                assert!(value.is_some());
            }
            other => panic!("unexpected member: {:?}", other),
        }
    }
}
