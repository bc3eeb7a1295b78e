//! Control-flow lowering.
//!
//! Flattens the binder's structured statements (if / while / for /
//! from-to, nested blocks) into the label-and-goto stream the emitter
//! consumes: label, goto, conditional goto, variable declaration,
//! expression statement, return, and end-of-scope GC statements.
//!
//! The break/continue labels allocated by the binder are preserved
//! verbatim; this pass draws its own `check{n}` / `body{n}` / `then{n}` /
//! `else{n}` / `end{n}` labels from a separate counter. Every fallthrough
//! into a label is made explicit with an unconditional goto so each
//! emitted block ends in a terminator.

use crate::ast::{BinaryOperator, LiteralValue};
use crate::binder::operators::bind_binary_operator;
use crate::bound::*;
use crate::symbols::{TypeSymbol, VariableSymbol};

/// Rewrites every function body of the program into flat form.
pub fn lower_program(program: BoundProgram) -> BoundProgram {
    let functions = program
        .functions
        .into_iter()
        .map(|function| {
            let mut lowerer = Lowerer { label_counter: 0 };
            let body = lowerer.lower_function(function.body);
            BoundFunction {
                symbol: function.symbol,
                body,
            }
        })
        .collect();
    BoundProgram {
        functions,
        main_fingerprint: program.main_fingerprint,
    }
}

struct Lowerer {
    label_counter: u32,
}

impl Lowerer {
    fn fresh_label(&mut self, prefix: &str) -> BoundLabel {
        self.label_counter += 1;
        format!("{}{}", prefix, self.label_counter)
    }

    fn lower_function(&mut self, body: Vec<BoundStatement>) -> Vec<BoundStatement> {
        let mut out = Vec::new();
        for statement in body {
            self.lower_statement(statement, &mut out);
        }
        // Guarantee a trailing return so the final block is terminated;
        // the emitter materializes a typed default for non-void returns.
        if !matches!(out.last(), Some(BoundStatement::Return(_))) {
            out.push(BoundStatement::Return(None));
        }
        out
    }

    fn lower_statement(&mut self, statement: BoundStatement, out: &mut Vec<BoundStatement>) {
        match statement {
            BoundStatement::Block(statements) => {
                for statement in statements {
                    self.lower_statement(statement, out);
                }
            }

            BoundStatement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let then_label = self.fresh_label("then");
                match else_branch {
                    None => {
                        let end_label = self.fresh_label("end");
                        out.push(BoundStatement::ConditionalGoto {
                            condition,
                            if_label: then_label.clone(),
                            else_label: end_label.clone(),
                        });
                        out.push(BoundStatement::Label(then_label));
                        self.lower_statement(*then_branch, out);
                        out.push(BoundStatement::Goto(end_label.clone()));
                        out.push(BoundStatement::Label(end_label));
                    }
                    Some(else_branch) => {
                        let else_label = self.fresh_label("else");
                        let end_label = self.fresh_label("end");
                        out.push(BoundStatement::ConditionalGoto {
                            condition,
                            if_label: then_label.clone(),
                            else_label: else_label.clone(),
                        });
                        out.push(BoundStatement::Label(then_label));
                        self.lower_statement(*then_branch, out);
                        out.push(BoundStatement::Goto(end_label.clone()));
                        out.push(BoundStatement::Label(else_label));
                        self.lower_statement(*else_branch, out);
                        out.push(BoundStatement::Goto(end_label.clone()));
                        out.push(BoundStatement::Label(end_label));
                    }
                }
            }

            BoundStatement::While {
                condition,
                body,
                break_label,
                continue_label,
            } => {
                let body_label = self.fresh_label("body");
                out.push(BoundStatement::Goto(continue_label.clone()));
                out.push(BoundStatement::Label(continue_label.clone()));
                out.push(BoundStatement::ConditionalGoto {
                    condition,
                    if_label: body_label.clone(),
                    else_label: break_label.clone(),
                });
                out.push(BoundStatement::Label(body_label));
                self.lower_loop_body(*body, out);
                out.push(BoundStatement::Goto(continue_label));
                out.push(BoundStatement::Label(break_label));
            }

            BoundStatement::For {
                initializer,
                condition,
                update,
                body,
                break_label,
                continue_label,
            } => {
                let check_label = self.fresh_label("check");
                let body_label = self.fresh_label("body");
                // The initializer lives in the for statement's own scope,
                // which ends at the break label.
                let scope_locals = direct_locals(&initializer);
                self.lower_statement(*initializer, out);
                out.push(BoundStatement::Goto(check_label.clone()));
                out.push(BoundStatement::Label(check_label.clone()));
                out.push(BoundStatement::ConditionalGoto {
                    condition,
                    if_label: body_label.clone(),
                    else_label: break_label.clone(),
                });
                out.push(BoundStatement::Label(body_label));
                self.lower_loop_body(*body, out);
                out.push(BoundStatement::Goto(continue_label.clone()));
                out.push(BoundStatement::Label(continue_label));
                self.lower_statement(*update, out);
                out.push(BoundStatement::Goto(check_label));
                out.push(BoundStatement::Label(break_label));
                if !scope_locals.is_empty() {
                    out.push(BoundStatement::GarbageCollect(scope_locals));
                }
            }

            BoundStatement::FromTo {
                variable,
                lower,
                upper,
                body,
                break_label,
                continue_label,
            } => {
                let check_label = self.fresh_label("check");
                let body_label = self.fresh_label("body");

                out.push(BoundStatement::VariableDeclaration {
                    variable: variable.clone(),
                    initializer: Some(lower),
                });
                out.push(BoundStatement::Goto(check_label.clone()));
                out.push(BoundStatement::Label(check_label.clone()));
                out.push(BoundStatement::ConditionalGoto {
                    condition: int_binary(
                        BinaryOperator::LessOrEquals,
                        BoundExpression::Variable {
                            variable: variable.clone(),
                        },
                        upper,
                    ),
                    if_label: body_label.clone(),
                    else_label: break_label.clone(),
                });
                out.push(BoundStatement::Label(body_label));
                self.lower_loop_body(*body, out);
                out.push(BoundStatement::Goto(continue_label.clone()));
                out.push(BoundStatement::Label(continue_label));
                out.push(BoundStatement::Expression(BoundExpression::Assignment {
                    variable: variable.clone(),
                    value: Box::new(int_binary(
                        BinaryOperator::Addition,
                        BoundExpression::Variable { variable },
                        BoundExpression::Literal {
                            value: LiteralValue::Int(1),
                        },
                    )),
                }));
                out.push(BoundStatement::Goto(check_label));
                out.push(BoundStatement::Label(break_label));
            }

            // Leaf statements pass through unchanged.
            other => out.push(other),
        }
    }

    /// Lowers a loop body and appends the per-iteration GC statement for
    /// the locals declared directly inside it.
    fn lower_loop_body(&mut self, body: BoundStatement, out: &mut Vec<BoundStatement>) {
        let locals = direct_locals(&body);
        self.lower_statement(body, out);
        if !locals.is_empty() {
            out.push(BoundStatement::GarbageCollect(locals));
        }
    }
}

/// The local (non-global) variables belonging to a loop body's scope.
///
/// Blocks and ifs do not open scopes, so a declaration nested inside
/// them still lives in the enclosing loop body and must be part of its
/// per-iteration cleanup. Nested loops push their own scope and emit
/// their own GC statements, so collection stops at them.
fn direct_locals(body: &BoundStatement) -> Vec<VariableSymbol> {
    let mut locals = Vec::new();
    collect_scope_locals(body, &mut locals);
    locals
}

fn collect_scope_locals(statement: &BoundStatement, out: &mut Vec<VariableSymbol>) {
    match statement {
        BoundStatement::VariableDeclaration { variable, .. } => {
            if !variable.is_global() {
                out.push(variable.clone());
            }
        }
        BoundStatement::Block(statements) => {
            for statement in statements {
                collect_scope_locals(statement, out);
            }
        }
        BoundStatement::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_scope_locals(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_scope_locals(else_branch, out);
            }
        }
        // While/For/FromTo bodies are their own GC boundary.
        _ => {}
    }
}

/// Builds a resolved int-by-int binary node for synthesized from-to
/// bookkeeping. The overload always exists for these operators.
fn int_binary(
    operator: BinaryOperator,
    left: BoundExpression,
    right: BoundExpression,
) -> BoundExpression {
    let op = match bind_binary_operator(operator, &TypeSymbol::Int, &TypeSymbol::Int) {
        Some(op) => op,
        None => unreachable!("int operator table is total for from-to lowering"),
    };
    BoundExpression::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}
