//! Shape of the flattened statement stream: label preservation, goto
//! structure, per-iteration GC statements and implicit returns.

mod common;

use common::lower_source;
use ryec::bound::{BoundBinaryOperatorKind, BoundExpression, BoundStatement};

fn labels_of(body: &[BoundStatement]) -> Vec<&str> {
    body.iter()
        .filter_map(|statement| match statement {
            BoundStatement::Label(label) => Some(label.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn lowered_body_is_flat() {
    let program = lower_source(
        "var i int <- 0; while (i < 3) { if (i == 1) { i <- 2; } else { i++; } } \
         from j <- 1 to 3 { Print(string(j)); }",
    )
    .expect("lower");
    for statement in &program.functions[0].body {
        assert!(
            !matches!(
                statement,
                BoundStatement::Block(_)
                    | BoundStatement::If { .. }
                    | BoundStatement::While { .. }
                    | BoundStatement::For { .. }
                    | BoundStatement::FromTo { .. }
            ),
            "structured statement survived lowering: {:?}",
            statement
        );
    }
}

#[test]
fn while_keeps_binder_labels_and_loops_through_continue() {
    let program = lower_source("while (true) { break; }").expect("lower");
    let body = &program.functions[0].body;

    // Entry jumps to the continue label where the condition is checked.
    assert!(matches!(&body[0], BoundStatement::Goto(label) if label == "continue1"));
    let labels = labels_of(body);
    assert!(labels.contains(&"continue1"));
    assert!(labels.contains(&"break1"));

    // The conditional goto targets the body and the break label.
    let cond = body.iter().find_map(|statement| match statement {
        BoundStatement::ConditionalGoto {
            if_label,
            else_label,
            ..
        } => Some((if_label.as_str(), else_label.as_str())),
        _ => None,
    });
    assert_eq!(cond, Some(("body1", "break1")));
}

#[test]
fn from_to_counts_with_synthesized_increment_and_bound_check() {
    let program = lower_source("from i <- 1 to 3 { Print(string(i)); }").expect("lower");
    let body = &program.functions[0].body;

    // Counter declaration from the lower bound comes first.
    assert!(matches!(
        &body[0],
        BoundStatement::VariableDeclaration { variable, .. } if variable.name == "i"
    ));

    let check = body.iter().find_map(|statement| match statement {
        BoundStatement::ConditionalGoto { condition, .. } => Some(condition),
        _ => None,
    });
    match check.expect("conditional goto") {
        BoundExpression::Binary { op, .. } => {
            assert_eq!(op.kind, BoundBinaryOperatorKind::LessOrEquals)
        }
        other => panic!("expected binary check, got {:?}", other),
    }

    // The continue label precedes the `i <- i + 1` bookkeeping.
    let continue_at = body
        .iter()
        .position(|s| matches!(s, BoundStatement::Label(l) if l == "continue1"))
        .expect("continue label");
    match &body[continue_at + 1] {
        BoundStatement::Expression(BoundExpression::Assignment { variable, value }) => {
            assert_eq!(variable.name, "i");
            match value.as_ref() {
                BoundExpression::Binary { op, .. } => {
                    assert_eq!(op.kind, BoundBinaryOperatorKind::Addition)
                }
                other => panic!("expected increment, got {:?}", other),
            }
        }
        other => panic!("expected counter increment, got {:?}", other),
    }
}

#[test]
fn if_else_lowering_covers_both_arms() {
    let program =
        lower_source("var x <- 1; if (x == 1) { x <- 2; } else { x <- 3; }").expect("lower");
    let labels = labels_of(&program.functions[0].body);
    assert!(labels.iter().any(|l| l.starts_with("then")));
    assert!(labels.iter().any(|l| l.starts_with("else")));
    assert!(labels.iter().any(|l| l.starts_with("end")));
}

#[test]
fn loop_body_locals_get_a_gc_statement() {
    let program =
        lower_source("while (true) { var s string <- \"tmp\"; break; }").expect("lower");
    let gc = program.functions[0]
        .body
        .iter()
        .find_map(|statement| match statement {
            BoundStatement::GarbageCollect(variables) => Some(variables),
            _ => None,
        });
    let variables = gc.expect("loop body should end in a GC statement");
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].name, "s");
}

#[test]
fn conditionally_declared_locals_are_in_the_loop_gc() {
    // Blocks and ifs do not open scopes, so a declaration inside an if
    // nested in the loop body belongs to the loop's scope and must be
    // released every iteration.
    let program = lower_source(
        "var c <- true; while (c) { if (c) { var s string <- \"x\"; } c <- false; }",
    )
    .expect("lower");
    let gc = program.functions[0]
        .body
        .iter()
        .find_map(|statement| match statement {
            BoundStatement::GarbageCollect(variables) => Some(variables),
            _ => None,
        });
    let variables = gc.expect("loop body should end in a GC statement");
    assert!(variables.iter().any(|v| v.name == "s"));
}

#[test]
fn nested_loops_keep_their_own_gc_boundary() {
    let program = lower_source(
        "while (true) { var a string <- \"a\"; \
         while (true) { var b string <- \"b\"; break; } break; }",
    )
    .expect("lower");
    let gc_lists: Vec<Vec<&str>> = program.functions[0]
        .body
        .iter()
        .filter_map(|statement| match statement {
            BoundStatement::GarbageCollect(variables) => {
                Some(variables.iter().map(|v| v.name.as_str()).collect())
            }
            _ => None,
        })
        .collect();
    // The inner loop is lowered first; each list owns exactly its own
    // scope's local.
    assert_eq!(gc_lists, vec![vec!["b"], vec!["a"]]);
}

#[test]
fn for_initializer_is_collected_when_the_for_scope_ends() {
    let program =
        lower_source("for (var s string <- \"x\"; true; s <- s + \"y\") { break; }")
            .expect("lower");
    let body = &program.functions[0].body;
    let break_at = body
        .iter()
        .position(|s| matches!(s, BoundStatement::Label(l) if l == "break1"))
        .expect("break label");
    match &body[break_at + 1] {
        BoundStatement::GarbageCollect(variables) => {
            assert_eq!(variables.len(), 1);
            assert_eq!(variables[0].name, "s");
        }
        other => panic!("expected GC after the break label, got {:?}", other),
    }
}

#[test]
fn loop_without_locals_has_no_gc_statement() {
    let program = lower_source("var i <- 0; while (i < 3) { i++; }").expect("lower");
    assert!(
        !program.functions[0]
            .body
            .iter()
            .any(|s| matches!(s, BoundStatement::GarbageCollect(_)))
    );
}

#[test]
fn missing_trailing_return_is_added() {
    let program = lower_source("var x <- 1;").expect("lower");
    assert!(matches!(
        program.functions[0].body.last(),
        Some(BoundStatement::Return(None))
    ));
}

#[test]
fn function_bodies_are_lowered_independently() {
    let program = lower_source(
        "function f() { while (true) { break; } } while (true) { break; }",
    )
    .expect("lower");
    // Both the entry body and `f` restart lowering counters, and each
    // carries its own binder labels.
    for function in &program.functions {
        let labels = labels_of(&function.body);
        assert!(labels.contains(&"break1"), "missing break1 in {}", function.symbol.name);
    }
}
