//! Binder behavior: name resolution, conversions, control-flow checks
//! and the error kinds they produce.

mod common;

use common::{bind_error_kind, bind_source};
use ryec::binder::conversion::{classify, Conversion};
use ryec::bound::{BoundExpression, BoundStatement};
use ryec::diagnostics::ErrorKind;
use ryec::symbols::TypeSymbol;

fn all_types() -> Vec<TypeSymbol> {
    vec![
        TypeSymbol::Void,
        TypeSymbol::Bool,
        TypeSymbol::Byte,
        TypeSymbol::Int,
        TypeSymbol::Float,
        TypeSymbol::String,
        TypeSymbol::Any,
        TypeSymbol::Thread,
        TypeSymbol::Array(Box::new(TypeSymbol::Int)),
        TypeSymbol::Array(Box::new(TypeSymbol::String)),
    ]
}

#[test]
fn conversion_classification_is_total_and_matches_the_table() {
    for from in all_types() {
        for to in all_types() {
            let expected = if from == to {
                Conversion::Identity
            } else if from != TypeSymbol::Void && to == TypeSymbol::Any {
                Conversion::Implicit
            } else if from == TypeSymbol::Any && to != TypeSymbol::Void {
                Conversion::Explicit
            } else if matches!(from, TypeSymbol::Bool | TypeSymbol::Int | TypeSymbol::Float)
                && to == TypeSymbol::String
            {
                Conversion::Explicit
            } else if from == TypeSymbol::String
                && matches!(to, TypeSymbol::Bool | TypeSymbol::Int | TypeSymbol::Float)
            {
                Conversion::Explicit
            } else {
                Conversion::None
            };
            assert_eq!(classify(&from, &to), expected, "{} -> {}", from, to);
        }
    }
}

#[test]
fn loops_allocate_monotonic_label_pairs() {
    let program = bind_source(
        "while (true) { var x <- 1; } from i <- 1 to 3 { while (false) { break; } }",
    )
    .expect("bind");
    let body = &program.functions[0].body;

    match &body[0] {
        BoundStatement::While {
            break_label,
            continue_label,
            ..
        } => {
            assert_eq!(break_label, "break1");
            assert_eq!(continue_label, "continue1");
        }
        other => panic!("expected while, got {:?}", other),
    }
    match &body[1] {
        BoundStatement::FromTo {
            break_label, body, ..
        } => {
            assert_eq!(break_label, "break2");
            // The nested while gets the next counter value.
            match body.as_ref() {
                BoundStatement::Block(inner) => match &inner[0] {
                    BoundStatement::While { break_label, .. } => {
                        assert_eq!(break_label, "break3")
                    }
                    other => panic!("expected nested while, got {:?}", other),
                },
                other => panic!("expected block body, got {:?}", other),
            }
        }
        other => panic!("expected from-to, got {:?}", other),
    }
}

#[test]
fn break_inside_loop_binds_to_innermost_break_label() {
    let program = bind_source("while (true) { break; }").expect("bind");
    match &program.functions[0].body[0] {
        BoundStatement::While { body, .. } => match body.as_ref() {
            BoundStatement::Block(statements) => {
                assert!(matches!(&statements[0], BoundStatement::Goto(label) if label == "break1"))
            }
            other => panic!("expected block, got {:?}", other),
        },
        other => panic!("expected while, got {:?}", other),
    }
}

#[test]
fn break_outside_loop_fails() {
    assert_eq!(bind_error_kind("break;"), ErrorKind::OutsideBreak);
}

#[test]
fn continue_outside_loop_fails() {
    assert_eq!(bind_error_kind("continue;"), ErrorKind::OutsideContinue);
}

#[test]
fn duplicate_variable_in_one_scope_fails() {
    assert_eq!(
        bind_error_kind("var a <- 1; var a <- 2;"),
        ErrorKind::DuplicateVariableDeclaration
    );
}

#[test]
fn loop_scopes_allow_shadowing() {
    // The from-to counter shadows the outer `i`; the outer variable is
    // still intact afterwards.
    bind_source("var i int <- 0; from i <- 1 to 3 { Print(string(i)); } i <- 5;").expect("bind");
    // Sibling loop scopes can reuse a name.
    bind_source("while (true) { var t <- 1; break; } while (true) { var t <- 2; break; }")
        .expect("bind");
}

#[test]
fn shadowed_name_resolves_to_inner_symbol() {
    let program =
        bind_source("var x string <- \"s\"; while (true) { var x int <- 1; x <- x + 1; }")
            .expect("bind");
    // The loop body assignment must have bound to the inner int `x`.
    let body = &program.functions[0].body;
    match &body[1] {
        BoundStatement::While { body, .. } => match body.as_ref() {
            BoundStatement::Block(statements) => match &statements[1] {
                BoundStatement::Expression(BoundExpression::Assignment { variable, .. }) => {
                    assert_eq!(variable.ty, TypeSymbol::Int)
                }
                other => panic!("expected assignment, got {:?}", other),
            },
            other => panic!("expected block, got {:?}", other),
        },
        other => panic!("expected while, got {:?}", other),
    }
}

#[test]
fn int_initializer_cannot_fill_string_variable() {
    // int -> string exists but only with a cast, so the implicit site
    // fails; arrays have no conversion to string at all.
    assert_eq!(
        bind_error_kind("var x string <- 3;"),
        ErrorKind::ExplicitConversion
    );
    assert_eq!(
        bind_error_kind("var x string <- make int(1);"),
        ErrorKind::Conversion
    );
    bind_source("var x string <- string(3);").expect("explicit cast succeeds");
}

#[test]
fn any_round_trip_requires_a_cast() {
    bind_source("var a any <- 3;").expect("implicit into any");
    assert_eq!(
        bind_error_kind("var a any <- 3; var i int <- a;"),
        ErrorKind::ExplicitConversion
    );
    bind_source("var a any <- 3; var i int <- int(a);").expect("cast out of any");
}

#[test]
fn return_value_is_optional_for_non_void_functions() {
    bind_source("function f() int { return; }").expect("bare return passes binding");
}

#[test]
fn void_function_rejects_return_value() {
    assert_eq!(
        bind_error_kind("function f() { return 3; }"),
        ErrorKind::VoidReturn
    );
}

#[test]
fn top_level_return_is_outside_a_function() {
    assert_eq!(bind_error_kind("return;"), ErrorKind::OutsideReturn);
}

#[test]
fn duplicate_parameter_fails() {
    assert_eq!(
        bind_error_kind("function f(a int, a int) { }"),
        ErrorKind::DuplicateParameter
    );
}

#[test]
fn duplicate_function_fails() {
    assert_eq!(
        bind_error_kind("function f() { } function f() { }"),
        ErrorKind::DuplicateFunction
    );
}

#[test]
fn bare_expression_statement_is_rejected() {
    assert_eq!(
        bind_error_kind("1 + 2;"),
        ErrorKind::UnexpectedExpressionStatement
    );
    assert_eq!(bind_error_kind("var a <- 1; a;"), ErrorKind::UnexpectedExpressionStatement);
}

#[test]
fn assignments_and_calls_are_valid_statements() {
    bind_source("var a <- 1; a <- 2; a++; Print(\"x\");").expect("bind");
}

#[test]
fn from_to_bounds_must_be_int() {
    assert_eq!(
        bind_error_kind("from i <- 1.5 to 3 { }"),
        ErrorKind::UnexpectedNonIntegerValue
    );
    assert_eq!(
        bind_error_kind("from i <- 1 to \"x\" { }"),
        ErrorKind::UnexpectedNonIntegerValue
    );
}

#[test]
fn unknown_names_fail_with_their_kind() {
    assert_eq!(
        bind_error_kind("nope <- 3;"),
        ErrorKind::UndefinedVariableReference
    );
    assert_eq!(bind_error_kind("Nope();"), ErrorKind::UndefinedFunctionCall);
}

#[test]
fn call_arity_is_checked() {
    assert_eq!(
        bind_error_kind("Print(\"a\", \"b\");"),
        ErrorKind::BadNumberOfParameters
    );
}

#[test]
fn call_arguments_do_not_accept_explicit_conversions() {
    // int -> string exists but is explicit; arguments only convert
    // implicitly.
    assert_eq!(bind_error_kind("Print(3);"), ErrorKind::ExplicitConversion);
}

#[test]
fn binary_operator_converts_right_operand_to_left_type() {
    // "a" + 1 resolves by explicitly converting the int to string.
    let program = bind_source("var s <- \"a\" + 1;").expect("bind");
    match &program.functions[0].body[0] {
        BoundStatement::VariableDeclaration { variable, .. } => {
            assert_eq!(variable.ty, TypeSymbol::String)
        }
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn unconvertible_binary_operands_fail() {
    assert_eq!(
        bind_error_kind("var x <- true && 1;"),
        ErrorKind::BinaryOperatorType
    );
}

#[test]
fn unary_operator_type_is_checked() {
    assert_eq!(
        bind_error_kind("var x <- -true;"),
        ErrorKind::UnaryOperatorType
    );
}

#[test]
fn ternary_requires_bool_condition_and_matching_arms() {
    assert_eq!(
        bind_error_kind("var x <- 1 ? 2 : 3;"),
        ErrorKind::BinaryOperatorType
    );
    assert_eq!(
        bind_error_kind("var x <- true ? 2 : \"three\";"),
        ErrorKind::BinaryOperatorType
    );
    bind_source("var x <- true ? 2 : 3;").expect("bind");
}

#[test]
fn type_functions_resolve_by_receiver() {
    bind_source("var s <- \"abc\"; var n <- s->GetLength();").expect("string length");
    bind_source("var a <- make int(3); var n <- a->GetLength();").expect("array length");
    assert_eq!(
        bind_error_kind("var i <- 1; var n <- i->GetLength();"),
        ErrorKind::IncorrectTypeFunctionCall
    );
    assert_eq!(
        bind_error_kind("var s <- \"abc\"; s->Reverse();"),
        ErrorKind::TypeFunctionDoesNotExist
    );
}

#[test]
fn push_selects_element_type() {
    bind_source("var a <- make string(0); a->Push(\"x\");").expect("object push");
    bind_source("var a <- make int(0); a->Push(3);").expect("primitive push");
    assert_eq!(
        bind_error_kind("var a <- make int(0); a->Push(\"x\");"),
        ErrorKind::ExplicitConversion
    );
}

#[test]
fn thread_requires_a_nullary_function() {
    bind_source("function f() { } var t <- thread f; t->Start(); t->Join();").expect("bind");
    assert_eq!(
        bind_error_kind("function f(a int) { } var t <- thread f;"),
        ErrorKind::BadNumberOfParameters
    );
    assert_eq!(
        bind_error_kind("var t <- thread missing;"),
        ErrorKind::UndefinedFunctionCall
    );
}

#[test]
fn declaration_needs_type_or_initializer() {
    assert_eq!(
        bind_error_kind("var x;"),
        ErrorKind::IllegalVariableDeclaration
    );
}

#[test]
fn array_access_requires_array_base_and_int_index() {
    bind_source("var a <- make int(3); var x <- a[0];").expect("bind");
    assert_eq!(bind_error_kind("var i <- 1; var x <- i[0];"), ErrorKind::Conversion);
    assert_eq!(
        bind_error_kind("var a <- make int(3); var x <- a[\"zero\"];"),
        ErrorKind::ExplicitConversion
    );
}

#[test]
fn array_assignment_converts_the_stored_value() {
    // any-arrays accept any element implicitly, symmetric with plain
    // assignment.
    bind_source("var a <- make any(3); a[0] <- 7;").expect("bind");
    assert_eq!(
        bind_error_kind("var a <- make int(3); a[0] <- \"x\";"),
        ErrorKind::ExplicitConversion
    );
}

#[test]
fn persistence_marks_variable_loads_but_not_fresh_values() {
    let program = bind_source("var s string <- \"a\"; var t <- s; var u <- s + \"b\";")
        .expect("bind");
    let body = &program.functions[0].body;
    match &body[1] {
        BoundStatement::VariableDeclaration {
            initializer: Some(init),
            ..
        } => assert!(init.is_persistent(), "variable load is persistent"),
        other => panic!("expected declaration, got {:?}", other),
    }
    match &body[2] {
        BoundStatement::VariableDeclaration {
            initializer: Some(init),
            ..
        } => assert!(!init.is_persistent(), "concat result is transient"),
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn object_cast_preserves_persistence_and_boxing_does_not() {
    let program = bind_source("var s string <- \"a\"; var a any <- s; var b any <- 3;")
        .expect("bind");
    let body = &program.functions[0].body;
    match &body[1] {
        BoundStatement::VariableDeclaration {
            initializer: Some(init),
            ..
        } => assert!(init.is_persistent(), "string->any keeps identity"),
        other => panic!("expected declaration, got {:?}", other),
    }
    match &body[2] {
        BoundStatement::VariableDeclaration {
            initializer: Some(init),
            ..
        } => assert!(!init.is_persistent(), "boxing creates a fresh object"),
        other => panic!("expected declaration, got {:?}", other),
    }
}

#[test]
fn set_changes_the_storage_class_but_not_the_scope() {
    // `set` declares a global-storage symbol in the scope where it
    // appears; visibility follows lexical nesting exactly like `var`.
    let program = bind_source("set g int <- 1; g <- 2;").expect("bind");
    match &program.functions[0].body[0] {
        BoundStatement::VariableDeclaration { variable, .. } => {
            assert!(variable.is_global())
        }
        other => panic!("expected declaration, got {:?}", other),
    }

    // A top-level `set` is not visible inside a function body.
    assert_eq!(
        bind_error_kind("set g int <- 1; function f() int { return g; }"),
        ErrorKind::UndefinedVariableReference
    );

    // Inside a function, `set` is scoped to that function.
    bind_source("function f() int { set g int <- 1; return g; }").expect("bind");
    assert_eq!(
        bind_error_kind(
            "function f() { set g int <- 1; } function h() int { return g; }"
        ),
        ErrorKind::UndefinedVariableReference
    );
}

#[test]
fn void_valued_initializer_is_illegal() {
    assert_eq!(
        bind_error_kind("var x <- Clear();"),
        ErrorKind::IllegalVariableDeclaration
    );
}
