//! The binder: Rye's semantic analyzer.
//!
//! Transforms the untyped parse tree into the bound tree: names resolve
//! through the lexical scope stack, every expression gets a type, unary
//! and binary operators resolve against the fixed overload tables, and
//! implicit coercions become explicit conversion nodes. Loops allocate
//! their break/continue labels here so the later control-flow lowering
//! can reuse them verbatim.
//!
//! Binding is fail-fast; every method returns `DiagnosticResult` and the
//! first violation aborts the pipeline.

pub mod conversion;
pub mod operators;
pub mod scope;

use crate::ast::{self, Expr, LiteralValue, Member, Program, Stmt};
use crate::bound::*;
use crate::builtins;
use crate::diagnostics::{Diagnostic, DiagnosticResult, ErrorKind};
use crate::symbols::*;
use conversion::{classify, Conversion};
use scope::ScopeStack;

const TAG: &str = "BINDER";

pub struct Binder<'a> {
    scopes: &'a mut ScopeStack,
    /// The function whose body is being bound; `None` for the top-level
    /// program body, which makes `return` a binding error there.
    function_symbol: Option<FunctionSymbol>,
    label_counter: u32,
    break_labels: Vec<BoundLabel>,
    continue_labels: Vec<BoundLabel>,
}

/// Binds a whole parse tree into a `BoundProgram`.
///
/// Function signatures are declared first so bodies may call forward;
/// the top-level statements form the program entry function and are
/// bound before the declared function bodies.
pub fn bind_program(program: &Program) -> DiagnosticResult<BoundProgram> {
    let mut scopes = ScopeStack::new();
    for function in builtins::builtin_functions() {
        scopes.try_declare(Symbol::Function(function));
    }

    // Pass 1: declare every function symbol.
    let mut declared: Vec<FunctionSymbol> = Vec::new();
    for member in &program.members {
        if let Member::Function(decl) = member {
            let symbol = bind_function_declaration(&mut scopes, decl)?;
            declared.push(symbol);
        }
    }

    let main_symbol = FunctionSymbol {
        name: "main".to_string(),
        parameters: vec![],
        return_type: TypeSymbol::Void,
        builtin: false,
        declaration: None,
    };
    if !scopes.try_declare(Symbol::Function(main_symbol.clone())) {
        return Err(Diagnostic::error(
            TAG,
            ErrorKind::DuplicateFunction,
            "a function with the name \"main\" already exists! \"main\" is reserved for the program body!",
        ));
    }

    // Pass 2: bind the program body, then every declared function body.
    let top_level: Vec<&Stmt> = program
        .members
        .iter()
        .filter_map(|m| match m {
            Member::Statement(stmt) => Some(stmt),
            Member::Function(_) => None,
        })
        .collect();

    let mut functions = Vec::new();
    let main_body = bind_function_body(&mut scopes, None, &top_level)?;
    functions.push(BoundFunction {
        symbol: main_symbol.clone(),
        body: main_body,
    });

    for symbol in declared {
        let decl = match &symbol.declaration {
            Some(decl) => decl.clone(),
            None => continue,
        };
        let body_statements: Vec<&Stmt> = match &decl.body {
            Stmt::Block { statements, .. } => statements.iter().collect(),
            other => vec![other],
        };
        let body = bind_function_body(&mut scopes, Some(symbol.clone()), &body_statements)?;
        functions.push(BoundFunction { symbol, body });
    }

    Ok(BoundProgram {
        functions,
        main_fingerprint: main_symbol.fingerprint(),
    })
}

/// Resolves a function declaration's signature and declares its symbol
/// into the active (root) scope. Body binding is deferred.
fn bind_function_declaration(
    scopes: &mut ScopeStack,
    decl: &ast::FunctionDecl,
) -> DiagnosticResult<FunctionSymbol> {
    let mut parameters: Vec<VariableSymbol> = Vec::new();
    for (ordinal, param) in decl.params.iter().enumerate() {
        let ty = resolve_type_clause(&param.type_clause)?;
        if parameters.iter().any(|p| p.name == param.name.name) {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::DuplicateParameter,
                format!(
                    "a parameter with the name \"{}\" already exists for function \"{}\"!",
                    param.name.name, decl.name.name
                ),
                param.name.span.clone(),
            ));
        }
        parameters.push(VariableSymbol::parameter(&param.name.name, ordinal, ty));
    }

    let return_type = match &decl.return_clause {
        Some(clause) => resolve_type_clause(clause)?,
        None => TypeSymbol::Void,
    };

    let symbol = FunctionSymbol {
        name: decl.name.name.clone(),
        parameters,
        return_type,
        builtin: false,
        declaration: Some(decl.clone()),
    };
    if !scopes.try_declare(Symbol::Function(symbol.clone())) {
        return Err(Diagnostic::error_with_span(
            TAG,
            ErrorKind::DuplicateFunction,
            format!(
                "a function with the name \"{}\" already exists! \"{}\" could not be defined!",
                symbol.name, symbol.name
            ),
            decl.name.span.clone(),
        ));
    }
    Ok(symbol)
}

/// Binds one function body with a fresh binder: a member scope child of
/// the root, parameters pre-declared, empty label stacks.
fn bind_function_body(
    scopes: &mut ScopeStack,
    function_symbol: Option<FunctionSymbol>,
    statements: &[&Stmt],
) -> DiagnosticResult<Vec<BoundStatement>> {
    scopes.push();
    if let Some(symbol) = &function_symbol {
        for param in &symbol.parameters {
            scopes.try_declare(Symbol::Variable(param.clone()));
        }
    }

    let mut binder = Binder {
        scopes,
        function_symbol,
        label_counter: 0,
        break_labels: Vec::new(),
        continue_labels: Vec::new(),
    };
    let mut bound = Vec::new();
    let mut result = Ok(());
    for stmt in statements {
        match binder.bind_statement(stmt) {
            Ok(b) => bound.push(b),
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }

    debug_assert!(binder.break_labels.is_empty() && binder.continue_labels.is_empty());
    binder.scopes.pop();
    result.map(|_| bound)
}

/// Resolves a written type clause to a type symbol.
fn resolve_type_clause(clause: &ast::TypeClause) -> DiagnosticResult<TypeSymbol> {
    if clause.name.name == "array" {
        if clause.sub_clauses.len() != 1 {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::Conversion,
                "datatype \"array\" takes in exactly one subtype!",
                clause.span.clone(),
            ));
        }
        let element = resolve_type_clause(&clause.sub_clauses[0])?;
        return Ok(TypeSymbol::Array(Box::new(element)));
    }
    match builtins::lookup_primitive_type(&clause.name.name) {
        Some(ty) => Ok(ty),
        None => Err(Diagnostic::error_with_span(
            TAG,
            ErrorKind::Conversion,
            format!(
                "couldn't find datatype \"{}\"! are you sure it exists?",
                clause.name.name
            ),
            clause.name.span.clone(),
        )),
    }
}

impl Binder<'_> {
    // --- labels ---------------------------------------------------------

    fn push_labels(&mut self, break_label: BoundLabel, continue_label: BoundLabel) {
        self.break_labels.push(break_label);
        self.continue_labels.push(continue_label);
    }

    fn pop_labels(&mut self) {
        self.break_labels.pop();
        self.continue_labels.pop();
    }

    pub fn label_counter(&self) -> u32 {
        self.label_counter
    }

    // --- statements -----------------------------------------------------

    pub fn bind_statement(&mut self, stmt: &Stmt) -> DiagnosticResult<BoundStatement> {
        let result = self.bind_statement_internal(stmt)?;

        // Only calls and assignments may be used as statements.
        if let BoundStatement::Expression(expr) = &result {
            let allowed = matches!(
                expr,
                BoundExpression::Call { .. }
                    | BoundExpression::TypeCall { .. }
                    | BoundExpression::Assignment { .. }
                    | BoundExpression::ArrayAssignment { .. }
            );
            if !allowed {
                return Err(Diagnostic::error_with_span(
                    TAG,
                    ErrorKind::UnexpectedExpressionStatement,
                    "only call and assignment expressions can be used as statements!",
                    stmt.span(),
                ));
            }
        }
        Ok(result)
    }

    fn bind_statement_internal(&mut self, stmt: &Stmt) -> DiagnosticResult<BoundStatement> {
        match stmt {
            Stmt::Block { statements, .. } => {
                let mut bound = Vec::new();
                for statement in statements {
                    bound.push(self.bind_statement(statement)?);
                }
                Ok(BoundStatement::Block(bound))
            }
            Stmt::VariableDeclaration { .. } => self.bind_variable_declaration(stmt),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let bound_condition = self.bind_expression(condition)?;
                let converted = self.bind_conversion(
                    bound_condition,
                    &TypeSymbol::Bool,
                    false,
                    condition.span(),
                )?;
                let then_branch = Box::new(self.bind_statement(then_branch)?);
                let else_branch = match else_branch {
                    Some(stmt) => Some(Box::new(self.bind_statement(stmt)?)),
                    None => None,
                };
                Ok(BoundStatement::If {
                    condition: converted,
                    then_branch,
                    else_branch,
                })
            }
            Stmt::Return { expression, span } => self.bind_return_statement(expression, span),
            Stmt::For {
                initializer,
                condition,
                update,
                body,
                ..
            } => {
                self.scopes.push();
                let initializer = Box::new(self.bind_variable_declaration(initializer)?);
                let bound_condition = self.bind_expression(condition)?;
                let converted = self.bind_conversion(
                    bound_condition,
                    &TypeSymbol::Bool,
                    false,
                    condition.span(),
                )?;
                let update = Box::new(self.bind_statement(update)?);
                let (body, break_label, continue_label) = self.bind_loop_body(body)?;
                self.scopes.pop();
                Ok(BoundStatement::For {
                    initializer,
                    condition: converted,
                    update,
                    body: Box::new(body),
                    break_label,
                    continue_label,
                })
            }
            Stmt::While {
                condition, body, ..
            } => {
                self.scopes.push();
                let bound_condition = self.bind_expression(condition)?;
                let converted = self.bind_conversion(
                    bound_condition,
                    &TypeSymbol::Bool,
                    false,
                    condition.span(),
                )?;
                let (body, break_label, continue_label) = self.bind_loop_body(body)?;
                self.scopes.pop();
                Ok(BoundStatement::While {
                    condition: converted,
                    body: Box::new(body),
                    break_label,
                    continue_label,
                })
            }
            Stmt::FromTo {
                counter,
                lower,
                upper,
                body,
                ..
            } => {
                self.scopes.push();
                let variable =
                    self.bind_variable_creation(counter, true, false, TypeSymbol::Int)?;
                let lower_bound = self.bind_expression(lower)?;
                let upper_bound = self.bind_expression(upper)?;

                if lower_bound.ty() != TypeSymbol::Int {
                    return Err(Diagnostic::error_with_span(
                        TAG,
                        ErrorKind::UnexpectedNonIntegerValue,
                        format!(
                            "from-to statement was expecting an integer value but instead got \"{}\"!",
                            lower_bound.ty().name()
                        ),
                        lower.span(),
                    ));
                }
                if upper_bound.ty() != TypeSymbol::Int {
                    return Err(Diagnostic::error_with_span(
                        TAG,
                        ErrorKind::UnexpectedNonIntegerValue,
                        format!(
                            "from-to statement was expecting an integer value but instead got \"{}\"!",
                            upper_bound.ty().name()
                        ),
                        upper.span(),
                    ));
                }

                let (body, break_label, continue_label) = self.bind_loop_body(body)?;
                self.scopes.pop();
                Ok(BoundStatement::FromTo {
                    variable,
                    lower: lower_bound,
                    upper: upper_bound,
                    body: Box::new(body),
                    break_label,
                    continue_label,
                })
            }
            Stmt::Break { span } => {
                if self.break_labels.is_empty() {
                    return Err(Diagnostic::error_with_span(
                        TAG,
                        ErrorKind::OutsideBreak,
                        "cannot use \"break\" outside of a loop!",
                        span.clone(),
                    ));
                }
                let label = self.break_labels[self.break_labels.len() - 1].clone();
                Ok(BoundStatement::Goto(label))
            }
            Stmt::Continue { span } => {
                if self.continue_labels.is_empty() {
                    return Err(Diagnostic::error_with_span(
                        TAG,
                        ErrorKind::OutsideContinue,
                        "cannot use \"continue\" outside of a loop!",
                        span.clone(),
                    ));
                }
                let label = self.continue_labels[self.continue_labels.len() - 1].clone();
                Ok(BoundStatement::Goto(label))
            }
            Stmt::Expression(expr) => {
                let bound = self.bind_expression(expr)?;
                Ok(BoundStatement::Expression(bound))
            }
        }
    }

    fn bind_variable_declaration(&mut self, stmt: &Stmt) -> DiagnosticResult<BoundStatement> {
        let (global, name, type_clause, initializer, span) = match stmt {
            Stmt::VariableDeclaration {
                global,
                name,
                type_clause,
                initializer,
                span,
            } => (*global, name, type_clause, initializer, span),
            other => {
                return Err(Diagnostic::error_with_span(
                    TAG,
                    ErrorKind::UnknownStatement,
                    "expected a variable declaration!",
                    other.span(),
                ));
            }
        };

        let clause_type = match type_clause {
            Some(clause) => Some(resolve_type_clause(clause)?),
            None => None,
        };
        let bound_initializer = match initializer {
            Some(expr) => Some(self.bind_expression(expr)?),
            None => None,
        };

        // The declared clause wins; otherwise the initializer's type.
        let variable_type = match (&clause_type, &bound_initializer) {
            (Some(ty), _) => ty.clone(),
            (None, Some(init)) => init.ty(),
            (None, None) => {
                return Err(Diagnostic::error_with_span(
                    TAG,
                    ErrorKind::IllegalVariableDeclaration,
                    "variable declaration is given neither a type nor an initializer!",
                    span.clone(),
                ));
            }
        };
        if variable_type == TypeSymbol::Void {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::IllegalVariableDeclaration,
                "cannot declare a variable of type \"void\"!",
                span.clone(),
            ));
        }

        let variable = self.bind_variable_creation(name, false, global, variable_type.clone())?;

        let converted_initializer = match bound_initializer {
            Some(init) => {
                let init_span = initializer
                    .as_ref()
                    .map(|e| e.span())
                    .unwrap_or_else(|| span.clone());
                Some(self.bind_conversion(init, &variable_type, false, init_span)?)
            }
            None => None,
        };

        Ok(BoundStatement::VariableDeclaration {
            variable,
            initializer: converted_initializer,
        })
    }

    fn bind_return_statement(
        &mut self,
        expression: &Option<Expr>,
        span: &ast::Span,
    ) -> DiagnosticResult<BoundStatement> {
        let bound = match expression {
            Some(expr) => Some(self.bind_expression(expr)?),
            None => None,
        };

        let symbol = match &self.function_symbol {
            Some(symbol) => symbol,
            None => {
                return Err(Diagnostic::error_with_span(
                    TAG,
                    ErrorKind::OutsideReturn,
                    "cannot use \"return\" outside of a function!",
                    span.clone(),
                ));
            }
        };

        if symbol.return_type == TypeSymbol::Void && bound.is_some() {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::VoidReturn,
                "cannot use \"return\" with a value inside of a void function!",
                span.clone(),
            ));
        }

        Ok(BoundStatement::Return(bound))
    }

    /// Allocates a fresh break/continue label pair, binds the loop body
    /// with them on the stacks, and pops them again.
    fn bind_loop_body(
        &mut self,
        stmt: &Stmt,
    ) -> DiagnosticResult<(BoundStatement, BoundLabel, BoundLabel)> {
        self.label_counter += 1;
        let break_label = format!("break{}", self.label_counter);
        let continue_label = format!("continue{}", self.label_counter);

        self.push_labels(break_label.clone(), continue_label.clone());
        let body = self.bind_statement(stmt);
        self.pop_labels();

        Ok((body?, break_label, continue_label))
    }

    // --- expressions ----------------------------------------------------

    pub fn bind_expression(&mut self, expr: &Expr) -> DiagnosticResult<BoundExpression> {
        match expr {
            Expr::Literal { value, .. } => Ok(BoundExpression::Literal {
                value: value.clone(),
            }),
            Expr::Parenthesized { inner, .. } => self.bind_expression(inner),
            Expr::Name(ident) => {
                if let Some(Symbol::Function(function)) = self.scopes.lookup(&ident.name) {
                    return Ok(BoundExpression::FunctionReference {
                        function: function.clone(),
                    });
                }
                let variable = self.bind_variable_reference(&ident.name, &ident.span)?;
                Ok(BoundExpression::Variable { variable })
            }
            Expr::Assignment { name, value, .. } => {
                let variable = self.bind_variable_reference(&name.name, &name.span)?;
                self.reject_parameter_target(&variable, &name.span)?;
                let bound_value = self.bind_expression(value)?;
                let converted =
                    self.bind_conversion(bound_value, &variable.ty, false, value.span())?;
                Ok(BoundExpression::Assignment {
                    variable,
                    value: Box::new(converted),
                })
            }
            Expr::VariableEditor {
                name,
                operator,
                value,
                span,
            } => {
                let variable = self.bind_variable_reference(&name.name, &name.span)?;
                self.reject_parameter_target(&variable, &name.span)?;
                let operand = match value {
                    Some(expr) => self.bind_expression(expr)?,
                    None => BoundExpression::Literal {
                        value: LiteralValue::Int(1),
                    },
                };
                let binary = self.bind_binary_internal(
                    BoundExpression::Variable {
                        variable: variable.clone(),
                    },
                    operand,
                    *operator,
                    span,
                )?;
                Ok(BoundExpression::Assignment {
                    variable,
                    value: Box::new(binary),
                })
            }
            Expr::ArrayAccess {
                base, index, span, ..
            } => {
                let bound_base = self.bind_expression(base)?;
                let element_type = self.expect_array_element(&bound_base, span)?;
                let bound_index = self.bind_expression(index)?;
                let converted_index =
                    self.bind_conversion(bound_index, &TypeSymbol::Int, false, index.span())?;
                Ok(BoundExpression::ArrayAccess {
                    base: Box::new(bound_base),
                    index: Box::new(converted_index),
                    element_type,
                })
            }
            Expr::ArrayAssignment {
                base,
                index,
                value,
                span,
            } => {
                let bound_base = self.bind_expression(base)?;
                let element_type = self.expect_array_element(&bound_base, span)?;
                let bound_index = self.bind_expression(index)?;
                let converted_index =
                    self.bind_conversion(bound_index, &TypeSymbol::Int, false, index.span())?;
                let bound_value = self.bind_expression(value)?;
                let converted_value =
                    self.bind_conversion(bound_value, &element_type, false, value.span())?;
                Ok(BoundExpression::ArrayAssignment {
                    base: Box::new(bound_base),
                    index: Box::new(converted_index),
                    value: Box::new(converted_value),
                    element_type,
                })
            }
            Expr::MakeArray {
                element_clause,
                length,
                ..
            } => {
                let element_type = resolve_type_clause(element_clause)?;
                let bound_length = self.bind_expression(length)?;
                let converted =
                    self.bind_conversion(bound_length, &TypeSymbol::Int, false, length.span())?;
                Ok(BoundExpression::MakeArray {
                    element_type,
                    length: Box::new(converted),
                })
            }
            Expr::Call { .. } => self.bind_call_expression(expr),
            Expr::TypeCall {
                base,
                method,
                arguments,
                span,
            } => self.bind_type_call_expression(base, method, arguments, span),
            Expr::Thread { function, span } => self.bind_thread_expression(function, span),
            Expr::Unary {
                operator,
                operator_span,
                operand,
                ..
            } => {
                let bound_operand = self.bind_expression(operand)?;
                match operators::bind_unary_operator(*operator, &bound_operand.ty()) {
                    Some(op) => Ok(BoundExpression::Unary {
                        op,
                        operand: Box::new(bound_operand),
                    }),
                    None => Err(Diagnostic::error_with_span(
                        TAG,
                        ErrorKind::UnaryOperatorType,
                        format!(
                            "the use of this unary operator with type \"{}\" is undefined!",
                            bound_operand.ty().name()
                        ),
                        operator_span.clone(),
                    )),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                let bound_left = self.bind_expression(left)?;
                let bound_right = self.bind_expression(right)?;
                self.bind_binary_internal(bound_left, bound_right, *operator, span)
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let bound_condition = self.bind_expression(condition)?;
                if bound_condition.ty() != TypeSymbol::Bool {
                    return Err(Diagnostic::error_with_span(
                        TAG,
                        ErrorKind::BinaryOperatorType,
                        "condition of a ternary operation needs to be of type \"bool\"!",
                        condition.span(),
                    ));
                }
                let bound_then = self.bind_expression(then_branch)?;
                let bound_else = self.bind_expression(else_branch)?;
                if bound_then.ty() != bound_else.ty() {
                    return Err(Diagnostic::error_with_span(
                        TAG,
                        ErrorKind::BinaryOperatorType,
                        "types of left and right side of a ternary need to match!",
                        else_branch.span(),
                    ));
                }
                Ok(BoundExpression::Ternary {
                    condition: Box::new(bound_condition),
                    then_branch: Box::new(bound_then),
                    else_branch: Box::new(bound_else),
                })
            }
        }
    }

    fn bind_call_expression(&mut self, expr: &Expr) -> DiagnosticResult<BoundExpression> {
        let (callee, casting_clause, arguments, span) = match expr {
            Expr::Call {
                callee,
                casting_clause,
                arguments,
                span,
            } => (callee, casting_clause, arguments, span),
            _ => unreachable!("bind_call_expression on non-call"),
        };

        // A primitive type name with one argument is an explicit cast.
        if casting_clause.is_none() && arguments.len() == 1 {
            if let Some(target) = builtins::lookup_primitive_type(&callee.name) {
                let bound = self.bind_expression(&arguments[0])?;
                return self.bind_conversion(bound, &target, true, span.clone());
            }
        }

        // A full type clause (`array(int)(x)`) likewise.
        if let Some(clause) = casting_clause {
            if arguments.len() == 1 {
                let target = resolve_type_clause(clause)?;
                let bound = self.bind_expression(&arguments[0])?;
                return self.bind_conversion(bound, &target, true, span.clone());
            }
        }

        let mut bound_arguments = Vec::new();
        for argument in arguments {
            bound_arguments.push(self.bind_expression(argument)?);
        }

        let function = match self.scopes.lookup(&callee.name) {
            Some(Symbol::Function(function)) => function.clone(),
            _ => {
                return Err(Diagnostic::error_with_span(
                    TAG,
                    ErrorKind::UndefinedFunctionCall,
                    format!("function \"{}\" does not exist!", callee.name),
                    callee.span.clone(),
                ));
            }
        };

        if bound_arguments.len() != function.parameters.len() {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::BadNumberOfParameters,
                format!(
                    "function \"{}\" expects {} arguments but got {}!",
                    function.name,
                    function.parameters.len(),
                    bound_arguments.len()
                ),
                span.clone(),
            ));
        }

        let mut converted = Vec::new();
        for (argument, parameter) in bound_arguments.into_iter().zip(&function.parameters) {
            converted.push(self.bind_conversion(argument, &parameter.ty, false, span.clone())?);
        }

        Ok(BoundExpression::Call {
            function,
            arguments: converted,
        })
    }

    fn bind_type_call_expression(
        &mut self,
        base: &Expr,
        method: &ast::Ident,
        arguments: &[Expr],
        span: &ast::Span,
    ) -> DiagnosticResult<BoundExpression> {
        let bound_base = self.bind_expression(base)?;
        let base_type = bound_base.ty();

        let function = match builtins::lookup_type_function(&method.name, &base_type) {
            Some(function) => function,
            None => {
                return Err(Diagnostic::error_with_span(
                    TAG,
                    ErrorKind::TypeFunctionDoesNotExist,
                    format!("could not find builtin type function \"{}\"!", method.name),
                    method.span.clone(),
                ));
            }
        };

        if function.origin_type.name() != base_type.name() {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::IncorrectTypeFunctionCall,
                format!(
                    "the use of builtin function \"{}\" on \"{}\" datatype is undefined!",
                    function.name,
                    base_type.name()
                ),
                span.clone(),
            ));
        }

        let mut bound_arguments = Vec::new();
        for argument in arguments {
            bound_arguments.push(self.bind_expression(argument)?);
        }

        if bound_arguments.len() != function.parameters.len() {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::BadNumberOfParameters,
                format!(
                    "type function \"{}\" expects {} arguments but got {}!",
                    function.name,
                    function.parameters.len(),
                    bound_arguments.len()
                ),
                span.clone(),
            ));
        }

        let mut converted = Vec::new();
        for (argument, parameter) in bound_arguments.into_iter().zip(&function.parameters) {
            converted.push(self.bind_conversion(argument, parameter, false, span.clone())?);
        }

        Ok(BoundExpression::TypeCall {
            base: Box::new(bound_base),
            function,
            arguments: converted,
        })
    }

    fn bind_thread_expression(
        &mut self,
        function_name: &ast::Ident,
        span: &ast::Span,
    ) -> DiagnosticResult<BoundExpression> {
        let function = match self.scopes.lookup(&function_name.name) {
            Some(Symbol::Function(function)) => function.clone(),
            _ => {
                return Err(Diagnostic::error_with_span(
                    TAG,
                    ErrorKind::UndefinedFunctionCall,
                    format!(
                        "function \"{}\" does not exist! (thread)",
                        function_name.name
                    ),
                    function_name.span.clone(),
                ));
            }
        };

        if !function.parameters.is_empty() {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::BadNumberOfParameters,
                format!(
                    "thread function \"{}\" expects 0 arguments but got {}!",
                    function.name,
                    function.parameters.len()
                ),
                span.clone(),
            ));
        }

        Ok(BoundExpression::Thread { function })
    }

    fn bind_binary_internal(
        &mut self,
        left: BoundExpression,
        right: BoundExpression,
        operator: ast::BinaryOperator,
        span: &ast::Span,
    ) -> DiagnosticResult<BoundExpression> {
        let mut right = right;
        let mut op = operators::bind_binary_operator(operator, &left.ty(), &right.ty());

        if op.is_none() {
            // No overload: try converting the right side to the left's
            // type (explicit conversions allowed here).
            let conv = classify(&right.ty(), &left.ty());
            if conv.exists() && conv != Conversion::Identity {
                right = self.bind_conversion(right, &left.ty(), true, span.clone())?;
                op = operators::bind_binary_operator(operator, &left.ty(), &right.ty());
            }
        }

        match op {
            Some(op) => Ok(BoundExpression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            }),
            None => Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::BinaryOperatorType,
                format!(
                    "the use of binary operator \"{}\" with types \"{}\" and \"{}\" is undefined!",
                    operator.symbol(),
                    left.ty().name(),
                    right.ty().name()
                ),
                span.clone(),
            )),
        }
    }

    // --- symbols --------------------------------------------------------

    fn bind_variable_creation(
        &mut self,
        name: &ast::Ident,
        is_readonly: bool,
        is_global: bool,
        ty: TypeSymbol,
    ) -> DiagnosticResult<VariableSymbol> {
        // `set` only changes the storage class (a module global instead
        // of a stack slot); the declaration lands in the active scope
        // either way, so visibility follows lexical nesting like `var`.
        let variable = if is_global {
            VariableSymbol::global(&name.name, is_readonly, ty)
        } else {
            VariableSymbol::local(&name.name, is_readonly, ty)
        };

        if !self.scopes.try_declare(Symbol::Variable(variable.clone())) {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::DuplicateVariableDeclaration,
                format!(
                    "variable \"{}\" could not be declared! a variable with this name has already been declared!",
                    name.name
                ),
                name.span.clone(),
            ));
        }
        Ok(variable)
    }

    /// Parameters have no writable slot in the emitted function, so they
    /// cannot be assignment targets.
    fn reject_parameter_target(
        &self,
        variable: &VariableSymbol,
        span: &ast::Span,
    ) -> DiagnosticResult<()> {
        if matches!(variable.kind, VariableKind::Parameter(_)) {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::NotImplemented,
                format!("assigning to parameter \"{}\" is not supported!", variable.name),
                span.clone(),
            ));
        }
        Ok(())
    }

    fn bind_variable_reference(
        &mut self,
        name: &str,
        span: &ast::Span,
    ) -> DiagnosticResult<VariableSymbol> {
        match self.scopes.lookup(name) {
            Some(Symbol::Variable(variable)) => Ok(variable.clone()),
            _ => Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::UndefinedVariableReference,
                format!("could not find variable \"{}\"! are you sure it exists?", name),
                span.clone(),
            )),
        }
    }

    fn expect_array_element(
        &self,
        base: &BoundExpression,
        span: &ast::Span,
    ) -> DiagnosticResult<TypeSymbol> {
        match base.ty().element_type() {
            Some(element) => Ok(element.clone()),
            None => Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::Conversion,
                format!(
                    "trying to array-access non-array type \"{}\"!",
                    base.ty().name()
                ),
                span.clone(),
            )),
        }
    }

    // --- conversions ----------------------------------------------------

    fn bind_conversion(
        &mut self,
        expression: BoundExpression,
        to: &TypeSymbol,
        allow_explicit: bool,
        span: ast::Span,
    ) -> DiagnosticResult<BoundExpression> {
        let conversion = classify(&expression.ty(), to);

        if !conversion.exists() {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::Conversion,
                format!(
                    "cannot convert type \"{}\" to \"{}\"!",
                    expression.ty(),
                    to
                ),
                span,
            ));
        }

        if conversion == Conversion::Explicit && !allow_explicit {
            return Err(Diagnostic::error_with_span(
                TAG,
                ErrorKind::ExplicitConversion,
                format!(
                    "cannot convert type \"{}\" to \"{}\"! (an explicit conversion exists, are you missing a cast?)",
                    expression.ty(),
                    to
                ),
                span,
            ));
        }

        if conversion == Conversion::Identity {
            return Ok(expression);
        }

        Ok(BoundExpression::Conversion {
            to: to.clone(),
            expression: Box::new(expression),
        })
    }
}
