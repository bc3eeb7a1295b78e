//! The fixed catalog of builtin functions and type functions.
//!
//! Builtin functions are ordinary `FunctionSymbol`s with `builtin = true`
//! and no declaration; the emitter declares them as externs implemented
//! by the runtime library, and the ARC protocol treats their object
//! arguments as caller-cleaned. Type functions are methods on the builtin
//! object types, resolved by receiver type and method name.

use crate::symbols::{FunctionSymbol, TypeFunctionSymbol, TypeSymbol, VariableSymbol};

fn builtin(
    name: &str,
    parameters: Vec<(&str, TypeSymbol)>,
    return_type: TypeSymbol,
) -> FunctionSymbol {
    FunctionSymbol {
        name: name.to_string(),
        parameters: parameters
            .into_iter()
            .enumerate()
            .map(|(i, (pname, ty))| VariableSymbol::parameter(pname, i, ty))
            .collect(),
        return_type,
        builtin: true,
        declaration: None,
    }
}

/// Every builtin function visible to source programs.
pub fn builtin_functions() -> Vec<FunctionSymbol> {
    vec![
        builtin("Print", vec![("text", TypeSymbol::String)], TypeSymbol::Void),
        builtin("Write", vec![("text", TypeSymbol::String)], TypeSymbol::Void),
        builtin("Input", vec![], TypeSymbol::String),
        builtin("InputKey", vec![], TypeSymbol::String),
        builtin("Clear", vec![], TypeSymbol::Void),
        builtin(
            "SetCursor",
            vec![("x", TypeSymbol::Int), ("y", TypeSymbol::Int)],
            TypeSymbol::Void,
        ),
        builtin("GetSizeX", vec![], TypeSymbol::Int),
        builtin("GetSizeY", vec![], TypeSymbol::Int),
        builtin(
            "SetCursorVisible",
            vec![("state", TypeSymbol::Bool)],
            TypeSymbol::Void,
        ),
        builtin("GetCursorVisible", vec![], TypeSymbol::Bool),
        builtin("Random", vec![("maxNum", TypeSymbol::Int)], TypeSymbol::Int),
        builtin(
            "Sleep",
            vec![("milliseconds", TypeSymbol::Int)],
            TypeSymbol::Void,
        ),
        builtin("Version", vec![], TypeSymbol::String),
    ]
}

/// Resolves a primitive type name (`string(x)` style casts and type
/// clauses without subtypes).
pub fn lookup_primitive_type(name: &str) -> Option<TypeSymbol> {
    match name {
        "void" => Some(TypeSymbol::Void),
        "bool" => Some(TypeSymbol::Bool),
        "byte" => Some(TypeSymbol::Byte),
        "int" => Some(TypeSymbol::Int),
        "float" => Some(TypeSymbol::Float),
        "string" => Some(TypeSymbol::String),
        "any" => Some(TypeSymbol::Any),
        _ => None,
    }
}

/// Names of the builtin type-function methods.
pub mod methods {
    pub const GET_LENGTH: &str = "GetLength";
    pub const SUBSTRING: &str = "Substring";
    pub const PUSH: &str = "Push";
    pub const START: &str = "Start";
    pub const JOIN: &str = "Join";
    pub const KILL: &str = "Kill";
}

/// Resolves a type function by method name and receiver type. Returns
/// `None` when no builtin method of that name exists at all; a receiver
/// mismatch is reported by the binder via the origin-type check.
pub fn lookup_type_function(name: &str, receiver: &TypeSymbol) -> Option<TypeFunctionSymbol> {
    match name {
        methods::GET_LENGTH => {
            let origin = match receiver {
                TypeSymbol::String => TypeSymbol::String,
                // Arrays of any element type share one length accessor.
                TypeSymbol::Array(_) => receiver.clone(),
                // Anything else resolves to the array variant and fails
                // the binder's origin check.
                _ => TypeSymbol::Array(Box::new(TypeSymbol::Any)),
            };
            Some(TypeFunctionSymbol {
                name: name.to_string(),
                origin_type: origin,
                parameters: vec![],
                return_type: TypeSymbol::Int,
            })
        }
        methods::SUBSTRING => Some(TypeFunctionSymbol {
            name: name.to_string(),
            origin_type: TypeSymbol::String,
            parameters: vec![TypeSymbol::Int, TypeSymbol::Int],
            return_type: TypeSymbol::String,
        }),
        methods::PUSH => {
            // The pushed value's type is the receiver's element type; the
            // primitive/object runtime variant is picked at emission.
            let element = receiver
                .element_type()
                .cloned()
                .unwrap_or(TypeSymbol::Any);
            Some(TypeFunctionSymbol {
                name: name.to_string(),
                origin_type: TypeSymbol::Array(Box::new(element.clone())),
                parameters: vec![element],
                return_type: TypeSymbol::Void,
            })
        }
        methods::START | methods::JOIN | methods::KILL => Some(TypeFunctionSymbol {
            name: name.to_string(),
            origin_type: TypeSymbol::Thread,
            parameters: vec![],
            return_type: TypeSymbol::Void,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_contains_console_builtins() {
        let names: Vec<String> = builtin_functions().into_iter().map(|f| f.name).collect();
        for expected in ["Print", "Input", "Random", "Version"] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn get_length_selects_receiver_variant() {
        let on_string =
            lookup_type_function(methods::GET_LENGTH, &TypeSymbol::String).expect("resolve");
        assert_eq!(on_string.origin_type, TypeSymbol::String);

        let arr = TypeSymbol::Array(Box::new(TypeSymbol::Int));
        let on_array = lookup_type_function(methods::GET_LENGTH, &arr).expect("resolve");
        assert_eq!(on_array.origin_type, arr);
    }

    #[test]
    fn push_takes_element_type() {
        let arr = TypeSymbol::Array(Box::new(TypeSymbol::String));
        let push = lookup_type_function(methods::PUSH, &arr).expect("resolve");
        assert_eq!(push.parameters, vec![TypeSymbol::String]);
    }

    #[test]
    fn unknown_method_is_none() {
        assert!(lookup_type_function("Reverse", &TypeSymbol::String).is_none());
    }
}
