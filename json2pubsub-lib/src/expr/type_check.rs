//! Static checking of parsed expressions.
//!
//! The evaluator itself is dynamically typed, so this pass provides the compile-time
//! guarantees: every identifier resolves to a declared variable or a comprehension variable,
//! every call targets a known function, calls to custom functions match one of their declared
//! overloads, and the output type is inferred as precisely as the source allows.

use super::CelType;
use super::functions::{FunctionDecl, Overload};
use cel_parser::{ArithmeticOp, Atom, Expression, Member, UnaryOp};
use core::ops::RangeInclusive;
use std::collections::HashMap;

/// A function built into the evaluator.
struct Builtin {
    name: &'static str,
    /// Argument counts accepted as a global call, `None` if the function has no global form.
    global: Option<RangeInclusive<usize>>,
    /// Argument counts accepted as a method call, `None` if the function has no receiver form.
    method: Option<RangeInclusive<usize>>,
    result: CelType,
}

const fn builtin(
    name: &'static str,
    global: Option<RangeInclusive<usize>>,
    method: Option<RangeInclusive<usize>>,
    result: CelType,
) -> Builtin {
    Builtin {
        name,
        global,
        method,
        result,
    }
}

const BUILTINS: &[Builtin] = &[
    builtin("has", Some(1..=1), None, CelType::Bool),
    builtin("contains", Some(2..=2), Some(1..=1), CelType::Bool),
    builtin("startsWith", Some(2..=2), Some(1..=1), CelType::Bool),
    builtin("endsWith", Some(2..=2), Some(1..=1), CelType::Bool),
    builtin("matches", Some(2..=2), Some(1..=1), CelType::Bool),
    builtin("all", None, Some(2..=2), CelType::Bool),
    builtin("exists", None, Some(2..=2), CelType::Bool),
    builtin("exists_one", None, Some(2..=2), CelType::Bool),
    builtin("map", None, Some(2..=2), CelType::List),
    builtin("filter", None, Some(2..=2), CelType::List),
    builtin("size", Some(1..=1), None, CelType::Int),
    builtin("int", Some(1..=1), Some(0..=0), CelType::Int),
    builtin("uint", Some(1..=1), Some(0..=0), CelType::UInt),
    builtin("double", Some(1..=1), Some(0..=0), CelType::Double),
    builtin("string", Some(1..=1), Some(0..=0), CelType::String),
    builtin("bytes", Some(1..=1), None, CelType::Bytes),
    builtin("max", Some(1..=usize::MAX), None, CelType::Dyn),
    builtin("duration", Some(1..=1), None, CelType::Duration),
    builtin("timestamp", Some(1..=1), None, CelType::Timestamp),
];

/// Macros whose first argument names a variable bound inside the remaining arguments.
const COMPREHENSIONS: &[&str] = &["all", "exists", "exists_one", "map", "filter"];

pub(crate) fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|b| b.name)
}

fn find_builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub(crate) struct TypeChecker<'a> {
    variables: &'a [&'static str],
    functions: &'a HashMap<&'static str, FunctionDecl>,
    bound: Vec<String>,
    errors: Vec<String>,
}

impl<'a> TypeChecker<'a> {
    pub(crate) const fn new(variables: &'a [&'static str], functions: &'a HashMap<&'static str, FunctionDecl>) -> Self {
        Self {
            variables,
            functions,
            bound: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Checks `expr`, returning its inferred type or every problem found.
    pub(crate) fn check(mut self, expr: &Expression) -> Result<CelType, Vec<String>> {
        let ty = self.infer(expr);
        if self.errors.is_empty() { Ok(ty) } else { Err(self.errors) }
    }

    fn infer(&mut self, expr: &Expression) -> CelType {
        match expr {
            Expression::Atom(atom) => atom_type(atom),

            Expression::Ident(name) => {
                if !self.is_variable(name) {
                    self.errors.push(format!("undeclared reference to '{name}'"));
                }
                CelType::Dyn
            }

            Expression::Relation(lhs, _, rhs) => {
                let _ = self.infer(lhs);
                let _ = self.infer(rhs);
                CelType::Bool
            }

            Expression::And(lhs, rhs) | Expression::Or(lhs, rhs) => {
                let _ = self.infer(lhs);
                let _ = self.infer(rhs);
                CelType::Bool
            }

            Expression::Unary(op, operand) => {
                let ty = self.infer(operand);
                match op {
                    UnaryOp::Not | UnaryOp::DoubleNot => CelType::Bool,
                    UnaryOp::Minus | UnaryOp::DoubleMinus => {
                        if ty.is_numeric() {
                            ty
                        } else {
                            CelType::Dyn
                        }
                    }
                }
            }

            Expression::Arithmetic(lhs, op, rhs) => {
                let lhs = self.infer(lhs);
                let rhs = self.infer(rhs);
                arithmetic_type(lhs, op, rhs)
            }

            Expression::Ternary(condition, when_true, when_false) => {
                let _ = self.infer(condition);
                let a = self.infer(when_true);
                let b = self.infer(when_false);
                a.join(b)
            }

            Expression::List(items) => {
                for item in items {
                    let _ = self.infer(item);
                }
                CelType::List
            }

            Expression::Map(entries) => {
                for (key, value) in entries {
                    let _ = self.infer(key);
                    let _ = self.infer(value);
                }
                CelType::Map
            }

            Expression::Member(target, member) => {
                let _ = self.infer(target);
                match member.as_ref() {
                    Member::Attribute(_) => {}
                    Member::Index(index) => {
                        let _ = self.infer(index);
                    }
                    Member::Fields(fields) => {
                        for (_, value) in fields {
                            let _ = self.infer(value);
                        }
                    }
                }
                CelType::Dyn
            }

            Expression::FunctionCall(name, target, args) => self.infer_call(name, target.as_deref(), args),
        }
    }

    fn is_variable(&self, name: &str) -> bool {
        self.bound.iter().any(|b| b == name) || self.variables.contains(&name)
    }

    fn infer_call(&mut self, name: &Expression, target: Option<&Expression>, args: &[Expression]) -> CelType {
        let Expression::Ident(name) = name else {
            self.errors.push("call target is not a function name".to_string());
            return CelType::Dyn;
        };
        let name = name.as_str();

        // `base64.encode(x)` parses as a call to `encode` on the identifier `base64`
        if let Some(Expression::Ident(namespace)) = target
            && !self.is_variable(namespace)
        {
            let qualified = format!("{namespace}.{name}");
            if let Some(overloads) = self.functions.get(qualified.as_str()).map(|decl| decl.overloads) {
                let arg_types: Vec<CelType> = args.iter().map(|a| self.infer(a)).collect();
                return self.apply_custom(&qualified, overloads, None, &arg_types);
            }
        }

        if COMPREHENSIONS.contains(&name) {
            return self.infer_comprehension(name, target, args);
        }

        let receiver = target.map(|t| self.infer(t));
        let arg_types: Vec<CelType> = args.iter().map(|a| self.infer(a)).collect();

        if let Some(overloads) = self.functions.get(name).map(|decl| decl.overloads) {
            return self.apply_custom(name, overloads, receiver, &arg_types);
        }

        if let Some(builtin) = find_builtin(name) {
            let accepted = if receiver.is_some() { &builtin.method } else { &builtin.global };
            if accepted.as_ref().is_some_and(|counts| counts.contains(&args.len())) {
                return builtin.result;
            }

            self.errors.push(format!(
                "found no matching overload for '{name}' applied to '{}'",
                describe_call(receiver, &arg_types)
            ));
            return CelType::Dyn;
        }

        self.errors.push(format!("undeclared reference to function '{name}'"));
        CelType::Dyn
    }

    fn apply_custom(&mut self, name: &str, overloads: &[Overload], receiver: Option<CelType>, arg_types: &[CelType]) -> CelType {
        if let Some(overload) = resolve_overload(overloads, receiver, arg_types) {
            return overload.result;
        }

        self.errors.push(format!(
            "found no matching overload for '{name}' applied to '{}'",
            describe_call(receiver, arg_types)
        ));
        CelType::Dyn
    }

    fn infer_comprehension(&mut self, name: &str, target: Option<&Expression>, args: &[Expression]) -> CelType {
        let Some(target) = target else {
            self.errors.push(format!("'{name}' must be called on a list or map, as in 'items.{name}(x, ...)'"));
            return CelType::Dyn;
        };
        let _ = self.infer(target);

        if args.len() != 2 {
            self.errors.push(format!("'{name}' expects a variable name and an expression"));
            return CelType::Dyn;
        }

        let result = find_builtin(name).map_or(CelType::Dyn, |b| b.result);

        match args.split_first() {
            Some((Expression::Ident(variable), body)) => {
                self.bound.push(variable.to_string());
                for expr in body {
                    let _ = self.infer(expr);
                }
                let _ = self.bound.pop();
            }
            _ => self.errors.push(format!("'{name}' expects a variable name as its first argument")),
        }

        result
    }
}

fn atom_type(atom: &Atom) -> CelType {
    match atom {
        Atom::Int(_) => CelType::Int,
        Atom::UInt(_) => CelType::UInt,
        Atom::Float(_) => CelType::Double,
        Atom::String(_) => CelType::String,
        Atom::Bytes(_) => CelType::Bytes,
        Atom::Bool(_) => CelType::Bool,
        Atom::Null => CelType::Null,
    }
}

fn arithmetic_type(lhs: CelType, op: &ArithmeticOp, rhs: CelType) -> CelType {
    match (lhs, op, rhs) {
        (CelType::Timestamp, ArithmeticOp::Add | ArithmeticOp::Subtract, CelType::Duration)
        | (CelType::Duration, ArithmeticOp::Add, CelType::Timestamp) => return CelType::Timestamp,
        (CelType::Duration, ArithmeticOp::Add | ArithmeticOp::Subtract, CelType::Duration) => return CelType::Duration,
        _ => {}
    }

    if lhs != rhs {
        return CelType::Dyn;
    }

    match (op, lhs) {
        (_, ty) if ty.is_numeric() => ty,
        (ArithmeticOp::Add, CelType::String | CelType::Bytes | CelType::List) => lhs,
        _ => CelType::Dyn,
    }
}

fn resolve_overload(overloads: &[Overload], receiver: Option<CelType>, args: &[CelType]) -> Option<Overload> {
    overloads
        .iter()
        .find(|overload| {
            let receiver_matches = match (overload.receiver, receiver) {
                (None, None) => true,
                (Some(expected), Some(actual)) => actual.is_assignable_to(expected),
                _ => false,
            };

            receiver_matches
                && overload.params.len() == args.len()
                && overload.params.iter().zip(args).all(|(expected, actual)| actual.is_assignable_to(*expected))
        })
        .copied()
}

fn describe_call(receiver: Option<CelType>, args: &[CelType]) -> String {
    let args = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    match receiver {
        Some(receiver) => format!("{receiver}.({args})"),
        None => format!("({args})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::functions::FUNCTIONS;

    fn check(source: &str) -> Result<CelType, Vec<String>> {
        let functions: HashMap<_, _> = FUNCTIONS.iter().map(|f| (f.name, *f)).collect();
        let expr = cel_parser::parse(source).unwrap();
        TypeChecker::new(&["origin", "request"], &functions).check(&expr)
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(check("true").unwrap(), CelType::Bool);
        assert_eq!(check("1").unwrap(), CelType::Int);
        assert_eq!(check("'x'").unwrap(), CelType::String);
        assert_eq!(check("null").unwrap(), CelType::Null);
        assert_eq!(check("[1, 2]").unwrap(), CelType::List);
        assert_eq!(check("{'a': 1}").unwrap(), CelType::Map);
    }

    #[test]
    fn test_request_fields_are_dynamic() {
        assert_eq!(check("request.json").unwrap(), CelType::Dyn);
        assert_eq!(check("request.headers['x-token'] == 'abc'").unwrap(), CelType::Bool);
    }

    #[test]
    fn test_custom_function_result_types() {
        assert_eq!(check("ipInRange(origin.ip, '10.0.0.0/8')").unwrap(), CelType::Bool);
        assert_eq!(check("hmacSHA256('k', request.body)").unwrap(), CelType::String);
        assert_eq!(check("parseJWT('k', 'token')").unwrap(), CelType::Map);
        assert_eq!(check("request.body.substring(1, 3)").unwrap(), CelType::String);
    }

    #[test]
    fn test_string_concatenation_is_string() {
        assert_eq!(check("'v0=' + hmacSHA256('k', 'm')").unwrap(), CelType::String);
    }

    #[test]
    fn test_unknown_variable_is_rejected() {
        let errors = check("user.name == 'x'").unwrap_err();
        assert!(errors[0].contains("'user'"));
    }

    #[test]
    fn test_unknown_function_is_rejected() {
        let errors = check("frobnicate(request.body)").unwrap_err();
        assert!(errors[0].contains("frobnicate"));
    }

    #[test]
    fn test_wrong_arity_is_rejected() {
        let errors = check("ipInRange(origin.ip)").unwrap_err();
        assert!(errors[0].contains("no matching overload"));
    }

    #[test]
    fn test_wrong_argument_type_is_rejected() {
        let _ = check("ipInRange(1, '10.0.0.0/8')").unwrap_err();
        let _ = check("hmacSHA1('k', 42)").unwrap_err();
    }

    #[test]
    fn test_method_call_must_match_receiver_style() {
        let _ = check("trim(request.body)").unwrap_err();
        let _ = check("'a'.ipInRange('10.0.0.0/8')").unwrap_err();
    }

    #[test]
    fn test_comprehension_variables_are_in_scope() {
        assert_eq!(check("request.json.items.all(i, i.ok)").unwrap(), CelType::Bool);
        assert_eq!(check("request.json.items.map(i, i.id)").unwrap(), CelType::List);
        let _ = check("request.json.items.all(i, j.ok)").unwrap_err();
    }

    #[test]
    fn test_ternary_join() {
        assert_eq!(check("request.body == '' ? false : true").unwrap(), CelType::Bool);
        assert_eq!(check("request.body == '' ? 1 : 'x'").unwrap(), CelType::Dyn);
    }

    #[test]
    fn test_builtin_call_styles() {
        assert_eq!(check("size(request.body)").unwrap(), CelType::Int);
        assert_eq!(check("request.body.startsWith('v0=')").unwrap(), CelType::Bool);
        assert_eq!(check("request.json.count.string()").unwrap(), CelType::String);

        let errors = check("request.body.size()").unwrap_err();
        assert!(errors[0].contains("no matching overload for 'size'"), "{errors:?}");
        let _ = check("'1s'.duration()").unwrap_err();
        let _ = check("request.body.startsWith()").unwrap_err();
    }

    #[test]
    fn test_time_types() {
        assert_eq!(check("timestamp(request.json.at)").unwrap(), CelType::Timestamp);
        assert_eq!(check("duration('1h')").unwrap(), CelType::Duration);
        assert_eq!(check("timestamp(request.json.at) + duration('1h')").unwrap(), CelType::Timestamp);
        assert_eq!(check("timestamp(request.json.at).getFullYear()").unwrap(), CelType::Int);
        assert_eq!(check("timestamp(request.json.at).getHours('+02:00')").unwrap(), CelType::Int);
        assert_eq!(check("duration('90m').getMinutes()").unwrap(), CelType::Int);
        let _ = check("duration('90m').getFullYear()").unwrap_err();
        let _ = check("duration('90m').getHours('UTC')").unwrap_err();
    }

    #[test]
    fn test_namespaced_functions() {
        assert_eq!(check("base64.encode(b'abc')").unwrap(), CelType::String);
        assert_eq!(check("base64.decode(request.body)").unwrap(), CelType::Bytes);
        assert_eq!(check("strings.quote(request.body)").unwrap(), CelType::String);

        let _ = check("base64.encode('abc')").unwrap_err();
        let _ = check("encode(b'abc')").unwrap_err();
        let _ = check("request.encode(b'abc')").unwrap_err();

        let errors = check("base64 == 'x'").unwrap_err();
        assert!(errors[0].contains("'base64'"));
    }

    #[test]
    fn test_list_receiver_functions() {
        assert_eq!(check("['a', 'b'].join(', ')").unwrap(), CelType::String);
        assert_eq!(check("'%s=%d'.format(['a', 1])").unwrap(), CelType::String);
        let _ = check("'abc'.join(',')").unwrap_err();
    }

    #[test]
    fn test_has_macro() {
        assert_eq!(check("has(request.json)").unwrap(), CelType::Bool);
    }
}
