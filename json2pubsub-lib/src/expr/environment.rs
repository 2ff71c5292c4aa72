use super::functions::{FUNCTIONS, FunctionDecl};
use super::type_check::{TypeChecker, builtin_names};
use super::CelType;
use crate::Result;
use cel_interpreter::{Context, Program, Value};
use core::fmt::{Debug, Formatter};
use ohno::{app_err, bail};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Root variables visible to every expression.
pub const VARIABLES: &[&str] = &["origin", "request"];

/// The declarations shared by all expressions: root variables, built-in functions and the
/// custom function library.
///
/// Built once at startup and shared read-only afterward. Per-request scopes are layered on
/// top of the root context with [`Environment::scope`].
pub struct Environment {
    root: Context<'static>,
    functions: HashMap<&'static str, FunctionDecl>,
}

impl Environment {
    /// Builds the environment from the static function table.
    ///
    /// # Errors
    ///
    /// Fails if the table declares a function twice, declares two identical overloads,
    /// shadows a built-in function, reuses a handler name, or lacks a handler for a declaration.
    pub fn new() -> Result<Self> {
        Self::with_functions(FUNCTIONS)
    }

    pub(crate) fn with_functions(table: &[FunctionDecl]) -> Result<Self> {
        let builtins: HashSet<&str> = builtin_names().collect();
        let mut root = Context::default();
        let mut functions = HashMap::new();
        let mut handlers = HashSet::new();

        for decl in table {
            let (namespace, handler_name) = decl.split_name();

            if builtins.contains(handler_name) {
                bail!("function '{}' shadows a built-in function", decl.name);
            }

            if decl.overloads.is_empty() {
                bail!("function '{}' declares no overloads", decl.name);
            }

            for (i, a) in decl.overloads.iter().enumerate() {
                if decl.overloads[i + 1..]
                    .iter()
                    .any(|b| a.receiver == b.receiver && a.params == b.params)
                {
                    bail!("function '{}' declares the same overload twice", decl.name);
                }
            }

            let install = decl
                .install
                .ok_or_else(|| app_err!("function '{}' has no handler", decl.name))?;

            if functions.insert(decl.name, *decl).is_some() {
                bail!("function '{}' is declared more than once", decl.name);
            }

            if !handlers.insert(handler_name) {
                bail!("function '{}' reuses the handler name '{handler_name}'", decl.name);
            }

            if let Some(namespace) = namespace {
                if VARIABLES.contains(&namespace) {
                    bail!("function '{}' is declared in the namespace of variable '{namespace}'", decl.name);
                }

                // Calls such as `base64.encode(x)` evaluate `base64` before dispatching on `encode`
                root.add_variable_from_value(namespace, Value::String(Arc::new(namespace.to_string())));
            }

            install(&mut root, handler_name);
        }

        log::debug!(target: super::LOG_TARGET, "Expression environment ready with {} custom functions", functions.len());

        Ok(Self { root, functions })
    }

    /// Parses and statically checks `source`, returning the runnable program and its inferred type.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors and on anything the static checker rejects.
    pub fn compile(&self, source: &str) -> Result<(Program, CelType)> {
        let ast = cel_parser::parse(source).map_err(|e| app_err!("syntax error: {e}"))?;

        let output_type = TypeChecker::new(VARIABLES, &self.functions)
            .check(&ast)
            .map_err(|errors| app_err!("{}", errors.join("; ")))?;

        let program = Program::compile(source).map_err(|e| app_err!("syntax error: {e}"))?;

        Ok((program, output_type))
    }

    /// Creates an evaluation scope binding the root variables for one request.
    #[must_use]
    pub fn scope(&self, origin: Value, request: Value) -> Context<'_> {
        let mut scope = self.root.new_inner_scope();
        scope.add_variable_from_value("origin", origin);
        scope.add_variable_from_value("request", request);
        scope
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("variables", &VARIABLES)
            .field("functions", &names)
            .finish_non_exhaustive()
    }
}
