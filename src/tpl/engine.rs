use crate::Result;
use crate::error::TemplateError;
use crate::tpl::VAR_PREFIX;
use crate::tpl::ast::AstNode;
use crate::tpl::expr::parse_expr;
use crate::tpl::functions::{Function, Functions};
use crate::tpl::parser::parse_template;
use crate::tpl::render;
use crate::tpl::render_context::Context;
use crate::value::{Value, to_value};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Instant;

/// Engine used by the free functions of this module. Never mutated.
static DEFAULT: LazyLock<Engine> = LazyLock::new(Engine::new);

/// A template engine: the function registry templates can call.
///
/// An engine is `Send + Sync`; share it by reference or `Arc` and render
/// from as many threads as needed.
pub struct Engine {
    functions: Functions,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with the built-in functions (`Escape`).
    pub fn new() -> Self {
        Self {
            functions: Functions::new(),
        }
    }

    /// Makes `function` callable from templates as `name(arg)`.
    ///
    /// # Errors
    /// Returns an error if `name` does not start with an uppercase letter or
    /// is not a plain identifier.
    pub fn register(&self, name: &str, function: impl Function + 'static) -> Result<()> {
        self.functions.register(name, function)
    }

    /// Parses `template` and renders it with `vars`, exposed to the template
    /// under the `var:` prefix.
    ///
    /// `vars` must serialize to a map; `()` and `None` count as no variables.
    pub fn instantiate<T: ?Sized + Serialize>(&self, template: &str, vars: &T) -> Result<String> {
        let start = Instant::now();

        // Parse first: syntax errors surface before any variable is touched
        let result = parse_template(template).and_then(|nodes| self.render(&nodes, vars));
        let elapsed = start.elapsed().as_micros();

        match &result {
            Ok(out) => debug!(
                "Instantiate: template_len={}, output_len={}, elapsed={}us",
                template.len(),
                out.len(),
                elapsed
            ),
            Err(e) => debug!(
                "Instantiate: template_len={}, elapsed={}us, error={:?}",
                template.len(),
                elapsed,
                e
            ),
        }

        result
    }

    /// Renders an already parsed template.
    pub fn render<T: ?Sized + Serialize>(&self, nodes: &[AstNode], vars: &T) -> Result<String> {
        // 1. Convert caller data and move it under the `var:` prefix
        let root = namespace(to_value(vars)?)?;

        // 2. Render into a single buffer; loops derive child scopes from `ctx`
        let ctx = Context::new(&root);
        let mut out = String::new();
        render::render(nodes, &ctx, &self.functions, &mut out)?;
        Ok(out)
    }

    /// Evaluates a single expression against `ctx`.
    pub fn resolve(&self, expression: &str, ctx: &Context) -> Result<Value> {
        render::eval(&parse_expr(expression), ctx, &self.functions)
    }
}

/// Moves caller variables under the `var:` prefix.
///
/// Only a map (a struct, a `HashMap`, a JSON object) names variables;
/// `Null` stands for "no variables". Anything else is rejected with
/// [`TemplateError::InvalidVariables`].
fn namespace(vars: Value) -> Result<BTreeMap<String, Value>> {
    match vars {
        Value::Map(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (format!("{}{}", VAR_PREFIX, k), v))
            .collect()),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(TemplateError::InvalidVariables(other.kind().to_string())),
    }
}

/// Parses `template` into a tree that can be rendered many times with
/// [`Engine::render`].
pub fn parse(template: &str) -> Result<Vec<AstNode>> {
    parse_template(template)
}

/// Instantiates `template` with the default engine.
pub fn instantiate<T: ?Sized + Serialize>(template: &str, vars: &T) -> Result<String> {
    DEFAULT.instantiate(template, vars)
}

/// Validates `template` without rendering it. Needs no variables: only
/// lonely delimiters and block structure are checked, expressions are not
/// evaluated.
pub fn check_syntax(template: &str) -> Result<()> {
    parse_template(template).map(|_| ())
}

/// Evaluates a single expression with the default engine.
pub fn resolve(expression: &str, ctx: &Context) -> Result<Value> {
    DEFAULT.resolve(expression, ctx)
}
