use crate::Result;
use crate::error::TemplateError;
use crate::value::Value;
use dashmap::DashMap;
use std::sync::Arc;

/// A function callable from a template as `Name(arg)`.
pub trait Function: Send + Sync {
    fn call(&self, arg: Value) -> Result<Value>;
}

impl<F> Function for F
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn call(&self, arg: Value) -> Result<Value> {
        self(arg)
    }
}

/// HTML-escapes the stringified argument.
fn escape(arg: Value) -> Result<Value> {
    let text = arg.to_string();
    Ok(Value::Str(
        html_escape::encode_quoted_attribute(&text).into_owned(),
    ))
}

/// Thread-safe registry of template functions, keyed by name.
pub struct Functions {
    map: DashMap<String, Arc<dyn Function>>,
}

impl Default for Functions {
    fn default() -> Self {
        Self::new()
    }
}

impl Functions {
    /// A registry holding the built-in functions.
    pub fn new() -> Self {
        let map: DashMap<String, Arc<dyn Function>> = DashMap::new();
        map.insert("Escape".to_string(), Arc::new(escape));
        Self { map }
    }

    /// Registers `function` under `name`, replacing any previous entry.
    ///
    /// # Errors
    /// Returns an error if `name` could not be written as a call in a
    /// template (it must start with an uppercase ASCII letter).
    pub fn register(&self, name: &str, function: impl Function + 'static) -> Result<()> {
        if !name.starts_with(|c: char| c.is_ascii_uppercase())
            || !crate::tpl::expr::is_identifier(name)
        {
            return Err(TemplateError::InvalidFunctionName(name.to_string()));
        }
        self.map.insert(name.to_string(), Arc::new(function));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.map.get(name).map(|f| f.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}
