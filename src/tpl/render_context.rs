use crate::value::Value;
use std::collections::BTreeMap;

/// Variables visible while rendering.
///
/// A context is never mutated: a loop body gets a child context that
/// shadows one name and points back at its parent.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    root: &'a BTreeMap<String, Value>,
    parent: Option<&'a Context<'a>>,
    local: Option<(&'a str, &'a Value)>,
}

impl<'a> Context<'a> {
    pub fn new(root: &'a BTreeMap<String, Value>) -> Self {
        Self {
            root,
            parent: None,
            local: None,
        }
    }

    /// Derives a context where `key` is bound to `value`.
    pub fn with<'b>(&'b self, key: &'b str, value: &'b Value) -> Context<'b> {
        Context {
            root: self.root,
            parent: Some(self),
            local: Some((key, value)),
        }
    }

    /// Looks up a top-level name, innermost binding first.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        let mut scope = Some(self);
        while let Some(ctx) = scope {
            if let Some((k, v)) = ctx.local
                && k == key
            {
                return Some(v);
            }
            scope = ctx.parent;
        }
        self.root.get(key)
    }

    /// Resolves `head.rest...`, walking nested maps. `None` if any segment
    /// is absent or the value on the way is not a map.
    pub fn lookup(&self, path: &[String]) -> Option<&'a Value> {
        let (head, rest) = path.split_first()?;
        let mut current = self.get(head)?;
        for part in rest {
            match current {
                Value::Map(m) => current = m.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lookup_simple() {
        let mut map = BTreeMap::new();
        map.insert("var:a".to_string(), Value::I64(1));
        let ctx = Context::new(&map);

        assert_eq!(ctx.lookup(&path(&["var:a"])), Some(&Value::I64(1)));
        assert_eq!(ctx.lookup(&path(&["var:b"])), None);
        assert_eq!(ctx.lookup(&[]), None);
    }

    #[test]
    fn test_lookup_nested() {
        let mut sub = BTreeMap::new();
        sub.insert("b".to_string(), Value::I64(2));

        let mut map = BTreeMap::new();
        map.insert("var:a".to_string(), Value::Map(sub));
        map.insert("var:s".to_string(), Value::from("str"));
        let ctx = Context::new(&map);

        assert_eq!(ctx.lookup(&path(&["var:a", "b"])), Some(&Value::I64(2)));
        assert_eq!(ctx.lookup(&path(&["var:a", "c"])), None);
        assert_eq!(ctx.lookup(&path(&["var:s", "len"])), None);
        assert_eq!(ctx.lookup(&path(&["x", "y"])), None);
    }

    #[test]
    fn test_overlay_shadows_without_leaking() {
        let mut map = BTreeMap::new();
        map.insert("item".to_string(), Value::I64(1));
        let ctx = Context::new(&map);

        let two = Value::I64(2);
        let three = Value::I64(3);
        {
            let inner = ctx.with("item", &two);
            assert_eq!(inner.get("item"), Some(&two));

            let innermost = inner.with("other", &three);
            assert_eq!(innermost.get("item"), Some(&two));
            assert_eq!(innermost.get("other"), Some(&three));
        }
        assert_eq!(ctx.get("item"), Some(&Value::I64(1)));
        assert_eq!(ctx.get("other"), None);
    }
}
