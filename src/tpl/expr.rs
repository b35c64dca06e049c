use crate::tpl::VAR_PREFIX;
use crate::tpl::ast::{Expr, Expression, Op};
use crate::value::Value;

/// Comparison operators, longest first so `===` wins over `==` and `=`.
const OPERATORS: [(&str, Op); 9] = [
    ("===", Op::Eq),
    ("==", Op::Eq),
    ("!=", Op::Ne),
    ("<>", Op::Ne),
    ("<=", Op::Le),
    (">=", Op::Ge),
    ("=", Op::Eq),
    ("<", Op::Lt),
    (">", Op::Gt),
];

const KEYWORDS: [&str; 3] = ["true", "false", "null"];

/// Classifies an expression. The rules are tried in a fixed order and the
/// first match wins: function call, variable reference, comparison, JSON
/// scalar.
pub fn parse_expr(input: &str) -> Expression {
    let source = input.trim();
    let expr = parse_call(source)
        .or_else(|| parse_var(source))
        .or_else(|| parse_compare(source))
        .or_else(|| parse_literal(source))
        .unwrap_or(Expr::Unsupported);
    Expression {
        source: source.to_string(),
        expr,
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns the identifier at the start of `s` and the rest.
fn split_ident(s: &str) -> Option<(&str, &str)> {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_ident_start(c) => {}
        _ => return None,
    }
    let end = chars
        .find(|(_, c)| !is_ident_char(*c))
        .map_or(s.len(), |(i, _)| i);
    Some(s.split_at(end))
}

pub(crate) fn is_identifier(s: &str) -> bool {
    split_ident(s).is_some_and(|(_, rest)| rest.is_empty())
}

fn parse_call(s: &str) -> Option<Expr> {
    if !s.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    let (name, rest) = split_ident(s)?;
    if !rest.starts_with('(') {
        return None;
    }
    // The parenthesis opened after the name must close at the very end.
    let open = name.len();
    let close = matching_paren(s, open)?;
    if close != s.len() - 1 {
        return None;
    }
    Some(Expr::Call {
        name: name.to_string(),
        arg: Box::new(parse_expr(&s[open + 1..close])),
    })
}

/// Byte index of the `)` matching the `(` at `open`, skipping string
/// literals.
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut scanner = Scanner::default();
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        if scanner.in_string(c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_var(s: &str) -> Option<Expr> {
    let (prefix, mut rest) = match s.strip_prefix(VAR_PREFIX) {
        Some(rest) => (VAR_PREFIX, rest),
        None => ("", s),
    };

    let mut path = Vec::new();
    loop {
        let (segment, tail) = split_ident(rest)?;
        path.push(segment.to_string());
        match tail.strip_prefix('.') {
            Some(next) => rest = next,
            None => {
                rest = tail;
                break;
            }
        }
    }

    if prefix.is_empty() && KEYWORDS.contains(&path[0].as_str()) {
        return None;
    }

    let default = if rest.is_empty() {
        None
    } else {
        let json = rest.strip_prefix(':')?;
        let value: serde_json::Value = serde_json::from_str(json.trim()).ok()?;
        Some(Value::from(value))
    };

    path[0].insert_str(0, prefix);
    Some(Expr::Var { path, default })
}

fn parse_compare(s: &str) -> Option<Expr> {
    let (idx, sym, op) = find_operator(s)?;
    let lhs = parse_expr(&s[..idx]);
    let rhs = parse_expr(&s[idx + sym.len()..]);
    Some(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
}

/// First comparison operator outside string literals and parentheses.
fn find_operator(s: &str) -> Option<(usize, &'static str, Op)> {
    let mut depth = 0usize;
    let mut scanner = Scanner::default();
    for (i, c) in s.char_indices() {
        if scanner.in_string(c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                let rest = &s[i..];
                if let Some((sym, op)) = OPERATORS.iter().find(|(sym, _)| rest.starts_with(sym)) {
                    return Some((i, *sym, *op));
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_literal(s: &str) -> Option<Expr> {
    match serde_json::from_str::<serde_json::Value>(s).ok()? {
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        scalar => Some(Expr::Literal(Value::from(scalar))),
    }
}

/// Tracks whether a character scan is inside a JSON string literal.
#[derive(Default)]
struct Scanner {
    in_string: bool,
    escaped: bool,
}

impl Scanner {
    /// Feeds one character; returns true if it belongs to a string literal.
    fn in_string(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return true;
        }
        if c == '"' {
            self.in_string = true;
            return true;
        }
        false
    }
}
