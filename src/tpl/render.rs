use crate::Result;
use crate::error::TemplateError;
use crate::tpl::ast::{AstNode, Expr, Expression, Op};
use crate::tpl::functions::Functions;
use crate::tpl::render_context::Context;
use crate::value::Value;
use std::cmp::Ordering;

/// Evaluates a pre-classified expression against `ctx`.
pub fn eval(expression: &Expression, ctx: &Context, functions: &Functions) -> Result<Value> {
    match &expression.expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Var { path, default } => match (ctx.lookup(path), default) {
            (Some(v), _) => Ok(v.clone()),
            (None, Some(d)) => Ok(d.clone()),
            (None, None) => Err(TemplateError::Unresolved {
                expression: expression.source.clone(),
            }),
        },
        Expr::Call { name, arg } => {
            let function = functions
                .get(name)
                .ok_or_else(|| TemplateError::UnknownFunction {
                    name: name.clone(),
                    expression: expression.source.clone(),
                })?;
            function.call(eval(arg, ctx, functions)?)
        }
        Expr::Compare(op, lhs, rhs) => {
            compare(*op, lhs, rhs, ctx, functions).map_err(|e| TemplateError::Comparison {
                expression: expression.source.clone(),
                source: Box::new(e),
            })
        }
        Expr::Unsupported => Err(TemplateError::Unimplemented(expression.source.clone())),
    }
}

/// Applies `op` to both operands. Equality never fails; ordering fails on
/// operands of different kinds. Errors are wrapped with the whole
/// comparison by the caller.
fn compare(
    op: Op,
    lhs: &Expression,
    rhs: &Expression,
    ctx: &Context,
    functions: &Functions,
) -> Result<Value> {
    let l_val = eval(lhs, ctx, functions)?;
    let r_val = eval(rhs, ctx, functions)?;

    let result = match op {
        Op::Eq => l_val.loose_eq(&r_val),
        Op::Ne => !l_val.loose_eq(&r_val),
        Op::Gt => l_val.try_cmp(&r_val)? == Ordering::Greater,
        Op::Ge => l_val.try_cmp(&r_val)? != Ordering::Less,
        Op::Lt => l_val.try_cmp(&r_val)? == Ordering::Less,
        Op::Le => l_val.try_cmp(&r_val)? != Ordering::Greater,
    };
    Ok(Value::Bool(result))
}

/// Renders `nodes` into `out`, left to right.
pub(crate) fn render(
    nodes: &[AstNode],
    ctx: &Context,
    functions: &Functions,
    out: &mut String,
) -> Result<()> {
    for node in nodes {
        match node {
            AstNode::Text(t) => out.push_str(t),
            AstNode::Expr(e) => out.push_str(&eval(e, ctx, functions)?.to_string()),
            AstNode::If {
                branches,
                else_branch,
            } => {
                let mut taken = else_branch;
                for branch in branches {
                    if eval(&branch.test, ctx, functions)?.is_truthy() {
                        taken = &branch.body;
                        break;
                    }
                }
                render(taken, ctx, functions, out)?;
            }
            AstNode::For {
                item,
                collection,
                body,
            } => match eval(collection, ctx, functions)? {
                Value::List(values) => {
                    for v in &values {
                        render(body, &ctx.with(item, v), functions, out)?;
                    }
                }
                Value::Map(map) => {
                    for key in map.into_keys() {
                        let key = Value::Str(key);
                        render(body, &ctx.with(item, &key), functions, out)?;
                    }
                }
                _ => {
                    return Err(TemplateError::NotIterable {
                        expression: collection.source.clone(),
                    });
                }
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpl::expr::parse_expr;
    use crate::tpl::parser::parse_template;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn vars(json: serde_json::Value) -> BTreeMap<String, Value> {
        match Value::from(json) {
            Value::Map(m) => m,
            other => panic!("Expected map, got {:?}", other),
        }
    }

    fn eval_str(source: &str, root: &BTreeMap<String, Value>) -> Result<Value> {
        eval(&parse_expr(source), &Context::new(root), &Functions::new())
    }

    fn render_str(template: &str, root: &BTreeMap<String, Value>) -> Result<String> {
        let nodes = parse_template(template)?;
        let mut out = String::new();
        render(&nodes, &Context::new(root), &Functions::new(), &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_eval_compare() {
        let root = vars(json!({"var:a": 10, "var:s": "abc", "var:f": 2.5}));

        for (source, expected) in [
            ("var:a == 10", true),
            ("var:a = 10.0", true),
            ("var:a === 11", false),
            ("var:a != 10", false),
            ("var:a <> 9", true),
            ("var:a > 5", true),
            ("var:a >= 10", true),
            ("var:a < 10", false),
            ("var:a <= 10", true),
            ("var:f < var:a", true),
            (r#"var:s == "abc""#, true),
            (r#"var:s < "abd""#, true),
            (r#"var:s == 3"#, false),
            ("var:missing:0 < 1", true),
        ] {
            assert_eq!(
                eval_str(source, &root).unwrap(),
                Value::Bool(expected),
                "{}",
                source
            );
        }
    }

    #[test]
    fn test_compare_errors_carry_expression() {
        let root = vars(json!({"var:s": "abc"}));

        match eval_str("var:s > 3", &root) {
            Err(TemplateError::Comparison { expression, source }) => {
                assert_eq!(expression, "var:s > 3");
                assert!(matches!(*source, TemplateError::Incomparable { .. }));
            }
            other => panic!("Expected Comparison error, got {:?}", other),
        }

        match eval_str("var:nope == 1", &root) {
            Err(TemplateError::Comparison { expression, source }) => {
                assert_eq!(expression, "var:nope == 1");
                assert!(matches!(*source, TemplateError::Unresolved { .. }));
            }
            other => panic!("Expected Comparison error, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_var_and_default() {
        let root = vars(json!({"var:user": {"name": "Ann", "tags": ["x"]}}));
        assert_eq!(eval_str("var:user.name", &root).unwrap(), Value::from("Ann"));
        assert_eq!(
            eval_str(r#"var:user.email:"none""#, &root).unwrap(),
            Value::from("none")
        );
        assert_eq!(
            eval_str("var:user.name:null", &root).unwrap(),
            Value::from("Ann")
        );
        match eval_str("var:user.email", &root) {
            Err(TemplateError::Unresolved { expression }) => {
                assert_eq!(expression, "var:user.email")
            }
            other => panic!("Expected Unresolved, got {:?}", other),
        }
        // Unprefixed names never see caller variables.
        assert!(eval_str("user", &root).is_err());
    }

    #[test]
    fn test_eval_call() {
        let root = vars(json!({"var:html": "<b>"}));
        assert_eq!(
            eval_str("Escape(var:html)", &root).unwrap(),
            Value::from("&lt;b&gt;")
        );
        assert!(matches!(
            eval_str("Shout(var:html)", &root),
            Err(TemplateError::UnknownFunction { name, .. }) if name == "Shout"
        ));
        assert!(matches!(
            eval_str("Escape(var:none)", &root),
            Err(TemplateError::Unresolved { .. })
        ));
    }

    #[test]
    fn test_eval_unsupported() {
        let root = BTreeMap::new();
        match eval_str("1 + 1", &root) {
            Err(TemplateError::Unimplemented(source)) => assert_eq!(source, "1 + 1"),
            other => panic!("Expected Unimplemented, got {:?}", other),
        }
    }

    #[test]
    fn test_render_for_binds_item_per_iteration() {
        let root = vars(json!({
            "var:people": [{"name": "A", "langs": ["fr", "en"]}, {"name": "B", "langs": []}]
        }));
        let out = render_str(
            "{%for p in var:people%}{{p.name}}:{%for l in p.langs%}[{{l}}]{%endfor%};{%endfor%}",
            &root,
        )
        .unwrap();
        assert_eq!(out, "A:[fr][en];B:;");
    }

    #[test]
    fn test_render_for_over_map_keys() {
        let root = vars(json!({"var:m": {"b": 1, "a": 2}}));
        let out = render_str("{%for k in var:m%}{{k}}={{var:m.b}} {%endfor%}", &root).unwrap();
        assert_eq!(out, "a=1 b=1 ");
    }

    #[test]
    fn test_render_for_not_iterable() {
        let root = vars(json!({"var:n": 3}));
        assert!(matches!(
            render_str("{%for x in var:n%}{%endfor%}", &root),
            Err(TemplateError::NotIterable { expression }) if expression == "var:n"
        ));
    }

    #[test]
    fn test_render_if_truthiness() {
        let root = vars(json!({"var:empty": [], "var:name": "x"}));
        assert_eq!(
            render_str("{%if var:empty%}a{%elseif var:name%}b{%else%}c{%endif%}", &root).unwrap(),
            "b"
        );
        assert_eq!(render_str("{%if var:empty%}a{%endif%}", &root).unwrap(), "");
    }

    #[test]
    fn test_render_long_elseif_chain() {
        let root = vars(json!({"var:n": 2999}));
        let tpl = format!(
            "{{%if var:n == -1%}}none{}{{%else%}}other{{%endif%}}",
            (0..3000)
                .map(|i| format!("{{%elseif var:n == {}%}}{}", i, i))
                .collect::<String>()
        );
        assert_eq!(render_str(&tpl, &root).unwrap(), "2999");
    }

    #[test]
    fn test_untaken_branch_is_not_evaluated() {
        let root = BTreeMap::new();
        assert_eq!(
            render_str("{%if false%}{{ var:missing }}{%else%}ok{%endif%}", &root).unwrap(),
            "ok"
        );
    }
}
