use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// A pre-classified expression. Classification is purely syntactic: text
/// that matches no rule is kept as `Unsupported` and only fails when
/// evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `Name(arg)`
    Call { name: String, arg: Box<Expression> },
    /// `[var:]a.b.c[:default]`; `path[0]` carries the namespace prefix.
    Var {
        path: Vec<String>,
        default: Option<Value>,
    },
    /// `lhs OP rhs`
    Compare(Op, Box<Expression>, Box<Expression>),
    Literal(Value),
    Unsupported,
}

/// An expression together with its source text, kept for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub source: String,
    pub expr: Expr,
}

/// One `if` or `elseif` arm of a conditional.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub test: Expression,
    pub body: Vec<AstNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Text(String),
    Expr(Expression),
    /// `if` followed by any number of `elseif`s, kept flat: the first arm
    /// whose test is truthy is rendered, otherwise `else_branch`.
    If {
        branches: Vec<Branch>,
        else_branch: Vec<AstNode>,
    },
    For {
        item: String,
        collection: Expression,
        body: Vec<AstNode>,
    },
}
