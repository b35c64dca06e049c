use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unmatched delimiter '{delimiter}' at line {line}")]
    UnmatchedDelimiter { delimiter: String, line: usize },
    #[error("Template syntax error at line {line}: {message}")]
    Syntax { message: String, line: usize },
    #[error("Cannot resolve expression '{expression}'")]
    Unresolved { expression: String },
    #[error("Cannot evaluate comparison '{expression}': {source}")]
    Comparison {
        expression: String,
        #[source]
        source: Box<TemplateError>,
    },
    #[error("Cannot order {left} against {right}")]
    Incomparable { left: String, right: String },
    #[error("Unsupported function '{name}' in '{expression}'")]
    UnknownFunction { name: String, expression: String },
    #[error("Don't know how to evaluate expression '{0}'")]
    Unimplemented(String),
    #[error("Expression '{expression}' is not iterable")]
    NotIterable { expression: String },
    #[error("Template variables must be a map, got {0}")]
    InvalidVariables(String),
    #[error("Invalid function name: {0}")]
    InvalidFunctionName(String),
    #[error("Serialization Error: {0}")]
    SerializationError(String),
}

impl TemplateError {
    /// True for errors raised while tokenizing or parsing, i.e. the ones
    /// `check_syntax` can report without any variables.
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            TemplateError::UnmatchedDelimiter { .. } | TemplateError::Syntax { .. }
        )
    }

    pub(crate) fn syntax(message: impl Into<String>, line: usize) -> Self {
        TemplateError::Syntax {
            message: message.into(),
            line,
        }
    }
}

impl serde::ser::Error for TemplateError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        TemplateError::SerializationError(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_classification() {
        assert!(TemplateError::syntax("missing endif", 1).is_syntax_error());
        assert!(
            TemplateError::UnmatchedDelimiter {
                delimiter: "{{".to_string(),
                line: 3
            }
            .is_syntax_error()
        );
        assert!(!TemplateError::Unimplemented("a b".to_string()).is_syntax_error());
    }

    #[test]
    fn test_comparison_keeps_source() {
        use std::error::Error as _;

        let err = TemplateError::Comparison {
            expression: "var:x > 3".to_string(),
            source: Box::new(TemplateError::Unresolved {
                expression: "var:x".to_string(),
            }),
        };
        assert!(err.to_string().contains("var:x > 3"));
        assert!(err.source().is_some());
    }
}
