use crate::Result;
use crate::error::TemplateError;

const EXPR_OPEN: &str = "{{";
const EXPR_CLOSE: &str = "}}";
const STMT_OPEN: &str = "{%";
const STMT_CLOSE: &str = "%}";
const DELIMITERS: [&str; 4] = [EXPR_OPEN, EXPR_CLOSE, STMT_OPEN, STMT_CLOSE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal markup, copied to the output untouched.
    Content,
    /// `{{ ... }}`
    Expression,
    /// `{% ... %}`
    Statement,
}

/// A classified slice of the template source.
///
/// `raw` keeps the delimiters, so concatenating the `raw` slices of every
/// token yields the original template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub raw: &'a str,
    /// Byte offset of `raw` in the template.
    pub offset: usize,
    /// 1-based line on which `raw` starts.
    pub line: usize,
}

impl<'a> Token<'a> {
    /// The tag body without delimiters and surrounding whitespace. For
    /// content tokens this is the raw text.
    pub fn body(&self) -> &'a str {
        match self.kind {
            TokenKind::Content => self.raw,
            TokenKind::Expression | TokenKind::Statement => self.raw[2..self.raw.len() - 2].trim(),
        }
    }
}

/// Lazy tokenizer over a template string. Yields at most one error, then
/// stops.
pub struct Tokenizer<'a> {
    /// The template being split.
    template: &'a str,
    /// Byte offset of the next unread character.
    pos: usize,
    /// Line number at `pos`, kept up to date as tokens are consumed.
    line: usize,
    /// Set once an error has been yielded.
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            pos: 0,
            line: 1,
            failed: false,
        }
    }

    /// 1-based line number of a byte offset in the template.
    pub fn line_at(&self, offset: usize) -> usize {
        line_at(self.template, offset)
    }

    fn unmatched(&mut self, delimiter: &str, offset: usize) -> TemplateError {
        self.failed = true;
        TemplateError::UnmatchedDelimiter {
            delimiter: delimiter.to_string(),
            line: line_at(self.template, offset),
        }
    }

    /// Emits `raw` as the next token and moves the cursor past it.
    fn advance(&mut self, kind: TokenKind, raw: &'a str) -> Token<'a> {
        let token = Token {
            kind,
            raw,
            offset: self.pos,
            line: self.line,
        };
        self.pos += raw.len();
        self.line += raw.matches('\n').count();
        token
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        let template = self.template;
        let start = self.pos;
        let remaining = &template[start..];
        if remaining.is_empty() {
            return Ok(None);
        }

        let next_tag = find_tag_start(remaining);

        match next_tag {
            Some(0) => {
                let (kind, close) = if remaining.starts_with(EXPR_OPEN) {
                    (TokenKind::Expression, EXPR_CLOSE)
                } else {
                    (TokenKind::Statement, STMT_CLOSE)
                };
                let Some(close_idx) = remaining[2..].find(close) else {
                    return Err(self.unmatched(&remaining[..2], start));
                };
                let body = &remaining[2..2 + close_idx];
                if let Some((idx, delimiter)) = find_delimiter(body) {
                    return Err(self.unmatched(delimiter, start + 2 + idx));
                }
                let end = 2 + close_idx + close.len();
                Ok(Some(self.advance(kind, &remaining[..end])))
            }
            next => {
                let end = next.unwrap_or(remaining.len());
                let text = &remaining[..end];
                if let Some((idx, delimiter)) = find_delimiter(text) {
                    return Err(self.unmatched(delimiter, start + idx));
                }
                Ok(Some(self.advance(TokenKind::Content, text)))
            }
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.next_token().transpose()
    }
}

/// Splits a whole template into tokens, failing on the first lonely
/// delimiter.
pub fn tokenize(template: &str) -> Result<Vec<Token<'_>>> {
    Tokenizer::new(template).collect()
}

/// Byte index of the first `{{` or `{%` in `text`, found in one forward
/// pass so scanning never goes past the next tag.
fn find_tag_start(text: &str) -> Option<usize> {
    text.as_bytes()
        .windows(2)
        .position(|w| w[0] == b'{' && (w[1] == b'{' || w[1] == b'%'))
}

/// Earliest delimiter found in `text`, if any.
fn find_delimiter(text: &str) -> Option<(usize, &'static str)> {
    DELIMITERS
        .iter()
        .filter_map(|d| text.find(d).map(|idx| (idx, *d)))
        .min_by_key(|(idx, _)| *idx)
}

pub(crate) fn line_at(template: &str, offset: usize) -> usize {
    template[..offset.min(template.len())].matches('\n').count() + 1
}
