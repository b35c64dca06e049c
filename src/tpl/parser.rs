use crate::Result;
use crate::error::TemplateError;
use crate::tpl::ast::{AstNode, Branch};
use crate::tpl::expr::{is_identifier, parse_expr};
use crate::tpl::lexer::{TokenKind, Tokenizer};
use log::trace;

/// How many `if`/`for` blocks may be open at once. Parsing, rendering and
/// dropping a tree all recurse once per level.
pub const MAX_NESTING: usize = 128;

/// The block a sequence of sibling nodes must be closed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// The template itself; closed by the end of input.
    Top,
    /// `if`; closed by `endif`, split by `else`/`elseif`.
    If,
    /// `for`; closed by `endfor`.
    For,
}

impl Block {
    fn name(self) -> &'static str {
        match self {
            Block::Top => "",
            Block::If => "if",
            Block::For => "for",
        }
    }
}

/// Why a block stopped.
enum BlockEnd<'a> {
    /// End of input at top level.
    Eof,
    /// The expected `end<block>` statement.
    End,
    /// `else`, at the given line.
    Else(usize),
    /// `elseif <cond>`, at the given line.
    ElseIf(&'a str, usize),
}

/// A recursive-descent parser over a lazy token stream.
///
/// Each nested block is parsed by a recursive call that consumes exactly
/// the tokens up to and including the statement that closes it.
struct Parser<'a> {
    /// Source of tokens; pulled one at a time, never rewound.
    tokens: Tokenizer<'a>,
    /// Number of `if`/`for` blocks currently open.
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(template: &'a str) -> Self {
        Self {
            tokens: Tokenizer::new(template),
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<AstNode>> {
        let (nodes, _) = self.parse_block(Block::Top)?;
        Ok(nodes)
    }

    /// Parses siblings until the statement closing `open` (or the end of
    /// input at top level).
    fn parse_block(&mut self, open: Block) -> Result<(Vec<AstNode>, BlockEnd<'a>)> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.next() {
            let token = token?;
            match token.kind {
                TokenKind::Content => nodes.push(AstNode::Text(token.raw.to_string())),
                TokenKind::Expression => nodes.push(AstNode::Expr(parse_expr(token.body()))),
                TokenKind::Statement => {
                    let body = token.body();
                    let line = token.line;
                    trace!("statement '{}' at line {}", body, line);

                    let (keyword, rest) = body
                        .split_once(char::is_whitespace)
                        .map_or((body, ""), |(k, r)| (k, r.trim()));

                    match keyword {
                        "if" | "for" => {
                            if self.depth == MAX_NESTING {
                                return Err(TemplateError::syntax(
                                    format!("blocks nested deeper than {} levels", MAX_NESTING),
                                    line,
                                ));
                            }
                            self.depth += 1;
                            let node = if keyword == "if" {
                                require_operand(keyword, rest, line)
                                    .and_then(|cond| self.parse_if(cond, line))
                            } else {
                                self.parse_for(body, rest, line)
                            };
                            self.depth -= 1;
                            nodes.push(node?);
                        }
                        "else" | "elseif" if open != Block::If => {
                            return Err(TemplateError::syntax(
                                format!("'{}' without an open 'if' block", keyword),
                                line,
                            ));
                        }
                        "else" => {
                            if !rest.is_empty() {
                                return Err(TemplateError::syntax(
                                    format!("unexpected text after 'else': '{}'", rest),
                                    line,
                                ));
                            }
                            return Ok((nodes, BlockEnd::Else(line)));
                        }
                        "elseif" => {
                            let cond = require_operand(keyword, rest, line)?;
                            return Ok((nodes, BlockEnd::ElseIf(cond, line)));
                        }
                        _ if keyword.starts_with("end") && rest.is_empty() => {
                            let name = &keyword[3..];
                            if open != Block::Top && name == open.name() {
                                return Ok((nodes, BlockEnd::End));
                            }
                            let message = match open {
                                Block::Top => format!("'{}' without an open block", keyword),
                                _ => format!("expected 'end{}', found '{}'", open.name(), keyword),
                            };
                            return Err(TemplateError::syntax(message, line));
                        }
                        _ => {
                            return Err(TemplateError::syntax(
                                format!("unknown statement '{}'", body),
                                line,
                            ));
                        }
                    }
                }
            }
        }

        match open {
            Block::Top => Ok((nodes, BlockEnd::Eof)),
            _ => Err(TemplateError::syntax(
                format!("missing 'end{}'", open.name()),
                self.tokens.line_at(usize::MAX),
            )),
        }
    }

    /// Parses an `if` chain whose opening statement has been consumed.
    /// Each `elseif` adds an arm to the same node, so a long chain costs no
    /// extra recursion; the single `endif` closes the whole chain.
    fn parse_if(&mut self, cond: &str, line: usize) -> Result<AstNode> {
        trace!("if '{}' opened at line {}", cond, line);
        let mut branches = Vec::new();
        let mut test = parse_expr(cond);

        loop {
            let (body, end) = self.parse_block(Block::If)?;
            branches.push(Branch { test, body });

            match end {
                BlockEnd::ElseIf(cond, _) => test = parse_expr(cond),
                BlockEnd::End | BlockEnd::Eof => {
                    return Ok(AstNode::If {
                        branches,
                        else_branch: Vec::new(),
                    });
                }
                BlockEnd::Else(_) => {
                    let (else_branch, end) = self.parse_block(Block::If)?;
                    return match end {
                        BlockEnd::Else(line) | BlockEnd::ElseIf(_, line) => {
                            Err(TemplateError::syntax(
                                "'else' or 'elseif' after the final 'else' of an 'if' block",
                                line,
                            ))
                        }
                        BlockEnd::End | BlockEnd::Eof => Ok(AstNode::If {
                            branches,
                            else_branch,
                        }),
                    };
                }
            }
        }
    }

    /// Parses `for <item> in <expr>` and its body up to `endfor`.
    fn parse_for(&mut self, body: &str, rest: &str, line: usize) -> Result<AstNode> {
        let malformed = || {
            TemplateError::syntax(
                format!("malformed statement '{}': expected 'for <name> in <expr>'", body),
                line,
            )
        };

        let (item, tail) = rest.split_once(char::is_whitespace).ok_or_else(malformed)?;
        let collection = tail
            .trim_start()
            .strip_prefix("in")
            .filter(|c| c.starts_with(char::is_whitespace))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(malformed)?;
        if !is_identifier(item) {
            return Err(TemplateError::syntax(
                format!("invalid loop variable '{}'", item),
                line,
            ));
        }

        let (body, _) = self.parse_block(Block::For)?;
        Ok(AstNode::For {
            item: item.to_string(),
            collection: parse_expr(collection),
            body,
        })
    }
}

fn require_operand<'s>(keyword: &str, rest: &'s str, line: usize) -> Result<&'s str> {
    if rest.is_empty() {
        return Err(TemplateError::syntax(
            format!("'{}' requires a condition", keyword),
            line,
        ));
    }
    Ok(rest)
}

/// Main entry point: parse a template string into an AST.
pub fn parse_template(template: &str) -> Result<Vec<AstNode>> {
    Parser::new(template).parse()
}
