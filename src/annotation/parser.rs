//! Recursive-descent parser for struct blocks and field annotations

use super::ast::{Annotation, Clause, ClauseBody, FieldDecl, Literal, StructBlock};
use super::lexer::{Token, TokenKind};

/// Qualifiers that may precede a field type and carry no schema meaning
const QUALIFIERS: &[&str] = &["highp", "mediump", "lowp", "const", "flat", "smooth"];

/// Largest accepted array length; longer arrays are skipped
pub const MAX_ARRAY_LENGTH: usize = 4096;

/// Problem that aborts a single field declaration
#[derive(Debug, Clone, PartialEq)]
struct FieldIssue {
    line: usize,
    message: String,
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_nth(&self, n: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn current_line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(0, |t| t.line)
    }

    fn issue(&self, message: impl Into<String>) -> FieldIssue {
        FieldIssue {
            line: self.current_line(),
            message: message.into(),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<&'a str, FieldIssue> {
        match self.peek_kind() {
            Some(TokenKind::Ident(name)) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.issue(format!("expected {what}"))),
        }
    }

    fn parse_blocks(&mut self) -> Vec<StructBlock> {
        let mut blocks = Vec::new();

        while let Some(token) = self.peek() {
            let is_struct_header = matches!(&token.kind, TokenKind::Ident(kw) if kw == "struct")
                && matches!(self.peek_nth(1), Some(TokenKind::Ident(_)))
                && matches!(self.peek_nth(2), Some(TokenKind::LBrace));

            if !is_struct_header {
                self.pos += 1;
                continue;
            }

            let line = token.line;
            self.pos += 1;
            let name = match self.advance().map(|t| &t.kind) {
                Some(TokenKind::Ident(name)) => name.clone(),
                _ => continue,
            };
            self.pos += 1; // '{'

            let fields = self.parse_struct_body(&name);
            blocks.push(StructBlock { name, fields, line });
        }

        blocks
    }

    /// Parse fields up to and including the closing brace
    fn parse_struct_body(&mut self, struct_name: &str) -> Vec<FieldDecl> {
        let mut fields = Vec::new();

        loop {
            match self.peek_kind() {
                None => {
                    log::warn!("struct {struct_name}: missing closing brace");
                    break;
                }
                Some(TokenKind::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(TokenKind::LineComment(_) | TokenKind::Semicolon) => {
                    self.pos += 1;
                }
                Some(_) => match self.parse_field_decl() {
                    Ok(decls) => fields.extend(decls),
                    Err(issue) => {
                        log::warn!(
                            "struct {struct_name}, line {}: {}; field skipped",
                            issue.line,
                            issue.message
                        );
                        self.recover();
                    }
                },
            }
        }

        fields
    }

    /// Skip past the next `;`, or stop before a `}`
    fn recover(&mut self) {
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Semicolon => {
                    self.pos += 1;
                    self.skip_trailing_comment_on(self.tokens[self.pos - 1].line);
                    return;
                }
                TokenKind::RBrace => return,
                _ => self.pos += 1,
            }
        }
    }

    fn skip_trailing_comment_on(&mut self, line: usize) {
        if let Some(Token { kind: TokenKind::LineComment(_), line: l }) = self.peek() {
            if *l == line {
                self.pos += 1;
            }
        }
    }

    /// `<type> <name>[<n>]?, <name>... ; // annotation`
    fn parse_field_decl(&mut self) -> Result<Vec<FieldDecl>, FieldIssue> {
        while let Some(TokenKind::Ident(q)) = self.peek_kind() {
            if !QUALIFIERS.contains(&q.as_str()) {
                break;
            }
            self.pos += 1;
        }

        let type_name = self.expect_ident("a field type")?.to_string();
        let mut declarators = Vec::new();

        loop {
            let line = self.current_line();
            let name = self.expect_ident("a field name")?.to_string();
            let array_length = self.parse_array_suffix(&name)?;
            declarators.push((name, array_length, line));

            match self.advance().map(|t| &t.kind) {
                Some(TokenKind::Comma) => continue,
                Some(TokenKind::Semicolon) => break,
                _ => return Err(self.issue(format!("expected `;` after `{type_name}` field"))),
            }
        }

        let semicolon_line = self.tokens[self.pos - 1].line;
        let annotation = match self.peek() {
            Some(Token { kind: TokenKind::LineComment(text), line }) if *line == semicolon_line => {
                self.pos += 1;
                Some(parse_annotation(text))
            }
            _ => None,
        };

        Ok(declarators
            .into_iter()
            .filter_map(|(name, array_length, line)| {
                let array_length = match array_length {
                    ArraySuffix::None => None,
                    ArraySuffix::Length(n) => Some(n),
                    ArraySuffix::Invalid(reason) => {
                        log::warn!("line {line}: field `{name}` skipped: {reason}");
                        return None;
                    }
                };
                Some(FieldDecl {
                    type_name: type_name.clone(),
                    name,
                    array_length,
                    annotation: annotation.clone(),
                    line,
                })
            })
            .collect())
    }

    fn parse_array_suffix(&mut self, name: &str) -> Result<ArraySuffix, FieldIssue> {
        if self.peek_kind() != Some(&TokenKind::LBracket) {
            return Ok(ArraySuffix::None);
        }
        self.pos += 1;

        let suffix = match self.advance().map(|t| &t.kind) {
            Some(TokenKind::Number(text)) => {
                match text.trim_end_matches(['u', 'U']).parse::<usize>() {
                    Ok(0) => ArraySuffix::Invalid("array length must be at least 1".into()),
                    Ok(n) if n <= MAX_ARRAY_LENGTH => ArraySuffix::Length(n),
                    Ok(n) => ArraySuffix::Invalid(format!(
                        "array length {n} exceeds the limit of {MAX_ARRAY_LENGTH}"
                    )),
                    Err(e) if matches!(e.kind(), std::num::IntErrorKind::PosOverflow) => {
                        ArraySuffix::Invalid(format!(
                            "array length `{text}` exceeds the limit of {MAX_ARRAY_LENGTH}"
                        ))
                    }
                    Err(_) => ArraySuffix::Invalid(format!("array length `{text}` is not an integer")),
                }
            }
            Some(TokenKind::Ident(constant)) => {
                ArraySuffix::Invalid(format!("array length `{constant}` is not a literal"))
            }
            _ => return Err(self.issue(format!("malformed array length for `{name}`"))),
        };

        match self.advance().map(|t| &t.kind) {
            Some(TokenKind::RBracket) => Ok(suffix),
            _ => Err(self.issue(format!("expected `]` after array length of `{name}`"))),
        }
    }
}

enum ArraySuffix {
    None,
    Length(usize),
    Invalid(String),
}

/// Parse every `struct Name { ... }` block in token order
pub fn parse_struct_blocks(tokens: &[Token]) -> Vec<StructBlock> {
    Parser { tokens, pos: 0 }.parse_blocks()
}

// ============================================================================
// Annotation micro-language
// ============================================================================

struct AnnotationScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> AnnotationScanner<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_separators(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        self.pos += rest.len() - trimmed.len();
    }

    fn take_word(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn skip_token(&mut self) {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_whitespace())
            .map_or(rest.len(), |(i, _)| i);
        // always make progress
        let end = if end == 0 { rest.chars().next().map_or(0, char::len_utf8) } else { end };
        self.pos += end;
    }

    fn next_clause(&mut self) -> Option<Clause> {
        loop {
            self.skip_separators();
            if self.rest().is_empty() {
                return None;
            }

            let key = self.take_word();
            let after_key = self.rest().trim_start();
            if key.is_empty() || !after_key.starts_with(':') {
                self.skip_token();
                continue;
            }
            self.pos = self.text.len() - after_key.len() + 1;

            let value_start = self.rest().trim_start();
            self.pos = self.text.len() - value_start.len();

            let raw = if let Some(inner) = value_start.strip_prefix('(') {
                match inner.find(')') {
                    Some(close) => {
                        self.pos += close + 2;
                        &inner[..close]
                    }
                    None => {
                        self.pos = self.text.len();
                        return Some(Clause {
                            key: key.to_string(),
                            body: ClauseBody::Malformed(format!("unterminated `({inner}`")),
                        });
                    }
                }
            } else {
                let end = value_start
                    .find(|c: char| c.is_whitespace() || c == ',')
                    .unwrap_or(value_start.len());
                self.pos += end;
                &value_start[..end]
            };

            let body = if key == "dropdown" {
                parse_labels(raw)
            } else {
                parse_literals(raw)
            };
            return Some(Clause { key: key.to_string(), body });
        }
    }
}

fn parse_labels(raw: &str) -> ClauseBody {
    let labels: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        ClauseBody::Malformed(raw.to_string())
    } else {
        ClauseBody::Labels(labels)
    }
}

fn parse_literal(text: &str) -> Option<Literal> {
    match text {
        "true" => return Some(Literal::Bool(true)),
        "false" => return Some(Literal::Bool(false)),
        _ => {}
    }
    let numeric = text.strip_suffix(['f', 'F', 'u', 'U']).unwrap_or(text);
    numeric
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Literal::Number)
}

fn parse_literals(raw: &str) -> ClauseBody {
    if raw.trim().is_empty() {
        return ClauseBody::Malformed(raw.to_string());
    }
    raw.split(',')
        .map(|item| parse_literal(item.trim()))
        .collect::<Option<Vec<_>>>()
        .map_or_else(|| ClauseBody::Malformed(raw.to_string()), ClauseBody::Values)
}

/// Parse the text of a trailing `//` comment into clauses. Words that are
/// not followed by `:` are ignored, so prose comments yield no clauses.
pub fn parse_annotation(text: &str) -> Annotation {
    let mut scanner = AnnotationScanner { text, pos: 0 };
    Annotation {
        clauses: std::iter::from_fn(|| scanner.next_clause()).collect(),
    }
}
