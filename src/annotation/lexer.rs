//! Tokenizer for effect source text
//!
//! Produces just enough structure to find struct blocks and their field
//! declarations. Block comments and preprocessor lines are dropped; line
//! comments are kept as tokens because a trailing `//` comment carries a
//! field's metadata.

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// Raw numeric literal text (`8`, `0.5`, `1e-3`, `2u`)
    Number(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Semicolon,
    Comma,
    /// Text following `//`, up to the end of the line
    LineComment(String),
    /// Any other single character (operators and the like)
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line
    pub line: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
            at_line_start: true,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, '\n')) = next {
            self.line += 1;
            self.at_line_start = true;
        }
        next
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// Byte offset of the next character (or end of input)
    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.src.len(), |(i, _)| *i)
    }

    fn skip_to_line_end(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Consume `/* ... */`. An unterminated comment runs to end of input.
    fn skip_block_comment(&mut self) {
        let mut prev = '\0';
        while let Some((_, c)) = self.bump() {
            if prev == '*' && c == '/' {
                return;
            }
            prev = c;
        }
    }

    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'a str {
        while self.peek_char().is_some_and(&pred) {
            self.bump();
        }
        let end = self.offset();
        &self.src[start..end]
    }

    fn read_number(&mut self, start: usize) -> &'a str {
        loop {
            match self.peek_char() {
                Some(c) if c.is_ascii_alphanumeric() || c == '.' => {
                    self.bump();
                    // exponent sign
                    if matches!(c, 'e' | 'E') && matches!(self.peek_char(), Some('+' | '-')) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let end = self.offset();
        &self.src[start..end]
    }

    fn next_token(&mut self) -> Option<Token> {
        loop {
            let (start, c) = *self.chars.peek()?;

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c == '#' && self.at_line_start {
                self.skip_to_line_end();
                continue;
            }
            self.at_line_start = false;

            let line = self.line;
            self.bump();

            let kind = match c {
                '/' if self.peek_char() == Some('/') => {
                    self.bump();
                    let body_start = self.offset();
                    self.skip_to_line_end();
                    let end = self.offset();
                    TokenKind::LineComment(self.src[body_start..end].trim().to_string())
                }
                '/' if self.peek_char() == Some('*') => {
                    self.bump();
                    self.skip_block_comment();
                    continue;
                }
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ';' => TokenKind::Semicolon,
                ',' => TokenKind::Comma,
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let text = self.take_while(start, |c| c.is_ascii_alphanumeric() || c == '_');
                    TokenKind::Ident(text.to_string())
                }
                c if c.is_ascii_digit() => TokenKind::Number(self.read_number(start).to_string()),
                '.' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => {
                    TokenKind::Number(self.read_number(start).to_string())
                }
                other => TokenKind::Punct(other),
            };

            return Some(Token { kind, line });
        }
    }
}

/// Split source text into tokens
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(src);
    std::iter::from_fn(|| lexer.next_token()).collect()
}
