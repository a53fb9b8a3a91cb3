//! Lexer for query text, aware of string literals, quoted names and comments.
//!
//! It only classifies spans; it does not validate the query. Unterminated
//! literals and comments run to the end of the input.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword.
    Word,
    /// Backtick-quoted name.
    QuotedName,
    StringLiteral,
    Parameter,
    Number,
    Punct(char),
    Whitespace,
    Comment,
}

/// Byte span of one token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_word(&self, source: &str, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text(source).eq_ignore_ascii_case(word)
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let kind = match c {
            c if c.is_whitespace() => {
                while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
                TokenKind::Whitespace
            }
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                while chars.next_if(|(_, c)| *c != '\n').is_some() {}
                TokenKind::Comment
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = '\0';
                for (_, c) in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                TokenKind::Comment
            }
            '\'' | '"' => {
                let quote = c;
                let mut escaped = false;
                for (_, c) in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == quote {
                        break;
                    }
                }
                TokenKind::StringLiteral
            }
            '`' => {
                // A doubled backtick is an escaped backtick inside the name.
                loop {
                    match chars.next() {
                        Some((_, '`')) => {
                            if chars.next_if(|(_, c)| *c == '`').is_none() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                TokenKind::QuotedName
            }
            '$' => {
                if chars.next_if(|(_, c)| *c == '`').is_some() {
                    while let Some((_, c)) = chars.next() {
                        if c == '`' {
                            break;
                        }
                    }
                } else {
                    while chars.next_if(|(_, c)| is_word_continue(*c)).is_some() {}
                }
                TokenKind::Parameter
            }
            c if c.is_ascii_digit() => {
                while chars.next_if(|(_, c)| c.is_ascii_alphanumeric()).is_some() {}
                TokenKind::Number
            }
            c if is_word_start(c) => {
                while chars.next_if(|(_, c)| is_word_continue(*c)).is_some() {}
                TokenKind::Word
            }
            other => TokenKind::Punct(other),
        };

        let end = chars.peek().map(|(i, _)| *i).unwrap_or(source.len());
        tokens.push(Token { kind, start, end });
    }

    tokens
}
