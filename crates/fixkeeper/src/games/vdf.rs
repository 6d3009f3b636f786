//! Reader for Valve's text KeyValues format (`.vdf` / `.acf`)
//!
//! Only what library manifests use: quoted or bare strings, nested blocks,
//! `//` comments and backslash escapes. Conditionals (`[$WIN32]`) are skipped.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VdfError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unexpected '{0}' at byte {1}")]
    Unexpected(char, usize),
}

/// A KeyValues node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfValue {
    Str(String),
    Block(Vec<(String, VdfValue)>),
}

impl VdfValue {
    /// Child with a key matching case-insensitively, as Steam does
    pub fn get(&self, key: &str) -> Option<&VdfValue> {
        match self {
            VdfValue::Block(entries) => entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
            VdfValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfValue::Str(s) => Some(s),
            VdfValue::Block(_) => None,
        }
    }

    pub fn entries(&self) -> &[(String, VdfValue)] {
        match self {
            VdfValue::Block(entries) => entries,
            VdfValue::Str(_) => &[],
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Str(String),
    Open,
    Close,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { chars: input.char_indices().peekable() }
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else if c == '/' {
                let mut ahead = self.chars.clone();
                ahead.next();
                if matches!(ahead.peek(), Some((_, '/'))) {
                    for (_, c) in self.chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                } else {
                    return;
                }
            } else if c == '[' {
                // Platform conditional, ignored
                for (_, c) in self.chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                }
            } else {
                return;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, VdfError> {
        self.skip_trivia();
        let Some((_, c)) = self.chars.next() else {
            return Ok(None);
        };

        match c {
            '{' => Ok(Some(Token::Open)),
            '}' => Ok(Some(Token::Close)),
            '"' => {
                let mut value = String::new();
                loop {
                    match self.chars.next() {
                        None => return Err(VdfError::UnexpectedEof),
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match self.chars.next() {
                            None => return Err(VdfError::UnexpectedEof),
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                        },
                        Some((_, other)) => value.push(other),
                    }
                }
                Ok(Some(Token::Str(value)))
            }
            first => {
                let mut value = String::from(first);
                while let Some(&(_, c)) = self.chars.peek() {
                    if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                        break;
                    }
                    value.push(c);
                    self.chars.next();
                }
                Ok(Some(Token::Str(value)))
            }
        }
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(0)
    }
}

/// Parse a KeyValues document into its top-level block
pub fn parse(input: &str) -> Result<VdfValue, VdfError> {
    let mut lexer = Lexer::new(input);
    let entries = parse_entries(&mut lexer, false)?;
    Ok(VdfValue::Block(entries))
}

fn parse_entries(lexer: &mut Lexer<'_>, nested: bool) -> Result<Vec<(String, VdfValue)>, VdfError> {
    let mut entries = Vec::new();

    loop {
        let position = lexer.position();
        let key = match lexer.next_token()? {
            Some(Token::Str(key)) => key,
            Some(Token::Close) if nested => return Ok(entries),
            Some(Token::Close) => return Err(VdfError::Unexpected('}', position)),
            Some(Token::Open) => return Err(VdfError::Unexpected('{', position)),
            None if nested => return Err(VdfError::UnexpectedEof),
            None => return Ok(entries),
        };

        let position = lexer.position();
        let value = match lexer.next_token()? {
            Some(Token::Str(value)) => VdfValue::Str(value),
            Some(Token::Open) => VdfValue::Block(parse_entries(lexer, true)?),
            Some(Token::Close) => return Err(VdfError::Unexpected('}', position)),
            None => return Err(VdfError::UnexpectedEof),
        };
        entries.push((key, value));
    }
}
