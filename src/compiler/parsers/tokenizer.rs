//! Tokenizer for the accepted Go subset.
//!
//! Newlines are turned into semicolon tokens following Go's automatic
//! semicolon insertion rule, so the parser only ever sees `;` terminators.
//! Line comments stay in the stream (the parser collects contiguous comment
//! runs into doc blocks for pragma harvesting); block comments are skipped.

use crate::compiler::compiler_errors::{CompileError, ErrorLocation};
use crate::compiler::parsers::tokens::{CharPosition, TextLocation, Token, TokenKind};
use crate::return_syntax_error;
use crate::settings;

struct CharStream {
    chars: Vec<char>,
    pos: usize,
    byte_offset: usize,
    line: u32,
    column: u32,
}

impl CharStream {
    fn new(source_code: &str) -> CharStream {
        CharStream {
            chars: source_code.chars().collect(),
            pos: 0,
            byte_offset: 0,
            line: 1,
            column: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn next(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn position(&self) -> CharPosition {
        CharPosition {
            line: self.line,
            column: self.column,
        }
    }

    fn location_from(&self, start: CharPosition, byte_start: usize) -> TextLocation {
        TextLocation {
            start,
            end: self.position(),
            byte_start,
            byte_end: self.byte_offset,
        }
    }
}

pub fn tokenize(source_code: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens: Vec<Token> =
        Vec::with_capacity(source_code.len() / settings::SRC_TO_TOKEN_RATIO);
    let mut stream = CharStream::new(source_code);

    // Last non-comment token kind, for semicolon insertion.
    let mut last_significant: Option<TokenKind> = None;

    loop {
        let token = match next_token(&mut stream, &last_significant)? {
            Some(token) => token,
            None => break,
        };

        #[cfg(feature = "show_tokens")]
        eprintln!("{}", token.kind);

        if !matches!(token.kind, TokenKind::Comment(_)) {
            last_significant = Some(token.kind.clone());
        }
        tokens.push(token);
    }

    let eof_location = stream.location_from(stream.position(), stream.byte_offset);
    // A file that doesn't end in a newline still terminates its last statement
    if last_significant.as_ref().is_some_and(|t| t.ends_statement()) {
        tokens.push(Token::new(TokenKind::Semicolon, eof_location));
    }
    tokens.push(Token::new(TokenKind::Eof, eof_location));
    Ok(tokens)
}

fn next_token(
    stream: &mut CharStream,
    last_significant: &Option<TokenKind>,
) -> Result<Option<Token>, CompileError> {
    loop {
        let start = stream.position();
        let byte_start = stream.byte_offset;

        let ch = match stream.next() {
            Some(ch) => ch,
            None => return Ok(None),
        };

        if ch == '\n' {
            if last_significant.as_ref().is_some_and(|t| t.ends_statement()) {
                return Ok(Some(Token::new(
                    TokenKind::Semicolon,
                    stream.location_from(start, byte_start),
                )));
            }
            continue;
        }
        if ch.is_whitespace() {
            continue;
        }

        if ch == '/' {
            match stream.peek() {
                Some('/') => {
                    let mut text = String::from("/");
                    while let Some(c) = stream.peek() {
                        if c == '\n' {
                            break;
                        }
                        text.push(c);
                        stream.next();
                    }
                    return Ok(Some(Token::new(
                        TokenKind::Comment(text),
                        stream.location_from(start, byte_start),
                    )));
                }
                Some('*') => {
                    stream.next();
                    loop {
                        match stream.next() {
                            Some('*') if stream.peek() == Some('/') => {
                                stream.next();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return_syntax_error!(
                                    ErrorLocation::from_span(
                                        &stream.location_from(start, byte_start)
                                    ),
                                    "unterminated block comment"
                                );
                            }
                        }
                    }
                    continue;
                }
                _ => {
                    return Ok(Some(Token::new(
                        TokenKind::Slash,
                        stream.location_from(start, byte_start),
                    )));
                }
            }
        }

        if ch.is_ascii_digit() {
            return number_token(stream, ch, start, byte_start).map(Some);
        }
        if ch.is_alphabetic() || ch == '_' {
            let mut name = String::new();
            name.push(ch);
            while let Some(c) = stream.peek() {
                if c.is_alphanumeric() || c == '_' {
                    name.push(c);
                    stream.next();
                } else {
                    break;
                }
            }
            let kind = TokenKind::keyword(&name).unwrap_or(TokenKind::Ident(name));
            return Ok(Some(Token::new(kind, stream.location_from(start, byte_start))));
        }
        if ch == '\'' {
            return char_token(stream, start, byte_start).map(Some);
        }
        if ch == '"' {
            return string_token(stream, start, byte_start).map(Some);
        }

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => {
                if stream.peek() == Some('.') && stream.peek_second() == Some('.') {
                    stream.next();
                    stream.next();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            '+' => two_char(stream, '+', TokenKind::Inc, TokenKind::Add),
            '-' => two_char(stream, '-', TokenKind::Dec, TokenKind::Sub),
            '*' => TokenKind::Star,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '=' => two_char(stream, '=', TokenKind::Eq, TokenKind::Assign),
            ':' => {
                if stream.peek() == Some('=') {
                    stream.next();
                    TokenKind::Define
                } else {
                    return_syntax_error!(
                        ErrorLocation::from_span(&stream.location_from(start, byte_start)),
                        "unexpected character ':'"
                    );
                }
            }
            '!' => {
                if stream.peek() == Some('=') {
                    stream.next();
                    TokenKind::Ne
                } else {
                    return_syntax_error!(
                        ErrorLocation::from_span(&stream.location_from(start, byte_start)),
                        "unexpected character '!'"
                    );
                }
            }
            '<' => match stream.peek() {
                Some('<') => {
                    stream.next();
                    TokenKind::Shl
                }
                Some('=') => {
                    stream.next();
                    TokenKind::Le
                }
                _ => TokenKind::Lt,
            },
            '>' => match stream.peek() {
                Some('>') => {
                    stream.next();
                    TokenKind::Shr
                }
                Some('=') => {
                    stream.next();
                    TokenKind::Ge
                }
                _ => TokenKind::Gt,
            },
            '&' => two_char(stream, '&', TokenKind::LogAnd, TokenKind::Ampersand),
            '|' => two_char(stream, '|', TokenKind::LogOr, TokenKind::Pipe),
            _ => {
                return_syntax_error!(
                    ErrorLocation::from_span(&stream.location_from(start, byte_start)),
                    "unexpected character '{}'",
                    ch
                );
            }
        };
        return Ok(Some(Token::new(kind, stream.location_from(start, byte_start))));
    }
}

fn two_char(
    stream: &mut CharStream,
    second: char,
    double: TokenKind,
    single: TokenKind,
) -> TokenKind {
    if stream.peek() == Some(second) {
        stream.next();
        double
    } else {
        single
    }
}

fn number_token(
    stream: &mut CharStream,
    first: char,
    start: CharPosition,
    byte_start: usize,
) -> Result<Token, CompileError> {
    let mut text = String::new();
    text.push(first);

    // Hex literal
    if first == '0' && matches!(stream.peek(), Some('x') | Some('X')) {
        if let Some(marker) = stream.next() {
            text.push(marker);
        }
        while let Some(c) = stream.peek() {
            if c.is_ascii_hexdigit() {
                text.push(c);
                stream.next();
            } else {
                break;
            }
        }
        return Ok(Token::new(
            TokenKind::IntLiteral(text),
            stream.location_from(start, byte_start),
        ));
    }

    let mut is_float = false;
    while let Some(c) = stream.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            stream.next();
        } else if c == '.' && !is_float && stream.peek_second() != Some('.') {
            is_float = true;
            text.push(c);
            stream.next();
        } else {
            break;
        }
    }

    let kind = if is_float {
        TokenKind::FloatLiteral(text)
    } else {
        TokenKind::IntLiteral(text)
    };
    Ok(Token::new(kind, stream.location_from(start, byte_start)))
}

fn char_token(
    stream: &mut CharStream,
    start: CharPosition,
    byte_start: usize,
) -> Result<Token, CompileError> {
    let value = match stream.next() {
        Some('\\') => match stream.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('\'') => '\'',
            Some('\\') => '\\',
            Some('0') => '\0',
            _ => {
                return_syntax_error!(
                    ErrorLocation::from_span(&stream.location_from(start, byte_start)),
                    "unsupported escape in character literal"
                );
            }
        },
        Some(c) if c != '\'' => c,
        _ => {
            return_syntax_error!(
                ErrorLocation::from_span(&stream.location_from(start, byte_start)),
                "empty character literal"
            );
        }
    };
    if stream.next() != Some('\'') {
        return_syntax_error!(
            ErrorLocation::from_span(&stream.location_from(start, byte_start)),
            "unterminated character literal"
        );
    }
    Ok(Token::new(
        TokenKind::CharLiteral(value),
        stream.location_from(start, byte_start),
    ))
}

fn string_token(
    stream: &mut CharStream,
    start: CharPosition,
    byte_start: usize,
) -> Result<Token, CompileError> {
    let mut text = String::new();
    loop {
        match stream.next() {
            Some('"') => break,
            Some('\\') => match stream.next() {
                Some('n') => text.push('\n'),
                Some('t') => text.push('\t'),
                Some('"') => text.push('"'),
                Some('\\') => text.push('\\'),
                _ => {
                    return_syntax_error!(
                        ErrorLocation::from_span(&stream.location_from(start, byte_start)),
                        "unsupported escape in string literal"
                    );
                }
            },
            Some(c) => text.push(c),
            None => {
                return_syntax_error!(
                    ErrorLocation::from_span(&stream.location_from(start, byte_start)),
                    "unterminated string literal"
                );
            }
        }
    }
    Ok(Token::new(
        TokenKind::StringLiteral(text),
        stream.location_from(start, byte_start),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn operators_and_idents() {
        let toks = kinds("a := b + 1");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Define,
                TokenKind::Ident("b".to_string()),
                TokenKind::Add,
                TokenKind::IntLiteral("1".to_string()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn semicolon_insertion_follows_go_rules() {
        let toks = kinds("x++\ny--\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("x".to_string()),
                TokenKind::Inc,
                TokenKind::Semicolon,
                TokenKind::Ident("y".to_string()),
                TokenKind::Dec,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
        // No semicolon after a brace that opens a block
        let toks = kinds("func f() {\n}\n");
        assert!(!toks.contains(&TokenKind::Semicolon) || {
            // only the one after the closing brace
            toks.iter().filter(|t| **t == TokenKind::Semicolon).count() == 1
        });
    }

    #[test]
    fn comments_stay_in_stream() {
        let toks = kinds("//wasm:invoke (invoke \"Main\")\nfunc Main() {\n}");
        assert_eq!(
            toks[0],
            TokenKind::Comment("//wasm:invoke (invoke \"Main\")".to_string())
        );
        assert_eq!(toks[1], TokenKind::Func);
    }

    #[test]
    fn char_and_number_literals() {
        let toks = kinds("'a' 0x1F 2.5 10");
        assert_eq!(
            toks,
            vec![
                TokenKind::CharLiteral('a'),
                TokenKind::IntLiteral("0x1F".to_string()),
                TokenKind::FloatLiteral("2.5".to_string()),
                TokenKind::IntLiteral("10".to_string()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn shift_and_compare_operators() {
        let toks = kinds("a << 2 >> 1 <= 3 >= 4 != 5 == 6");
        assert!(toks.contains(&TokenKind::Shl));
        assert!(toks.contains(&TokenKind::Shr));
        assert!(toks.contains(&TokenKind::Le));
        assert!(toks.contains(&TokenKind::Ge));
        assert!(toks.contains(&TokenKind::Ne));
        assert!(toks.contains(&TokenKind::Eq));
    }
}
