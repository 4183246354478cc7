//! Tokenizer for band-math expressions

use crate::ast::BinaryOp;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    /// Word operators: div, dv, mult, mlt, pow, pw
    Word(BinaryOp),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Question,
    Colon,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    End,
}

/// A token and the character offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Words lexed as binary operators instead of identifiers
pub const WORD_OPERATORS: &[(&str, BinaryOp)] = &[
    ("div", BinaryOp::ElemDiv),
    ("dv", BinaryOp::ScalarDiv),
    ("mult", BinaryOp::ElemMul),
    ("mlt", BinaryOp::ScalarMul),
    ("pow", BinaryOp::ElemPow),
    ("pw", BinaryOp::ScalarPow),
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split `text` into tokens, terminated by [`Token::End`]
pub(crate) fn tokenize(text: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let two = chars.get(i + 1).copied();
        let token = match (c, two) {
            ('=', Some('=')) => {
                i += 2;
                Token::EqEq
            }
            ('!', Some('=')) => {
                i += 2;
                Token::NotEq
            }
            ('<', Some('=')) => {
                i += 2;
                Token::Le
            }
            ('>', Some('=')) => {
                i += 2;
                Token::Ge
            }
            ('&', Some('&')) => {
                i += 2;
                Token::AndAnd
            }
            ('|', Some('|')) => {
                i += 2;
                Token::OrOr
            }
            _ if c.is_ascii_digit() || (c == '.' && two.is_some_and(|d| d.is_ascii_digit())) => {
                i = scan_number(&chars, i);
                let literal: String = chars[start..i].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| {
                    ParseError::new(start, format!("Invalid number '{}'", literal))
                })?;
                Token::Number(value)
            }
            _ if is_ident_start(c) => {
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                match WORD_OPERATORS.iter().find(|(w, _)| *w == name) {
                    Some((_, op)) => Token::Word(*op),
                    None => Token::Ident(name),
                }
            }
            _ => {
                i += 1;
                match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '^' => Token::Caret,
                    '!' => Token::Bang,
                    '<' => Token::Lt,
                    '>' => Token::Gt,
                    '?' => Token::Question,
                    ':' => Token::Colon,
                    ',' => Token::Comma,
                    ';' => Token::Semicolon,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    other => {
                        return Err(ParseError::new(
                            start,
                            format!("Unexpected character '{}'", other),
                        ));
                    }
                }
            }
        };

        tokens.push(Spanned {
            token,
            position: start,
        });
    }

    tokens.push(Spanned {
        token: Token::End,
        position: chars.len(),
    });
    Ok(tokens)
}

/// End offset of the number literal starting at `i`
fn scan_number(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    // Exponent only when digits follow, so `2e` stays `2` then `e`
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}
