//! Recursive descent parser
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! sequence = ternary (';' ternary)* ';'?          // a ; b  ==  cat(a, b)
//! ternary  = or ('?' ternary ':' ternary)?
//! or       = and ('||' and)*
//! and      = cmp ('&&' cmp)*
//! cmp      = add (('==' | '!=' | '<' | '<=' | '>' | '>=') add)*
//! add      = term (('+' | '-') term)*
//! term     = unary (('*' | '/' | div | dv | mult | mlt) unary)*
//! unary    = ('-' | '+' | '!') unary | power
//! power    = primary (('^' | pow | pw) unary)?
//! primary  = number | name | name '(' args ')' | '(' ternary ')' | '{' rows '}'
//! ```
//!
//! Division (`/`, `div`, `dv`) yields NaN when the divisor's magnitude is
//! below [`DIVISION_EPSILON`](crate::functions::DIVISION_EPSILON) (`1e-10`),
//! however small the dividend.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::ParseError;
use crate::eval::Program;
use crate::functions::{CONSTANTS, Function};
use crate::lexer::{Spanned, Token, tokenize};

type ParseResult<T> = Result<T, ParseError>;

/// Deepest nesting of sub-expressions `Expression::parse` accepts.
///
/// Each parenthesis, prefix operator, exponent and chained binary operator
/// adds one level.
pub const MAX_DEPTH: usize = 256;

/// A parsed, not yet bound, expression
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Expr<String>,
    identifiers: Vec<String>,
}

impl Expression {
    /// Parse `text`; top-level `;` separators concatenate their operands
    pub fn parse(text: &str) -> ParseResult<Self> {
        let mut parser = Parser::new(tokenize(text)?);
        let root = parser.parse_sequence()?;
        if *parser.peek() != Token::End {
            return Err(ParseError::new(
                parser.position(),
                format!("Unexpected {} after expression", describe(parser.peek())),
            ));
        }

        let mut identifiers: Vec<String> = Vec::new();
        root.visit_variables(&mut |name: &String| {
            if !identifiers.contains(name) {
                identifiers.push(name.clone());
            }
        });

        Ok(Self {
            source: text.to_string(),
            root,
            identifiers,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &Expr<String> {
        &self.root
    }

    /// Free variable names, in order of first appearance
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Replace every variable name by the slot `resolve` assigns to it
    pub fn bind<E>(&self, mut resolve: impl FnMut(&str) -> Result<usize, E>) -> Result<Program, E> {
        let root = self
            .root
            .try_map_variables(&mut |name: &String| resolve(name))?;
        Ok(Program::new(root))
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new(
                self.position(),
                format!("Expression nested more than {} levels deep", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self, levels: usize) {
        self.depth -= levels;
    }

    // The token list always ends with Token::End and `pos` never moves past it
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].position
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if token != Token::End {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> ParseResult<()> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(
                self.position(),
                format!("Expected {}, found {}", what, describe(self.peek())),
            ))
        }
    }

    fn parse_sequence(&mut self) -> ParseResult<Expr<String>> {
        let mut items = vec![self.parse_ternary()?];
        while *self.peek() == Token::Semicolon {
            self.advance();
            if *self.peek() == Token::End {
                break;
            }
            items.push(self.parse_ternary()?);
        }
        if items.len() == 1 {
            Ok(items.remove(0))
        } else {
            Ok(Expr::Call {
                function: Function::Cat,
                args: items,
            })
        }
    }

    fn parse_ternary(&mut self) -> ParseResult<Expr<String>> {
        self.descend()?;
        let expr = self.parse_conditional()?;
        self.ascend(1);
        Ok(expr)
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr<String>> {
        let condition = self.parse_or()?;
        if *self.peek() != Token::Question {
            return Ok(condition);
        }
        self.advance();
        let then = self.parse_ternary()?;
        self.expect(Token::Colon, "':' in conditional")?;
        let otherwise = self.parse_ternary()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// Left-associative chain of `next` operands joined by operators `op_of` accepts
    fn parse_left_assoc(
        &mut self,
        next: fn(&mut Self) -> ParseResult<Expr<String>>,
        op_of: fn(&Token) -> Option<BinaryOp>,
    ) -> ParseResult<Expr<String>> {
        let mut lhs = next(self)?;
        let mut chained = 0;
        while let Some(op) = op_of(self.peek()) {
            self.advance();
            self.descend()?;
            chained += 1;
            let rhs = next(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.ascend(chained);
        Ok(lhs)
    }

    fn parse_or(&mut self) -> ParseResult<Expr<String>> {
        self.parse_left_assoc(Self::parse_and, |t| match t {
            Token::OrOr => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_and(&mut self) -> ParseResult<Expr<String>> {
        self.parse_left_assoc(Self::parse_comparison, |t| match t {
            Token::AndAnd => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr<String>> {
        self.parse_left_assoc(Self::parse_additive, |t| match t {
            Token::EqEq => Some(BinaryOp::Eq),
            Token::NotEq => Some(BinaryOp::Ne),
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> ParseResult<Expr<String>> {
        self.parse_left_assoc(Self::parse_term, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_term(&mut self) -> ParseResult<Expr<String>> {
        self.parse_left_assoc(Self::parse_unary, |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Word(
                op @ (BinaryOp::ElemDiv
                | BinaryOp::ScalarDiv
                | BinaryOp::ElemMul
                | BinaryOp::ScalarMul),
            ) => Some(*op),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> ParseResult<Expr<String>> {
        while *self.peek() == Token::Plus {
            self.advance();
        }
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Bang => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        self.advance();
        self.descend()?;
        let operand = self.parse_unary()?;
        self.ascend(1);
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Right associative: `a ^ b ^ c == a ^ (b ^ c)`, and `-a ^ 2 == -(a ^ 2)`
    fn parse_power(&mut self) -> ParseResult<Expr<String>> {
        let base = self.parse_primary()?;
        let op = match self.peek() {
            Token::Caret => BinaryOp::Pow,
            Token::Word(op @ (BinaryOp::ElemPow | BinaryOp::ScalarPow)) => *op,
            _ => return Ok(base),
        };
        self.advance();
        self.descend()?;
        let exponent = self.parse_unary()?;
        self.ascend(1);
        Ok(Expr::Binary {
            op,
            lhs: Box::new(base),
            rhs: Box::new(exponent),
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expr<String>> {
        let position = self.position();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Ident(name) => {
                if *self.peek() == Token::LParen {
                    self.advance();
                    self.parse_call(&name, position)
                } else if let Some((_, value)) = CONSTANTS.iter().find(|(c, _)| *c == name) {
                    Ok(Expr::Number(*value))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Token::LParen => {
                let inner = self.parse_ternary()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBrace => self.parse_matrix(position),
            Token::Word(op) => Err(ParseError::new(
                position,
                format!("Operator '{}' is missing its left operand", op.symbol()),
            )),
            Token::End => Err(ParseError::new(position, "Unexpected end of expression")),
            other => Err(ParseError::new(
                position,
                format!("Unexpected {}", describe(&other)),
            )),
        }
    }

    /// Arguments of `name(`, the opening parenthesis already consumed
    fn parse_call(&mut self, name: &str, position: usize) -> ParseResult<Expr<String>> {
        let function = Function::lookup(name)
            .ok_or_else(|| ParseError::new(position, format!("Unknown function '{}'", name)))?;

        let mut args = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                args.push(self.parse_ternary()?);
                if *self.peek() != Token::Comma {
                    break;
                }
                self.advance();
            }
        }
        self.expect(Token::RParen, "',' or ')' in argument list")?;

        if !function.arity().accepts(args.len()) {
            return Err(ParseError::new(
                position,
                format!(
                    "Function '{}' expects {}, got {}",
                    name,
                    function.arity(),
                    args.len()
                ),
            ));
        }
        Ok(Expr::Call { function, args })
    }

    /// Matrix literal, the opening brace already consumed
    fn parse_matrix(&mut self, position: usize) -> ParseResult<Expr<String>> {
        if *self.peek() == Token::RBrace {
            return Err(ParseError::new(position, "Empty matrix literal"));
        }

        let mut rows = vec![Vec::new()];
        loop {
            let element = self.parse_ternary()?;
            if let Some(row) = rows.last_mut() {
                row.push(element);
            }
            match self.advance() {
                Token::Comma => {}
                Token::Semicolon => rows.push(Vec::new()),
                Token::RBrace => break,
                other => {
                    return Err(ParseError::new(
                        self.position(),
                        format!("Expected ',', ';' or '}}' in matrix, found {}", describe(&other)),
                    ));
                }
            }
        }

        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(ParseError::new(
                position,
                "Matrix rows must all have the same number of elements",
            ));
        }
        Ok(Expr::Matrix { rows })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Ident(name) => format!("identifier '{}'", name),
        Token::Word(op) => format!("operator '{}'", op.symbol()),
        Token::End => "end of expression".to_string(),
        other => {
            let symbol = match other {
                Token::Plus => "+",
                Token::Minus => "-",
                Token::Star => "*",
                Token::Slash => "/",
                Token::Caret => "^",
                Token::Bang => "!",
                Token::EqEq => "==",
                Token::NotEq => "!=",
                Token::Lt => "<",
                Token::Le => "<=",
                Token::Gt => ">",
                Token::Ge => ">=",
                Token::AndAnd => "&&",
                Token::OrOr => "||",
                Token::Question => "?",
                Token::Colon => ":",
                Token::Comma => ",",
                Token::Semicolon => ";",
                Token::LParen => "(",
                Token::RParen => ")",
                Token::LBrace => "{",
                _ => "}",
            };
            format!("'{}'", symbol)
        }
    }
}
