//! Arithmetic expressions over a single position variable
//!
//! The grammar is deliberately closed: numeric literals, the variable `x`,
//! arithmetic, comparisons, boolean connectives and conditionals. There are
//! no other names, no function calls and no statements.
//!
//! ```text
//! expression  := logic_or ( "?" expression ":" expression
//!                         | "if" logic_or "else" expression )?
//! logic_or    := logic_and ( ("||" | "or") logic_and )*
//! logic_and   := logic_not ( ("&&" | "and") logic_not )*
//! logic_not   := "not" logic_not | comparison
//! comparison  := additive ( ("<" | "<=" | ">" | ">=" | "==" | "!=") additive )?
//! additive    := term ( ("+" | "-") term )*
//! term        := unary ( ("*" | "/" | "//" | "%") unary )*
//! unary       := ("-" | "+" | "!") unary | power
//! power       := primary ( "**" unary )?
//! primary     := NUMBER | "x" | "(" expression ")"
//! ```
//!
//! Booleans are represented as `1.0` / `0.0`; any non-zero value is true.

use std::fmt;
use std::str::FromStr;

/// Name of the bound position variable
pub const VARIABLE: &str = "x";

/// Longest accepted source text
pub const MAX_SOURCE_LEN: usize = 1024;

/// Deepest accepted nesting of sub-expressions
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("Equation cannot be empty")]
    Empty,

    #[error("Equation is too long ({0} characters, limit 1024)")]
    TooLong(usize),

    #[error("Equation is nested too deeply (limit 64)")]
    TooDeep,

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unknown name '{0}'; only 'x' may be used")]
    UnknownIdentifier(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of equation")]
    UnexpectedEnd,

    #[error("chained comparisons are not supported")]
    ChainedComparison,

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Var,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Bang,
    Question,
    Colon,
    If,
    Else,
    And,
    Or,
    Not,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Number(n) => return write!(f, "{}", n),
            Token::Var => VARIABLE,
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::SlashSlash => "//",
            Token::Percent => "%",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::EqEq => "==",
            Token::Ne => "!=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Question => "?",
            Token::Colon => ":",
            Token::If => "if",
            Token::Else => "else",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
        };
        f.write_str(text)
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|&(_, c)| c);

    while let Some(&(offset, ch)) = chars.get(i) {
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && peek(i + 1).is_some_and(|c| c.is_ascii_digit())) {
            let start = i;
            while peek(i).is_some_and(|c| c.is_ascii_digit() || c == '.' || c == '_') {
                i += 1;
            }
            if peek(i).is_some_and(|c| c == 'e' || c == 'E') {
                let exp_start = i;
                i += 1;
                if peek(i).is_some_and(|c| c == '+' || c == '-') {
                    i += 1;
                }
                if peek(i).is_some_and(|c| c.is_ascii_digit()) {
                    while peek(i).is_some_and(|c| c.is_ascii_digit()) {
                        i += 1;
                    }
                } else {
                    i = exp_start;
                }
            }
            let text: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            let value = text
                .replace('_', "")
                .parse::<f64>()
                .map_err(|_| ExprError::InvalidNumber(text.clone()))?;
            tokens.push((Token::Number(value), offset));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let start = i;
            while peek(i).is_some_and(|c| c.is_alphanumeric() || c == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().map(|&(_, c)| c).collect();
            let token = match word.as_str() {
                VARIABLE => Token::Var,
                "if" => Token::If,
                "else" => Token::Else,
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ => return Err(ExprError::UnknownIdentifier(word)),
            };
            tokens.push((token, offset));
            continue;
        }

        let next = peek(i + 1);
        let (token, width) = match (ch, next) {
            ('*', Some('*')) => (Token::StarStar, 2),
            ('/', Some('/')) => (Token::SlashSlash, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('|', Some('|')) => (Token::OrOr, 2),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Bang, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            _ => return Err(ExprError::UnexpectedChar { ch, offset }),
        };
        tokens.push((token, offset));
        i += width;
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Var,
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Conditional {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|&(t, _)| t)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some(&(token, offset)) => ExprError::UnexpectedToken {
                found: token.to_string(),
                offset,
            },
            None => ExprError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Node, ExprError> {
        self.enter()?;
        let value = self.logic_or()?;

        let node = if self.eat(Token::Question) {
            let then = self.expression()?;
            self.expect(Token::Colon)?;
            let otherwise = self.expression()?;
            Node::Conditional {
                condition: Box::new(value),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        } else if self.eat(Token::If) {
            let condition = self.logic_or()?;
            self.expect(Token::Else)?;
            let otherwise = self.expression()?;
            Node::Conditional {
                condition: Box::new(condition),
                then: Box::new(value),
                otherwise: Box::new(otherwise),
            }
        } else {
            value
        };

        self.depth -= 1;
        Ok(node)
    }

    fn logic_or(&mut self) -> Result<Node, ExprError> {
        let mut left = self.logic_and()?;
        while self.eat(Token::OrOr) || self.eat(Token::Or) {
            let right = self.logic_and()?;
            left = Node::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn logic_and(&mut self) -> Result<Node, ExprError> {
        let mut left = self.logic_not()?;
        while self.eat(Token::AndAnd) || self.eat(Token::And) {
            let right = self.logic_not()?;
            left = Node::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn logic_not(&mut self) -> Result<Node, ExprError> {
        if self.eat(Token::Not) {
            self.enter()?;
            let operand = self.logic_not()?;
            self.depth -= 1;
            return Ok(Node::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node, ExprError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;

        if matches!(
            self.peek(),
            Some(Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::EqEq | Token::Ne)
        ) {
            return Err(ExprError::ChainedComparison);
        }

        Ok(Node::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Node, ExprError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Node, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::SlashSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Node, ExprError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Node::Unary(op, Box::new(operand)))
    }

    fn power(&mut self) -> Result<Node, ExprError> {
        let base = self.primary()?;
        if self.eat(Token::StarStar) {
            self.enter()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, ExprError> {
        match self.peek() {
            Some(Token::Number(n)) => {
                self.advance();
                Ok(Node::Number(n))
            }
            Some(Token::Var) => {
                self.advance();
                Ok(Node::Var)
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn truthy(value: f64) -> bool {
    value != 0.0
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn evaluate(node: &Node, x: f64) -> Result<f64, ExprError> {
    let value = match node {
        Node::Number(n) => *n,
        Node::Var => x,
        Node::Unary(op, operand) => {
            let v = evaluate(operand, x)?;
            match op {
                UnaryOp::Neg => -v,
                UnaryOp::Plus => v,
                UnaryOp::Not => flag(!truthy(v)),
            }
        }
        Node::Binary(BinaryOp::And, left, right) => {
            flag(truthy(evaluate(left, x)?) && truthy(evaluate(right, x)?))
        }
        Node::Binary(BinaryOp::Or, left, right) => {
            flag(truthy(evaluate(left, x)?) || truthy(evaluate(right, x)?))
        }
        Node::Binary(op, left, right) => {
            let a = evaluate(left, x)?;
            let b = evaluate(right, x)?;
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
                    return Err(ExprError::DivisionByZero)
                }
                BinaryOp::Div => a / b,
                BinaryOp::FloorDiv => (a / b).floor(),
                // Result takes the sign of the divisor
                BinaryOp::Mod => ((a % b) + b) % b,
                BinaryOp::Pow => a.powf(b),
                BinaryOp::Lt => flag(a < b),
                BinaryOp::Le => flag(a <= b),
                BinaryOp::Gt => flag(a > b),
                BinaryOp::Ge => flag(a >= b),
                BinaryOp::Eq => flag(a == b),
                BinaryOp::Ne => flag(a != b),
                BinaryOp::And => flag(truthy(a) && truthy(b)),
                BinaryOp::Or => flag(truthy(a) || truthy(b)),
            }
        }
        Node::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if truthy(evaluate(condition, x)?) {
                evaluate(then, x)?
            } else {
                evaluate(otherwise, x)?
            }
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExprError::NonFinite)
    }
}

/// A parsed, reusable position equation
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(ExprError::Empty);
        }
        if trimmed.chars().count() > MAX_SOURCE_LEN {
            return Err(ExprError::TooLong(trimmed.chars().count()));
        }

        let mut parser = Parser {
            tokens: tokenize(trimmed)?,
            pos: 0,
            depth: 0,
        };
        let root = parser.expression()?;
        if parser.peek().is_some() {
            return Err(parser.unexpected());
        }

        Ok(Expression {
            source: trimmed.to_string(),
            root,
        })
    }

    /// Evaluate with `x` bound to `value`
    pub fn eval(&self, value: f64) -> Result<f64, ExprError> {
        evaluate(&self.root, value)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Expression {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
