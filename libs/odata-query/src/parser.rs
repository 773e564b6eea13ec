//! `$filter` grammar.
//!
//! Recursive descent over the tokens produced by the lexer, lowest precedence first:
//!
//! ```text
//! or_expr    := and_expr ( "or" and_expr )*
//! and_expr   := unary ( "and" unary )*
//! unary      := "not" unary | comparison
//! comparison := operand ( cmp_op operand | "in" "(" operand ( "," operand )* ")" )?
//! operand    := "(" or_expr ")" | name "(" args? ")" | literal | property
//! ```
//!
//! Same-level chains group right-to-left: `a and b and c` is `And(a, And(b, c))`.

use crate::ast::{CompareOperator, Expr, Value};
use crate::lexer::{Token, tokenize};
use crate::limits::ODataLimits;
use crate::{Error, temporal};

const RESERVED: &[&str] = &["and", "or", "not", "in", "eq", "ne", "gt", "ge", "lt", "le"];

/// Parsed filter expression with its AST size.
#[derive(Clone, Debug)]
pub struct ParsedFilter {
    expr: Expr,
    node_count: usize,
}

impl ParsedFilter {
    /// Get a reference to the parsed expression
    #[must_use]
    pub fn as_expr(&self) -> &Expr {
        &self.expr
    }

    /// Consume and extract the parsed expression
    #[must_use]
    pub fn into_expr(self) -> Expr {
        self.expr
    }

    /// Get the AST node count for budget enforcement
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }
}

/// Parse a raw `$filter` string with the default [`ODataLimits`].
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] if the expression is malformed or exceeds a limit.
pub fn parse_filter_string(raw: &str) -> Result<ParsedFilter, Error> {
    parse_filter_with_limits(raw, &ODataLimits::default())
}

/// Parse a raw `$filter` string, enforcing length, depth and node-count limits.
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] if the expression is empty, malformed
/// (unbalanced parentheses, dangling operators, trailing tokens, unterminated
/// literals) or exceeds one of the configured limits.
pub fn parse_filter_with_limits(raw: &str, limits: &ODataLimits) -> Result<ParsedFilter, Error> {
    limits.validate_filter(raw)?;

    let tokens = tokenize(raw)?;
    if tokens.is_empty() {
        return Err(Error::InvalidFilter("empty expression".to_owned()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth: limits.max_depth,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(Error::InvalidFilter(format!(
            "unexpected {} after end of expression",
            describe(token)
        )));
    }

    let node_count = expr.node_count();
    limits.validate_node_count(node_count)?;
    tracing::trace!(node_count, "parsed $filter expression");

    Ok(ParsedFilter { expr, node_count })
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token<'a>, what: &str) -> Result<(), Error> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(Error::InvalidFilter(format!(
                "expected {what}, found {}",
                describe(token)
            ))),
            None => Err(Error::InvalidFilter(format!(
                "expected {what}, found end of expression"
            ))),
        }
    }

    fn enter(&mut self) -> Result<(), Error> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::InvalidFilter(format!(
                "expression nesting exceeds maximum depth of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.leave_n(1);
    }

    fn leave_n(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    // Each extra chain term nests one level deeper once grouped, so it is charged
    // against the depth budget until the chain is folded.
    fn parse_or(&mut self) -> Result<Expr, Error> {
        let first = self.parse_and()?;
        let mut rest = Vec::new();
        while self.eat_keyword("or") {
            self.enter()?;
            rest.push(self.parse_and()?);
        }
        self.leave_n(rest.len());
        Ok(group_right(first, rest, Expr::or))
    }

    fn parse_and(&mut self) -> Result<Expr, Error> {
        let first = self.parse_unary()?;
        let mut rest = Vec::new();
        while self.eat_keyword("and") {
            self.enter()?;
            rest.push(self.parse_unary()?);
        }
        self.leave_n(rest.len());
        Ok(group_right(first, rest, Expr::and))
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        if self.eat_keyword("not") {
            self.enter()?;
            let inner = self.parse_unary()?;
            self.leave();
            return Ok(!inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, Error> {
        let left = self.parse_operand()?;

        if let Some(Token::Word(word)) = self.peek() {
            if let Some(op) = CompareOperator::from_keyword(word) {
                self.pos += 1;
                let right = self.parse_operand()?;
                if let Some(Token::Word(next)) = self.peek()
                    && (CompareOperator::from_keyword(next).is_some() || next == "in")
                {
                    return Err(Error::InvalidFilter(format!(
                        "comparison operators cannot be chained ('{op}' followed by '{next}')"
                    )));
                }
                return Ok(Expr::compare(left, op, right));
            }
            if word == "in" {
                self.pos += 1;
                let items = self.parse_in_list()?;
                return Ok(Expr::In(Box::new(left), items));
            }
        }

        Ok(left)
    }

    fn parse_in_list(&mut self) -> Result<Vec<Expr>, Error> {
        self.expect(Token::LParen, "'(' after 'in'")?;
        let mut items = vec![self.parse_operand()?];
        loop {
            match self.advance() {
                Some(Token::Comma) => items.push(self.parse_operand()?),
                Some(Token::RParen) => return Ok(items),
                Some(token) => {
                    return Err(Error::InvalidFilter(format!(
                        "expected ',' or ')' in 'in' list, found {}",
                        describe(token)
                    )));
                }
                None => {
                    return Err(Error::InvalidFilter(
                        "unbalanced parentheses: 'in' list is not closed".to_owned(),
                    ));
                }
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Expr, Error> {
        match self.advance() {
            Some(Token::LParen) => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "')'")?;
                self.leave();
                Ok(inner)
            }
            Some(Token::Str(content)) => Ok(Expr::Value(Value::String(content.to_owned()))),
            Some(Token::Word(word)) => {
                if RESERVED.contains(&word) {
                    return Err(Error::InvalidFilter(format!(
                        "expected an operand, found keyword '{word}'"
                    )));
                }
                if self.peek() == Some(Token::LParen) && is_function_name(word) {
                    self.pos += 1;
                    return self.parse_call(word);
                }
                Ok(classify_leaf(word))
            }
            Some(token) => Err(Error::InvalidFilter(format!(
                "expected an operand, found {}",
                describe(token)
            ))),
            None => Err(Error::InvalidFilter(
                "expected an operand, found end of expression".to_owned(),
            )),
        }
    }

    /// Arguments after the opening parenthesis; commas split only at this call's level.
    fn parse_call(&mut self, name: &str) -> Result<Expr, Error> {
        self.enter()?;
        let mut args = Vec::new();
        if self.peek() == Some(Token::RParen) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.parse_or()?);
                match self.advance() {
                    Some(Token::Comma) => {}
                    Some(Token::RParen) => break,
                    Some(token) => {
                        return Err(Error::InvalidFilter(format!(
                            "expected ',' or ')' in arguments of '{name}', found {}",
                            describe(token)
                        )));
                    }
                    None => {
                        return Err(Error::InvalidFilter(format!(
                            "unbalanced parentheses: call to '{name}' is not closed"
                        )));
                    }
                }
            }
        }
        self.leave();
        Ok(Expr::Function(name.to_owned(), args))
    }
}

/// Fold `first op r1 op r2 ...` into `first op (r1 op (r2 ...))`.
fn group_right(first: Expr, rest: Vec<Expr>, join: fn(Expr, Expr) -> Expr) -> Expr {
    let mut terms = rest.into_iter().rev();
    match terms.next() {
        None => first,
        Some(last) => {
            let tail = terms.fold(last, |acc, term| join(term, acc));
            join(first, tail)
        }
    }
}

fn is_function_name(word: &str) -> bool {
    word.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn classify_leaf(word: &str) -> Expr {
    match word {
        "null" => return Expr::Value(Value::Null),
        "true" => return Expr::Value(Value::Bool(true)),
        "false" => return Expr::Value(Value::Bool(false)),
        _ => {}
    }

    let numeric_start = word
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
    if numeric_start {
        if let Ok(n) = word.parse::<f64>()
            && n.is_finite()
        {
            return Expr::Value(Value::Number(n));
        }
        if let Some(dt) = temporal::parse_datetime(word) {
            return Expr::Value(Value::DateTime(dt));
        }
    }

    Expr::property(word)
}

fn describe(token: Token<'_>) -> String {
    match token {
        Token::LParen => "'('".to_owned(),
        Token::RParen => "')'".to_owned(),
        Token::Comma => "','".to_owned(),
        Token::Str(s) => format!("string literal '{s}'"),
        Token::Word(w) => format!("'{w}'"),
    }
}
