//! Recursive descent parser for select statements.
//!
//! ```text
//! statement  := SELECT expr ("," expr)* FROM from ("," from)* join*
//!               [WHERE expr] [GROUP BY expr ("," expr)*] [HAVING expr]
//!               [ORDER BY order ("," order)*] paging*
//! from       := Ident [AS] Ident
//! join       := [INNER] JOIN Ident "." Ident [AS] Ident
//! order      := expr [ASC | DESC] [NULLS (FIRST | LAST)]
//! paging     := LIMIT operand | OFFSET operand
//! expr       := and (OR and)*
//! and        := not (AND not)*
//! not        := NOT not | predicate
//! predicate  := primary [cmp primary | [NOT] BETWEEN operand AND operand
//!               | [NOT] IN "(" [operand ("," operand)*] ")"
//!               | [NOT] LIKE operand | IS [NOT] NULL]
//! primary    := "(" expr ")" | aggregate | Ident ["." Ident] | operand
//! aggregate  := (COUNT | SUM | AVG | MIN | MAX) "(" ("*" | expr) ")"
//! ```

use ormq_proto::{AggregateFunction, CompareOp, NullOrdering, OrderDirection};

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Parser over a pre-tokenized source.
pub struct Parser<'source> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Tokenize `source` and create a parser over it.
    pub fn new(source: &'source str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            source,
        })
    }

    /// Parse a complete statement, rejecting trailing input.
    pub fn parse_statement(&mut self) -> Result<SelectStatement, ParseError> {
        let start = self.expect_token(Token::Select)?.span;

        let mut select = vec![self.parse_expr()?];
        while self.eat(&Token::Comma) {
            select.push(self.parse_expr()?);
        }

        self.expect_token(Token::From).map_err(|e| {
            e.with_hint("separate select items with ',' and follow them with 'from'")
        })?;
        let mut from = vec![self.parse_from_item()?];
        while self.eat(&Token::Comma) {
            from.push(self.parse_from_item()?);
        }

        let mut joins = Vec::new();
        while matches!(self.peek(), Some(Token::Join | Token::Inner)) {
            joins.push(self.parse_join()?);
        }

        let where_clause = if self.eat(&Token::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.eat(&Token::Group) {
            self.expect_token(Token::By)?;
            group_by.push(self.parse_expr()?);
            while self.eat(&Token::Comma) {
                group_by.push(self.parse_expr()?);
            }
        }

        let having = if self.eat(&Token::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat(&Token::Order) {
            self.expect_token(Token::By)?;
            order_by.push(self.parse_order_item()?);
            while self.eat(&Token::Comma) {
                order_by.push(self.parse_order_item()?);
            }
        }

        let mut limit = None;
        let mut offset = None;
        while let Some(tok) = self.peek_spanned().cloned() {
            let slot = match tok.token {
                Token::Limit => &mut limit,
                Token::Offset => &mut offset,
                _ => {
                    return Err(ParseError::new(
                        format!("unexpected {} after end of statement", tok.token.describe()),
                        tok.span,
                    ))
                }
            };
            self.pos += 1;
            if slot.is_some() {
                return Err(ParseError::new(
                    format!("duplicate {}", tok.token.describe()),
                    tok.span,
                ));
            }
            *slot = Some(self.parse_operand()?);
        }

        let end = self.tokens.last().map(|t| t.span).unwrap_or(start);
        Ok(SelectStatement {
            select,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
            span: start.merge(end),
        })
    }

    fn parse_from_item(&mut self) -> Result<FromItem, ParseError> {
        let entity = self.expect_ident()?;
        self.eat(&Token::As);
        let alias = self.expect_ident()?;
        Ok(FromItem { entity, alias })
    }

    fn parse_join(&mut self) -> Result<JoinClause, ParseError> {
        self.eat(&Token::Inner);
        self.expect_token(Token::Join)?;
        let left_alias = self.expect_ident()?;
        self.expect_token(Token::Dot)
            .map_err(|e| e.with_hint("joins follow a relation, as in 'join m.team t'"))?;
        let relation = self.expect_ident()?;
        self.eat(&Token::As);
        let alias = self.expect_ident()?;
        Ok(JoinClause {
            left_alias,
            relation,
            alias,
        })
    }

    fn parse_order_item(&mut self) -> Result<OrderItem, ParseError> {
        let expr = self.parse_expr()?;

        let direction = if self.eat(&Token::Desc) {
            OrderDirection::Desc
        } else {
            self.eat(&Token::Asc);
            OrderDirection::Asc
        };

        let nulls = if self.eat(&Token::Nulls) {
            let tok = self.next_token()?;
            match tok.token {
                Token::First => NullOrdering::First,
                Token::Last => NullOrdering::Last,
                other => {
                    return Err(ParseError::new(
                        format!("expected 'first' or 'last', found {}", other.describe()),
                        tok.span,
                    ))
                }
            }
        } else {
            NullOrdering::Default
        };

        Ok(OrderItem {
            expr,
            direction,
            nulls,
        })
    }

    /// Parse an expression (OR has the lowest precedence).
    fn parse_expr(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::combine(false, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::combine(true, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Spanned<Expr>, ParseError> {
        if let Some(Token::Not) = self.peek() {
            let start = self.next_token()?.span;
            let inner = self.parse_not()?;
            let span = start.merge(inner.span);
            return Ok(Spanned::new(Expr::Not(Box::new(inner)), span));
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let left = self.parse_primary()?;

        if let Some(op) = self.peek().and_then(compare_op) {
            self.pos += 1;
            let right = self.parse_primary()?;
            let span = left.span.merge(right.span);
            return Ok(Spanned::new(
                Expr::Compare {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            ));
        }

        if let Some(Token::Is) = self.peek() {
            self.pos += 1;
            let negated = self.eat(&Token::Not);
            let end = self
                .expect_token(Token::Null)
                .map_err(|e| e.with_hint("only 'is null' and 'is not null' are supported"))?
                .span;
            let span = left.span.merge(end);
            return Ok(Spanned::new(
                Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                },
                span,
            ));
        }

        let negated = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Not), Some(Token::Between | Token::In | Token::Like)) => {
                self.pos += 1;
                true
            }
            _ => false,
        };

        match self.peek() {
            Some(Token::Between) => {
                self.pos += 1;
                let low = self.parse_operand()?;
                self.expect_token(Token::And)?;
                let high = self.parse_operand()?;
                let span = left.span.merge(high.span);
                Ok(Spanned::new(
                    Expr::Between {
                        expr: Box::new(left),
                        low,
                        high,
                        negated,
                    },
                    span,
                ))
            }
            Some(Token::In) => {
                self.pos += 1;
                self.expect_token(Token::LParen)?;
                let mut values = Vec::new();
                if !matches!(self.peek(), Some(Token::RParen)) {
                    values.push(self.parse_operand()?);
                    while self.eat(&Token::Comma) {
                        values.push(self.parse_operand()?);
                    }
                }
                let end = self.expect_token(Token::RParen)?.span;
                let span = left.span.merge(end);
                Ok(Spanned::new(
                    Expr::In {
                        expr: Box::new(left),
                        values,
                        negated,
                    },
                    span,
                ))
            }
            Some(Token::Like) => {
                self.pos += 1;
                let pattern = self.parse_operand()?;
                let span = left.span.merge(pattern.span);
                Ok(Spanned::new(
                    Expr::Like {
                        expr: Box::new(left),
                        pattern,
                        negated,
                    },
                    span,
                ))
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Spanned<Expr>, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::LParen => {
                let inner = self.parse_expr()?;
                let end = self.expect_token(Token::RParen)?.span;
                Ok(Spanned::new(inner.value, tok.span.merge(end)))
            }
            Token::Ident(name) => {
                if let Some(function) = aggregate_function(&name) {
                    if let Some(Token::LParen) = self.peek() {
                        return self.parse_aggregate(function, tok.span);
                    }
                }
                let mut span = tok.span;
                let field = if self.eat(&Token::Dot) {
                    let field = self.expect_ident()?;
                    span = span.merge(field.span);
                    Some(field.value)
                } else {
                    None
                };
                Ok(Spanned::new(Expr::Path { alias: name, field }, span))
            }
            _ => {
                self.pos -= 1;
                let operand = self.parse_operand()?;
                Ok(operand.map(Expr::Operand))
            }
        }
    }

    fn parse_aggregate(
        &mut self,
        function: AggregateFunction,
        start: Span,
    ) -> Result<Spanned<Expr>, ParseError> {
        self.expect_token(Token::LParen)?;
        let arg = match self.peek_spanned() {
            Some(SpannedToken {
                token: Token::Star,
                span,
            }) => {
                if function != AggregateFunction::Count {
                    return Err(ParseError::new(
                        format!("'*' is only valid in count, not {}", function.name()),
                        *span,
                    ));
                }
                self.pos += 1;
                None
            }
            _ => Some(Box::new(self.parse_expr()?)),
        };
        let end = self.expect_token(Token::RParen)?.span;
        Ok(Spanned::new(
            Expr::Aggregate { function, arg },
            start.merge(end),
        ))
    }

    /// Parse a literal or parameter.
    fn parse_operand(&mut self) -> Result<Spanned<Operand>, ParseError> {
        let tok = self.next_token()?;
        let operand = match tok.token {
            Token::Int(i) => Operand::Literal(Literal::Int(i)),
            Token::Float(f) => Operand::Literal(Literal::Float(f)),
            Token::String(s) => Operand::Literal(Literal::String(s)),
            Token::True => Operand::Literal(Literal::Bool(true)),
            Token::False => Operand::Literal(Literal::Bool(false)),
            Token::Null => Operand::Literal(Literal::Null),
            Token::Param(name) => Operand::Param(name),
            other => {
                let err = ParseError::new(
                    format!("expected a value, found {}", other.describe()),
                    tok.span,
                );
                return Err(match other {
                    Token::Eq => err.with_hint("'=' compares two expressions; check for a doubled operator"),
                    _ => err,
                });
            }
        };
        Ok(Spanned::new(operand, tok.span))
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|t| &t.token)
    }

    fn peek_spanned(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    /// Consume the next token if it equals `token`.
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Ident(name) => Ok(Spanned::new(name, tok.span)),
            other => Err(ParseError::new(
                format!("expected identifier, found {}", other.describe()),
                tok.span,
            )),
        }
    }

    /// Expect and consume a specific token.
    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if std::mem::discriminant(&tok.token) == std::mem::discriminant(&expected) {
            Ok(tok)
        } else {
            self.pos -= 1;
            Err(ParseError::new(
                format!(
                    "expected {}, found {}",
                    expected.describe(),
                    tok.token.describe()
                ),
                tok.span,
            ))
        }
    }

    /// Get the next token or error at end of input.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or_else(|| {
            ParseError::new(
                "unexpected end of input",
                Span::new(self.source.len(), self.source.len()),
            )
        })?;
        self.pos += 1;
        Ok(tok)
    }
}

fn compare_op(token: &Token) -> Option<CompareOp> {
    Some(match token {
        Token::Eq => CompareOp::Eq,
        Token::Ne => CompareOp::Ne,
        Token::Lt => CompareOp::Lt,
        Token::Le => CompareOp::Le,
        Token::Gt => CompareOp::Gt,
        Token::Ge => CompareOp::Ge,
        _ => return None,
    })
}

fn aggregate_function(name: &str) -> Option<AggregateFunction> {
    Some(match name.to_ascii_lowercase().as_str() {
        "count" => AggregateFunction::Count,
        "sum" => AggregateFunction::Sum,
        "avg" => AggregateFunction::Avg,
        "min" => AggregateFunction::Min,
        "max" => AggregateFunction::Max,
        _ => return None,
    })
}

/// Parse a source string into a statement.
pub fn parse(source: &str) -> Result<SelectStatement, ParseError> {
    Parser::new(source)?.parse_statement()
}
