//! Compiler from AST to query plans.

use std::collections::HashMap;

use ormq_proto::{
    AggregateFunction, Error as PlanError, Expr as PlanExpr, JoinSpec, OrderSpec, QueryPlan,
    SelectItem, Value,
};
use tracing::debug;

use crate::ast::*;
use crate::error::{CompileError, CompileErrorKind};
use crate::lexer::{tokenize, Token};
use crate::span::{Span, Spanned};

/// Values for `:name` parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: HashMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a parameter, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Bind a parameter, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse `name=value`. The value is read as a query literal when it is
    /// one (`10`, `2.5`, `true`, `null`, `'text'`) and as plain text otherwise.
    pub fn parse_assignment(assignment: &str) -> Option<(String, Value)> {
        let (name, raw) = assignment.split_once('=')?;
        let name = name.trim().trim_start_matches(':');
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), parse_value(raw.trim())))
    }
}

fn parse_value(raw: &str) -> Value {
    let literal = match tokenize(raw).as_deref() {
        Ok([tok]) => match &tok.token {
            Token::Int(i) => Some(Literal::Int(*i)),
            Token::Float(f) => Some(Literal::Float(*f)),
            Token::String(s) => Some(Literal::String(s.clone())),
            Token::True => Some(Literal::Bool(true)),
            Token::False => Some(Literal::Bool(false)),
            Token::Null => Some(Literal::Null),
            _ => None,
        },
        _ => None,
    };
    literal
        .map(literal_value)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Integer literals that fit 32 bits become `Int32`, like typed `i32` paths.
fn literal_value(literal: Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(b),
        Literal::Int(i) => i32::try_from(i)
            .map(Value::Int32)
            .unwrap_or(Value::Int64(i)),
        Literal::Float(f) => Value::Float64(f),
        Literal::String(s) => Value::String(s),
    }
}

/// Compiles statements against a set of bound parameters.
pub struct Compiler<'p> {
    params: &'p Params,
}

impl<'p> Compiler<'p> {
    pub fn new(params: &'p Params) -> Self {
        Self { params }
    }

    /// Compile a statement to a validated plan.
    pub fn compile(&self, stmt: &SelectStatement) -> Result<QueryPlan, CompileError> {
        let mut plan = QueryPlan::new();

        for item in &stmt.select {
            plan = plan.with_select(self.compile_select_item(item)?);
        }
        for from in &stmt.from {
            plan = plan.with_source(&from.entity.value, &from.alias.value);
        }
        for join in &stmt.joins {
            plan = plan.with_join(JoinSpec::new(
                &join.left_alias.value,
                &join.relation.value,
                &join.alias.value,
            ));
        }
        if let Some(condition) = &stmt.where_clause {
            plan = plan.with_filter(self.compile_expr(condition)?);
        }
        for key in &stmt.group_by {
            plan = plan.with_group_by(self.compile_expr(key)?);
        }
        if let Some(condition) = &stmt.having {
            plan = plan.with_having(self.compile_expr(condition)?);
        }
        for item in &stmt.order_by {
            plan = plan.with_order(OrderSpec {
                expr: self.compile_expr(&item.expr)?,
                direction: item.direction,
                nulls: item.nulls,
            });
        }
        if let Some(limit) = &stmt.limit {
            match self.paging_value(limit)? {
                n if n > 0 => plan = plan.with_limit(n as u64),
                n => {
                    return Err(CompileError::invalid_query(
                        format!("limit must be positive, got {}", n),
                        limit.span,
                    ))
                }
            }
        }
        if let Some(offset) = &stmt.offset {
            match self.paging_value(offset)? {
                n if n >= 0 => plan = plan.with_offset(n as u64),
                n => {
                    return Err(CompileError::invalid_query(
                        format!("negative offset {}", n),
                        offset.span,
                    ))
                }
            }
        }

        plan.validate()
            .map_err(|e| CompileError::invalid_query(plan_message(e), stmt.span))?;

        debug!(
            sources = plan.sources.len(),
            joins = plan.joins.len(),
            grouped = plan.is_grouped(),
            "Compiled statement"
        );
        Ok(plan)
    }

    fn compile_select_item(&self, item: &Spanned<Expr>) -> Result<SelectItem, CompileError> {
        match &item.value {
            Expr::Path { alias, field: None } => Ok(SelectItem::Entity(alias.clone())),
            _ => Ok(SelectItem::Expr(self.compile_expr(item)?)),
        }
    }

    fn compile_expr(&self, expr: &Spanned<Expr>) -> Result<PlanExpr, CompileError> {
        Ok(match &expr.value {
            Expr::Path {
                alias,
                field: Some(field),
            } => PlanExpr::field(alias, field),
            Expr::Path { alias, field: None } => {
                return Err(CompileError::invalid_query(
                    format!("entity alias '{}' cannot be used as a value", alias),
                    expr.span,
                ))
            }
            Expr::Operand(operand) => {
                PlanExpr::Literal(self.resolve(&Spanned::new(operand.clone(), expr.span))?)
            }
            Expr::Compare { op, left, right } => {
                PlanExpr::compare(*op, self.compile_expr(left)?, self.compile_expr(right)?)
            }
            Expr::Between {
                expr: inner,
                low,
                high,
                negated,
            } => {
                let between =
                    PlanExpr::between(self.compile_expr(inner)?, self.resolve(low)?, self.resolve(high)?)
                        .map_err(|e| {
                            CompileError::new(plan_message(e), expr.span, CompileErrorKind::InvalidRange)
                        })?;
                if *negated {
                    between.not()
                } else {
                    between
                }
            }
            Expr::In {
                expr: inner,
                values,
                negated,
            } => {
                let inner = self.compile_expr(inner)?;
                let values = values
                    .iter()
                    .map(|v| self.resolve(v))
                    .collect::<Result<Vec<_>, _>>()?;
                if *negated {
                    PlanExpr::not_in_values(inner, values)
                } else {
                    PlanExpr::in_values(inner, values)
                }
            }
            Expr::Like {
                expr: inner,
                pattern,
                negated,
            } => {
                let pattern = match self.resolve(pattern)? {
                    Value::String(s) => s,
                    other => {
                        return Err(CompileError::invalid_literal(
                            format!("like pattern must be a string, found {}", other.type_name()),
                            pattern.span,
                        ))
                    }
                };
                PlanExpr::Like {
                    expr: Box::new(self.compile_expr(inner)?),
                    pattern,
                    negated: *negated,
                }
            }
            Expr::IsNull {
                expr: inner,
                negated,
            } => {
                let inner = self.compile_expr(inner)?;
                if *negated {
                    PlanExpr::is_not_null(inner)
                } else {
                    PlanExpr::is_null(inner)
                }
            }
            Expr::And(parts) => self.combine(parts, PlanExpr::and)?,
            Expr::Or(parts) => self.combine(parts, PlanExpr::or)?,
            Expr::Not(inner) => self.compile_expr(inner)?.not(),
            Expr::Aggregate { function, arg } => self.compile_aggregate(*function, arg.as_deref())?,
        })
    }

    fn combine(
        &self,
        parts: &[Spanned<Expr>],
        op: fn(PlanExpr, PlanExpr) -> PlanExpr,
    ) -> Result<PlanExpr, CompileError> {
        let mut compiled = parts.iter().map(|p| self.compile_expr(p));
        let first = compiled
            .next()
            .ok_or_else(|| CompileError::invalid_query("empty condition", Span::default()))??;
        compiled.try_fold(first, |acc, next| Ok(op(acc, next?)))
    }

    fn compile_aggregate(
        &self,
        function: AggregateFunction,
        arg: Option<&Spanned<Expr>>,
    ) -> Result<PlanExpr, CompileError> {
        let arg = match arg {
            None => None,
            // count(m) counts rows.
            Some(Spanned {
                value: Expr::Path { field: None, .. },
                ..
            }) if function == AggregateFunction::Count => None,
            Some(arg) => Some(self.compile_expr(arg)?),
        };
        Ok(PlanExpr::aggregate(function, arg))
    }

    fn resolve(&self, operand: &Spanned<Operand>) -> Result<Value, CompileError> {
        match &operand.value {
            Operand::Literal(literal) => Ok(literal_value(literal.clone())),
            Operand::Param(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| CompileError::unbound_parameter(name, operand.span)),
        }
    }

    fn paging_value(&self, operand: &Spanned<Operand>) -> Result<i64, CompileError> {
        let value = self.resolve(operand)?;
        value.as_i64().filter(|_| !matches!(value, Value::Float64(_))).ok_or_else(|| {
            CompileError::invalid_literal(
                format!("expected an integer, found {}", value.type_name()),
                operand.span,
            )
        })
    }
}

fn plan_message(error: PlanError) -> String {
    match error {
        PlanError::InvalidRange(msg) | PlanError::InvalidPlan(msg) | PlanError::Serialization(msg) => {
            msg
        }
    }
}

/// Compile a statement with the given parameters.
pub fn compile(stmt: &SelectStatement, params: &Params) -> Result<QueryPlan, CompileError> {
    Compiler::new(params).compile(stmt)
}
