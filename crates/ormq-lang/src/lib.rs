//! ORMQ Query Language
//!
//! A JPQL-style text syntax that compiles to the same [`QueryPlan`] the
//! typed builder produces.
//!
//! # Syntax
//!
//! ```text
//! select m from Member m where m.username = :username
//! select m from Member m join m.team t where t.name = 'teamA'
//! select t.name, avg(m.age) from Member m join m.team t group by t.name having avg(m.age) > 10
//! select m from Member m, Team t where m.username = t.name
//! select m from Member m where m.age between 10 and 30 and m.username like 'member%'
//! select m from Member m order by m.age desc, m.username asc nulls last limit 2 offset 1
//! ```
//!
//! Keywords are case-insensitive. Strings use single quotes; `''` inside a
//! string is one quote.
//!
//! # Usage
//!
//! ```rust
//! use ormq_lang::{parse_and_compile, Params};
//!
//! let params = Params::new().with("username", "member1");
//! let plan = parse_and_compile("select m from Member m where m.username = :username", &params)
//!     .unwrap();
//! assert_eq!(plan.sources[0].entity, "Member");
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use ast::{Expr, FromItem, JoinClause, Literal, Operand, OrderItem, SelectStatement};
pub use compiler::{Compiler, Params};
pub use error::{CompileError, CompileErrorKind, LangError, ParseError};
pub use span::{Span, Spanned};

use ormq_proto::QueryPlan;

/// Parse a source string into a statement.
pub fn parse(source: &str) -> Result<SelectStatement, ParseError> {
    parser::parse(source)
}

/// Compile a statement, binding `params`.
pub fn compile(stmt: &SelectStatement, params: &Params) -> Result<QueryPlan, CompileError> {
    compiler::compile(stmt, params)
}

/// Parse and compile a source string in one step.
pub fn parse_and_compile(source: &str, params: &Params) -> Result<QueryPlan, LangError> {
    let stmt = parse(source)?;
    Ok(compile(&stmt, params)?)
}

/// Tokenize a source string (for debugging/testing).
pub fn tokenize(source: &str) -> Result<Vec<lexer::SpannedToken>, ParseError> {
    lexer::tokenize(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_compile() {
        let plan = parse_and_compile("SELECT m FROM Member m WHERE m.age > 18", &Params::new())
            .unwrap();
        assert!(plan.filter.is_some());
    }

    #[test]
    fn test_error_with_source_context() {
        let source = "select m from Member m where m.username = :who";
        let err = parse_and_compile(source, &Params::new()).unwrap_err();
        assert!(matches!(err, LangError::Compile(_)));
        let formatted = err.format_with_source(source);
        assert!(formatted.contains("line 1"));
        assert!(formatted.contains("error"));

        let source = "select m from";
        let err = parse_and_compile(source, &Params::new()).unwrap_err();
        assert!(matches!(err, LangError::Parse(_)));
        assert_eq!(err.span(), Span::new(13, 13));
    }
}
