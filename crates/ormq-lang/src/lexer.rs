//! Lexer for the query language using logos.
//!
//! Keywords match case-insensitively; identifiers keep their case.

use logos::Logos;

use crate::error::ParseError;
use crate::span::Span;

/// Token types for the query language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Clause keywords
    #[token("select", ignore(ascii_case))]
    Select,
    #[token("from", ignore(ascii_case))]
    From,
    #[token("join", ignore(ascii_case))]
    Join,
    #[token("inner", ignore(ascii_case))]
    Inner,
    #[token("as", ignore(ascii_case))]
    As,
    #[token("where", ignore(ascii_case))]
    Where,
    #[token("group", ignore(ascii_case))]
    Group,
    #[token("having", ignore(ascii_case))]
    Having,
    #[token("order", ignore(ascii_case))]
    Order,
    #[token("by", ignore(ascii_case))]
    By,
    #[token("limit", ignore(ascii_case))]
    Limit,
    #[token("offset", ignore(ascii_case))]
    Offset,

    // Sort keywords
    #[token("asc", ignore(ascii_case))]
    Asc,
    #[token("desc", ignore(ascii_case))]
    Desc,
    #[token("nulls", ignore(ascii_case))]
    Nulls,
    #[token("first", ignore(ascii_case))]
    First,
    #[token("last", ignore(ascii_case))]
    Last,

    // Logical and predicate keywords
    #[token("and", ignore(ascii_case))]
    And,
    #[token("or", ignore(ascii_case))]
    Or,
    #[token("not", ignore(ascii_case))]
    Not,
    #[token("between", ignore(ascii_case))]
    Between,
    #[token("in", ignore(ascii_case))]
    In,
    #[token("like", ignore(ascii_case))]
    Like,
    #[token("is", ignore(ascii_case))]
    Is,

    // Literal keywords
    #[token("true", ignore(ascii_case))]
    True,
    #[token("false", ignore(ascii_case))]
    False,
    #[token("null", ignore(ascii_case))]
    Null,

    // Comparison operators
    #[token("=")]
    Eq,
    #[token("<>")]
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    /// Named parameter, without the colon.
    #[regex(r":[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    Param(String),

    /// Single-quoted string; a doubled quote stands for one quote.
    #[regex(r"'([^']|'')*'", |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].replace("''", "'")
    })]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("*")]
    Star,
}

impl Token {
    /// Human-readable token description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Param(name) => format!("parameter ':{}'", name),
            Token::String(s) => format!("string '{}'", s),
            Token::Int(i) => format!("integer {}", i),
            Token::Float(f) => format!("number {}", f),
            Token::Eq => "'='".to_string(),
            Token::Ne => "'<>'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Comma => "','".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Star => "'*'".to_string(),
            keyword => format!("'{}'", format!("{:?}", keyword).to_lowercase()),
        }
    }
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenize a source string.
///
/// Unrecognized input (including out-of-range numbers) is an error.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span: Span = lexer.span().into();
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => {
                return Err(ParseError::new(
                    format!("unexpected input '{}'", lexer.slice()),
                    span,
                ))
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_simple_select() {
        assert_eq!(
            tokens("select m from Member m"),
            vec![
                Token::Select,
                Token::Ident("m".into()),
                Token::From,
                Token::Ident("Member".into()),
                Token::Ident("m".into()),
            ]
        );
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(
            tokens("SELECT Where gRoUp BY"),
            vec![Token::Select, Token::Where, Token::Group, Token::By]
        );
        // Keyword prefixes stay identifiers.
        assert_eq!(tokens("selection"), vec![Token::Ident("selection".into())]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("= <> != < <= > >="),
            vec![
                Token::Eq,
                Token::Ne,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            tokens("10 -4 2.5 'it''s' :username null TRUE"),
            vec![
                Token::Int(10),
                Token::Int(-4),
                Token::Float(2.5),
                Token::String("it's".into()),
                Token::Param("username".into()),
                Token::Null,
                Token::True,
            ]
        );
    }

    #[test]
    fn test_invalid_input() {
        let err = tokenize("select m from Member m where m.age ~ 3").unwrap_err();
        assert_eq!(err.span, Span::new(35, 36));

        assert!(tokenize("'unterminated").is_err());
        assert!(tokenize("99999999999999999999").is_err());
    }

    #[test]
    fn test_spans() {
        let toks = tokenize("select m.age").unwrap();
        assert_eq!(toks[1].span, Span::new(7, 8));
        assert_eq!(toks[3].span, Span::new(9, 12));
    }
}
