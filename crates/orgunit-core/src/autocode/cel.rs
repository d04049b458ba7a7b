//! A restricted CEL-style expression compiler.
//!
//! Grammar:
//!
//! ```text
//! expr  := term ( '+' term )*
//! term  := STRING | INT | 'true' | 'false'
//!        | IDENT '(' [ expr ( ',' expr )* ] ')'
//!        | '(' expr ')'
//! ```
//!
//! Compilation parses the source and type-checks it against the
//! functions declared in a [`CelEnv`]. There are no variables.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CelType {
    String,
    Int,
    Bool,
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Bool => f.write_str("bool"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    Call { name: String, args: Vec<Expr> },
    Add(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: &'static str,
    pub params: Vec<CelType>,
    pub result: CelType,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CelCompileError {
    #[error("syntax error at {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("undeclared function: {0}")]
    UndeclaredFunction(String),

    #[error("{name} expects ({expected}), got ({actual})")]
    ArgumentMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("operator + not defined for {0} and {1}")]
    OperatorMismatch(CelType, CelType),

    #[error("expression must evaluate to {expected}, got {actual}")]
    ResultType { expected: CelType, actual: CelType },
}

/// A parsed, type-checked expression.
#[derive(Debug, Clone)]
pub struct CelProgram {
    pub source: String,
    pub expr: Expr,
    pub result_type: CelType,
}

/// Declared functions an expression may call.
#[derive(Debug, Clone)]
pub struct CelEnv {
    functions: Vec<FunctionDecl>,
}

impl CelEnv {
    pub fn new(functions: Vec<FunctionDecl>) -> Self {
        Self { functions }
    }

    /// Environment for auto-code rules.
    pub fn auto_code() -> Self {
        Self::new(vec![FunctionDecl {
            name: super::NEXT_ORG_CODE_FN,
            params: vec![CelType::String, CelType::Int],
            result: CelType::String,
        }])
    }

    /// Parse and type-check `source`, requiring a result of `expected`.
    pub fn compile(&self, source: &str, expected: CelType) -> Result<CelProgram, CelCompileError> {
        let tokens = lex(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if let Some(tok) = parser.peek() {
            return Err(CelCompileError::Syntax {
                pos: tok.pos,
                message: format!("unexpected {}", tok.kind),
            });
        }
        let actual = self.check(&expr)?;
        if actual != expected {
            return Err(CelCompileError::ResultType { expected, actual });
        }
        Ok(CelProgram {
            source: source.to_string(),
            expr,
            result_type: actual,
        })
    }

    fn check(&self, expr: &Expr) -> Result<CelType, CelCompileError> {
        match expr {
            Expr::Str(_) => Ok(CelType::String),
            Expr::Int(_) => Ok(CelType::Int),
            Expr::Bool(_) => Ok(CelType::Bool),
            Expr::Add(lhs, rhs) => match (self.check(lhs)?, self.check(rhs)?) {
                (CelType::String, CelType::String) => Ok(CelType::String),
                (CelType::Int, CelType::Int) => Ok(CelType::Int),
                (l, r) => Err(CelCompileError::OperatorMismatch(l, r)),
            },
            Expr::Call { name, args } => {
                let decl = self
                    .functions
                    .iter()
                    .find(|f| f.name == name.as_str())
                    .ok_or_else(|| CelCompileError::UndeclaredFunction(name.clone()))?;
                let actual = args
                    .iter()
                    .map(|a| self.check(a))
                    .collect::<Result<Vec<_>, _>>()?;
                if actual != decl.params {
                    return Err(CelCompileError::ArgumentMismatch {
                        name: name.clone(),
                        expected: join_types(&decl.params),
                        actual: join_types(&actual),
                    });
                }
                Ok(decl.result)
            }
        }
    }
}

fn join_types(types: &[CelType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    Comma,
    Plus,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "identifier {s}"),
            Self::Str(s) => write!(f, "string {s:?}"),
            Self::Int(n) => write!(f, "int {n}"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
            Self::Plus => f.write_str("'+'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn lex(source: &str) -> Result<Vec<Token>, CelCompileError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' | ')' | ',' | '+' => {
                let kind = match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ',' => TokenKind::Comma,
                    _ => TokenKind::Plus,
                };
                tokens.push(Token { kind, pos });
                i += 1;
            }
            '"' => {
                let mut value = String::new();
                i += 1;
                loop {
                    let Some(&(_, c)) = chars.get(i) else {
                        return Err(CelCompileError::Syntax {
                            pos,
                            message: "unterminated string".into(),
                        });
                    };
                    i += 1;
                    match c {
                        '"' => break,
                        '\\' => {
                            let Some(&(_, esc)) = chars.get(i) else {
                                return Err(CelCompileError::Syntax {
                                    pos,
                                    message: "unterminated escape".into(),
                                });
                            };
                            i += 1;
                            value.push(match esc {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                        }
                        other => value.push(other),
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    pos,
                });
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while chars.get(i).is_some_and(|(_, c)| c.is_ascii_digit()) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let n = text.parse::<i64>().map_err(|_| CelCompileError::Syntax {
                    pos,
                    message: format!("invalid int literal {text:?}"),
                })?;
                tokens.push(Token {
                    kind: TokenKind::Int(n),
                    pos,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                tokens.push(Token {
                    kind: TokenKind::Ident(text),
                    pos,
                });
            }
            other => {
                return Err(CelCompileError::Syntax {
                    pos,
                    message: format!("unexpected character {other:?}"),
                });
            }
        }
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn end_pos(&self) -> usize {
        self.tokens.last().map_or(0, |t| t.pos + 1)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CelCompileError> {
        match self.next() {
            Some(tok) if tok.kind == kind => Ok(()),
            Some(tok) => Err(CelCompileError::Syntax {
                pos: tok.pos,
                message: format!("expected {kind}, found {}", tok.kind),
            }),
            None => Err(CelCompileError::Syntax {
                pos: self.end_pos(),
                message: format!("expected {kind}, found end of input"),
            }),
        }
    }

    fn expr(&mut self) -> Result<Expr, CelCompileError> {
        let mut lhs = self.term()?;
        while self.peek().is_some_and(|t| t.kind == TokenKind::Plus) {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, CelCompileError> {
        let end = self.end_pos();
        let tok = self.next().ok_or(CelCompileError::Syntax {
            pos: end,
            message: "unexpected end of input".into(),
        })?;
        match tok.kind {
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Int(n) => Ok(Expr::Int(n)),
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) if name == "true" => Ok(Expr::Bool(true)),
            TokenKind::Ident(name) if name == "false" => Ok(Expr::Bool(false)),
            TokenKind::Ident(name) => {
                self.expect(TokenKind::LParen)?;
                let mut args = Vec::new();
                if self.peek().is_some_and(|t| t.kind == TokenKind::RParen) {
                    self.pos += 1;
                    return Ok(Expr::Call { name, args });
                }
                loop {
                    args.push(self.expr()?);
                    match self.next() {
                        Some(Token {
                            kind: TokenKind::Comma,
                            ..
                        }) => continue,
                        Some(Token {
                            kind: TokenKind::RParen,
                            ..
                        }) => break,
                        Some(other) => {
                            return Err(CelCompileError::Syntax {
                                pos: other.pos,
                                message: format!("expected ',' or ')', found {}", other.kind),
                            });
                        }
                        None => {
                            return Err(CelCompileError::Syntax {
                                pos: end,
                                message: "unterminated argument list".into(),
                            });
                        }
                    }
                }
                Ok(Expr::Call { name, args })
            }
            other => Err(CelCompileError::Syntax {
                pos: tok.pos,
                message: format!("unexpected {other}"),
            }),
        }
    }
}
