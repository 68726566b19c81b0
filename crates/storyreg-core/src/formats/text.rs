//! # Text Format
//!
//! Lexer and recursive-descent parser for story source text.
//!
//! ```text
//! story(greet)
//! {
//!     say("hello");
//!     if(ready) { say("go"); } else { wait(100); };
//! };
//! ```
//!
//! Grammar:
//!
//! ```text
//! document  := { statement [";"] }
//! statement := function { function }
//! function  := call [ "{" { statement [";"] } "}" ]
//! call      := IDENT [ "(" [ value { "," value } ] ")" ]
//! value     := call | NUMBER | STRING
//! ```
//!
//! A segment only chains onto the previous one after a `}`; a `;` always
//! ends the statement.

use crate::dsl::{CallData, DslDocument, DslNode, DslValue, FunctionData};
use crate::primitives::MAX_NESTING_DEPTH;
use crate::types::StoryError;
use logos::Logos;

/// Story DSL token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,

    /// Identifier; `$` and `@` prefixes mark variables in story scripts.
    #[regex(r"[A-Za-z_$@][A-Za-z0-9_.$@]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unescape(lex.slice()))]
    Str(String),
}

/// Strip the quotes of a string literal and resolve escapes.
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Tokenize `source`, pairing each token with its 1-based line.
pub fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, StoryError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    let mut line = 1;
    let mut scanned = 0;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        line += source[scanned..span.start].matches('\n').count();
        scanned = span.start;

        match result {
            Ok(token) => tokens.push((token, line)),
            Err(()) => {
                return Err(StoryError::Parse {
                    line,
                    message: format!("unexpected character sequence '{}'", lexer.slice()),
                });
            }
        }
    }

    Ok(tokens)
}

/// Parse story source text into a document.
///
/// `name` is recorded on the document for diagnostics. Source without any
/// tokens is `StoryError::EmptyDocument`.
pub fn parse_document(source: &str, name: &str) -> Result<DslDocument, StoryError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(StoryError::EmptyDocument);
    }

    let mut parser = Parser::new(&tokens);
    let mut nodes = Vec::new();
    while !parser.at_end() {
        if parser.eat(&Token::Semi) {
            continue;
        }
        nodes.push(parser.statement()?);
    }

    Ok(DslDocument::new(name, nodes))
}

struct Parser<'t> {
    tokens: &'t [(Token, usize)],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [(Token, usize)]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(t, _)| t)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> StoryError {
        StoryError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), StoryError> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(match self.peek() {
            Some(found) => self.error(format!("expected {}, found {:?}", what, found)),
            None => self.error(format!("expected {}, found end of input", what)),
        })
    }

    /// Step into a block or parameter list.
    fn enter(&mut self) -> Result<(), StoryError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error(format!("nested deeper than {}", MAX_NESTING_DEPTH)));
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<DslNode, StoryError> {
        let mut functions = Vec::new();
        loop {
            let (function, has_body) = self.function()?;
            functions.push(function);
            let chains = has_body && matches!(self.peek(), Some(Token::Ident(_)));
            if !chains {
                break;
            }
        }
        Ok(DslNode::from_functions(functions))
    }

    fn function(&mut self) -> Result<(FunctionData, bool), StoryError> {
        let call = self.call()?;
        if !self.eat(&Token::LBrace) {
            return Ok((FunctionData::new(call, Vec::new()), false));
        }

        self.enter()?;
        let mut statements = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => break,
                Some(Token::Semi) => {
                    self.pos += 1;
                }
                Some(_) => statements.push(self.statement()?),
                None => return Err(self.error("unclosed '{'")),
            }
        }
        self.expect(&Token::RBrace, "'}'")?;
        self.depth -= 1;

        Ok((FunctionData::new(call, statements), true))
    }

    fn call(&mut self) -> Result<CallData, StoryError> {
        let name = match self.advance() {
            Some(Token::Ident(name)) => name,
            Some(other) => {
                self.pos -= 1;
                return Err(self.error(format!("expected identifier, found {:?}", other)));
            }
            None => return Err(self.error("expected identifier, found end of input")),
        };

        let mut params = Vec::new();
        if self.eat(&Token::LParen) && !self.eat(&Token::RParen) {
            self.enter()?;
            loop {
                params.push(self.value()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen, "',' or ')'")?;
                break;
            }
            self.depth -= 1;
        }

        Ok(CallData::new(name, params))
    }

    fn value(&mut self) -> Result<DslValue, StoryError> {
        match self.peek() {
            Some(Token::Ident(_)) if self.peek_nth(1) == Some(&Token::LParen) => {
                Ok(DslValue::Call(self.call()?))
            }
            Some(Token::Ident(name)) => {
                let value = DslValue::Ident(name.clone());
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Number(number)) => {
                let value = DslValue::Number(number.clone());
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Str(text)) => {
                let value = DslValue::Str(text.clone());
                self.pos += 1;
                Ok(value)
            }
            Some(other) => Err(self.error(format!("expected a value, found {:?}", other))),
            None => Err(self.error("expected a value, found end of input")),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
