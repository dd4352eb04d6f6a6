//! Well-formedness check for SpiceDB schema text.
//!
//! This is not a full SpiceDB compiler. It parses the schema language
//! (definitions, relations, permissions, caveat blocks) and checks that every
//! name a schema uses is declared somewhere in it. Externally produced schema
//! candidates must pass this check before they can replace the baseline.

use std::collections::{HashMap, HashSet};
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number.
    pub line: usize,
    /// Column number, in characters.
    pub column: usize,
}

/// Schema text that failed to parse or names something it does not declare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema grammar error at line {line}, column {column}: {message}")]
pub struct GrammarError {
    /// Line of the offending token.
    pub line: usize,
    /// Column of the offending token.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

impl GrammarError {
    fn at(position: Position, message: impl Into<String>) -> Self {
        Self {
            line: position.line,
            column: position.column,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Colon,
    Eq,
    Pipe,
    Hash,
    Plus,
    Amp,
    Minus,
    Arrow,
    Dot,
    Star,
    Slash,
    /// Anything else; only legal inside caveat blocks.
    Other(char),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => format!("`{word}`"),
            Token::Str => "string literal".to_string(),
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Colon => "`:`".to_string(),
            Token::Eq => "`=`".to_string(),
            Token::Pipe => "`|`".to_string(),
            Token::Hash => "`#`".to_string(),
            Token::Plus => "`+`".to_string(),
            Token::Amp => "`&`".to_string(),
            Token::Minus => "`-`".to_string(),
            Token::Arrow => "`->`".to_string(),
            Token::Dot => "`.`".to_string(),
            Token::Star => "`*`".to_string(),
            Token::Slash => "`/`".to_string(),
            Token::Other(c) => format!("`{c}`"),
            Token::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    at: Position,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), GrammarError> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let start = self.position();
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.bump() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            let mut closed = false;
                            while let Some(c) = self.bump() {
                                if c == '*' && self.chars.peek() == Some(&'/') {
                                    self.bump();
                                    closed = true;
                                    break;
                                }
                            }
                            if !closed {
                                return Err(GrammarError::at(start, "unterminated comment"));
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_word(&mut self, first: char) -> String {
        let mut word = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn skip_string(&mut self, quote: char, start: Position) -> Result<(), GrammarError> {
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == quote {
                return Ok(());
            }
        }
        Err(GrammarError::at(start, "unterminated string literal"))
    }

    fn next_token(&mut self) -> Result<Spanned, GrammarError> {
        self.skip_whitespace_and_comments()?;
        let at = self.position();
        let Some(c) = self.bump() else {
            return Ok(Spanned {
                token: Token::Eof,
                at,
            });
        };

        let token = match c {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ':' => Token::Colon,
            '=' => Token::Eq,
            '|' => Token::Pipe,
            '#' => Token::Hash,
            '+' => Token::Plus,
            '&' => Token::Amp,
            '.' => Token::Dot,
            '*' => Token::Star,
            '/' => Token::Slash,
            '-' => {
                if self.chars.peek() == Some(&'>') {
                    self.bump();
                    Token::Arrow
                } else {
                    Token::Minus
                }
            }
            '"' | '\'' => {
                self.skip_string(c, at)?;
                Token::Str
            }
            c if c.is_ascii_alphanumeric() || c == '_' => Token::Word(self.read_word(c)),
            other => Token::Other(other),
        };
        Ok(Spanned { token, at })
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, GrammarError> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_token()?;
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                return Ok(tokens);
            }
        }
    }
}

/// A parsed permission expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// The empty set.
    Nil,
    /// A relation or permission of the enclosing definition.
    Reference {
        /// Referenced name.
        name: String,
        /// Where it appears.
        at: Position,
    },
    /// `via->target`, `via.any(target)` or `via.all(target)`, possibly chained.
    Arrow {
        /// Relation walked first.
        via: String,
        /// Names evaluated on the subjects reached, in order.
        targets: Vec<String>,
        /// Where `via` appears.
        at: Position,
    },
    /// `a + b`
    Union(Box<Expr>, Box<Expr>),
    /// `a & b`
    Intersection(Box<Expr>, Box<Expr>),
    /// `a - b`
    Exclusion(Box<Expr>, Box<Expr>),
}

/// One allowed subject type of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRef {
    /// Subject definition, including any `prefix/`.
    pub definition: String,
    /// `#relation` suffix, if any.
    pub relation: Option<String>,
    /// True for `definition:*`.
    pub wildcard: bool,
    /// Names after `with` (caveats or the `expiration` trait).
    pub traits: Vec<String>,
    /// Where the subject type appears.
    pub at: Position,
}

/// A `relation` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDecl {
    /// Relation name.
    pub name: String,
    /// Allowed subject types.
    pub subjects: Vec<SubjectRef>,
    /// Where the name appears.
    pub at: Position,
}

/// A `permission` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecl {
    /// Permission name.
    pub name: String,
    /// Its expression.
    pub expr: Expr,
    /// Where the name appears.
    pub at: Position,
}

/// A `definition` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    /// Definition name, including any `prefix/`.
    pub name: String,
    /// Relations in declaration order.
    pub relations: Vec<RelationDecl>,
    /// Permissions in declaration order.
    pub permissions: Vec<PermissionDecl>,
    /// Where the name appears.
    pub at: Position,
}

impl SchemaDefinition {
    /// True when `name` is a relation or permission of this definition.
    pub fn declares(&self, name: &str) -> bool {
        self.relations.iter().any(|r| r.name == name)
            || self.permissions.iter().any(|p| p.name == name)
    }
}

/// A schema that passed [`check_schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSchema {
    /// Definitions in declaration order.
    pub definitions: Vec<SchemaDefinition>,
    /// Names of declared caveats.
    pub caveats: Vec<String>,
}

impl ParsedSchema {
    /// Look up a definition by name.
    pub fn definition(&self, name: &str) -> Option<&SchemaDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }
}

/// Parse `text` and check that it is a well-formed, self-consistent schema.
pub fn check_schema(text: &str) -> Result<ParsedSchema, GrammarError> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        terms: 0,
    };
    let schema = parser.parse()?;
    check_names(&schema, parser.here())?;
    Ok(schema)
}

/// SpiceDB identifiers: lowercase ASCII letter first, then `[a-z0-9_]`.
fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Deepest parenthesis nesting accepted in a permission expression.
const MAX_NESTING: usize = 64;

/// Most operands accepted in one permission expression.
const MAX_TERMS: usize = 1024;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Open parentheses in the current expression.
    depth: usize,
    /// Operands parsed so far in the current expression.
    terms: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn here(&self) -> Position {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(Position { line: 1, column: 1 }, |s| s.at)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn unexpected(&self, expected: &str) -> GrammarError {
        GrammarError::at(
            self.here(),
            format!("expected {expected}, found {}", self.peek().describe()),
        )
    }

    fn expect(&mut self, expected: Token) -> Result<(), GrammarError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&expected.describe()))
        }
    }

    fn check_word(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Word(w) if w == word)
    }

    fn expect_identifier(&mut self, what: &str) -> Result<(String, Position), GrammarError> {
        let at = self.here();
        match self.peek().clone() {
            Token::Word(word) if is_identifier(&word) => {
                self.advance();
                Ok((word, at))
            }
            Token::Word(word) => Err(GrammarError::at(
                at,
                format!("`{word}` is not a valid {what}"),
            )),
            _ => Err(self.unexpected(what)),
        }
    }

    /// `name` or `prefix/name`.
    fn type_name(&mut self, what: &str) -> Result<(String, Position), GrammarError> {
        let (mut name, at) = self.expect_identifier(what)?;
        while *self.peek() == Token::Slash {
            self.advance();
            let (segment, _) = self.expect_identifier(what)?;
            name.push('/');
            name.push_str(&segment);
        }
        Ok((name, at))
    }

    fn parse(&mut self) -> Result<ParsedSchema, GrammarError> {
        let mut definitions = Vec::new();
        let mut caveats = Vec::new();

        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Word(w) if w == "definition" => {
                    self.advance();
                    definitions.push(self.parse_definition()?);
                }
                Token::Word(w) if w == "caveat" => {
                    self.advance();
                    caveats.push(self.parse_caveat()?);
                }
                Token::Word(w) if w == "use" => {
                    self.advance();
                    self.expect_identifier("feature name")?;
                }
                _ => return Err(self.unexpected("`definition` or `caveat`")),
            }
        }

        Ok(ParsedSchema {
            definitions,
            caveats,
        })
    }

    fn parse_definition(&mut self) -> Result<SchemaDefinition, GrammarError> {
        let (name, at) = self.type_name("definition name")?;
        self.expect(Token::LBrace)?;

        let mut relations = Vec::new();
        let mut permissions = Vec::new();
        loop {
            match self.peek() {
                Token::RBrace => {
                    self.advance();
                    break;
                }
                Token::Word(w) if w == "relation" => {
                    self.advance();
                    relations.push(self.parse_relation()?);
                }
                Token::Word(w) if w == "permission" => {
                    self.advance();
                    permissions.push(self.parse_permission()?);
                }
                _ => return Err(self.unexpected("`relation`, `permission` or `}`")),
            }
        }

        Ok(SchemaDefinition {
            name,
            relations,
            permissions,
            at,
        })
    }

    fn parse_relation(&mut self) -> Result<RelationDecl, GrammarError> {
        let (name, at) = self.expect_identifier("relation name")?;
        self.expect(Token::Colon)?;

        let mut subjects = vec![self.parse_subject()?];
        while *self.peek() == Token::Pipe {
            self.advance();
            subjects.push(self.parse_subject()?);
        }
        Ok(RelationDecl { name, subjects, at })
    }

    fn parse_subject(&mut self) -> Result<SubjectRef, GrammarError> {
        let (definition, at) = self.type_name("subject type")?;
        let mut relation = None;
        let mut wildcard = false;

        match self.peek() {
            Token::Hash => {
                self.advance();
                relation = Some(self.expect_identifier("subject relation")?.0);
            }
            Token::Colon => {
                self.advance();
                self.expect(Token::Star)?;
                wildcard = true;
            }
            _ => {}
        }

        let mut traits = Vec::new();
        if self.check_word("with") {
            self.advance();
            traits.push(self.type_name("caveat name")?.0);
            while self.check_word("and") {
                self.advance();
                traits.push(self.type_name("caveat name")?.0);
            }
        }

        Ok(SubjectRef {
            definition,
            relation,
            wildcard,
            traits,
            at,
        })
    }

    fn parse_permission(&mut self) -> Result<PermissionDecl, GrammarError> {
        let (name, at) = self.expect_identifier("permission name")?;
        self.expect(Token::Eq)?;
        self.depth = 0;
        self.terms = 0;
        let expr = self.parse_union()?;
        Ok(PermissionDecl { name, expr, at })
    }

    fn parse_union(&mut self) -> Result<Expr, GrammarError> {
        let mut lhs = self.parse_intersection()?;
        while *self.peek() == Token::Plus {
            self.advance();
            let rhs = self.parse_intersection()?;
            lhs = Expr::Union(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_intersection(&mut self) -> Result<Expr, GrammarError> {
        let mut lhs = self.parse_exclusion()?;
        while *self.peek() == Token::Amp {
            self.advance();
            let rhs = self.parse_exclusion()?;
            lhs = Expr::Intersection(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_exclusion(&mut self) -> Result<Expr, GrammarError> {
        let mut lhs = self.parse_term()?;
        while *self.peek() == Token::Minus {
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Exclusion(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, GrammarError> {
        self.terms += 1;
        if self.terms > MAX_TERMS {
            return Err(GrammarError::at(
                self.here(),
                format!("expression has more than {MAX_TERMS} operands"),
            ));
        }

        if *self.peek() == Token::LParen {
            if self.depth == MAX_NESTING {
                return Err(GrammarError::at(self.here(), "expression nested too deeply"));
            }
            self.depth += 1;
            self.advance();
            let inner = self.parse_union()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }
        if self.check_word("nil") {
            self.advance();
            return Ok(Expr::Nil);
        }

        let (name, at) = self.expect_identifier("relation or permission name")?;
        let mut targets = Vec::new();
        loop {
            match self.peek() {
                Token::Arrow => {
                    self.advance();
                    targets.push(self.expect_identifier("arrow target")?.0);
                }
                Token::Dot => {
                    self.advance();
                    if !(self.check_word("any") || self.check_word("all")) {
                        return Err(self.unexpected("`any` or `all`"));
                    }
                    self.advance();
                    self.expect(Token::LParen)?;
                    targets.push(self.expect_identifier("arrow target")?.0);
                    self.expect(Token::RParen)?;
                }
                _ => break,
            }
        }

        if targets.is_empty() {
            Ok(Expr::Reference { name, at })
        } else {
            Ok(Expr::Arrow {
                via: name,
                targets,
                at,
            })
        }
    }

    /// `caveat name(params) { expression }`; parameters and body are skipped.
    fn parse_caveat(&mut self) -> Result<String, GrammarError> {
        let (name, _) = self.type_name("caveat name")?;
        self.expect(Token::LParen)?;
        self.skip_group(Token::LParen, Token::RParen)?;
        self.expect(Token::LBrace)?;
        self.skip_group(Token::LBrace, Token::RBrace)?;
        Ok(name)
    }

    /// Skip to the token closing an already-consumed `open`.
    fn skip_group(&mut self, open: Token, close: Token) -> Result<(), GrammarError> {
        let start = self.here();
        let mut depth = 1usize;
        loop {
            let token = self.advance();
            if token == open {
                depth += 1;
            } else if token == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else if token == Token::Eof {
                return Err(GrammarError::at(
                    start,
                    format!("unclosed {} in caveat", open.describe()),
                ));
            }
        }
    }
}

fn check_names(schema: &ParsedSchema, end: Position) -> Result<(), GrammarError> {
    if schema.definitions.is_empty() {
        return Err(GrammarError::at(end, "schema declares no definitions"));
    }

    let mut definitions: HashMap<&str, &SchemaDefinition> = HashMap::new();
    for definition in &schema.definitions {
        if definitions.insert(&definition.name, definition).is_some() {
            return Err(GrammarError::at(
                definition.at,
                format!("definition `{}` is declared twice", definition.name),
            ));
        }

        let mut members = HashSet::new();
        let names = definition
            .relations
            .iter()
            .map(|r| (&r.name, r.at))
            .chain(definition.permissions.iter().map(|p| (&p.name, p.at)));
        for (name, at) in names {
            if !members.insert(name) {
                return Err(GrammarError::at(
                    at,
                    format!("`{name}` is declared twice in `{}`", definition.name),
                ));
            }
        }
    }

    let caveats: HashSet<&str> = schema.caveats.iter().map(String::as_str).collect();
    for definition in &schema.definitions {
        for relation in &definition.relations {
            for subject in &relation.subjects {
                let Some(target) = definitions.get(subject.definition.as_str()) else {
                    return Err(GrammarError::at(
                        subject.at,
                        format!(
                            "relation `{}#{}` allows undeclared type `{}`",
                            definition.name, relation.name, subject.definition
                        ),
                    ));
                };
                if let Some(name) = &subject.relation {
                    if !target.declares(name) {
                        return Err(GrammarError::at(
                            subject.at,
                            format!("`{}` declares no `{name}`", target.name),
                        ));
                    }
                }
                for name in &subject.traits {
                    if name != "expiration" && !caveats.contains(name.as_str()) {
                        return Err(GrammarError::at(
                            subject.at,
                            format!("undeclared caveat `{name}`"),
                        ));
                    }
                }
            }
        }

        for permission in &definition.permissions {
            check_expr(definition, &permission.expr)?;
        }
    }

    Ok(())
}

fn check_expr(definition: &SchemaDefinition, expr: &Expr) -> Result<(), GrammarError> {
    match expr {
        Expr::Nil => Ok(()),
        Expr::Reference { name, at } => {
            if definition.declares(name) {
                Ok(())
            } else {
                Err(GrammarError::at(
                    *at,
                    format!("`{}` declares no `{name}`", definition.name),
                ))
            }
        }
        Expr::Arrow { via, at, .. } => {
            if definition.relations.iter().any(|r| &r.name == via) {
                Ok(())
            } else {
                Err(GrammarError::at(
                    *at,
                    format!("arrow walks `{via}`, which is not a relation of `{}`", definition.name),
                ))
            }
        }
        Expr::Union(lhs, rhs) | Expr::Intersection(lhs, rhs) | Expr::Exclusion(lhs, rhs) => {
            check_expr(definition, lhs)?;
            check_expr(definition, rhs)
        }
    }
}
