//! Protocol message extraction
//!
//! A deliberately small `.proto` reader: it finds the first top-level
//! `message` in a file and lists its fields (plain, `repeated`, `map<..>`
//! and `oneof` members) together with the file's imports. Nested messages,
//! enums, services and options are skipped over, not interpreted.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{CheckError, Result};

/// Lexer for the subset of proto syntax we need
const TOKEN_PATTERN: &str = r#"(?s)//[^\n]*|/\*.*?\*/|"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\.?[A-Za-z_][A-Za-z0-9_.]*|-?[0-9][0-9A-Za-z_.]*|\S"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldLabel {
    Singular,
    Optional,
    Required,
    Repeated,
    Map,
    /// Member of the named `oneof`
    Oneof(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtoField {
    pub name: String,
    /// Declared type, `map<K, V>` for map fields
    pub type_name: String,
    pub number: u32,
    pub label: FieldLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Name and fields of one protocol message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtoMessage {
    pub name: String,
    pub fields: IndexMap<String, ProtoField>,
    pub imports: Vec<String>,
}

impl ProtoMessage {
    /// Descriptor with bare field names, for callers that have no `.proto`
    pub fn from_field_names<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(i, field)| {
                let field = field.into();
                (
                    field.clone(),
                    ProtoField {
                        name: field,
                        type_name: "string".into(),
                        number: i as u32 + 1,
                        label: FieldLabel::Singular,
                        comment: None,
                    },
                )
            })
            .collect();
        Self {
            name: name.into(),
            fields,
            imports: Vec::new(),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// Where message descriptors come from
pub trait MessageSource {
    fn message(&self, path: &Path) -> Result<ProtoMessage>;
}

/// Reads and parses `.proto` files from disk
pub struct ProtoFileSource {
    parser: ProtoParser,
}

impl ProtoFileSource {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parser: ProtoParser::new()?,
        })
    }
}

impl MessageSource for ProtoFileSource {
    fn message(&self, path: &Path) -> Result<ProtoMessage> {
        let text = fs::read_to_string(path).map_err(|source| CheckError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parser.parse(path, &text)
    }
}

/// Parse one `.proto` source with a throwaway parser
pub fn parse_proto(path: &Path, text: &str) -> Result<ProtoMessage> {
    ProtoParser::new()?.parse(path, text)
}

pub struct ProtoParser {
    token: Regex,
}

impl ProtoParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            token: Regex::new(TOKEN_PATTERN)?,
        })
    }

    pub fn parse(&self, path: &Path, text: &str) -> Result<ProtoMessage> {
        let mut cursor = Cursor::new(path, self.tokenize(text));
        let mut imports = Vec::new();
        let mut message: Option<(String, IndexMap<String, ProtoField>)> = None;

        while let Some(tok) = cursor.peek() {
            match tok {
                "import" => {
                    cursor.bump();
                    if matches!(cursor.peek(), Some("public") | Some("weak")) {
                        cursor.bump();
                    }
                    let file = cursor.string_literal()?;
                    cursor.expect(";")?;
                    imports.push(file);
                }
                "message" => {
                    cursor.bump();
                    let name = cursor.ident()?.to_string();
                    if message.is_none() {
                        let fields = cursor.message_body()?;
                        message = Some((name, fields));
                    } else {
                        cursor.skip_block()?;
                    }
                }
                "enum" | "service" | "extend" => {
                    cursor.bump();
                    cursor.skip_to_block()?;
                }
                ";" => cursor.bump(),
                _ => cursor.skip_statement()?,
            }
        }

        let (name, fields) = message.ok_or_else(|| CheckError::Proto {
            path: path.to_path_buf(),
            reason: "no message definition found".into(),
        })?;
        debug!("Parsed proto message {} with {} fields from {}", name, fields.len(), path.display());

        Ok(ProtoMessage { name, fields, imports })
    }

    fn tokenize<'a>(&self, text: &'a str) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        let mut line = 1;
        let mut last = 0;
        for m in self.token.find_iter(text) {
            line += text[last..m.start()].matches('\n').count();
            last = m.start();
            tokens.push(Token { text: m.as_str(), line });
        }
        tokens
    }
}

struct Token<'a> {
    text: &'a str,
    line: usize,
}

fn is_comment(text: &str) -> bool {
    text.starts_with("//") || text.starts_with("/*")
}

fn comment_body(text: &str) -> String {
    if let Some(rest) = text.strip_prefix("//") {
        return rest.trim().to_string();
    }
    let inner = text.trim_start_matches("/*").trim_end_matches("*/");
    inner
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Code tokens with comments split off and attached to their neighbours
struct Cursor<'a> {
    path: PathBuf,
    code: Vec<Token<'a>>,
    /// Comment block directly before code token `i`
    leading: Vec<Option<String>>,
    /// Comment on the same line after code token `i`
    trailing: Vec<Option<String>>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(path: &Path, tokens: Vec<Token<'a>>) -> Self {
        let mut code: Vec<Token<'a>> = Vec::new();
        let mut leading = Vec::new();
        let mut trailing: Vec<Option<String>> = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for tok in tokens {
            if is_comment(tok.text) {
                let body = comment_body(tok.text);
                let same_line = code.last().map(|prev| prev.line == tok.line).unwrap_or(false);
                if same_line && pending.is_empty() {
                    if let Some(slot) = trailing.last_mut() {
                        *slot = Some(body);
                    }
                } else if !body.is_empty() {
                    pending.push(body);
                }
                continue;
            }
            leading.push((!pending.is_empty()).then(|| pending.join(" ")));
            pending.clear();
            trailing.push(None);
            code.push(tok);
        }

        Self {
            path: path.to_path_buf(),
            code,
            leading,
            trailing,
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> CheckError {
        let reason = reason.into();
        let reason = match self.code.get(self.pos) {
            Some(tok) => format!("line {}: {}", tok.line, reason),
            None => format!("end of file: {}", reason),
        };
        CheckError::Proto {
            path: self.path.clone(),
            reason,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.code.get(self.pos).map(|t| t.text)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn next(&mut self) -> Result<&'a str> {
        let tok = self.peek().ok_or_else(|| self.error("unexpected end of file"))?;
        self.bump();
        Ok(tok)
    }

    fn expect(&mut self, want: &str) -> Result<()> {
        match self.peek() {
            Some(tok) if tok == want => {
                self.bump();
                Ok(())
            }
            Some(tok) => Err(self.error(format!("expected '{}', found '{}'", want, tok))),
            None => Err(self.error(format!("expected '{}'", want))),
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        let tok = self.next()?;
        let first = tok.trim_start_matches('.').chars().next();
        if first.map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false) {
            Ok(tok)
        } else {
            self.pos -= 1;
            Err(self.error(format!("expected identifier, found '{}'", tok)))
        }
    }

    fn string_literal(&mut self) -> Result<String> {
        let tok = self.next()?;
        let quoted = (tok.starts_with('"') && tok.ends_with('"')) || (tok.starts_with('\'') && tok.ends_with('\''));
        if quoted && tok.len() >= 2 {
            Ok(tok[1..tok.len() - 1].to_string())
        } else {
            self.pos -= 1;
            Err(self.error(format!("expected string literal, found '{}'", tok)))
        }
    }

    /// Skip a `{ ... }` block starting at the current token
    fn skip_block(&mut self) -> Result<()> {
        self.expect("{")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                "{" => depth += 1,
                "}" => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Skip a header like `Name` or `Name.Ext` and the block after it
    fn skip_to_block(&mut self) -> Result<()> {
        while self.peek().map(|t| t != "{").unwrap_or(false) {
            self.bump();
        }
        self.skip_block()
    }

    /// Skip to the `;` ending the current statement, stepping over blocks
    fn skip_statement(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(";") => {
                    self.bump();
                    return Ok(());
                }
                Some("{") => self.skip_block()?,
                Some(_) => self.bump(),
                None => return Err(self.error("unterminated statement")),
            }
        }
    }

    fn message_body(&mut self) -> Result<IndexMap<String, ProtoField>> {
        self.expect("{")?;
        let mut fields = IndexMap::new();

        loop {
            let tok = self.peek().ok_or_else(|| self.error("unterminated message"))?;
            match tok {
                "}" => {
                    self.bump();
                    break;
                }
                "message" | "enum" | "extend" => {
                    self.bump();
                    self.skip_to_block()?;
                }
                "oneof" => {
                    self.bump();
                    let group = self.ident()?.to_string();
                    self.expect("{")?;
                    while self.peek() != Some("}") {
                        if self.peek() == Some("option") {
                            self.skip_statement()?;
                            continue;
                        }
                        let field = self.field(Some(&group))?;
                        fields.insert(field.name.clone(), field);
                    }
                    self.expect("}")?;
                }
                "option" | "reserved" | "extensions" => self.skip_statement()?,
                ";" => self.bump(),
                _ => {
                    let field = self.field(None)?;
                    fields.insert(field.name.clone(), field);
                }
            }
        }

        Ok(fields)
    }

    fn field(&mut self, oneof: Option<&str>) -> Result<ProtoField> {
        let start = self.pos;

        let mut label = match oneof {
            Some(group) => FieldLabel::Oneof(group.to_string()),
            None => FieldLabel::Singular,
        };
        let explicit = match self.peek() {
            Some("repeated") => Some(FieldLabel::Repeated),
            Some("optional") => Some(FieldLabel::Optional),
            Some("required") => Some(FieldLabel::Required),
            _ => None,
        };
        if let Some(explicit) = explicit {
            label = explicit;
            self.bump();
        }

        let type_name = if self.peek() == Some("map") && self.code.get(self.pos + 1).map(|t| t.text) == Some("<") {
            self.bump();
            self.expect("<")?;
            let key = self.ident()?;
            self.expect(",")?;
            let value = self.ident()?;
            self.expect(">")?;
            label = FieldLabel::Map;
            format!("map<{}, {}>", key, value)
        } else {
            self.ident()?.to_string()
        };

        let name = self.ident()?.to_string();
        self.expect("=")?;
        let number_tok = self.next()?;
        let number = number_tok
            .parse::<u32>()
            .map_err(|_| self.error(format!("invalid field number '{}' for '{}'", number_tok, name)))?;
        if self.peek() == Some("[") {
            while self.peek().map(|t| t != "]").unwrap_or(false) {
                self.bump();
            }
            self.expect("]")?;
        }
        self.expect(";")?;

        let comment = self.leading[start]
            .clone()
            .or_else(|| self.trailing[self.pos - 1].clone());

        Ok(ProtoField {
            name,
            type_name,
            number,
            label,
            comment,
        })
    }
}
