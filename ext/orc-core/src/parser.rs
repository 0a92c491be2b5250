//! Schema string parser
//!
//! Accepts the type-description syntax used by ORC tooling:
//!
//! ```text
//! type := primitive
//!       | "struct<" name ":" type ("," name ":" type)* ">"
//!       | ("list<" | "array<") type ">"
//!       | "map<" type "," type ">"
//!       | "uniontype<" type ("," type)* ">"
//! ```
//!
//! Whitespace between tokens is ignored and type names are case-insensitive.

use std::collections::HashSet;
use std::str::FromStr;

use crate::schema::is_valid_name;
use crate::{OrcError, PrimitiveType, Result, Schema, SchemaNode};

/// Parse a schema string into a [`Schema`]
pub fn parse_schema(input: &str) -> Result<Schema> {
    let mut parser = Parser::new(input);
    let root = parser.parse_type("root".to_string())?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(parser.error(format!(
            "unexpected trailing input '{}'",
            &parser.input[parser.pos..]
        )));
    }
    Ok(Schema { root })
}

impl FromStr for Schema {
    type Err = OrcError;

    fn from_str(s: &str) -> Result<Self> {
        parse_schema(s)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error<S: Into<String>>(&self, msg: S) -> OrcError {
        OrcError::schema(self.pos, msg)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.input.as_bytes().get(self.pos) {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(format!(
                "expected '{}', found '{}'",
                expected as char, b as char
            ))),
            None => Err(self.error(format!(
                "expected '{}', found end of input",
                expected as char
            ))),
        }
    }

    /// Read a run of name characters (`[A-Za-z0-9_]`)
    fn word(&mut self) -> &'a str {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(b) = self.input.as_bytes().get(self.pos) {
            if !(b.is_ascii_alphanumeric() || *b == b'_') {
                break;
            }
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn parse_type(&mut self, name: String) -> Result<SchemaNode> {
        let start = {
            self.skip_whitespace();
            self.pos
        };
        let token = self.word();
        if token.is_empty() {
            return Err(match self.peek() {
                Some(b) => self.error(format!("expected a type, found '{}'", b as char)),
                None => self.error("expected a type, found end of input"),
            });
        }

        match token.to_ascii_lowercase().as_str() {
            "struct" => self.parse_struct(name),
            "list" | "array" => {
                self.expect(b'<')?;
                let item = self.parse_type("item".to_string())?;
                self.expect(b'>')?;
                Ok(SchemaNode::List {
                    name,
                    item: Box::new(item),
                })
            }
            "map" => {
                self.expect(b'<')?;
                let key = self.parse_type("key".to_string())?;
                self.expect(b',')?;
                let value = self.parse_type("value".to_string())?;
                self.expect(b'>')?;
                Ok(SchemaNode::Map {
                    name,
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            "uniontype" | "union" => self.parse_union(name),
            other => match PrimitiveType::from_orc_name(other) {
                Some(primitive_type) => Ok(SchemaNode::Primitive {
                    name,
                    primitive_type,
                }),
                None => Err(OrcError::schema(start, format!("unknown type '{}'", token))),
            },
        }
    }

    fn parse_struct(&mut self, name: String) -> Result<SchemaNode> {
        self.expect(b'<')?;
        let mut fields = Vec::new();
        let mut seen = HashSet::new();

        if self.peek() == Some(b'>') {
            return Err(self.error("struct must have at least one field"));
        }

        loop {
            let field_start = {
                self.skip_whitespace();
                self.pos
            };
            let field_name = self.word();
            if !is_valid_name(field_name) {
                return Err(self.error("expected a field name"));
            }
            if !seen.insert(field_name) {
                return Err(OrcError::schema(
                    field_start,
                    format!("duplicate field name '{}'", field_name),
                ));
            }
            self.expect(b':')?;
            fields.push(self.parse_type(field_name.to_string())?);

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b) => {
                    return Err(self.error(format!("expected ',' or '>', found '{}'", b as char)))
                }
                None => return Err(self.error("unbalanced '<' in struct")),
            }
        }

        Ok(SchemaNode::Struct { name, fields })
    }

    fn parse_union(&mut self, name: String) -> Result<SchemaNode> {
        self.expect(b'<')?;
        let mut variants = Vec::new();
        loop {
            if variants.len() == u8::MAX as usize {
                return Err(self.error("union must have at most 255 variants"));
            }
            variants.push(self.parse_type(variants.len().to_string())?);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b) => {
                    return Err(self.error(format!("expected ',' or '>', found '{}'", b as char)))
                }
                None => return Err(self.error("unbalanced '<' in union")),
            }
        }
        Ok(SchemaNode::Union { name, variants })
    }
}
