use std::collections::HashSet;
use std::fmt;

use crate::{OrcError, Result};

/// Core schema representation for ORC files
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub root: SchemaNode,
}

/// Represents a node in the ORC schema tree
///
/// Every node is a column. Column ids are assigned in pre-order, with the
/// root as column 0.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// A struct with named fields
    Struct { name: String, fields: Vec<SchemaNode> },
    /// A list containing items of a single type
    List { name: String, item: Box<SchemaNode> },
    /// A map with key-value pairs
    Map {
        name: String,
        key: Box<SchemaNode>,
        value: Box<SchemaNode>,
    },
    /// A tagged union over a fixed set of variant types
    Union {
        name: String,
        variants: Vec<SchemaNode>,
    },
    /// A primitive/leaf type
    Primitive {
        name: String,
        primitive_type: PrimitiveType,
    },
}

/// Primitive data types supported by ORC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,

    // Integer types
    Int8,
    Int16,
    Int32,
    Int64,

    // Floating point types
    Float32,
    Float64,

    String,
    Binary,

    /// Days since the Unix epoch
    Date32,
    /// Nanoseconds since the Unix epoch
    Timestamp,
}

impl SchemaNode {
    /// Get the name of this schema node
    pub fn name(&self) -> &str {
        match self {
            SchemaNode::Struct { name, .. } => name,
            SchemaNode::List { name, .. } => name,
            SchemaNode::Map { name, .. } => name,
            SchemaNode::Union { name, .. } => name,
            SchemaNode::Primitive { name, .. } => name,
        }
    }

    /// Create a primitive node
    pub fn primitive<S: Into<String>>(name: S, primitive_type: PrimitiveType) -> Self {
        SchemaNode::Primitive {
            name: name.into(),
            primitive_type,
        }
    }

    /// Direct children in column order
    pub fn children(&self) -> Vec<&SchemaNode> {
        match self {
            SchemaNode::Struct { fields, .. } => fields.iter().collect(),
            SchemaNode::List { item, .. } => vec![item.as_ref()],
            SchemaNode::Map { key, value, .. } => vec![key.as_ref(), value.as_ref()],
            SchemaNode::Union { variants, .. } => variants.iter().collect(),
            SchemaNode::Primitive { .. } => Vec::new(),
        }
    }

    /// Number of columns in the subtree rooted at this node
    pub fn column_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(SchemaNode::column_count)
            .sum::<usize>()
    }

    /// The primitive type of a leaf node
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match self {
            SchemaNode::Primitive { primitive_type, .. } => Some(*primitive_type),
            _ => None,
        }
    }

    /// Human readable kind name, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SchemaNode::Struct { .. } => "Struct",
            SchemaNode::List { .. } => "List",
            SchemaNode::Map { .. } => "Map",
            SchemaNode::Union { .. } => "Union",
            SchemaNode::Primitive { primitive_type, .. } => primitive_type.type_name(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            SchemaNode::Struct { fields, .. } => {
                if fields.is_empty() {
                    return Err(OrcError::schema(0, "struct must have at least one field"));
                }
                let mut seen = HashSet::new();
                for field in fields {
                    if !is_valid_name(field.name()) {
                        return Err(OrcError::schema(
                            0,
                            format!("invalid field name '{}'", field.name()),
                        ));
                    }
                    if !seen.insert(field.name()) {
                        return Err(OrcError::schema(
                            0,
                            format!("duplicate field name '{}'", field.name()),
                        ));
                    }
                    field.validate()?;
                }
                Ok(())
            }
            SchemaNode::Union { variants, .. } => {
                if variants.is_empty() || variants.len() > u8::MAX as usize {
                    return Err(OrcError::schema(
                        0,
                        format!("union must have 1 to 255 variants, got {}", variants.len()),
                    ));
                }
                variants.iter().try_for_each(SchemaNode::validate)
            }
            SchemaNode::List { item, .. } => item.validate(),
            SchemaNode::Map { key, value, .. } => {
                key.validate()?;
                value.validate()
            }
            SchemaNode::Primitive { .. } => Ok(()),
        }
    }
}

pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaNode::Struct { fields, .. } => {
                f.write_str("struct<")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", field.name(), field)?;
                }
                f.write_str(">")
            }
            SchemaNode::List { item, .. } => write!(f, "list<{}>", item),
            SchemaNode::Map { key, value, .. } => write!(f, "map<{},{}>", key, value),
            SchemaNode::Union { variants, .. } => {
                f.write_str("uniontype<")?;
                for (idx, variant) in variants.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", variant)?;
                }
                f.write_str(">")
            }
            SchemaNode::Primitive { primitive_type, .. } => {
                f.write_str(primitive_type.orc_name())
            }
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

impl Schema {
    /// Parse a schema string such as `struct<name:string,age:int>`
    pub fn parse(input: &str) -> Result<Self> {
        crate::parser::parse_schema(input)
    }

    /// The columns a row carries, in order
    ///
    /// For a struct root these are its fields; any other root is a single
    /// column.
    pub fn top_level_fields(&self) -> &[SchemaNode] {
        match &self.root {
            SchemaNode::Struct { fields, .. } => fields,
            other => std::slice::from_ref(other),
        }
    }

    /// Number of values each row must carry
    pub fn row_arity(&self) -> usize {
        self.top_level_fields().len()
    }

    /// Total number of columns, including the root
    pub fn column_count(&self) -> usize {
        self.root.column_count()
    }
}

impl PrimitiveType {
    /// Get the logical type name for display
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Int8 => "Int8",
            PrimitiveType::Int16 => "Int16",
            PrimitiveType::Int32 => "Int32",
            PrimitiveType::Int64 => "Int64",
            PrimitiveType::Float32 => "Float32",
            PrimitiveType::Float64 => "Float64",
            PrimitiveType::String => "String",
            PrimitiveType::Binary => "Binary",
            PrimitiveType::Date32 => "Date32",
            PrimitiveType::Timestamp => "Timestamp",
        }
    }

    /// The type token used in schema strings
    pub fn orc_name(&self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Int8 => "tinyint",
            PrimitiveType::Int16 => "smallint",
            PrimitiveType::Int32 => "int",
            PrimitiveType::Int64 => "bigint",
            PrimitiveType::Float32 => "float",
            PrimitiveType::Float64 => "double",
            PrimitiveType::String => "string",
            PrimitiveType::Binary => "binary",
            PrimitiveType::Date32 => "date",
            PrimitiveType::Timestamp => "timestamp",
        }
    }

    /// Look up a primitive by its (case-insensitive) schema token
    pub fn from_orc_name(token: &str) -> Option<Self> {
        let ty = match token.to_ascii_lowercase().as_str() {
            "boolean" => PrimitiveType::Boolean,
            "tinyint" => PrimitiveType::Int8,
            "smallint" => PrimitiveType::Int16,
            "int" => PrimitiveType::Int32,
            "bigint" => PrimitiveType::Int64,
            "float" => PrimitiveType::Float32,
            "double" => PrimitiveType::Float64,
            "string" => PrimitiveType::String,
            "binary" => PrimitiveType::Binary,
            "date" => PrimitiveType::Date32,
            "timestamp" => PrimitiveType::Timestamp,
            _ => return None,
        };
        Some(ty)
    }
}

/// Builder for creating schemas
pub struct SchemaBuilder {
    root: Option<SchemaNode>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(mut self, root: SchemaNode) -> Self {
        self.root = Some(root);
        self
    }

    pub fn build(self) -> Result<Schema> {
        match self.root {
            Some(root) => {
                root.validate()?;
                Ok(Schema { root })
            }
            None => Err(OrcError::schema(0, "Schema must have a root node")),
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
