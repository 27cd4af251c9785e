use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw-value-to-label mapping (DBC `VAL_TABLE_` section).
pub type ValueTable = BTreeMap<i64, String>;

/// DBC-specific extension data carried alongside the core network model.
///
/// Four independent key→value mappings. Each value type is comparable
/// (`PartialEq`), which is what the merge engine relies on to detect
/// conflicting definitions between two databases.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Metadata {
    /// Attribute definitions (DBC `BA_DEF_` + `BA_DEF_DEF_`), keyed by name.
    pub attribute_definitions: BTreeMap<String, AttributeDefinition>,
    /// Database-level attribute values (DBC `BA_`), keyed by name.
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Environment variables (DBC `EV_`), keyed by name.
    pub environment_variables: BTreeMap<String, EnvironmentVariable>,
    /// Named value tables (DBC `VAL_TABLE_`), keyed by table name.
    pub value_tables: BTreeMap<String, ValueTable>,
}

impl Metadata {
    /// True when all four mappings are empty.
    pub fn is_empty(&self) -> bool {
        self.attribute_definitions.is_empty()
            && self.attributes.is_empty()
            && self.environment_variables.is_empty()
            && self.value_tables.is_empty()
    }
}

/// Attribute definition (DBC `BA_DEF_`) with its optional default value.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute name.
    pub name: String,
    /// Kind of object the attribute applies to.
    pub object: AttrObject,
    /// Attribute kind.
    pub kind: AttrType,
    /// Minimum, for numeric kinds.
    pub minimum: Option<f64>,
    /// Maximum, for numeric kinds.
    pub maximum: Option<f64>,
    /// Allowed values, for the enum kind.
    pub enum_values: Vec<String>,
    /// Default value (DBC `BA_DEF_DEF_`).
    pub default: Option<AttributeValue>,
}

/// Attribute kind.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AttrType {
    #[default]
    String,
    Int,
    Hex,
    Float,
    Enum,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrType::String => "STRING",
            AttrType::Int => "INT",
            AttrType::Hex => "HEX",
            AttrType::Float => "FLOAT",
            AttrType::Enum => "ENUM",
        })
    }
}

/// Kind of object an attribute definition applies to.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AttrObject {
    #[default]
    Database,
    Node,
    Message,
    Signal,
}

impl AttrObject {
    /// DBC keyword between `BA_DEF_` and the attribute name (empty for the
    /// database scope).
    pub fn dbc_keyword(&self) -> &'static str {
        match self {
            AttrObject::Database => "",
            AttrObject::Node => "BU_",
            AttrObject::Message => "BO_",
            AttrObject::Signal => "SG_",
        }
    }
}

impl fmt::Display for AttrObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrObject::Database => "Database",
            AttrObject::Node => "Node",
            AttrObject::Message => "Message",
            AttrObject::Signal => "Signal",
        })
    }
}

/// A concrete attribute value.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Hex(u64),
    Float(f64),
    Enum(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(s) => write!(f, "{}", s),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Hex(h) => write!(f, "0x{:X}", h),
            AttributeValue::Float(x) => {
                // compact print, without trailing zeros
                let mut s = format!("{}", x);
                if s.contains('.') {
                    while s.ends_with('0') {
                        s.pop();
                    }
                    if s.ends_with('.') {
                        s.pop();
                    }
                }
                f.write_str(&s)
            }
            AttributeValue::Enum(s) => write!(f, "{}", s),
        }
    }
}

/// Environment variable (DBC `EV_` section), a simulation-tool extension
/// distinct from process environment variables.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    /// Variable name.
    pub name: String,
    /// DBC variable type code (0 = integer, 1 = float, 2 = string).
    pub kind: u8,
    /// Minimum value.
    pub minimum: f64,
    /// Maximum value.
    pub maximum: f64,
    /// Unit of measure.
    pub unit: String,
    /// Initial value.
    pub initial_value: f64,
    /// Associated comment.
    pub comment: String,
}
