//! Runtime values produced by compile-time evaluation, trimmed to exactly
//! the supported-constructs list: no `List`/`Set`/`Map`/`Text` collection
//! types (those require heap allocation and I/O-adjacent machinery out of
//! scope for a pure, step-budgeted evaluator), only fixed-size
//! `Tuple`/`Array`.

use home_base::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub enum ComptimeValue {
    /// Signed integers are carried widened to `i128` during evaluation;
    /// `home-codegen` narrows back to the declared width when it
    /// materializes a `ConstValue`.
    Int(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    Unit,
    Tuple(Vec<ComptimeValue>),
    Array(Vec<ComptimeValue>),
    Struct {
        name: Symbol,
        fields: Vec<(Symbol, ComptimeValue)>,
    },
    EnumVariant {
        enum_name: Symbol,
        variant: Symbol,
        fields: Vec<ComptimeValue>,
    },
}

impl ComptimeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ComptimeValue::Int(_) => "integer",
            ComptimeValue::Float(_) => "float",
            ComptimeValue::Bool(_) => "bool",
            ComptimeValue::Char(_) => "char",
            ComptimeValue::Unit => "unit",
            ComptimeValue::Tuple(_) => "tuple",
            ComptimeValue::Array(_) => "array",
            ComptimeValue::Struct { .. } => "struct",
            ComptimeValue::EnumVariant { .. } => "enum variant",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ComptimeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            ComptimeValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn field(&self, name: Symbol) -> Option<&ComptimeValue> {
        match self {
            ComptimeValue::Struct { fields, .. } => fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}
