//! Attribute values attached to operations.

use std::collections::BTreeMap;

use itertools::Itertools;

/// Payload of a constant tensor, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum DenseElements {
    Float(Vec<f64>),
    Int(Vec<i64>),
}

impl DenseElements {
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Self::Float(v) => Some(v),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            Self::Int(v) => Some(v),
            Self::Float(_) => None,
        }
    }
}

/// Compile-time constant attached to an operation under a name.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ints(Vec<i64>),
    Dense(DenseElements),
}

impl Attribute {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_dense(&self) -> Option<&DenseElements> {
        match self {
            Self::Dense(d) => Some(d),
            _ => None,
        }
    }
}

macro_rules! impl_attribute_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Attribute {
            fn from(value: $ty) -> Self {
                Self::$variant(value.into())
            }
        })*
    };
}

impl_attribute_from! {
    bool => Bool, i64 => Int, f64 => Float,
    String => Str, &str => Str,
    Vec<i64> => Ints, DenseElements => Dense,
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Ints(v) => write!(f, "[{}]", v.iter().join(", ")),
            Self::Dense(DenseElements::Float(v)) => write!(f, "dense<[{}]>", v.iter().map(|x| format!("{x:?}")).join(", ")),
            Self::Dense(DenseElements::Int(v)) => write!(f, "dense<[{}]>", v.iter().join(", ")),
        }
    }
}

/// Named attributes, ordered by name for deterministic printing.
pub type Attributes = BTreeMap<String, Attribute>;

/// Dense payload of a `hlo.constant`.
pub const ATTR_VALUE: &str = "value";

/// Name of the function a `func.call` invokes (its entry point).
pub const ATTR_ENTRY_FUNCTION: &str = "entry_function";

/// Marks a `func.call` whose body may run entirely on quantized values.
pub const ATTR_QUANT_TRAIT: &str = "quant_trait";
