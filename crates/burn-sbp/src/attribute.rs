use alloc::borrow::ToOwned;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::OpError;

/// The type of an operator attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrType {
    /// UTF-8 string.
    String,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Boolean flag.
    Bool,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// List of 64-bit signed integers.
    ListInt64,
    /// List of strings.
    ListString,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttrType::String => "String",
            AttrType::Int32 => "Int32",
            AttrType::Int64 => "Int64",
            AttrType::Bool => "Bool",
            AttrType::Float => "Float",
            AttrType::Double => "Double",
            AttrType::ListInt64 => "ListInt64",
            AttrType::ListString => "ListString",
        };
        f.write_str(name)
    }
}

/// A typed attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// UTF-8 string.
    String(String),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// Boolean flag.
    Bool(bool),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// List of 64-bit signed integers.
    ListInt64(Vec<i64>),
    /// List of strings.
    ListString(Vec<String>),
}

impl AttrValue {
    /// The type tag of this value.
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::String(_) => AttrType::String,
            AttrValue::Int32(_) => AttrType::Int32,
            AttrValue::Int64(_) => AttrType::Int64,
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::Float(_) => AttrType::Float,
            AttrValue::Double(_) => AttrType::Double,
            AttrValue::ListInt64(_) => AttrType::ListInt64,
            AttrValue::ListString(_) => AttrType::ListString,
        }
    }
}

macro_rules! attr_value_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for AttrValue {
            fn from(value: $ty) -> Self {
                AttrValue::$variant(value)
            }
        }
    };
}

attr_value_from!(String, String);
attr_value_from!(i32, Int32);
attr_value_from!(i64, Int64);
attr_value_from!(bool, Bool);
attr_value_from!(f32, Float);
attr_value_from!(f64, Double);
attr_value_from!(Vec<i64>, ListInt64);
attr_value_from!(Vec<String>, ListString);

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_owned())
    }
}

/// Rust types that can be read back from an [`AttrValue`].
pub trait FromAttr: Sized {
    /// The attribute type this Rust type maps to.
    const ATTR_TYPE: AttrType;

    /// Extracts the value, `None` when the variant does not match.
    fn from_attr(value: &AttrValue) -> Option<Self>;
}

macro_rules! from_attr {
    ($ty:ty, $variant:ident) => {
        impl FromAttr for $ty {
            const ATTR_TYPE: AttrType = AttrType::$variant;

            fn from_attr(value: &AttrValue) -> Option<Self> {
                match value {
                    AttrValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

from_attr!(String, String);
from_attr!(i32, Int32);
from_attr!(i64, Int64);
from_attr!(bool, Bool);
from_attr!(f32, Float);
from_attr!(f64, Double);
from_attr!(Vec<i64>, ListInt64);
from_attr!(Vec<String>, ListString);

/// Declaration of one named attribute of an operator.
///
/// An attribute with a default is optional; one without a default is required.
#[derive(Clone, Debug, PartialEq)]
pub struct AttrDecl {
    name: String,
    value_type: AttrType,
    default: Option<AttrValue>,
}

impl AttrDecl {
    /// Declares a required attribute.
    pub fn required<S: Into<String>>(name: S, value_type: AttrType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: None,
        }
    }

    /// Declares an optional attribute; its type is the type of `default`.
    pub fn with_default<S: Into<String>, V: Into<AttrValue>>(name: S, default: V) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            value_type: default.attr_type(),
            default: Some(default),
        }
    }

    /// Declares an attribute with an explicit type and an optional default.
    ///
    /// The default is not checked here; [`OpBuilder::build`](crate::OpBuilder::build)
    /// rejects a default whose type differs from `value_type`.
    pub fn new<S: Into<String>>(
        name: S,
        value_type: AttrType,
        default: Option<AttrValue>,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            default,
        }
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn value_type(&self) -> AttrType {
        self.value_type
    }

    /// Default value, if any.
    pub fn default(&self) -> Option<&AttrValue> {
        self.default.as_ref()
    }

    /// Whether the attribute must be supplied.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Attribute values supplied by the graph compiler when constructing a node.
pub type AttrValues = HashMap<String, AttrValue>;

/// Ordered set of attribute declarations belonging to one operator.
#[derive(Clone, Debug, Default)]
pub struct AttrSchema {
    decls: Vec<AttrDecl>,
}

impl AttrSchema {
    /// Adds a declaration, failing when the name is already declared.
    pub fn declare(&mut self, op: &str, decl: AttrDecl) -> Result<(), OpError> {
        if self.get(decl.name()).is_some() {
            return Err(OpError::DuplicateAttribute {
                op: op.to_string(),
                attr: decl.name,
            });
        }
        if let Some(default) = decl.default() {
            if default.attr_type() != decl.value_type() {
                return Err(OpError::InvalidDeclaration {
                    op: op.to_string(),
                    detail: alloc::format!(
                        "default of attribute '{}' is {}, declared {}",
                        decl.name(),
                        default.attr_type(),
                        decl.value_type()
                    ),
                });
            }
        }
        self.decls.push(decl);
        Ok(())
    }

    /// Looks up a declaration by name.
    pub fn get(&self, name: &str) -> Option<&AttrDecl> {
        self.decls.iter().find(|decl| decl.name == name)
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Validates supplied values against the declarations and fills in defaults.
    ///
    /// Unknown names are reported first (in lexical order), then type mismatches
    /// and missing required attributes in declaration order.
    pub fn validate(&self, op: &str, supplied: &AttrValues) -> Result<AttrMap, OpError> {
        let mut unknown: Vec<&String> = supplied
            .keys()
            .filter(|name| self.get(name).is_none())
            .collect();
        unknown.sort();
        if let Some(name) = unknown.first() {
            return Err(OpError::UnknownAttribute {
                op: op.to_string(),
                attr: (*name).clone(),
            });
        }

        let mut values = HashMap::with_capacity(self.decls.len());
        for decl in self.decls.iter() {
            let value = match supplied.get(decl.name()) {
                Some(value) if value.attr_type() != decl.value_type() => {
                    return Err(OpError::TypeMismatch {
                        op: op.to_string(),
                        attr: decl.name.clone(),
                        expected: decl.value_type(),
                        actual: value.attr_type(),
                    });
                }
                Some(value) => value.clone(),
                None => match decl.default() {
                    Some(default) => default.clone(),
                    None => {
                        return Err(OpError::MissingRequiredAttribute {
                            op: op.to_string(),
                            attr: decl.name.clone(),
                        });
                    }
                },
            };
            values.insert(decl.name.clone(), value);
        }

        Ok(AttrMap {
            op: op.to_string(),
            values,
        })
    }
}

/// Fully resolved attributes of one node: every declared attribute present,
/// defaults filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct AttrMap {
    op: String,
    values: HashMap<String, AttrValue>,
}

impl AttrMap {
    /// Name of the operator these attributes belong to.
    pub fn op(&self) -> &str {
        &self.op
    }

    /// Raw value of an attribute.
    pub fn value(&self, name: &str) -> Result<&AttrValue, OpError> {
        self.values.get(name).ok_or_else(|| OpError::UnknownAttribute {
            op: self.op.clone(),
            attr: name.to_string(),
        })
    }

    /// Typed value of an attribute.
    pub fn get<T: FromAttr>(&self, name: &str) -> Result<T, OpError> {
        let value = self.value(name)?;
        T::from_attr(value).ok_or_else(|| OpError::TypeMismatch {
            op: self.op.clone(),
            attr: name.to_string(),
            expected: T::ATTR_TYPE,
            actual: value.attr_type(),
        })
    }

    /// Reads an integer attribute that determines a dimension size.
    ///
    /// Accepts `Int32` and `Int64` values and rejects negative ones with
    /// [`OpError::InvalidAttributeValue`].
    pub fn dim(&self, name: &str) -> Result<usize, OpError> {
        let value = self.value(name)?;
        let raw = match value {
            AttrValue::Int32(v) => i64::from(*v),
            AttrValue::Int64(v) => *v,
            other => {
                return Err(OpError::TypeMismatch {
                    op: self.op.clone(),
                    attr: name.to_string(),
                    expected: AttrType::Int64,
                    actual: other.attr_type(),
                });
            }
        };
        usize::try_from(raw).map_err(|_| OpError::InvalidAttributeValue {
            op: self.op.clone(),
            attr: name.to_string(),
            detail: alloc::format!("expected a non-negative size, got {raw}"),
        })
    }

    /// Number of resolved attributes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> AttrSchema {
        let mut schema = AttrSchema::default();
        schema
            .declare("Reader", AttrDecl::required("batch_size", AttrType::Int32))
            .unwrap();
        schema
            .declare("Reader", AttrDecl::with_default("prefix", "part-"))
            .unwrap();
        schema
            .declare("Reader", AttrDecl::with_default("seed", -1i64))
            .unwrap();
        schema
    }

    fn supplied(values: &[(&str, AttrValue)]) -> AttrValues {
        values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_schema_declarations() {
        let schema = schema();
        let batch_size = schema.get("batch_size").unwrap();
        let seed = schema.get("seed").unwrap();

        assert!(batch_size.is_required());
        assert_eq!(batch_size.default(), None);
        assert!(!seed.is_required());
        assert_eq!(seed.value_type(), AttrType::Int64);
        assert_eq!(seed.default(), Some(&AttrValue::Int64(-1)));
        assert!(schema.get("shuffle").is_none());
    }

    #[test]
    fn test_validate_fills_defaults() {
        let attrs = schema()
            .validate("Reader", &supplied(&[("batch_size", AttrValue::Int32(8))]))
            .unwrap();

        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get::<i32>("batch_size").unwrap(), 8);
        assert_eq!(attrs.get::<String>("prefix").unwrap(), "part-");
        assert_eq!(attrs.get::<i64>("seed").unwrap(), -1);
    }

    #[test]
    fn test_validate_supplied_overrides_default() {
        let attrs = schema()
            .validate(
                "Reader",
                &supplied(&[("batch_size", 8.into()), ("seed", 42i64.into())]),
            )
            .unwrap();

        assert_eq!(attrs.get::<i64>("seed").unwrap(), 42);
    }

    #[test]
    #[should_panic = "MissingRequiredAttribute { op: \"Reader\", attr: \"batch_size\" }"]
    fn test_validate_required_should_be_present() {
        schema().validate("Reader", &AttrValues::new()).unwrap();
    }

    #[test]
    #[should_panic = "UnknownAttribute { op: \"Reader\", attr: \"batch\" }"]
    fn test_validate_unknown_should_be_rejected() {
        schema()
            .validate(
                "Reader",
                &supplied(&[("batch_size", 8.into()), ("batch", 8.into())]),
            )
            .unwrap();
    }

    #[test]
    fn test_validate_type_should_match() {
        let err = schema()
            .validate("Reader", &supplied(&[("batch_size", 8i64.into())]))
            .unwrap_err();

        assert_eq!(
            err,
            OpError::TypeMismatch {
                op: "Reader".into(),
                attr: "batch_size".into(),
                expected: AttrType::Int32,
                actual: AttrType::Int64,
            }
        );
    }

    #[test]
    #[should_panic = "DuplicateAttribute { op: \"Reader\", attr: \"seed\" }"]
    fn test_declare_name_should_be_unique() {
        schema()
            .declare("Reader", AttrDecl::required("seed", AttrType::Int64))
            .unwrap();
    }

    #[test]
    fn test_declare_default_type_should_match() {
        let mut schema = AttrSchema::default();
        let result = schema.declare(
            "Reader",
            AttrDecl::new("seed", AttrType::Int64, Some(AttrValue::Int32(-1))),
        );

        assert!(matches!(result, Err(OpError::InvalidDeclaration { .. })));
        assert!(schema.is_empty());
    }

    #[test]
    fn test_dim_rejects_negative_size() {
        let attrs = schema()
            .validate("Reader", &supplied(&[("batch_size", (-4).into())]))
            .unwrap();

        assert!(matches!(
            attrs.dim("batch_size"),
            Err(OpError::InvalidAttributeValue { .. })
        ));
    }

    #[test]
    fn test_get_wrong_type() {
        let attrs = schema()
            .validate("Reader", &supplied(&[("batch_size", 8.into())]))
            .unwrap();

        assert!(matches!(
            attrs.get::<bool>("batch_size"),
            Err(OpError::TypeMismatch { .. })
        ));
        assert!(matches!(
            attrs.get::<bool>("shuffle"),
            Err(OpError::UnknownAttribute { .. })
        ));
    }
}
