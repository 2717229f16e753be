//! Literal values attached to ports.

use std::fmt::{self, Display};

use crate::types::{BaseType, TypeDesc};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("Could not parse `{text}` as a `{type_name}` value")]
/// Literal text that does not fit its declared type.
pub struct ParseError {
    /// Offending text.
    pub text: String,
    /// Declared type name.
    pub type_name: String,
}

#[derive(Clone, Debug, PartialEq)]
/// A literal value, untyped until paired with a [TypeDesc].
pub enum Value {
    #[allow(missing_docs)]
    Boolean(bool),
    #[allow(missing_docs)]
    Integer(i32),
    #[allow(missing_docs)]
    Float(f32),
    /// Components of a vector, color or matrix, row-major.
    Floats(Vec<f32>),
    #[allow(missing_docs)]
    String(String),
}

impl Value {
    /// Parse the authored string form of a value (`"0.5, 0.5, 1"` for a `color3`).
    ///
    /// # Example
    /// ```
    /// use shadergen::{types::{names, TypeRegistry}, value::Value};
    ///
    /// let registry = TypeRegistry::initialize();
    /// let color3 = registry.get(names::COLOR3).unwrap();
    ///
    /// assert_eq!(Value::parse(&color3, "1, 0.5, 0").unwrap(), Value::Floats(vec![1., 0.5, 0.]));
    /// assert!(Value::parse(&color3, "1, 0.5").is_err());
    /// ```
    pub fn parse(ty: &TypeDesc, text: &str) -> Result<Self, ParseError> {
        let err = || ParseError {
            text: text.to_owned(),
            type_name: ty.name().to_owned(),
        };

        let trimmed = text.trim();

        Ok(match ty.basetype() {
            BaseType::Boolean => match trimmed {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => return Err(err()),
            },
            BaseType::Integer => Value::Integer(trimmed.parse().map_err(|_| err())?),
            BaseType::Float if ty.size() == 1 => Value::Float(finite(trimmed).ok_or_else(err)?),
            BaseType::Float => {
                let floats = trimmed
                    .split(',')
                    .map(|part| finite(part.trim()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(err)?;

                if floats.len() != ty.size() {
                    return Err(err());
                }

                Value::Floats(floats)
            }
            BaseType::String => Value::String(text.to_owned()),
            BaseType::None | BaseType::Struct => return Err(err()),
        })
    }

    /// Neutral value of a type, if it has a literal form at all.
    pub fn zero(ty: &TypeDesc) -> Option<Self> {
        Some(match ty.basetype() {
            BaseType::Boolean => Value::Boolean(false),
            BaseType::Integer => Value::Integer(0),
            BaseType::Float if ty.size() == 1 => Value::Float(0.),
            BaseType::Float => Value::Floats(vec![0.; ty.size()]),
            BaseType::String => Value::String(String::new()),
            BaseType::None | BaseType::Struct => return None,
        })
    }

    /// Check that the value has the shape `ty` expects.
    pub fn fits(&self, ty: &TypeDesc) -> bool {
        match self {
            Value::Boolean(_) => ty.basetype() == BaseType::Boolean,
            Value::Integer(_) => ty.basetype() == BaseType::Integer,
            Value::Float(_) => ty.basetype() == BaseType::Float && ty.size() == 1,
            Value::Floats(floats) => ty.basetype() == BaseType::Float && floats.len() == ty.size(),
            Value::String(_) => ty.basetype() == BaseType::String,
        }
    }
}

/// No shading language has a literal for infinities or NaN.
fn finite(text: &str) -> Option<f32> {
    text.parse::<f32>().ok().filter(|value| value.is_finite())
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Floats(values) => write!(
                f,
                "{}",
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            Value::String(value) => f.write_str(value),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{names, TypeRegistry};

    use float_eq::assert_float_eq;

    #[test]
    fn scalars() {
        let registry = TypeRegistry::initialize();

        let Value::Float(value) = Value::parse(&registry.get(names::FLOAT).unwrap(), " 0.25 ").unwrap() else {
            panic!("Expected a float value");
        };
        assert_float_eq!(value, 0.25, abs <= f32::EPSILON);

        assert_eq!(
            Value::parse(&registry.get(names::INTEGER).unwrap(), "3").unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            Value::parse(&registry.get(names::BOOLEAN).unwrap(), "true").unwrap(),
            Value::Boolean(true)
        );
        assert!(Value::parse(&registry.get(names::INTEGER).unwrap(), "3.5").is_err());
    }

    #[test]
    fn aggregates() {
        let registry = TypeRegistry::initialize();
        let matrix33 = registry.get(names::MATRIX33).unwrap();

        let identity = Value::parse(&matrix33, "1,0,0, 0,1,0, 0,0,1").unwrap();
        assert!(identity.fits(&matrix33));
        assert!(!identity.fits(&registry.get(names::MATRIX44).unwrap()));

        let Value::Floats(floats) = identity else {
            panic!("Expected floats");
        };
        assert_float_eq!(floats[4], 1., abs <= f32::EPSILON);
    }

    #[test]
    fn non_finite_floats() {
        let registry = TypeRegistry::initialize();
        let float = registry.get(names::FLOAT).unwrap();
        let color3 = registry.get(names::COLOR3).unwrap();

        for text in ["inf", "-inf", "NaN", "infinity", "1e39"] {
            assert!(Value::parse(&float, text).is_err(), "`{text}` was accepted");
        }
        assert!(Value::parse(&color3, "1, NaN, 0").is_err());
        assert!(Value::parse(&float, "1e-3").is_ok());
    }

    #[test]
    fn closures_have_no_literal() {
        let registry = TypeRegistry::initialize();
        let bsdf = registry.get(names::BSDF).unwrap();

        assert!(Value::zero(&bsdf).is_none());
        assert!(Value::parse(&bsdf, "0").is_err());
    }

    #[test]
    fn display_round_trips_authored_form() {
        let registry = TypeRegistry::initialize();
        let color3 = registry.get(names::COLOR3).unwrap();

        let value = Value::parse(&color3, "0.5, 1, 0").unwrap();
        assert_eq!(value.to_string(), "0.5, 1, 0");
    }
}
