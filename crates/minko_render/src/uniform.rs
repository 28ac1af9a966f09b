//! Uniform value types and their conversion from effect defaults.

use std::fmt;
use std::str::FromStr;

use minko_data::{Provider, ValueSlot};

use crate::error::{RenderError, RenderResult};

/// Scalar family of a uniform, deciding which bound list it lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// `float` family.
    Float,
    /// `int` family.
    Int,
    /// `bool`.
    Bool,
}

/// Declared type of a uniform.
///
/// | type      | Rust value  |
/// |-----------|-------------|
/// | `float`   | `f32`       |
/// | `floatN`  | `[f32; N]`  |
/// | `float16` | `[f32; 16]` |
/// | `int`     | `i32`       |
/// | `intN`    | `[i32; N]`  |
/// | `bool`    | `bool`      |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// `f32`
    Float,
    /// `[f32; 2]`
    Float2,
    /// `[f32; 3]`
    Float3,
    /// `[f32; 4]`
    Float4,
    /// `[f32; 16]`, a 4x4 matrix.
    Float16,
    /// `i32`
    Int,
    /// `[i32; 2]`
    Int2,
    /// `[i32; 3]`
    Int3,
    /// `[i32; 4]`
    Int4,
    /// `bool`
    Bool,
}

impl UniformType {
    /// Number of scalar components.
    #[must_use]
    pub const fn components(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool => 1,
            Self::Float2 | Self::Int2 => 2,
            Self::Float3 | Self::Int3 => 3,
            Self::Float4 | Self::Int4 => 4,
            Self::Float16 => 16,
        }
    }

    /// Scalar family.
    #[must_use]
    pub const fn kind(self) -> UniformKind {
        match self {
            Self::Float | Self::Float2 | Self::Float3 | Self::Float4 | Self::Float16 => {
                UniformKind::Float
            }
            Self::Int | Self::Int2 | Self::Int3 | Self::Int4 => UniformKind::Int,
            Self::Bool => UniformKind::Bool,
        }
    }

    /// Returns true if `slot` holds the Rust value of this type.
    #[must_use]
    pub fn accepts(self, slot: &ValueSlot) -> bool {
        match self {
            Self::Float => slot.is::<f32>(),
            Self::Float2 => slot.is::<[f32; 2]>(),
            Self::Float3 => slot.is::<[f32; 3]>(),
            Self::Float4 => slot.is::<[f32; 4]>(),
            Self::Float16 => slot.is::<[f32; 16]>(),
            Self::Int => slot.is::<i32>(),
            Self::Int2 => slot.is::<[i32; 2]>(),
            Self::Int3 => slot.is::<[i32; 3]>(),
            Self::Int4 => slot.is::<[i32; 4]>(),
            Self::Bool => slot.is::<bool>(),
        }
    }

    /// Stores the default of uniform `name` into `provider`.
    ///
    /// Without a configured value the default is zero (`false` for `bool`).
    ///
    /// # Errors
    ///
    /// `InvalidDefaultValue` if `value` does not convert to this type.
    pub fn set_default(
        self,
        provider: &Provider,
        name: &str,
        value: Option<&toml::Value>,
    ) -> RenderResult<()> {
        let invalid = |e: toml::de::Error| RenderError::InvalidDefaultValue {
            name: name.to_owned(),
            reason: format!("expected {self}: {}", e.message()),
        };
        let value = value.cloned();

        match self {
            Self::Float => {
                provider.set(name, convert(value, 0.0f32).map_err(invalid)?);
            }
            Self::Float2 => {
                provider.set(name, convert(value, [0.0f32; 2]).map_err(invalid)?);
            }
            Self::Float3 => {
                provider.set(name, convert(value, [0.0f32; 3]).map_err(invalid)?);
            }
            Self::Float4 => {
                provider.set(name, convert(value, [0.0f32; 4]).map_err(invalid)?);
            }
            Self::Float16 => {
                provider.set(name, convert(value, [0.0f32; 16]).map_err(invalid)?);
            }
            Self::Int => {
                provider.set(name, convert(value, 0i32).map_err(invalid)?);
            }
            Self::Int2 => {
                provider.set(name, convert(value, [0i32; 2]).map_err(invalid)?);
            }
            Self::Int3 => {
                provider.set(name, convert(value, [0i32; 3]).map_err(invalid)?);
            }
            Self::Int4 => {
                provider.set(name, convert(value, [0i32; 4]).map_err(invalid)?);
            }
            Self::Bool => {
                provider.set(name, convert(value, false).map_err(invalid)?);
            }
        }
        Ok(())
    }
}

impl FromStr for UniformType {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "float" => Self::Float,
            "float2" => Self::Float2,
            "float3" => Self::Float3,
            "float4" => Self::Float4,
            "float16" => Self::Float16,
            "int" => Self::Int,
            "int2" => Self::Int2,
            "int3" => Self::Int3,
            "int4" => Self::Int4,
            "bool" => Self::Bool,
            other => return Err(RenderError::UnknownUniformType(other.to_owned())),
        })
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Float => "float",
            Self::Float2 => "float2",
            Self::Float3 => "float3",
            Self::Float4 => "float4",
            Self::Float16 => "float16",
            Self::Int => "int",
            Self::Int2 => "int2",
            Self::Int3 => "int3",
            Self::Int4 => "int4",
            Self::Bool => "bool",
        };
        f.write_str(name)
    }
}

fn convert<T>(value: Option<toml::Value>, zero: T) -> Result<T, toml::de::Error>
where
    T: for<'de> serde::Deserialize<'de>,
{
    value.map_or(Ok(zero), |v| v.try_into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(source: &str) -> toml::Value {
        let table: toml::Table = toml::from_str(&format!("v = {source}")).unwrap();
        table["v"].clone()
    }

    #[test]
    fn test_parse_and_display() {
        for name in ["float", "float2", "float3", "float4", "float16", "int", "int2", "int3", "int4", "bool"] {
            let ty: UniformType = name.parse().unwrap();
            assert_eq!(ty.to_string(), name);
        }
        assert!(matches!(
            "double".parse::<UniformType>(),
            Err(RenderError::UnknownUniformType(_))
        ));
    }

    #[test]
    fn test_kind_and_components() {
        assert_eq!(UniformType::Float16.components(), 16);
        assert_eq!(UniformType::Int3.components(), 3);
        assert_eq!(UniformType::Float3.kind(), UniformKind::Float);
        assert_eq!(UniformType::Int4.kind(), UniformKind::Int);
        assert_eq!(UniformType::Bool.kind(), UniformKind::Bool);
    }

    #[test]
    fn test_defaults_convert() {
        let provider = Provider::new();

        UniformType::Float4
            .set_default(&provider, "uColor", Some(&value("[1.0, 0.5, 0.25, 1.0]")))
            .unwrap();
        UniformType::Float
            .set_default(&provider, "uShininess", Some(&value("8.0")))
            .unwrap();
        UniformType::Int2.set_default(&provider, "uSize", None).unwrap();

        assert_eq!(provider.get::<[f32; 4]>("uColor"), Ok([1.0, 0.5, 0.25, 1.0]));
        assert_eq!(provider.get::<f32>("uShininess"), Ok(8.0));
        assert_eq!(provider.get::<[i32; 2]>("uSize"), Ok([0, 0]));
        assert!(UniformType::Float4.accepts(&provider.slot("uColor").unwrap()));
        assert!(!UniformType::Float3.accepts(&provider.slot("uColor").unwrap()));
    }

    #[test]
    fn test_default_wrong_arity() {
        let provider = Provider::new();

        let result = UniformType::Float3.set_default(&provider, "uColor", Some(&value("[1.0, 0.5]")));

        assert!(matches!(result, Err(RenderError::InvalidDefaultValue { .. })));
        assert!(!provider.has_property("uColor"));
    }
}
