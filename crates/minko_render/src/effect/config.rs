//! Effect file layout.
//!
//! ```toml
//! name = "phong"
//!
//! [[techniques.default]]
//! name = "main"
//!
//! [[techniques.default.uniforms]]
//! name = "uDiffuseColor"
//! type = "float4"
//! binding = { property = "material[${materialUuid}].diffuseColor" }
//! default = [1.0, 1.0, 1.0, 1.0]
//!
//! [techniques.default.states.priority]
//! binding = { property = "material[${materialUuid}].priority" }
//! default = "opaque"
//!
//! [[techniques.default.macros]]
//! name = "NUM_LIGHTS"
//! type = "int"
//! binding = { property = "lights.length", source = "root" }
//! max = 8
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::binding::{Binding, MacroType};

/// Root of an effect file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectConfig {
    /// Effect name.
    pub name: String,
    /// Technique name to its ordered passes.
    pub techniques: BTreeMap<String, Vec<PassConfig>>,
}

/// One pass of a technique.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassConfig {
    /// Pass name.
    pub name: String,
    /// Forward passes get one draw call per surface. Others are shared.
    #[serde(default = "default_forward")]
    pub forward: bool,
    /// Uniform inputs, in declaration order.
    #[serde(default)]
    pub uniforms: Vec<UniformConfig>,
    /// State name to binding and default.
    #[serde(default)]
    pub states: BTreeMap<String, StateConfig>,
    /// Macro bindings.
    #[serde(default)]
    pub macros: Vec<MacroConfig>,
}

/// A uniform input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UniformConfig {
    /// Shader variable name.
    pub name: String,
    /// Uniform type name (`float4`, `int`...).
    #[serde(rename = "type")]
    pub ty: String,
    /// Property the uniform reads.
    pub binding: Option<Binding>,
    /// Value used while the binding does not resolve.
    pub default: Option<toml::Value>,
}

/// A render state override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Property the state reads.
    pub binding: Option<Binding>,
    /// Replaces the engine default.
    pub default: Option<toml::Value>,
}

/// A macro input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroConfig {
    /// Macro name.
    pub name: String,
    /// Property driving the macro.
    pub binding: Option<Binding>,
    /// Definition rule.
    #[serde(default, rename = "type")]
    pub ty: MacroType,
    /// Lower clamp for `int` macros.
    pub min: Option<i32>,
    /// Upper clamp for `int` macros.
    pub max: Option<i32>,
    /// Value used while the binding does not resolve.
    pub default: Option<toml::Value>,
}

fn default_forward() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingSource;

    #[test]
    fn test_parse_layout() {
        let config: EffectConfig = toml::from_str(
            r#"
            name = "phong"

            [[techniques.default]]
            name = "main"

            [[techniques.default.uniforms]]
            name = "uDiffuseColor"
            type = "float4"
            binding = { property = "material[${materialUuid}].diffuseColor" }
            default = [1.0, 1.0, 1.0, 1.0]

            [techniques.default.states.priority]
            default = "opaque"

            [[techniques.default.macros]]
            name = "NUM_LIGHTS"
            type = "int"
            binding = { property = "lights.length", source = "root" }
            max = 8

            [[techniques.blur]]
            name = "horizontal"
            forward = false
            "#,
        )
        .unwrap();

        let main = &config.techniques["default"][0];
        assert_eq!(config.name, "phong");
        assert!(main.forward);
        assert_eq!(main.uniforms[0].ty, "float4");
        assert_eq!(
            main.uniforms[0].binding.as_ref().map(|b| b.source),
            Some(BindingSource::Target)
        );
        assert!(main.states["priority"].binding.is_none());
        assert_eq!(main.macros[0].ty, MacroType::Int);
        assert_eq!(main.macros[0].max, Some(8));
        assert!(!config.techniques["blur"][0].forward);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = toml::from_str::<EffectConfig>(
            r#"
            name = "broken"
            [[techniques.default]]
            name = "main"
            blend = "additive"
            "#,
        );

        assert!(result.is_err());
    }
}
