//! # Effects
//!
//! An effect groups named techniques, each an ordered list of passes.
//! Effects are described in TOML (see [`config`]).

pub mod config;

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::pass::{Pass, PassPtr};

pub use config::{EffectConfig, MacroConfig, PassConfig, StateConfig, UniformConfig};

/// Shared effect handle.
pub type EffectPtr = Rc<Effect>;

/// Values substituted into `${name}` placeholders of binding paths.
pub type EffectVariables = HashMap<String, String>;

/// A loaded effect.
#[derive(Debug)]
pub struct Effect {
    name: String,
    techniques: BTreeMap<String, Vec<PassPtr>>,
}

impl Effect {
    /// Parses and builds an effect from TOML source.
    ///
    /// # Errors
    ///
    /// `Config` for malformed TOML, plus every error of [`Effect::from_config`].
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let effect = Effect::from_toml_str(include_str!("phong.effect.toml"))?;
    /// let passes = effect.technique("default")?;
    /// ```
    pub fn from_toml_str(source: &str) -> RenderResult<EffectPtr> {
        let config: EffectConfig = toml::from_str(source)?;
        Self::from_config(&config)
    }

    /// Builds an effect from an already parsed configuration.
    ///
    /// # Errors
    ///
    /// The first pass error.
    pub fn from_config(config: &EffectConfig) -> RenderResult<EffectPtr> {
        let techniques = config
            .techniques
            .iter()
            .map(|(name, passes)| {
                let passes = passes
                    .iter()
                    .map(Pass::from_config)
                    .collect::<RenderResult<Vec<_>>>()?;
                Ok((name.clone(), passes))
            })
            .collect::<RenderResult<BTreeMap<_, _>>>()?;

        debug!(
            effect = %config.name,
            techniques = techniques.len(),
            "Effect loaded"
        );

        Ok(Rc::new(Self {
            name: config.name.clone(),
            techniques,
        }))
    }

    /// Effect name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Passes of technique `name`.
    ///
    /// # Errors
    ///
    /// `UnknownTechnique` if the effect has no such technique.
    pub fn technique(&self, name: &str) -> RenderResult<&[PassPtr]> {
        self.techniques
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| RenderError::UnknownTechnique(name.to_owned()))
    }

    /// Returns true if technique `name` exists.
    #[must_use]
    pub fn has_technique(&self, name: &str) -> bool {
        self.techniques.contains_key(name)
    }

    /// Technique names, sorted.
    #[must_use]
    pub fn technique_names(&self) -> Vec<&str> {
        self.techniques.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EFFECT: &str = r#"
        name = "phong"

        [[techniques.default]]
        name = "depth"

        [[techniques.default]]
        name = "main"
        [[techniques.default.uniforms]]
        name = "uDiffuseColor"
        type = "float4"

        [[techniques.transparent]]
        name = "main"
        [techniques.transparent.states.priority]
        default = "transparent"
    "#;

    #[test]
    fn test_load_techniques() {
        let effect = Effect::from_toml_str(EFFECT).unwrap();

        assert_eq!(effect.name(), "phong");
        assert_eq!(effect.technique_names(), vec!["default", "transparent"]);

        let passes = effect.technique("default").unwrap();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].name(), "depth");
        assert_eq!(passes[1].uniforms().len(), 1);
    }

    #[test]
    fn test_unknown_technique() {
        let effect = Effect::from_toml_str(EFFECT).unwrap();

        assert!(!effect.has_technique("shadow"));
        assert_eq!(
            effect.technique("shadow").err(),
            Some(RenderError::UnknownTechnique(String::from("shadow")))
        );
    }

    #[test]
    fn test_malformed_source() {
        assert!(matches!(
            Effect::from_toml_str("name = "),
            Err(RenderError::Config(_))
        ));
        assert!(matches!(
            Effect::from_toml_str(
                "name = \"e\"\n[[techniques.t]]\nname = \"p\"\n[techniques.t.states.priority]\ndefault = \"soon\""
            ),
            Err(RenderError::InvalidDefaultValue { .. })
        ));
    }
}
