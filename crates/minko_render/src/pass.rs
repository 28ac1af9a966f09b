//! # Pass
//!
//! A pass is the unit a draw call renders: its uniform inputs with their
//! bindings and defaults, its render states, and the macro bindings that
//! select which program variant is used.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use minko_data::{Provider, ProviderPtr};
use tracing::debug;

use crate::binding::{BindingMap, BindingStores, MacroBinding, MacroType};
use crate::effect::config::{MacroConfig, PassConfig};
use crate::error::{RenderError, RenderResult};
use crate::program::{Program, ProgramPtr, ProgramSignature};
use crate::states::States;
use crate::uniform::UniformType;

/// Shared pass handle.
pub type PassPtr = Rc<Pass>;

/// A declared uniform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformInput {
    /// Shader variable name.
    pub name: String,
    /// Declared type.
    pub ty: UniformType,
}

/// One pass of an effect technique.
#[derive(Debug)]
pub struct Pass {
    name: String,
    forward: bool,
    uniforms: Vec<UniformInput>,
    uniform_bindings: BindingMap,
    states: States,
    state_bindings: BindingMap,
    macro_bindings: Vec<MacroBinding>,
    macro_defaults: ProviderPtr,
    programs: RefCell<HashMap<ProgramSignature, ProgramPtr>>,
}

impl Pass {
    /// Builds a pass from its configuration.
    ///
    /// # Errors
    ///
    /// `UnknownUniformType`, `UnknownState` or `InvalidDefaultValue` for
    /// the first offending input.
    pub fn from_config(config: &PassConfig) -> RenderResult<PassPtr> {
        let mut uniform_bindings = BindingMap::new(Provider::new());
        let mut uniforms = Vec::with_capacity(config.uniforms.len());
        for uniform in &config.uniforms {
            let ty: UniformType = uniform.ty.parse()?;
            ty.set_default(
                &uniform_bindings.default_values,
                &uniform.name,
                uniform.default.as_ref(),
            )?;
            if let Some(binding) = &uniform.binding {
                uniform_bindings
                    .bindings
                    .insert(uniform.name.clone(), binding.clone());
            }
            uniforms.push(UniformInput {
                name: uniform.name.clone(),
                ty,
            });
        }

        let states = States::new();
        let mut state_bindings = BindingMap::new(Rc::clone(states.data()));
        for (name, state) in &config.states {
            if !States::is_state(name) {
                return Err(RenderError::UnknownState(name.clone()));
            }
            if let Some(default) = &state.default {
                states.set_from_config(name, default)?;
            }
            if let Some(binding) = &state.binding {
                state_bindings.bindings.insert(name.clone(), binding.clone());
            }
        }

        let macro_defaults = Provider::new();
        let mut macro_bindings = Vec::with_capacity(config.macros.len());
        for macro_config in &config.macros {
            set_macro_default(&macro_defaults, macro_config)?;
            macro_bindings.push(MacroBinding {
                name: macro_config.name.clone(),
                binding: macro_config.binding.clone(),
                ty: macro_config.ty,
                min: macro_config.min,
                max: macro_config.max,
            });
        }

        Ok(Rc::new(Self {
            name: config.name.clone(),
            forward: config.forward,
            uniforms,
            uniform_bindings,
            states,
            state_bindings,
            macro_bindings,
            macro_defaults,
            programs: RefCell::new(HashMap::new()),
        }))
    }

    /// Pass name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// False for post-processing passes shared by every surface.
    #[inline]
    #[must_use]
    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// Uniform inputs in declaration order.
    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &[UniformInput] {
        &self.uniforms
    }

    /// Uniform bindings and defaults.
    #[inline]
    #[must_use]
    pub fn uniform_bindings(&self) -> &BindingMap {
        &self.uniform_bindings
    }

    /// State defaults.
    #[inline]
    #[must_use]
    pub fn states(&self) -> &States {
        &self.states
    }

    /// State bindings. Defaults live in `states()`.
    #[inline]
    #[must_use]
    pub fn state_bindings(&self) -> &BindingMap {
        &self.state_bindings
    }

    /// Macro bindings.
    #[inline]
    #[must_use]
    pub fn macro_bindings(&self) -> &[MacroBinding] {
        &self.macro_bindings
    }

    /// Number of distinct programs selected so far.
    #[must_use]
    pub fn num_programs(&self) -> usize {
        self.programs.borrow().len()
    }

    /// Computes the macro signature for `variables` against `stores`.
    #[must_use]
    pub fn signature(
        &self,
        variables: &HashMap<String, String>,
        stores: &BindingStores,
    ) -> ProgramSignature {
        self.macro_bindings
            .iter()
            .filter_map(|macro_binding| {
                let slot = macro_binding
                    .binding
                    .as_ref()
                    .and_then(|binding| stores.lookup(binding, variables).1)
                    .or_else(|| self.macro_defaults.slot(&macro_binding.name));
                macro_binding
                    .evaluate(slot.as_ref())
                    .map(|value| (macro_binding.name.clone(), value))
            })
            .collect()
    }

    /// Returns the program matching the current signature, creating it on
    /// first use.
    pub fn select_program(
        &self,
        variables: &HashMap<String, String>,
        stores: &BindingStores,
    ) -> ProgramPtr {
        let signature = self.signature(variables, stores);
        let mut programs = self.programs.borrow_mut();
        if let Some(program) = programs.get(&signature) {
            return Rc::clone(program);
        }

        debug!(pass = %self.name, macros = signature.len(), "Program variant created");
        let program = Program::new(self.name.clone(), signature.clone());
        programs.insert(signature, Rc::clone(&program));
        program
    }
}

fn set_macro_default(defaults: &Provider, config: &MacroConfig) -> RenderResult<()> {
    let Some(value) = &config.default else {
        return Ok(());
    };
    let invalid = |reason: &str| RenderError::InvalidDefaultValue {
        name: config.name.clone(),
        reason: reason.to_owned(),
    };

    match config.ty {
        MacroType::Int => {
            let value = value
                .as_integer()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| invalid("expected a 32-bit integer"))?;
            defaults.set(&config.name, value);
        }
        MacroType::Bool | MacroType::Unset => {
            let value = value.as_bool().ok_or_else(|| invalid("expected a boolean"))?;
            // An unset macro is defined by presence alone.
            if config.ty == MacroType::Bool || value {
                defaults.set(&config.name, value);
            }
        }
    }
    Ok(())
}
