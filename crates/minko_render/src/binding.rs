//! # Bindings
//!
//! A binding ties a shader input (uniform, state or macro) to a property
//! path in one of the three stores a draw call sees. Paths may contain
//! `${variable}` placeholders resolved per draw call.

use std::collections::HashMap;

use minko_data::{resolve_variables, ProviderPtr, Store, ValueSlot};
use serde::Deserialize;

/// Which store of a draw call a binding reads from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingSource {
    /// Scene-wide data (lights, time...).
    Root,
    /// Data of the renderer drawing the scene (camera, viewport...).
    Renderer,
    /// Data of the drawn surface (material, geometry, transform).
    #[default]
    Target,
}

/// A property path plus the store it is read from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Binding {
    /// Property path, possibly containing `${variable}` placeholders.
    #[serde(rename = "property")]
    pub property_name: String,
    /// Store the path is resolved in.
    #[serde(default)]
    pub source: BindingSource,
}

impl Binding {
    /// Creates a binding.
    #[must_use]
    pub fn new(property_name: impl Into<String>, source: BindingSource) -> Self {
        Self {
            property_name: property_name.into(),
            source,
        }
    }

    /// The concrete path once `variables` are substituted.
    #[must_use]
    pub fn resolve(&self, variables: &HashMap<String, String>) -> String {
        resolve_variables(variables, &self.property_name)
    }
}

/// Bindings keyed by input name, with the default values used while a
/// binding does not resolve.
#[derive(Clone, Debug)]
pub struct BindingMap {
    /// Input name to binding.
    pub bindings: HashMap<String, Binding>,
    /// One property per input that has a default.
    pub default_values: ProviderPtr,
}

impl BindingMap {
    /// Creates an empty map over `default_values`.
    #[must_use]
    pub fn new(default_values: ProviderPtr) -> Self {
        Self {
            bindings: HashMap::new(),
            default_values,
        }
    }

    /// The default slot of input `name`.
    #[inline]
    #[must_use]
    pub fn default_slot(&self, name: &str) -> Option<ValueSlot> {
        self.default_values.slot(name)
    }
}

/// How a macro binding defines its macro.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroType {
    /// Defined whenever the property exists.
    #[default]
    Unset,
    /// Defined with the property's `i32` value.
    Int,
    /// Defined when the property is `true`.
    Bool,
}

/// The value a macro takes in a program signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MacroValue {
    /// `#define NAME`
    Defined,
    /// `#define NAME value`
    Int(i32),
}

/// A macro driven by a property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroBinding {
    /// Macro name.
    pub name: String,
    /// Property driving the macro, if any.
    pub binding: Option<Binding>,
    /// Definition rule.
    pub ty: MacroType,
    /// Lower clamp for integer macros.
    pub min: Option<i32>,
    /// Upper clamp for integer macros.
    pub max: Option<i32>,
}

impl MacroBinding {
    /// Evaluates the macro from the slot its binding (or default) resolves to.
    ///
    /// # Returns
    ///
    /// `None` when the macro stays undefined.
    #[must_use]
    pub fn evaluate(&self, slot: Option<&ValueSlot>) -> Option<MacroValue> {
        let slot = slot?;
        match self.ty {
            MacroType::Unset => Some(MacroValue::Defined),
            MacroType::Bool => slot
                .get::<bool>()
                .and_then(|defined| defined.then_some(MacroValue::Defined)),
            MacroType::Int => integer(slot).map(|value| {
                let value = self.min.map_or(value, |min| value.max(min));
                MacroValue::Int(self.max.map_or(value, |max| value.min(max)))
            }),
        }
    }
}

/// Collection lengths are `u32`, other integer properties `i32`.
fn integer(slot: &ValueSlot) -> Option<i32> {
    slot.get::<i32>().or_else(|| {
        slot.get::<u32>()
            .map(|value| i32::try_from(value).unwrap_or(i32::MAX))
    })
}

/// The three stores a draw call resolves its bindings in.
#[derive(Clone, Debug)]
pub struct BindingStores {
    /// Scene-wide store.
    pub root: Store,
    /// Renderer store.
    pub renderer: Store,
    /// Surface store.
    pub target: Store,
}

impl BindingStores {
    /// Groups three stores.
    #[must_use]
    pub fn new(root: &Store, renderer: &Store, target: &Store) -> Self {
        Self {
            root: root.clone(),
            renderer: renderer.clone(),
            target: target.clone(),
        }
    }

    /// The store `source` designates.
    #[inline]
    #[must_use]
    pub fn select(&self, source: BindingSource) -> &Store {
        match source {
            BindingSource::Root => &self.root,
            BindingSource::Renderer => &self.renderer,
            BindingSource::Target => &self.target,
        }
    }

    /// Resolves `binding` with `variables` and looks the path up.
    ///
    /// # Returns
    ///
    /// The concrete path and the slot it currently resolves to.
    #[must_use]
    pub fn lookup(
        &self,
        binding: &Binding,
        variables: &HashMap<String, String>,
    ) -> (String, Option<ValueSlot>) {
        let path = binding.resolve(variables);
        let slot = self.select(binding.source).property_slot(&path);
        (path, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minko_data::Provider;

    fn int_macro(min: Option<i32>, max: Option<i32>) -> MacroBinding {
        MacroBinding {
            name: String::from("NUM_LIGHTS"),
            binding: Some(Binding::new("lights.length", BindingSource::Root)),
            ty: MacroType::Int,
            min,
            max,
        }
    }

    #[test]
    fn test_binding_resolves_variables() {
        let binding = Binding::new("material[${materialUuid}].diffuseColor", BindingSource::Target);
        let variables = HashMap::from([(String::from("materialUuid"), String::from("abc"))]);

        assert_eq!(binding.resolve(&variables), "material[abc].diffuseColor");
    }

    #[test]
    fn test_int_macro_clamps() {
        let provider = Provider::new();
        provider.set("n", 12);
        let slot = provider.slot("n");

        assert_eq!(int_macro(None, None).evaluate(slot.as_ref()), Some(MacroValue::Int(12)));
        assert_eq!(int_macro(None, Some(8)).evaluate(slot.as_ref()), Some(MacroValue::Int(8)));
        assert_eq!(int_macro(Some(16), None).evaluate(slot.as_ref()), Some(MacroValue::Int(16)));
        assert_eq!(int_macro(None, None).evaluate(None), None);
    }

    #[test]
    fn test_int_macro_reads_lengths() {
        let provider = Provider::new();
        provider.set("lights.length", 3u32);

        assert_eq!(
            int_macro(None, None).evaluate(provider.slot("lights.length").as_ref()),
            Some(MacroValue::Int(3))
        );
    }

    #[test]
    fn test_bool_and_unset_macros() {
        let provider = Provider::new();
        provider.set("on", true).set("off", false);
        let mut binding = int_macro(None, None);

        binding.ty = MacroType::Bool;
        assert_eq!(binding.evaluate(provider.slot("on").as_ref()), Some(MacroValue::Defined));
        assert_eq!(binding.evaluate(provider.slot("off").as_ref()), None);

        binding.ty = MacroType::Unset;
        assert_eq!(binding.evaluate(provider.slot("off").as_ref()), Some(MacroValue::Defined));
    }

    #[test]
    fn test_stores_select_by_source() {
        let root = Store::new();
        let renderer = Store::new();
        let target = Store::new();
        let stores = BindingStores::new(&root, &renderer, &target);
        let camera = Provider::new();
        camera.set("viewMatrix", [0.0f32; 16]);
        renderer.add_provider(&camera);

        let binding = Binding::new("viewMatrix", BindingSource::Renderer);
        let (path, slot) = stores.lookup(&binding, &HashMap::new());

        assert_eq!(path, "viewMatrix");
        assert!(slot.is_some());
        assert!(stores.select(BindingSource::Target).ptr_eq(&target));
        assert!(stores
            .lookup(&Binding::new("viewMatrix", BindingSource::Target), &HashMap::new())
            .1
            .is_none());
    }
}
