//! # Draw Call
//!
//! A draw call is one pass applied to one surface. It keeps, for every
//! uniform and state, a slot on the value it currently reads: the live
//! property while its binding resolves, the pass default otherwise.
//!
//! Draw calls are owned by the `DrawCallPool`, which decides when a
//! binding has to be resolved again. Rebinding only replaces the slot
//! inside the existing draw call.

use std::cell::RefCell;
use std::rc::Rc;

use minko_data::{Property, ValueSlot};
use tracing::{trace, warn};

use crate::binding::{BindingMap, BindingSource, BindingStores};
use crate::effect::EffectVariables;
use crate::pass::PassPtr;
use crate::program::ProgramPtr;
use crate::states::{
    BlendingDestination, BlendingSource, CompareMode, RenderTarget, ScissorBox, States,
    StencilOperation, TriangleCulling,
};
use crate::uniform::{UniformKind, UniformType};

/// Shared draw call handle.
pub type DrawCallPtr = Rc<RefCell<DrawCall>>;

/// Where a bound value currently comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingOrigin {
    /// A live property.
    Property {
        /// Concrete path the binding resolved to.
        path: String,
        /// Store the path lives in.
        source: BindingSource,
    },
    /// The pass default.
    Default,
}

impl BindingOrigin {
    /// Returns true while a live property is bound.
    #[inline]
    #[must_use]
    pub fn is_property(&self) -> bool {
        matches!(self, Self::Property { .. })
    }
}

/// A uniform and the slot it reads.
#[derive(Clone, Debug)]
pub struct BoundUniform {
    /// Shader variable name.
    pub name: String,
    /// Declared type.
    pub ty: UniformType,
    /// Declaration index in the pass.
    pub location: usize,
    /// Where the value comes from.
    pub origin: BindingOrigin,
    slot: ValueSlot,
}

impl BoundUniform {
    /// Address of the bound value.
    #[inline]
    #[must_use]
    pub fn data_ptr(&self) -> *const u8 {
        self.slot.address()
    }

    /// The bound slot.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> &ValueSlot {
        &self.slot
    }

    /// Runs `f` on the value's upload bytes. Booleans are uploaded as `i32`.
    ///
    /// # Returns
    ///
    /// `None` if the bound value no longer has the declared type.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        match self.ty {
            UniformType::Float => self.slot.with::<f32, _>(|v| f(bytemuck::bytes_of(v))),
            UniformType::Float2 => self.slot.with::<[f32; 2], _>(|v| f(bytemuck::cast_slice(v))),
            UniformType::Float3 => self.slot.with::<[f32; 3], _>(|v| f(bytemuck::cast_slice(v))),
            UniformType::Float4 => self.slot.with::<[f32; 4], _>(|v| f(bytemuck::cast_slice(v))),
            UniformType::Float16 => {
                self.slot.with::<[f32; 16], _>(|v| f(bytemuck::cast_slice(v)))
            }
            UniformType::Int => self.slot.with::<i32, _>(|v| f(bytemuck::bytes_of(v))),
            UniformType::Int2 => self.slot.with::<[i32; 2], _>(|v| f(bytemuck::cast_slice(v))),
            UniformType::Int3 => self.slot.with::<[i32; 3], _>(|v| f(bytemuck::cast_slice(v))),
            UniformType::Int4 => self.slot.with::<[i32; 4], _>(|v| f(bytemuck::cast_slice(v))),
            UniformType::Bool => self.slot.with::<bool, _>(|v| {
                let value = i32::from(*v);
                f(bytemuck::bytes_of(&value))
            }),
        }
    }
}

/// A render state and the slot it reads.
#[derive(Clone, Debug)]
pub struct BoundState {
    /// State name.
    pub name: &'static str,
    /// Where the value comes from.
    pub origin: BindingOrigin,
    slot: ValueSlot,
}

impl BoundState {
    /// Address of the bound value.
    #[inline]
    #[must_use]
    pub fn data_ptr(&self) -> *const u8 {
        self.slot.address()
    }

    /// The bound slot.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> &ValueSlot {
        &self.slot
    }
}

/// An input of a draw call that can be rebound.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum BindingTarget {
    Uniform(String),
    State(&'static str),
}

/// Which store event makes a binding stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WatchKind {
    /// Unresolved: wait for the path to appear.
    Added,
    /// Bound: wait for the property to go away.
    Removed,
    /// Resolved with the wrong type: wait for it to change.
    Changed,
}

/// A store path the pool has to observe for one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BindingWatch {
    pub source: BindingSource,
    pub path: String,
    pub kind: WatchKind,
}

/// One pass applied to one surface.
#[derive(Debug)]
pub struct DrawCall {
    id: u32,
    batch_ids: Vec<u32>,
    pass: PassPtr,
    variables: EffectVariables,
    stores: BindingStores,
    program: ProgramPtr,
    bound_float_uniforms: Vec<BoundUniform>,
    bound_int_uniforms: Vec<BoundUniform>,
    bound_bool_uniforms: Vec<BoundUniform>,
    bound_states: Vec<BoundState>,
}

impl DrawCall {
    /// Creates an unbound draw call. `bind_all` fills the bound inputs.
    pub(crate) fn new(
        id: u32,
        batch_id: u32,
        pass: PassPtr,
        variables: EffectVariables,
        stores: BindingStores,
    ) -> Self {
        let program = pass.select_program(&variables, &stores);
        Self {
            id,
            batch_ids: vec![batch_id],
            pass,
            variables,
            stores,
            program,
            bound_float_uniforms: Vec::new(),
            bound_int_uniforms: Vec::new(),
            bound_bool_uniforms: Vec::new(),
            bound_states: Vec::with_capacity(States::PROPERTY_NAMES.len()),
        }
    }

    /// Pool-wide identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Batches this draw call belongs to. Only shared draw calls have more
    /// than one.
    #[inline]
    #[must_use]
    pub fn batch_ids(&self) -> &[u32] {
        &self.batch_ids
    }

    /// The pass drawn.
    #[inline]
    #[must_use]
    pub fn pass(&self) -> &PassPtr {
        &self.pass
    }

    /// The selected program.
    #[inline]
    #[must_use]
    pub fn program(&self) -> &ProgramPtr {
        &self.program
    }

    /// Variables substituted into binding paths.
    #[inline]
    #[must_use]
    pub fn variables(&self) -> &EffectVariables {
        &self.variables
    }

    /// The stores bindings resolve in.
    #[inline]
    #[must_use]
    pub fn stores(&self) -> &BindingStores {
        &self.stores
    }

    /// Bound `float` family uniforms, in declaration order.
    #[inline]
    #[must_use]
    pub fn bound_float_uniforms(&self) -> &[BoundUniform] {
        &self.bound_float_uniforms
    }

    /// Bound `int` family uniforms, in declaration order.
    #[inline]
    #[must_use]
    pub fn bound_int_uniforms(&self) -> &[BoundUniform] {
        &self.bound_int_uniforms
    }

    /// Bound `bool` uniforms, in declaration order.
    #[inline]
    #[must_use]
    pub fn bound_bool_uniforms(&self) -> &[BoundUniform] {
        &self.bound_bool_uniforms
    }

    /// Every bound uniform, whatever its family.
    pub fn bound_uniforms(&self) -> impl Iterator<Item = &BoundUniform> {
        self.bound_float_uniforms
            .iter()
            .chain(&self.bound_int_uniforms)
            .chain(&self.bound_bool_uniforms)
    }

    /// The bound uniform `name`.
    #[must_use]
    pub fn bound_uniform(&self, name: &str) -> Option<&BoundUniform> {
        self.bound_uniforms().find(|uniform| uniform.name == name)
    }

    /// Bound states.
    #[inline]
    #[must_use]
    pub fn bound_states(&self) -> &[BoundState] {
        &self.bound_states
    }

    /// The bound state `name`.
    #[must_use]
    pub fn bound_state(&self, name: &str) -> Option<&BoundState> {
        self.bound_states.iter().find(|state| state.name == name)
    }

    /// Current value of state `name`.
    #[must_use]
    pub fn state<T: Property>(&self, name: &str) -> Option<T> {
        self.bound_state(name).and_then(|state| state.slot.get())
    }

    /// Draw priority.
    #[must_use]
    pub fn priority(&self) -> f32 {
        self.state(States::PROPERTY_PRIORITY)
            .unwrap_or(States::DEFAULT_PRIORITY)
    }

    /// Whether the draw call is depth sorted.
    #[must_use]
    pub fn z_sorted(&self) -> bool {
        self.state(States::PROPERTY_ZSORTED)
            .unwrap_or(States::DEFAULT_ZSORTED)
    }

    /// Source blending factor.
    #[must_use]
    pub fn blending_source(&self) -> BlendingSource {
        self.state(States::PROPERTY_BLENDING_SOURCE)
            .unwrap_or(States::DEFAULT_BLENDING_SOURCE)
    }

    /// Destination blending factor.
    #[must_use]
    pub fn blending_destination(&self) -> BlendingDestination {
        self.state(States::PROPERTY_BLENDING_DESTINATION)
            .unwrap_or(States::DEFAULT_BLENDING_DESTINATION)
    }

    /// Color writes.
    #[must_use]
    pub fn color_mask(&self) -> bool {
        self.state(States::PROPERTY_COLOR_MASK)
            .unwrap_or(States::DEFAULT_COLOR_MASK)
    }

    /// Depth writes.
    #[must_use]
    pub fn depth_mask(&self) -> bool {
        self.state(States::PROPERTY_DEPTH_MASK)
            .unwrap_or(States::DEFAULT_DEPTH_MASK)
    }

    /// Depth test.
    #[must_use]
    pub fn depth_function(&self) -> CompareMode {
        self.state(States::PROPERTY_DEPTH_FUNCTION)
            .unwrap_or(States::DEFAULT_DEPTH_FUNCTION)
    }

    /// Face culling.
    #[must_use]
    pub fn triangle_culling(&self) -> TriangleCulling {
        self.state(States::PROPERTY_TRIANGLE_CULLING)
            .unwrap_or(States::DEFAULT_TRIANGLE_CULLING)
    }

    /// Stencil test.
    #[must_use]
    pub fn stencil_function(&self) -> CompareMode {
        self.state(States::PROPERTY_STENCIL_FUNCTION)
            .unwrap_or(States::DEFAULT_STENCIL_FUNCTION)
    }

    /// Stencil reference value.
    #[must_use]
    pub fn stencil_reference(&self) -> i32 {
        self.state(States::PROPERTY_STENCIL_REFERENCE)
            .unwrap_or(States::DEFAULT_STENCIL_REFERENCE)
    }

    /// Stencil mask.
    #[must_use]
    pub fn stencil_mask(&self) -> u32 {
        self.state(States::PROPERTY_STENCIL_MASK)
            .unwrap_or(States::DEFAULT_STENCIL_MASK)
    }

    /// Stencil fail operation.
    #[must_use]
    pub fn stencil_fail_operation(&self) -> StencilOperation {
        self.state(States::PROPERTY_STENCIL_FAIL_OPERATION)
            .unwrap_or(States::DEFAULT_STENCIL_FAIL_OPERATION)
    }

    /// Stencil depth-fail operation.
    #[must_use]
    pub fn stencil_z_fail_operation(&self) -> StencilOperation {
        self.state(States::PROPERTY_STENCIL_ZFAIL_OPERATION)
            .unwrap_or(States::DEFAULT_STENCIL_ZFAIL_OPERATION)
    }

    /// Stencil pass operation.
    #[must_use]
    pub fn stencil_z_pass_operation(&self) -> StencilOperation {
        self.state(States::PROPERTY_STENCIL_ZPASS_OPERATION)
            .unwrap_or(States::DEFAULT_STENCIL_ZPASS_OPERATION)
    }

    /// Scissor test.
    #[must_use]
    pub fn scissor_test(&self) -> bool {
        self.state(States::PROPERTY_SCISSOR_TEST)
            .unwrap_or(States::DEFAULT_SCISSOR_TEST)
    }

    /// Scissor rectangle.
    #[must_use]
    pub fn scissor_box(&self) -> ScissorBox {
        self.state(States::PROPERTY_SCISSOR_BOX)
            .unwrap_or(States::DEFAULT_SCISSOR_BOX)
    }

    /// Render target.
    #[must_use]
    pub fn target(&self) -> RenderTarget {
        self.state(States::PROPERTY_TARGET)
            .unwrap_or(States::DEFAULT_TARGET)
    }

    pub(crate) fn add_batch(&mut self, batch_id: u32) {
        if !self.batch_ids.contains(&batch_id) {
            self.batch_ids.push(batch_id);
        }
    }

    /// Returns true once no batch references the draw call anymore.
    pub(crate) fn remove_batch(&mut self, batch_id: u32) -> bool {
        self.batch_ids.retain(|id| *id != batch_id);
        self.batch_ids.is_empty()
    }

    pub(crate) fn set_variables(&mut self, variables: EffectVariables) {
        self.variables = variables;
    }

    /// Selects the program again. Returns true if it changed.
    pub(crate) fn select_program(&mut self) -> bool {
        let program = self.pass.select_program(&self.variables, &self.stores);
        if Rc::ptr_eq(&program, &self.program) {
            return false;
        }
        trace!(
            draw_call = self.id,
            pass = %self.pass.name(),
            macros = program.signature().len(),
            "Program changed"
        );
        self.program = program;
        true
    }

    /// Binds every uniform and state.
    ///
    /// # Returns
    ///
    /// The store paths to observe for each input that has a binding.
    pub(crate) fn bind_all(&mut self) -> Vec<(BindingTarget, BindingWatch)> {
        let pass = Rc::clone(&self.pass);
        let uniforms = pass
            .uniforms()
            .iter()
            .map(|input| BindingTarget::Uniform(input.name.clone()));
        let states = States::PROPERTY_NAMES.into_iter().map(BindingTarget::State);

        uniforms
            .chain(states)
            .filter_map(|target| {
                let watch = self.rebind(&target)?;
                Some((target, watch))
            })
            .collect()
    }

    /// Resolves one input again and replaces its slot in place.
    pub(crate) fn rebind(&mut self, target: &BindingTarget) -> Option<BindingWatch> {
        match target {
            BindingTarget::Uniform(name) => self.bind_uniform(name),
            BindingTarget::State(name) => self.bind_state(name),
        }
    }

    fn bind_uniform(&mut self, name: &str) -> Option<BindingWatch> {
        let pass = Rc::clone(&self.pass);
        let (location, input) = pass
            .uniforms()
            .iter()
            .enumerate()
            .find(|(_, input)| input.name == name)?;
        let ty = input.ty;
        let (origin, slot, watch) = resolve(
            pass.uniform_bindings(),
            name,
            &self.variables,
            &self.stores,
            |slot| ty.accepts(slot),
        )?;

        let bound = BoundUniform {
            name: name.to_owned(),
            ty,
            location,
            origin,
            slot,
        };
        let list = match ty.kind() {
            UniformKind::Float => &mut self.bound_float_uniforms,
            UniformKind::Int => &mut self.bound_int_uniforms,
            UniformKind::Bool => &mut self.bound_bool_uniforms,
        };
        match list.iter_mut().find(|uniform| uniform.name == name) {
            Some(existing) => {
                if existing.origin != bound.origin {
                    trace!(
                        draw_call = self.id,
                        uniform = name,
                        bound = bound.origin.is_property(),
                        "Uniform rebound"
                    );
                }
                *existing = bound;
            }
            None => {
                let index = list.partition_point(|uniform| uniform.location < location);
                list.insert(index, bound);
            }
        }
        watch
    }

    fn bind_state(&mut self, name: &'static str) -> Option<BindingWatch> {
        let pass = Rc::clone(&self.pass);
        let (origin, slot, watch) = resolve(
            pass.state_bindings(),
            name,
            &self.variables,
            &self.stores,
            |slot| States::accepts(name, slot),
        )?;

        let bound = BoundState { name, origin, slot };
        match self.bound_states.iter_mut().find(|state| state.name == name) {
            Some(existing) => {
                if existing.origin != bound.origin {
                    trace!(
                        draw_call = self.id,
                        state = name,
                        bound = bound.origin.is_property(),
                        "State rebound"
                    );
                }
                *existing = bound;
            }
            None => self.bound_states.push(bound),
        }
        watch
    }
}

/// Resolves input `name`: the bound property if it exists with an accepted
/// type, else the default.
fn resolve(
    bindings: &BindingMap,
    name: &str,
    variables: &EffectVariables,
    stores: &BindingStores,
    accepts: impl Fn(&ValueSlot) -> bool,
) -> Option<(BindingOrigin, ValueSlot, Option<BindingWatch>)> {
    let mut watch = None;

    if let Some(binding) = bindings.bindings.get(name) {
        let (path, slot) = stores.lookup(binding, variables);
        match slot {
            Some(slot) if accepts(&slot) => {
                let watch = BindingWatch {
                    source: binding.source,
                    path: path.clone(),
                    kind: WatchKind::Removed,
                };
                let origin = BindingOrigin::Property {
                    path,
                    source: binding.source,
                };
                return Some((origin, slot, Some(watch)));
            }
            Some(slot) => {
                warn!(
                    input = name,
                    path = %path,
                    found = slot.type_name(),
                    "Bound property has an unexpected type, using the default"
                );
                watch = Some(BindingWatch {
                    source: binding.source,
                    path,
                    kind: WatchKind::Changed,
                });
            }
            None => {
                watch = Some(BindingWatch {
                    source: binding.source,
                    path,
                    kind: WatchKind::Added,
                });
            }
        }
    }

    let slot = bindings.default_slot(name)?;
    Some((BindingOrigin::Default, slot, watch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::config::PassConfig;
    use crate::pass::Pass;
    use crate::states::Priority;
    use minko_data::{Provider, Store};

    fn draw_call(source: &str) -> (DrawCall, Store) {
        let config: PassConfig = toml::from_str(source).unwrap();
        let pass = Pass::from_config(&config).unwrap();
        let target = Store::new();
        let stores = BindingStores::new(&Store::new(), &Store::new(), &target);
        let mut draw_call = DrawCall::new(1, 0, pass, EffectVariables::new(), stores);
        draw_call.bind_all();
        (draw_call, target)
    }

    const PASS: &str = r#"
        name = "main"
        [[uniforms]]
        name = "uDiffuseColor"
        type = "float4"
        binding = { property = "diffuseColor" }
        default = [1.0, 1.0, 1.0, 1.0]
        [[uniforms]]
        name = "uLightCount"
        type = "int"
        [[uniforms]]
        name = "uAlpha"
        type = "float"
        [[uniforms]]
        name = "uShadows"
        type = "bool"
        default = true
        [states.priority]
        binding = { property = "priority" }
    "#;

    #[test]
    fn test_uniforms_split_by_family() {
        let (draw_call, _) = draw_call(PASS);

        let floats: Vec<_> = draw_call
            .bound_float_uniforms()
            .iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(floats, vec!["uDiffuseColor", "uAlpha"]);
        assert_eq!(draw_call.bound_int_uniforms()[0].location, 1);
        assert_eq!(draw_call.bound_bool_uniforms().len(), 1);
        assert_eq!(draw_call.bound_states().len(), States::PROPERTY_NAMES.len());
    }

    #[test]
    fn test_unresolved_binding_uses_default() {
        let (draw_call, _) = draw_call(PASS);
        let pass = Rc::clone(draw_call.pass());

        let color = &draw_call.bound_float_uniforms()[0];
        assert_eq!(color.origin, BindingOrigin::Default);
        assert_eq!(
            color.data_ptr(),
            pass.uniform_bindings()
                .default_slot("uDiffuseColor")
                .unwrap()
                .address()
        );
        assert_eq!(draw_call.priority(), Priority::OPAQUE);
    }

    #[test]
    fn test_rebind_keeps_position() {
        let (mut draw_call, target) = draw_call(PASS);
        let material = Provider::new();
        material.set("diffuseColor", [0.5f32; 4]).set("priority", 10.0f32);
        target.add_provider(&material);

        let watch = draw_call
            .rebind(&BindingTarget::Uniform(String::from("uDiffuseColor")))
            .unwrap();
        draw_call.rebind(&BindingTarget::State(States::PROPERTY_PRIORITY));

        assert_eq!(watch.kind, WatchKind::Removed);
        assert_eq!(draw_call.bound_float_uniforms()[0].name, "uDiffuseColor");
        assert!(draw_call.bound_float_uniforms()[0].origin.is_property());
        assert_eq!(
            draw_call.bound_float_uniforms()[0].data_ptr(),
            target.property_slot("diffuseColor").unwrap().address()
        );
        assert_eq!(draw_call.priority(), 10.0);
    }

    #[test]
    fn test_wrong_type_falls_back_to_default() {
        let (mut draw_call, target) = draw_call(PASS);
        let material = Provider::new();
        material.set("diffuseColor", [0.5f32; 3]);
        target.add_provider(&material);

        let watch = draw_call
            .rebind(&BindingTarget::Uniform(String::from("uDiffuseColor")))
            .unwrap();

        assert_eq!(watch.kind, WatchKind::Changed);
        assert_eq!(draw_call.bound_float_uniforms()[0].origin, BindingOrigin::Default);
    }

    #[test]
    fn test_upload_bytes() {
        let (draw_call, _) = draw_call(PASS);

        let color = draw_call
            .bound_uniform("uDiffuseColor")
            .and_then(|u| u.with_bytes(|bytes| bytes.len()));
        let shadows = draw_call
            .bound_uniform("uShadows")
            .and_then(|u| u.with_bytes(|bytes| bytes.to_vec()));

        assert_eq!(color, Some(16));
        assert_eq!(shadows, Some(1i32.to_ne_bytes().to_vec()));
    }

    #[test]
    fn test_batches() {
        let (mut draw_call, _) = draw_call(PASS);

        draw_call.add_batch(4);
        draw_call.add_batch(4);
        assert_eq!(draw_call.batch_ids(), &[0, 4]);
        assert!(!draw_call.remove_batch(0));
        assert!(draw_call.remove_batch(4));
    }
}
