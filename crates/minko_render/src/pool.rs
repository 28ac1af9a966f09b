//! # Draw Call Pool
//!
//! Creates the draw calls of an effect technique for a surface and keeps
//! them bound to the stores they read from.
//!
//! ## Synchronization
//!
//! Store signals never touch a draw call directly. Each callback only
//! records what became stale (an input to rebind, a program to select
//! again, the order to recompute) and `update()` applies the whole batch.
//! Between two updates a draw call keeps reading its previous slots.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::mem;
use std::rc::Rc;

use minko_data::SignalSlot;
use tracing::{debug, warn};

use crate::binding::BindingStores;
use crate::draw_call::{BindingTarget, BindingWatch, DrawCall, DrawCallPtr, WatchKind};
use crate::effect::{EffectPtr, EffectVariables};
use crate::error::RenderResult;
use crate::pass::PassPtr;
use crate::states::States;

/// States whose change reorders the draw calls.
const SORT_STATES: [&str; 3] = [
    States::PROPERTY_PRIORITY,
    States::PROPERTY_ZSORTED,
    States::PROPERTY_TARGET,
];

/// Work recorded by store callbacks until the next `update()`.
#[derive(Default)]
struct PendingWork {
    rebinds: RefCell<BTreeSet<(u32, BindingTarget)>>,
    invalid: RefCell<BTreeSet<u32>>,
    reset: RefCell<BTreeSet<u32>>,
    sort: Cell<bool>,
}

/// Owns every draw call of a renderer.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = DrawCallPool::new();
/// let batch = pool.add_draw_calls(&effect, "default", &variables, &stores)?;
///
/// material.set("diffuseColor", [1.0f32, 0.0, 0.0, 1.0]);
/// pool.update();
///
/// for draw_call in pool.draw_calls() {
///     // upload draw_call.borrow().bound_float_uniforms()...
/// }
/// pool.remove_draw_calls(batch);
/// ```
pub struct DrawCallPool {
    next_draw_call_id: u32,
    next_batch_id: u32,
    draw_calls: Vec<DrawCallPtr>,
    by_id: HashMap<u32, DrawCallPtr>,
    batches: HashMap<u32, Vec<u32>>,
    binding_watches: HashMap<(u32, BindingTarget), Vec<SignalSlot>>,
    macro_watches: HashMap<u32, Vec<SignalSlot>>,
    pending: Rc<PendingWork>,
}

impl DrawCallPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_draw_call_id: 0,
            next_batch_id: 0,
            draw_calls: Vec::new(),
            by_id: HashMap::new(),
            batches: HashMap::new(),
            binding_watches: HashMap::new(),
            macro_watches: HashMap::new(),
            pending: Rc::new(PendingWork::default()),
        }
    }

    /// Creates the draw calls of `technique` for one surface.
    ///
    /// Forward passes get a draw call of their own. A non-forward pass
    /// reuses the draw call already created for the same program, which
    /// then simply belongs to one more batch.
    ///
    /// # Arguments
    ///
    /// * `effect` - Effect holding the technique
    /// * `technique` - Technique name
    /// * `variables` - Values for `${name}` placeholders in binding paths
    /// * `stores` - Root, renderer and target stores
    ///
    /// # Returns
    ///
    /// The batch id used to invalidate or remove these draw calls.
    ///
    /// # Errors
    ///
    /// `UnknownTechnique` if `effect` has no technique `technique`.
    pub fn add_draw_calls(
        &mut self,
        effect: &EffectPtr,
        technique: &str,
        variables: &EffectVariables,
        stores: &BindingStores,
    ) -> RenderResult<u32> {
        let passes = effect.technique(technique)?;
        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;

        let mut ids = Vec::with_capacity(passes.len());
        for pass in passes {
            if !pass.is_forward() {
                if let Some(shared) = self.find_shared(pass, variables, stores) {
                    let mut shared = shared.borrow_mut();
                    shared.add_batch(batch_id);
                    ids.push(shared.id());
                    continue;
                }
            }
            ids.push(self.create_draw_call(batch_id, pass, variables, stores));
        }

        debug!(
            batch = batch_id,
            effect = %effect.name(),
            technique,
            draw_calls = ids.len(),
            "Draw calls added"
        );
        self.batches.insert(batch_id, ids);
        self.sort();
        Ok(batch_id)
    }

    /// Removes a batch. Draw calls no other batch shares are destroyed and
    /// stop observing their stores.
    ///
    /// # Returns
    ///
    /// The number of draw calls destroyed.
    pub fn remove_draw_calls(&mut self, batch_id: u32) -> usize {
        let Some(ids) = self.batches.remove(&batch_id) else {
            warn!(batch = batch_id, "Removing an unknown draw call batch");
            return 0;
        };

        let mut destroyed = 0;
        for id in ids {
            let unused = self
                .by_id
                .get(&id)
                .is_some_and(|draw_call| draw_call.borrow_mut().remove_batch(batch_id));
            if unused {
                self.destroy(id);
                destroyed += 1;
            }
        }

        debug!(batch = batch_id, destroyed, "Draw calls removed");
        destroyed
    }

    /// Replaces the variables of a batch. Its draw calls select their
    /// program and resolve every binding again on the next `update()`.
    pub fn invalidate_draw_calls(&mut self, batch_id: u32, variables: &EffectVariables) {
        let Some(ids) = self.batches.get(&batch_id) else {
            warn!(batch = batch_id, "Invalidating an unknown draw call batch");
            return;
        };

        let mut reset = self.pending.reset.borrow_mut();
        for id in ids {
            if let Some(draw_call) = self.by_id.get(id) {
                draw_call.borrow_mut().set_variables(variables.clone());
                reset.insert(*id);
            }
        }
    }

    /// Applies everything that became stale since the last update:
    /// program selection, binding swaps, then ordering.
    pub fn update(&mut self) {
        let reset = mem::take(&mut *self.pending.reset.borrow_mut());
        let invalid = mem::take(&mut *self.pending.invalid.borrow_mut());

        for id in invalid.union(&reset) {
            let Some(draw_call) = self.by_id.get(id).cloned() else {
                continue;
            };
            let program_changed = draw_call.borrow_mut().select_program();
            if program_changed || reset.contains(id) {
                self.bind_all(*id, &draw_call);
            }
        }

        let rebinds = mem::take(&mut *self.pending.rebinds.borrow_mut());
        for (id, target) in rebinds {
            let Some(draw_call) = self.by_id.get(&id).cloned() else {
                continue;
            };
            let watch = draw_call.borrow_mut().rebind(&target);
            if let BindingTarget::State(name) = &target {
                if SORT_STATES.contains(name) {
                    self.pending.sort.set(true);
                }
            }
            let stores = draw_call.borrow().stores().clone();
            match watch {
                Some(watch) => self.watch_binding(id, target, watch, &stores),
                None => {
                    self.binding_watches.remove(&(id, target));
                }
            }
        }

        if self.pending.sort.replace(false) {
            self.sort();
        }
    }

    /// Destroys every draw call.
    pub fn clear(&mut self) {
        self.binding_watches.clear();
        self.macro_watches.clear();
        self.draw_calls.clear();
        self.by_id.clear();
        self.batches.clear();
        self.pending.rebinds.borrow_mut().clear();
        self.pending.invalid.borrow_mut().clear();
        self.pending.reset.borrow_mut().clear();
        self.pending.sort.set(false);
    }

    /// Draw calls by decreasing priority, then by render target.
    #[inline]
    #[must_use]
    pub fn draw_calls(&self) -> &[DrawCallPtr] {
        &self.draw_calls
    }

    /// Number of live draw calls.
    #[inline]
    #[must_use]
    pub fn num_draw_calls(&self) -> usize {
        self.draw_calls.len()
    }

    /// Draw calls of batch `batch_id`, in pass order.
    #[must_use]
    pub fn batch_draw_calls(&self, batch_id: u32) -> Vec<DrawCallPtr> {
        self.batches
            .get(&batch_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    /// Number of live batches.
    #[inline]
    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    fn find_shared(
        &self,
        pass: &PassPtr,
        variables: &EffectVariables,
        stores: &BindingStores,
    ) -> Option<DrawCallPtr> {
        let program = pass.select_program(variables, stores);
        self.draw_calls
            .iter()
            .find(|draw_call| {
                let draw_call = draw_call.borrow();
                Rc::ptr_eq(draw_call.pass(), pass) && Rc::ptr_eq(draw_call.program(), &program)
            })
            .cloned()
    }

    fn create_draw_call(
        &mut self,
        batch_id: u32,
        pass: &PassPtr,
        variables: &EffectVariables,
        stores: &BindingStores,
    ) -> u32 {
        let id = self.next_draw_call_id;
        self.next_draw_call_id += 1;

        let draw_call = Rc::new(RefCell::new(DrawCall::new(
            id,
            batch_id,
            Rc::clone(pass),
            variables.clone(),
            stores.clone(),
        )));
        self.bind_all(id, &draw_call);
        self.draw_calls.push(Rc::clone(&draw_call));
        self.by_id.insert(id, draw_call);
        id
    }

    fn destroy(&mut self, id: u32) {
        self.binding_watches.retain(|(owner, _), _| *owner != id);
        self.macro_watches.remove(&id);
        self.pending.rebinds.borrow_mut().retain(|(owner, _)| *owner != id);
        self.pending.invalid.borrow_mut().remove(&id);
        self.pending.reset.borrow_mut().remove(&id);

        if let Some(draw_call) = self.by_id.remove(&id) {
            self.draw_calls
                .retain(|candidate| !Rc::ptr_eq(candidate, &draw_call));
        }
    }

    /// Resolves every input of a draw call and observes the result.
    fn bind_all(&mut self, id: u32, draw_call: &DrawCallPtr) {
        let watches = draw_call.borrow_mut().bind_all();
        let stores = draw_call.borrow().stores().clone();

        self.binding_watches.retain(|(owner, _), _| *owner != id);
        for (target, watch) in watches {
            self.watch_binding(id, target, watch, &stores);
        }
        self.watch_macros(id, &draw_call.borrow());
        self.pending.sort.set(true);
    }

    fn watch_binding(
        &mut self,
        id: u32,
        target: BindingTarget,
        watch: BindingWatch,
        stores: &BindingStores,
    ) {
        let store = stores.select(watch.source);
        let signal = match watch.kind {
            WatchKind::Added => store.property_added_at(&watch.path),
            WatchKind::Removed => store.property_removed_at(&watch.path),
            WatchKind::Changed => store.property_changed_at(&watch.path),
        };

        let key = (id, target);
        let mut slots = Vec::with_capacity(2);
        slots.push({
            let pending = Rc::clone(&self.pending);
            let key = key.clone();
            signal.connect(move |_| {
                pending.rebinds.borrow_mut().insert(key.clone());
            })
        });

        let sorts = matches!(&key.1, BindingTarget::State(name) if SORT_STATES.contains(name));
        if sorts && watch.kind == WatchKind::Removed {
            let pending = Rc::clone(&self.pending);
            slots.push(
                store
                    .property_changed_at(&watch.path)
                    .connect(move |_| pending.sort.set(true)),
            );
        }

        self.binding_watches.insert(key, slots);
    }

    fn watch_macros(&mut self, id: u32, draw_call: &DrawCall) {
        let slots = draw_call
            .pass()
            .macro_bindings()
            .iter()
            .filter_map(|macro_binding| macro_binding.binding.as_ref())
            .map(|binding| {
                let path = binding.resolve(draw_call.variables());
                let pending = Rc::clone(&self.pending);
                draw_call
                    .stores()
                    .select(binding.source)
                    .property_changed_at(&path)
                    .connect(move |_| {
                        pending.invalid.borrow_mut().insert(id);
                    })
            })
            .collect();

        self.macro_watches.insert(id, slots);
    }

    fn sort(&mut self) {
        self.draw_calls.sort_by(|a, b| {
            let (a, b) = (a.borrow(), b.borrow());
            b.priority()
                .total_cmp(&a.priority())
                .then_with(|| a.target().id.cmp(&b.target().id))
        });
    }
}

impl Default for DrawCallPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DrawCallPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCallPool")
            .field("draw_calls", &self.draw_calls.len())
            .field("batches", &self.batches.len())
            .field("binding_watches", &self.binding_watches.len())
            .finish_non_exhaustive()
    }
}
