//! # Minko Render
//!
//! Draw call binding on top of the `minko_data` property namespace.
//!
//! An effect (loaded from TOML) lists passes. Each pass declares uniforms,
//! render states and macros, each optionally bound to a store path. The
//! `DrawCallPool` instantiates one draw call per pass and surface, and
//! keeps every bound input pointing at:
//!
//! - the live property while its path resolves in the bound store
//! - the pass default otherwise
//!
//! ## Architecture Rules
//!
//! 1. **No GPU calls** - a draw call describes what to upload, nothing more
//! 2. **Batched sync** - store signals queue work, `update()` applies it
//! 3. **Stable identity** - rebinding swaps slots inside the same draw call
//!
//! ## Example
//!
//! ```rust,ignore
//! use minko_render::{BindingStores, DrawCallPool, Effect, EffectVariables};
//!
//! let effect = Effect::from_toml_str(source)?;
//! let stores = BindingStores::new(&root, &renderer, &surface);
//! let mut pool = DrawCallPool::new();
//!
//! pool.add_draw_calls(&effect, "default", &EffectVariables::new(), &stores)?;
//! pool.update();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod binding;
pub mod draw_call;
pub mod effect;
pub mod error;
pub mod pass;
pub mod pool;
pub mod program;
pub mod states;
pub mod uniform;

pub use binding::{
    Binding, BindingMap, BindingSource, BindingStores, MacroBinding, MacroType, MacroValue,
};
pub use draw_call::{BindingOrigin, BoundState, BoundUniform, DrawCall, DrawCallPtr};
pub use effect::{Effect, EffectConfig, EffectPtr, EffectVariables};
pub use error::{RenderError, RenderResult};
pub use pass::{Pass, PassPtr, UniformInput};
pub use pool::DrawCallPool;
pub use program::{Program, ProgramPtr, ProgramSignature};
pub use states::{
    BlendingDestination, BlendingSource, CompareMode, Priority, RenderTarget, ScissorBox, States,
    StencilOperation, TriangleCulling,
};
pub use uniform::{UniformKind, UniformType};
