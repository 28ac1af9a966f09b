//! # Minko Data
//!
//! Reactive property namespace shared by the scene graph and the renderer.
//!
//! - **Providers** hold named, typed values with stable addresses
//! - **Collections** order providers under one name (`material`, `lights`...)
//! - **Stores** flatten providers and collections into one path namespace
//!   and report every addition, change and removal through signals
//!
//! ## Architecture Rules
//!
//! 1. **Single-threaded** - everything is `Rc`/`RefCell`, signals run inline
//! 2. **Stable addresses** - same-type writes never move a value
//! 3. **Pay for what you observe** - per-path signals exist only on demand
//!
//! ## Example
//!
//! ```rust,ignore
//! use minko_data::{Provider, Store};
//!
//! let store = Store::new();
//! let light = Provider::new();
//! light.set("color", [1.0f32, 1.0, 1.0]);
//!
//! store.add_provider_to_collection(&light, "lights");
//! assert!(store.has_property("lights[0].color"));
//! assert_eq!(store.get::<u32>("lights.length")?, 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collection;
pub mod error;
pub mod path;
pub mod provider;
pub mod signal;
pub mod store;
pub mod value;

pub use collection::{Collection, CollectionEvent, CollectionPtr};
pub use error::{DataError, DataResult};
pub use path::{resolve_variables, ItemKey, PropertyPath};
pub use provider::{Provider, ProviderEvent, ProviderPtr};
pub use signal::{Signal, SignalSlot};
pub use store::{PropertyEvent, Store};
pub use value::{Property, PropertyValue, ValueSlot};
