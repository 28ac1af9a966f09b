//! # Minko
//!
//! Scene data binding: the property namespace and the draw calls fed by it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MINKO BINDING                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────┐          ┌──────────────────────┐      │
//! │  │   UNIT 1  data   │  signals │   UNIT 2  render     │      │
//! │  │                  │─────────>│                      │      │
//! │  │  • Provider      │          │  • Effect / Pass     │      │
//! │  │  • Collection    │  slots   │  • Program           │      │
//! │  │  • Store         │<─────────│  • DrawCallPool      │      │
//! │  └──────────────────┘          └──────────────────────┘      │
//! │            ^                              ^                  │
//! │            └───────────  surface  ────────┘                  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `surface`: geometry + material + technique, and the collection
//!   naming conventions binding paths rely on

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod surface;

// Re-export the units
pub use minko_data as data;
pub use minko_render as render;

pub use surface::{
    Surface, GEOMETRY_COLLECTION_NAME, GEOMETRY_UUID_VARIABLE, MATERIAL_COLLECTION_NAME,
    MATERIAL_UUID_VARIABLE,
};
