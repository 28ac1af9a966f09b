//! # Surface
//!
//! A surface is a geometry drawn with a material through one effect
//! technique. It publishes both providers in the target store under the
//! conventional collection names and instantiates the technique's draw
//! calls with the matching `${geometryUuid}` / `${materialUuid}` variables.

use std::rc::Rc;

use minko_data::{DataResult, ProviderPtr, Store};
use minko_render::{BindingStores, DrawCallPool, EffectPtr, EffectVariables, RenderResult};
use tracing::debug;

/// Collection holding the materials of a target store.
pub const MATERIAL_COLLECTION_NAME: &str = "material";

/// Collection holding the geometries of a target store.
pub const GEOMETRY_COLLECTION_NAME: &str = "geometry";

/// Variable naming the material in binding paths.
pub const MATERIAL_UUID_VARIABLE: &str = "materialUuid";

/// Variable naming the geometry in binding paths.
pub const GEOMETRY_UUID_VARIABLE: &str = "geometryUuid";

/// A geometry, a material and the technique drawing them.
#[derive(Debug, Clone)]
pub struct Surface {
    geometry: ProviderPtr,
    material: ProviderPtr,
    effect: EffectPtr,
    technique: String,
}

impl Surface {
    /// Creates a surface. Nothing is published until `attach`.
    #[must_use]
    pub fn new(
        geometry: &ProviderPtr,
        material: &ProviderPtr,
        effect: &EffectPtr,
        technique: impl Into<String>,
    ) -> Self {
        Self {
            geometry: Rc::clone(geometry),
            material: Rc::clone(material),
            effect: Rc::clone(effect),
            technique: technique.into(),
        }
    }

    /// Geometry data.
    #[inline]
    #[must_use]
    pub fn geometry(&self) -> &ProviderPtr {
        &self.geometry
    }

    /// Material data.
    #[inline]
    #[must_use]
    pub fn material(&self) -> &ProviderPtr {
        &self.material
    }

    /// Effect drawn.
    #[inline]
    #[must_use]
    pub fn effect(&self) -> &EffectPtr {
        &self.effect
    }

    /// Technique drawn.
    #[inline]
    #[must_use]
    pub fn technique(&self) -> &str {
        &self.technique
    }

    /// Binding variables naming this surface's providers.
    #[must_use]
    pub fn variables(&self) -> EffectVariables {
        EffectVariables::from([
            (
                String::from(MATERIAL_UUID_VARIABLE),
                self.material.uuid().to_owned(),
            ),
            (
                String::from(GEOMETRY_UUID_VARIABLE),
                self.geometry.uuid().to_owned(),
            ),
        ])
    }

    /// Publishes the providers in the target store and creates the draw
    /// calls.
    ///
    /// # Returns
    ///
    /// The draw call batch of this surface.
    ///
    /// # Errors
    ///
    /// `UnknownTechnique` if the effect lacks the technique. The providers
    /// are published anyway.
    pub fn attach(&self, pool: &mut DrawCallPool, stores: &BindingStores) -> RenderResult<u32> {
        stores
            .target
            .add_provider_to_collection(&self.geometry, GEOMETRY_COLLECTION_NAME);
        stores
            .target
            .add_provider_to_collection(&self.material, MATERIAL_COLLECTION_NAME);

        let batch = pool.add_draw_calls(&self.effect, &self.technique, &self.variables(), stores)?;
        debug!(
            batch,
            material = %self.material.uuid(),
            geometry = %self.geometry.uuid(),
            "Surface attached"
        );
        Ok(batch)
    }

    /// Removes the draw calls of `batch` and withdraws the providers.
    ///
    /// # Errors
    ///
    /// `ProviderNotFound` if the providers are no longer in the target store.
    pub fn detach(
        &self,
        pool: &mut DrawCallPool,
        target: &Store,
        batch: u32,
    ) -> RenderResult<()> {
        pool.remove_draw_calls(batch);
        target.remove_provider_from_collection(&self.material, MATERIAL_COLLECTION_NAME)?;
        target.remove_provider_from_collection(&self.geometry, GEOMETRY_COLLECTION_NAME)?;
        Ok(())
    }

    /// Swaps the material of an attached surface. The draw calls are kept
    /// and rebound to the new material on the next `update()`.
    ///
    /// # Errors
    ///
    /// `ProviderNotFound` if the current material is not in the target store.
    pub fn set_material(
        &mut self,
        material: &ProviderPtr,
        pool: &mut DrawCallPool,
        target: &Store,
        batch: u32,
    ) -> DataResult<()> {
        target.remove_provider_from_collection(&self.material, MATERIAL_COLLECTION_NAME)?;
        self.material = Rc::clone(material);
        target.add_provider_to_collection(&self.material, MATERIAL_COLLECTION_NAME);
        pool.invalidate_draw_calls(batch, &self.variables());
        Ok(())
    }
}
