//! # Render States
//!
//! The fixed-function states a draw call carries, their engine defaults,
//! and the conversion of effect-file default values into typed properties.
//!
//! States are regular properties: a pass stores its defaults in a provider
//! (see `States`), and any state can be bound to a store path exactly like
//! a uniform.

use minko_data::{Provider, ProviderPtr, ValueSlot};
use serde::Deserialize;

use crate::error::{RenderError, RenderResult};

/// Blending factor applied to the source color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendingSource {
    /// 0
    Zero,
    /// 1
    One,
    /// Source color.
    SrcColor,
    /// 1 - source color.
    OneMinusSrcColor,
    /// Source alpha.
    SrcAlpha,
    /// 1 - source alpha.
    OneMinusSrcAlpha,
    /// Destination alpha.
    DstAlpha,
    /// 1 - destination alpha.
    OneMinusDstAlpha,
}

/// Blending factor applied to the destination color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendingDestination {
    /// 0
    Zero,
    /// 1
    One,
    /// Destination color.
    DstColor,
    /// 1 - destination color.
    OneMinusDstColor,
    /// min(source alpha, 1 - destination alpha).
    SrcAlphaSaturate,
    /// 1 - source alpha.
    OneMinusSrcAlpha,
    /// Destination alpha.
    DstAlpha,
    /// 1 - destination alpha.
    OneMinusDstAlpha,
}

/// Comparison used by depth and stencil tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Always passes.
    Always,
    /// Passes if equal.
    Equal,
    /// Passes if greater.
    Greater,
    /// Passes if greater or equal.
    GreaterEqual,
    /// Passes if less.
    Less,
    /// Passes if less or equal.
    LessEqual,
    /// Never passes.
    Never,
    /// Passes if different.
    NotEqual,
}

/// Which triangle faces are discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriangleCulling {
    /// Keep everything.
    None,
    /// Discard front faces.
    Front,
    /// Discard back faces.
    Back,
    /// Discard both.
    Both,
}

/// Stencil buffer update operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StencilOperation {
    /// Keep the current value.
    Keep,
    /// Set to 0.
    Zero,
    /// Set to the reference value.
    Replace,
    /// Increment, clamped.
    Incr,
    /// Increment, wrapping.
    IncrWrap,
    /// Decrement, clamped.
    Decr,
    /// Decrement, wrapping.
    DecrWrap,
    /// Bitwise invert.
    Invert,
}

/// Scissor rectangle: x, y, width, height.
pub type ScissorBox = [i32; 4];

/// Render target a draw call renders into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct RenderTarget {
    /// Target identifier, `0` for the back buffer.
    #[serde(default)]
    pub id: u32,
    /// Width in pixels.
    #[serde(default)]
    pub width: u32,
    /// Height in pixels.
    #[serde(default)]
    pub height: u32,
}

impl RenderTarget {
    /// The back buffer.
    pub const NONE: Self = Self {
        id: 0,
        width: 0,
        height: 0,
    };
}

/// Named draw priorities. Higher priorities are drawn first.
pub struct Priority;

impl Priority {
    /// Drawn before everything else.
    pub const FIRST: f32 = 4000.0;
    /// Backgrounds, sky boxes.
    pub const BACKGROUND: f32 = 3000.0;
    /// Opaque geometry.
    pub const OPAQUE: f32 = 2000.0;
    /// Transparent geometry.
    pub const TRANSPARENT: f32 = 1000.0;
    /// Drawn after everything else.
    pub const LAST: f32 = 0.0;

    /// Value of a named priority.
    #[must_use]
    pub fn from_name(name: &str) -> Option<f32> {
        match name {
            "first" => Some(Self::FIRST),
            "background" => Some(Self::BACKGROUND),
            "opaque" => Some(Self::OPAQUE),
            "transparent" => Some(Self::TRANSPARENT),
            "last" => Some(Self::LAST),
            _ => None,
        }
    }
}

/// A pass's state defaults, stored as properties.
///
/// Every one of the seventeen states is always present, so a state binding
/// can always fall back to a default slot.
#[derive(Clone, Debug)]
pub struct States {
    data: ProviderPtr,
}

impl States {
    /// `f32`
    pub const PROPERTY_PRIORITY: &'static str = "priority";
    /// `bool`
    pub const PROPERTY_ZSORTED: &'static str = "zSorted";
    /// `BlendingSource`
    pub const PROPERTY_BLENDING_SOURCE: &'static str = "blendingSource";
    /// `BlendingDestination`
    pub const PROPERTY_BLENDING_DESTINATION: &'static str = "blendingDestination";
    /// `bool`
    pub const PROPERTY_COLOR_MASK: &'static str = "colorMask";
    /// `bool`
    pub const PROPERTY_DEPTH_MASK: &'static str = "depthMask";
    /// `CompareMode`
    pub const PROPERTY_DEPTH_FUNCTION: &'static str = "depthFunction";
    /// `TriangleCulling`
    pub const PROPERTY_TRIANGLE_CULLING: &'static str = "triangleCulling";
    /// `CompareMode`
    pub const PROPERTY_STENCIL_FUNCTION: &'static str = "stencilFunction";
    /// `i32`
    pub const PROPERTY_STENCIL_REFERENCE: &'static str = "stencilReference";
    /// `u32`
    pub const PROPERTY_STENCIL_MASK: &'static str = "stencilMask";
    /// `StencilOperation`
    pub const PROPERTY_STENCIL_FAIL_OPERATION: &'static str = "stencilFailOperation";
    /// `StencilOperation`
    pub const PROPERTY_STENCIL_ZFAIL_OPERATION: &'static str = "stencilZFailOperation";
    /// `StencilOperation`
    pub const PROPERTY_STENCIL_ZPASS_OPERATION: &'static str = "stencilZPassOperation";
    /// `bool`
    pub const PROPERTY_SCISSOR_TEST: &'static str = "scissorTest";
    /// `ScissorBox`
    pub const PROPERTY_SCISSOR_BOX: &'static str = "scissorBox";
    /// `RenderTarget`
    pub const PROPERTY_TARGET: &'static str = "target";

    /// Every state name.
    pub const PROPERTY_NAMES: [&'static str; 17] = [
        Self::PROPERTY_PRIORITY,
        Self::PROPERTY_ZSORTED,
        Self::PROPERTY_BLENDING_SOURCE,
        Self::PROPERTY_BLENDING_DESTINATION,
        Self::PROPERTY_COLOR_MASK,
        Self::PROPERTY_DEPTH_MASK,
        Self::PROPERTY_DEPTH_FUNCTION,
        Self::PROPERTY_TRIANGLE_CULLING,
        Self::PROPERTY_STENCIL_FUNCTION,
        Self::PROPERTY_STENCIL_REFERENCE,
        Self::PROPERTY_STENCIL_MASK,
        Self::PROPERTY_STENCIL_FAIL_OPERATION,
        Self::PROPERTY_STENCIL_ZFAIL_OPERATION,
        Self::PROPERTY_STENCIL_ZPASS_OPERATION,
        Self::PROPERTY_SCISSOR_TEST,
        Self::PROPERTY_SCISSOR_BOX,
        Self::PROPERTY_TARGET,
    ];

    /// Default draw priority.
    pub const DEFAULT_PRIORITY: f32 = Priority::OPAQUE;
    /// Default z-sorting.
    pub const DEFAULT_ZSORTED: bool = false;
    /// Default source blending factor.
    pub const DEFAULT_BLENDING_SOURCE: BlendingSource = BlendingSource::One;
    /// Default destination blending factor.
    pub const DEFAULT_BLENDING_DESTINATION: BlendingDestination = BlendingDestination::Zero;
    /// Default color mask.
    pub const DEFAULT_COLOR_MASK: bool = true;
    /// Default depth mask.
    pub const DEFAULT_DEPTH_MASK: bool = true;
    /// Default depth test.
    pub const DEFAULT_DEPTH_FUNCTION: CompareMode = CompareMode::Less;
    /// Default culling.
    pub const DEFAULT_TRIANGLE_CULLING: TriangleCulling = TriangleCulling::Back;
    /// Default stencil test.
    pub const DEFAULT_STENCIL_FUNCTION: CompareMode = CompareMode::Always;
    /// Default stencil reference.
    pub const DEFAULT_STENCIL_REFERENCE: i32 = 0;
    /// Default stencil mask.
    pub const DEFAULT_STENCIL_MASK: u32 = 1;
    /// Default stencil fail operation.
    pub const DEFAULT_STENCIL_FAIL_OPERATION: StencilOperation = StencilOperation::Keep;
    /// Default stencil depth-fail operation.
    pub const DEFAULT_STENCIL_ZFAIL_OPERATION: StencilOperation = StencilOperation::Keep;
    /// Default stencil pass operation.
    pub const DEFAULT_STENCIL_ZPASS_OPERATION: StencilOperation = StencilOperation::Keep;
    /// Default scissor test.
    pub const DEFAULT_SCISSOR_TEST: bool = false;
    /// Default scissor box.
    pub const DEFAULT_SCISSOR_BOX: ScissorBox = [0, 0, 0, 0];
    /// Default render target.
    pub const DEFAULT_TARGET: RenderTarget = RenderTarget::NONE;

    /// Creates a set of states holding the engine defaults.
    #[must_use]
    pub fn new() -> Self {
        let data = Provider::new();
        data.set(Self::PROPERTY_PRIORITY, Self::DEFAULT_PRIORITY)
            .set(Self::PROPERTY_ZSORTED, Self::DEFAULT_ZSORTED)
            .set(Self::PROPERTY_BLENDING_SOURCE, Self::DEFAULT_BLENDING_SOURCE)
            .set(Self::PROPERTY_BLENDING_DESTINATION, Self::DEFAULT_BLENDING_DESTINATION)
            .set(Self::PROPERTY_COLOR_MASK, Self::DEFAULT_COLOR_MASK)
            .set(Self::PROPERTY_DEPTH_MASK, Self::DEFAULT_DEPTH_MASK)
            .set(Self::PROPERTY_DEPTH_FUNCTION, Self::DEFAULT_DEPTH_FUNCTION)
            .set(Self::PROPERTY_TRIANGLE_CULLING, Self::DEFAULT_TRIANGLE_CULLING)
            .set(Self::PROPERTY_STENCIL_FUNCTION, Self::DEFAULT_STENCIL_FUNCTION)
            .set(Self::PROPERTY_STENCIL_REFERENCE, Self::DEFAULT_STENCIL_REFERENCE)
            .set(Self::PROPERTY_STENCIL_MASK, Self::DEFAULT_STENCIL_MASK)
            .set(Self::PROPERTY_STENCIL_FAIL_OPERATION, Self::DEFAULT_STENCIL_FAIL_OPERATION)
            .set(Self::PROPERTY_STENCIL_ZFAIL_OPERATION, Self::DEFAULT_STENCIL_ZFAIL_OPERATION)
            .set(Self::PROPERTY_STENCIL_ZPASS_OPERATION, Self::DEFAULT_STENCIL_ZPASS_OPERATION)
            .set(Self::PROPERTY_SCISSOR_TEST, Self::DEFAULT_SCISSOR_TEST)
            .set(Self::PROPERTY_SCISSOR_BOX, Self::DEFAULT_SCISSOR_BOX)
            .set(Self::PROPERTY_TARGET, Self::DEFAULT_TARGET);
        Self { data }
    }

    /// The provider holding the values.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &ProviderPtr {
        &self.data
    }

    /// Returns true if `name` is one of the render states.
    #[must_use]
    pub fn is_state(name: &str) -> bool {
        Self::PROPERTY_NAMES.contains(&name)
    }

    /// Returns true if `slot` holds a value of the type state `name` expects.
    #[must_use]
    pub fn accepts(name: &str, slot: &ValueSlot) -> bool {
        match name {
            Self::PROPERTY_PRIORITY => slot.is::<f32>(),
            Self::PROPERTY_ZSORTED
            | Self::PROPERTY_COLOR_MASK
            | Self::PROPERTY_DEPTH_MASK
            | Self::PROPERTY_SCISSOR_TEST => slot.is::<bool>(),
            Self::PROPERTY_BLENDING_SOURCE => slot.is::<BlendingSource>(),
            Self::PROPERTY_BLENDING_DESTINATION => slot.is::<BlendingDestination>(),
            Self::PROPERTY_DEPTH_FUNCTION | Self::PROPERTY_STENCIL_FUNCTION => {
                slot.is::<CompareMode>()
            }
            Self::PROPERTY_TRIANGLE_CULLING => slot.is::<TriangleCulling>(),
            Self::PROPERTY_STENCIL_REFERENCE => slot.is::<i32>(),
            Self::PROPERTY_STENCIL_MASK => slot.is::<u32>(),
            Self::PROPERTY_STENCIL_FAIL_OPERATION
            | Self::PROPERTY_STENCIL_ZFAIL_OPERATION
            | Self::PROPERTY_STENCIL_ZPASS_OPERATION => slot.is::<StencilOperation>(),
            Self::PROPERTY_SCISSOR_BOX => slot.is::<ScissorBox>(),
            Self::PROPERTY_TARGET => slot.is::<RenderTarget>(),
            _ => false,
        }
    }

    /// Overrides the default of state `name` with an effect-file value.
    ///
    /// # Errors
    ///
    /// `UnknownState` for names outside of the seventeen states,
    /// `InvalidDefaultValue` if the value does not convert.
    pub fn set_from_config(&self, name: &str, value: &toml::Value) -> RenderResult<()> {
        let invalid = |reason: &str| RenderError::InvalidDefaultValue {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };

        match name {
            Self::PROPERTY_PRIORITY => {
                let priority = priority_from_config(value)
                    .ok_or_else(|| invalid("expected a number, a priority name or [name, offset]"))?;
                self.data.set(name, priority);
            }
            Self::PROPERTY_ZSORTED
            | Self::PROPERTY_COLOR_MASK
            | Self::PROPERTY_DEPTH_MASK
            | Self::PROPERTY_SCISSOR_TEST => {
                self.data
                    .set(name, value.as_bool().ok_or_else(|| invalid("expected a boolean"))?);
            }
            Self::PROPERTY_BLENDING_SOURCE => {
                self.data.set(name, enum_from_config::<BlendingSource>(value).map_err(|e| invalid(&e))?);
            }
            Self::PROPERTY_BLENDING_DESTINATION => {
                self.data.set(name, enum_from_config::<BlendingDestination>(value).map_err(|e| invalid(&e))?);
            }
            Self::PROPERTY_DEPTH_FUNCTION | Self::PROPERTY_STENCIL_FUNCTION => {
                self.data.set(name, enum_from_config::<CompareMode>(value).map_err(|e| invalid(&e))?);
            }
            Self::PROPERTY_TRIANGLE_CULLING => {
                self.data.set(name, enum_from_config::<TriangleCulling>(value).map_err(|e| invalid(&e))?);
            }
            Self::PROPERTY_STENCIL_FAIL_OPERATION
            | Self::PROPERTY_STENCIL_ZFAIL_OPERATION
            | Self::PROPERTY_STENCIL_ZPASS_OPERATION => {
                self.data.set(name, enum_from_config::<StencilOperation>(value).map_err(|e| invalid(&e))?);
            }
            Self::PROPERTY_STENCIL_REFERENCE => {
                let reference = value
                    .as_integer()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| invalid("expected a 32-bit integer"))?;
                self.data.set(name, reference);
            }
            Self::PROPERTY_STENCIL_MASK => {
                let mask = value
                    .as_integer()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| invalid("expected an unsigned 32-bit integer"))?;
                self.data.set(name, mask);
            }
            Self::PROPERTY_SCISSOR_BOX => {
                let scissor: ScissorBox = value
                    .clone()
                    .try_into()
                    .map_err(|_| invalid("expected [x, y, width, height]"))?;
                self.data.set(name, scissor);
            }
            Self::PROPERTY_TARGET => {
                self.data.set(name, target_from_config(value).map_err(|e| invalid(&e))?);
            }
            _ => return Err(RenderError::UnknownState(name.to_owned())),
        }
        Ok(())
    }

    /// Current priority.
    #[must_use]
    pub fn priority(&self) -> f32 {
        self.data
            .get(Self::PROPERTY_PRIORITY)
            .unwrap_or(Self::DEFAULT_PRIORITY)
    }

    /// Current z-sorting flag.
    #[must_use]
    pub fn z_sorted(&self) -> bool {
        self.data
            .get(Self::PROPERTY_ZSORTED)
            .unwrap_or(Self::DEFAULT_ZSORTED)
    }

    /// Current render target.
    #[must_use]
    pub fn target(&self) -> RenderTarget {
        self.data
            .get(Self::PROPERTY_TARGET)
            .unwrap_or(Self::DEFAULT_TARGET)
    }
}

impl Default for States {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts `2000`, `2000.0`, `"opaque"` or `["opaque", 10]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn priority_from_config(value: &toml::Value) -> Option<f32> {
    match value {
        toml::Value::Float(v) => Some(*v as f32),
        toml::Value::Integer(v) => Some(*v as f32),
        toml::Value::String(name) => Priority::from_name(name),
        toml::Value::Array(items) => match items.as_slice() {
            [toml::Value::String(name), offset] => {
                let offset = offset
                    .as_float()
                    .or_else(|| offset.as_integer().map(|v| v as f64))?;
                Priority::from_name(name).map(|base| base + offset as f32)
            }
            _ => None,
        },
        _ => None,
    }
}

fn enum_from_config<T: for<'de> Deserialize<'de>>(value: &toml::Value) -> Result<T, String> {
    value.clone().try_into().map_err(|e: toml::de::Error| e.message().to_owned())
}

/// Accepts `{ id, width, height }` or `{ id, size }` for square targets.
fn target_from_config(value: &toml::Value) -> Result<RenderTarget, String> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TargetConfig {
        #[serde(default)]
        id: u32,
        size: Option<u32>,
        width: Option<u32>,
        height: Option<u32>,
    }

    let config: TargetConfig = value
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| e.message().to_owned())?;
    let (width, height) = match (config.size, config.width, config.height) {
        (Some(size), None, None) => (size, size),
        (None, Some(width), Some(height)) => (width, height),
        (None, None, None) => (0, 0),
        _ => return Err(String::from("expected either size or width and height")),
    };

    Ok(RenderTarget {
        id: config.id,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(source: &str) -> toml::Value {
        let table: toml::Table = toml::from_str(&format!("v = {source}")).unwrap();
        table["v"].clone()
    }

    #[test]
    fn test_engine_defaults() {
        let states = States::new();

        assert_eq!(states.priority(), Priority::OPAQUE);
        assert!(!states.z_sorted());
        assert_eq!(states.target(), RenderTarget::NONE);
        assert_eq!(states.data().len(), States::PROPERTY_NAMES.len());
        assert_eq!(
            states.data().get::<StencilOperation>(States::PROPERTY_STENCIL_ZPASS_OPERATION),
            Ok(StencilOperation::Keep)
        );
    }

    #[test]
    fn test_priority_forms() {
        assert_eq!(priority_from_config(&value("\"first\"")), Some(4000.0));
        assert_eq!(priority_from_config(&value("\"background\"")), Some(3000.0));
        assert_eq!(priority_from_config(&value("42")), Some(42.0));
        assert_eq!(priority_from_config(&value("12.5")), Some(12.5));
        assert_eq!(priority_from_config(&value("[\"transparent\", 10]")), Some(1010.0));
        assert_eq!(priority_from_config(&value("\"sometimes\"")), None);
    }

    #[test]
    fn test_set_from_config_enums() {
        let states = States::new();

        states
            .set_from_config(States::PROPERTY_BLENDING_SOURCE, &value("\"src_alpha\""))
            .unwrap();
        states
            .set_from_config(States::PROPERTY_DEPTH_FUNCTION, &value("\"greater_equal\""))
            .unwrap();

        assert_eq!(
            states.data().get(States::PROPERTY_BLENDING_SOURCE),
            Ok(BlendingSource::SrcAlpha)
        );
        assert_eq!(
            states.data().get(States::PROPERTY_DEPTH_FUNCTION),
            Ok(CompareMode::GreaterEqual)
        );
    }

    #[test]
    fn test_set_from_config_rejects() {
        let states = States::new();

        assert!(matches!(
            states.set_from_config("wireframe", &value("true")),
            Err(RenderError::UnknownState(_))
        ));
        assert!(matches!(
            states.set_from_config(States::PROPERTY_TRIANGLE_CULLING, &value("\"sideways\"")),
            Err(RenderError::InvalidDefaultValue { .. })
        ));
        assert!(matches!(
            states.set_from_config(States::PROPERTY_STENCIL_MASK, &value("-1")),
            Err(RenderError::InvalidDefaultValue { .. })
        ));
    }

    #[test]
    fn test_target_forms() {
        let states = States::new();

        states
            .set_from_config(States::PROPERTY_TARGET, &value("{ id = 3, size = 256 }"))
            .unwrap();
        assert_eq!(
            states.target(),
            RenderTarget {
                id: 3,
                width: 256,
                height: 256
            }
        );

        states
            .set_from_config(States::PROPERTY_TARGET, &value("{ id = 4, width = 640, height = 480 }"))
            .unwrap();
        assert_eq!(states.target().width, 640);
        assert!(states
            .set_from_config(States::PROPERTY_TARGET, &value("{ size = 2, width = 4 }"))
            .is_err());
    }

    #[test]
    fn test_accepts_checks_types() {
        let states = States::new();
        let priority = states.data().slot(States::PROPERTY_PRIORITY).unwrap();
        let mask = states.data().slot(States::PROPERTY_STENCIL_MASK).unwrap();

        assert!(States::accepts(States::PROPERTY_PRIORITY, &priority));
        assert!(!States::accepts(States::PROPERTY_ZSORTED, &priority));
        assert!(States::accepts(States::PROPERTY_STENCIL_MASK, &mask));
        assert!(States::is_state("scissorBox"));
        assert!(!States::is_state("diffuseColor"));
    }
}
