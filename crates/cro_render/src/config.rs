//! Renderer settings.

use serde::{Deserialize, Serialize};

/// Which axis sprites are depth sorted along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthAxis {
    /// Sprites keep the Z position of their transform.
    #[default]
    Z,
    /// Each frame a sprite's Z is set from its Y position, so lower sprites draw in front.
    Y,
}

/// Settings shared by the batching renderers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Lower the number of entities per vertex buffer below what the device supports.
    pub max_batch_entities: Option<usize>,
    /// Depth axis of the sprite renderer.
    pub depth_axis: DepthAxis,
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: RendererConfig = serde_yaml::from_str("depth_axis: y").unwrap();
        assert_eq!(config.depth_axis, DepthAxis::Y);
        assert_eq!(config.max_batch_entities, None);

        let config: RendererConfig = serde_yaml::from_str("max_batch_entities: 64").unwrap();
        assert_eq!(config.max_batch_entities, Some(64));
        assert!(serde_yaml::from_str::<RendererConfig>("batch: 1").is_err());
    }
}
