#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Run a device call, then in debug builds log any error the device reported for it.
macro_rules! gpu_check {
    ($device:expr, $call:expr) => {{
        let result = $call;
        if cfg!(debug_assertions) {
            if let Some(e) = $crate::device::RenderDevice::take_error(&mut *$device) {
                tracing::error!(call = stringify!($call), "GPU error: {e}");
            }
        }
        result
    }};
}

pub mod batch;
pub mod camera;
pub mod color;
pub mod config;
pub mod device;
pub mod rect;
pub mod sprite;
pub mod sprite_renderer;
pub mod text;
pub mod texture;
pub mod transform;
pub mod vertex;

mod error;
pub use error::RenderError;

/// The prelude
pub mod prelude {
    pub use {cro_ecs::prelude::*, glam::*};

    pub use crate::{
        batch::*, camera::*, color::*, config::*, device::*, error::*, rect::*, sprite::*,
        sprite_renderer::*, text::*, texture::*, transform::*, vertex::*,
    };
}
