use crate::device::BufferId;

/// Errors reported by render devices and rendering helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// A shader program could not be compiled or linked.
    #[error("Failed to create shader program: {0}")]
    ProgramCreation(String),
    /// A buffer handle does not name a live buffer.
    #[error("Invalid vertex buffer {0:?}")]
    InvalidBuffer(BufferId),
    /// A partial buffer update ran past the end of the buffer.
    #[error("Write of {len} bytes at offset {offset} overruns buffer {buffer:?} of {size} bytes")]
    OutOfRange {
        /// The buffer written to.
        buffer: BufferId,
        /// The byte offset of the write.
        offset: usize,
        /// The length of the write.
        len: usize,
        /// The size of the buffer.
        size: usize,
    },
    /// A colour string was not valid hex.
    #[error("Invalid hex colour `{0}`")]
    InvalidHexColour(String),
    /// Any other error code raised by the device.
    #[error("Device error code {0:#06x}")]
    Code(u32),
}
