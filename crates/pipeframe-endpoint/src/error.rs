/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// Transport-level error (channel create/open/accept).
    #[error("transport error: {0}")]
    Transport(#[from] pipeframe_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] pipeframe_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, EndpointError>;
