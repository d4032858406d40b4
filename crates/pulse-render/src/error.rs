//! Error types for the rendering layer.

use glam::UVec2;
use pulse_test_utils::GpuError;

use crate::rect::URect;

/// Result type used throughout `pulse-render`.
pub type RenderResult<T> = Result<T, RenderError>;

/// Classification of a failed surface frame acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceErrorKind {
    /// Acquiring the next frame took too long
    Timeout,
    /// The surface changed and must be reconfigured
    Outdated,
    /// The surface was lost and must be reconfigured
    Lost,
    /// Out of memory while acquiring the frame
    OutOfMemory,
    /// Any other acquisition failure
    Other,
}

impl SurfaceErrorKind {
    /// Whether the render loop may skip the frame and try again.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Timeout | Self::Outdated | Self::Lost)
    }
}

impl std::fmt::Display for SurfaceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Outdated => write!(f, "outdated"),
            Self::Lost => write!(f, "lost"),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Other => write!(f, "unknown error"),
        }
    }
}

#[allow(unreachable_patterns)]
impl From<wgpu::SurfaceError> for SurfaceErrorKind {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Timeout => Self::Timeout,
            wgpu::SurfaceError::Outdated => Self::Outdated,
            wgpu::SurfaceError::Lost => Self::Lost,
            wgpu::SurfaceError::OutOfMemory => Self::OutOfMemory,
            _ => Self::Other,
        }
    }
}

/// Errors raised while creating the device or its surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// No adapter matched the request
    NoAdapter(String),
    /// The adapter refused to create a device
    DeviceCreation(String),
    /// The window surface could not be created
    SurfaceCreation(String),
    /// The surface is not compatible with the adapter
    UnsupportedSurface,
}

impl std::fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter(msg) => write!(f, "No suitable GPU adapter: {}", msg),
            Self::DeviceCreation(msg) => write!(f, "Failed to create device: {}", msg),
            Self::SurfaceCreation(msg) => write!(f, "Failed to create surface: {}", msg),
            Self::UnsupportedSurface => write!(f, "Surface is not supported by the adapter"),
        }
    }
}

impl std::error::Error for GraphicsError {}

/// Rendering error.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// A render pipeline could not be built for a batch configuration
    PipelineSpecialization { label: String, source: GpuError },
    /// A buffer, texture or sampler could not be allocated
    ResourceCreation { label: String, source: GpuError },
    /// A sub-texture rectangle leaves its parent region
    OutOfBounds {
        parent: URect,
        position: UVec2,
        size: UVec2,
    },
    /// Texture dimensions or data are unusable
    InvalidTexture(String),
    /// A `RenderConfig` value is unusable
    InvalidConfig(String),
    /// Acquiring a surface frame failed
    Surface(SurfaceErrorKind),
    /// Device or surface setup failed
    Graphics(GraphicsError),
}

impl RenderError {
    pub(crate) fn resource_creation(label: impl Into<String>, source: GpuError) -> Self {
        Self::ResourceCreation {
            label: label.into(),
            source,
        }
    }

    /// Whether the error is transient and the frame may simply be skipped.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Surface(kind) => kind.is_recoverable(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PipelineSpecialization { label, source } => {
                write!(f, "Failed to build pipeline '{}': {}", label, source)
            }
            Self::ResourceCreation { label, source } => {
                write!(f, "Failed to allocate '{}': {}", label, source)
            }
            Self::OutOfBounds {
                parent,
                position,
                size,
            } => write!(
                f,
                "Sub-texture at {}, {} of size {}x{} exceeds parent region {}x{}",
                position.x, position.y, size.x, size.y, parent.width, parent.height
            ),
            Self::InvalidTexture(msg) => write!(f, "Invalid texture: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "Invalid render config: {}", msg),
            Self::Surface(kind) => write!(f, "Surface error: {}", kind),
            Self::Graphics(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PipelineSpecialization { source, .. }
            | Self::ResourceCreation { source, .. } => Some(source),
            Self::Graphics(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GraphicsError> for RenderError {
    fn from(err: GraphicsError) -> Self {
        Self::Graphics(err)
    }
}

impl From<SurfaceErrorKind> for RenderError {
    fn from(kind: SurfaceErrorKind) -> Self {
        Self::Surface(kind)
    }
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(err: wgpu::SurfaceError) -> Self {
        Self::Surface(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_errors_recoverable() {
        assert!(RenderError::from(wgpu::SurfaceError::Timeout).is_recoverable());
        assert!(RenderError::from(wgpu::SurfaceError::Outdated).is_recoverable());
        assert!(RenderError::from(wgpu::SurfaceError::Lost).is_recoverable());
        assert!(!RenderError::from(wgpu::SurfaceError::OutOfMemory).is_recoverable());
    }

    #[test]
    fn test_other_errors_not_recoverable() {
        let err = RenderError::PipelineSpecialization {
            label: "Sprite".to_string(),
            source: GpuError::Validation("bad shader".to_string()),
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("bad shader"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_resource_creation_display() {
        let err = RenderError::resource_creation(
            "LinesStencil",
            GpuError::OutOfMemory("device lost 64 MiB".to_string()),
        );
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("LinesStencil"));
        assert!(err.to_string().contains("64 MiB"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_out_of_bounds_display() {
        let err = RenderError::OutOfBounds {
            parent: URect::new(0, 0, 16, 16),
            position: UVec2::new(8, 8),
            size: UVec2::new(16, 16),
        };
        assert!(err.to_string().contains("16x16"));
    }
}
