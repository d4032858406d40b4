//! GPU abstraction and test utilities for Pulse.
//!
//! This crate provides the seam between the batching layer and the GPU:
//!
//! - [`RenderContext`] - Trait abstracting the GPU operations the batches need
//! - GPU handle wrappers (`GpuBuffer`, `GpuTexture`, ...) - Can be real or mock
//! - `MockRenderContext` - Records every call for test assertions (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use pulse_test_utils::{MockRenderContext, RenderContext};
//! use wgpu::*;
//!
//! let mock = MockRenderContext::new();
//!
//! let buffer = mock
//!     .create_buffer(&BufferDescriptor {
//!         label: Some("test_buffer"),
//!         size: 1024,
//!         usage: BufferUsages::VERTEX,
//!         mapped_at_creation: false,
//!     })
//!     .unwrap();
//!
//! assert_eq!(mock.count_buffer_creates(), 1);
//! assert!(buffer.is_mock());
//! # }
//! ```
//!
//! # Design
//!
//! ## No Lifetimes
//!
//! All GPU handles are owned and cheap to clone; wgpu reference counts the
//! resources internally. Each handle carries a process-unique [`ResourceId`]
//! so batch keys can compare resources by identity.
//!
//! ## Plain-data Descriptors
//!
//! Pipelines, bind groups and render passes are described with the owned
//! `*Spec` types from [`render_context`] rather than wgpu descriptors, because
//! wgpu descriptors borrow concrete wgpu objects a mock cannot produce.

pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_render;
pub mod render_context;

pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_render::*;
pub use render_context::*;
