//! Pulse Render
//!
//! Batched 2D drawing on top of wgpu. Draw calls are accumulated per kind
//! (sprites, triangle meshes, stroked lines) and submitted as few render
//! passes as possible, while pipelines, samplers and scratch textures are
//! kept in small LRU caches.
//!
//! - [`Renderer`] - The draw API; owns every batch and cache
//! - [`Texture`] / [`TextureRegion`] - Textures and rectangles inside them
//! - [`GraphicsContext`] - A wgpu device implementing [`RenderContext`]
//! - [`SurfaceTarget`] - Window presentation
//!
//! All GPU access goes through [`RenderContext`], so everything above the
//! device can be tested against `MockRenderContext` from `pulse-test-utils`.

pub mod batch;
pub mod blend;
pub mod cache;
pub mod color;
pub mod config;
pub mod context;
mod context_impl;
pub mod error;
pub mod rect;
pub mod renderer;
pub mod router;
pub mod shader;
pub mod surface;
pub mod texture;
pub mod transform;

pub use batch::{
    BatchStats, DrawSpriteOptions, DrawSpritesFromGpuOptions, DrawTrianglesOptions, SpriteInstance,
    StrokePathOptions, Vertex2d,
};
pub use blend::BlendMode;
pub use color::Color;
pub use config::RenderConfig;
pub use context::{GraphicsContext, GraphicsContextDescriptor};
pub use error::{GraphicsError, RenderError, RenderResult, SurfaceErrorKind};
pub use rect::URect;
pub use renderer::{FillPathOptions, FrameStats, Renderer};
pub use router::{CommandKind, CommandRouter, FlushCommand};
pub use shader::ShaderSource;
pub use surface::{SurfaceFrame, SurfaceTarget, SurfaceTargetDescriptor};
pub use texture::{ImportedTexture, MSAA_SAMPLE_COUNT, Texture, TextureOptions, TextureRegion};

pub use pulse_test_utils::{GpuError, RenderContext};
