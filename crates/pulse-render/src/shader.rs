//! WGSL shader sources used as part of pipeline configurations.

use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

pub(crate) const SPRITE_SHADER: &str = include_str!("shaders/sprite.wgsl");
pub(crate) const MESH2D_SHADER: &str = include_str!("shaders/mesh2d.wgsl");
pub(crate) const LINES_SHADER: &str = include_str!("shaders/lines.wgsl");

/// Shared WGSL source text.
///
/// Compared and hashed by content, so the same source loaded twice selects
/// the same cached pipeline. Cloning is cheap.
#[derive(Clone)]
pub struct ShaderSource(Arc<str>);

impl ShaderSource {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ShaderSource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ShaderSource {}

impl Hash for ShaderSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl std::fmt::Debug for ShaderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShaderSource({} bytes)", self.0.len())
    }
}

impl From<&str> for ShaderSource {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for ShaderSource {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_content() {
        let a = ShaderSource::from("@vertex fn vs_main() {}");
        let b = ShaderSource::from(String::from("@vertex fn vs_main() {}"));
        assert_eq!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a, ShaderSource::from("// other"));
    }

    #[test]
    fn test_debug_hides_source() {
        let shader = ShaderSource::from(SPRITE_SHADER);
        assert!(!format!("{:?}", shader).contains("fn"));
    }

    #[test]
    fn test_builtin_shaders_have_entry_points() {
        for source in [SPRITE_SHADER, MESH2D_SHADER] {
            assert!(source.contains("fn vs_main"));
            assert!(source.contains("fn fs_main"));
        }
        assert!(LINES_SHADER.contains("fn vs_main"));
        assert!(LINES_SHADER.contains("fn fs_main"));
    }
}
