//! Blend presets used by every batch.

/// How a draw combines with what is already in the target.
///
/// Part of every batch configuration, so draws with different blend modes
/// never share a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Source replaces destination, alpha included.
    Replace,

    /// Straight alpha: `src.rgb * src.a + dst.rgb * (1 - src.a)`.
    #[default]
    Alpha,

    /// `src.rgb + dst.rgb * (1 - src.a)`, for premultiplied content.
    PremultipliedAlpha,

    /// `src.rgb * src.a + dst.rgb`, for glows and particles.
    Additive,

    /// `src.rgb * dst.rgb`.
    Multiply,

    Custom(wgpu::BlendState),
}

impl BlendMode {
    pub fn to_blend_state(self) -> wgpu::BlendState {
        match self {
            BlendMode::Replace => wgpu::BlendState::REPLACE,
            BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::PremultipliedAlpha => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            BlendMode::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
            BlendMode::Multiply => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::Dst,
                    dst_factor: wgpu::BlendFactor::Zero,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::DstAlpha,
                    dst_factor: wgpu::BlendFactor::Zero,
                    operation: wgpu::BlendOperation::Add,
                },
            },
            BlendMode::Custom(state) => state,
        }
    }

    /// Color target state for a pipeline rendering into `format`.
    pub fn to_color_target_state(self, format: wgpu::TextureFormat) -> wgpu::ColorTargetState {
        wgpu::ColorTargetState {
            format,
            blend: Some(self.to_blend_state()),
            write_mask: wgpu::ColorWrites::ALL,
        }
    }
}

impl From<wgpu::BlendState> for BlendMode {
    fn from(state: wgpu::BlendState) -> Self {
        BlendMode::Custom(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_straight_alpha() {
        assert_eq!(
            BlendMode::default().to_blend_state(),
            wgpu::BlendState::ALPHA_BLENDING
        );
    }

    #[test]
    fn test_color_target_state() {
        let target = BlendMode::Replace.to_color_target_state(wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(target.blend, Some(wgpu::BlendState::REPLACE));
        assert_eq!(target.write_mask, wgpu::ColorWrites::ALL);
    }
}
