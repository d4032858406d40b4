//! Integer pixel rectangles.

use glam::UVec2;
use pulse_test_utils::ScissorRect;

/// An axis aligned rectangle in texel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct URect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl URect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_pos_size(position: UVec2, size: UVec2) -> Self {
        Self::new(position.x, position.y, size.x, size.y)
    }

    pub fn position(&self) -> UVec2 {
        UVec2::new(self.x, self.y)
    }

    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &URect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &URect) -> URect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        URect::new(x, y, right - x, bottom - y)
    }

    pub fn to_scissor(self) -> ScissorRect {
        ScissorRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union() {
        let a = URect::new(10, 10, 5, 5);
        let b = URect::new(0, 12, 4, 20);
        assert_eq!(a.union(&b), URect::new(0, 10, 15, 22));
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn test_contains_rect() {
        let outer = URect::new(0, 0, 100, 50);
        assert!(outer.contains_rect(&URect::new(0, 0, 100, 50)));
        assert!(outer.contains_rect(&URect::new(99, 49, 1, 1)));
        assert!(!outer.contains_rect(&URect::new(99, 49, 2, 1)));
        assert!(!URect::new(10, 10, 5, 5).contains_rect(&URect::new(9, 10, 1, 1)));
    }
}
