//! Console pixel surfaces as seen by the bridge.
//!
//! The bridge never reads pixels.  It only needs a surface's geometry (to
//! report `SurfaceChanged` and to scale absolute pointer coordinates) and its
//! pixel format (to answer the console's format check).

use serde::{Deserialize, Serialize};

/// Pixel layouts a console surface may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 32 bpp, unused alpha byte.
    X8R8G8B8,
    /// 32 bpp with alpha.
    A8R8G8B8,
    /// 32 bpp, byte-swapped.
    B8G8R8X8,
    /// 16 bpp.
    R5G6B5,
    /// 8 bpp palette.
    Indexed8,
}

impl PixelFormat {
    /// Returns `true` for formats the mux can consume directly.
    ///
    /// The mux reads 32 bpp framebuffers only; anything else makes the console
    /// convert before handing the surface over.
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            PixelFormat::X8R8G8B8 | PixelFormat::A8R8G8B8 | PixelFormat::B8G8R8X8
        )
    }
}

/// Geometry and format of a console surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySurface {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl DisplaySurface {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }
}

/// A rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_32bpp_formats_are_supported() {
        assert!(PixelFormat::X8R8G8B8.is_supported());
        assert!(PixelFormat::A8R8G8B8.is_supported());
        assert!(PixelFormat::B8G8R8X8.is_supported());
        assert!(!PixelFormat::R5G6B5.is_supported());
        assert!(!PixelFormat::Indexed8.is_supported());
    }
}
