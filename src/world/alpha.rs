use std::collections::HashMap;

/// Samples with alpha strictly above this count as opaque.
pub const OPAQUE_THRESHOLD: u8 = 100;

/// Alpha channel of one tile texture, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlphaMask {
    pub width: usize,
    pub height: usize,
    pub alpha: Vec<u8>,
}

impl AlphaMask {
    pub fn new(width: usize, height: usize, alpha: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || alpha.len() != width * height {
            return None;
        }
        Some(AlphaMask {
            width,
            height,
            alpha,
        })
    }

    fn sample(&self, x: usize, y: usize) -> u8 {
        self.alpha.get(y * self.width + x).copied().unwrap_or(0)
    }
}

/// Per-tile alpha masks, supplied by whatever loads the textures.
pub trait AlphaSource {
    fn mask(&self, tile_id: u32) -> Option<&AlphaMask>;
}

impl AlphaSource for HashMap<u32, AlphaMask> {
    fn mask(&self, tile_id: u32) -> Option<&AlphaMask> {
        self.get(&tile_id)
    }
}

/// Pixel hit test inside a `cell_w` x `cell_h` cell.
///
/// The texture is cover-scaled and centred in the cell, then optionally
/// mirrored horizontally. Tiles without a mask and samples outside the
/// texture are transparent.
pub fn is_opaque_at(
    source: &impl AlphaSource,
    tile_id: u32,
    local_x: f64,
    local_y: f64,
    cell_w: f64,
    cell_h: f64,
    flipped: bool,
) -> bool {
    let Some(mask) = source.mask(tile_id) else {
        return false;
    };
    let tex_w = mask.width as f64;
    let tex_h = mask.height as f64;

    let scale = (cell_w / tex_w).max(cell_h / tex_h);
    if !scale.is_finite() || scale <= 0.0 {
        return false;
    }
    let offset_x = (cell_w - tex_w * scale) / 2.0;
    let offset_y = (cell_h - tex_h * scale) / 2.0;

    let mut tex_x = (local_x - offset_x) / scale;
    let tex_y = (local_y - offset_y) / scale;
    if flipped {
        tex_x = tex_w - tex_x;
    }

    if tex_x < 0.0 || tex_y < 0.0 || tex_x >= tex_w || tex_y >= tex_h {
        return false;
    }

    let x = ((tex_x + 0.5).floor() as usize).min(mask.width - 1);
    let y = ((tex_y + 0.5).floor() as usize).min(mask.height - 1);
    mask.sample(x, y) > OPAQUE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x2 texture: left half opaque, right half transparent.
    fn half_mask() -> HashMap<u32, AlphaMask> {
        let alpha = vec![255, 255, 0, 0, 255, 255, 0, 0];
        let mut masks = HashMap::new();
        masks.insert(6, AlphaMask::new(4, 2, alpha).unwrap());
        masks
    }

    #[test]
    fn mask_requires_matching_length() {
        assert!(AlphaMask::new(2, 2, vec![0; 3]).is_none());
        assert!(AlphaMask::new(0, 2, vec![]).is_none());
    }

    #[test]
    fn samples_cover_scaled_texture() {
        let masks = half_mask();
        // 8x4 cell: scale 2, no offset
        assert!(is_opaque_at(&masks, 6, 1.0, 1.0, 8.0, 4.0, false));
        assert!(!is_opaque_at(&masks, 6, 7.0, 1.0, 8.0, 4.0, false));
    }

    #[test]
    fn flipping_mirrors_horizontally() {
        let masks = half_mask();
        assert!(!is_opaque_at(&masks, 6, 1.0, 1.0, 8.0, 4.0, true));
        assert!(is_opaque_at(&masks, 6, 7.0, 1.0, 8.0, 4.0, true));
    }

    #[test]
    fn cover_scaling_crops_and_centres() {
        let masks = half_mask();
        // 8x8 cell: scale = max(2, 4) = 4, drawn 16x8, offset_x = -4
        assert!(is_opaque_at(&masks, 6, 0.0, 4.0, 8.0, 8.0, false));
        assert!(!is_opaque_at(&masks, 6, 7.5, 4.0, 8.0, 8.0, false));
    }

    #[test]
    fn outside_or_unknown_is_transparent() {
        let masks = half_mask();
        assert!(!is_opaque_at(&masks, 6, -1.0, 1.0, 8.0, 4.0, false));
        assert!(!is_opaque_at(&masks, 6, 1.0, 4.5, 8.0, 4.0, false));
        assert!(!is_opaque_at(&masks, 99, 1.0, 1.0, 8.0, 4.0, false));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut masks = HashMap::new();
        masks.insert(1, AlphaMask::new(1, 1, vec![100]).unwrap());
        masks.insert(2, AlphaMask::new(1, 1, vec![101]).unwrap());
        assert!(!is_opaque_at(&masks, 1, 0.2, 0.2, 1.0, 1.0, false));
        assert!(is_opaque_at(&masks, 2, 0.2, 0.2, 1.0, 1.0, false));
    }
}
