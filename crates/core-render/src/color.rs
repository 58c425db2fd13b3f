//! Gamma-correct alpha blending for the bg/fg compositing bitmaps: colors
//! are converted to linear light before blending and back to sRGB after,
//! rather than blending the encoded sRGB bytes directly.

use crate::node::channel;
use core_text::geom::Rect;

fn srgb_to_linear(c: u8) -> f32 {
    let fc = c as f32 / 255.0;
    if fc <= 0.04045 { fc / 12.92 } else { ((fc + 0.055) / 1.055).powf(2.4) }
}

fn linear_to_srgb(c: f32) -> u32 {
    if c <= 0.0031308 {
        (c * 12.92 * 255.0) as u32
    } else {
        ((1.055 * c.powf(1.0 / 2.4) - 0.055) * 255.0) as u32
    }
}

/// Blend `src` over `dst`, both packed `0xAABBGGRR`.
pub fn alpha_blend(dst: u32, src: u32) -> u32 {
    let src_r = srgb_to_linear(channel(src, 0));
    let src_g = srgb_to_linear(channel(src, 8));
    let src_b = srgb_to_linear(channel(src, 16));
    let src_a = channel(src, 24) as f32 / 255.0;

    let dst_r = srgb_to_linear(channel(dst, 0));
    let dst_g = srgb_to_linear(channel(dst, 8));
    let dst_b = srgb_to_linear(channel(dst, 16));
    let dst_a = channel(dst, 24) as f32 / 255.0;

    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return 0;
    }
    let out_r = (src_r * src_a + dst_r * dst_a * (1.0 - src_a)) / out_a;
    let out_g = (src_g * src_a + dst_g * dst_a * (1.0 - src_a)) / out_a;
    let out_b = (src_b * src_a + dst_b * dst_a * (1.0 - src_a)) / out_a;

    ((out_a * 255.0) as u32) << 24 | linear_to_srgb(out_b) << 16 | linear_to_srgb(out_g) << 8 | linear_to_srgb(out_r)
}

/// Blend `src` into every cell of `rect` in a `stride`-wide bitmap. Fully
/// opaque sources overwrite directly; fully transparent ones are skipped.
pub fn alpha_blend_rect(dst: &mut [u32], src: u32, rect: Rect, stride: i32) {
    if channel(src, 24) == 0xff {
        for y in rect.top..rect.bottom {
            let row = (y * stride) as usize;
            for x in (rect.left as usize)..(rect.right as usize) {
                dst[row + x] = src;
            }
        }
    } else if channel(src, 24) != 0 {
        for y in rect.top..rect.bottom {
            let row = (y * stride) as usize;
            for x in (rect.left as usize)..(rect.right as usize) {
                dst[row + x] = alpha_blend(dst[row + x], src);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::rgba;

    #[test]
    fn opaque_source_overwrites() {
        let dst = rgba(1, 2, 3, 255);
        let src = rgba(200, 150, 100, 255);
        assert_eq!(alpha_blend(dst, src), src);
    }

    #[test]
    fn transparent_source_is_noop_in_rect() {
        let mut bmp = vec![rgba(1, 2, 3, 255); 9];
        alpha_blend_rect(&mut bmp, 0, Rect::new(0, 0, 3, 3), 3);
        assert!(bmp.iter().all(|&c| c == rgba(1, 2, 3, 255)));
    }

    #[test]
    fn fully_opaque_rect_fill_overwrites_every_cell() {
        let mut bmp = vec![0u32; 6];
        let src = rgba(9, 9, 9, 255);
        alpha_blend_rect(&mut bmp, src, Rect::new(1, 0, 3, 2), 3);
        assert_eq!(bmp, vec![0, src, src, 0, src, src]);
    }
}
