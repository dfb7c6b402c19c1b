//! RGBA framebuffer to planar YUV 4:2:0 conversion

use crate::errors::RecorderError;

/// Converts bottom-up RGBA framebuffers into I420 at a fixed canvas size.
///
/// Captured framebuffers store their last scene row first, so the converter
/// first flips rows into a scratch image, then converts that to planar Y, U
/// and V. The scratch image is reallocated whenever the source dimensions
/// change. Sources smaller than the canvas are anchored top-left and padded
/// black; larger sources are cropped.
pub struct ColorConverter {
    width: u32,
    height: u32,
    source_dims: (u32, u32),
    flipped: Vec<u8>,
    yuv: Vec<u8>,
}

impl ColorConverter {
    /// Create a converter for a canvas; dimensions must be even and non-zero
    pub fn new(width: u32, height: u32) -> Result<Self, RecorderError> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(RecorderError::ResourceError(format!(
                "Invalid canvas {}x{}: dimensions must be even and non-zero",
                width, height
            )));
        }

        let y_size = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            source_dims: (0, 0),
            flipped: Vec::new(),
            yuv: vec![0u8; y_size + y_size / 2],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Convert one frame; the returned planes are valid until the next call
    pub fn convert(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<&[u8], RecorderError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() < expected {
            return Err(RecorderError::EncodingError(format!(
                "Invalid frame: {}x{} RGBA needs {} bytes, got {}",
                width,
                height,
                expected,
                rgba.len()
            )));
        }

        if self.source_dims != (width, height) {
            log::debug!(
                "Source resized {}x{} -> {}x{}, reallocating scratch",
                self.source_dims.0,
                self.source_dims.1,
                width,
                height
            );
            self.flipped = vec![0u8; expected];
            self.source_dims = (width, height);
        }

        let row_bytes = width as usize * 4;
        let h = height as usize;
        for y in 0..h {
            let src = (h - 1 - y) * row_bytes;
            let dst = y * row_bytes;
            self.flipped[dst..dst + row_bytes].copy_from_slice(&rgba[src..src + row_bytes]);
        }

        rgba_to_yuv420(
            &self.flipped,
            width as usize,
            height as usize,
            &mut self.yuv,
            self.width as usize,
            self.height as usize,
        );
        Ok(&self.yuv)
    }
}

/// BT.601 studio-swing conversion from top-down RGBA into an I420 canvas.
///
/// Chroma is the average of each 2x2 block. Canvas pixels outside the source
/// are black (Y=16, U=V=128).
fn rgba_to_yuv420(
    rgba: &[u8],
    src_w: usize,
    src_h: usize,
    yuv: &mut [u8],
    w: usize,
    h: usize,
) {
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    let pixel = |x: usize, y: usize| -> Option<(i32, i32, i32)> {
        if x < src_w && y < src_h {
            let idx = (y * src_w + x) * 4;
            Some((rgba[idx] as i32, rgba[idx + 1] as i32, rgba[idx + 2] as i32))
        } else {
            None
        }
    };

    for y in 0..h {
        for x in 0..w {
            y_plane[y * w + x] = match pixel(x, y) {
                Some((r, g, b)) => (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8,
                None => 16,
            };
        }
    }

    for by in 0..h / 2 {
        for bx in 0..w / 2 {
            let (mut rs, mut gs, mut bs, mut n) = (0, 0, 0, 0);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                if let Some((r, g, b)) = pixel(bx * 2 + dx, by * 2 + dy) {
                    rs += r;
                    gs += g;
                    bs += b;
                    n += 1;
                }
            }

            let idx = by * (w / 2) + bx;
            if n == 0 {
                u_plane[idx] = 128;
                v_plane[idx] = 128;
                continue;
            }

            let (r, g, b) = (rs / n, gs / n, bs / n);
            u_plane[idx] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
            v_plane[idx] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
        }
    }
}
