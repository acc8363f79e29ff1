use glam::IVec2;
use serde::{Deserialize, Serialize};

/// PPI assumed by writers that did not record a density.
pub const DEFAULT_PPI: u32 = 300;

/// An embedded reference image.
///
/// The pixel data is stored decoded from its base64 transport form but still
/// in its container format (PNG/JPEG); `size_px` and `ppi` are extracted at
/// parse time so legacy scale compensation can be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bitmap {
    pub position: IVec2,
    pub scale: f64,
    pub data: Vec<u8>,
    pub size_px: (u32, u32),
    pub ppi: u32,
}

impl Bitmap {
    /// Decode image bytes, validating the container and extracting pixel
    /// dimensions and density. Unknown or absent density reads as
    /// [`DEFAULT_PPI`].
    pub fn from_bytes(position: IVec2, scale: f64, data: Vec<u8>) -> Option<Self> {
        let decoded = image::load_from_memory(&data).ok()?;
        let size_px = (decoded.width(), decoded.height());
        let ppi = sniff_ppi(&data).unwrap_or(DEFAULT_PPI);

        // A zero or non-finite scale renders the image invisible or breaks
        // the transform math downstream; coerce to 1.0.
        let scale = if scale.is_normal() { scale } else { 1.0 };

        Some(Bitmap { position, scale, data, size_px, ppi })
    }

    /// Legacy compensation for files at or below version 20230121, which
    /// assumed 300 PPI at load and save.
    pub fn apply_legacy_ppi_scale(&mut self) {
        self.scale *= self.ppi as f64 / DEFAULT_PPI as f64;
    }
}

/// Read the pixel density from a PNG `pHYs` chunk or a JPEG JFIF APP0
/// segment, without decoding the image.
fn sniff_ppi(data: &[u8]) -> Option<u32> {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return sniff_png_phys(data);
    }

    if data.starts_with(&[0xFF, 0xD8]) {
        return sniff_jfif_density(data);
    }

    None
}

fn sniff_png_phys(data: &[u8]) -> Option<u32> {
    // Chunks start after the 8-byte signature: length(4) type(4) data crc(4).
    let mut pos = 8usize;

    while pos + 8 <= data.len() {
        let len = u32::from_be_bytes(data[pos..pos + 4].try_into().ok()?) as usize;
        let ctype = &data[pos + 4..pos + 8];

        if ctype == b"pHYs" && len >= 9 && pos + 8 + 9 <= data.len() {
            let body = &data[pos + 8..pos + 8 + 9];
            let ppu_x = u32::from_be_bytes(body[0..4].try_into().ok()?);
            let unit = body[8];

            if unit == 1 {
                // pixels per metre -> pixels per inch
                return Some((ppu_x as f64 * 0.0254).round() as u32);
            }
            return None;
        }

        if ctype == b"IDAT" || ctype == b"IEND" {
            return None;
        }

        pos += 8 + len + 4;
    }

    None
}

fn sniff_jfif_density(data: &[u8]) -> Option<u32> {
    let mut pos = 2usize;

    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }

        let marker = data[pos + 1];
        let seg_len = u16::from_be_bytes(data[pos + 2..pos + 4].try_into().ok()?) as usize;

        if marker == 0xE0 && seg_len >= 14 && pos + 4 + 12 <= data.len() {
            let body = &data[pos + 4..];
            if &body[0..5] == b"JFIF\0" {
                let units = body[7];
                let x_density = u16::from_be_bytes(body[8..10].try_into().ok()?) as u32;

                return match units {
                    1 => Some(x_density),
                    2 => Some((x_density as f64 * 2.54).round() as u32),
                    _ => None,
                };
            }
        }

        if (0xC0..=0xCF).contains(&marker) && marker != 0xC4 && marker != 0xC8 {
            return None; // start of frame; no JFIF header coming
        }

        pos += 2 + seg_len;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest valid PNG (1x1, no pHYs) for container-level tests.
    fn tiny_png() -> Vec<u8> {
        const TINY_PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAAEElEQVR4AQEFAPr/AP8AAP8FAAH/+lyI0QAAAABJRU5ErkJggg==";
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.decode(TINY_PNG_B64).unwrap()
    }

    #[test]
    fn decodes_dimensions_and_defaults_ppi() {
        let bmp = Bitmap::from_bytes(IVec2::ZERO, 1.0, tiny_png()).unwrap();
        assert_eq!(bmp.size_px, (1, 1));
        assert_eq!(bmp.ppi, DEFAULT_PPI);
    }

    #[test]
    fn abnormal_scale_is_coerced_to_one() {
        let bmp = Bitmap::from_bytes(IVec2::ZERO, 0.0, tiny_png()).unwrap();
        assert_eq!(bmp.scale, 1.0);
        let bmp = Bitmap::from_bytes(IVec2::ZERO, f64::NAN, tiny_png()).unwrap();
        assert_eq!(bmp.scale, 1.0);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(Bitmap::from_bytes(IVec2::ZERO, 1.0, vec![1, 2, 3, 4]).is_none());
    }

    #[test]
    fn legacy_scale_compensation_uses_ppi_ratio() {
        let mut bmp = Bitmap::from_bytes(IVec2::ZERO, 2.0, tiny_png()).unwrap();
        bmp.ppi = 150;
        bmp.apply_legacy_ppi_scale();
        assert!((bmp.scale - 1.0).abs() < 1e-12);
    }
}
