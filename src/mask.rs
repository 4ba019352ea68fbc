use std::io::{Cursor, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Binary per-pixel membership map, `height` rows by `width` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl RasterMask {
    pub fn new(width: u32, height: u32) -> RasterMask {
        RasterMask {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Value at `(row, col)`, `None` outside the mask.
    pub fn get(&self, row: usize, col: usize) -> Option<bool> {
        if row >= self.height as usize || col >= self.width as usize {
            return None;
        }
        Some(self.data[row * self.width as usize + col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        if row < self.height as usize && col < self.width as usize {
            self.data[row * self.width as usize + col] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }
}

/// Bitmap annotation geometry: a cropped mask anchored at `origin` (x, y).
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub origin: (i64, i64),
    pub mask: RasterMask,
}

/// Wire form of a bitmap: base64 of a zlib-compressed PNG plus its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapJson {
    pub data: String,
    pub origin: [i64; 2],
}

impl Bitmap {
    pub fn decode(json: &BitmapJson) -> SyncResult<Bitmap> {
        let compressed = STANDARD
            .decode(json.data.trim())
            .map_err(|e| SyncError::Bitmap(format!("invalid base64: {}", e)))?;
        let mut png = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut png)
            .map_err(|e| SyncError::Bitmap(format!("invalid zlib stream: {}", e)))?;
        let img = image::load_from_memory(&png)
            .map_err(|e| SyncError::Bitmap(format!("invalid png: {}", e)))?;
        Ok(Bitmap {
            origin: (json.origin[0], json.origin[1]),
            mask: mask_from_image(&img),
        })
    }

    pub fn encode(&self) -> SyncResult<BitmapJson> {
        let img = GrayImage::from_fn(self.mask.width(), self.mask.height(), |x, y| {
            if self.mask.get(y as usize, x as usize).unwrap_or(false) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| SyncError::Bitmap(format!("png encode failed: {}", e)))?;
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&png)?;
        let compressed = encoder.finish()?;
        Ok(BitmapJson {
            data: STANDARD.encode(compressed),
            origin: [self.origin.0, self.origin.1],
        })
    }

    /// Rasterizes the bitmap onto a full `width` x `height` image, clipping
    /// whatever falls outside.
    pub fn to_mask(&self, width: u32, height: u32) -> RasterMask {
        let mut full = RasterMask::new(width, height);
        let (ox, oy) = self.origin;
        // placements that overflow i64 are clipped like any other
        for row in 0..self.mask.height() as i64 {
            let Some(y) = oy.checked_add(row).filter(|&y| y >= 0 && y < height as i64) else {
                continue;
            };
            for col in 0..self.mask.width() as i64 {
                let Some(x) = ox.checked_add(col).filter(|&x| x >= 0 && x < width as i64) else {
                    continue;
                };
                if self.mask.get(row as usize, col as usize).unwrap_or(false) {
                    full.set(y as usize, x as usize, true);
                }
            }
        }
        full
    }
}

fn mask_from_image(img: &DynamicImage) -> RasterMask {
    let (w, h) = img.dimensions();
    let mut mask = RasterMask::new(w, h);
    if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        for (x, y, p) in rgba.enumerate_pixels() {
            mask.set(y as usize, x as usize, p[3] > 0);
        }
    } else {
        let luma = img.to_luma8();
        for (x, y, p) in luma.enumerate_pixels() {
            mask.set(y as usize, x as usize, p[0] > 0);
        }
    }
    mask
}
