use image::imageops::FilterType;
use std::path::Path;

/// A decoded, pre-scaled RGBA image ready to blit.
#[derive(Clone, Debug)]
pub struct Sprite {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Sprite {
    pub fn load(path: &Path, width: u32, height: u32) -> Result<Self, image::ImageError> {
        // Sniff the content; downloaded art is not always what its extension says.
        let img = image::ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(Self::scaled(img, width, height))
    }

    pub fn from_bytes(bytes: &[u8], width: u32, height: u32) -> Result<Self, image::ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::scaled(img, width, height))
    }

    fn scaled(img: image::DynamicImage, width: u32, height: u32) -> Self {
        let rgba = img.resize_exact(width, height, FilterType::Triangle).to_rgba8();
        Self {
            width,
            height,
            rgba: rgba.into_raw(),
        }
    }

    /// Copy onto an RGBA frame with the top-left corner at (x, y), clipped to the frame.
    pub fn blit(&self, frame: &mut [u8], frame_width: u32, frame_height: u32, x: i32, y: i32) {
        let row_bytes = self.width as usize * 4;
        for sy in 0..self.height as i32 {
            let dy = y + sy;
            if dy < 0 || dy >= frame_height as i32 {
                continue;
            }
            let x0 = x.max(0);
            let x1 = (x + self.width as i32).min(frame_width as i32);
            if x0 >= x1 {
                return;
            }
            let src_start = sy as usize * row_bytes + (x0 - x) as usize * 4;
            let len = (x1 - x0) as usize * 4;
            let dst_start = (dy as usize * frame_width as usize + x0 as usize) * 4;
            frame[dst_start..dst_start + len].copy_from_slice(&self.rgba[src_start..src_start + len]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Sprite {
        Sprite {
            width,
            height,
            rgba: px.repeat((width * height) as usize),
        }
    }

    #[test]
    fn blit_copies_inside_bounds() {
        let mut frame = vec![0u8; 4 * 4 * 4];
        solid(2, 2, [9, 8, 7, 255]).blit(&mut frame, 4, 4, 1, 1);
        let at = |x: usize, y: usize| &frame[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(at(1, 1), [9, 8, 7, 255]);
        assert_eq!(at(2, 2), [9, 8, 7, 255]);
        assert_eq!(at(0, 0), [0, 0, 0, 0]);
        assert_eq!(at(3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn blit_clips_at_every_edge() {
        let mut frame = vec![0u8; 3 * 3 * 4];
        solid(4, 4, [1, 1, 1, 255]).blit(&mut frame, 3, 3, -1, -1);
        assert!(frame.chunks(4).all(|p| p == [1, 1, 1, 255]));

        let mut frame = vec![0u8; 3 * 3 * 4];
        solid(2, 2, [1, 1, 1, 255]).blit(&mut frame, 3, 3, 5, 5);
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn decodes_and_scales_png() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let sprite = Sprite::from_bytes(&png, 2, 2).unwrap();
        assert_eq!((sprite.width, sprite.height), (2, 2));
        assert_eq!(&sprite.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Sprite::load(Path::new("/nonexistent/cover.jpg"), 4, 4).is_err());
    }
}
