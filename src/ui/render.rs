//! Framebuffer primitives. Pixels are softbuffer `u32`s in `0x00RRGGBB`;
//! colours passed in are `(r, g, b, a)` and get alpha-blended.

use crate::loader::DecodedImage;

pub type Color = (u8, u8, u8, u8);

/// Axis-aligned rectangle in framebuffer pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w: w.max(0.0), h: h.max(0.0) }
    }

    pub fn contains(&self, p: (f32, f32)) -> bool {
        p.0 >= self.x && p.0 < self.x + self.w && p.1 >= self.y && p.1 < self.y + self.h
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Target framebuffer with its dimensions.
pub struct Canvas<'a> {
    pub buf: &'a mut [u32],
    pub w: u32,
    pub h: u32,
}

impl Canvas<'_> {
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.w as f32, self.h as f32)
    }

    pub fn clear(&mut self, color: Color) {
        self.buf.fill(rgb(color.0, color.1, color.2));
    }

    fn blend(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x as u32 >= self.w || y as u32 >= self.h {
            return;
        }
        let off = (y as u32 * self.w + x as u32) as usize;
        self.buf[off] = mix(self.buf[off], color);
    }

    pub fn fill_rect(&mut self, r: Rect, color: Color) {
        let r = r.intersect(&self.bounds());
        let (x0, y0) = (r.x.round() as i32, r.y.round() as i32);
        let (x1, y1) = ((r.x + r.w).round() as i32, (r.y + r.h).round() as i32);
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color);
            }
        }
    }

    pub fn stroke_rect(&mut self, r: Rect, thickness: f32, color: Color) {
        self.fill_rect(Rect::new(r.x, r.y, r.w, thickness), color);
        self.fill_rect(Rect::new(r.x, r.y + r.h - thickness, r.w, thickness), color);
        self.fill_rect(Rect::new(r.x, r.y + thickness, thickness, r.h - 2.0 * thickness), color);
        self.fill_rect(Rect::new(r.x + r.w - thickness, r.y + thickness, thickness, r.h - 2.0 * thickness), color);
    }

    fn draw_char(&mut self, ch: char, px: i32, py: i32, scale: u32, color: Color) {
        let idx = (ch as u32).wrapping_sub(32) as usize;
        let Some(glyph) = FONT_5X7.get(idx) else { return };
        for (col, bits) in glyph.iter().enumerate() {
            for row in 0..7u32 {
                if bits & (1 << row) == 0 {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        let x = px + (col as u32 * scale + sx) as i32;
                        let y = py + (row * scale + sy) as i32;
                        self.blend(x, y, color);
                    }
                }
            }
        }
    }

    /// Draw a string. Returns the x position after the last character.
    pub fn draw_text(&mut self, text: &str, px: i32, py: i32, scale: u32, color: Color) -> i32 {
        let mut x = px;
        for ch in text.chars() {
            self.draw_char(ch, x, py, scale, color);
            x += (6 * scale) as i32;
        }
        x
    }

    /// Text truncated with `..` so it fits in `max_w` pixels.
    pub fn draw_text_clipped(&mut self, text: &str, px: i32, py: i32, scale: u32, max_w: f32, color: Color) {
        let fits = (max_w / (6 * scale) as f32).floor().max(0.0) as usize;
        if text.chars().count() <= fits {
            self.draw_text(text, px, py, scale, color);
        } else if fits > 2 {
            let cut: String = text.chars().take(fits - 2).collect();
            self.draw_text(&format!("{}..", cut), px, py, scale, color);
        }
    }

    /// Nearest-neighbour blit of `img` with its top-left at `(x0, y0)`, limited to `clip`.
    pub fn blit(&mut self, img: &DecodedImage, x0: f32, y0: f32, scale: f32, clip: Rect) {
        if scale <= 0.0 || !scale.is_finite() || img.width == 0 || img.height == 0 {
            return;
        }
        let draw = Rect::new(x0, y0, img.width as f32 * scale, img.height as f32 * scale);
        let area = draw.intersect(&clip).intersect(&self.bounds());
        if area.w <= 0.0 || area.h <= 0.0 {
            return;
        }

        let dx_start = area.x.floor() as u32;
        let dy_start = area.y.floor() as u32;
        let dx_end = ((area.x + area.w).ceil() as u32).min(self.w);
        let dy_end = ((area.y + area.h).ceil() as u32).min(self.h);
        let inv = 1.0 / scale;
        let src = &img.rgba_bytes;

        for dy in dy_start..dy_end {
            let sy = ((dy as f32 + 0.5 - y0) * inv) as i64;
            if sy < 0 || sy >= img.height as i64 {
                continue;
            }
            for dx in dx_start..dx_end {
                let sx = ((dx as f32 + 0.5 - x0) * inv) as i64;
                if sx < 0 || sx >= img.width as i64 {
                    continue;
                }
                let si = (sy as usize * img.width as usize + sx as usize) * 4;
                let di = dy as usize * self.w as usize + dx as usize;
                let px = (src[si], src[si + 1], src[si + 2], src[si + 3]);
                if px.3 == 255 {
                    self.buf[di] = rgb(px.0, px.1, px.2);
                } else if px.3 > 0 {
                    self.buf[di] = mix(self.buf[di], px);
                }
            }
        }
    }

    /// Blit `img` scaled to fit inside `cell`, centred.
    pub fn blit_fit(&mut self, img: &DecodedImage, cell: Rect) {
        let s = fit_scale(img.width as f32, img.height as f32, cell.w, cell.h);
        let (w, h) = (img.width as f32 * s, img.height as f32 * s);
        self.blit(img, cell.x + (cell.w - w) / 2.0, cell.y + (cell.h - h) / 2.0, s, cell);
    }
}

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

fn mix(dst: u32, color: Color) -> u32 {
    let a = color.3 as u32;
    let (dr, dg, db) = unpack_rgb(dst);
    let ch = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a)) / 255) as u8;
    rgb(ch(color.0, dr), ch(color.1, dg), ch(color.2, db))
}

pub fn fit_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    (win_w / img_w).min(win_h / img_h)
}

pub fn text_width(text: &str, scale: u32) -> f32 {
    (text.chars().count() as u32 * 6 * scale) as f32
}

// 5x7 bitmap font for ASCII 32..127, one byte per column, LSB = top row.
static FONT_5X7: [[u8; 5]; 96] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], [0x00, 0x00, 0x5F, 0x00, 0x00], [0x00, 0x07, 0x00, 0x07, 0x00], [0x14, 0x7F, 0x14, 0x7F, 0x14],
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], [0x23, 0x13, 0x08, 0x64, 0x62], [0x36, 0x49, 0x55, 0x22, 0x50], [0x00, 0x05, 0x03, 0x00, 0x00],
    [0x00, 0x1C, 0x22, 0x41, 0x00], [0x00, 0x41, 0x22, 0x1C, 0x00], [0x14, 0x08, 0x3E, 0x08, 0x14], [0x08, 0x08, 0x3E, 0x08, 0x08],
    [0x00, 0x50, 0x30, 0x00, 0x00], [0x08, 0x08, 0x08, 0x08, 0x08], [0x00, 0x60, 0x60, 0x00, 0x00], [0x20, 0x10, 0x08, 0x04, 0x02],
    [0x3E, 0x51, 0x49, 0x45, 0x3E], [0x00, 0x42, 0x7F, 0x40, 0x00], [0x42, 0x61, 0x51, 0x49, 0x46], [0x21, 0x41, 0x45, 0x4B, 0x31],
    [0x18, 0x14, 0x12, 0x7F, 0x10], [0x27, 0x45, 0x45, 0x45, 0x39], [0x3C, 0x4A, 0x49, 0x49, 0x30], [0x01, 0x71, 0x09, 0x05, 0x03],
    [0x36, 0x49, 0x49, 0x49, 0x36], [0x06, 0x49, 0x49, 0x29, 0x1E], [0x00, 0x36, 0x36, 0x00, 0x00], [0x00, 0x56, 0x36, 0x00, 0x00],
    [0x08, 0x14, 0x22, 0x41, 0x00], [0x14, 0x14, 0x14, 0x14, 0x14], [0x00, 0x41, 0x22, 0x14, 0x08], [0x02, 0x01, 0x51, 0x09, 0x06],
    [0x3E, 0x41, 0x5D, 0x55, 0x1E], [0x7E, 0x11, 0x11, 0x11, 0x7E], [0x7F, 0x49, 0x49, 0x49, 0x36], [0x3E, 0x41, 0x41, 0x41, 0x22],
    [0x7F, 0x41, 0x41, 0x22, 0x1C], [0x7F, 0x49, 0x49, 0x49, 0x41], [0x7F, 0x09, 0x09, 0x09, 0x01], [0x3E, 0x41, 0x49, 0x49, 0x7A],
    [0x7F, 0x08, 0x08, 0x08, 0x7F], [0x00, 0x41, 0x7F, 0x41, 0x00], [0x20, 0x40, 0x41, 0x3F, 0x01], [0x7F, 0x08, 0x14, 0x22, 0x41],
    [0x7F, 0x40, 0x40, 0x40, 0x40], [0x7F, 0x02, 0x0C, 0x02, 0x7F], [0x7F, 0x04, 0x08, 0x10, 0x7F], [0x3E, 0x41, 0x41, 0x41, 0x3E],
    [0x7F, 0x09, 0x09, 0x09, 0x06], [0x3E, 0x41, 0x51, 0x21, 0x5E], [0x7F, 0x09, 0x19, 0x29, 0x46], [0x46, 0x49, 0x49, 0x49, 0x31],
    [0x01, 0x01, 0x7F, 0x01, 0x01], [0x3F, 0x40, 0x40, 0x40, 0x3F], [0x1F, 0x20, 0x40, 0x20, 0x1F], [0x3F, 0x40, 0x38, 0x40, 0x3F],
    [0x63, 0x14, 0x08, 0x14, 0x63], [0x07, 0x08, 0x70, 0x08, 0x07], [0x61, 0x51, 0x49, 0x45, 0x43], [0x00, 0x7F, 0x41, 0x41, 0x00],
    [0x02, 0x04, 0x08, 0x10, 0x20], [0x00, 0x41, 0x41, 0x7F, 0x00], [0x04, 0x02, 0x01, 0x02, 0x04], [0x40, 0x40, 0x40, 0x40, 0x40],
    [0x00, 0x01, 0x02, 0x04, 0x00], [0x20, 0x54, 0x54, 0x54, 0x78], [0x7F, 0x48, 0x44, 0x44, 0x38], [0x38, 0x44, 0x44, 0x44, 0x20],
    [0x38, 0x44, 0x44, 0x48, 0x7F], [0x38, 0x54, 0x54, 0x54, 0x18], [0x08, 0x7E, 0x09, 0x01, 0x02], [0x0C, 0x52, 0x52, 0x52, 0x3E],
    [0x7F, 0x08, 0x04, 0x04, 0x78], [0x00, 0x44, 0x7D, 0x40, 0x00], [0x20, 0x40, 0x44, 0x3D, 0x00], [0x7F, 0x10, 0x28, 0x44, 0x00],
    [0x00, 0x41, 0x7F, 0x40, 0x00], [0x7C, 0x04, 0x18, 0x04, 0x78], [0x7C, 0x08, 0x04, 0x04, 0x78], [0x38, 0x44, 0x44, 0x44, 0x38],
    [0x7C, 0x14, 0x14, 0x14, 0x08], [0x08, 0x14, 0x14, 0x18, 0x7C], [0x7C, 0x08, 0x04, 0x04, 0x08], [0x48, 0x54, 0x54, 0x54, 0x20],
    [0x04, 0x3F, 0x44, 0x40, 0x20], [0x3C, 0x40, 0x40, 0x20, 0x7C], [0x1C, 0x20, 0x40, 0x20, 0x1C], [0x3C, 0x40, 0x30, 0x40, 0x3C],
    [0x44, 0x28, 0x10, 0x28, 0x44], [0x0C, 0x50, 0x50, 0x50, 0x3C], [0x44, 0x64, 0x54, 0x4C, 0x44], [0x00, 0x08, 0x36, 0x41, 0x00],
    [0x00, 0x00, 0x7F, 0x00, 0x00], [0x00, 0x41, 0x36, 0x08, 0x00], [0x10, 0x08, 0x08, 0x10, 0x08], [0x00, 0x00, 0x00, 0x00, 0x00],
];

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> DecodedImage {
        DecodedImage {
            rgba_bytes: px.repeat((w * h) as usize),
            width: w,
            height: h,
        }
    }

    #[test]
    fn blit_respects_clip_and_offset() {
        let mut buf = vec![0u32; 10 * 10];
        let mut canvas = Canvas { buf: &mut buf, w: 10, h: 10 };
        let img = solid(2, 2, [255, 0, 0, 255]);
        canvas.blit(&img, -2.0, 1.0, 2.0, Rect::new(0.0, 0.0, 1.0, 10.0));
        let red = rgb(255, 0, 0);
        assert_eq!(buf[10], red, "column 0 of row 1 is covered");
        assert_eq!(buf[11], 0, "outside the clip");
        assert_eq!(buf[0], 0, "above the image");
    }

    #[test]
    fn fill_blends_with_alpha() {
        let mut buf = vec![rgb(0, 0, 0); 4];
        let mut canvas = Canvas { buf: &mut buf, w: 2, h: 2 };
        canvas.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), (255, 255, 255, 255));
        canvas.fill_rect(Rect::new(1.0, 0.0, 5.0, 1.0), (200, 100, 0, 0));
        assert_eq!(buf[0], rgb(255, 255, 255));
        assert_eq!(buf[1], rgb(0, 0, 0));
    }

    #[test]
    fn rects_intersect_and_hit() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(&b), Rect::new(5.0, 5.0, 5.0, 5.0));
        assert!(a.contains((0.0, 9.9)));
        assert!(!a.contains((10.0, 5.0)));
        assert_eq!(text_width("abc", 2), 36.0);
    }
}
