use bitvec::prelude::*;

/// Monochrome pixel grid, stored row-major one bit per pixel.
///
/// The engine sets the dirty flag whenever it touches the grid, the host
/// clears it after rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: BitVec,
    width: usize,
    height: usize,
    dirty: bool,
}

impl Framebuffer {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: bitvec![0; width * height],
            width,
            height,
            dirty: true,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    // Pixel at column `x`, row `y`. Coordinates outside the grid read as off.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.pixels[y * self.width + x]
    }

    #[must_use]
    pub fn pixels(&self) -> &BitSlice {
        &self.pixels
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn clear(&mut self) {
        self.pixels.fill(false);
        self.dirty = true;
    }

    pub(crate) fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.pixels = bitvec![0; width * height];
        self.dirty = true;
    }

    // XOR a sprite into the grid and report whether any lit pixel was turned
    // off. `rows` holds `bytes_per_row` bytes per sprite row, most significant
    // bit leftmost. Every pixel wraps around the edges on its own.
    pub(crate) fn draw_sprite(
        &mut self,
        x: usize,
        y: usize,
        rows: &[u8],
        bytes_per_row: usize,
    ) -> bool {
        let mut collision = false;

        for (yline, row) in rows.chunks_exact(bytes_per_row).enumerate() {
            let py = (y + yline) % self.height;
            for (byte_index, byte) in row.iter().enumerate() {
                for bit in 0..8 {
                    if byte & (0x80 >> bit) == 0 {
                        continue;
                    }
                    let px = (x + byte_index * 8 + bit) % self.width;
                    let offset = py * self.width + px;
                    let lit = self.pixels[offset];
                    collision |= lit;
                    self.pixels.set(offset, !lit);
                }
            }
        }

        self.dirty = true;
        collision
    }

    // Move everything down `rows` rows, blanking the top.
    pub(crate) fn scroll_down(&mut self, rows: usize) {
        let by = (rows * self.width).min(self.pixels.len());
        self.pixels.shift_end(by);
        self.dirty = true;
    }

    // Move every row `columns` pixels to the right, blanking the left edge.
    pub(crate) fn scroll_right(&mut self, columns: usize) {
        let by = columns.min(self.width);
        for row in self.pixels.chunks_exact_mut(self.width) {
            row.shift_end(by);
        }
        self.dirty = true;
    }

    // Move every row `columns` pixels to the left, blanking the right edge.
    pub(crate) fn scroll_left(&mut self, columns: usize) {
        let by = columns.min(self.width);
        for row in self.pixels.chunks_exact_mut(self.width) {
            row.shift_start(by);
        }
        self.dirty = true;
    }
}
