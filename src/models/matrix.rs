/// Binarized image, one bit per pixel (true = black).
///
/// Rows start on a byte boundary so a single row can be read out
/// cheaply by the 1-D readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    row_bytes: usize,
    data: Vec<u8>,
}

impl BitMatrix {
    /// Create an all-white matrix
    pub fn new(width: usize, height: usize) -> Self {
        let row_bytes = width.div_ceil(8);
        Self {
            width,
            height,
            row_bytes,
            data: vec![0; row_bytes * height],
        }
    }

    /// Matrix width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Matrix height
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bit at (x, y); out-of-range reads are white
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        (self.data[y * self.row_bytes + x / 8] >> (x % 8)) & 1 == 1
    }

    /// Set bit at (x, y); out-of-range writes are ignored
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let byte = &mut self.data[y * self.row_bytes + x / 8];
        if value {
            *byte |= 1 << (x % 8);
        } else {
            *byte &= !(1 << (x % 8));
        }
    }

    /// Copy row `y` into `out`, replacing its contents
    pub fn row_into(&self, y: usize, out: &mut Vec<bool>) {
        out.clear();
        out.extend((0..self.width).map(|x| self.get(x, y)));
    }

    /// Number of black pixels
    pub fn count_black(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Clear all bits to white
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}

impl Default for BitMatrix {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
