/// Samples collected by one `switch()` call: one row per capture frame
/// ("fast"), `nbins - 1` signal values per row.
#[derive(Debug, Clone)]
pub struct CaptureMatrix {
    bins: usize,
    data: Vec<f32>,
}

impl CaptureMatrix {
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(bins: usize, rows: usize) -> Self {
        Self {
            bins,
            data: Vec::with_capacity(bins * rows),
        }
    }

    /// Appends one frame. The row is truncated or zero-padded to the matrix
    /// width so every row stays rectangular.
    pub fn push_row(&mut self, row: &[f32]) {
        let take = row.len().min(self.bins);
        self.data.extend_from_slice(&row[..take]);
        self.data.extend(std::iter::repeat(0.0).take(self.bins - take));
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn row_count(&self) -> usize {
        if self.bins == 0 {
            0
        } else {
            self.data.len() / self.bins
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.bins)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_stay_rectangular() {
        let mut m = CaptureMatrix::new(3);
        m.push_row(&[1.0, 2.0, 3.0]);
        m.push_row(&[4.0, 5.0]);
        m.push_row(&[6.0, 7.0, 8.0, 9.0]);

        assert_eq!(m.row_count(), 3);
        let rows: Vec<&[f32]> = m.rows().collect();
        assert_eq!(rows[0], &[1.0, 2.0, 3.0]);
        assert_eq!(rows[1], &[4.0, 5.0, 0.0]);
        assert_eq!(rows[2], &[6.0, 7.0, 8.0]);
    }
}
