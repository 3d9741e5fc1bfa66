//! Band generators for synthetic rasters.
//!
//! All generators return row-major `Vec<f64>` buffers (row 0 first).

/// Creates a band with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// ```
/// use test_utils::index_band;
///
/// let band = index_band(10, 5);
/// assert_eq!(band.len(), 50);
/// assert_eq!(band[1], 1000.0);  // col=1, row=0
/// assert_eq!(band[10], 1.0);    // col=0, row=1
/// ```
pub fn index_band(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Creates a band with every cell set to `value`.
pub fn constant_band(width: usize, height: usize, value: f64) -> Vec<f64> {
    vec![value; width * height]
}

/// Creates a band rising linearly from `min` at the west edge to `max` at
/// the east edge.
pub fn gradient_band(width: usize, height: usize, min: f64, max: f64) -> Vec<f64> {
    let span = (width.max(2) - 1) as f64;
    let mut data = Vec::with_capacity(width * height);
    for _ in 0..height {
        for col in 0..width {
            data.push(min + (max - min) * col as f64 / span);
        }
    }
    data
}

/// Creates a two-value checkerboard with `cell`-pixel squares.
pub fn checker_band(width: usize, height: usize, cell: usize, a: f64, b: f64) -> Vec<f64> {
    let cell = cell.max(1);
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(if (row / cell + col / cell) % 2 == 0 { a } else { b });
        }
    }
    data
}

/// Overwrites the left half of every row with `no_data`.
pub fn with_no_data_west_half(mut band: Vec<f64>, width: usize, no_data: f64) -> Vec<f64> {
    for (i, v) in band.iter_mut().enumerate() {
        if i % width < width / 2 {
            *v = no_data;
        }
    }
    band
}
