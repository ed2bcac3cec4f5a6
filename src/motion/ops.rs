// src/motion/ops.rs
//
// Pixel operations for building the motion mask, over raw row-major
// buffers.

/// Element-wise absolute difference of two equally sized buffers.
pub fn absdiff(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| x.abs_diff(y))
        .collect()
}

/// BT.601 luma conversion, packed RGB8 to GRAY8.
pub fn rgb_to_gray(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|px| {
            let luma =
                0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
            luma.round() as u8
        })
        .collect()
}

/// Binary threshold: strictly above `thresh` becomes 255, everything else 0.
pub fn threshold(gray: &[u8], thresh: u8) -> Vec<u8> {
    gray.iter()
        .map(|&v| if v > thresh { 255 } else { 0 })
        .collect()
}

/// Separable Gaussian blur with a binomial kernel of odd size `kernel`
/// (5 gives the classic [1 4 6 4 1]/16 taps). Borders reflect.
pub fn gaussian_blur(gray: &[u8], width: usize, height: usize, kernel: usize) -> Vec<u8> {
    if kernel <= 1 || gray.is_empty() {
        return gray.to_vec();
    }
    let taps = binomial_taps(kernel);
    let radius = (kernel / 2) as isize;

    // Horizontal pass into floats, vertical pass back to bytes.
    let mut horizontal = vec![0.0f32; gray.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, tap) in taps.iter().enumerate() {
                let sx = reflect(x as isize + k as isize - radius, width);
                acc += tap * f32::from(gray[y * width + sx]);
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = vec![0u8; gray.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, tap) in taps.iter().enumerate() {
                let sy = reflect(y as isize + k as isize - radius, height);
                acc += tap * horizontal[sy * width + x];
            }
            out[y * width + x] = acc.round() as u8;
        }
    }
    out
}

/// Rectangular dilation. Out-of-frame neighbors are ignored.
pub fn dilate(mask: &[u8], width: usize, height: usize, kw: usize, kh: usize) -> Vec<u8> {
    morph(mask, width, height, kw, kh, true)
}

/// Rectangular erosion, the reflected counterpart of `dilate`.
pub fn erode(mask: &[u8], width: usize, height: usize, kw: usize, kh: usize) -> Vec<u8> {
    morph(mask, width, height, kw, kh, false)
}

/// Closing: dilation then erosion, merging blobs across small gaps.
pub fn close(mask: &[u8], width: usize, height: usize, kw: usize, kh: usize) -> Vec<u8> {
    let dilated = dilate(mask, width, height, kw, kh);
    erode(&dilated, width, height, kw, kh)
}

fn morph(mask: &[u8], width: usize, height: usize, kw: usize, kh: usize, grow: bool) -> Vec<u8> {
    let ax = (kw / 2) as isize;
    let ay = (kh / 2) as isize;
    let mut out = vec![0u8; mask.len()];

    for y in 0..height as isize {
        for x in 0..width as isize {
            let mut value = if grow { 0u8 } else { 255u8 };
            for j in 0..kh as isize {
                for i in 0..kw as isize {
                    // The erosion kernel is the dilation kernel reflected
                    // through the anchor, which matters for even sizes.
                    let (dx, dy) = if grow {
                        (i - ax, j - ay)
                    } else {
                        (ax - i, ay - j)
                    };
                    let sx = x + dx;
                    let sy = y + dy;
                    if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                        continue;
                    }
                    let sample = mask[(sy * width as isize + sx) as usize];
                    value = if grow {
                        value.max(sample)
                    } else {
                        value.min(sample)
                    };
                }
            }
            out[(y * width as isize + x) as usize] = value;
        }
    }
    out
}

/// Pascal-row binomial weights normalized to sum 1.
fn binomial_taps(kernel: usize) -> Vec<f32> {
    let mut row = vec![1.0f64];
    for _ in 1..kernel {
        let mut next = vec![1.0f64; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    let norm: f64 = row.iter().sum();
    row.iter().map(|v| (v / norm) as f32).collect()
}

/// Mirror an index into [0, n) without repeating the edge sample.
fn reflect(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * (n - 1) - i;
        } else {
            return i as usize;
        }
    }
}
