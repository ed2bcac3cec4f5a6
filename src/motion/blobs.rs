// src/motion/blobs.rs
//
// Connected-component extraction over a binary mask.

use std::collections::VecDeque;

/// Axis-aligned bounding box of one connected foreground region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Blob {
    /// Bounding-box center in integer pixel coordinates.
    pub fn centroid(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Extract 8-connected foreground components, one bounding box each.
pub fn connected_components(mask: &[u8], width: usize, height: usize) -> Vec<Blob> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut visited = vec![false; mask.len()];
    let mut blobs = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..mask.len() {
        if mask[start] == 0 || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);

        let (mut min_x, mut max_x) = (start % width, start % width);
        let (mut min_y, mut max_y) = (start / width, start / width);

        while let Some(idx) = queue.pop_front() {
            let x = idx % width;
            let y = idx / width;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        continue;
                    }
                    let nidx = ny as usize * width + nx as usize;
                    if mask[nidx] != 0 && !visited[nidx] {
                        visited[nidx] = true;
                        queue.push_back(nidx);
                    }
                }
            }
        }

        blobs.push(Blob {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        });
    }
    blobs
}
