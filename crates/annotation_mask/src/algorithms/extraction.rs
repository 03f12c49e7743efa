use image::GrayImage;
use crate::{error::Result, traits::ContourExtractor, types::Contour};

/// Unit steps in clockwise order starting at "up".
const HEADINGS: [(i64, i64); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Relative turns tried at every step: left, straight, right, back.
const TURN_ORDER: [usize; 4] = [3, 0, 1, 2];

struct BinaryView<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
}

impl BinaryView<'_> {
    fn is_set(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.data[y as usize * self.width + x as usize] != 0
    }

    /// First 4-neighbor direction that is background or off the image.
    fn open_side(&self, x: i64, y: i64) -> Option<usize> {
        HEADINGS
            .iter()
            .position(|&(dx, dy)| !self.is_set(x + dx, y + dy))
    }
}

/// Trace every region boundary of a binary mask.
///
/// A walk starts at any unvisited foreground pixel with a background (or
/// out-of-image) 4-neighbor and keeps the background on its left: at each step
/// it tries turning left, going straight, turning right and turning back, in
/// that order, and moves to the first foreground pixel. The walk ends when it
/// comes back to its start pixel holding at least three points, or after
/// `4 * width * height` steps. An early return to the start (a one-pixel spur
/// off the start pixel) is recorded and the walk continues. Contours with
/// fewer than three points are dropped.
pub fn extract_contours(mask: &[u8], width: usize, height: usize) -> Vec<Contour> {
    if width == 0 || height == 0 || mask.len() < width * height {
        return Vec::new();
    }
    let view = BinaryView { data: mask, width, height };
    let max_steps = 4usize.saturating_mul(width).saturating_mul(height);
    let mut visited = vec![false; width * height];
    let mut contours = Vec::new();

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            if visited[y as usize * width + x as usize] || !view.is_set(x, y) {
                continue;
            }
            let Some(open) = view.open_side(x, y) else {
                continue;
            };
            let points = trace_from(&view, (x, y), (open + 1) % 4, max_steps, &mut visited);
            if points.len() >= 3 {
                contours.push(Contour::new(points));
            }
        }
    }

    contours
}

fn trace_from(
    view: &BinaryView<'_>,
    start: (i64, i64),
    mut heading: usize,
    max_steps: usize,
    visited: &mut [bool],
) -> Vec<[f32; 2]> {
    let width = view.width;
    let mut points = vec![[start.0 as f32, start.1 as f32]];
    visited[start.1 as usize * width + start.0 as usize] = true;
    let (mut x, mut y) = start;

    for _ in 0..max_steps {
        let next = TURN_ORDER
            .iter()
            .map(|turn| (heading + turn) % 4)
            .find(|&dir| view.is_set(x + HEADINGS[dir].0, y + HEADINGS[dir].1));
        // isolated pixel
        let Some(dir) = next else {
            break;
        };
        heading = dir;
        x += HEADINGS[dir].0;
        y += HEADINGS[dir].1;
        if (x, y) == start && points.len() >= 3 {
            break;
        }
        points.push([x as f32, y as f32]);
        visited[y as usize * width + x as usize] = true;
    }

    points
}

/// Boundary-following contour extractor (left-hand wall walk)
#[derive(Debug, Clone, Default)]
pub struct BoundaryTracer;

impl ContourExtractor for BoundaryTracer {
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<Contour>> {
        Ok(extract_contours(
            mask.as_raw(),
            mask.width() as usize,
            mask.height() as usize,
        ))
    }
}

/// Imageproc-based contour extractor (Suzuki-Abe border following)
#[derive(Debug, Clone, Default)]
pub struct ImageprocContourExtractor;

impl ContourExtractor for ImageprocContourExtractor {
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<Contour>> {
        let contours = imageproc::contours::find_contours::<i32>(mask);

        let result = contours
            .into_iter()
            .filter(|contour| contour.points.len() >= 3)
            .map(|contour| {
                Contour::new(
                    contour
                        .points
                        .iter()
                        .map(|p| [p.x as f32, p.y as f32])
                        .collect(),
                )
            })
            .collect();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(width: usize, height: usize, x0: usize, y0: usize, size: usize) -> Vec<u8> {
        let mut mask = vec![0u8; width * height];
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                mask[y * width + x] = 1;
            }
        }
        mask
    }

    fn is_closed_4_connected(points: &[[f32; 2]]) -> bool {
        (0..points.len()).all(|i| {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            (a[0] - b[0]).abs() + (a[1] - b[1]).abs() == 1.0
        })
    }

    #[test]
    fn test_empty_mask() {
        assert!(extract_contours(&[0u8; 100], 10, 10).is_empty());
    }

    #[test]
    fn test_square_yields_single_perimeter_loop() {
        let mask = square_mask(30, 30, 5, 5, 10);
        let contours = extract_contours(&mask, 30, 30);
        assert_eq!(contours.len(), 1);

        let points = &contours[0].points;
        assert_eq!(points.len(), 36);
        assert_eq!(points[0], [5.0, 5.0]);
        assert!(is_closed_4_connected(points));
        for &[x, y] in points {
            let on_edge = x == 5.0 || x == 14.0 || y == 5.0 || y == 14.0;
            assert!(on_edge, "({x}, {y}) is not a perimeter pixel");
        }
    }

    #[test]
    fn test_mask_touching_image_edge() {
        let mask = vec![1u8; 16];
        let contours = extract_contours(&mask, 4, 4);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 12);
    }

    #[test]
    fn test_isolated_pixel_is_discarded() {
        let mut mask = vec![0u8; 25];
        mask[12] = 1;
        assert!(extract_contours(&mask, 5, 5).is_empty());
    }

    #[test]
    fn test_two_pixel_blob_walks_past_start() {
        let mut mask = vec![0u8; 25];
        mask[0] = 1;
        mask[1] = 1;
        let contours = extract_contours(&mask, 5, 5);
        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0].points,
            vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.0], [1.0, 0.0]]
        );
    }

    #[test]
    fn test_spur_on_start_pixel_stays_in_contour() {
        // (1,0) is a dead end hanging off the start pixel (0,0)
        let mut mask = vec![0u8; 12];
        for (x, y) in [(0, 0), (1, 0), (0, 1), (0, 2), (0, 3)] {
            mask[y * 3 + x] = 1;
        }
        let contours = extract_contours(&mask, 3, 4);
        assert_eq!(contours.len(), 1);

        let points = &contours[0].points;
        assert_eq!(
            points,
            &vec![
                [0.0, 0.0],
                [1.0, 0.0],
                [0.0, 0.0],
                [0.0, 1.0],
                [0.0, 2.0],
                [0.0, 3.0],
                [0.0, 2.0],
                [0.0, 1.0],
            ]
        );
        assert!(is_closed_4_connected(points));
        for pixel in [[0.0, 0.0], [1.0, 0.0], [0.0, 3.0]] {
            assert!(points.contains(&pixel));
        }
    }

    #[test]
    fn test_separate_regions_give_separate_contours() {
        let mut mask = square_mask(20, 10, 1, 1, 4);
        for y in 2..6 {
            for x in 10..15 {
                mask[y * 20 + x] = 1;
            }
        }
        assert_eq!(extract_contours(&mask, 20, 10).len(), 2);
    }

    #[test]
    fn test_ring_has_outer_and_inner_boundary() {
        let mut mask = square_mask(12, 12, 1, 1, 9);
        for y in 4..7 {
            for x in 4..7 {
                mask[y * 12 + x] = 0;
            }
        }
        let contours = extract_contours(&mask, 12, 12);
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|c| is_closed_4_connected(&c.points)));
    }

    #[test]
    fn test_imageproc_extractor_agrees_on_count() {
        let raw = square_mask(30, 30, 5, 5, 10);
        let image = GrayImage::from_raw(30, 30, raw).unwrap();
        let ours = BoundaryTracer.extract_contours(&image).unwrap();
        let theirs = ImageprocContourExtractor.extract_contours(&image).unwrap();
        assert_eq!(ours.len(), theirs.len());
    }
}
