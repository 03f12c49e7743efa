//! View transform between screen, image and mask coordinates.
//!
//! The forward mapping is `screen = T · R · S · image`. Every mutation
//! validates its inputs and its result; an update that would produce a
//! non-finite state is dropped and the previous state is kept. Fields are
//! only reachable through these mutations, so the view scale always stays
//! inside its configured bounds.

use geo::AffineTransform;
use geo_types::Coord;
use schemars::JsonSchema;
use serde::Serialize;
use tracing::debug;

use crate::config::{MaskConfig, MAX_VIEW_SCALE, MIN_VIEW_SCALE};

const ORIGIN: Coord<f64> = Coord { x: 0.0, y: 0.0 };

fn is_finite(c: Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, JsonSchema)]
pub struct ViewTransform {
    /// Screen position of the image origin
    translation: [f64; 2],
    scale: f64,
    /// Accumulated rotation in radians
    rotation: f64,
    /// Mask pixels per image pixel
    mask_scale: f64,
    min_scale: f64,
    max_scale: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            translation: [0.0, 0.0],
            scale: 1.0,
            rotation: 0.0,
            mask_scale: 1.0,
            min_scale: MIN_VIEW_SCALE,
            max_scale: MAX_VIEW_SCALE,
        }
    }
}

impl ViewTransform {
    pub fn new(config: &MaskConfig) -> Self {
        Self {
            min_scale: config.min_scale,
            max_scale: config.max_scale,
            ..Self::default()
        }
    }

    /// Screen position of the image origin
    pub fn translation(&self) -> [f64; 2] {
        self.translation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Accumulated rotation in radians
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Mask pixels per image pixel
    pub fn mask_scale(&self) -> f64 {
        self.mask_scale
    }

    pub fn scale_bounds(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    /// Back to identity, keeping `mask_scale` and the scale bounds.
    pub fn reset(&mut self) {
        self.translation = [0.0, 0.0];
        self.scale = 1.0;
        self.rotation = 0.0;
    }

    pub fn set_mask_scale(&mut self, mask_scale: f64) {
        if mask_scale.is_finite() && mask_scale > 0.0 {
            self.mask_scale = mask_scale;
        }
    }

    fn translation_coord(&self) -> Coord<f64> {
        Coord {
            x: self.translation[0],
            y: self.translation[1],
        }
    }

    /// Forward image → screen matrix.
    pub fn matrix(&self) -> AffineTransform<f64> {
        let (sin, cos) = self.rotation.sin_cos();
        let s = self.scale;
        AffineTransform::new(
            cos * s,
            -sin * s,
            self.translation[0],
            sin * s,
            cos * s,
            self.translation[1],
        )
    }

    pub fn apply_pan(&mut self, delta: Coord<f64>) {
        if !is_finite(delta) {
            debug!("ignoring non-finite pan delta");
            return;
        }
        let next = [self.translation[0] + delta.x, self.translation[1] + delta.y];
        if next.iter().all(|v| v.is_finite()) {
            self.translation = next;
        }
    }

    /// Zoom about `center` so that it stays fixed on screen.
    pub fn apply_pinch(&mut self, scale_factor: f64, center: Coord<f64>) {
        if !scale_factor.is_finite() || scale_factor <= 0.0 || !is_finite(center) {
            debug!(scale_factor, "ignoring invalid pinch");
            return;
        }
        let new_scale = (self.scale * scale_factor).clamp(self.min_scale, self.max_scale);
        let ratio = new_scale / self.scale;
        let t = self.translation_coord();
        let next = center - (center - t) * ratio;
        if !is_finite(next) || !ratio.is_finite() {
            return;
        }
        self.scale = new_scale;
        self.translation = [next.x, next.y];
    }

    /// Rotate about `center` by `angle_delta` radians.
    pub fn apply_rotation(&mut self, angle_delta: f64, center: Coord<f64>) {
        if !angle_delta.is_finite() || !is_finite(center) {
            debug!(angle_delta, "ignoring invalid rotation");
            return;
        }
        let (sin, cos) = angle_delta.sin_cos();
        let offset = self.translation_coord() - center;
        let next = Coord {
            x: center.x + offset.x * cos - offset.y * sin,
            y: center.y + offset.x * sin + offset.y * cos,
        };
        let rotation = self.rotation + angle_delta;
        if !is_finite(next) || !rotation.is_finite() {
            return;
        }
        self.rotation = rotation;
        self.translation = [next.x, next.y];
    }

    pub fn image_to_screen(&self, point: Coord<f64>) -> Coord<f64> {
        self.matrix().apply(point)
    }

    /// Falls back to the identity mapping when the matrix cannot be inverted.
    pub fn screen_to_image(&self, point: Coord<f64>) -> Coord<f64> {
        match self.matrix().inverse() {
            Some(inverse) => {
                let mapped = inverse.apply(point);
                if is_finite(mapped) { mapped } else { point }
            }
            None => point,
        }
    }

    /// Returns the origin instead of a non-finite point.
    pub fn screen_to_mask(&self, point: Coord<f64>) -> Coord<f64> {
        if !is_finite(point) {
            return ORIGIN;
        }
        let mask = self.screen_to_image(point) * self.mask_scale;
        if is_finite(mask) { mask } else { ORIGIN }
    }

    pub fn mask_to_screen(&self, point: Coord<f64>) -> Coord<f64> {
        self.image_to_screen(point / self.mask_scale)
    }

    /// Brush radii live in mask pixels, so the view zoom does not apply.
    pub fn screen_radius_to_mask(&self, radius: f64) -> f64 {
        radius * self.mask_scale
    }

    /// Center the image in the view at the largest scale that fits.
    pub fn fit_to_view(&mut self, image_size: [f64; 2], view_size: [f64; 2]) {
        let valid = image_size
            .iter()
            .chain(view_size.iter())
            .all(|v| v.is_finite() && *v > 0.0);
        if !valid {
            self.reset();
            return;
        }
        let scale = (view_size[0] / image_size[0])
            .min(view_size[1] / image_size[1])
            .clamp(self.min_scale, self.max_scale);
        self.scale = scale;
        self.rotation = 0.0;
        self.translation = [
            (view_size[0] - image_size[0] * scale) / 2.0,
            (view_size[1] - image_size[1] * scale) / 2.0,
        ];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: Coord<f64>, b: Coord<f64>, tol: f64) -> bool {
        (a.x - b.x).abs() <= tol && (a.y - b.y).abs() <= tol
    }

    #[test]
    fn test_identity_round_trip() {
        let t = ViewTransform::default();
        let p = Coord { x: 12.5, y: -3.0 };
        assert_eq!(t.image_to_screen(p), p);
        assert_eq!(t.screen_to_image(p), p);
    }

    #[test]
    fn test_composition_order_is_translate_rotate_scale() {
        let mut t = ViewTransform::default();
        t.scale = 2.0;
        t.rotation = std::f64::consts::FRAC_PI_2;
        t.translation = [10.0, 20.0];
        // scale (1,0) -> (2,0), rotate 90deg -> (0,2), translate -> (10,22)
        let screen = t.image_to_screen(Coord { x: 1.0, y: 0.0 });
        assert!(approx(screen, Coord { x: 10.0, y: 22.0 }, 1e-9));
        let back = t.screen_to_image(screen);
        assert!(approx(back, Coord { x: 1.0, y: 0.0 }, 1e-9));
    }

    #[test]
    fn test_pan_rejects_non_finite() {
        let mut t = ViewTransform::default();
        t.apply_pan(Coord { x: f64::NAN, y: 1.0 });
        t.apply_pan(Coord { x: 1.0, y: f64::INFINITY });
        assert_eq!(t.translation, [0.0, 0.0]);
        t.apply_pan(Coord { x: 3.0, y: -4.0 });
        assert_eq!(t.translation, [3.0, -4.0]);
    }

    #[test]
    fn test_pinch_clamps_scale() {
        let mut t = ViewTransform::default();
        t.apply_pinch(1000.0, Coord { x: 50.0, y: 50.0 });
        assert_eq!(t.scale, MAX_VIEW_SCALE);
        t.apply_pinch(1e-6, Coord { x: 50.0, y: 50.0 });
        assert_eq!(t.scale, MIN_VIEW_SCALE);
    }

    #[test]
    fn test_configured_bounds_hold_through_every_mutation() {
        let config = MaskConfig {
            min_scale: 0.5,
            max_scale: 4.0,
            ..MaskConfig::default()
        };
        let mut t = ViewTransform::new(&config);
        t.apply_pinch(100.0, Coord { x: 10.0, y: 10.0 });
        assert_eq!(t.scale(), 4.0);
        t.fit_to_view([10.0, 10.0], [1000.0, 1000.0]);
        assert_eq!(t.scale(), 4.0);
        t.fit_to_view([1000.0, 1000.0], [10.0, 10.0]);
        assert_eq!(t.scale(), 0.5);
        assert_eq!(t.scale_bounds(), (0.5, 4.0));
    }

    #[test]
    fn test_pinch_rejects_invalid_factor() {
        let mut t = ViewTransform::default();
        t.apply_pinch(0.0, Coord { x: 1.0, y: 1.0 });
        t.apply_pinch(-2.0, Coord { x: 1.0, y: 1.0 });
        t.apply_pinch(f64::NAN, Coord { x: 1.0, y: 1.0 });
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.translation, [0.0, 0.0]);
    }

    #[test]
    fn test_rotation_accumulates_without_snapping() {
        let mut t = ViewTransform::default();
        let center = Coord { x: 100.0, y: 100.0 };
        for _ in 0..10 {
            t.apply_rotation(1.0, center);
        }
        assert!((t.rotation - 10.0).abs() < 1e-12);
        t.apply_rotation(f64::NAN, center);
        assert!((t.rotation - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_keeps_center_fixed() {
        let mut t = ViewTransform::default();
        t.apply_pinch(2.0, Coord { x: 0.0, y: 0.0 });
        t.apply_pan(Coord { x: 30.0, y: 10.0 });
        let center = Coord { x: 200.0, y: 120.0 };
        let before = t.screen_to_image(center);
        t.apply_rotation(0.7, center);
        let after = t.screen_to_image(center);
        assert!(approx(before, after, 1e-9));
    }

    #[test]
    fn test_degenerate_inverse_falls_back_to_identity() {
        let mut t = ViewTransform::default();
        t.scale = 0.0;
        let p = Coord { x: 4.0, y: 5.0 };
        assert_eq!(t.screen_to_image(p), p);

        t.scale = f64::NAN;
        let mapped = t.screen_to_image(p);
        assert!(mapped.x.is_finite() && mapped.y.is_finite());
    }

    #[test]
    fn test_screen_to_mask_never_returns_nan() {
        let mut t = ViewTransform::default();
        t.set_mask_scale(2.0);
        assert_eq!(t.screen_to_mask(Coord { x: f64::NAN, y: 0.0 }), ORIGIN);
        t.translation = [f64::INFINITY, 0.0];
        let mapped = t.screen_to_mask(Coord { x: 1.0, y: 1.0 });
        assert!(mapped.x.is_finite() && mapped.y.is_finite());
    }

    #[test]
    fn test_mask_round_trip() {
        let mut t = ViewTransform::default();
        t.set_mask_scale(2.0);
        t.apply_pinch(1.7, Coord { x: 30.0, y: 40.0 });
        t.apply_rotation(0.3, Coord { x: 10.0, y: 10.0 });
        let screen = Coord { x: 123.0, y: 77.0 };
        let mask = t.screen_to_mask(screen);
        assert!(approx(t.mask_to_screen(mask), screen, 1e-9));
    }

    #[test]
    fn test_fit_to_view_centers_image() {
        let mut t = ViewTransform::default();
        t.apply_rotation(1.0, Coord { x: 0.0, y: 0.0 });
        t.fit_to_view([400.0, 200.0], [800.0, 800.0]);
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.rotation, 0.0);
        assert_eq!(t.translation, [0.0, 200.0]);
    }

    #[test]
    fn test_fit_to_view_degenerate_resets() {
        let mut t = ViewTransform::default();
        t.apply_pan(Coord { x: 5.0, y: 5.0 });
        t.fit_to_view([0.0, 200.0], [800.0, 800.0]);
        assert_eq!(t.translation, [0.0, 0.0]);
        assert_eq!(t.scale, 1.0);
    }

    proptest! {
        #[test]
        fn pinch_keeps_center_fixed(
            factors in proptest::collection::vec(0.05f64..20.0, 1..8),
            cx in -500.0f64..500.0,
            cy in -500.0f64..500.0,
            angle in -6.0f64..6.0,
        ) {
            let mut t = ViewTransform::default();
            t.apply_rotation(angle, Coord { x: 0.0, y: 0.0 });
            let center = Coord { x: cx, y: cy };
            for factor in factors {
                let before = t.screen_to_image(center);
                t.apply_pinch(factor, center);
                let after = t.screen_to_image(center);
                prop_assert!(approx(before, after, 1e-6));
                prop_assert!(t.scale >= MIN_VIEW_SCALE && t.scale <= MAX_VIEW_SCALE);
            }
        }

        #[test]
        fn radius_ignores_zoom(
            radius in 0.0f64..200.0,
            mask_scale in 0.01f64..2.0,
            factor in 0.01f64..100.0,
        ) {
            let mut t = ViewTransform::default();
            t.set_mask_scale(mask_scale);
            let before = t.screen_radius_to_mask(radius);
            t.apply_pinch(factor, Coord { x: 10.0, y: 10.0 });
            prop_assert_eq!(before, t.screen_radius_to_mask(radius));
        }
    }
}
