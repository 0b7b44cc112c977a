/// Axis-aligned bounding box in corner form, pixel coordinates.
///
/// Both back ends normalize to this representation at their own boundary:
/// the hosted API reports center-form boxes, the local model reports
/// letterboxed corner-form boxes. Coordinates are signed so construction
/// never clamps; callers clamp when they touch pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Converts a center-form box `(cx, cy, w, h)` to corner form.
    ///
    /// Rounds each corner independently; a corner-form → center-form →
    /// corner-form round trip stays within ±1 per coordinate.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            x1: (cx - width / 2.0).round() as i32,
            y1: (cy - height / 2.0).round() as i32,
            x2: (cx + width / 2.0).round() as i32,
            y2: (cy + height / 2.0).round() as i32,
        }
    }

    /// Center point `(cx, cy)` of the box.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x1 + self.x2) as f64 / 2.0,
            (self.y1 + self.y2) as f64 / 2.0,
        )
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

/// One detected object, back end agnostic.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub label: String,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64, label: impl Into<String>) -> Self {
        Self {
            bbox,
            confidence,
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_from_center_even_dimensions() {
        let b = BoundingBox::from_center(100.0, 50.0, 40.0, 20.0);
        assert_eq!(b, BoundingBox::new(80, 40, 120, 60));
    }

    #[test]
    fn test_from_center_fractional_center() {
        let b = BoundingBox::from_center(10.5, 10.5, 3.0, 3.0);
        assert_eq!(b.width(), 3);
        assert_eq!(b.height(), 3);
    }

    #[test]
    fn test_center_of_corner_box() {
        let b = BoundingBox::new(80, 40, 120, 60);
        let (cx, cy) = b.center();
        assert_relative_eq!(cx, 100.0);
        assert_relative_eq!(cy, 50.0);
    }

    #[rstest]
    #[case::even(100.0, 50.0, 40.0, 20.0)]
    #[case::odd(100.0, 50.0, 41.0, 23.0)]
    #[case::fractional(99.5, 49.5, 37.3, 21.7)]
    #[case::small(3.0, 3.0, 1.0, 1.0)]
    fn test_center_corner_round_trip_within_one(
        #[case] cx: f64,
        #[case] cy: f64,
        #[case] w: f64,
        #[case] h: f64,
    ) {
        let corner = BoundingBox::from_center(cx, cy, w, h);
        let (rcx, rcy) = corner.center();
        let again = BoundingBox::from_center(rcx, rcy, corner.width() as f64, corner.height() as f64);

        assert!((corner.x1 - again.x1).abs() <= 1);
        assert!((corner.y1 - again.y1).abs() <= 1);
        assert!((corner.x2 - again.x2).abs() <= 1);
        assert!((corner.y2 - again.y2).abs() <= 1);
    }

    #[test]
    fn test_negative_corners_preserved() {
        // Boxes partially off-frame keep their raw geometry.
        let b = BoundingBox::from_center(5.0, 5.0, 20.0, 20.0);
        assert_eq!(b.x1, -5);
        assert_eq!(b.y1, -5);
    }

    #[test]
    fn test_detection_construction() {
        let d = Detection::new(BoundingBox::new(0, 0, 10, 10), 0.87, "snake");
        assert_eq!(d.label, "snake");
        assert_relative_eq!(d.confidence, 0.87);
        assert_eq!(d.bbox.width(), 10);
    }
}
