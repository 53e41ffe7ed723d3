//! Canvas to signing-server coordinate transform.
//!
//! The placement canvas works top-left origin with y pointing down and rotates
//! the signature box clockwise about its top-left corner. The signing server
//! expects the box's bottom-left anchor in PDF points with y pointing up and
//! measures rotation the other way round.

use pdfsign_core::models::{PlacementData, Rotation, WirePlacement};
use pdfsign_core::PdfSignError;

/// Signature box in PDF points, anchored at the corner the server uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    /// 1-based page index.
    pub page: u32,
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
    pub angle: Rotation,
}

impl PageRect {
    /// Convert a confirmed canvas placement into page space.
    ///
    /// `page_height` is the height of the target page in PDF points.
    pub fn from_placement(data: &PlacementData, page_height: f64) -> Result<Self, PdfSignError> {
        data.validate()?;
        if !page_height.is_finite() || page_height <= 0.0 {
            return Err(PdfSignError::InvalidPlacement(format!(
                "Page height must be positive, got {}",
                page_height
            )));
        }

        let scale = data.canvas_to_pdf_scale;
        let left = data.left / scale;
        let top = data.top / scale;
        let width = data.width * data.scale_x / scale;
        let height = data.height * data.scale_y / scale;

        // The unrotated bottom-left corner, rotated with the box about its
        // top-left origin.
        let (dx, dy) = match data.angle {
            Rotation::Deg0 => (0.0, height),
            Rotation::Deg90 => (-height, 0.0),
            Rotation::Deg180 => (0.0, -height),
            Rotation::Deg270 => (height, 0.0),
        };

        Ok(Self {
            page: data.page,
            left: left + dx,
            bottom: page_height - (top + dy),
            width,
            height,
            angle: data.angle,
        })
    }
}

/// Rotation in the server's sense, normalized to `[0, 360)`.
pub fn wire_rotation(angle: Rotation) -> i32 {
    (-(angle.degrees() - 360)).rem_euclid(360)
}

/// Anchor shift caused by the placeholder's border, `(x, y)` in PDF points.
pub fn stroke_offset(angle: Rotation, stroke_width: f64) -> (f64, f64) {
    let m = stroke_width / 2.0;
    match angle {
        Rotation::Deg0 => (m, m),
        Rotation::Deg90 => (-m, m),
        Rotation::Deg180 => (-m, -m),
        Rotation::Deg270 => (m, -m),
    }
}

/// Wire parameters for a page-space rectangle.
///
/// Only the width is sent; the server derives the height from the
/// signature's aspect ratio.
pub fn to_wire_placement(rect: &PageRect, stroke_width: f64) -> WirePlacement {
    debug_assert!(
        rect.left.is_finite() && rect.bottom.is_finite() && rect.width.is_finite(),
        "page rectangle must be finite"
    );

    let (ox, oy) = stroke_offset(rect.angle, stroke_width);
    WirePlacement {
        x: (rect.left + ox).round() as i64,
        y: (rect.bottom + oy).round() as i64,
        r: wire_rotation(rect.angle),
        w: rect.width.round() as i64,
        p: rect.page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STROKE: f64 = 2.0;

    fn placement(angle: Rotation) -> PlacementData {
        PlacementData {
            page: 1,
            left: 10.0,
            top: 20.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle,
            width: 50.0,
            height: 20.0,
            canvas_to_pdf_scale: 1.0,
        }
    }

    #[test]
    fn unrotated_box_anchors_at_bottom_left() {
        let rect = PageRect::from_placement(&placement(Rotation::Deg0), 800.0).unwrap();
        assert_eq!(rect.left, 10.0);
        assert_eq!(rect.bottom, 760.0);
        assert_eq!(rect.width, 50.0);

        let wire = to_wire_placement(&rect, STROKE);
        assert_eq!(
            wire,
            WirePlacement {
                x: 11,
                y: 761,
                r: 0,
                w: 50,
                p: 1
            }
        );
    }

    #[test]
    fn rotation_is_inverted() {
        let expected = [
            (Rotation::Deg0, 0),
            (Rotation::Deg90, 270),
            (Rotation::Deg180, 180),
            (Rotation::Deg270, 90),
        ];
        for (angle, r) in expected {
            assert_eq!(wire_rotation(angle), r, "angle {}", angle);
        }
    }

    #[test]
    fn stroke_offset_signs_follow_angle() {
        assert_eq!(stroke_offset(Rotation::Deg0, STROKE), (1.0, 1.0));
        assert_eq!(stroke_offset(Rotation::Deg90, STROKE), (-1.0, 1.0));
        assert_eq!(stroke_offset(Rotation::Deg180, STROKE), (-1.0, -1.0));
        assert_eq!(stroke_offset(Rotation::Deg270, STROKE), (1.0, -1.0));
    }

    #[test]
    fn rotated_anchor_positions() {
        let r90 = PageRect::from_placement(&placement(Rotation::Deg90), 800.0).unwrap();
        assert_eq!((r90.left, r90.bottom), (-10.0, 780.0));

        let r180 = PageRect::from_placement(&placement(Rotation::Deg180), 800.0).unwrap();
        assert_eq!((r180.left, r180.bottom), (10.0, 800.0));

        let r270 = PageRect::from_placement(&placement(Rotation::Deg270), 800.0).unwrap();
        assert_eq!((r270.left, r270.bottom), (30.0, 780.0));

        let wire = to_wire_placement(&r270, STROKE);
        assert_eq!((wire.x, wire.y, wire.r), (31, 779, 90));
    }

    #[test]
    fn canvas_scale_is_removed() {
        let mut data = placement(Rotation::Deg0);
        data.left = 20.0;
        data.top = 40.0;
        data.scale_x = 1.5;
        data.scale_y = 1.5;
        data.canvas_to_pdf_scale = 2.0;

        let rect = PageRect::from_placement(&data, 842.0).unwrap();
        assert_eq!(rect.left, 10.0);
        assert_eq!(rect.width, 37.5);
        assert_eq!(rect.height, 15.0);
        assert_eq!(rect.bottom, 842.0 - 20.0 - 15.0);

        let wire = to_wire_placement(&rect, STROKE);
        assert_eq!(wire.w, 38);
    }

    #[test]
    fn page_index_is_passed_through() {
        let mut data = placement(Rotation::Deg0);
        data.page = 4;
        let rect = PageRect::from_placement(&data, 800.0).unwrap();
        assert_eq!(to_wire_placement(&rect, STROKE).p, 4);
    }

    #[test]
    fn invalid_input_fails_fast() {
        let mut data = placement(Rotation::Deg0);
        data.canvas_to_pdf_scale = 0.0;
        assert!(matches!(
            PageRect::from_placement(&data, 800.0),
            Err(PdfSignError::InvalidPlacement(_))
        ));
        assert!(PageRect::from_placement(&placement(Rotation::Deg0), f64::NAN).is_err());
    }
}
