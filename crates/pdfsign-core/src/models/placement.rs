use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::PdfSignError;

/// Canvas rotation of the signature box. Only quarter turns exist.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn from_degrees(degrees: i32) -> Result<Self, PdfSignError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            _ => Err(PdfSignError::InvalidPlacement(format!(
                "Rotation must be a multiple of 90 degrees, got {}",
                degrees
            ))),
        }
    }
}

impl TryFrom<f64> for Rotation {
    type Error = PdfSignError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(PdfSignError::InvalidPlacement(format!(
                "Rotation must be a multiple of 90 degrees, got {}",
                value
            )));
        }
        Rotation::from_degrees(value as i32)
    }
}

impl From<Rotation> for f64 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees() as f64
    }
}

impl Display for Rotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.degrees())
    }
}

/// Signature box as captured by the placement canvas when the user confirmed it.
///
/// Spatial fields are canvas units; `canvas_to_pdf_scale` converts them back
/// to PDF points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementData {
    /// 1-based page index.
    pub page: u32,
    pub left: f64,
    pub top: f64,
    #[serde(default = "unit_scale")]
    pub scale_x: f64,
    #[serde(default = "unit_scale")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: Rotation,
    pub width: f64,
    pub height: f64,
    pub canvas_to_pdf_scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

impl PlacementData {
    /// Check that the placement can be converted into wire parameters.
    pub fn validate(&self) -> Result<(), PdfSignError> {
        if self.page == 0 {
            return Err(PdfSignError::InvalidPlacement(
                "Page index is 1-based".to_string(),
            ));
        }

        let fields = [
            ("left", self.left),
            ("top", self.top),
            ("scaleX", self.scale_x),
            ("scaleY", self.scale_y),
            ("width", self.width),
            ("height", self.height),
            ("canvasToPdfScale", self.canvas_to_pdf_scale),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(PdfSignError::InvalidPlacement(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.canvas_to_pdf_scale == 0.0 {
            return Err(PdfSignError::InvalidPlacement(
                "canvasToPdfScale must be greater than zero".to_string(),
            ));
        }

        if self.width * self.scale_x == 0.0 || self.height * self.scale_y == 0.0 {
            return Err(PdfSignError::InvalidPlacement(
                "Signature box has no area".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Placement parameters in the signing server's convention: bottom-left anchor,
/// y pointing up, rotation counter to the canvas.
///
/// There is deliberately no height: the server derives it from the signature's
/// aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePlacement {
    pub x: i64,
    pub y: i64,
    pub r: i32,
    pub w: i64,
    pub p: u32,
}

impl WirePlacement {
    /// Multipart form fields in wire order.
    pub fn form_fields(&self) -> [(&'static str, String); 5] {
        [
            ("y", self.y.to_string()),
            ("x", self.x.to_string()),
            ("r", self.r.to_string()),
            ("w", self.w.to_string()),
            ("p", self.p.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement() -> PlacementData {
        PlacementData {
            page: 1,
            left: 10.0,
            top: 20.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: Rotation::Deg0,
            width: 50.0,
            height: 20.0,
            canvas_to_pdf_scale: 1.0,
        }
    }

    #[test]
    fn rotation_accepts_quarter_turns_only() {
        assert_eq!(Rotation::try_from(90.0).unwrap(), Rotation::Deg90);
        assert_eq!(Rotation::try_from(360.0).unwrap(), Rotation::Deg0);
        assert_eq!(Rotation::try_from(-90.0).unwrap(), Rotation::Deg270);
        assert!(Rotation::try_from(45.0).is_err());
        assert!(Rotation::try_from(90.5).is_err());
        assert!(Rotation::try_from(f64::NAN).is_err());
    }

    #[test]
    fn deserializes_canvas_payload() {
        let json = r#"{
            "page": 2, "left": 12.5, "top": 40, "scaleX": 1.5, "scaleY": 1.5,
            "angle": 270, "width": 100, "height": 40, "canvasToPdfScale": 1.25
        }"#;
        let data: PlacementData = serde_json::from_str(json).unwrap();
        assert_eq!(data.page, 2);
        assert_eq!(data.angle, Rotation::Deg270);
        assert_eq!(data.canvas_to_pdf_scale, 1.25);
        assert!(data.is_valid());
    }

    #[test]
    fn rejects_non_quarter_angle_when_deserializing() {
        let json = r#"{"page":1,"left":0,"top":0,"angle":30,"width":1,"height":1,"canvasToPdfScale":1}"#;
        assert!(serde_json::from_str::<PlacementData>(json).is_err());
    }

    #[test]
    fn validation_rules() {
        assert!(placement().is_valid());

        let mut p = placement();
        p.page = 0;
        assert!(!p.is_valid());

        let mut p = placement();
        p.left = -1.0;
        assert!(!p.is_valid());

        let mut p = placement();
        p.canvas_to_pdf_scale = 0.0;
        assert!(!p.is_valid());

        let mut p = placement();
        p.width = 0.0;
        assert!(!p.is_valid());
    }

    #[test]
    fn wire_form_fields() {
        let wire = WirePlacement {
            x: 11,
            y: 761,
            r: 270,
            w: 50,
            p: 3,
        };
        let fields = wire.form_fields();
        assert_eq!(fields[0], ("y", "761".to_string()));
        assert_eq!(fields[2], ("r", "270".to_string()));
        assert_eq!(fields[4], ("p", "3".to_string()));
    }
}
