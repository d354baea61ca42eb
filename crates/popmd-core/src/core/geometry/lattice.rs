use super::Aabb;
use super::domain::Dimension;
use nalgebra::{Matrix3, Point3, Vector3};
use phf::{Map, phf_map};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum LatticeError {
    #[error("Lattice style '{0}' is not known")]
    UnknownStyle(String),

    #[error("Lattice style '{style}' cannot be used in a {dimension}d simulation")]
    DimensionMismatch { style: LatticeStyle, dimension: u8 },

    #[error("Lattice scale must be positive, got {0}")]
    InvalidScale(f64),

    #[error("Lattice orientation vectors must be non-zero, mutually orthogonal and right-handed")]
    InvalidOrientation,

    #[error("Custom lattice needs three linearly independent cell vectors")]
    DegenerateCell,

    #[error("Basis point {index} has coordinate {value} outside [0, 1)")]
    BasisOutOfCell { index: usize, value: f64 },

    #[error("Lattice style 'custom' requires at least one basis point")]
    EmptyBasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatticeStyle {
    None,
    Sc,
    Bcc,
    Fcc,
    Hcp,
    Diamond,
    Sq,
    Sq2,
    Hex,
    Custom,
}

impl LatticeStyle {
    pub fn name(self) -> &'static str {
        match self {
            LatticeStyle::None => "none",
            LatticeStyle::Sc => "sc",
            LatticeStyle::Bcc => "bcc",
            LatticeStyle::Fcc => "fcc",
            LatticeStyle::Hcp => "hcp",
            LatticeStyle::Diamond => "diamond",
            LatticeStyle::Sq => "sq",
            LatticeStyle::Sq2 => "sq2",
            LatticeStyle::Hex => "hex",
            LatticeStyle::Custom => "custom",
        }
    }

    /// Whether the style can tile a box of the given dimension.
    pub fn supports(self, dimension: Dimension) -> bool {
        match self {
            LatticeStyle::None | LatticeStyle::Custom => true,
            LatticeStyle::Sq | LatticeStyle::Sq2 | LatticeStyle::Hex => dimension.is_2d(),
            _ => !dimension.is_2d(),
        }
    }
}

impl fmt::Display for LatticeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LatticeStyle {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LatticeStyle::None),
            "sc" => Ok(LatticeStyle::Sc),
            "bcc" => Ok(LatticeStyle::Bcc),
            "fcc" => Ok(LatticeStyle::Fcc),
            "hcp" => Ok(LatticeStyle::Hcp),
            "diamond" => Ok(LatticeStyle::Diamond),
            "sq" => Ok(LatticeStyle::Sq),
            "sq2" => Ok(LatticeStyle::Sq2),
            "hex" => Ok(LatticeStyle::Hex),
            "custom" => Ok(LatticeStyle::Custom),
            _ => Err(LatticeError::UnknownStyle(s.to_string())),
        }
    }
}

/// Unit cell of a named style: cell vectors as rows, then basis points in fractional cell
/// coordinates.
struct Preset {
    cell: [[f64; 3]; 3],
    basis: &'static [[f64; 3]],
}

const SQRT_3: f64 = 1.7320508075688772;
const SQRT_8_3: f64 = 1.632993161855452;
const UNIT_CELL: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

#[rustfmt::skip]
static PRESETS: Map<&'static str, Preset> = phf_map! {
    "sc" => Preset { cell: UNIT_CELL, basis: &[[0.0, 0.0, 0.0]] },
    "bcc" => Preset { cell: UNIT_CELL, basis: &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]] },
    "fcc" => Preset {
        cell: UNIT_CELL,
        basis: &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.0], [0.5, 0.0, 0.5], [0.0, 0.5, 0.5]],
    },
    "hcp" => Preset {
        cell: [[1.0, 0.0, 0.0], [0.0, SQRT_3, 0.0], [0.0, 0.0, SQRT_8_3]],
        basis: &[
            [0.0, 0.0, 0.0], [0.5, 0.5, 0.0],
            [0.5, 5.0 / 6.0, 0.5], [0.0, 1.0 / 3.0, 0.5],
        ],
    },
    "diamond" => Preset {
        cell: UNIT_CELL,
        basis: &[
            [0.0, 0.0, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5], [0.5, 0.5, 0.0],
            [0.25, 0.25, 0.25], [0.25, 0.75, 0.75], [0.75, 0.25, 0.75], [0.75, 0.75, 0.25],
        ],
    },
    "sq" => Preset { cell: UNIT_CELL, basis: &[[0.0, 0.0, 0.0]] },
    "sq2" => Preset { cell: UNIT_CELL, basis: &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.0]] },
    "hex" => Preset {
        cell: [[1.0, 0.0, 0.0], [0.0, SQRT_3, 0.0], [0.0, 0.0, 1.0]],
        basis: &[[0.0, 0.0, 0.0], [0.5, 0.5, 0.0]],
    },
};

/// An infinite periodic tiling of unit cells.
///
/// Lattice coordinates `p` map to box coordinates through `x = M (p + origin)`, where
/// `M = R * scale * A`, `A` has the cell vectors as columns and `R` rotates the lattice
/// axes onto the orientation vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    style: LatticeStyle,
    basis: Vec<Vector3<f64>>,
    to_box: Matrix3<f64>,
    to_lattice: Matrix3<f64>,
    origin: Vector3<f64>,
    spacing: Vector3<f64>,
}

impl Lattice {
    /// The placeholder lattice with no basis points and unit spacing.
    ///
    /// Built through [`LatticeBuilder`], a `none` lattice keeps its scale as the spacing
    /// so that lattice units still mean something.
    pub fn none() -> Self {
        Self {
            style: LatticeStyle::None,
            basis: Vec::new(),
            to_box: Matrix3::identity(),
            to_lattice: Matrix3::identity(),
            origin: Vector3::zeros(),
            spacing: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn builder(style: LatticeStyle, scale: f64) -> LatticeBuilder {
        LatticeBuilder::new(style, scale)
    }

    pub fn style(&self) -> LatticeStyle {
        self.style
    }

    pub fn basis(&self) -> &[Vector3<f64>] {
        &self.basis
    }

    /// Number of basis points per unit cell.
    pub fn basis_len(&self) -> usize {
        self.basis.len()
    }

    /// Extent of one unit cell along each box axis.
    pub fn spacing(&self) -> &Vector3<f64> {
        &self.spacing
    }

    pub fn lattice_to_box(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.to_box * (p.coords + self.origin))
    }

    pub fn box_to_lattice(&self, x: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.to_lattice * x.coords - self.origin)
    }

    /// Box coordinates of basis point `basis` in cell `(i, j, k)`.
    pub fn site(&self, cell: [i64; 3], basis: usize) -> Point3<f64> {
        let b = &self.basis[basis];
        let p = Point3::new(
            cell[0] as f64 + b.x,
            cell[1] as f64 + b.y,
            cell[2] as f64 + b.z,
        );
        self.lattice_to_box(&p)
    }

    /// Bounding box, in lattice coordinates, of a box-space region.
    pub fn lattice_bounds_of(&self, region: &Aabb) -> Aabb {
        let corners = region.corners();
        Aabb::from_points(corners.iter().map(|c| self.box_to_lattice(c)))
            .unwrap_or_else(|| *region)
    }
}

#[derive(Debug, Clone)]
pub struct LatticeBuilder {
    style: LatticeStyle,
    scale: f64,
    origin: Vector3<f64>,
    orient: [Vector3<f64>; 3],
    cell: Option<[Vector3<f64>; 3]>,
    basis: Vec<Vector3<f64>>,
}

impl LatticeBuilder {
    pub fn new(style: LatticeStyle, scale: f64) -> Self {
        Self {
            style,
            scale,
            origin: Vector3::zeros(),
            orient: [Vector3::x(), Vector3::y(), Vector3::z()],
            cell: None,
            basis: Vec::new(),
        }
    }

    /// Shift of the lattice, in fractions of a unit cell.
    pub fn origin(mut self, origin: Vector3<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Lattice directions that map onto the box x, y and z axes.
    pub fn orient(mut self, x: Vector3<f64>, y: Vector3<f64>, z: Vector3<f64>) -> Self {
        self.orient = [x, y, z];
        self
    }

    /// Cell vectors of a custom lattice, in units of the scale.
    pub fn cell(mut self, a1: Vector3<f64>, a2: Vector3<f64>, a3: Vector3<f64>) -> Self {
        self.cell = Some([a1, a2, a3]);
        self
    }

    /// Adds a basis point; for named styles it is appended after the preset points.
    pub fn basis(mut self, point: Vector3<f64>) -> Self {
        self.basis.push(point);
        self
    }

    pub fn build(self, dimension: Dimension) -> Result<Lattice, LatticeError> {
        if !self.style.supports(dimension) {
            return Err(LatticeError::DimensionMismatch {
                style: self.style,
                dimension: dimension.count(),
            });
        }
        if !(self.scale > 0.0) {
            return Err(LatticeError::InvalidScale(self.scale));
        }
        if self.style == LatticeStyle::None {
            let to_box = Matrix3::identity() * self.scale;
            return Ok(Lattice {
                to_box,
                to_lattice: Matrix3::identity() / self.scale,
                spacing: Vector3::repeat(self.scale),
                ..Lattice::none()
            });
        }

        let (cell, mut basis): ([Vector3<f64>; 3], Vec<Vector3<f64>>) = match PRESETS.get(self.style.name()) {
            Some(preset) => (
                preset.cell.map(Vector3::from),
                preset.basis.iter().map(|b| Vector3::from(*b)).collect(),
            ),
            None => (self.cell.unwrap_or(UNIT_CELL.map(Vector3::from)), Vec::new()),
        };
        basis.extend(self.basis.iter().copied());
        if basis.is_empty() {
            return Err(LatticeError::EmptyBasis);
        }
        for (index, b) in basis.iter().enumerate() {
            if let Some(&value) = b.iter().find(|v| !(0.0..1.0).contains(*v)) {
                return Err(LatticeError::BasisOutOfCell { index, value });
            }
        }

        let rotation = orientation_matrix(&self.orient)?;
        let a = Matrix3::from_columns(&cell);
        let to_box = rotation * a * self.scale;
        let to_lattice = to_box
            .try_inverse()
            .ok_or(LatticeError::DegenerateCell)?;

        let unit = Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        let spacing = Aabb::from_points(
            unit.corners()
                .iter()
                .map(|c| Point3::from(to_box * c.coords)),
        )
        .map(|b| b.extent())
            .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0));

        Ok(Lattice {
            style: self.style,
            basis,
            to_box,
            to_lattice,
            origin: self.origin,
            spacing,
        })
    }
}

fn orientation_matrix(orient: &[Vector3<f64>; 3]) -> Result<Matrix3<f64>, LatticeError> {
    let [x, y, z] = orient;
    let tol = 1e-10;
    if orient.iter().any(|v| v.norm() < tol)
        || x.dot(y).abs() > tol
        || x.dot(z).abs() > tol
        || y.dot(z).abs() > tol
        || x.cross(y).dot(z) <= 0.0
    {
        return Err(LatticeError::InvalidOrientation);
    }
    Ok(Matrix3::from_rows(&[
        x.normalize().transpose(),
        y.normalize().transpose(),
        z.normalize().transpose(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &Point3<f64>, b: &Point3<f64>) {
        assert!((a - b).norm() < 1e-12, "{:?} != {:?}", a, b);
    }

    #[test]
    fn style_parses_case_insensitively() {
        assert_eq!("FCC".parse::<LatticeStyle>().unwrap(), LatticeStyle::Fcc);
        assert_eq!("sq2".parse::<LatticeStyle>().unwrap(), LatticeStyle::Sq2);
        assert!(matches!(
            "bogus".parse::<LatticeStyle>(),
            Err(LatticeError::UnknownStyle(_))
        ));
    }

    #[test]
    fn styles_are_restricted_by_dimension() {
        assert!(LatticeStyle::Fcc.supports(Dimension::Three));
        assert!(!LatticeStyle::Fcc.supports(Dimension::Two));
        assert!(LatticeStyle::Hex.supports(Dimension::Two));
        assert!(!LatticeStyle::Sq.supports(Dimension::Three));
        assert!(LatticeStyle::Custom.supports(Dimension::Two));

        let err = Lattice::builder(LatticeStyle::Sq, 1.0)
            .build(Dimension::Three)
            .unwrap_err();
        assert!(matches!(err, LatticeError::DimensionMismatch { dimension: 3, .. }));
    }

    #[test]
    fn presets_have_expected_basis_sizes() {
        let count = |style| {
            let dim = if matches!(style, LatticeStyle::Sq | LatticeStyle::Sq2 | LatticeStyle::Hex) {
                Dimension::Two
            } else {
                Dimension::Three
            };
            Lattice::builder(style, 1.0).build(dim).unwrap().basis_len()
        };
        assert_eq!(count(LatticeStyle::Sc), 1);
        assert_eq!(count(LatticeStyle::Bcc), 2);
        assert_eq!(count(LatticeStyle::Fcc), 4);
        assert_eq!(count(LatticeStyle::Hcp), 4);
        assert_eq!(count(LatticeStyle::Diamond), 8);
        assert_eq!(count(LatticeStyle::Sq), 1);
        assert_eq!(count(LatticeStyle::Sq2), 2);
        assert_eq!(count(LatticeStyle::Hex), 2);
    }

    #[test]
    fn scaled_fcc_sites_and_spacing() {
        let lattice = Lattice::builder(LatticeStyle::Fcc, 2.0)
            .build(Dimension::Three)
            .unwrap();
        assert_close(&lattice.site([1, 0, 0], 1), &Point3::new(3.0, 1.0, 0.0));
        assert!((lattice.spacing() - Vector3::new(2.0, 2.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn hcp_spacing_follows_cell_shape() {
        let lattice = Lattice::builder(LatticeStyle::Hcp, 1.0)
            .build(Dimension::Three)
            .unwrap();
        assert!((lattice.spacing().y - SQRT_3).abs() < 1e-12);
        assert!((lattice.spacing().z - SQRT_8_3).abs() < 1e-12);
    }

    #[test]
    fn box_and_lattice_transforms_are_inverse() {
        let lattice = Lattice::builder(LatticeStyle::Sc, 1.5)
            .origin(Vector3::new(0.25, 0.0, 0.5))
            .orient(
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(-1.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
            )
            .build(Dimension::Three)
            .unwrap();
        let p = Point3::new(1.0, -2.0, 3.5);
        assert_close(&lattice.box_to_lattice(&lattice.lattice_to_box(&p)), &p);
    }

    #[test]
    fn rotated_orientation_maps_lattice_axes() {
        let lattice = Lattice::builder(LatticeStyle::Sc, 1.0)
            .orient(
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
                Vector3::new(1.0, 0.0, 0.0),
            )
            .build(Dimension::Three)
            .unwrap();
        // Box x points along lattice y.
        assert_close(&lattice.site([0, 1, 0], 0), &Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn invalid_orientation_is_rejected() {
        let err = Lattice::builder(LatticeStyle::Sc, 1.0)
            .orient(
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(0.0, 0.0, 1.0),
            )
            .build(Dimension::Three)
            .unwrap_err();
        assert_eq!(err, LatticeError::InvalidOrientation);

        let left_handed = Lattice::builder(LatticeStyle::Sc, 1.0)
            .orient(Vector3::x(), Vector3::y(), -Vector3::z())
            .build(Dimension::Three);
        assert!(left_handed.is_err());
    }

    #[test]
    fn custom_lattice_needs_basis_inside_cell() {
        let err = Lattice::builder(LatticeStyle::Custom, 1.0)
            .build(Dimension::Three)
            .unwrap_err();
        assert_eq!(err, LatticeError::EmptyBasis);

        let err = Lattice::builder(LatticeStyle::Custom, 1.0)
            .basis(Vector3::new(0.0, 1.0, 0.0))
            .build(Dimension::Three)
            .unwrap_err();
        assert!(matches!(err, LatticeError::BasisOutOfCell { index: 0, .. }));

        let lattice = Lattice::builder(LatticeStyle::Custom, 1.0)
            .cell(Vector3::new(2.0, 0.0, 0.0), Vector3::y(), Vector3::z())
            .basis(Vector3::zeros())
            .build(Dimension::Three)
            .unwrap();
        assert_close(&lattice.site([1, 0, 0], 0), &Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn none_lattice_has_no_sites() {
        let lattice = Lattice::builder(LatticeStyle::None, 1.0)
            .build(Dimension::Three)
            .unwrap();
        assert_eq!(lattice.basis_len(), 0);
        assert_eq!(*lattice.spacing(), Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(lattice, Lattice::none());
    }

    #[test]
    fn none_lattice_keeps_its_scale_as_spacing() {
        let lattice = Lattice::builder(LatticeStyle::None, 2.5)
            .build(Dimension::Two)
            .unwrap();
        assert_eq!(lattice.basis_len(), 0);
        assert_eq!(*lattice.spacing(), Vector3::new(2.5, 2.5, 2.5));
        assert_close(
            &lattice.lattice_to_box(&Point3::new(1.0, 2.0, 0.0)),
            &Point3::new(2.5, 5.0, 0.0),
        );

        let err = Lattice::builder(LatticeStyle::None, 0.0)
            .build(Dimension::Three)
            .unwrap_err();
        assert!(matches!(err, LatticeError::InvalidScale(s) if s == 0.0));
    }
}
