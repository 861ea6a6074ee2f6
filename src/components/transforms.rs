use geo::{AffineTransform, Coord};
use shrinkwraprs::Shrinkwrap;

use crate::errors::{LandCoverError, Result};

/// Pixel to world affine transform of a band.
///
/// Built from the six GDAL style coefficients
/// `[x_origin, x_res, row_rot, y_origin, col_rot, y_res]`, i.e. the matrix
///
/// ```text
/// | x_res   row_rot  x_origin |
/// | col_rot y_res    y_origin |
/// | 0       0        1        |
/// ```
///
/// The sign of `y_res` depends on the product: north-up bands carry a
/// negative value, the screen transform published after a batch a fixed `-1`,
/// some products a positive one.
#[derive(Shrinkwrap, Debug, Clone, Copy)]
pub struct GeoTransform(AffineTransform);

impl PartialEq for GeoTransform {
    fn eq(&self, other: &Self) -> bool {
        self.to_gdal() == other.to_gdal()
    }
}

impl GeoTransform {
    pub fn from_gdal(coefficients: [f64; 6]) -> Result<Self> {
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(LandCoverError::NonFiniteTransform(coefficients));
        }
        let [x_origin, x_res, row_rot, y_origin, col_rot, y_res] = coefficients;
        Ok(Self(AffineTransform::new(
            x_res, row_rot, x_origin, col_rot, y_res, y_origin,
        )))
    }

    /// Screen to world transform with unit resolution and a flipped
    /// vertical axis, keeping origin and rotation of `coefficients`.
    pub fn unit_screen(coefficients: [f64; 6]) -> Result<Self> {
        let [x_origin, _, row_rot, y_origin, col_rot, _] = coefficients;
        Self::from_gdal([x_origin, 1., row_rot, y_origin, col_rot, -1.])
    }

    pub fn identity() -> Self {
        Self(AffineTransform::identity())
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.xoff(),
            self.a(),
            self.b(),
            self.yoff(),
            self.d(),
            self.e(),
        ]
    }

    /// Homogeneous 3x3 matrix, row major.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.a(), self.b(), self.xoff()],
            [self.d(), self.e(), self.yoff()],
            [0., 0., 1.],
        ]
    }

    /// Signed `(x, y)` resolution.
    pub fn resolution(&self) -> (f64, f64) {
        (self.a(), self.e())
    }

    pub fn pixel_to_world(&self, col: f64, row: f64) -> Coord {
        self.0.apply(Coord { x: col, y: row })
    }

    pub fn world_to_pixel(&self, world: Coord) -> Result<Coord> {
        Ok(self.inverse()?.apply(world))
    }

    /// World to pixel transform.
    pub fn inverse(&self) -> Result<AffineTransform> {
        let determinant = self.a() * self.e() - self.b() * self.d();
        if determinant == 0. || !determinant.is_finite() {
            return Err(LandCoverError::SingularTransform);
        }
        self.0.inverse().ok_or(LandCoverError::SingularTransform)
    }

    pub fn upper_left(&self) -> Coord {
        self.pixel_to_world(0., 0.)
    }

    /// World position of the far corner of a `(width, height)` raster.
    pub fn bottom_right(&self, shape: (usize, usize)) -> Coord {
        self.pixel_to_world(shape.0 as f64, shape.1 as f64)
    }
}
