//! Form geometry: the active collision box and its raycast origins.

use rapier2d::math::Vector;
use rapier2d::prelude::Real;
use thiserror::Error;

/// Margin between the collision box and the raycast origins.
pub const RAYCAST_INSET: Real = 0.015;
/// Minimum rays per face (the two corners).
pub const MIN_RAYS: usize = 2;

pub(crate) const TL: usize = 0;
pub(crate) const TR: usize = 1;
pub(crate) const BL: usize = 2;
pub(crate) const BR: usize = 3;

/// A box an entity can assume, relative to the entity position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FormShape {
    pub center: Vector<Real>,
    pub half_extents: Vector<Real>,
}

impl FormShape {
    pub fn new(center: Vector<Real>, half_extents: Vector<Real>) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// A box centered on the entity position.
    pub fn centered(width: Real, height: Real) -> Self {
        Self::new(Vector::zeros(), Vector::new(width * 0.5, height * 0.5))
    }

    fn is_boundable(&self) -> bool {
        self.center.iter().all(|value| value.is_finite())
            && self.half_extents.iter().all(|value| value.is_finite())
            && self.half_extents.x > RAYCAST_INSET
            && self.half_extents.y > RAYCAST_INSET
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FormError {
    #[error("entity has no forms")]
    NoForms,
    #[error("form is not boundable (center {center:?}, half extents {half_extents:?})")]
    Unboundable {
        center: [Real; 2],
        half_extents: [Real; 2],
    },
    #[error("form index {index} out of range ({available} available)")]
    InvalidIndex { index: usize, available: usize },
}

/// Raycast layout for one form. Replaced wholesale whenever the form or precision changes.
#[derive(Clone, Debug)]
pub struct FormGeometry {
    shape: FormShape,
    inset_half_extents: Vector<Real>,
    corners: [Vector<Real>; 4],
    base_points: Vec<Vector<Real>>,
    height_points: Vec<Vector<Real>>,
}

impl FormGeometry {
    /// Builds the layout. Precision values below [`MIN_RAYS`] are clamped up.
    pub fn new(
        shape: FormShape,
        base_precision: usize,
        height_precision: usize,
    ) -> Result<Self, FormError> {
        if !shape.is_boundable() {
            return Err(FormError::Unboundable {
                center: [shape.center.x, shape.center.y],
                half_extents: [shape.half_extents.x, shape.half_extents.y],
            });
        }
        let base_precision = base_precision.max(MIN_RAYS);
        let height_precision = height_precision.max(MIN_RAYS);
        let extents = shape.half_extents - Vector::repeat(RAYCAST_INSET);

        let mut corners = [Vector::zeros(); 4];
        corners[TL] = Vector::new(-extents.x, extents.y);
        corners[TR] = Vector::new(extents.x, extents.y);
        corners[BL] = Vector::new(-extents.x, -extents.y);
        corners[BR] = Vector::new(extents.x, -extents.y);

        let base_spacing = extents.x * 2.0 / (base_precision - 1) as Real;
        let height_spacing = extents.y * 2.0 / (height_precision - 1) as Real;
        let base_points = (0..base_precision)
            .map(|i| Vector::new(base_spacing * i as Real - extents.x, extents.y))
            .collect();
        let height_points = (0..height_precision)
            .map(|i| Vector::new(extents.x, height_spacing * i as Real - extents.y))
            .collect();

        Ok(Self {
            shape,
            inset_half_extents: extents,
            corners,
            base_points,
            height_points,
        })
    }

    pub fn shape(&self) -> FormShape {
        self.shape
    }

    pub fn center(&self) -> Vector<Real> {
        self.shape.center
    }

    pub fn half_extents(&self) -> Vector<Real> {
        self.shape.half_extents
    }

    /// Half extents after the inset has been removed from every side.
    pub fn inset_half_extents(&self) -> Vector<Real> {
        self.inset_half_extents
    }

    /// Corners in TL, TR, BL, BR order.
    pub fn corners(&self) -> &[Vector<Real>; 4] {
        &self.corners
    }

    /// Points along the top edge, left to right.
    pub fn base_points(&self) -> &[Vector<Real>] {
        &self.base_points
    }

    /// Points along the right edge, bottom to top.
    pub fn height_points(&self) -> &[Vector<Real>] {
        &self.height_points
    }

    pub fn base_precision(&self) -> usize {
        self.base_points.len()
    }

    pub fn height_precision(&self) -> usize {
        self.height_points.len()
    }

    /// Origins facing the travel direction given as a sign pair.
    ///
    /// Order is corners (TL, TR, BL, BR), then the interior of the X face bottom to top,
    /// then the interior of the Y face left to right. Ties between equal hits resolve by
    /// this order.
    pub fn facing_origins(&self, signs: (i8, i8)) -> Vec<Vector<Real>> {
        let (sx, sy) = signs;
        let mut use_corner = [false; 4];
        if sx > 0 {
            use_corner[TR] = true;
            use_corner[BR] = true;
        } else if sx < 0 {
            use_corner[TL] = true;
            use_corner[BL] = true;
        }
        if sy > 0 {
            use_corner[TL] = true;
            use_corner[TR] = true;
        } else if sy < 0 {
            use_corner[BL] = true;
            use_corner[BR] = true;
        }

        let mut origins: Vec<Vector<Real>> = self
            .corners
            .iter()
            .zip(use_corner)
            .filter(|(_, used)| *used)
            .map(|(corner, _)| *corner)
            .collect();

        if sx != 0 {
            let flip = Real::from(sx.signum());
            let interior = &self.height_points[1..self.height_points.len() - 1];
            origins.extend(interior.iter().map(|p| Vector::new(p.x * flip, p.y)));
        }
        if sy != 0 {
            let flip = Real::from(sy.signum());
            let interior = &self.base_points[1..self.base_points.len() - 1];
            origins.extend(interior.iter().map(|p| Vector::new(p.x, p.y * flip)));
        }
        origins
    }
}
