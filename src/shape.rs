//! Convex collision primitives: bounds, support function, and local inertia.

use std::sync::Arc;

use arrayvec::ArrayVec;
use vek::{Aabb, Vec3};

/// Maximum vertices a [`Shape::Polytope`] may carry.
pub const MAX_POLYTOPE_VERTICES: usize = 64;
/// Maximum triangular faces a [`Shape::Polytope`] may carry.
pub const MAX_POLYTOPE_FACES: usize = 128;
/// Maximum sub-shapes in a [`Shape::Compound`].
pub const MAX_COMPOUND_SHAPES: usize = 16;

/// A triangular face of a [`Polytope`], as three indices into its vertex array.
pub type Face = [u32; 3];

/// Convex hull described by an explicit vertex and face list.
#[derive(Debug, Clone, PartialEq)]
pub struct Polytope {
    /// Vertices, in local (model) space.
    pub vertices: ArrayVec<Vec3<f64>, MAX_POLYTOPE_VERTICES>,
    /// Triangular faces, each three indices into `vertices`.
    pub faces: ArrayVec<Face, MAX_POLYTOPE_FACES>,
}

impl Polytope {
    /// Build a polytope, validating that every face index is in range.
    pub fn new(
        vertices: ArrayVec<Vec3<f64>, MAX_POLYTOPE_VERTICES>,
        faces: ArrayVec<Face, MAX_POLYTOPE_FACES>,
    ) -> Self {
        debug_assert!(faces.iter().all(|f| f.iter().all(|&i| (i as usize) < vertices.len())),
            "polytope face references out-of-range vertex");

        Self { vertices, faces }
    }

    fn support(&self, dir: Vec3<f64>) -> Vec3<f64> {
        self.vertices
            .iter()
            .copied()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                let pa = a.dot(dir);
                let pb = b.dot(dir);
                pa.partial_cmp(&pb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ib.cmp(ia))
            })
            .map(|(_, v)| v)
            .unwrap_or(Vec3::zero())
    }

    fn local_aabb(&self) -> Aabb<f64> {
        aabb_of_points(self.vertices.iter().copied())
    }
}

/// Which primitive a [`Shape`] is.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Sphere of the given radius, centred on the local origin.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Axis-aligned (in local space) box with the given half-extents.
    Box {
        /// Half-extent along each local axis.
        half_extents: Vec3<f64>,
    },
    /// Cylinder with its axis along local Y, radius `radius`, half-height `half_height`.
    Cylinder {
        /// Radius of the circular cross-section.
        radius: f64,
        /// Half of the cylinder's length.
        half_height: f64,
    },
    /// Arbitrary convex polytope.
    Polytope(Polytope),
    /// Single triangle, treated as a degenerate (zero-thickness) polytope.
    Triangle {
        /// The three vertices, in local space.
        vertices: [Vec3<f64>; 3],
    },
    /// Flat array of rigidly-placed sub-shapes, tested independently against a counterpart.
    Compound(ArrayVec<(Iso3Local, Arc<Shape>), MAX_COMPOUND_SHAPES>),
}

/// A local rigid placement of a sub-shape within a [`Shape::Compound`].
///
/// Kept distinct from [`crate::math::Iso3`] (which is always a world-space pose) to make clear
/// this offset is fixed relative to the owning body, not independently integrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iso3Local {
    /// Offset of the sub-shape's local origin from the compound's local origin.
    pub offset: Vec3<f64>,
}

impl Shape {
    /// Convenience constructor for [`Shape::Sphere`].
    pub fn sphere(radius: f64) -> Arc<Self> {
        Arc::new(Self::Sphere { radius })
    }

    /// Convenience constructor for [`Shape::Box`].
    pub fn cuboid(half_extents: Vec3<f64>) -> Arc<Self> {
        Arc::new(Self::Box { half_extents })
    }

    /// Convenience constructor for [`Shape::Cylinder`].
    pub fn cylinder(radius: f64, half_height: f64) -> Arc<Self> {
        Arc::new(Self::Cylinder {
            radius,
            half_height,
        })
    }

    /// Support point in local space: the shape's extreme vertex along `dir`.
    ///
    /// Ties are broken towards the lowest index for shapes with an explicit vertex list, so the
    /// function is deterministic for callers that depend on stable contact points frame to
    /// frame.
    pub fn support(&self, dir: Vec3<f64>) -> Vec3<f64> {
        match self {
            Self::Sphere { radius } => {
                let d = safe_normalize(dir);
                d * *radius
            }
            Self::Box { half_extents } => Vec3::new(
                half_extents.x.copysign(dir.x),
                half_extents.y.copysign(dir.y),
                half_extents.z.copysign(dir.z),
            ),
            Self::Cylinder {
                radius,
                half_height,
            } => {
                let y = half_height.copysign(dir.y);
                let radial = Vec3::new(dir.x, 0.0, dir.z);
                let radial = safe_normalize(radial) * *radius;
                Vec3::new(radial.x, y, radial.z)
            }
            Self::Polytope(p) => p.support(dir),
            Self::Triangle { vertices } => *vertices
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| {
                    a.dot(dir)
                        .partial_cmp(&b.dot(dir))
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(ib.cmp(ia))
                })
                .map(|(_, v)| v)
                .unwrap(),
            Self::Compound(shapes) => {
                let mut best = None;
                let mut best_proj = f64::NEG_INFINITY;
                for (placement, shape) in shapes {
                    let local_support = shape.support(dir) + placement.offset;
                    let proj = local_support.dot(dir);
                    if proj > best_proj {
                        best_proj = proj;
                        best = Some(local_support);
                    }
                }
                best.unwrap_or(Vec3::zero())
            }
        }
    }

    /// Projected half-extent of the shape along `axis` (assumed normalized).
    ///
    /// Generalizes a box's `half_extents` projection to any convex shape via its support
    /// function: `0.5 * (support(n)*n - support(-n)*n)`, which reduces exactly to the box
    /// formula when the shape is a box.
    pub fn projected_half_extent(&self, axis: Vec3<f64>) -> f64 {
        match self {
            Self::Box { half_extents } => {
                half_extents.x * axis.x.abs() + half_extents.y * axis.y.abs()
                    + half_extents.z * axis.z.abs()
            }
            _ => {
                let hi = self.support(axis).dot(axis);
                let lo = self.support(-axis).dot(axis);
                0.5 * (hi - lo)
            }
        }
    }

    /// The three local coordinate axes used as SAT candidate axes for box-like shapes.
    pub fn local_axes(&self) -> [Vec3<f64>; 3] {
        [Vec3::unit_x(), Vec3::unit_y(), Vec3::unit_z()]
    }

    /// Bounding box in local (model) space.
    pub fn local_aabb(&self) -> Aabb<f64> {
        match self {
            Self::Sphere { radius } => Aabb {
                min: Vec3::broadcast(-*radius),
                max: Vec3::broadcast(*radius),
            },
            Self::Box { half_extents } => Aabb {
                min: -*half_extents,
                max: *half_extents,
            },
            Self::Cylinder {
                radius,
                half_height,
            } => Aabb {
                min: Vec3::new(-*radius, -*half_height, -*radius),
                max: Vec3::new(*radius, *half_height, *radius),
            },
            Self::Polytope(p) => p.local_aabb(),
            Self::Triangle { vertices } => aabb_of_points(vertices.iter().copied()),
            Self::Compound(shapes) => {
                let mut result: Option<Aabb<f64>> = None;
                for (placement, shape) in shapes {
                    let sub = shape.local_aabb();
                    let sub = Aabb {
                        min: sub.min + placement.offset,
                        max: sub.max + placement.offset,
                    };
                    result = Some(match result {
                        Some(r) => Aabb {
                            min: Vec3::partial_min(r.min, sub.min),
                            max: Vec3::partial_max(r.max, sub.max),
                        },
                        None => sub,
                    });
                }
                result.unwrap_or(Aabb {
                    min: Vec3::zero(),
                    max: Vec3::zero(),
                })
            }
        }
    }
}

fn safe_normalize(v: Vec3<f64>) -> Vec3<f64> {
    let len_sq = v.magnitude_squared();
    if len_sq > 1e-18 {
        v / len_sq.sqrt()
    } else {
        Vec3::unit_y()
    }
}

fn aabb_of_points(points: impl IntoIterator<Item = Vec3<f64>>) -> Aabb<f64> {
    let mut min = Vec3::broadcast(f64::INFINITY);
    let mut max = Vec3::broadcast(f64::NEG_INFINITY);
    for p in points {
        min = Vec3::partial_min(min, p);
        max = Vec3::partial_max(max, p);
    }
    Aabb { min, max }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn box_support_picks_correct_corner() {
        let shape = Shape::Box {
            half_extents: Vec3::new(1.0, 2.0, 3.0),
        };
        let p = shape.support(Vec3::new(1.0, -1.0, 1.0));
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, -2.0);
        assert_relative_eq!(p.z, 3.0);
    }

    #[test]
    fn sphere_support_is_radius_in_direction() {
        let shape = Shape::Sphere { radius: 2.5 };
        let p = shape.support(Vec3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(p.y, 2.5, epsilon = 1e-9);
    }

    #[test]
    fn box_projected_half_extent_matches_axis_aligned_formula() {
        let shape = Shape::Box {
            half_extents: Vec3::new(1.0, 2.0, 3.0),
        };
        assert_relative_eq!(shape.projected_half_extent(Vec3::unit_x()), 1.0);
        assert_relative_eq!(shape.projected_half_extent(Vec3::unit_z()), 3.0);
    }

    #[test]
    fn sphere_local_aabb_is_symmetric() {
        let shape = Shape::Sphere { radius: 3.0 };
        let aabb = shape.local_aabb();
        assert_relative_eq!(aabb.min.x, -3.0);
        assert_relative_eq!(aabb.max.x, 3.0);
    }
}
