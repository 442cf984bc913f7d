//! Convex-convex contact generation via the separating axis theorem (SAT).
//!
//! Candidate axes are each shape's local axes plus the nine pairwise cross products of those
//! axes. The axis with the smallest positive overlap (the minimum translation axis) is picked as
//! the contact normal; the number of near-zero-projection axes on each side classifies that
//! side's contact feature as a vertex (0 zero-axes), edge (1), or face (2), which selects how the
//! contact point is generated: vertex/face projects the vertex onto the face plane, edge/edge
//! takes the closest point between the two edge segments, and face/face (or edge/face) clips one
//! feature against the other's side planes and reports the centroid of what remains.
//!
//! Sphere and cylinder shapes are treated with dedicated closest-point paths rather than run
//! through the general polytope clipper, since their curved surfaces make "feature
//! classification by zero-projection axis count" degenerate.

use arrayvec::ArrayVec;
use itertools::iproduct;
use vek::Vec3;

use crate::{body::RigidBody, material::MaterialId, shape::Shape};

/// Maximum contact points carried in one manifold.
pub const MAX_CONTACT_POINTS: usize = 4;

/// Threshold below which an axis projection is treated as zero, used to classify a shape's
/// contact feature (corner / edge / face) during SAT.
const ZERO_PROJECTION_EPS: f64 = 1e-6;

/// A single point of contact between two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// Contact point on body A, in A's local frame.
    pub local_point_a: Vec3<f64>,
    /// Contact point on body B, in B's local frame.
    pub local_point_b: Vec3<f64>,
    /// Penetration depth along the manifold normal, `>= 0` while in contact.
    pub depth: f64,
    /// Reserved for a future swept-contact pass; always `0.0` today.
    pub fraction: f64,
}

/// Contact manifold between an unordered pair of bodies.
#[derive(Debug, Clone)]
pub struct ContactManifold {
    /// World-space normal, pointing from body A towards body B.
    pub normal: Vec3<f64>,
    /// Up to [`MAX_CONTACT_POINTS`] contact points.
    pub points: ArrayVec<ContactPoint, MAX_CONTACT_POINTS>,
    /// Material of body A's surface at the contact.
    pub material_a: MaterialId,
    /// Material of body B's surface at the contact.
    pub material_b: MaterialId,
}

impl ContactManifold {
    fn single(normal: Vec3<f64>, point_a: Vec3<f64>, point_b: Vec3<f64>, depth: f64) -> Self {
        let mut points = ArrayVec::new();
        points.push(ContactPoint {
            local_point_a: point_a,
            local_point_b: point_b,
            depth,
            fraction: 0.0,
        });
        Self {
            normal,
            points,
            material_a: 0,
            material_b: 0,
        }
    }
}

/// Run narrowphase collision detection between two bodies, returning `None` if their shapes are
/// separated.
pub fn collide(a: &RigidBody, b: &RigidBody) -> Option<ContactManifold> {
    let mut manifold = match (a.shape.as_ref(), b.shape.as_ref()) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(a, *ra, b, *rb)
        }
        (Shape::Sphere { radius }, Shape::Triangle { vertices }) => {
            sphere_triangle(a, *radius, b, *vertices, false)
        }
        (Shape::Triangle { vertices }, Shape::Sphere { radius }) => {
            sphere_triangle(b, *radius, a, *vertices, true)
        }
        (Shape::Sphere { radius }, _) => sphere_convex(a, *radius, b, false),
        (_, Shape::Sphere { radius }) => sphere_convex(b, *radius, a, true),
        _ => sat_convex(a, b),
    }?;

    manifold.material_a = a.material_id;
    manifold.material_b = b.material_id;
    Some(manifold)
}

fn sphere_sphere(a: &RigidBody, ra: f64, b: &RigidBody, rb: f64) -> Option<ContactManifold> {
    let ca = a.pose.translation;
    let cb = b.pose.translation;
    let delta = cb - ca;
    let dist = delta.magnitude();
    let depth = ra + rb - dist;
    if depth < 0.0 {
        return None;
    }

    let normal = if dist > 1e-9 {
        delta / dist
    } else {
        Vec3::unit_y()
    };

    let world_a = ca + normal * ra;
    let world_b = cb - normal * rb;
    let local_a = a.pose.inverse_transform_point(world_a);
    let local_b = b.pose.inverse_transform_point(world_b);

    Some(ContactManifold::single(normal, local_a, local_b, depth))
}

/// Sphere against an arbitrary convex shape via the shape's support function: the sphere centre
/// in the convex shape's local frame finds its closest support direction, and the manifold
/// normal/order is un-swapped via `swapped` so the caller can pass either argument order.
fn sphere_convex(
    sphere_body: &RigidBody,
    radius: f64,
    convex_body: &RigidBody,
    swapped: bool,
) -> Option<ContactManifold> {
    let local_centre = convex_body
        .pose
        .inverse_transform_point(sphere_body.pose.translation);

    let dir = if local_centre.magnitude_squared() > 1e-12 {
        local_centre.normalized()
    } else {
        Vec3::unit_y()
    };
    let local_support = convex_body.shape.support(dir);

    let world_support = convex_body.pose.transform_point(local_support);
    let to_sphere = sphere_body.pose.translation - world_support;
    let dist = to_sphere.magnitude();

    // Approximate: treat the support point as the closest point on the convex surface to the
    // sphere centre. Exact for sphere-vs-sphere-like rounded shapes; a conservative estimate for
    // boxes/polytopes, consistent with the reduced-scope sphere short-circuit this module takes.
    let depth = radius - dist;
    if depth < 0.0 {
        return None;
    }

    let normal_convex_to_sphere = if dist > 1e-9 {
        to_sphere / dist
    } else {
        Vec3::unit_y()
    };

    let world_on_sphere = sphere_body.pose.translation - normal_convex_to_sphere * radius;

    let (normal, local_a, local_b) = if swapped {
        // caller's "A" is convex_body, "B" is sphere_body
        (
            -normal_convex_to_sphere,
            convex_body.pose.inverse_transform_point(world_support),
            sphere_body.pose.inverse_transform_point(world_on_sphere),
        )
    } else {
        (
            normal_convex_to_sphere,
            sphere_body
                .pose
                .inverse_transform_point(world_on_sphere),
            convex_body.pose.inverse_transform_point(world_support),
        )
    };

    Some(ContactManifold::single(normal, local_a, local_b, depth))
}

/// Sphere against a triangle via closest-point-on-triangle (Ericson, "Real-Time Collision
/// Detection" 5.1.5) rather than the support-vertex approximation `sphere_convex` uses: a
/// triangle's vertices all lie in its own plane, so a vertex-support function can never return an
/// interior point and would treat every sphere sitting on the middle of a large triangle as
/// touching one of its three corners instead.
fn sphere_triangle(
    sphere_body: &RigidBody,
    radius: f64,
    tri_body: &RigidBody,
    vertices: [Vec3<f64>; 3],
    swapped: bool,
) -> Option<ContactManifold> {
    let local_centre = tri_body
        .pose
        .inverse_transform_point(sphere_body.pose.translation);
    let local_closest = closest_point_on_triangle(local_centre, vertices);
    let world_closest = tri_body.pose.transform_point(local_closest);

    let to_sphere = sphere_body.pose.translation - world_closest;
    let dist = to_sphere.magnitude();
    let depth = radius - dist;
    if depth < 0.0 {
        return None;
    }

    let normal_tri_to_sphere = if dist > 1e-9 {
        to_sphere / dist
    } else {
        let face_normal = (vertices[1] - vertices[0])
            .cross(vertices[2] - vertices[0])
            .normalized();
        tri_body.pose.transform_vector(face_normal)
    };

    let world_on_sphere = sphere_body.pose.translation - normal_tri_to_sphere * radius;

    let (normal, local_a, local_b) = if swapped {
        (
            -normal_tri_to_sphere,
            tri_body.pose.inverse_transform_point(world_closest),
            sphere_body.pose.inverse_transform_point(world_on_sphere),
        )
    } else {
        (
            normal_tri_to_sphere,
            sphere_body.pose.inverse_transform_point(world_on_sphere),
            tri_body.pose.inverse_transform_point(world_closest),
        )
    };

    Some(ContactManifold::single(normal, local_a, local_b, depth))
}

/// Closest point on triangle `abc` to `p`, via barycentric region tests (Ericson 5.1.5).
fn closest_point_on_triangle(p: Vec3<f64>, [a, b, c]: [Vec3<f64>; 3]) -> Vec3<f64> {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

/// Which feature of a convex shape meets the contact normal: a vertex (no local axis lies in the
/// contact plane), an edge (one axis lies in it), or a face (two axes lie in it). Mirrors the
/// `Overlap` DOF count `PHCollider` derives from the same zero-projection-axis test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feature {
    Vertex,
    Edge { along: usize },
    Face { tangent: [usize; 2] },
}

fn classify(axes: [Vec3<f64>; 3], normal: Vec3<f64>) -> Feature {
    let mut zero_axes: ArrayVec<usize, 3> = ArrayVec::new();
    for (i, axis) in axes.iter().enumerate() {
        if axis.dot(normal).abs() < ZERO_PROJECTION_EPS {
            zero_axes.push(i);
        }
    }
    match zero_axes.len() {
        0 => Feature::Vertex,
        1 => Feature::Edge { along: zero_axes[0] },
        _ => Feature::Face {
            tangent: [zero_axes[0], zero_axes[1]],
        },
    }
}

/// Half-extent of `shape` along each of its own local axes, in the shape's local frame.
fn axis_half_extents(shape: &Shape) -> [f64; 3] {
    let local = shape.local_axes();
    [
        shape.projected_half_extent(local[0]),
        shape.projected_half_extent(local[1]),
        shape.projected_half_extent(local[2]),
    ]
}

/// World-space point on a body's contact feature: starts at the body's centre and, for each
/// local axis whose projection onto `normal` is non-zero, shifts by that axis's half-extent
/// towards (body A) or away from (body B, `invert`) the normal. Axes in the contact plane are
/// left untouched, which is what keeps an edge or face contact centred instead of collapsing to
/// a corner the way `Shape::support` would (it always picks a definite sign for a zero
/// component).
fn overlap_point(
    centre: Vec3<f64>,
    axes: [Vec3<f64>; 3],
    half_extents: [f64; 3],
    normal: Vec3<f64>,
    invert: bool,
) -> Vec3<f64> {
    let mut point = centre;
    for k in 0..3 {
        let proj = normal.dot(axes[k]);
        if proj.abs() < ZERO_PROJECTION_EPS {
            continue;
        }
        let sign = if proj >= 0.0 { 1.0 } else { -1.0 };
        let sign = if invert { -sign } else { sign };
        point += axes[k] * (half_extents[k] * sign);
    }
    point
}

/// Clips the segment `start..end` against the half-space behind the plane through `pt` with
/// outward normal `normal`, keeping the side where `dot(p - pt, normal) <= 0`.
fn clip_segment(start: &mut Vec3<f64>, end: &mut Vec3<f64>, pt: Vec3<f64>, normal: Vec3<f64>) {
    let d1 = (*start - pt).dot(normal);
    let d2 = (*end - pt).dot(normal);
    if (d1 >= 0.0) == (d2 >= 0.0) {
        return;
    }
    if (d1 - d2).abs() < 1e-12 {
        return;
    }
    let t = d1 / (d1 - d2);
    let clipped = *start + (*end - *start) * t;
    if d1 >= 0.0 {
        *start = clipped;
    } else {
        *end = clipped;
    }
}

/// Closest pair of points between segments `p1..q1` and `p2..q2` (Ericson's clamped-parametric
/// algorithm). Used in place of the original engine's edge-normal projection formula, which
/// depends on sign conventions that can't be checked without running the solved geometry.
fn closest_points_on_segments(
    p1: Vec3<f64>,
    q1: Vec3<f64>,
    p2: Vec3<f64>,
    q2: Vec3<f64>,
) -> (Vec3<f64>, Vec3<f64>) {
    const EPS: f64 = 1e-12;
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.dot(d1);
    let e = d2.dot(d2);
    let f = d2.dot(r);

    let (s, t);
    if a <= EPS && e <= EPS {
        return (p1, p2);
    }
    if a <= EPS {
        s = 0.0;
        t = (f / e).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(r);
        if e <= EPS {
            t = 0.0;
            s = (-c / a).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s0 = if denom.abs() > EPS {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t0 = (b * s0 + f) / e;
            if t0 < 0.0 {
                t0 = 0.0;
                s0 = (-c / a).clamp(0.0, 1.0);
            } else if t0 > 1.0 {
                t0 = 1.0;
                s0 = ((b - c) / a).clamp(0.0, 1.0);
            }
            s = s0;
            t = t0;
        }
    }
    (p1 + d1 * s, p2 + d2 * t)
}

fn edge_edge_closest(
    centre_a: Vec3<f64>,
    dir_a: Vec3<f64>,
    half_a: f64,
    centre_b: Vec3<f64>,
    dir_b: Vec3<f64>,
    half_b: f64,
) -> (Vec3<f64>, Vec3<f64>) {
    let p1 = centre_a - dir_a * half_a;
    let q1 = centre_a + dir_a * half_a;
    let p2 = centre_b - dir_b * half_b;
    let q2 = centre_b + dir_b * half_b;
    closest_points_on_segments(p1, q1, p2, q2)
}

/// Clips an edge segment against a face's four side planes and reports the midpoint of what's
/// left, alongside that midpoint projected onto the face's plane along `normal`.
fn edge_face_clip(
    edge_centre: Vec3<f64>,
    edge_dir: Vec3<f64>,
    edge_half: f64,
    face_centre: Vec3<f64>,
    face_axes: [Vec3<f64>; 2],
    face_half: [f64; 2],
    normal: Vec3<f64>,
) -> (Vec3<f64>, Vec3<f64>) {
    let mut start = edge_centre - edge_dir * edge_half;
    let mut end = edge_centre + edge_dir * edge_half;

    for k in 0..2 {
        let axis = face_axes[k];
        let half = face_half[k];
        clip_segment(&mut start, &mut end, face_centre + axis * half, axis);
        clip_segment(&mut start, &mut end, face_centre - axis * half, -axis);
    }

    let mid = (start + end) * 0.5;
    let on_face = mid + normal * (face_centre - mid).dot(normal);
    (mid, on_face)
}

/// Clips face A's four edges against face B's four side planes and averages every surviving
/// endpoint into a single centroid contact point, the same `* 0.125` blending the original
/// engine's commented-out `FaceToFace` used.
fn face_face_clip(
    centre_a: Vec3<f64>,
    axes_a: [Vec3<f64>; 2],
    half_a: [f64; 2],
    centre_b: Vec3<f64>,
    axes_b: [Vec3<f64>; 2],
    half_b: [f64; 2],
    normal: Vec3<f64>,
) -> (Vec3<f64>, Vec3<f64>) {
    let (u, v) = (axes_a[0], axes_a[1]);
    let corners = [
        centre_a + u * half_a[0] + v * half_a[1],
        centre_a + u * half_a[0] - v * half_a[1],
        centre_a - u * half_a[0] - v * half_a[1],
        centre_a - u * half_a[0] + v * half_a[1],
    ];

    let mut sum = Vec3::zero();
    let mut count = 0usize;
    for i in 0..4 {
        let mut start = corners[i];
        let mut end = corners[(i + 1) % 4];
        for k in 0..2 {
            let axis = axes_b[k];
            let half = half_b[k];
            clip_segment(&mut start, &mut end, centre_b + axis * half, axis);
            clip_segment(&mut start, &mut end, centre_b - axis * half, -axis);
        }
        sum += start + end;
        count += 2;
    }

    let centroid = if count > 0 { sum / count as f64 } else { centre_a };
    let on_b = centroid + normal * (centre_b - centroid).dot(normal);
    (centroid, on_b)
}

/// General polytope-like SAT: boxes, polytopes, triangles, and cylinders (approximated by their
/// three local axes for axis purposes) all go through this path.
fn sat_convex(a: &RigidBody, b: &RigidBody) -> Option<ContactManifold> {
    let axes_a = world_axes(a);
    let axes_b = world_axes(b);
    let half_a = axis_half_extents(a.shape.as_ref());
    let half_b = axis_half_extents(b.shape.as_ref());

    let mut candidate_axes: ArrayVec<Vec3<f64>, 15> = ArrayVec::new();
    candidate_axes.extend(axes_a);
    candidate_axes.extend(axes_b);
    for (fa, fb) in iproduct!(axes_a, axes_b) {
        let cross = fa.cross(fb);
        if cross.magnitude_squared() > 1e-10 {
            candidate_axes.push(cross.normalized());
        }
    }

    let centre_delta = b.pose.translation - a.pose.translation;

    let mut min_overlap = f64::INFINITY;
    let mut min_axis = Vec3::unit_y();

    for &axis in &candidate_axes {
        let axis = if axis.dot(centre_delta) < 0.0 { -axis } else { axis };
        let proj_a = a.shape.projected_half_extent(a.pose.inverse_transform_vector(axis));
        let proj_b = b.shape.projected_half_extent(b.pose.inverse_transform_vector(axis));
        let centre_sep = centre_delta.dot(axis);
        let overlap = proj_a + proj_b - centre_sep;

        if overlap < 0.0 {
            return None;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            min_axis = axis;
        }
    }

    let normal = min_axis;

    // Feature classification: the count of each body's local axes whose projection onto the
    // normal is ~zero picks that body's contact feature -- zero zero-axes is a vertex, one is an
    // edge, two is a face -- which in turn selects how the contact point is built below.
    let feature_a = classify(axes_a, normal);
    let feature_b = classify(axes_b, normal);

    let centre_a = a.pose.translation;
    let centre_b = b.pose.translation;

    let (world_a, world_b) = match (feature_a, feature_b) {
        (Feature::Vertex, Feature::Vertex)
        | (Feature::Vertex, Feature::Edge { .. })
        | (Feature::Edge { .. }, Feature::Vertex) => (
            overlap_point(centre_a, axes_a, half_a, normal, false),
            overlap_point(centre_b, axes_b, half_b, normal, true),
        ),

        (Feature::Vertex, Feature::Face { .. }) => {
            let v = overlap_point(centre_a, axes_a, half_a, normal, false);
            let f = overlap_point(centre_b, axes_b, half_b, normal, true);
            (v, v + normal * (f - v).dot(normal))
        }
        (Feature::Face { .. }, Feature::Vertex) => {
            let v = overlap_point(centre_b, axes_b, half_b, normal, true);
            let f = overlap_point(centre_a, axes_a, half_a, normal, false);
            (v + normal * (f - v).dot(normal), v)
        }

        (Feature::Edge { along: ia }, Feature::Edge { along: ib }) => edge_edge_closest(
            centre_a, axes_a[ia], half_a[ia], centre_b, axes_b[ib], half_b[ib],
        ),

        (Feature::Edge { along }, Feature::Face { tangent }) => {
            let edge_centre = overlap_point(centre_a, axes_a, half_a, normal, false);
            let face_centre = overlap_point(centre_b, axes_b, half_b, normal, true);
            edge_face_clip(
                edge_centre,
                axes_a[along],
                half_a[along],
                face_centre,
                [axes_b[tangent[0]], axes_b[tangent[1]]],
                [half_b[tangent[0]], half_b[tangent[1]]],
                normal,
            )
        }
        (Feature::Face { tangent }, Feature::Edge { along }) => {
            let face_centre = overlap_point(centre_a, axes_a, half_a, normal, false);
            let edge_centre = overlap_point(centre_b, axes_b, half_b, normal, true);
            let (world_b, world_a) = edge_face_clip(
                edge_centre,
                axes_b[along],
                half_b[along],
                face_centre,
                [axes_a[tangent[0]], axes_a[tangent[1]]],
                [half_a[tangent[0]], half_a[tangent[1]]],
                normal,
            );
            (world_a, world_b)
        }

        (Feature::Face { tangent: ta }, Feature::Face { tangent: tb }) => {
            let face_a = overlap_point(centre_a, axes_a, half_a, normal, false);
            let face_b = overlap_point(centre_b, axes_b, half_b, normal, true);
            face_face_clip(
                face_a,
                [axes_a[ta[0]], axes_a[ta[1]]],
                [half_a[ta[0]], half_a[ta[1]]],
                face_b,
                [axes_b[tb[0]], axes_b[tb[1]]],
                [half_b[tb[0]], half_b[tb[1]]],
                normal,
            )
        }
    };

    let local_a = a.pose.inverse_transform_point(world_a);
    let local_b = b.pose.inverse_transform_point(world_b);

    Some(ContactManifold::single(normal, local_a, local_b, min_overlap))
}

fn world_axes(body: &RigidBody) -> [Vec3<f64>; 3] {
    let local = body.shape.local_axes();
    [
        body.pose.transform_vector(local[0]).normalized(),
        body.pose.transform_vector(local[1]).normalized(),
        body.pose.transform_vector(local[2]).normalized(),
    ]
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{body::MotionKind, math::Iso3};

    use super::*;

    fn sphere_body(pos: Vec3<f64>, radius: f64) -> RigidBody {
        RigidBody::new(Shape::sphere(radius), Iso3::from_position(pos), MotionKind::Dynamic, 1.0)
    }

    fn box_body(pos: Vec3<f64>, half_extents: Vec3<f64>) -> RigidBody {
        RigidBody::new(
            Shape::cuboid(half_extents),
            Iso3::from_position(pos),
            MotionKind::Dynamic,
            1.0,
        )
    }

    #[test]
    fn overlapping_spheres_produce_contact() {
        let a = sphere_body(Vec3::zero(), 1.0);
        let b = sphere_body(Vec3::new(1.5, 0.0, 0.0), 1.0);
        let manifold = collide(&a, &b).expect("should collide");
        assert_eq!(manifold.points.len(), 1);
        assert!(manifold.points[0].depth > 0.0);
    }

    #[test]
    fn separated_spheres_produce_no_contact() {
        let a = sphere_body(Vec3::zero(), 1.0);
        let b = sphere_body(Vec3::new(5.0, 0.0, 0.0), 1.0);
        assert!(collide(&a, &b).is_none());
    }

    #[test]
    fn overlapping_boxes_produce_contact_along_shortest_axis() {
        let a = box_body(Vec3::zero(), Vec3::broadcast(1.0));
        let b = box_body(Vec3::new(1.8, 0.0, 0.0), Vec3::broadcast(1.0));
        let manifold = collide(&a, &b).expect("should collide");
        assert!(manifold.normal.x.abs() > 0.9);
    }

    #[test]
    fn separated_boxes_produce_no_contact() {
        let a = box_body(Vec3::zero(), Vec3::broadcast(1.0));
        let b = box_body(Vec3::new(5.0, 0.0, 0.0), Vec3::broadcast(1.0));
        assert!(collide(&a, &b).is_none());
    }

    #[test]
    fn box_resting_on_sphere_reports_reasonable_normal() {
        let sphere = sphere_body(Vec3::zero(), 1.0);
        let cube = box_body(Vec3::new(0.0, 1.9, 0.0), Vec3::broadcast(1.0));
        let manifold = collide(&sphere, &cube).expect("should collide");
        assert!(manifold.normal.y > 0.0);
    }

    #[test]
    fn sphere_resting_on_a_large_triangle_contacts_the_interior_not_a_corner() {
        let vertices = [
            Vec3::new(-100.0, 0.0, -100.0),
            Vec3::new(100.0, 0.0, -100.0),
            Vec3::new(0.0, 0.0, 200.0),
        ];
        let triangle = RigidBody::new(
            std::sync::Arc::new(Shape::Triangle { vertices }),
            Iso3::identity(),
            MotionKind::Static,
            1.0,
        );
        let sphere = sphere_body(Vec3::new(0.0, 0.4, 0.0), 0.5);

        let manifold = collide(&sphere, &triangle).expect("should collide");
        assert_relative_eq!(manifold.normal.y, 1.0, epsilon = 1e-9);
        // Contact point on the triangle should be near the origin, not dragged to a far corner.
        assert!(manifold.points[0].local_point_b.magnitude() < 1e-6);
    }

    #[test]
    fn stacked_boxes_produce_a_centred_face_contact_not_a_corner() {
        let bottom = box_body(Vec3::zero(), Vec3::broadcast(1.0));
        let top = box_body(Vec3::new(0.0, 1.9, 0.0), Vec3::broadcast(1.0));
        let manifold = collide(&bottom, &top).expect("should collide");
        assert!(manifold.normal.y.abs() > 0.99);

        let point = manifold.points[0];
        assert!(point.local_point_a.x.abs() < 1e-6);
        assert!(point.local_point_a.z.abs() < 1e-6);
        assert!(point.local_point_b.x.abs() < 1e-6);
        assert!(point.local_point_b.z.abs() < 1e-6);
    }

    #[test]
    fn classify_detects_vertex_edge_and_face() {
        let normal = Vec3::unit_y();
        assert_eq!(
            classify([Vec3::unit_x(), Vec3::unit_y(), Vec3::unit_z()], normal),
            Feature::Face { tangent: [0, 2] }
        );

        let tilted = [
            Vec3::new(1.0, 1.0, 0.0).normalized(),
            Vec3::new(-1.0, 1.0, 0.0).normalized(),
            Vec3::unit_z(),
        ];
        assert_eq!(classify(tilted, normal), Feature::Edge { along: 2 });
    }
}
