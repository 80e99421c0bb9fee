//! Triangle geometry and bounding volumes.
//!
//! A [`Geometry`] is the immutable vertex payload of one renderable: positions,
//! optional normals, an optional first texture-coordinate channel and a flat
//! triangle index list. It is built once by the importer and owned by exactly
//! one render-data component afterwards.

use cgmath::Vector3;

/// Axis-aligned bounding box described by its minimum and maximum corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    /// All eight corners of the box, in no particular order.
    pub fn corners(&self) -> [Vector3<f32>; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vector3::new(lo.x, lo.y, lo.z),
            Vector3::new(hi.x, lo.y, lo.z),
            Vector3::new(lo.x, hi.y, lo.z),
            Vector3::new(hi.x, hi.y, lo.z),
            Vector3::new(lo.x, lo.y, hi.z),
            Vector3::new(hi.x, lo.y, hi.z),
            Vector3::new(lo.x, hi.y, hi.z),
            Vector3::new(hi.x, hi.y, hi.z),
        ]
    }
}

/// Vertex data of one mesh.
///
/// Invariants (guaranteed by the importer, relied upon everywhere else):
/// `normals` and `tex_coords`, when present, have the same length as
/// `vertices`; `triangles.len()` is a multiple of three and every index is
/// below the vertex count.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Flat triangle index list, three indices per face.
    pub triangles: Vec<u32>,
    /// Set during import when any texture coordinate of channel 0 exceeds 1.0
    /// on either axis.
    pub texture_repeat: bool,
}

impl Geometry {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Model-space bounding box over all vertices.
    ///
    /// An empty mesh yields a degenerate box at the origin, which every
    /// frustum classifies as outside-or-on-plane and is never worth drawing.
    pub fn bounding_box(&self) -> Aabb {
        let mut iter = self.vertices.iter();
        let first = match iter.next() {
            Some(v) => Vector3::new(v[0], v[1], v[2]),
            None => Vector3::new(0.0, 0.0, 0.0),
        };
        let mut min = first;
        let mut max = first;
        for v in iter {
            min.x = min.x.min(v[0]);
            min.y = min.y.min(v[1]);
            min.z = min.z.min(v[2]);
            max.x = max.x.max(v[0]);
            max.y = max.y.max(v[1]);
            max.z = max.z.max(v[2]);
        }
        Aabb { min, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_spans_all_vertices() {
        let geometry = Geometry {
            vertices: vec![[1.0, -2.0, 0.5], [-3.0, 4.0, 0.0], [0.0, 0.0, -1.0]],
            ..Default::default()
        };
        let aabb = geometry.bounding_box();
        assert_eq!(aabb.min, Vector3::new(-3.0, -2.0, -1.0));
        assert_eq!(aabb.max, Vector3::new(1.0, 4.0, 0.5));
    }

    #[test]
    fn empty_mesh_has_degenerate_box() {
        let aabb = Geometry::default().bounding_box();
        assert_eq!(aabb.min, aabb.max);
    }

    #[test]
    fn corners_enumerates_eight_distinct_points() {
        let aabb = Aabb {
            min: Vector3::new(0.0, 0.0, 0.0),
            max: Vector3::new(1.0, 1.0, 1.0),
        };
        let corners = aabb.corners();
        for i in 0..8 {
            for j in (i + 1)..8 {
                assert_ne!(corners[i], corners[j]);
            }
        }
    }
}
