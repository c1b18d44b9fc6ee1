//! Axis-aligned bounding box

use glam::{DVec3, I64Vec3};

use crate::core::types::Vec3;

/// Axis-aligned box treated as half-open, `[min, max)` on every axis.
///
/// Neighbouring boxes sharing a face never both claim a point on that face,
/// which keeps the visible regions of nested detail levels disjoint.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box covering `count` chunks per axis starting at chunk coordinate `first`
    pub fn from_chunks(first: I64Vec3, count: i64, chunk_size: f32) -> Self {
        let size = chunk_size as f64;
        let min: DVec3 = first.as_dvec3() * size;
        let max: DVec3 = (first + I64Vec3::splat(count)).as_dvec3() * size;
        Self::new(min.as_vec3(), max.as_vec3())
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Whether `p` lies in `[min, max)`
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmplt(self.max).all()
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        other.min.cmpge(self.min).all() && other.max.cmple(self.max).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
    }

    #[test]
    fn test_contains_excludes_max_face() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains(Vec3::ZERO));
        assert!(aabb.contains(Vec3::splat(0.5)));
        assert!(!aabb.contains(Vec3::new(1.0, 0.5, 0.5)));

        // Neighbouring box picks up the shared face instead
        let next = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(next.contains(Vec3::new(1.0, 0.5, 0.5)));
    }

    #[test]
    fn test_from_chunks() {
        let aabb = Aabb::from_chunks(I64Vec3::new(-1, 0, 2), 3, 8.0);
        assert_eq!(aabb.min, Vec3::new(-8.0, 0.0, 16.0));
        assert_eq!(aabb.max, Vec3::new(16.0, 24.0, 40.0));
    }

    #[test]
    fn test_contains_aabb() {
        let outer = Aabb::new(Vec3::ZERO, Vec3::splat(4.0));
        assert!(outer.contains_aabb(&Aabb::new(Vec3::ONE, Vec3::splat(4.0))));
        assert!(!outer.contains_aabb(&Aabb::new(Vec3::ONE, Vec3::splat(5.0))));
    }
}
