//! Vertex layout handed to render backends

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// One mesh vertex (40 bytes, tightly packed)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Chunk-local position, relative to the chunk center
    pub position: [f32; 3],
    /// Face normal
    pub normal: [f32; 3],
    /// Linear RGBA
    pub color: [f32; 4],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            color,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 40);

        let vertex = MeshVertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Y, [0.5; 4]);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&vertex));
        assert_eq!(&floats[..6], &[1.0, 2.0, 3.0, 0.0, 1.0, 0.0]);
        assert_eq!(vertex.position(), Vec3::new(1.0, 2.0, 3.0));
    }
}
