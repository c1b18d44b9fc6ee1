//! Voxel data type

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Material byte reserved for empty space
pub const AIR_MATERIAL: u8 = 0;

/// Single voxel - exactly 4 bytes
///
/// Covers both representations the density oracles produce: a plain
/// material byte (volume is then either empty or full) and the blended form
/// with two materials, a blend weight and a fill fraction.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct Voxel {
    /// Dominant material
    pub primary: u8,
    /// Material blended into the primary one
    pub secondary: u8,
    /// Blend weight of the secondary material (0 = all primary)
    pub ratio: u8,
    /// Fill fraction, 0 = air, 255 = completely filled
    pub volume: u8,
}

impl Voxel {
    /// Empty/air voxel
    pub const AIR: Voxel = Voxel {
        primary: AIR_MATERIAL,
        secondary: AIR_MATERIAL,
        ratio: 0,
        volume: 0,
    };

    /// Fill value of a completely solid voxel
    pub const FULL: u8 = u8::MAX;

    /// Create a voxel from a single material byte.
    ///
    /// Any non-air material fills the whole cell.
    pub fn from_material(material: u8) -> Self {
        if material == AIR_MATERIAL {
            Self::AIR
        } else {
            Self {
                primary: material,
                secondary: material,
                ratio: 0,
                volume: Self::FULL,
            }
        }
    }

    /// Create a blended voxel
    pub fn blended(primary: u8, secondary: u8, ratio: u8, volume: u8) -> Self {
        Self { primary, secondary, ratio, volume }
    }

    /// Check if voxel holds any material
    pub fn is_solid(&self) -> bool {
        self.volume != 0
    }

    /// Material byte in the single-material representation
    pub fn material(&self) -> u8 {
        if self.is_solid() { self.primary } else { AIR_MATERIAL }
    }

    /// Fill fraction in 0.0-1.0
    pub fn fill_fraction(&self) -> f32 {
        self.volume as f32 / Self::FULL as f32
    }

    /// Blend weight of the secondary material in 0.0-1.0
    pub fn blend_weight(&self) -> f32 {
        self.ratio as f32 / u8::MAX as f32
    }
}
