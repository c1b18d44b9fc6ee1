//! Noise-based terrain density oracle

use glam::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::voxel::density::DensityOracle;
use crate::voxel::voxel::{Voxel, AIR_MATERIAL};

/// Parameters controlling terrain density
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub seed: u32,
    pub falloff: f32,           // Density lost per meter of height
    pub primary_frequency: f32, // Large features
    pub primary_weight: f32,
    pub detail_frequency: f32,  // Small bumps
    pub detail_weight: f32,
    pub octaves: u32,           // FBM octaves of the large features
    pub persistence: f32,       // FBM persistence (0.5 typical)
    pub lacunarity: f32,        // FBM lacunarity (2.0 typical)
    pub surface_material: u8,
    pub deep_material: u8,
    pub deep_transition: f32,   // Depth in meters where deep material takes over
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            falloff: 0.02,
            primary_frequency: 0.02,
            primary_weight: 0.9,
            detail_frequency: 0.08,
            detail_weight: 0.2,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            surface_material: 1,
            deep_material: 2,
            deep_transition: 8.0,
        }
    }
}

/// Layered noise terrain: solid wherever the density is non-negative.
///
/// Density falls off linearly with height and is perturbed by a fractal
/// noise for large features plus a plain Perlin layer for detail.
pub struct NoiseTerrain {
    params: TerrainParams,
    primary: Fbm<Perlin>,
    detail: Perlin,
}

impl NoiseTerrain {
    pub fn new(params: TerrainParams) -> Self {
        let primary = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);
        let detail = Perlin::new(params.seed.wrapping_add(1));

        Self { params, primary, detail }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Signed density at a world point; non-negative is solid
    pub fn density(&self, p: Vec3) -> f32 {
        let primary = self.primary.get(scaled(p, self.params.primary_frequency));
        let detail = self.detail.get(scaled(p, self.params.detail_frequency));

        -p.y * self.params.falloff
            + primary as f32 * self.params.primary_weight
            + detail as f32 * self.params.detail_weight
    }
}

fn scaled(p: Vec3, frequency: f32) -> [f64; 3] {
    (p.as_dvec3() * frequency as f64).to_array()
}

impl DensityOracle for NoiseTerrain {
    fn classify(&self, world_pos: Vec3, _sample_scale: f32) -> u8 {
        if self.density(world_pos) >= 0.0 {
            self.params.surface_material
        } else {
            AIR_MATERIAL
        }
    }

    /// Blended voxel: fill fraction from the distance to the surface in
    /// blocks, deep material mixed in with depth.
    fn sample(&self, world_pos: Vec3, sample_scale: f32) -> Voxel {
        let density = self.density(world_pos);
        if density < 0.0 {
            return Voxel::AIR;
        }

        let falloff = self.params.falloff.max(f32::EPSILON);
        let depth = density / falloff;
        let fill = (0.5 + depth / sample_scale.max(f32::EPSILON)).clamp(0.0, 1.0);
        let volume = ((fill * Voxel::FULL as f32).round() as u8).max(1);

        let blend = (depth / self.params.deep_transition.max(f32::EPSILON)).clamp(0.0, 1.0);
        let ratio = (blend * u8::MAX as f32).round() as u8;

        Voxel::blended(self.params.surface_material, self.params.deep_material, ratio, volume)
    }
}
