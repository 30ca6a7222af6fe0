//! Level-of-detail terrain meshes from height fields.
//!
//! A mesh samples every `stride`-th grid point, where the stride is 1 for
//! LOD 0 and `2 * lod` otherwise. Vertices are centred on the origin with
//! +X along grid columns and -Z along grid rows. Normals are taken from
//! central differences on the height field; samples one stride beyond the
//! edge are linearly extrapolated so edge normals agree with the
//! neighbouring chunk instead of collapsing to one-sided slopes.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::core::{Error, Grid, Result};
use crate::terrain::HeightCurve;

/// Interleaved vertex record for GPU upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Built terrain mesh. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<u32>,
    vertices_per_line: usize,
    level_of_detail: u32,
}

impl MeshData {
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    /// Triangle list, three indices per triangle.
    pub fn triangles(&self) -> &[u32] {
        &self.triangles
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn vertices_per_line(&self) -> usize {
        self.vertices_per_line
    }

    pub fn level_of_detail(&self) -> u32 {
        self.level_of_detail
    }

    /// Interleaved vertex records.
    pub fn vertices(&self) -> Vec<MeshVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| MeshVertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }

    /// Interleaved vertices as raw bytes.
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.vertices()).to_vec()
    }
}

/// Sampling stride for a level of detail.
#[inline]
pub fn lod_stride(level_of_detail: u32) -> usize {
    if level_of_detail == 0 { 1 } else { level_of_detail as usize * 2 }
}

/// Converts height fields into meshes.
pub struct MeshBuilder;

impl MeshBuilder {
    /// Check that `level_of_detail` can sample a `width x height` field.
    pub fn validate_lod(width: usize, height: usize, level_of_detail: u32) -> Result<usize> {
        if width < 2 || height < 2 {
            return Err(Error::FieldTooSmall { width, height });
        }
        let stride = lod_stride(level_of_detail);
        if (width - 1) % stride != 0 || (height - 1) % stride != 0 {
            return Err(Error::InvalidLevelOfDetail {
                lod: level_of_detail,
                stride,
                size: width.max(height),
            });
        }
        Ok(stride)
    }

    /// Build the mesh for `heights` at the given level of detail.
    ///
    /// Vertex height is `curve(h) * height_multiplier`.
    pub fn build(
        heights: &Grid<f32>,
        height_multiplier: f32,
        curve: &HeightCurve,
        level_of_detail: u32,
    ) -> Result<MeshData> {
        let (width, height) = heights.dimensions();
        let stride = Self::validate_lod(width, height, level_of_detail)?;

        let world = |x: usize, y: usize| curve.evaluate(*heights.get(x, y)) * height_multiplier;

        let top_left_x = (width - 1) as f32 / -2.0;
        let top_left_z = (height - 1) as f32 / 2.0;

        let vertices_per_line = (width - 1) / stride + 1;
        let lines = (height - 1) / stride + 1;
        let vertex_count = vertices_per_line * lines;

        let mut positions = Vec::with_capacity(vertex_count);
        let mut normals = Vec::with_capacity(vertex_count);
        let mut uvs = Vec::with_capacity(vertex_count);
        let mut triangles = Vec::with_capacity((vertices_per_line - 1) * (lines - 1) * 6);

        for y in (0..height).step_by(stride) {
            for x in (0..width).step_by(stride) {
                let vertex_index = positions.len() as u32;

                positions.push(Vec3::new(top_left_x + x as f32, world(x, y), top_left_z - y as f32));
                uvs.push(Vec2::new(
                    x as f32 / (width - 1) as f32,
                    y as f32 / (height - 1) as f32,
                ));
                normals.push(edge_aware_normal(heights, &world, x, y, stride));

                if x + stride < width && y + stride < height {
                    let a = vertex_index;
                    let b = a + 1;
                    let c = a + vertices_per_line as u32;
                    let d = c + 1;
                    triangles.extend_from_slice(&[a, d, c, d, a, b]);
                }
            }
        }

        log::trace!(
            "Built LOD {} mesh: {} vertices, {} triangles",
            level_of_detail,
            positions.len(),
            triangles.len() / 3
        );

        Ok(MeshData {
            positions,
            normals,
            uvs,
            triangles,
            vertices_per_line,
            level_of_detail,
        })
    }
}

/// World height at a possibly out-of-range grid point; out-of-range points
/// are mirrored through the edge sample (linear extrapolation).
fn extrapolated(
    heights: &Grid<f32>,
    world: &impl Fn(usize, usize) -> f32,
    x: isize,
    y: isize,
) -> f32 {
    let (w, h) = (heights.width() as isize, heights.height() as isize);
    if x < 0 {
        return 2.0 * extrapolated(heights, world, 0, y) - extrapolated(heights, world, -x, y);
    }
    if x >= w {
        let edge = w - 1;
        return 2.0 * extrapolated(heights, world, edge, y)
            - extrapolated(heights, world, 2 * edge - x, y);
    }
    if y < 0 {
        return 2.0 * world(x as usize, 0) - extrapolated(heights, world, x, -y);
    }
    if y >= h {
        let edge = h - 1;
        return 2.0 * world(x as usize, edge as usize) - extrapolated(heights, world, x, 2 * edge - y);
    }
    world(x as usize, y as usize)
}

fn edge_aware_normal(
    heights: &Grid<f32>,
    world: &impl Fn(usize, usize) -> f32,
    x: usize,
    y: usize,
    stride: usize,
) -> Vec3 {
    let (x, y, s) = (x as isize, y as isize, stride as isize);
    let left = extrapolated(heights, world, x - s, y);
    let right = extrapolated(heights, world, x + s, y);
    // Rows run towards -Z.
    let north = extrapolated(heights, world, x, y - s);
    let south = extrapolated(heights, world, x, y + s);

    let span = 2.0 * stride as f32;
    let dh_dx = (right - left) / span;
    let dh_dz = (north - south) / span;
    Vec3::new(-dh_dx, 1.0, -dh_dz).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::CHUNK_SIZE;

    fn flat(size: usize, h: f32) -> Grid<f32> {
        Grid::filled(size, size, h)
    }

    #[test]
    fn test_lod_zero_uses_every_point() {
        let heights = flat(CHUNK_SIZE, 0.5);
        let mesh = MeshBuilder::build(&heights, 10.0, &HeightCurve::linear(), 0).unwrap();
        assert_eq!(mesh.vertex_count(), CHUNK_SIZE * CHUNK_SIZE);
        assert_eq!(mesh.triangle_count(), (CHUNK_SIZE - 1) * (CHUNK_SIZE - 1) * 2);
    }

    #[test]
    fn test_all_chunk_lods_vertex_counts() {
        let heights = flat(CHUNK_SIZE, 0.2);
        for lod in 1..=6u32 {
            let stride = lod_stride(lod);
            let mesh = MeshBuilder::build(&heights, 1.0, &HeightCurve::linear(), lod).unwrap();
            let per_line = (CHUNK_SIZE - 1) / stride + 1;
            assert_eq!(mesh.vertex_count(), per_line * per_line, "lod {}", lod);
            assert_eq!(mesh.vertices_per_line(), per_line);
            let max_index = *mesh.triangles().iter().max().unwrap() as usize;
            assert_eq!(max_index, mesh.vertex_count() - 1);
        }
    }

    #[test]
    fn test_invalid_lod_rejected() {
        let heights = flat(10, 0.0);
        let err = MeshBuilder::build(&heights, 1.0, &HeightCurve::linear(), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidLevelOfDetail { stride: 2, .. }));
    }

    #[test]
    fn test_too_small_field_rejected() {
        let heights = flat(1, 0.0);
        assert!(matches!(
            MeshBuilder::build(&heights, 1.0, &HeightCurve::linear(), 0),
            Err(Error::FieldTooSmall { .. })
        ));
    }

    #[test]
    fn test_mesh_is_centred() {
        let heights = flat(5, 0.0);
        let mesh = MeshBuilder::build(&heights, 1.0, &HeightCurve::linear(), 0).unwrap();
        let first = mesh.positions()[0];
        let last = *mesh.positions().last().unwrap();
        assert_eq!(first, Vec3::new(-2.0, 0.0, 2.0));
        assert_eq!(last, Vec3::new(2.0, 0.0, -2.0));
        assert_eq!(mesh.uvs()[0], Vec2::ZERO);
        assert_eq!(*mesh.uvs().last().unwrap(), Vec2::ONE);
    }

    #[test]
    fn test_vertex_height_uses_curve_and_multiplier() {
        let heights = flat(3, 0.5);
        let curve = HeightCurve::new(vec![(0.0, 0.0), (1.0, 0.5)]);
        let mesh = MeshBuilder::build(&heights, 20.0, &curve, 0).unwrap();
        assert!(mesh.positions().iter().all(|p| (p.y - 5.0).abs() < 1e-5));
    }

    #[test]
    fn test_triangles_face_up() {
        let heights = Grid::from_fn(9, 9, |x, y| (x + y) as f32 / 16.0);
        let mesh = MeshBuilder::build(&heights, 2.0, &HeightCurve::linear(), 0).unwrap();
        let p = mesh.positions();
        for tri in mesh.triangles().chunks_exact(3) {
            let (a, b, c) = (p[tri[0] as usize], p[tri[1] as usize], p[tri[2] as usize]);
            let n = (b - a).cross(c - a);
            assert!(n.y > 0.0, "triangle {:?} faces down", tri);
        }
    }

    #[test]
    fn test_flat_normals_point_up() {
        let heights = flat(9, 0.7);
        let mesh = MeshBuilder::build(&heights, 30.0, &HeightCurve::linear(), 0).unwrap();
        for n in mesh.normals() {
            assert!((*n - Vec3::Y).length() < 1e-5);
        }
    }

    #[test]
    fn test_edge_normals_match_interior_on_ramp() {
        // A linear ramp extrapolates exactly, so edge normals equal interior normals.
        let heights = Grid::from_fn(9, 9, |x, _| x as f32 / 8.0);
        let mesh = MeshBuilder::build(&heights, 4.0, &HeightCurve::linear(), 0).unwrap();
        let interior = mesh.normals()[4 * 9 + 4];
        for n in mesh.normals() {
            assert!((*n - interior).length() < 1e-5);
        }
        assert!(interior.x < 0.0);
    }

    #[test]
    fn test_vertex_bytes_layout() {
        let heights = flat(3, 0.0);
        let mesh = MeshBuilder::build(&heights, 1.0, &HeightCurve::linear(), 0).unwrap();
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32);
        assert_eq!(mesh.vertex_bytes().len(), 9 * 32);
    }
}
