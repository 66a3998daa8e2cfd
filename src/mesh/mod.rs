//! Mesh-generation collaborator interface
//!
//! The pipeline does not care how geometry is built, only that a mesher
//! can turn a chunk plus its required neighbors into [`MeshData`] and can
//! name which neighbor chunks a mesh depends on. [`BlockFaceMesher`] is a
//! deliberately simple default that keeps the lifecycle honest in tests
//! and demos.

use crate::world::chunk::{Chunk, CHUNK_DIAMETER, CHUNK_VOLUME, EMPTY_VOXEL};
use crate::world::coord::Coordinate;

/// Geometry produced for one chunk
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// A mesh carrying no geometry (used for uniformly empty/solid chunks)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// An immutable copy of one chunk's voxel content, taken while briefly
/// holding that chunk's mutex. Jobs snapshot neighbors one at a time so
/// mesh generation never holds two chunk mutexes at once.
#[derive(Clone, Debug)]
pub struct ChunkSnapshot {
    pub coord: Coordinate,
    pub voxels: Option<Box<[u8]>>,
    pub solid_voxel_count: u32,
}

impl ChunkSnapshot {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let voxels = if chunk.is_uniformly_empty() {
            None
        } else {
            let mut buf = vec![EMPTY_VOXEL; CHUNK_VOLUME].into_boxed_slice();
            for (i, v) in buf.iter_mut().enumerate() {
                *v = chunk.voxel(i);
            }
            Some(buf)
        };
        Self {
            coord: chunk.id(),
            voxels,
            solid_voxel_count: chunk.solid_voxel_count(),
        }
    }

    /// A snapshot of a uniformly empty chunk (used for neighbors outside
    /// the level bounds)
    pub fn uniformly_empty(coord: Coordinate) -> Self {
        Self { coord, voxels: None, solid_voxel_count: 0 }
    }

    pub fn voxel(&self, index: usize) -> u8 {
        match &self.voxels {
            Some(buf) => buf[index],
            None => EMPTY_VOXEL,
        }
    }

    pub fn is_uniformly_empty(&self) -> bool {
        self.solid_voxel_count == 0
    }

    pub fn is_uniformly_solid(&self) -> bool {
        self.solid_voxel_count as usize == CHUNK_VOLUME
    }
}

/// Mesh-generation collaborator.
///
/// `required_neighbors` names the chunks whose voxel data must be loaded
/// before `chunk` can be meshed; `dirtied_neighbors` names the chunks
/// whose meshes sample `chunk` and go stale when it is edited.
pub trait ChunkMesher: Send + Sync {
    fn generate_mesh(&self, chunk: &Chunk, neighbors: &[ChunkSnapshot]) -> MeshData;
    fn required_neighbors(&self, chunk: Coordinate) -> Vec<Coordinate>;
    fn dirtied_neighbors(&self, chunk: Coordinate) -> Vec<Coordinate>;
}

/// Default mesher: one quad per exposed solid voxel face.
///
/// Each chunk owns the faces on its positive-axis boundaries, so meshing
/// requires the +x/+y/+z neighbors and editing a chunk dirties the
/// -x/-y/-z ones.
pub struct BlockFaceMesher;

const POSITIVE_AXES: [(i32, i32, i32); 3] = [(1, 0, 0), (0, 1, 0), (0, 0, 1)];

impl BlockFaceMesher {
    fn local_index(x: usize, y: usize, z: usize) -> usize {
        (y * CHUNK_DIAMETER + z) * CHUNK_DIAMETER + x
    }

    /// Voxel at a possibly-out-of-chunk local position, consulting the
    /// positive-axis neighbor snapshots for overflow on one axis.
    fn sample(
        chunk: &Chunk,
        neighbors: &[ChunkSnapshot],
        base: Coordinate,
        x: i32,
        y: i32,
        z: i32,
    ) -> u8 {
        let d = CHUNK_DIAMETER as i32;
        if x < 0 || y < 0 || z < 0 {
            // Negative-boundary faces are owned by the neighbor's mesh
            return 1;
        }
        if x < d && y < d && z < d {
            return chunk.voxel(Self::local_index(x as usize, y as usize, z as usize));
        }
        let neighbor_coord = Coordinate::new(
            base.x + i32::from(x >= d),
            base.y + i32::from(y >= d),
            base.z + i32::from(z >= d),
        );
        let (lx, ly, lz) = (x.rem_euclid(d), y.rem_euclid(d), z.rem_euclid(d));
        neighbors
            .iter()
            .find(|n| n.coord == neighbor_coord)
            .map(|n| n.voxel(Self::local_index(lx as usize, ly as usize, lz as usize)))
            .unwrap_or(EMPTY_VOXEL)
    }

    fn emit_quad(mesh: &mut MeshData, x: f32, y: f32, z: f32, axis: (i32, i32, i32)) {
        let base = mesh.positions.len() as u32;
        // Quad corners on the positive face of the unit voxel along `axis`
        let corners: [[f32; 3]; 4] = match axis {
            (1, 0, 0) => [
                [x + 1.0, y, z],
                [x + 1.0, y + 1.0, z],
                [x + 1.0, y + 1.0, z + 1.0],
                [x + 1.0, y, z + 1.0],
            ],
            (0, 1, 0) => [
                [x, y + 1.0, z],
                [x, y + 1.0, z + 1.0],
                [x + 1.0, y + 1.0, z + 1.0],
                [x + 1.0, y + 1.0, z],
            ],
            _ => [
                [x, y, z + 1.0],
                [x + 1.0, y, z + 1.0],
                [x + 1.0, y + 1.0, z + 1.0],
                [x, y + 1.0, z + 1.0],
            ],
        };
        mesh.positions.extend_from_slice(&corners);
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

impl ChunkMesher for BlockFaceMesher {
    fn generate_mesh(&self, chunk: &Chunk, neighbors: &[ChunkSnapshot]) -> MeshData {
        let mut mesh = MeshData::default();
        if chunk.is_uniformly_empty() {
            return mesh;
        }
        let d = CHUNK_DIAMETER as i32;
        let base = chunk.id();
        for y in 0..d {
            for z in 0..d {
                for x in 0..d {
                    let idx = Self::local_index(x as usize, y as usize, z as usize);
                    if chunk.voxel(idx) == EMPTY_VOXEL {
                        continue;
                    }
                    for axis in POSITIVE_AXES {
                        let (nx, ny, nz) = (x + axis.0, y + axis.1, z + axis.2);
                        if Self::sample(chunk, neighbors, base, nx, ny, nz) == EMPTY_VOXEL {
                            Self::emit_quad(&mut mesh, x as f32, y as f32, z as f32, axis);
                        }
                    }
                    // Interior negative faces (boundary ones belong to the
                    // negative neighbor)
                    for axis in POSITIVE_AXES {
                        let (nx, ny, nz) = (x - axis.0, y - axis.1, z - axis.2);
                        if nx >= 0
                            && ny >= 0
                            && nz >= 0
                            && chunk.voxel(Self::local_index(
                                nx as usize,
                                ny as usize,
                                nz as usize,
                            )) == EMPTY_VOXEL
                        {
                            Self::emit_quad(&mut mesh, nx as f32, ny as f32, nz as f32, axis);
                        }
                    }
                }
            }
        }
        mesh
    }

    fn required_neighbors(&self, chunk: Coordinate) -> Vec<Coordinate> {
        POSITIVE_AXES
            .iter()
            .map(|&(dx, dy, dz)| chunk.offset(dx, dy, dz))
            .collect()
    }

    fn dirtied_neighbors(&self, chunk: Coordinate) -> Vec<Coordinate> {
        POSITIVE_AXES
            .iter()
            .map(|&(dx, dy, dz)| chunk.offset(-dx, -dy, -dz))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_data_empty() {
        let mesh = MeshData::empty();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.triangle_count(), 0);
    }

    #[test]
    fn test_neighbor_sets() {
        let mesher = BlockFaceMesher;
        let c = Coordinate::new(2, 3, 4);

        let required = mesher.required_neighbors(c);
        assert_eq!(required.len(), 3);
        assert!(required.contains(&Coordinate::new(3, 3, 4)));
        assert!(required.contains(&Coordinate::new(2, 4, 4)));
        assert!(required.contains(&Coordinate::new(2, 3, 5)));

        let dirtied = mesher.dirtied_neighbors(c);
        assert_eq!(dirtied.len(), 3);
        assert!(dirtied.contains(&Coordinate::new(1, 3, 4)));
    }

    #[test]
    fn test_single_voxel_produces_faces() {
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        // Interior voxel away from every boundary
        chunk.set_voxel(BlockFaceMesher::local_index(5, 5, 5), 1);

        let mesher = BlockFaceMesher;
        let mesh = mesher.generate_mesh(&chunk, &[]);

        // Three positive faces plus three interior negative faces
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertex_count(), 24);
    }

    #[test]
    fn test_boundary_face_consults_neighbor_snapshot() {
        let d = CHUNK_DIAMETER - 1;
        let mut chunk = Chunk::new(Coordinate::ZERO, None);
        chunk.set_voxel(BlockFaceMesher::local_index(d, 0, 0), 1);

        let mesher = BlockFaceMesher;

        // Missing neighbor snapshot: treated as empty, +x face emitted
        let open = mesher.generate_mesh(&chunk, &[]);

        // Solid neighbor across the +x boundary suppresses that face
        let mut neighbor = Chunk::new(Coordinate::new(1, 0, 0), None);
        neighbor.set_voxel(BlockFaceMesher::local_index(0, 0, 0), 1);
        let snapshot = ChunkSnapshot::from_chunk(&neighbor);
        let closed = mesher.generate_mesh(&chunk, &[snapshot]);

        assert_eq!(open.triangle_count(), closed.triangle_count() + 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut chunk = Chunk::new(Coordinate::new(1, 1, 1), None);
        chunk.set_voxel(42, 7);

        let snapshot = ChunkSnapshot::from_chunk(&chunk);
        assert_eq!(snapshot.voxel(42), 7);
        assert_eq!(snapshot.voxel(43), EMPTY_VOXEL);
        assert_eq!(snapshot.solid_voxel_count, 1);
        assert!(!snapshot.is_uniformly_empty());

        let empty = ChunkSnapshot::uniformly_empty(Coordinate::ZERO);
        assert!(empty.is_uniformly_empty());
        assert_eq!(empty.voxel(0), EMPTY_VOXEL);
    }
}
