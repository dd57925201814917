//! OBJ model loading with vertex deduplication.
//!
//! Faces are triangulated and every index triple is flattened into a
//! [`Vertex`]. Identical vertices share one index, so the vertex list holds
//! each unique vertex exactly once.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use glam::{Vec2, Vec3};
use tessera_rhi::vertex::Vertex;
use tracing::info;

use crate::error::{ResourceError, ResourceResult};

/// Color given to every loaded vertex.
pub const DEFAULT_VERTEX_COLOR: Vec3 = Vec3::ONE;

/// Indexed triangle mesh ready for upload.
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of triangles described by the index list.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Accumulates vertices, reusing the index of any vertex seen before.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    mesh: MeshData,
    unique: HashMap<Vertex, u32>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an index for `vertex`, pushing the vertex only if it is new.
    pub fn push(&mut self, vertex: Vertex) -> u32 {
        let next = self.mesh.vertices.len() as u32;
        let index = *self.unique.entry(vertex).or_insert_with(|| {
            self.mesh.vertices.push(vertex);
            next
        });
        self.mesh.indices.push(index);
        index
    }

    pub fn finish(self) -> MeshData {
        self.mesh
    }
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

/// Loads an OBJ file from disk. Materials are ignored.
pub fn load_model(path: impl AsRef<Path>) -> ResourceResult<MeshData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ResourceError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mesh = parse_obj(BufReader::new(file))?;
    if mesh.indices.is_empty() {
        return Err(ResourceError::EmptyModel(path.to_path_buf()));
    }

    info!(
        "Loaded model {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertices.len(),
        mesh.triangle_count()
    );

    Ok(mesh)
}

/// Parses OBJ text into a deduplicated mesh.
///
/// Texture V is flipped to `1 - v` for a top-left image origin. Models without
/// texture coordinates get `(0, 0)`.
pub fn parse_obj(mut reader: impl BufRead) -> ResourceResult<MeshData> {
    let (models, _materials) =
        tobj::load_obj_buf(&mut reader, &load_options(), |_| Ok(Default::default()))?;

    let mut builder = MeshBuilder::new();

    for model in &models {
        let mesh = &model.mesh;
        for &index in &mesh.indices {
            let i = index as usize;

            let position = mesh
                .positions
                .get(3 * i..3 * i + 3)
                .map(Vec3::from_slice)
                .ok_or_else(|| ResourceError::IndexOutOfRange {
                    model: model.name.clone(),
                    attribute: "position",
                    index,
                })?;

            let tex_coord = if mesh.texcoords.is_empty() {
                Vec2::ZERO
            } else {
                let uv = mesh.texcoords.get(2 * i..2 * i + 2).ok_or_else(|| {
                    ResourceError::IndexOutOfRange {
                        model: model.name.clone(),
                        attribute: "texcoord",
                        index,
                    }
                })?;
                Vec2::new(uv[0], 1.0 - uv[1])
            };

            builder.push(Vertex::new(position, DEFAULT_VERTEX_COLOR, tex_coord));
        }
    }

    Ok(builder.finish())
}
