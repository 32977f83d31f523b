//! glTF 2.0 (GLB and JSON) to scene graph.
//!
//! Only triangle geometry and base-color materials are kept; the renderer
//! has no use for normals, UVs or textures.

use base64::Engine;
use glam::{Quat, Vec3};
use gltf::buffer::Source;
use gltf::mesh::Mode;

use super::{Fetch, resolve_relative};
use crate::error::AssetError;
use crate::scene_graph::{Geometry, Group, Material, SceneNode, Transform};

/// Fetch and parse a glTF document, pulling external buffers next to it.
pub async fn load_gltf<F: Fetch + ?Sized>(fetcher: &F, url: &str) -> Result<SceneNode, AssetError> {
    let bytes = fetcher.fetch(url).await?;
    parse_gltf(fetcher, url, &bytes).await
}

pub async fn parse_gltf<F: Fetch + ?Sized>(
    fetcher: &F,
    url: &str,
    bytes: &[u8],
) -> Result<SceneNode, AssetError> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(bytes).map_err(|source| AssetError::Gltf {
            path: url.to_string(),
            source,
        })?;

    let mut buffers: Vec<Vec<u8>> = Vec::new();
    for buffer in document.buffers() {
        let index = buffer.index();
        let missing = || AssetError::MissingBuffer {
            path: url.to_string(),
            index,
        };
        let data = match buffer.source() {
            Source::Bin => blob.as_deref().map(<[u8]>::to_vec).ok_or_else(missing)?,
            Source::Uri(uri) if uri.starts_with("data:") => {
                decode_data_uri(uri).ok_or_else(|| AssetError::DataUri {
                    path: url.to_string(),
                })?
            }
            Source::Uri(uri) => fetcher.fetch(&resolve_relative(url, uri)).await?,
        };
        if data.len() < buffer.length() {
            return Err(missing());
        }
        buffers.push(data);
    }

    let roots: Vec<SceneNode> = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| convert_node(&n, &buffers)).collect(),
        None => Vec::new(),
    };
    let root = SceneNode::group(url, roots);
    if root.triangle_count() == 0 {
        return Err(AssetError::Empty {
            path: url.to_string(),
        });
    }
    Ok(root)
}

/// Decode a base64 `data:` URI payload.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

fn convert_node(node: &gltf::Node, buffers: &[Vec<u8>]) -> SceneNode {
    let (t, r, s) = node.transform().decomposed();
    let transform = Transform {
        translation: Vec3::from(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from(s),
    };
    let name = node.name().unwrap_or("node").to_string();

    let mut children = Vec::new();
    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh.name().unwrap_or(&name).to_string();
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::debug!("skipping non-triangle primitive in {mesh_name}");
                continue;
            }
            let reader = primitive.reader(|b| buffers.get(b.index()).map(Vec::as_slice));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<Vec3> = positions.map(Vec3::from).collect();
            let indices: Vec<u32> = match reader.read_indices() {
                Some(ix) => ix.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            children.push(SceneNode::mesh(
                format!("{mesh_name}#{}", primitive.index()),
                Geometry::new(positions, indices),
                convert_material(&primitive.material()),
            ));
        }
    }
    let single_mesh = children.len() == 1 && node.children().next().is_none();
    children.extend(node.children().map(|c| convert_node(&c, buffers)));

    if single_mesh {
        if let Some(SceneNode::Mesh(mut mesh)) = children.pop() {
            mesh.transform = transform;
            return SceneNode::Mesh(mesh);
        }
    }
    SceneNode::Group(Group {
        name,
        transform,
        children,
    })
}

fn convert_material(material: &gltf::Material) -> Material {
    let [r, g, b, a] = material.pbr_metallic_roughness().base_color_factor();
    let mut out = Material::lit(material.name().unwrap_or("gltf"), [r, g, b]);
    out.opacity = a;
    out.transparent = material.alpha_mode() == gltf::material::AlphaMode::Blend;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryFetcher;
    use futures::executor::block_on;

    fn triangle_bytes() -> Vec<u8> {
        [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    fn document(buffer_uri: &str) -> String {
        format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"name": "body", "mesh": 0, "translation": [1.0, 0.0, 0.0]}}],
  "meshes": [{{"name": "body", "primitives": [{{"attributes": {{"POSITION": 0}}, "material": 0}}]}}],
  "materials": [{{"name": "wing", "pbrMetallicRoughness": {{"baseColorFactor": [0.5, 0.25, 1.0, 0.5]}}, "alphaMode": "BLEND"}}],
  "buffers": [{{"byteLength": 36, "uri": "{buffer_uri}"}}],
  "bufferViews": [{{"buffer": 0, "byteOffset": 0, "byteLength": 36}}],
  "accessors": [{{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}}]
}}"#
        )
    }

    #[test]
    fn embedded_buffer_document_loads() {
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(triangle_bytes())
        );
        let fetcher = MemoryFetcher::new().with("m.gltf", document(&uri));
        let root = block_on(load_gltf(&fetcher, "m.gltf")).unwrap();
        assert_eq!(root.triangle_count(), 1);

        let SceneNode::Group(group) = &root else {
            panic!("root should be a group");
        };
        let SceneNode::Mesh(mesh) = &group.children[0] else {
            panic!("single primitive node should collapse to a mesh");
        };
        assert_eq!(mesh.transform.translation, Vec3::X);
        assert_eq!(mesh.material.name, "wing");
        assert_eq!(mesh.material.opacity, 0.5);
        assert!(mesh.material.transparent);
        assert_eq!(mesh.geometry.indices, vec![0, 1, 2]);
    }

    #[test]
    fn external_buffer_is_fetched_next_to_document() {
        let fetcher = MemoryFetcher::new()
            .with("models/m.gltf", document("m.bin"))
            .with("models/m.bin", triangle_bytes());
        let root = block_on(load_gltf(&fetcher, "models/m.gltf")).unwrap();
        assert_eq!(root.triangle_count(), 1);
    }

    #[test]
    fn missing_external_buffer_fails() {
        let fetcher = MemoryFetcher::new().with("m.gltf", document("m.bin"));
        let err = block_on(load_gltf(&fetcher, "m.gltf")).unwrap_err();
        assert!(matches!(err, AssetError::Status { status: 404, .. }));
    }

    #[test]
    fn short_buffer_is_rejected() {
        let fetcher = MemoryFetcher::new()
            .with("m.gltf", document("m.bin"))
            .with("m.bin", vec![0u8; 12]);
        let err = block_on(load_gltf(&fetcher, "m.gltf")).unwrap_err();
        assert!(matches!(err, AssetError::MissingBuffer { index: 0, .. }));
    }

    #[test]
    fn data_uri_decoding() {
        assert_eq!(decode_data_uri("data:application/octet-stream;base64,AAEC"), Some(vec![0, 1, 2]));
        assert_eq!(decode_data_uri("data:text/plain,hello"), None);
        assert_eq!(decode_data_uri("m.bin"), None);
    }
}
