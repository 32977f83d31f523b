//! Wavefront OBJ geometry with an optional MTL material library.

use std::collections::HashMap;

use glam::Vec3;

use super::Fetch;
use crate::error::AssetError;
use crate::scene_graph::{Geometry, Material, SceneNode};

/// Load `obj_url`, coloring it from `mtl_url` when that file is available.
/// A missing or broken material library only downgrades the materials.
pub async fn load_obj_with_materials<F: Fetch + ?Sized>(
    fetcher: &F,
    obj_url: &str,
    mtl_url: Option<&str>,
) -> Result<SceneNode, AssetError> {
    let materials = match mtl_url {
        Some(url) => match load_text(fetcher, url).await.and_then(|t| parse_mtl(&t, url)) {
            Ok(lib) => {
                log::debug!("{url}: {} materials", lib.len());
                Some(lib)
            }
            Err(err) => {
                log::warn!("material library unavailable, using default material: {err}");
                None
            }
        },
        None => None,
    };
    let text = load_text(fetcher, obj_url).await?;
    parse_obj(&text, obj_url, materials.as_ref())
}

async fn load_text<F: Fetch + ?Sized>(fetcher: &F, url: &str) -> Result<String, AssetError> {
    let bytes = fetcher.fetch(url).await?;
    String::from_utf8(bytes).map_err(|e| AssetError::Utf8 {
        path: url.to_string(),
        source: e.utf8_error(),
    })
}

fn parse_error(path: &str, line: usize, message: impl Into<String>) -> AssetError {
    AssetError::Parse {
        path: path.to_string(),
        line,
        message: message.into(),
    }
}

fn parse_floats<const N: usize>(
    parts: &[&str],
    path: &str,
    line: usize,
) -> Result<[f32; N], AssetError> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        let raw = parts
            .get(i)
            .ok_or_else(|| parse_error(path, line, format!("expected {N} numbers")))?;
        *slot = raw
            .parse()
            .map_err(|_| parse_error(path, line, format!("bad number '{raw}'")))?;
    }
    Ok(out)
}

/// Parse an MTL library into materials keyed by name.
pub fn parse_mtl(text: &str, path: &str) -> Result<HashMap<String, Material>, AssetError> {
    let mut lib = HashMap::new();
    let mut current: Option<Material> = None;

    for (n, line) in text.lines().enumerate() {
        let line_no = n + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&keyword, args)) = parts.split_first() else {
            continue;
        };
        if keyword == "newmtl" {
            if let Some(done) = current.take() {
                lib.insert(done.name.clone(), done);
            }
            let name = args.join(" ");
            if name.is_empty() {
                return Err(parse_error(path, line_no, "newmtl without a name"));
            }
            current = Some(Material::lit(name, [1.0, 1.0, 1.0]));
            continue;
        }
        let Some(mat) = current.as_mut() else {
            continue;
        };
        match keyword {
            "Kd" => mat.color = parse_floats::<3>(args, path, line_no)?,
            "d" => {
                let [d] = parse_floats::<1>(args, path, line_no)?;
                mat.opacity = d.clamp(0.0, 1.0);
                mat.transparent = mat.opacity < 1.0;
            }
            "Tr" => {
                let [tr] = parse_floats::<1>(args, path, line_no)?;
                mat.opacity = (1.0 - tr).clamp(0.0, 1.0);
                mat.transparent = mat.opacity < 1.0;
            }
            "illum" => mat.lit = args.first() != Some(&"0"),
            _ => {}
        }
    }
    if let Some(done) = current.take() {
        lib.insert(done.name.clone(), done);
    }
    Ok(lib)
}

/// A run of faces sharing one object name and material.
struct FaceRun {
    name: String,
    material: Material,
    positions: Vec<Vec3>,
}

impl FaceRun {
    fn into_node(self) -> SceneNode {
        let indices = (0..self.positions.len() as u32).collect();
        SceneNode::mesh(self.name, Geometry::new(self.positions, indices), self.material)
    }
}

/// Parse OBJ text. Without a material library every mesh gets the unlit
/// default material; with one, unknown `usemtl` names fall back to plain
/// white.
pub fn parse_obj(
    text: &str,
    path: &str,
    materials: Option<&HashMap<String, Material>>,
) -> Result<SceneNode, AssetError> {
    let pick = |name: Option<&str>| match (materials, name) {
        (None, _) => Material::unlit_default(),
        (Some(lib), Some(n)) => lib.get(n).cloned().unwrap_or_default(),
        (Some(_), None) => Material::default(),
    };

    let mut positions: Vec<Vec3> = Vec::new();
    let mut object = String::from("obj");
    let mut material_name: Option<String> = None;
    let mut runs: Vec<FaceRun> = Vec::new();
    let mut run: Option<FaceRun> = None;

    for (n, line) in text.lines().enumerate() {
        let line_no = n + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&keyword, args)) = parts.split_first() else {
            continue;
        };
        match keyword {
            "v" => positions.push(Vec3::from(parse_floats::<3>(args, path, line_no)?)),
            "o" | "g" => {
                runs.extend(run.take());
                object = if args.is_empty() { "obj".into() } else { args.join(" ") };
            }
            "usemtl" => {
                runs.extend(run.take());
                material_name = args.first().map(|s| (*s).to_string());
            }
            "f" => {
                if args.len() < 3 {
                    return Err(parse_error(path, line_no, "face needs at least 3 vertices"));
                }
                let corners = args
                    .iter()
                    .map(|a| resolve_index(a, positions.len(), path, line_no))
                    .collect::<Result<Vec<usize>, _>>()?;
                let current = run.get_or_insert_with(|| FaceRun {
                    name: object.clone(),
                    material: pick(material_name.as_deref()),
                    positions: Vec::new(),
                });
                // fan triangulation
                for i in 1..corners.len() - 1 {
                    current.positions.push(positions[corners[0]]);
                    current.positions.push(positions[corners[i]]);
                    current.positions.push(positions[corners[i + 1]]);
                }
            }
            _ => {}
        }
    }
    runs.extend(run.take());

    if runs.is_empty() {
        return Err(AssetError::Empty {
            path: path.to_string(),
        });
    }
    Ok(SceneNode::group(
        path,
        runs.into_iter().map(FaceRun::into_node).collect(),
    ))
}

/// Parse a face corner like `3`, `3/1`, `3//2` or `-1` into a 0-based index.
fn resolve_index(corner: &str, count: usize, path: &str, line: usize) -> Result<usize, AssetError> {
    let raw = corner.split('/').next().unwrap_or_default();
    let idx: i64 = raw
        .parse()
        .map_err(|_| parse_error(path, line, format!("bad face index '{corner}'")))?;
    let resolved = if idx < 0 { count as i64 + idx } else { idx - 1 };
    if idx == 0 || resolved < 0 || resolved >= count as i64 {
        return Err(parse_error(
            path,
            line,
            format!("face index {idx} out of range (have {count} vertices)"),
        ));
    }
    Ok(resolved as usize)
}
