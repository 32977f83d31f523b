// Asset loading and projection tests (native). Models are served from an
// in-memory fetcher so the same fallback paths the browser takes are covered
// without a network.

use boss_vignettes::assets::{
    MemoryFetcher, ModelSource, load_first, load_obj_with_materials,
};
use boss_vignettes::camera::CameraRig;
use boss_vignettes::config::{MosquitoConfig, ToiletConfig, asset_url};
use boss_vignettes::error::AssetError;
use boss_vignettes::render::{Lighting, Projector, Viewport, sort_back_to_front};
use boss_vignettes::scene_graph::Material;
use boss_vignettes::{MosquitoStage, ToiletStage};
use futures::executor::block_on;
use glam::Mat4;

const TOILET_OBJ: &str = "\
o bowl
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
v 0 2 0
usemtl porcelain
f 1 2 5
f 2 3 5
f 3 4 5
f 4 1 5
";

const TOILET_MTL: &str = "newmtl porcelain\nKd 0.95 0.95 0.95\n";

#[test]
fn mosquito_falls_back_to_second_candidate() {
    let cfg = MosquitoConfig::default();
    let primary = asset_url(&cfg.asset_base, &cfg.primary_model);
    let fallback = asset_url(&cfg.asset_base, &cfg.fallback_model);
    // only the secondary model exists, and it is not valid glTF
    let fetcher = MemoryFetcher::new().with(fallback.clone(), "not a model");
    let err = block_on(load_first(
        &fetcher,
        &[ModelSource::gltf(primary), ModelSource::gltf(fallback.clone())],
    ))
    .unwrap_err();
    match err {
        AssetError::Gltf { path, .. } => assert_eq!(path, fallback),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn toilet_loads_with_material_library() {
    let cfg = ToiletConfig::default();
    let obj = asset_url(&cfg.asset_base, &cfg.geometry);
    let mtl = asset_url(&cfg.asset_base, &cfg.materials);
    let fetcher = MemoryFetcher::new()
        .with(obj.clone(), TOILET_OBJ)
        .with(mtl.clone(), TOILET_MTL);
    let node = block_on(load_obj_with_materials(&fetcher, &obj, Some(&mtl))).unwrap();
    assert_eq!(node.triangle_count(), 4);
    node.visit_meshes(Mat4::IDENTITY, &mut |m, _| {
        assert_eq!(m.material.name, "porcelain");
        assert!(m.material.lit);
    });

    let mut stage = ToiletStage::new(cfg, 400, 400);
    stage.set_model(node);
    let bounds = stage.model().unwrap().world_bounds().unwrap();
    assert!((bounds.center().y + 1.5).abs() < 1e-5);
}

#[test]
fn toilet_without_library_is_unlit_grey() {
    let fetcher = MemoryFetcher::new().with("./toilet.obj", TOILET_OBJ);
    let node =
        block_on(load_obj_with_materials(&fetcher, "./toilet.obj", Some("./toilet1.mtl"))).unwrap();
    node.visit_meshes(Mat4::IDENTITY, &mut |m, _| {
        assert_eq!(m.material, Material::unlit_default());
    });
}

#[test]
fn missing_toilet_geometry_means_placeholder() {
    let fetcher = MemoryFetcher::new().with("./toilet1.mtl", TOILET_MTL);
    let result = block_on(load_obj_with_materials(&fetcher, "./toilet.obj", Some("./toilet1.mtl")));
    assert!(matches!(result, Err(AssetError::Status { status: 404, .. })));

    let mut stage = ToiletStage::new(ToiletConfig::default(), 400, 400);
    stage.set_placeholder();
    assert_eq!(stage.model().unwrap().node.triangle_count(), 12);
}

#[test]
fn loaded_model_projects_inside_the_viewport() {
    let fetcher = MemoryFetcher::new().with("m.obj", TOILET_OBJ);
    let node = block_on(load_first(&fetcher, &[ModelSource::obj("m.obj")])).unwrap();
    let mut stage = MosquitoStage::new(&MosquitoConfig::default(), 800, 600);
    stage.set_model(node);
    stage.tick(1.0 / 60.0);

    let viewport = Viewport {
        width: 800.0,
        height: 600.0,
    };
    let projector = Projector::new(stage.camera(), viewport);
    let mut tris = Vec::new();
    for model in stage.models() {
        projector.project_model(model, &Lighting::default(), None, &mut tris);
    }
    assert!(!tris.is_empty());
    sort_back_to_front(&mut tris);
    assert!(tris.windows(2).all(|w| w[0].depth >= w[1].depth));
    for t in &tris {
        for p in t.points {
            assert!((0.0..=800.0).contains(&p[0]));
            assert!((0.0..=600.0).contains(&p[1]));
        }
    }
}

#[test]
fn default_rig_looks_at_configured_target() {
    let cfg = ToiletConfig::default();
    let rig = CameraRig::new(&cfg.camera, 1.0);
    assert_eq!(rig.camera.fov_y_deg, 45.0);
    assert_eq!(rig.camera.target(), glam::Vec3::ZERO);
}
