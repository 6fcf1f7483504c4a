//! Renderers built from a YAML engine config.

use crogine::prelude::*;

const CONFIG: &str = "
log:
  level: warn
renderer:
  max_batch_entities: 10
  depth_axis: y
";

#[test]
fn renderer_settings_reach_the_renderers() {
    let path = std::env::temp_dir().join(format!("crogine-config-{}.yaml", std::process::id()));
    std::fs::write(&path, CONFIG).unwrap();
    let config = EngineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.log.level, LogLevel::Warn);

    let context = RenderContext::new(RecordingDevice::new(1024));
    let mut scene = Scene::new();
    scene.add_system(SpriteRenderer::new(context.clone(), &config.renderer));
    scene.add_system(TextRenderer::new(context, &config.renderer));
    assert_eq!(scene.system::<SpriteRenderer>().unwrap().max_per_buffer(), 10);
    assert_eq!(scene.system::<TextRenderer>().unwrap().max_per_buffer(), 10);

    let texture = Texture::new(UVec2::new(4, 4));
    let font = std::sync::Arc::new(Font::new(BlockRasterizer::new()));
    for i in 0..25 {
        let e = scene.create_entity();
        scene.insert_component(e, Sprite::new(&texture));
        scene.insert_component(e, Text::with_string(font.clone(), "x"));
        scene.insert_component(e, Transform::from_translation(Vec3::new(0.0, i as f32, 0.0)));
    }
    scene.simulate(0.016).unwrap();

    assert_eq!(scene.system::<SpriteRenderer>().unwrap().buffer_count(), 3);
    assert_eq!(scene.system::<TextRenderer>().unwrap().buffer_count(), 3);

    // The sprite renderer derives depth from Y.
    let transforms = scene.world().component::<Transform>();
    assert!(transforms.iter().any(|t| t.translation.z == -0.24));
}
