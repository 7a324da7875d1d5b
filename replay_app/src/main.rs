//! Frame replay tool
//!
//! Builds a small lit scene, renders one frame through the recording backend
//! and logs what each pass submitted. An optional `.toml` or `.ron` settings
//! file can be passed as the first argument.

use std::sync::Arc;

use forward_renderer::config::{Config, ConfigError, RenderSettings};
use forward_renderer::foundation::logging;
use forward_renderer::foundation::math::{Mat4, Vec3};
use forward_renderer::render::api::{BackendCall, RecordingBackend};
use forward_renderer::render::material::{
    Coverage, Material, MaterialStage, Register, Sort, StageLighting, TexGen,
};
use forward_renderer::render::resources::{FrameVertexCache, GlobalImages, ImageInfo, ImageTable, ProgramSet, ProgramTable};
use forward_renderer::render::state::{DstBlend, RenderContext, SrcBlend, StateBits};
use forward_renderer::render::{FrameRenderer, FrameStats, RenderError};
use forward_renderer::scene::{Geometry, Surface, ViewDef, ViewLight};
use thiserror::Error;

const WIDTH: i32 = 1280;
const HEIGHT: i32 = 720;

/// Bytes per vertex in the demo vertex cache
const VERTEX_SIZE: usize = 64;

#[derive(Error, Debug)]
enum ReplayError {
    #[error("Failed to load settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),
}

/// Scene data and the resources it was built against
struct ReplayApp {
    renderer: FrameRenderer,
    view: ViewDef,
    cache: FrameVertexCache,
}

impl ReplayApp {
    fn new(settings: RenderSettings) -> Result<Self, ReplayError> {
        let mut program_table = ProgramTable::new();
        let programs = ProgramSet::register_builtin(&mut program_table);
        let mut images = ImageTable::new();
        let globals = GlobalImages::register(&mut images, WIDTH as u32, HEIGHT as u32);

        let mut cache = FrameVertexCache::new();
        let view = build_scene(&mut images, &mut cache);
        let renderer = FrameRenderer::new(settings, programs, globals, images)?;
        Ok(Self { renderer, view, cache })
    }

    fn run(&self) -> Result<FrameStats, ReplayError> {
        let mut ctx = RenderContext::new(RecordingBackend::new(), self.cache.clone());
        let stats = self.renderer.render_view(&mut ctx, &self.view)?;

        let backend = ctx.backend();
        let uploads = backend
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::Uniform(_)))
            .count();
        log::info!(
            "Recorded {} calls: {} state changes, {} uniform uploads, {} draws",
            backend.calls().len(),
            backend.state_change_count(),
            uploads,
            backend.draws().len()
        );
        for call in backend.calls() {
            log::trace!("{:?}", call);
        }
        Ok(stats)
    }
}

fn surface(cache: &mut FrameVertexCache, view: &ViewDef, material: &Arc<Material>, num_indexes: u32) -> Surface {
    let handle = cache.alloc(num_indexes as usize * VERTEX_SIZE);
    Surface::new(
        Arc::new(Geometry::triangles(num_indexes, handle)),
        material.clone(),
        view.world_space.clone(),
        view.scissor,
    )
}

fn build_scene(images: &mut ImageTable, cache: &mut FrameVertexCache) -> ViewDef {
    let mut image = |name: &str, alpha: bool| {
        let info = ImageInfo::new(name, 512, 512);
        images.register(if alpha { info.with_alpha() } else { info })
    };
    let wall_local = image("textures/base_wall/panel_local", false);
    let wall_d = image("textures/base_wall/panel_d", false);
    let wall_s = image("textures/base_wall/panel_s", true);
    let grate_d = image("textures/base_floor/grate_d", true);
    let glass = image("textures/glass/pane", false);
    let sky = image("env/sky_cube", false);
    let point = image("lights/squarelight", false);
    let falloff = image("lights/falloff", false);

    let eye = Vec3::new(0.0, -256.0, 96.0);
    let view_matrix = Mat4::look_at_rh(&eye.into(), &Vec3::new(0.0, 0.0, 64.0).into(), &Vec3::z());
    let projection = Mat4::new_perspective(WIDTH as f32 / HEIGHT as f32, 1.3, 3.0, 8192.0);
    let mut view = ViewDef::new(eye, &view_matrix, projection, WIDTH, HEIGHT);
    view.float_time = 12.5;

    let wall = Arc::new(
        Material::new("textures/base_wall/panel")
            .with_stage(MaterialStage::bump(wall_local))
            .with_stage(MaterialStage::diffuse(wall_d))
            .with_stage(MaterialStage::specular(wall_s)),
    );
    let grate = Arc::new(
        Material::new("textures/base_floor/grate")
            .with_coverage(Coverage::Perforated)
            .with_stage(MaterialStage::new(StageLighting::Diffuse, Some(grate_d)).with_alpha_test(Register::Constant(0.5)))
            .with_stage(MaterialStage::bump(wall_local)),
    );
    let pane = Arc::new(
        Material::new("textures/glass/pane")
            .with_coverage(Coverage::Translucent)
            .with_sort(Sort::MEDIUM)
            .with_stage(
                MaterialStage::ambient(Some(glass)).with_state(StateBits::blend(SrcBlend::DstColor, DstBlend::Zero)),
            )
            .with_stage(MaterialStage::bump(wall_local))
            .with_stage(MaterialStage::diffuse(glass)),
    );
    let skybox = Arc::new(
        Material::new("env/sky")
            .with_stage(
                MaterialStage::ambient(Some(sky))
                    .with_texgen(TexGen::SkyboxCube)
                    .with_state(StateBits::blend(SrcBlend::One, DstBlend::One)),
            ),
    );

    let wall_surface = surface(cache, &view, &wall, 36);
    let grate_surface = surface(cache, &view, &grate, 12);
    let sky_surface = surface(cache, &view, &skybox, 36);
    let pane_surface = surface(cache, &view, &pane, 6);

    let shader = Arc::new(Material::new("lights/squarelight").with_stage(MaterialStage::ambient(Some(point))));
    let mut light = ViewLight::new(shader, falloff, Vec3::new(32.0, -64.0, 128.0), view.scissor);
    let volume = cache.alloc(72 * VERTEX_SIZE);
    light.global_shadows.push(Surface::new(
        Arc::new(Geometry::shadow_volume(volume, 72, 48, 60)),
        grate.clone(),
        view.world_space.clone(),
        view.scissor,
    ));
    light.local_interactions.push(wall_surface.clone());
    light.global_interactions.push(grate_surface.clone());
    light.translucent_interactions.push(pane_surface.clone());

    view.draw_surfaces = vec![wall_surface, grate_surface, sky_surface, pane_surface];
    view.lights.push(light);
    view
}

fn load_settings() -> Result<RenderSettings, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading settings from {}", path);
            RenderSettings::load_from_file(path)
        }
        None => Ok(RenderSettings::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_default("info");

    log::info!("Starting frame replay");
    let settings = load_settings().map_err(ReplayError::from)?;
    let app = ReplayApp::new(settings)?;

    match app.run() {
        Ok(stats) => {
            log::info!(
                "Depth {} | shadow volumes {} | interactions {} | ambient {} | fog {} | post {}",
                stats.depth,
                stats.shadow_volumes,
                stats.interactions,
                stats.ambient,
                stats.fog,
                stats.post_process
            );
            log::info!(
                "Gate: {} changes applied, {} redundant skipped ({:.0}% filtered)",
                stats.gate.state_changes,
                stats.gate.redundant_skipped,
                stats.gate.redundancy_ratio() * 100.0
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Frame replay failed: {:?}", e);
            Err(e.into())
        }
    }
}
