//! Headless harness binary: compiles and runs one script module, then
//! drives the scene driver's frame lifecycle for a fixed number of
//! frames with no window, no GPU, and an `ErrorPresenter` that always
//! logs and continues.

mod config;

use std::path::PathBuf;

use clap::Parser;
use gc_arena::ArenaParameters;
use hatchling_core::error::LoggingPresenter;
use hatchling_core::{EngineState, HatchArena, Root};
use tracing::{error, info};

/// Command-line arguments for the headless harness.
#[derive(Parser, Debug)]
#[command(name = "hatchling", version, about = "Headless Hatchling Engine harness")]
struct Args {
    /// Script module to compile and run.
    script: PathBuf,

    /// TOML config file providing the engine's settings keys.
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Number of frames to drive through the scene driver after the
    /// script's top-level code runs.
    #[arg(long = "frames", default_value_t = 60)]
    frames: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::Config::default(),
    };

    if config.compiler.log {
        info!(script = %args.script.display(), "compiling module");
    }

    let source = std::fs::read_to_string(&args.script)?;
    let mut arena = HatchArena::new(ArenaParameters::default(), |mc| Root::new(mc));
    let mut engine = EngineState::new(64, 1.0 / 60.0);
    let mut presenter = LoggingPresenter;

    let run_result = arena.mutate(|mc, root| -> anyhow::Result<()> {
        let chunk_index = root
            .manager
            .load_module(mc, &args.script.to_string_lossy(), &source)
            .map_err(|e| anyhow::anyhow!("compile error: {e}"))?;
        root.manager
            .run_module(mc, chunk_index, &mut presenter)
            .map_err(|e| anyhow::anyhow!("runtime error: {e}"))?;
        Ok(())
    });

    if let Err(e) = run_result {
        error!(%e, "script run failed");
        return Err(e);
    }

    for frame in 0..args.frames {
        engine.scene.frame_update();
        engine.scene.update(|_pass, _entity| {});
        engine.scene.fixed_update(1.0 / 60.0, |_pass, _entity| {});
        engine.scene.render(|_view| {});
        engine.scene.after_scene();

        if config.dev.debug_compiler && frame == 0 {
            info!(frame, "first frame driven");
        }
    }

    Ok(())
}
