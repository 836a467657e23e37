use anyhow::{bail, Context, Result};
use clap::Parser;
use gesture_pilot::capture::{open_camera, BlankSource, FrameGrabber, StillsSource};
use gesture_pilot::cli::{format_decision_table, Cli, Commands, ConfigAction, RunArgs};
use gesture_pilot::config::{self, Config};
use gesture_pilot::gesture::GestureClassifier;
use gesture_pilot::input::{open_sink, InputController};
use gesture_pilot::overlay::open_overlay;
use gesture_pilot::pipeline::{install_ctrlc_handler, GameLoop};
use gesture_pilot::tracker::{
    DetectionRecorder, HandTracker, LandmarkProvider, ReplayProvider, SidecarProvider,
};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    match cli.command {
        None => run(&config_path, &cli.run, cli.verbose),
        Some(Commands::Run(args)) => run(&config_path, &args, cli.verbose),
        Some(Commands::Table(args)) => {
            let config = load_config(&config_path)?;
            print!("{}", format_decision_table(args.scheme, &config.keys));
            Ok(())
        }
        Some(Commands::Config { action }) => config_command(&config_path, action),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn config_command(path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            Config::default().save(path)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let config = load_config(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn run(config_path: &Path, args: &RunArgs, verbose: bool) -> Result<()> {
    gesture_pilot::logging::init(&config::log_dir(), verbose);
    tracing::info!("Gesture Pilot {} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(shutdown.clone()).context("Failed to install Ctrl-C handler")?;

    // Start the landmark provider before the camera so a slow model load does
    // not eat into the first-frame timeout.
    let provider: Box<dyn LandmarkProvider> = match &args.replay {
        Some(path) => Box::new(
            ReplayProvider::open(path, args.loop_replay)
                .with_context(|| format!("Failed to open replay {}", path.display()))?,
        ),
        None => Box::new(
            SidecarProvider::spawn(&config.tracker.sidecar)
                .context("Failed to start the landmark sidecar")?,
        ),
    };

    let classifier = GestureClassifier::new(config.gestures.scheme, config.gestures.pinch_threshold);
    let process_size = (config.tracker.process_width, config.tracker.process_height);
    let tracker = HandTracker::new(provider, classifier, config.camera.mirror, process_size);

    let input = InputController::new(
        open_sink(config.input.backend).context("Failed to open keyboard output")?,
    );

    let grabber = spawn_capture(&config, args).context("Failed to start frame capture")?;

    let mut game = GameLoop::new(grabber, tracker, config.keys.clone(), input)
        .with_shutdown(shutdown)
        .with_warmup(Duration::from_millis(config.camera.warmup_ms));

    if let Some(path) = &args.record {
        game = game.with_recorder(
            DetectionRecorder::create(path)
                .with_context(|| format!("Failed to create recording {}", path.display()))?,
        );
    }

    if config.overlay.enabled {
        match open_overlay(&config.overlay, process_size.0, process_size.1) {
            Ok(overlay) => game = game.with_overlay(overlay),
            Err(e) => tracing::warn!("Running without overlay: {}", e),
        }
    }

    game.run().context("Game loop stopped with an error")?;
    Ok(())
}

fn spawn_capture(config: &Config, args: &RunArgs) -> gesture_pilot::Result<FrameGrabber> {
    let camera = config.camera.clone();

    if let Some(dir) = args.stills.clone() {
        FrameGrabber::spawn(move || StillsSource::open(&dir, camera.fps))
    } else if args.blank {
        FrameGrabber::spawn(move || Ok(BlankSource::new(camera.width, camera.height, camera.fps)))
    } else {
        FrameGrabber::spawn(move || {
            open_camera(camera.device_index, camera.width, camera.height, camera.fps)
        })
    }
}
