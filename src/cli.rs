//! Command-line interface

use crate::config::Config;
use crate::controls::KeyBindings;
use crate::gesture::{ControlScheme, Gesture};
use crate::input::InputBackend;
use clap::{Args, Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about = "Drive racing games with hand gestures", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = r#"Examples:
    gesture-pilot                                  Webcam + landmark sidecar
    gesture-pilot --scheme hybrid --dry-run        Log keys instead of pressing them
    gesture-pilot --blank --replay session.jsonl   Replay recorded hands
    gesture-pilot --record session.jsonl           Record detections while playing
    gesture-pilot table --scheme finger_count      Print the decision table

Webcam capture needs a build with the `camera` feature
(cargo install gesture-pilot --features camera). Without it, use --stills
or --blank with --replay."#)]
pub struct Cli {
    /// Config file [default: ~/.gesture-pilot/config.json]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Track hands and drive the game (default)
    Run(RunArgs),
    /// Print which gesture pairs press which keys
    Table(TableArgs),
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Actions for the config command.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the config file path
    Path,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Arguments for the run command. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Gesture scheme: finger_count or hybrid
    #[arg(long)]
    pub scheme: Option<ControlScheme>,

    /// Webcam device index
    #[arg(long)]
    pub camera: Option<u32>,

    /// Read frames from a directory of images instead of the webcam
    #[arg(long, conflicts_with_all = ["blank", "camera"])]
    pub stills: Option<PathBuf>,

    /// Feed blank frames (use with --replay)
    #[arg(long, default_value_t = false, conflicts_with = "camera")]
    pub blank: bool,

    /// Take hands from a recording instead of the landmark sidecar
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Restart the recording when it ends
    #[arg(long = "loop", default_value_t = false, requires = "replay")]
    pub loop_replay: bool,

    /// Write every frame's detections to this file
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Log key presses instead of sending them
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Do not open the preview window
    #[arg(long, default_value_t = false)]
    pub no_overlay: bool,

    /// Do not mirror frames
    #[arg(long, default_value_t = false)]
    pub no_mirror: bool,

    /// Landmark sidecar command line, e.g. "python3 sidecar/hand_landmarks.py"
    #[arg(long)]
    pub sidecar: Option<String>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(scheme) = self.scheme {
            config.gestures.scheme = scheme;
        }
        if let Some(index) = self.camera {
            config.camera.device_index = index;
        }
        if self.dry_run {
            config.input.backend = InputBackend::DryRun;
        }
        if self.no_overlay {
            config.overlay.enabled = false;
        }
        if self.no_mirror {
            config.camera.mirror = false;
        }
        if let Some(command) = &self.sidecar {
            config.tracker.sidecar.command =
                command.split_whitespace().map(str::to_string).collect();
        }
    }
}

/// Arguments for the table command.
#[derive(Args, Debug, Clone)]
pub struct TableArgs {
    /// Gesture scheme: finger_count or hybrid
    #[arg(long, default_value = "finger_count")]
    pub scheme: ControlScheme,
}

/// Render a scheme's decision table as aligned text.
pub fn format_decision_table(scheme: ControlScheme, bindings: &KeyBindings) -> String {
    let hand = |g: Option<Gesture>| g.map_or("-", Gesture::as_str);

    let mut out = String::new();
    let _ = writeln!(out, "Scheme: {}", scheme.as_str());
    let _ = writeln!(out, "{:<15} {:<15} {:<10} ACTION", "LEFT", "RIGHT", "KEYS");
    for (left, right, decision) in scheme.decision_table() {
        let keys = bindings
            .resolve(&decision)
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join("+");
        let _ = writeln!(
            out,
            "{:<15} {:<15} {:<10} {}",
            hand(left),
            hand(right),
            keys,
            decision.label()
        );
    }
    out
}
