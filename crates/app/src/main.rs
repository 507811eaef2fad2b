mod signal;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use level_meter_core::{
    BallisticsConfig, LevelMeter, MeterError, Orientation, Preset, Size, SourceAdapter, Surface,
    VisualStyle,
};
use signal::Signal;
use tracing_subscriber::EnvFilter;

fn main() -> level_meter_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets => run_presets(),
        Commands::Simulate {
            meter,
            signal,
            fps,
            seconds,
            jitter,
        } => run_simulate(&meter, signal, fps, seconds, jitter),
        Commands::Render {
            meter,
            left,
            right,
            frames,
            output,
        } => run_render(&meter, left, right, frames, output.as_deref()),
    }
}

fn run_presets() -> level_meter_core::Result<()> {
    let mut presets = serde_json::Map::new();
    for preset in Preset::ALL {
        presets.insert(
            preset.name().to_string(),
            serde_json::to_value(preset.config())?,
        );
    }
    println!("{}", serde_json::to_string_pretty(&presets)?);
    Ok(())
}

fn run_simulate(
    options: &MeterOptions,
    signal: Signal,
    fps: f64,
    seconds: f64,
    jitter: u32,
) -> level_meter_core::Result<()> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(MeterError::msg(format!("frame rate must be positive, got {fps}")));
    }

    let config = options.load_config()?;
    let surface = options.surface();
    tracing::info!(?signal, fps, seconds, "simulating meter");

    let mut meter = LevelMeter::new(config, SourceAdapter::pushed())?;
    meter.start()?;

    let frame_ms = 1000.0 / fps;
    let total = (seconds * fps).ceil() as u64;
    let mut now_ms = 0.0;
    for frame in 0..total {
        // Every `jitter`-th frame stalls as if the host had been suspended.
        if jitter > 0 && frame > 0 && frame % jitter as u64 == 0 {
            now_ms += 250.0;
        }
        now_ms += frame_ms;

        meter.push(signal.sample_at((now_ms / 1000.0) as f32));
        if meter.on_frame(now_ms) && meter.take_repaint() {
            if let Some(list) = meter.paint(&surface) {
                tracing::trace!(frame, primitives = list.len(), "painted");
            }
        }
    }

    let report = serde_json::json!({
        "stats": meter.stats(),
        "snapshot": meter.snapshot(),
    });
    meter.stop();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_render(
    options: &MeterOptions,
    left: f32,
    right: f32,
    frames: u32,
    output: Option<&Path>,
) -> level_meter_core::Result<()> {
    let config = options.load_config()?;
    let surface = options.surface();

    let source = SourceAdapter::from_fn(move || Ok((left, right).into()));
    let mut meter = LevelMeter::new(config, source)?;
    meter.start()?;
    for frame in 0..=frames {
        meter.on_frame(frame as f64 * 16.0);
    }

    let list = meter.render(&surface);
    meter.stop();

    let json = serde_json::to_string_pretty(&list)?;
    match output {
        Some(path) => {
            tracing::info!(?path, primitives = list.len(), "writing draw list");
            std::fs::write(path, json)?;
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time level meter engine driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every built-in preset as JSON.
    Presets,
    /// Drive a meter over a synthetic signal and report what it did.
    Simulate {
        #[command(flatten)]
        meter: MeterOptions,
        #[arg(long, value_enum, default_value = "burst")]
        signal: Signal,
        #[arg(long, default_value_t = 60.0)]
        fps: f64,
        #[arg(long, default_value_t = 3.0)]
        seconds: f64,
        /// Insert a 250 ms stall every N frames (0 disables).
        #[arg(long, default_value_t = 0)]
        jitter: u32,
    },
    /// Hold a constant level and dump the resulting draw list.
    Render {
        #[command(flatten)]
        meter: MeterOptions,
        #[arg(long, default_value_t = 0.9)]
        left: f32,
        #[arg(long, default_value_t = 0.1)]
        right: f32,
        /// Frames to settle the ballistics before drawing.
        #[arg(long, default_value_t = 60)]
        frames: u32,
        /// Write the JSON here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct MeterOptions {
    /// Built-in preset: peak, ppm or vu.
    #[arg(short, long, default_value = "peak")]
    preset: String,
    /// JSON ballistics config; takes precedence over --preset.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "continuous")]
    style: StyleArg,
    #[arg(long, value_enum, default_value = "vertical")]
    orientation: OrientationArg,
    #[arg(long, default_value_t = 48.0)]
    width: f32,
    #[arg(long, default_value_t = 240.0)]
    height: f32,
}

impl MeterOptions {
    fn load_config(&self) -> level_meter_core::Result<BallisticsConfig> {
        match &self.config {
            Some(path) => {
                tracing::debug!(?path, "loading ballistics config");
                BallisticsConfig::from_json(&std::fs::read_to_string(path)?)
            }
            None => Ok(self.preset.parse::<Preset>()?.config()),
        }
    }

    fn surface(&self) -> Surface {
        Surface::new(
            Size::new(self.width, self.height),
            self.style.into(),
            self.orientation.into(),
        )
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    Continuous,
    Segmented,
    Vu,
}

impl From<StyleArg> for VisualStyle {
    fn from(value: StyleArg) -> Self {
        match value {
            StyleArg::Continuous => VisualStyle::Continuous,
            StyleArg::Segmented => VisualStyle::Segmented,
            StyleArg::Vu => VisualStyle::Vu,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrientationArg {
    Vertical,
    Horizontal,
}

impl From<OrientationArg> for Orientation {
    fn from(value: OrientationArg) -> Self {
        match value {
            OrientationArg::Vertical => Orientation::Vertical,
            OrientationArg::Horizontal => Orientation::Horizontal,
        }
    }
}
