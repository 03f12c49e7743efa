use annotation_mask::{EditorCommand, MaskConfig, MaskEditor};
use clap::{Parser, Subcommand};
use cli::{load_commands, replay, ConfigFile, SessionSummary};
use color_eyre::eyre::{Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a class mask from a hand-drawn color annotation
    Import {
        /// Color annotation image (white background)
        input: PathBuf,
        /// Write per-class contours as JSON
        #[arg(long)]
        contours: Option<PathBuf>,
        /// Simplification tolerance in mask pixels (defaults to the config value)
        #[arg(long)]
        epsilon: Option<f32>,
    },
    /// Apply a JSON array of editor commands to a blank mask
    Replay {
        /// Image width in pixels
        #[arg(long)]
        width: u32,
        /// Image height in pixels
        #[arg(long)]
        height: u32,
        /// Path to the JSON command list
        commands: PathBuf,
    },
    /// Print the JSON schema of editor commands
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    // stdout carries the command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .wrap_err_with(|| format!("loading config {}", path.display()))?,
        None => MaskConfig::default(),
    };

    match &cli.command {
        Commands::Import {
            input,
            contours,
            epsilon,
        } => import(config, input, contours.as_deref(), *epsilon)?,
        Commands::Replay {
            width,
            height,
            commands,
        } => {
            let commands = load_commands(commands)
                .wrap_err_with(|| format!("reading commands {}", commands.display()))?;
            info!("Replaying {} commands on a {}x{} image", commands.len(), width, height);
            let editor = replay(config, *width, *height, commands)?;
            println!("{}", SessionSummary::from_editor(&editor)?.to_json()?);
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&EditorCommand::schema())?);
        }
    }

    Ok(())
}

fn import(config: MaskConfig, input: &Path, contours: Option<&Path>, epsilon: Option<f32>) -> Result<()> {
    let annotation = image::open(input).wrap_err_with(|| format!("opening {}", input.display()))?;
    let epsilon = epsilon.unwrap_or(config.contour_epsilon);

    let mut editor = MaskEditor::new(config)?;
    editor.load_image(annotation.width(), annotation.height())?;
    let parsed = editor.import_color_annotation(&annotation)?;

    for (class, pixels) in parsed.classes.iter().zip(parsed.pixel_counts().values()) {
        let [r, g, b] = class.color;
        info!("Class {}: #{:02x}{:02x}{:02x}, {} pixels", class.id, r, g, b, pixels);
    }

    if let Some(path) = contours {
        let outline = editor.export_contours(epsilon)?;
        outline.save_json(&path.to_string_lossy())?;
        info!("Wrote {} contours to {}", outline.contour_count(), path.display());
    }

    println!("{}", SessionSummary::from_editor(&editor)?.to_json()?);
    Ok(())
}
