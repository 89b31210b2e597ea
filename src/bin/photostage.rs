use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photostage::{
    Category, CompositionId, Compositor, DirBlobStore, ExportFormat, RenderSettings,
    SessionSnapshot, Studio, StudioConfig, default_components, export_image, render_prompt,
};

#[derive(Parser, Debug)]
#[command(name = "photostage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the generation prompt for a category.
    Prompt(PromptArgs),
    /// Render one composition from a session snapshot to PNG or JPEG.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct PromptArgs {
    /// Category tag (automotive, real_estate, restaurant, small_business,
    /// hospitality, lifestyle, custom).
    #[arg(long, value_parser = parse_category)]
    category: Category,

    /// Replace the template's default subject.
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Session snapshot JSON.
    #[arg(long)]
    snapshot: PathBuf,

    /// Blob directory the snapshot's pixels were written to.
    #[arg(long)]
    blobs: PathBuf,

    /// Composition id inside the snapshot.
    #[arg(long)]
    composition: CompositionId,

    /// Output path; `.png` keeps alpha, `.jpg`/`.jpeg` flattens onto the export backdrop.
    #[arg(long)]
    out: PathBuf,

    /// Studio config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_category(tag: &str) -> Result<Category, String> {
    let category = Category::parse_lenient(tag);
    if category == Category::Custom && !tag.trim().eq_ignore_ascii_case("custom") {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        return Err(format!("unknown category '{tag}' (expected one of: {})", known.join(", ")));
    }
    Ok(category)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photostage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Prompt(args) => cmd_prompt(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn cmd_prompt(args: PromptArgs) -> anyhow::Result<()> {
    let prompt = render_prompt(&default_components(args.category), args.subject.as_deref());
    println!("{prompt}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StudioConfig> {
    match path {
        Some(p) => Ok(StudioConfig::from_json_file(p)?),
        None => Ok(StudioConfig::default()),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let format = ExportFormat::from_path(&args.out)?;

    let snapshot = SessionSnapshot::read_file(&args.snapshot)?;
    let blobs = DirBlobStore::open(&args.blobs)?;
    let mut studio = Studio::new(config.clone())?;
    let session = studio
        .import_session(&snapshot, &blobs)
        .with_context(|| format!("import snapshot '{}'", args.snapshot.display()))?;
    tracing::info!(%session, "snapshot loaded");

    let compositor = Compositor::new(RenderSettings {
        canvas: None,
        threads: config.render_threads,
    })?;
    let image = studio.render_composition(args.composition, &compositor)?;
    let bytes = export_image(&image, format, &config)?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, bytes)
        .with_context(|| format!("write '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
