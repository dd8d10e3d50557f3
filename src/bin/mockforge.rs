use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use mockforge::{
    AiGateway, AssetId, AssetKind, FileStore, ImageBlob, LayerPatch, PlacedLayer, SharedClock,
    SharedStore, Sprite, StudioConfig, SystemClock, assets::decode::decode_rgba,
};

#[derive(Parser, Debug)]
#[command(name = "mockforge", version)]
struct Cli {
    /// JSON config file; environment variables still override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rasterize a scene locally into a JPEG.
    Composite(CompositeArgs),
    /// Rasterize a scene and send it through the realtime composite operation.
    Render(RenderArgs),
    /// Generate a product photo or logo from a prompt.
    Generate(GenerateArgs),
    /// Print credential pool health.
    Keys,
}

#[derive(Parser, Debug)]
struct CompositeArgs {
    /// Scene JSON (product image, optional viewport, overlays).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output JPEG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Scene JSON (product image, optional viewport, overlays).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Extra direction for the model.
    #[arg(long, default_value = "")]
    instruction: String,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// What to draw.
    #[arg(long)]
    prompt: String,

    /// Asset kind, selects the style hint.
    #[arg(long, value_enum, default_value_t = KindChoice::Logo)]
    kind: KindChoice,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindChoice {
    Product,
    Logo,
}

impl From<KindChoice> for AssetKind {
    fn from(k: KindChoice) -> Self {
        match k {
            KindChoice::Product => AssetKind::Product,
            KindChoice::Logo => AssetKind::Logo,
        }
    }
}

/// Scene file; image paths are relative to the file's directory.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scene {
    product: PathBuf,
    /// Display viewport `[width, height]` for a camera-style cover crop.
    #[serde(default)]
    viewport: Option<[f64; 2]>,
    #[serde(default)]
    overlays: Vec<SceneOverlay>,
}

#[derive(Debug, serde::Deserialize)]
struct SceneOverlay {
    image: PathBuf,
    #[serde(flatten)]
    placement: LayerPatch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Composite(args) => cmd_composite(args),
        Command::Render(args) => cmd_render(&config, args).await,
        Command::Generate(args) => cmd_generate(&config, args).await,
        Command::Keys => cmd_keys(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StudioConfig> {
    let config = match path {
        Some(p) => StudioConfig::from_json_file(p)?,
        None => StudioConfig::from_env()?,
    };
    Ok(config)
}

fn open_gateway(config: &StudioConfig) -> anyhow::Result<AiGateway> {
    let store: SharedStore = Arc::new(FileStore::open(config.data_dir.join("store.json"))?);
    let clock: SharedClock = Arc::new(SystemClock);
    Ok(AiGateway::from_config(config, store, clock)?)
}

fn read_scene(path: &Path) -> anyhow::Result<Scene> {
    let f = File::open(path).with_context(|| format!("open scene '{}'", path.display()))?;
    let scene: Scene =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse scene JSON")?;
    Ok(scene)
}

fn read_image(root: &Path, rel: &Path) -> anyhow::Result<image::RgbaImage> {
    let path = root.join(rel);
    let bytes = std::fs::read(&path).with_context(|| format!("read image '{}'", path.display()))?;
    Ok(decode_rgba(&bytes)?)
}

fn rasterize_scene(in_path: &Path) -> anyhow::Result<ImageBlob> {
    let scene = read_scene(in_path)?;
    let root = in_path.parent().unwrap_or_else(|| Path::new("."));
    let product = read_image(root, &scene.product)?;

    let mut sprites = Vec::with_capacity(scene.overlays.len());
    for overlay in &scene.overlays {
        let mut layer = PlacedLayer::new(AssetId::generate());
        layer.apply(&overlay.placement);
        sprites.push(Sprite {
            layer,
            image: read_image(root, &overlay.image)?,
        });
    }

    let blob = match scene.viewport {
        Some([w, h]) => mockforge::capture_frame(&product, kurbo::Size::new(w, h), &sprites)?,
        None => mockforge::capture_still(&product, &sprites)?,
    };
    Ok(blob)
}

fn write_blob(out: &Path, blob: &ImageBlob) -> anyhow::Result<()> {
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(out, &blob.data).with_context(|| format!("write '{}'", out.display()))?;
    eprintln!("wrote {} ({}, {} bytes)", out.display(), blob.mime_type, blob.data.len());
    Ok(())
}

fn cmd_composite(args: CompositeArgs) -> anyhow::Result<()> {
    let blob = rasterize_scene(&args.in_path)?;
    write_blob(&args.out, &blob)
}

async fn cmd_render(config: &StudioConfig, args: RenderArgs) -> anyhow::Result<()> {
    let frame = rasterize_scene(&args.in_path)?;
    let gateway = open_gateway(config)?;
    let result = gateway
        .realtime_composite(&frame, &args.instruction)
        .await
        .with_context(|| "realtime composite")?;
    write_blob(&args.out, &result)?;
    eprintln!("credits left: {}", gateway.credits().balance()?);
    Ok(())
}

async fn cmd_generate(config: &StudioConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let gateway = open_gateway(config)?;
    let result = gateway
        .generate_asset(&args.prompt, args.kind.into())
        .await
        .with_context(|| "generate asset")?;
    write_blob(&args.out, &result)?;
    eprintln!("credits left: {}", gateway.credits().balance()?);
    Ok(())
}

fn cmd_keys(config: &StudioConfig) -> anyhow::Result<()> {
    let gateway = open_gateway(config)?;
    let status = gateway.pool().status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
