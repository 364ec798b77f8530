use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edit_studio::{
    AspectRatio, CoordinateMapper, EditStudio, FieldValue, Image, ImageCapabilities, MaskSurface,
    Point, RenderedBox, StructuredDescription, StudioConfig, ToolKind,
};
use image_backend::{BackendConfig, HttpBackend};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "storyboard-edit")]
#[command(about = "Storyboard image edit studio - headless masking, editing and structured remix")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Studio defaults (brush sizes, blur, aspect ratio) as JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Generation service settings as JSON
    #[arg(long, global = true)]
    backend: Option<PathBuf>,

    /// Generation service URL (overrides --backend)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Generation service API key (overrides --backend)
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rasterize a stroke file into a PNG mask
    Mask {
        /// Stroke file (JSON)
        strokes: PathBuf,

        /// Native image width
        #[arg(long)]
        width: u32,

        /// Native image height
        #[arg(long)]
        height: u32,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the regeneration instruction for an edited structured prompt
    Diff {
        /// Structured prompt as analyzed (JSON)
        original: PathBuf,

        /// Structured prompt after editing (JSON)
        edited: PathBuf,

        /// Free-text additional instructions
        #[arg(long)]
        instructions: Option<String>,
    },

    /// Apply one edit tool through the generation service
    Edit {
        /// Image record (JSON with image_url, seed, structured_prompt)
        #[arg(short, long)]
        image: PathBuf,

        /// Tool to apply (erase, generative-fill, remove-background, ...)
        #[arg(short, long)]
        tool: ToolKind,

        /// Stroke file for masked tools
        #[arg(long)]
        strokes: Option<PathBuf>,

        /// Native image width (required with --strokes)
        #[arg(long)]
        width: Option<u32>,

        /// Native image height (required with --strokes)
        #[arg(long)]
        height: Option<u32>,

        /// Instruction text for fill, replace-background and expand
        #[arg(short, long)]
        prompt: Option<String>,

        /// Blur intensity (1-5)
        #[arg(long)]
        intensity: Option<u8>,

        /// Expand target aspect ratio (e.g. 16:9)
        #[arg(long)]
        aspect_ratio: Option<AspectRatio>,

        /// Where to write the saved original/current pair
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Regenerate an image from edited structured prompt fields
    Remix {
        /// Image record (JSON with image_url, seed, structured_prompt)
        #[arg(short, long)]
        image: PathBuf,

        /// Field edits as a JSON object of field -> value
        #[arg(short, long)]
        edits: Option<PathBuf>,

        /// Free-text additional instructions
        #[arg(long)]
        instructions: Option<String>,

        /// Print the instruction instead of sending it
        #[arg(long)]
        dry_run: bool,

        /// Where to write the saved original/current pair
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that the generation service is reachable
    Check,
}

/// Pointer strokes recorded against a viewport, or in native pixels when no
/// viewport is given.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StrokeFile {
    #[serde(default)]
    viewport: Option<RenderedBox>,

    /// Brush diameter in native pixels
    #[serde(default)]
    brush: Option<f32>,

    strokes: Vec<Vec<Point>>,
}

impl StrokeFile {
    fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stroke file {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid stroke file {}", path.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let studio_config = match &cli.config {
        Some(path) => StudioConfig::load(path)
            .with_context(|| format!("Failed to load studio config {}", path.display()))?,
        None => StudioConfig::default(),
    };

    match cli.command {
        Commands::Mask {
            ref strokes,
            width,
            height,
            ref output,
        } => mask_command(&studio_config, strokes, width, height, output),
        Commands::Diff {
            ref original,
            ref edited,
            ref instructions,
        } => diff_command(original, edited, instructions.as_deref()),
        Commands::Edit {
            ref image,
            tool,
            ref strokes,
            width,
            height,
            ref prompt,
            intensity,
            aspect_ratio,
            ref output,
        } => {
            let backend = backend(&cli)?;
            let request = EditArgs {
                tool,
                strokes: strokes.as_deref(),
                size: width.zip(height),
                prompt: prompt.clone(),
                intensity,
                aspect_ratio,
            };
            edit_command(&backend, studio_config, image, request, output).await
        }
        Commands::Remix {
            ref image,
            ref edits,
            ref instructions,
            dry_run,
            ref output,
        } => {
            let backend = backend(&cli)?;
            remix_command(
                &backend,
                studio_config,
                image,
                edits.as_deref(),
                instructions.as_deref(),
                dry_run,
                output.as_deref(),
            )
            .await
        }
        Commands::Check => check_command(&backend(&cli)?).await,
    }
}

fn backend(cli: &Cli) -> Result<HttpBackend> {
    let mut config = match &cli.backend {
        Some(path) => BackendConfig::load(path)
            .with_context(|| format!("Failed to load backend config {}", path.display()))?,
        None => BackendConfig::default(),
    };
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key.clone());
    }
    HttpBackend::new(config)
}

fn load_image(path: &Path) -> Result<Image> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read image record {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid image record {}", path.display()))
}

fn load_json(path: &Path) -> Result<Value> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {:?}", path);
    Ok(())
}

fn mask_command(
    config: &StudioConfig,
    strokes_path: &Path,
    width: u32,
    height: u32,
    output: &Path,
) -> Result<()> {
    let strokes = StrokeFile::load(strokes_path)?;
    let brush = config.clamp_brush(strokes.brush.unwrap_or(config.default_brush_diameter));
    let rendered = strokes
        .viewport
        .unwrap_or(RenderedBox::new(0.0, 0.0, width as f32, height as f32));
    let mapper = CoordinateMapper::new(rendered, width, height);
    let mut mask = MaskSurface::new(width, height, brush);

    for stroke in &strokes.strokes {
        let mut points = stroke.iter().map(|p| mapper.to_native(*p));
        if let Some(first) = points.next() {
            mask.begin(first);
            points.for_each(|p| mask.extend(p));
            mask.end();
        }
    }

    if !mask.has_paint() {
        warn!("No stroke touched the {}x{} image; mask is empty", width, height);
    }
    std::fs::write(output, mask.export_png()?)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        "Mask written to {:?} ({} of {} pixels painted)",
        output,
        mask.painted_pixels(),
        width as u64 * height as u64
    );
    Ok(())
}

fn diff_command(original: &Path, edited: &Path, instructions: Option<&str>) -> Result<()> {
    let original = StructuredDescription::from_value(load_json(original)?)?;
    let edited = StructuredDescription::from_value(load_json(edited)?)?;
    let changes = edit_studio::prompt_diff::diff_descriptions(&original.normalize(), &edited.normalize());
    info!("{} field(s) changed", changes.len());
    let instruction = edit_studio::prompt_diff::build_regeneration_instruction(
        &changes,
        instructions.unwrap_or_default(),
    )?;
    println!("{instruction}");
    Ok(())
}

struct EditArgs<'a> {
    tool: ToolKind,
    strokes: Option<&'a Path>,
    size: Option<(u32, u32)>,
    prompt: Option<String>,
    intensity: Option<u8>,
    aspect_ratio: Option<AspectRatio>,
}

async fn edit_command(
    backend: &dyn ImageCapabilities,
    config: StudioConfig,
    image_path: &Path,
    args: EditArgs<'_>,
    output: &Path,
) -> Result<()> {
    let image = load_image(image_path)?;
    let (width, height) = match (args.size, args.strokes) {
        (Some(size), _) => size,
        (None, Some(_)) => anyhow::bail!("--width and --height are required with --strokes"),
        (None, None) => (0, 0),
    };

    let mut studio = EditStudio::open(image, width, height, config);
    studio.select_tool(args.tool)?;

    if let Some(path) = args.strokes {
        let strokes = StrokeFile::load(path)?;
        if let Some(viewport) = strokes.viewport {
            studio.set_viewport(viewport);
        }
        if let Some(brush) = strokes.brush {
            studio.set_brush_diameter(brush);
        }
        for stroke in &strokes.strokes {
            let mut points = stroke.iter();
            if let Some(first) = points.next() {
                studio.pointer_down(*first);
                points.for_each(|p| studio.pointer_move(*p));
                studio.pointer_up();
            }
        }
    }

    if let Some(value) = args.intensity {
        studio.tools_mut().set_blur_intensity(value)?;
    }
    let inputs = studio.tools_mut().inputs_mut();
    if let Some(ratio) = args.aspect_ratio {
        inputs.expand_aspect_ratio = ratio;
    }
    if let Some(prompt) = args.prompt {
        match args.tool {
            ToolKind::GenerativeFill => inputs.fill_prompt = prompt,
            ToolKind::ReplaceBackground => inputs.replace_prompt = prompt,
            ToolKind::Expand => inputs.expand_prompt = prompt,
            other => warn!("{} takes no prompt; ignoring --prompt", other),
        }
    }

    info!("Applying {} via {}", args.tool, backend.name());
    studio.apply(backend).await?;
    info!("Result: {}", studio.current().url);

    write_json(output, &studio.save()?)
}

async fn remix_command(
    backend: &dyn ImageCapabilities,
    config: StudioConfig,
    image_path: &Path,
    edits: Option<&Path>,
    instructions: Option<&str>,
    dry_run: bool,
    output: Option<&Path>,
) -> Result<()> {
    let image = load_image(image_path)?;
    let mut studio = EditStudio::open(image, 0, 0, config);
    studio.open_remix(backend).await?;

    let edits: Map<String, Value> = match edits {
        Some(path) => match load_json(path)? {
            Value::Object(map) => map,
            _ => anyhow::bail!("{} must hold a JSON object", path.display()),
        },
        None => Map::new(),
    };

    let editor = studio
        .remix_mut()
        .context("Structured remix did not start")?;
    for (field, value) in &edits {
        editor
            .set_value(field, FieldValue::normalize(value))
            .with_context(|| format!("Cannot edit field '{field}'"))?;
    }
    if let Some(text) = instructions {
        editor.set_additional_instructions(text);
    }

    if dry_run {
        println!("{}", editor.regeneration_instruction()?);
        return Ok(());
    }

    studio.regenerate(backend).await?;
    info!("Variation: {}", studio.current().url);
    studio.accept_variation()?;

    let saved = studio.save()?;
    match output {
        Some(path) => write_json(path, &saved),
        None => {
            println!("{}", serde_json::to_string_pretty(&saved.current)?);
            Ok(())
        }
    }
}

async fn check_command(backend: &HttpBackend) -> Result<()> {
    let url = &backend.config().api_url;
    if backend.is_available().await? {
        info!("Generation service at {} is reachable", url);
        Ok(())
    } else {
        anyhow::bail!("Generation service at {} is not reachable", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_file_parsing() {
        let file: StrokeFile = serde_json::from_str(
            r#"{"viewport": {"left": 0, "top": 0, "width": 50, "height": 50},
                "strokes": [[{"x": 1, "y": 2}, {"x": 3, "y": 4}]]}"#,
        )
        .unwrap();
        assert_eq!(file.viewport, Some(RenderedBox::new(0.0, 0.0, 50.0, 50.0)));
        assert_eq!(file.brush, None);
        assert_eq!(file.strokes[0][1], Point::new(3.0, 4.0));
    }

    #[test]
    fn test_cli_parses_edit() {
        let cli = Cli::try_parse_from([
            "storyboard-edit",
            "edit",
            "--image",
            "frame.json",
            "--tool",
            "generative_fill",
            "--aspect-ratio",
            "4:3",
            "--output",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Edit {
                tool, aspect_ratio, ..
            } => {
                assert_eq!(tool, ToolKind::GenerativeFill);
                assert_eq!(aspect_ratio, Some(AspectRatio::Landscape4x3));
            }
            _ => panic!("expected edit"),
        }
    }
}
