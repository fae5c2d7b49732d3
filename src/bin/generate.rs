//! One-shot CLI binary for the generation provider
//!
//! Generates a single image (saved to disk, metadata printed as JSON) or
//! streams a text completion to stdout.
//!
//! # Usage
//!
//! ```bash
//! perchance-gen --prompt "a cat sitting on stairs" --shape landscape
//! perchance-gen --text --prompt "write a story about a cat"
//! ```

use clap::Parser;
use futures::StreamExt;
use perchance_gen_provider::{
    ImageGenerator, ImageRequest, ImageShape, TextGenerator, TextRequest,
    config::ConfigLoader,
};
use std::io::Write;
use std::path::PathBuf;

/// One-shot generation CLI for the Perchance backends
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "perchance-gen")]
struct Cli {
    /// Generation prompt
    #[arg(short, long, value_name = "PROMPT")]
    prompt: String,

    /// Stream a text completion instead of generating an image
    #[arg(short, long)]
    text: bool,

    /// Things that must NOT appear in the image
    #[arg(short, long, value_name = "NEGATIVE_PROMPT")]
    negative_prompt: Option<String>,

    /// Generation seed (-1 lets the backend choose)
    #[arg(short, long, default_value_t = -1)]
    seed: i64,

    /// Image shape: portrait, square or landscape
    #[arg(long, default_value = "square", value_parser = parse_shape)]
    shape: ImageShape,

    /// Prompt adherence in the nominal range 1-30
    #[arg(short, long, default_value_t = 7.0)]
    guidance_scale: f64,

    /// Text the completion should start with (text mode only)
    #[arg(long, value_name = "START_WITH")]
    start_with: Option<String>,

    /// Output file for the generated image
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn parse_shape(value: &str) -> Result<ImageShape, String> {
    match value {
        "portrait" => Ok(ImageShape::Portrait),
        "square" => Ok(ImageShape::Square),
        "landscape" => Ok(ImageShape::Landscape),
        other => Err(format!(
            "invalid shape '{}', expected portrait, square or landscape",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging goes to stderr so stdout stays clean for the output
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli
        .config
        .clone()
        .or_else(perchance_gen_provider::Settings::default_config_path);
    let settings = ConfigLoader::new().load(config_path.as_deref())?;

    if cli.text {
        run_text(&cli, settings).await
    } else {
        run_image(&cli, settings).await
    }
}

async fn run_image(cli: &Cli, settings: perchance_gen_provider::Settings) -> anyhow::Result<()> {
    let generator = ImageGenerator::new(settings)?;

    let mut request = ImageRequest::new(&cli.prompt)
        .with_seed(cli.seed)
        .with_shape(cli.shape)
        .with_guidance_scale(cli.guidance_scale);
    if let Some(negative) = &cli.negative_prompt {
        request = request.with_negative_prompt(negative);
    }

    let result = generator.generate(&request).await?;
    let path = result.save(cli.output.as_deref()).await?;

    let metadata = serde_json::json!({
        "imageId": result.image_id,
        "fileExtension": result.file_ext,
        "seed": result.seed,
        "width": result.width,
        "height": result.height,
        "maybeNsfw": result.maybe_nsfw,
        "file": path,
    });
    println!("{}", serde_json::to_string_pretty(&metadata)?);

    Ok(())
}

async fn run_text(cli: &Cli, settings: perchance_gen_provider::Settings) -> anyhow::Result<()> {
    let generator = TextGenerator::new(settings)?;

    let mut request = TextRequest::new(&cli.prompt);
    if let Some(start_with) = &cli.start_with {
        request = request.with_start_with(start_with);
    }

    let mut stream = generator.text(&request).await?;
    let mut stdout = std::io::stdout();
    while let Some(token) = stream.next().await {
        write!(stdout, "{}", token?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_image_defaults() {
        let cli = Cli::parse_from(["perchance-gen", "--prompt", "a cat"]);
        assert_eq!(cli.prompt, "a cat");
        assert!(!cli.text);
        assert_eq!(cli.seed, -1);
        assert_eq!(cli.shape, ImageShape::Square);
        assert_eq!(cli.guidance_scale, 7.0);
    }

    #[test]
    fn test_cli_shape_parsing() {
        let cli = Cli::parse_from(["perchance-gen", "--prompt", "a cat", "--shape", "landscape"]);
        assert_eq!(cli.shape, ImageShape::Landscape);

        assert!(parse_shape("circle").is_err());
    }

    #[test]
    fn test_cli_text_mode() {
        let cli = Cli::parse_from([
            "perchance-gen",
            "--text",
            "--prompt",
            "write a story",
            "--start-with",
            "Once",
        ]);
        assert!(cli.text);
        assert_eq!(cli.start_with, Some("Once".to_string()));
    }
}
