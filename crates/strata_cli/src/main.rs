//! `strata`: translate a USDA file and print the nodes it produces.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use strata_render::{NodeMask, Universe, UniverseSnapshot};
use strata_translator::{Reader, ReaderConfig};

/// Translate a USDA file into renderer nodes and print them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// USDA file to read.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Worker threads (0: one walker, jobs on the pool).
    #[arg(long)]
    threads: Option<usize>,

    /// Frame to read.
    #[arg(long)]
    frame: Option<f32>,

    /// Only read the subtree at this prim path.
    #[arg(long, value_name = "PRIM_PATH")]
    path: Option<String>,

    /// Render purpose (default: render).
    #[arg(long)]
    purpose: Option<String>,

    /// Node categories to create, comma separated.
    #[arg(long, value_name = "CATEGORIES", value_parser = parse_mask)]
    mask: Option<NodeMask>,

    /// Shutter relative to the frame.
    #[arg(long, num_args = 2, value_names = ["OPEN", "CLOSE"], allow_negative_numbers = true)]
    motion_blur: Option<Vec<f32>>,

    /// Layer stacked over the file, strongest first.
    #[arg(long = "override", value_name = "FILE")]
    overrides: Vec<PathBuf>,

    /// Reader settings as JSON, flags override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the node graph as JSON.
    #[arg(long)]
    json: bool,

    /// Log every translated prim.
    #[arg(long)]
    debug: bool,
}

fn parse_mask(list: &str) -> Result<NodeMask, String> {
    NodeMask::parse(list).ok_or_else(|| format!("unknown category in '{}'", list))
}

/// Reader settings from the config file, then the flags.
fn reader_config(options: &Cli) -> Result<ReaderConfig> {
    let mut config = match &options.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            ReaderConfig::from_json(&json).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => ReaderConfig::default(),
    };

    if let Some(threads) = options.threads {
        config.thread_count = threads;
    }
    if let Some(frame) = options.frame {
        config.frame = frame;
    }
    if let Some(purpose) = &options.purpose {
        config.purpose = purpose.clone();
    }
    if let Some(mask) = options.mask {
        config.mask = mask;
    }
    if let Some([open, close]) = options.motion_blur.as_deref() {
        let (open, close) = (*open, *close);
        config.motion_blur = close > open;
        config.motion_start = open;
        config.motion_end = close;
    }
    config.debug |= options.debug;
    Ok(config)
}

fn print_nodes(snapshot: &UniverseSnapshot) {
    for node in &snapshot.nodes {
        println!("{} ({})", node.name, node.node_type);
        for (param, value) in &node.attributes {
            println!("    {} = {}", param, value);
        }
        for (param, source) in &node.links {
            println!("    {} <- {}", param, source);
        }
    }
}

fn main() -> Result<()> {
    let options = Cli::parse();
    let config = reader_config(&options)?;

    env_logger::Builder::from_default_env()
        .filter_level(if config.debug {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    let overrides = options
        .overrides
        .iter()
        .map(|path| std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let universe = Arc::new(Universe::new());
    let mut reader = Reader::with_config(universe.clone(), config);

    let start = Instant::now();
    reader
        .read_file(&options.file, &overrides, options.path.as_deref())
        .with_context(|| format!("Failed to read {}", options.file.display()))?;
    log::info!(
        "Read {} nodes from {} in {:.2?}",
        reader.nodes().len(),
        options.file.display(),
        start.elapsed()
    );

    let snapshot = universe.snapshot_of(reader.nodes());
    if options.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_nodes(&snapshot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("strata").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let options = parse(&[
            "scene.usda",
            "--threads",
            "4",
            "--mask",
            "shape,shader",
            "--motion-blur",
            "-0.25",
            "0.25",
            "--override",
            "a.usda",
            "--override",
            "b.usda",
            "--json",
        ])
        .unwrap();

        assert_eq!(options.file, PathBuf::from("scene.usda"));
        assert_eq!(options.threads, Some(4));
        assert_eq!(options.mask, Some(NodeMask::SHAPE | NodeMask::SHADER));
        assert_eq!(options.motion_blur, Some(vec![-0.25, 0.25]));
        assert_eq!(options.overrides, vec![PathBuf::from("a.usda"), PathBuf::from("b.usda")]);
        assert!(options.json);
        assert!(!options.debug);

        let config = reader_config(&options).unwrap();
        assert!(config.motion_blur);
        assert_eq!(config.motion_start, -0.25);
        assert_eq!(config.motion_end, 0.25);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.usda", "b.usda"]).is_err());
        assert!(parse(&["a.usda", "--threads"]).is_err());
        assert!(parse(&["a.usda", "--threads", "many"]).is_err());
        assert!(parse(&["a.usda", "--mask", "shape,teapot"]).is_err());
        assert!(parse(&["a.usda", "--motion-blur", "0.5"]).is_err());
        assert!(parse(&["a.usda", "--fast"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "thread_count": 8, "frame": 12, "purpose": "preview" }"#).unwrap();

        let options = parse(&["a.usda", "--config", path.to_str().unwrap(), "--threads", "2"]).unwrap();
        let config = reader_config(&options).unwrap();
        assert_eq!(config.thread_count, 2);
        assert_eq!(config.frame, 12.0);
        assert_eq!(config.purpose, "preview");
        assert!(!config.motion_blur);
    }
}
