//! Inspect an audio asset the way the cache sees it.
//!
//! Resolves the file through the sandboxed filesystem, probes it and prints
//! its metadata. With `--frames` it also DMA-reads a window of one track and
//! prints the samples.

use anyhow::{Context, Result};
use clap::Parser;
use resound::{AudioCache, CacheConfig, CacheStrategy, DmaRequest};
use resound_decoder::{CodecType, Metadata};
use std::path::PathBuf;

/// Probe an audio file through the resource cache
#[derive(Debug, Parser)]
#[command(name = "resound-probe", about = "Probe audio assets through the resource cache", version)]
struct Args {
    /// Base directory, below the root
    base_dir: String,

    /// File path relative to the base directory
    path: String,

    /// Root directory that relative base directories resolve against
    #[arg(long, env = "RESOUND_ROOT", default_value = ".")]
    root: PathBuf,

    /// Codec: 0 auto, 1 wav, 2 flac, 3 vorbis, 4 opus, 5 mp3
    #[arg(long, default_value_t = 0)]
    codec: u32,

    /// Extra extension to treat as a zip archive
    #[arg(long = "archive-ext")]
    archive_extensions: Vec<String>,

    /// Cache configuration as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// First frame to dump
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Frames to dump (0 prints metadata only)
    #[arg(long, default_value_t = 0)]
    frames: u64,

    /// Track to dump
    #[arg(long, default_value_t = 0)]
    track: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            CacheConfig::from_json(&json)?
        }
        None => CacheConfig::default(),
    };

    let cache = AudioCache::manual(config)?;
    cache.set_default_directory(&args.root);
    cache.add_allowed_directory(&args.root);
    for ext in &args.archive_extensions {
        cache.register_archive_extension(ext);
    }

    let (id, meta) = cache
        .register_audio(
            CacheStrategy::None,
            CodecType::from_raw(args.codec),
            &args.base_dir,
            &args.path,
            Metadata::default(),
        )
        .with_context(|| format!("registering {}/{}", args.base_dir, args.path))?;

    println!("resource:     {id}");
    println!("tracks:       {}", meta.track_count);
    println!("sample rate:  {} Hz", meta.sample_rate);
    println!("frames:       {}", meta.sample_count);
    println!("loop:         {}..{} (count {})", meta.loop_start, meta.loop_end, meta.loop_count);

    if args.frames > 0 {
        let len = usize::try_from(args.frames * 2).context("window too large")?;
        let mut pcm = vec![0u8; len];
        cache
            .dma(
                id,
                &mut pcm,
                &DmaRequest::new(args.offset, args.frames).with_args(args.track, 0),
            )
            .context("reading samples")?;

        for (i, sample) in pcm.chunks_exact(2).enumerate() {
            println!("{:>10} {:>6}", args.offset + i as u64, i16::from_be_bytes([sample[0], sample[1]]));
        }
    }

    Ok(())
}
