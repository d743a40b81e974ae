use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use tabvid::{
    BitDepth, CodecOptions, EncodeOptions, FfmpegCodec, FrameSequence, GeneratorOptions,
    RawFileCodec, Recipe, Shape, Table, VideoCodec,
};

#[derive(Parser, Debug)]
#[command(name = "tabvid", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Propose a recipe for a table by grouping columns that share a name prefix.
    Recipe(RecipeArgs),
    /// Encode a table into videos plus sidecars.
    Encode(EncodeArgs),
    /// Rebuild a table from a job's artifacts.
    Decode(DecodeArgs),
    /// Pretty-print a sidecar.
    Inspect(InspectArgs),
    /// Write one decoded frame of a 1- or 3-channel artifact as PNG.
    Preview(PreviewArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    /// System `ffmpeg`/`ffprobe`.
    Ffmpeg,
    /// Uncompressed frames on disk.
    Raw,
}

#[derive(Parser, Debug)]
struct CodecArgs {
    /// Video backend.
    #[arg(long, value_enum, default_value_t = Backend::Ffmpeg)]
    backend: Backend,

    /// `ffmpeg` executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// `ffprobe` executable.
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,
}

impl CodecArgs {
    fn build(&self) -> Box<dyn VideoCodec> {
        match self.backend {
            Backend::Ffmpeg => Box::new(FfmpegCodec::with_paths(
                self.ffmpeg.clone(),
                self.ffprobe.clone(),
            )),
            Backend::Raw => Box::new(RawFileCodec::new()),
        }
    }
}

#[derive(Parser, Debug)]
struct RecipeArgs {
    /// Input table (`.json`, or `.parquet` with the `parquet` feature).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output recipe JSON.
    #[arg(long)]
    out: PathBuf,

    /// Codec for every rule (`c:v`).
    #[arg(long)]
    codec: Option<String>,

    /// Force a bit depth (8 or 16) for every rule.
    #[arg(long)]
    bit_depth: Option<u32>,
}

#[derive(Parser, Debug)]
struct EncodeArgs {
    /// Input table (`.json`, or `.parquet` with the `parquet` feature).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Recipe JSON; generated from the table when omitted.
    #[arg(long)]
    recipe: Option<PathBuf>,

    /// Output directory.
    #[arg(long)]
    out_dir: PathBuf,

    /// Job identifier (subdirectory of `--out-dir`).
    #[arg(long)]
    job: String,

    /// Encode rules one after another instead of on a thread pool.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Allowed overshoot of each value range, as a fraction of its span.
    #[arg(long, default_value_t = 0.0)]
    range_tolerance: f64,

    /// Frame rate handed to the codec.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    #[command(flatten)]
    codec: CodecArgs,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Output directory used at encode time.
    #[arg(long)]
    out_dir: PathBuf,

    /// Job identifier.
    #[arg(long)]
    job: String,

    /// Decode a single array; all arrays are merged into one table when omitted.
    #[arg(long)]
    name: Option<String>,

    /// Output table (`.json`, or `.parquet` with the `parquet` feature).
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    codec: CodecArgs,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Sidecar JSON.
    sidecar: PathBuf,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Output directory used at encode time.
    #[arg(long)]
    out_dir: PathBuf,

    /// Job identifier.
    #[arg(long)]
    job: String,

    /// Array name.
    #[arg(long)]
    name: String,

    /// Frame index (0-based).
    #[arg(long, default_value_t = 0)]
    frame: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    codec: CodecArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Recipe(args) => cmd_recipe(args),
        Command::Encode(args) => cmd_encode(args),
        Command::Decode(args) => cmd_decode(args),
        Command::Inspect(args) => cmd_inspect(args),
        Command::Preview(args) => cmd_preview(args),
    }
}

fn is_parquet(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "parquet")
}

fn load_table(path: &Path) -> anyhow::Result<Table> {
    if is_parquet(path) {
        #[cfg(feature = "parquet")]
        return Ok(tabvid::table::parquet::read_parquet(path)?);
        #[cfg(not(feature = "parquet"))]
        anyhow::bail!("reading '{}' requires the 'parquet' feature", path.display());
    }
    Ok(Table::from_json_path(path)?)
}

fn save_table(table: &Table, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    if is_parquet(path) {
        #[cfg(feature = "parquet")]
        return Ok(tabvid::table::parquet::write_parquet(table, path)?);
        #[cfg(not(feature = "parquet"))]
        anyhow::bail!("writing '{}' requires the 'parquet' feature", path.display());
    }
    Ok(table.to_json_path(path)?)
}

fn generator_options(
    codec: Option<String>,
    bit_depth: Option<u32>,
) -> anyhow::Result<GeneratorOptions> {
    let mut opts = GeneratorOptions::default();
    if let Some(c) = codec {
        opts.codec_options = CodecOptions::new().set("c:v", c);
    }
    opts.bit_depth = bit_depth.map(BitDepth::try_from).transpose()?;
    Ok(opts)
}

fn cmd_recipe(args: RecipeArgs) -> anyhow::Result<()> {
    let table = load_table(&args.in_path)?;
    let recipe = tabvid::generate(&table, &generator_options(args.codec, args.bit_depth)?)?;
    std::fs::write(&args.out, recipe.to_json_string()?)
        .with_context(|| format!("write recipe '{}'", args.out.display()))?;
    eprintln!("wrote {} rules to {}", recipe.len(), args.out.display());
    Ok(())
}

fn cmd_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let table = load_table(&args.in_path)?;
    let recipe = match &args.recipe {
        Some(p) => Recipe::from_path(p)?,
        None => tabvid::generate(&table, &GeneratorOptions::default())?,
    };
    let codec = args.codec.build();
    let opts = EncodeOptions {
        parallel: !args.sequential,
        threads: args.threads,
        range_tolerance: args.range_tolerance,
        frame_rate: args.fps,
    };

    let report = tabvid::encode_dataset(
        &table,
        &args.job,
        &recipe,
        &args.out_dir,
        codec.as_ref(),
        &opts,
    )?;
    for s in report.succeeded() {
        eprintln!(
            "{}: {} ({}, {} bytes, ratio {:.2}, bpppb {:.4}, {:.2?})",
            s.name,
            s.video_path.display(),
            s.pixel_format,
            s.compressed_bytes,
            s.compression_ratio().unwrap_or(f64::NAN),
            s.bpppb().unwrap_or(f64::NAN),
            s.write_time
        );
        for w in &s.warnings {
            eprintln!("  warning: {w}");
        }
    }
    let failed: Vec<_> = report.failed().collect();
    for (name, e) in &failed {
        eprintln!("{name}: FAILED: {e}");
    }
    if !failed.is_empty() {
        anyhow::bail!("{} of {} rules failed", failed.len(), report.outcomes.len());
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let codec = args.codec.build();
    let table = match &args.name {
        Some(name) => tabvid::decode_dataset(&args.out_dir, &args.job, name, codec.as_ref())?,
        None => {
            let mut columns = Vec::new();
            let arrays = tabvid::decode_job(&args.out_dir, &args.job, codec.as_ref())?;
            for (name, outcome) in arrays {
                let t = outcome.with_context(|| format!("decode array '{name}'"))?;
                columns.extend(t.columns().iter().cloned());
            }
            Table::new(columns)?
        }
    };
    save_table(&table, &args.out)?;
    eprintln!(
        "wrote {} columns x {} rows to {}",
        table.columns().len(),
        table.rows(),
        args.out.display()
    );
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let sidecar = tabvid::read_sidecar(&args.sidecar)?;
    let g = sidecar.geometry();
    println!("{}", String::from_utf8_lossy(&sidecar.to_bytes()?));
    eprintln!(
        "{}: {} frames of {}x{} {} in .{}, {} columns, scaled={}, reduced={}",
        sidecar.name,
        g.frames,
        g.width,
        g.height,
        sidecar.pixel_format,
        sidecar.container,
        sidecar.columns.len(),
        sidecar.normalization.scaled,
        sidecar.reduction.is_some()
    );
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let sidecar_path = tabvid::sidecar_path(&args.out_dir, &args.job, &args.name);
    let sidecar = tabvid::read_sidecar(&sidecar_path)?;
    let channels = sidecar.pixel_format.channels();
    let color = match channels {
        1 => image::ColorType::L8,
        3 => image::ColorType::Rgb8,
        c => anyhow::bail!(
            "preview supports 1 or 3 channel artifacts, '{}' has {c}",
            args.name
        ),
    };

    let codec = args.codec.build();
    let handle = tabvid::ArtifactHandle {
        path: tabvid::job_dir(&args.out_dir, &args.job).join(sidecar.video_file_name()),
        geometry: sidecar.geometry(),
    };
    let mut seq = codec.decode(&handle)?;
    if args.frame >= seq.frames.len() {
        anyhow::bail!(
            "frame {} out of range ({} frames)",
            args.frame,
            seq.frames.len()
        );
    }
    let g = handle.geometry;
    let one = FrameSequence {
        width: seq.width,
        height: seq.height,
        pixel_format: seq.pixel_format,
        frames: vec![seq.frames.swap_remove(args.frame)],
    };
    let shape = Shape::new(vec![1, g.height, g.width, channels])?;
    let samples = tabvid::unpack(&one, &shape)?;
    let shift: u32 = match sidecar.pixel_format.bit_depth() {
        BitDepth::Eight => 0,
        BitDepth::Sixteen => 8,
    };
    let bytes: Vec<u8> = samples.data().iter().map(|v| (*v >> shift) as u8).collect();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &bytes,
        g.width as u32,
        g.height as u32,
        color,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
