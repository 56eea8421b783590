use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use spotmerge::{
    Assembly as _, CpuRenderService, InMemoryAssembly, OutputPattern, RasterSession,
    RasterSessionOpts, SpotBinding, SpotLut, SpotMergeSpec, TiffSinkFactory, cyan_yellow_ramp,
    load_fragment_shader, white_green_red_ramp,
};

#[derive(Parser, Debug)]
#[command(name = "spotmerge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single page as an RGB preview PNG.
    Page(PageArgs),
    /// Render every page of an assembly to numbered CMYK TIFF files.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct PageArgs {
    /// Input assembly JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Compiled fragment shader program for the merge stage (SPIR-V).
    #[arg(long)]
    shader: PathBuf,

    /// Document index (0-based).
    #[arg(long, default_value_t = 0)]
    doc: u32,

    /// Page index (0-based).
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Target resolution in dots per inch.
    #[arg(long, default_value_t = 300.0)]
    resolution: f64,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input assembly JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Compiled fragment shader program for the merge stage (SPIR-V).
    #[arg(long)]
    shader: PathBuf,

    /// Output TIFF pattern containing one `%u` page-ordinal placeholder.
    #[arg(long)]
    out: String,

    /// Target resolution in dots per inch.
    #[arg(long, default_value_t = 300.0)]
    resolution: f64,

    /// Render pages on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// Worker thread count for --parallel.
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Page(args) => cmd_page(args),
        Command::Render(args) => cmd_render(args),
    }
}

/// Build the demo merge group: "Foo" cycling white through green to red,
/// "Bar" cycling cyan to yellow.
fn build_merge_spec(
    svc: &mut CpuRenderService,
    shader_path: &Path,
) -> anyhow::Result<SpotMergeSpec> {
    let foo = SpotLut::from_ramp(white_green_red_ramp)?.upload(svc)?;
    let bar = SpotLut::from_ramp(cyan_yellow_ramp)?.upload(svc)?;
    let shader = load_fragment_shader(shader_path, svc)?;
    Ok(SpotMergeSpec::new(
        vec![SpotBinding::new("Foo", foo), SpotBinding::new("Bar", bar)],
        shader,
        Vec::new(),
    )?)
}

fn cmd_page(args: PageArgs) -> anyhow::Result<()> {
    let assembly = InMemoryAssembly::from_path(&args.in_path)?;
    let mut svc = CpuRenderService::new();
    let merge = build_merge_spec(&mut svc, &args.shader)?;

    let content = assembly
        .document(args.doc)?
        .page(args.page)?
        .content()?;

    let session = RasterSession::new(RasterSessionOpts {
        resolution_dpi: args.resolution,
        ..RasterSessionOpts::default()
    })?;
    let (dims, cmyk) = session.render_page(&content, &svc, std::slice::from_ref(&merge))?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    let rgb = cmyk_to_rgb8(&cmyk);
    image::save_buffer_with_format(
        &args.out,
        &rgb,
        dims.width,
        dims.height,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let assembly = InMemoryAssembly::from_path(&args.in_path)?;
    let mut svc = CpuRenderService::new();
    let merge = build_merge_spec(&mut svc, &args.shader)?;

    let pattern = OutputPattern::new(&args.out)?;
    let sinks = TiffSinkFactory::new(pattern);

    let session = RasterSession::new(RasterSessionOpts {
        resolution_dpi: args.resolution,
        parallel: args.parallel,
        threads: args.threads,
    })?;
    let stats =
        session.render_assembly(&assembly, &svc, std::slice::from_ref(&merge), &sinks)?;

    eprintln!(
        "wrote {} page(s) across {} document(s) to {}",
        stats.pages, stats.documents, args.out
    );
    Ok(())
}

/// Naive conversion from 8-bit CMYK to 8-bit RGB for preview output.
fn cmyk_to_rgb8(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk.len() / 4 * 3);
    for px in cmyk.chunks_exact(4) {
        let k = f32::from(px[3]) / 255.0;
        for ch in &px[..3] {
            let v = (1.0 - f32::from(*ch) / 255.0) * (1.0 - k);
            rgb.push((v * 255.0).round().clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}
