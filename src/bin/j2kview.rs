//! j2kview CLI - inspect JPEG 2000 files and decode tiles, reduced
//! resolutions or regions of them.

use clap::{Parser, Subcommand, ValueEnum};
use j2kview_rs::codestream::{self, progression_order_name};
use j2kview_rs::{
    DecodeEngine, DecodeSession, DecodedImage, J2kViewError, SourceHandle, default_engine,
};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

type Engine = Box<dyn DecodeEngine + Send + Sync>;

/// JPEG 2000 tile, resolution and region decoder
#[derive(Parser)]
#[command(name = "j2kview")]
#[command(author = "j2kview-rs contributors")]
#[command(version)]
#[command(about = "Inspect and partially decode JPEG 2000 images", long_about = None)]
#[command(after_help = "EXAMPLES:
    j2kview info -i image.jp2
    j2kview decode -i image.j2k -o tile.pnm -f pnm --tile 3 --reduce 1
    j2kview decode -i image.jp2 -o region.raw --area 100,100,612,612
    j2kview view -i image.jp2

Set RUST_LOG=debug (or pass -v) to trace parameter negotiation.
Decoding requires a build with the `openjpeg` feature.")]
struct Cli {
    /// Log every parameter change and decode
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show codestream geometry: tiles, resolutions, components
    #[command(visible_alias = "i")]
    Info {
        #[arg(short, long, help = "Path to a .j2k/.j2c/.jp2 file")]
        input: PathBuf,
    },

    /// Check whether a file looks like JPEG 2000 (exit code 1 if not)
    Probe {
        #[arg(short, long, help = "Path to the file to check")]
        input: PathBuf,
    },

    /// Decode the whole image, one tile, or a region
    #[command(visible_alias = "d")]
    Decode {
        #[arg(short, long, help = "Path to a .j2k/.j2c/.jp2 file")]
        input: PathBuf,

        #[arg(short, long, help = "Path for the decoded pixels")]
        output: PathBuf,

        /// Tile index, counted row by row from the top-left tile
        #[arg(long, conflicts_with = "area")]
        tile: Option<i64>,

        /// Resolution levels to discard (0 = full size)
        #[arg(long, conflicts_with = "area")]
        reduce: Option<i64>,

        /// Region on the reference grid, as x0,y0,x1,y1
        #[arg(long)]
        area: Option<String>,

        /// Output format: raw samples or PGM/PPM
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,
    },

    /// Interactive session driven by commands on stdin
    #[command(visible_alias = "v")]
    View {
        #[arg(short, long, help = "Path to a .j2k/.j2c/.jp2 file")]
        input: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Samples only: 8-bit gray, big-endian 16-bit gray or RGB triplets
    Raw,
    /// PGM for gray, PPM for color
    Pnm,
}

const VIEW_HELP: &str = "commands:
    tile N            decode tile N at the current reduction
    reduce R          discard R resolution levels
    area x0,y0,x1,y1  decode a region at full resolution
    reload            back to the whole image, re-reading the bounds
    open FILE         switch to another file
    decode [FILE]     decode again; write the pixels to FILE if given
    status            show the current request and bounds
    quit";

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let result = match cli.command {
        Commands::Info { input } => show_info(&input),
        Commands::Probe { input } => probe(&input),
        Commands::Decode {
            input,
            output,
            tile,
            reduce,
            area,
            format,
        } => decode_image(&input, &output, tile, reduce, area.as_deref(), &format),
        Commands::View { input } => view(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn engine() -> Result<Engine, J2kViewError> {
    default_engine().ok_or(J2kViewError::EngineUnavailable)
}

fn show_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let header = codestream::read_header(&data)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();
    println!("  Dimensions:  {}x{}", header.width(), header.height());
    println!("  Components:  {}", header.components.len());
    for (i, c) in header.components.iter().enumerate() {
        println!(
            "    [{}] {} bits{}, subsampling {}x{}",
            i,
            c.depth,
            if c.is_signed { " signed" } else { "" },
            c.dx,
            c.dy
        );
    }
    println!(
        "  Tiles:       {} ({}x{} of {}x{})",
        header.tile_count(),
        header.tiles_across(),
        header.tiles_down(),
        header.tile_width,
        header.tile_height
    );
    println!("  Resolutions: {}", header.resolution_count());
    if let Some(cod) = header.cod {
        println!("  Layers:      {}", cod.number_of_layers);
        println!(
            "  Progression: {}",
            progression_order_name(cod.progression_order)
        );
        println!(
            "  Wavelet:     {}",
            if cod.transformation == 1 { "5/3 reversible" } else { "9/7 irreversible" }
        );
    }
    match header.output_depth() {
        Ok(depth) => println!("  Decodes to:  {} bits per pixel", depth.bits()),
        Err(e) => println!("  Decodes to:  not supported ({})", e),
    }
    Ok(())
}

fn probe(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = SourceHandle::from_path(input);
    let decodable = match default_engine() {
        Some(engine) => engine.probe(&source),
        None => codestream::probe_bytes(&source.read_bytes()?),
    };
    println!("{}: {}", input.display(), if decodable { "JPEG 2000" } else { "not JPEG 2000" });
    if !decodable {
        std::process::exit(1);
    }
    Ok(())
}

fn decode_image(
    input: &Path,
    output: &Path,
    tile: Option<i64>,
    reduce: Option<i64>,
    area: Option<&str>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = DecodeSession::new(engine()?);
    session.set_source(SourceHandle::from_path(input));
    if let Some(reduce) = reduce {
        session.set_reduction(reduce)?;
    }
    if let Some(tile) = tile {
        session.set_tile(tile)?;
    }
    if let Some(area) = area {
        session.set_area_str(area)?;
    }

    let image = session.decode()?;
    write_image(output, &image, session.width(), session.height(), format)?;

    println!(
        "Decoded {}x{} ({} bits) with {} to {:?}",
        session.width(),
        session.height(),
        session.bit_depth(),
        session.engine().name(),
        output
    );
    Ok(())
}

fn view(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = DecodeSession::new(engine()?);
    session.set_source(SourceHandle::from_path(input));
    let mut image = report(&mut session);
    println!("{}", VIEW_HELP);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let arg = words.next();

        let changed: Result<bool, Box<dyn std::error::Error>> = match (command, arg) {
            ("quit" | "q" | "exit", _) => break,
            ("help" | "?", _) => {
                println!("{}", VIEW_HELP);
                Ok(false)
            }
            ("status", _) => {
                print_status(&session);
                Ok(false)
            }
            ("tile", Some(n)) => parse_number(n)
                .and_then(|n| Ok(session.set_tile(n)?))
                .map(|_| true),
            ("reduce", Some(r)) => parse_number(r)
                .and_then(|r| Ok(session.set_reduction(r)?))
                .map(|_| true),
            ("area", Some(text)) => session.set_area_str(text).map(|_| true).map_err(Into::into),
            ("reload", _) => {
                session.reload();
                Ok(true)
            }
            ("open", Some(path)) => {
                session.set_source(SourceHandle::from_path(path));
                Ok(true)
            }
            ("decode", out) => {
                image = report(&mut session);
                match (out, image.as_ref()) {
                    (Some(out), Some(pixels)) => {
                        let format = if [".pgm", ".ppm", ".pnm"].iter().any(|ext| out.ends_with(ext)) {
                            OutputFormat::Pnm
                        } else {
                            OutputFormat::Raw
                        };
                        write_image(Path::new(out), pixels, session.width(), session.height(), &format)
                            .map(|_| {
                                println!("wrote {}", out);
                                false
                            })
                            .map_err(Into::into)
                    }
                    _ => Ok(false),
                }
            }
            _ => {
                println!("unknown command, type `help`");
                Ok(false)
            }
        };

        match changed {
            Ok(true) => image = report(&mut session),
            Ok(false) => {}
            Err(e) => println!("{}", e),
        }
    }
    Ok(())
}

fn parse_number(text: &str) -> Result<i64, Box<dyn std::error::Error>> {
    text.parse()
        .map_err(|_| format!("expected an integer, got \"{}\"", text).into())
}

/// Decodes with the current parameters and prints the outcome.
fn report(session: &mut DecodeSession<Engine>) -> Option<DecodedImage> {
    match session.decode() {
        Ok(image) => {
            print_status(session);
            Some(image)
        }
        Err(e) => {
            println!("decode failed: {}", e);
            None
        }
    }
}

fn print_status(session: &DecodeSession<Engine>) {
    let source = session
        .source()
        .map(|s| s.describe())
        .unwrap_or_else(|| "-".to_string());
    println!("engine:     {}", session.engine().name());
    println!("source:     {}", source);
    println!("state:      {:?}", session.state());
    println!("request:    {:?}", session.parameters().request());
    println!(
        "image:      {}x{} at {} bits",
        session.width(),
        session.height(),
        session.bit_depth()
    );
    println!(
        "bounds:     {} tile(s), {} resolution(s)",
        session.max_tiles(),
        session.max_reduction()
    );
}

fn write_image(
    path: &Path,
    image: &DecodedImage,
    width: u32,
    height: u32,
    format: &OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Raw => fs::write(path, image.to_bytes()),
        OutputFormat::Pnm => write_pnm(path, image, width, height),
    }
}

fn write_pnm(path: &Path, image: &DecodedImage, width: u32, height: u32) -> io::Result<()> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);

    let (magic, maxval) = match image {
        DecodedImage::Gray8(_) => ("P5", 255),
        DecodedImage::Gray16(_) => ("P5", 65535),
        DecodedImage::Packed(_) => ("P6", 255),
    };
    writeln!(file, "{}", magic)?;
    writeln!(file, "{} {}", width, height)?;
    writeln!(file, "{}", maxval)?;
    file.write_all(&image.to_bytes())?;
    file.flush()
}
