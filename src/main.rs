use std::io;
use std::process;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{error, info};
use serde_json::json;

use hyraster::{
    BackendKind, DataType, Element, OpenOptions, RasterHandle, Result, TraversalMode, Unit,
    DEFAULT_CHUNK_SHAPE, NO_DATA_MASK,
};

/// Calls `$func::<T>` with `T` matching the raster's element type
macro_rules! with_element_type {
    ($dtype:expr, $func:ident ( $($arg:expr),* )) => {
        match $dtype {
            DataType::U8 => $func::<u8>($($arg),*),
            DataType::U16 => $func::<u16>($($arg),*),
            DataType::U32 => $func::<u32>($($arg),*),
            DataType::U64 => $func::<u64>($($arg),*),
            DataType::I8 => $func::<i8>($($arg),*),
            DataType::I16 => $func::<i16>($($arg),*),
            DataType::I32 => $func::<i32>($($arg),*),
            DataType::I64 => $func::<i64>($($arg),*),
            DataType::F32 => $func::<f32>($($arg),*),
            DataType::F64 => $func::<f64>($($arg),*),
        }
    };
}

fn cli() -> Command {
    let input = Arg::new("input")
        .help("Raster payload (ENVI binary or HDF5 container)")
        .required(true)
        .index(1);
    let file_type = Arg::new("type")
        .short('t')
        .long("type")
        .help("File type: envi or neon")
        .value_name("TYPE")
        .default_value("envi");

    Command::new("hyraster")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect multi-band raster imagery")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("info")
                .about("Print raster metadata as JSON")
                .arg(input.clone())
                .arg(file_type.clone()),
        )
        .subcommand(
            Command::new("pixels")
                .about("Write pixel spectra as CSV")
                .arg(input.clone())
                .arg(file_type.clone())
                .arg(
                    Arg::new("line")
                        .short('l')
                        .long("line")
                        .help("Zero-indexed line, repeat for several pixels")
                        .value_parser(value_parser!(usize))
                        .action(ArgAction::Append)
                        .required(true),
                )
                .arg(
                    Arg::new("column")
                        .short('c')
                        .long("column")
                        .help("Zero-indexed column, paired with --line")
                        .value_parser(value_parser!(usize))
                        .action(ArgAction::Append)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("sweep")
                .about("Traverse the raster in chunks and print per-band means of valid pixels")
                .arg(input)
                .arg(file_type)
                .arg(
                    Arg::new("rows")
                        .long("rows")
                        .help("Chunk height in lines")
                        .value_parser(value_parser!(usize))
                        .default_value("100"),
                )
                .arg(
                    Arg::new("cols")
                        .long("cols")
                        .help("Chunk width in columns")
                        .value_parser(value_parser!(usize))
                        .default_value("100"),
                ),
        )
}

fn open(matches: &ArgMatches) -> Result<RasterHandle> {
    let path = matches.get_one::<String>("input").map(String::as_str).unwrap_or_default();
    let kind = BackendKind::from_name(matches.get_one::<String>("type").map(String::as_str).unwrap_or("envi"))?;
    RasterHandle::open_with_options(path, kind, &OpenOptions::default())
}

fn print_info(raster: &RasterHandle) -> Result<()> {
    let report = json!({
        "path": raster.path().display().to_string(),
        "backend": format!("{:?}", raster.backend_kind()),
        "metadata": raster.metadata(),
        "masks": raster.masks().names().collect::<Vec<_>>(),
    });
    let text = serde_json::to_string_pretty(&report)
        .map_err(|e| hyraster::Error::InvalidFormat(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn write_pixels<T: Element + ToString>(raster: &RasterHandle, lines: &[usize], columns: &[usize]) -> Result<()> {
    let pixels = raster.get_pixels::<T>(lines, columns)?;

    let mut writer = csv::Writer::from_writer(io::stdout());
    let mut header = vec!["line".to_string(), "column".to_string()];
    if raster.wavelengths().is_empty() {
        header.extend((0..raster.bands()).map(|b| format!("band_{}", b)));
    } else {
        header.extend(raster.wavelengths().iter().map(|w| w.to_string()));
    }
    writer.write_record(&header).map_err(csv_error)?;

    for ((line, column), spectrum) in lines.iter().zip(columns).zip(pixels.rows()) {
        let mut record = vec![line.to_string(), column.to_string()];
        record.extend(spectrum.iter().map(ToString::to_string));
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(error: csv::Error) -> hyraster::Error {
    hyraster::Error::Io(io::Error::new(io::ErrorKind::Other, error))
}

fn sweep<T: Element>(raster: &RasterHandle, mode: TraversalMode) -> Result<()> {
    let valid = raster.mask(NO_DATA_MASK)?;
    let mut sums = vec![0.0f64; raster.bands()];
    let mut count = 0usize;
    let mut chunks = 0usize;

    for unit in raster.iterate::<T>(mode) {
        let Unit::Chunk { window, data } = unit? else {
            continue;
        };
        chunks += 1;
        for (r, line) in (window.line_start..window.line_end).enumerate() {
            for (c, column) in (window.col_start..window.col_end).enumerate() {
                if !valid[[line, column]] {
                    continue;
                }
                count += 1;
                for (sum, v) in sums.iter_mut().zip(data.slice(ndarray::s![r, c, ..])) {
                    *sum += v.to_f64();
                }
            }
        }
    }

    info!("swept {} chunks, {} valid pixels", chunks, count);
    for (band, sum) in sums.iter().enumerate() {
        let mean = if count == 0 { f64::NAN } else { sum / count as f64 };
        println!("{}\t{}", band, mean);
    }
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("info", sub)) => print_info(&open(sub)?),
        Some(("pixels", sub)) => {
            let raster = open(sub)?;
            let lines: Vec<usize> = sub.get_many::<usize>("line").into_iter().flatten().copied().collect();
            let columns: Vec<usize> = sub.get_many::<usize>("column").into_iter().flatten().copied().collect();
            with_element_type!(raster.dtype(), write_pixels(&raster, &lines, &columns))
        }
        Some(("sweep", sub)) => {
            let raster = open(sub)?;
            let rows = sub.get_one::<usize>("rows").copied().unwrap_or(DEFAULT_CHUNK_SHAPE.0);
            let cols = sub.get_one::<usize>("cols").copied().unwrap_or(DEFAULT_CHUNK_SHAPE.1);
            let mode = TraversalMode::chunk(rows, cols)?;
            with_element_type!(raster.dtype(), sweep(&raster, mode))
        }
        _ => Ok(()),
    }
}

fn main() {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        process::exit(1);
    }
}
