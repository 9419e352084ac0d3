//! mm-tiff - Inspect Micro-Manager TIFF and OME-TIFF files.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use micromanager_tiff::{
    config::{Cli, Command, DetectArgs, InfoArgs, PageArgs, ReadOptions},
    detect_format, directory_offsets, BlockCache, FileFormat, FileRangeReader, Ifd, IoError,
    MetadataError, MicromanagerFile, MicromanagerHeader, PlaneLayout, RangeReader, TiffHeader,
    MICROMANAGER_METADATA_TAG,
};

type CachedFile = BlockCache<FileRangeReader>;

fn main() -> ExitCode {
    let Cli {
        read,
        verbose,
        command,
    } = Cli::parse();

    init_logging(verbose);

    if let Err(e) = read.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match command {
        Command::Detect(args) => run_detect(&read, args),
        Command::Info(args) => run_info(&read, args),
        Command::Page(args) => run_page(&read, args),
    }
}

/// Initialize the tracing/logging subsystem. Logs go to stderr.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "micromanager_tiff=debug,mm_tiff=debug"
    } else {
        "micromanager_tiff=warn,mm_tiff=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open(path: &Path, options: &ReadOptions) -> Result<CachedFile, IoError> {
    let file = FileRangeReader::open(path)?;
    Ok(BlockCache::with_capacity(
        file,
        options.block_size,
        options.cache_blocks,
    ))
}

// =============================================================================
// Detect Command
// =============================================================================

fn run_detect(options: &ReadOptions, args: DetectArgs) -> ExitCode {
    let mut all_vendor = true;

    for path in &args.paths {
        let reader = match open(path, options) {
            Ok(reader) => reader,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                all_vendor = false;
                continue;
            }
        };

        let format = detect_format(&reader);
        println!("{}: {}", path.display(), format.name());
        all_vendor &= format == FileFormat::MicromanagerOmeTiff;
    }

    if all_vendor {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(options: &ReadOptions, args: InfoArgs) -> ExitCode {
    let reader = match open(&args.path, options) {
        Ok(reader) => reader,
        Err(e) => {
            error!("{}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let header = match TiffHeader::read(&reader) {
        Ok(header) => header,
        Err(e) => {
            error!("{}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let chain = match directory_offsets(&reader, &header) {
        Ok(chain) => chain,
        Err(e) => {
            error!("{}: IFD chain: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let format = detect_format(&reader);
    let mm_header = MicromanagerHeader::read(&reader).unwrap_or_else(|e| {
        warn!("{}: Micro-Manager header unreadable: {}", args.path.display(), e);
        MicromanagerHeader::default()
    });

    let directories: Vec<_> = chain
        .iter()
        .map(|&offset| directory_summary(&reader, &header, offset))
        .collect();

    if args.json {
        let report = json!({
            "file": reader.identifier(),
            "format": format.name(),
            "header": header,
            "directories": directories,
            "micromanager": mm_header,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                error!("Failed to encode report: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("File:        {}", reader.identifier());
    println!("Format:      {}", format.name());
    println!(
        "Header:      {:?}, {}, first IFD at {}",
        header.byte_order,
        if header.is_bigtiff() { "BigTIFF" } else { "TIFF" },
        header.first_ifd_offset
    );
    println!("Directories: {}", chain.len());
    for (i, dir) in directories.iter().enumerate() {
        println!("  [{}] {}", i, dir);
    }

    println!("Micro-Manager header:");
    println!("  summary:          {}", present(mm_header.summary.is_some()));
    match &mm_header.index_map {
        Some(map) => println!("  index map:        {} entries", map.len()),
        None => println!("  index map:        absent"),
    }
    println!(
        "  display settings: {}",
        present(mm_header.display_settings.is_some())
    );
    println!("  comments:         {}", present(mm_header.comments.is_some()));

    ExitCode::SUCCESS
}

fn present(found: bool) -> &'static str {
    if found {
        "present"
    } else {
        "absent"
    }
}

/// One IFD as a JSON object; unreadable directories carry an error string.
fn directory_summary<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> serde_json::Value {
    match Ifd::read(reader, header, offset) {
        Ok(ifd) => json!({
            "offset": offset,
            "entries": ifd.entries.len(),
            "width": ifd.image_width(header.byte_order),
            "height": ifd.image_height(header.byte_order),
            "micromanager_metadata": ifd.get_entry(MICROMANAGER_METADATA_TAG).is_some(),
        }),
        Err(e) => json!({ "offset": offset, "error": e.to_string() }),
    }
}

// =============================================================================
// Page Command
// =============================================================================

fn run_page(options: &ReadOptions, args: PageArgs) -> ExitCode {
    let reader = match open(&args.path, options) {
        Ok(reader) => reader,
        Err(e) => {
            error!("{}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let opened = match &args.planes {
        Some(planes) => PlaneLayout::from_json_file(planes)
            .and_then(|layout| MicromanagerFile::open(reader, layout)),
        None => MicromanagerFile::open_with_index_map(reader),
    };
    let file = match opened {
        Ok(file) => file,
        Err(e) => {
            error!("{}: {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let output = if args.raw {
        file.get_page_metadata(args.z, args.c, args.t, args.series)
            .map(hex::encode)
    } else {
        file.get_page_metadata_json(args.z, args.c, args.t, args.series)
            .and_then(|value| {
                serde_json::to_string_pretty(&value).map_err(|e| MetadataError::InvalidJson {
                    context: "page metadata".to_string(),
                    message: e.to_string(),
                })
            })
    };

    match output {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                "{}: plane Z={} C={} T={} series {}: {}",
                args.path.display(),
                args.z,
                args.c,
                args.t,
                args.series,
                e
            );
            ExitCode::FAILURE
        }
    }
}
