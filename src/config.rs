//! Command-line configuration for `mm-tiff`.
//!
//! Options can also be set through environment variables with the `MMTIFF_`
//! prefix:
//!
//! - `MMTIFF_BLOCK_SIZE` - Block size in bytes for the read cache (default: 64KB)
//! - `MMTIFF_CACHE_BLOCKS` - Blocks kept in the read cache (default: 64)
//! - `MMTIFF_PLANES` - JSON plane layout used by `page`
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use micromanager_tiff::config::Cli;
//!
//! let cli = Cli::parse();
//! cli.validate()?;
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY};

/// Smallest accepted block size.
pub const MIN_BLOCK_SIZE: usize = 512;

/// Largest accepted block size.
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// mm-tiff - Inspect Micro-Manager TIFF and OME-TIFF files.
#[derive(Parser, Debug, Clone)]
#[command(name = "mm-tiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub read: ReadOptions,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Read cache tuning shared by every subcommand.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Block size in bytes for the read cache.
    #[arg(long, global = true, default_value_t = DEFAULT_BLOCK_SIZE, env = "MMTIFF_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of blocks kept in the read cache.
    #[arg(long, global = true, default_value_t = DEFAULT_CACHE_CAPACITY, env = "MMTIFF_CACHE_BLOCKS")]
    pub cache_blocks: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Report whether files are Micro-Manager OME-TIFFs.
    ///
    /// Exits with success only when every file is one.
    Detect(DetectArgs),

    /// Print the header, IFD chain and Micro-Manager header of a file.
    Info(InfoArgs),

    /// Print the Micro-Manager metadata of one plane.
    Page(PageArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Files to check.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// File to inspect.
    pub path: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// File to read.
    pub path: PathBuf,

    /// Z index of the plane.
    #[arg(short = 'z', default_value_t = 0)]
    pub z: u32,

    /// Channel index of the plane.
    #[arg(short = 'c', default_value_t = 0)]
    pub c: u32,

    /// Time index of the plane.
    #[arg(short = 't', default_value_t = 0)]
    pub t: u32,

    /// Series (stage position) index.
    #[arg(short, long, default_value_t = 0)]
    pub series: usize,

    /// JSON plane layout; defaults to the file's own index map.
    #[arg(long, env = "MMTIFF_PLANES")]
    pub planes: Option<PathBuf>,

    /// Print the tag bytes as hex instead of pretty JSON.
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.read.validate()
    }
}

impl ReadOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size < MIN_BLOCK_SIZE || self.block_size > MAX_BLOCK_SIZE {
            return Err(format!(
                "block_size must be between {} and {} bytes",
                MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            ));
        }

        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
