use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use hlsvi::io::stac::{DEFAULT_ENDPOINT, DEFAULT_VERSION};
use hlsvi::{Compression, VegetationIndex};

#[derive(Parser)]
#[command(name = "hlsvi", version, about = "HLS vegetation index CLI")]
pub struct CliArgs {
    /// Enable logging (filter with RUST_LOG, defaults to debug)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute vegetation index GeoTIFFs from HLS granule bands
    Indices(IndicesArgs),
    /// Write HLS-VI CMR XML metadata next to computed indices
    Metadata(MetadataArgs),
    /// Write a STAC item JSON for an HLS-VI granule from its CMR XML
    Stac(StacArgs),
}

#[derive(Args)]
pub struct IndicesArgs {
    /// Granule directory holding the band GeoTIFFs (batch mode: directory of granule directories)
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Output directory for the index GeoTIFFs
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Granule ID, e.g. HLS.S30.T13RCN.2024128T173909.v2.0 (defaults to the input directory name)
    #[arg(short = 's', long = "id-string")]
    pub id_string: Option<String>,

    /// Index to compute; repeat for several (default: all)
    #[arg(long = "index", value_enum, ignore_case = true)]
    pub indices: Vec<VegetationIndex>,

    /// Worker threads for computing and writing indices
    #[arg(long)]
    pub threads: Option<usize>,

    /// GeoTIFF compression (deflate, lzw, zstd, none)
    #[arg(long, value_enum)]
    pub compression: Option<Compression>,

    /// JSON file with processing parameters; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Batch mode: process every granule subdirectory and continue past failures
    #[arg(long, default_value_t = false)]
    pub batch: bool,

    /// Do not copy the browse image
    #[arg(long, default_value_t = false)]
    pub no_thumbnail: bool,
}

#[derive(Args)]
pub struct MetadataArgs {
    /// Input granule directory holding HLS.*.cmr.xml
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Directory holding the computed index GeoTIFFs
    #[arg(short, long)]
    pub output_dir: PathBuf,
}

#[derive(Args)]
pub struct StacArgs {
    /// HLS-VI CMR XML file; the NDVI GeoTIFF must sit next to it
    #[arg(long = "cmr-xml")]
    pub cmr_xml: PathBuf,

    /// Output path of the STAC item JSON
    #[arg(long = "out-json")]
    pub out_json: PathBuf,

    /// Host serving the granule files
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Collection version used in asset URLs
    #[arg(long = "collection-version", default_value = DEFAULT_VERSION)]
    pub collection_version: String,
}
