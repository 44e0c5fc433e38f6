#![doc = r#"
HLS-VI: vegetation indices from Harmonized Landsat Sentinel-2 (HLS) granules.

This crate turns the surface reflectance bands of an HLS granule (`L30` Landsat or
`S30` Sentinel-2) into nine vegetation index rasters (NDVI, EVI, MSAVI, NBR, NBR2,
NDMI, NDWI, SAVI, TVI), each written as a scaled, compressed Int16 GeoTIFF with
HLS tags, rewrites the granule's CMR XML metadata for the derived `HLS-VI`
product and builds its STAC item. It powers the `hlsvi` CLI and can be embedded in your own Rust
applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Process a granule directory
---------------------------
```rust,no_run
use std::path::Path;
use hlsvi::{process_granule, ProcessingParams};

fn main() -> hlsvi::Result<()> {
    let report = process_granule(
        Path::new("/data/HLS.S30.T13RCN.2024128T173909.v2.0"),
        Path::new("/out/HLS-VI.S30.T13RCN.2024128T173909.v2.0"),
        "HLS.S30.T13RCN.2024128T173909.v2.0",
        &ProcessingParams::default(),
    )?;
    println!("wrote {} rasters", report.outputs.len());
    Ok(())
}
```

Compute in memory
-----------------
```rust,no_run
use std::path::Path;
use hlsvi::{compute_indices, read_granule, GranuleId, ProcessingParams, VegetationIndex};

fn main() -> hlsvi::Result<()> {
    let id: GranuleId = "HLS.L30.T06WVS.2024120T211159.v2.0".parse()?;
    let params = ProcessingParams::default();
    let granule = read_granule(Path::new("/data/granule"), &id, &params)?;
    let rasters = compute_indices(&granule.inputs, &[VegetationIndex::NDVI], 2)?;
    let ndvi = &rasters[&VegetationIndex::NDVI];
    println!("{} valid NDVI pixels", ndvi.valid_count());
    Ok(())
}
```

Batch helpers
-------------
```rust,no_run
use std::path::Path;
use hlsvi::{process_directory, ProcessingParams};

fn main() -> hlsvi::Result<()> {
    let report = process_directory(
        Path::new("/data/granules"),
        Path::new("/out"),
        &ProcessingParams::default(),
        true, // continue_on_error
    )?;
    println!("processed={} skipped={} errors={}", report.processed, report.skipped, report.errors);
    Ok(())
}
```

Error handling
--------------
All public functions return `hlsvi::Result<T>`; match on `hlsvi::Error` (or its
coarse [`ErrorKind`]) to handle specific cases.

```rust,no_run
use std::path::Path;
use hlsvi::{process_granule, Error, ProcessingParams};

fn main() {
    match process_granule(Path::new("/in"), Path::new("/out"), "HLS.L30.T06WVS.2024120T211159.v2.0", &ProcessingParams::default()) {
        Ok(_) => {}
        Err(Error::Alignment(msg)) => eprintln!("bands do not share a grid: {msg}"),
        Err(e @ Error::Gdal { .. }) => eprintln!("GDAL error: {e}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level entry points.
- [`core`]: band registry, masking, index formulas and processing parameters.
- [`io`]: GDAL readers, GeoTIFF writers, the CMR metadata rewriter and STAC items.
- [`granule`]: granule IDs and file naming.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod granule;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::grid::{BandGrid, GridGeometry};
pub use core::indices::{FILL_VALUE, OutputRaster};
pub use core::mask::Mask;
pub use core::params::ProcessingParams;
pub use error::{Error, ErrorKind, Result};
pub use granule::GranuleId;
pub use types::{Band, Compression, Instrument, VegetationIndex};

// High-level API re-exports
pub use api::{
    BatchReport, Granule, GranuleBands, GranuleReport, compute_indices, generate_metadata,
    generate_stac_item, iterate_granule_dirs, process_directory, process_granule, read_granule,
};
