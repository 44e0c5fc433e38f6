use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hlsvi::io::stac::StacOptions;
use hlsvi::{
    GranuleId, ProcessingParams, generate_metadata, generate_stac_item, process_directory,
    process_granule,
};

use super::args::{CliArgs, Command, IndicesArgs, MetadataArgs, StacArgs};
use super::errors::AppError;

/// Config file (or defaults) with command-line overrides applied.
fn resolve_params(args: &IndicesArgs) -> Result<ProcessingParams, AppError> {
    let mut params = match &args.config {
        Some(path) => {
            info!("Loading processing parameters from {:?}", path);
            ProcessingParams::from_json_file(path)?
        }
        None => ProcessingParams::default(),
    };

    if !args.indices.is_empty() {
        params.indices = args.indices.clone();
    }
    if let Some(threads) = args.threads {
        params.threads = threads;
    }
    if let Some(compression) = args.compression {
        params.compression = compression;
    }
    if args.no_thumbnail {
        params.copy_thumbnail = false;
    }
    params.validate()?;
    Ok(params)
}

/// Granule ID from `--id-string`, or else the input directory name.
fn granule_id_for(input_dir: &Path, id_string: Option<&str>) -> Result<String, AppError> {
    if let Some(id) = id_string {
        return Ok(id.to_string());
    }
    let name = input_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::UnknownGranuleId {
            path: input_dir.to_path_buf(),
        })?;
    name.parse::<GranuleId>()
        .map_err(|_| AppError::UnknownGranuleId {
            path: input_dir.to_path_buf(),
        })?;
    Ok(name)
}

fn run_indices(args: IndicesArgs) -> Result<(), AppError> {
    let params = resolve_params(&args)?;

    if args.batch {
        if args.id_string.is_some() {
            return Err(AppError::IdStringInBatch);
        }
        info!("Starting batch processing from directory: {:?}", args.input_dir);
        info!("Output directory: {:?}", args.output_dir);

        let report = process_directory(&args.input_dir, &args.output_dir, &params, true)?;

        info!("Batch processing complete!");
        info!("Processed: {}", report.processed);
        info!("Skipped: {}", report.skipped);
        info!("Errors: {}", report.errors);
        if report.errors > 0 {
            return Err(AppError::BatchFailures {
                processed: report.processed,
                errors: report.errors,
            });
        }
        return Ok(());
    }

    let granule_id = granule_id_for(&args.input_dir, args.id_string.as_deref())?;
    let report = process_granule(&args.input_dir, &args.output_dir, &granule_id, &params)?;
    if report.thumbnail.is_none() && params.copy_thumbnail {
        warn!("{} has no browse image", report.output_id);
    }
    info!(
        "Successfully processed: {} -> {:?} ({} indices, {} masked pixels)",
        granule_id,
        args.output_dir,
        report.outputs.len(),
        report.masked_pixels
    );
    Ok(())
}

fn run_metadata(args: MetadataArgs) -> Result<(), AppError> {
    let path = generate_metadata(&args.input_dir, &args.output_dir)?;
    info!("Successfully wrote metadata: {:?}", path);
    Ok(())
}

fn stac_options(args: &StacArgs) -> StacOptions {
    StacOptions {
        endpoint: args.endpoint.clone(),
        version: args.collection_version.clone(),
    }
}

fn run_stac(args: StacArgs) -> Result<(), AppError> {
    let item = generate_stac_item(&args.cmr_xml, &args.out_json, &stac_options(&args))?;
    info!("Successfully wrote STAC item {} to {:?}", item.id, args.out_json);
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .init();
    }

    match args.command {
        Command::Indices(indices) => run_indices(indices)?,
        Command::Metadata(metadata) => run_metadata(metadata)?,
        Command::Stac(stac) => run_stac(stac)?,
    }
    Ok(())
}
