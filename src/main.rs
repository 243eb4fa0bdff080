use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use precip_surface::cli::{Args, Command, ImportArgs, ImportToolArgs, IngestArgs, InterpolateArgs};
use precip_surface::config::{ImportConfig, StationSelection, StoreConfig, SurfaceConfig};
use precip_surface::error::{Result, SurfaceError};
use precip_surface::io::{read_reference_geometry, WriteOptions};
use precip_surface::meteohub::{hour_window, missing_stations, select_readings, MeteohubClient};
use precip_surface::source::{latest_points, MemorySource, PointSource};
use precip_surface::store::PostgisStore;
use precip_surface::{import, SurfacePipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Set thread pool size if specified
    if let Some(n_threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build_global()
            .map_err(|e| SurfaceError::InvalidParameter(format!("thread pool: {}", e)))?;
        info!("Using {} threads", n_threads);
    }

    match args.command {
        Command::Ingest(a) => ingest(a).await,
        Command::Interpolate(a) => interpolate(a).await,
        Command::Import(a) => import_existing(a),
    }
}

async fn ingest(args: IngestArgs) -> Result<()> {
    info!("=== Precipitation ingestion ===");

    // Ingestion stores only complete hours, so every listed station is required
    let selection = StationSelection::from_args(&args.stations.stations, None)?;
    let store_config = StoreConfig::new(args.database.database_url, args.stations.table)?;

    let (start, end) = hour_window(Utc::now())?;
    let client = MeteohubClient::new(args.api_url, args.product);
    let payload = client.fetch(start, end).await?;

    let readings = select_readings(&payload, &selection);
    let missing = missing_stations(&readings, &selection);
    if !missing.is_empty() {
        warn!("Incomplete acquisition. Missing stations: {:?}", missing);
        warn!("Skipping database insertion.");
        return Ok(());
    }

    info!("All {} required stations present, writing to database", readings.len());
    let store = PostgisStore::connect(&store_config).await?;
    let readings: Vec<_> = readings.into_values().collect();
    store.insert_readings(&readings).await?;

    info!("=== Done! ===");
    Ok(())
}

async fn interpolate(args: InterpolateArgs) -> Result<()> {
    info!("=== Precipitation surface ===");

    let selection = StationSelection::from_args(&args.stations.stations, args.quorum)?;
    let config = SurfaceConfig {
        power: args.power,
        neighbors: args.neighbors,
        sigma: args.sigma,
        degenerate: args.degenerate,
    };
    let options = WriteOptions {
        pixel_type: args.pixel_type,
        compression: args.compress.clone(),
    };

    let geometry = read_reference_geometry(&args.reference)?;
    info!("Raster size: {}x{}", geometry.width, geometry.height);
    let pipeline = SurfacePipeline::new(geometry, config)?;

    // Settle the import settings before anything is written
    let import_settings = match (&args.import_table, &args.database_url) {
        (Some(table), Some(url)) => {
            let config = import_config(url, table, &args.import)?;
            config.resolve_srid(pipeline.geometry().srid)?;
            Some(config)
        }
        _ => None,
    };

    let points = match (&args.readings, &args.database_url) {
        (Some(path), _) => load_points(&MemorySource::from_json_file(path)?, &selection).await?,
        (None, Some(url)) => {
            let store_config = StoreConfig::new(url.clone(), args.stations.table.clone())?;
            load_points(&PostgisStore::connect(&store_config).await?, &selection).await?
        }
        (None, None) => {
            return Err(SurfaceError::InvalidParameter(
                "either --readings or --database-url is required".to_string(),
            ))
        }
    };

    pipeline.run_to_file(&points, &args.output, &options)?;

    if let Some(config) = &import_settings {
        import::import_raster(&args.output, pipeline.geometry().srid, config)?;
    }

    info!("Total stations used: {}", points.len());
    info!("=== Done! ===");
    Ok(())
}

async fn load_points<S: PointSource>(
    source: &S,
    selection: &StationSelection,
) -> Result<Vec<precip_surface::ObservationPoint>> {
    let (_, points) = latest_points(source, selection).await?;
    Ok(points)
}

fn import_existing(args: ImportArgs) -> Result<()> {
    let geometry = read_reference_geometry(&args.raster)?;
    let config = import_config(&args.database.database_url, &args.table, &args.tools)?;
    import::import_raster(&args.raster, geometry.srid, &config)?;
    Ok(())
}

fn import_config(database_url: &str, table: &str, tools: &ImportToolArgs) -> Result<ImportConfig> {
    let mut config = ImportConfig::new(database_url, table)?;
    config.srid = tools.srid;
    config.force_srid = tools.force_srid;
    config.raster2pgsql = tools.raster2pgsql.clone();
    config.psql = tools.psql.clone();
    Ok(config)
}
