use crate::config::DEFAULT_TABLE;
use crate::io::PixelType;
use crate::meteohub::{DEFAULT_API_URL, DEFAULT_PRODUCT};
use crate::normalize::DegeneratePolicy;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "precip-surface")]
#[command(about = "Ingest hourly station precipitation and build a smoothed IDW surface")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Number of threads (default: all available)
    #[arg(short, long, global = true, value_name = "N")]
    pub threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch the current hour from the API and store it if every station reported
    Ingest(IngestArgs),
    /// Interpolate the latest complete hour onto the reference raster
    Interpolate(InterpolateArgs),
    /// Load an existing surface raster into PostGIS
    Import(ImportArgs),
}

#[derive(ClapArgs, Debug)]
pub struct DatabaseArgs {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", value_name = "URL")]
    pub database_url: String,
}

#[derive(ClapArgs, Debug)]
pub struct StationArgs {
    /// Station to require (repeatable; default: built-in list)
    #[arg(long = "station", value_name = "ID")]
    pub stations: Vec<String>,

    /// Observation table
    #[arg(long, default_value = DEFAULT_TABLE, value_name = "TABLE")]
    pub table: String,
}

#[derive(ClapArgs, Debug)]
pub struct IngestArgs {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub stations: StationArgs,

    /// Observations endpoint
    #[arg(long, default_value = DEFAULT_API_URL, value_name = "URL")]
    pub api_url: String,

    /// Product code in the API query
    #[arg(long, default_value = DEFAULT_PRODUCT, value_name = "CODE")]
    pub product: String,
}

#[derive(ClapArgs, Debug)]
pub struct InterpolateArgs {
    /// Reference GeoTIFF defining the output grid
    #[arg(short, long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Output GeoTIFF path
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// PostgreSQL connection URL (observations source)
    #[arg(long, env = "DATABASE_URL", value_name = "URL", required_unless_present = "readings")]
    pub database_url: Option<String>,

    /// JSON file of readings to use instead of the database
    #[arg(long, value_name = "FILE")]
    pub readings: Option<PathBuf>,

    #[command(flatten)]
    pub stations: StationArgs,

    /// Minimum number of stations a timestamp needs
    #[arg(long, value_name = "N")]
    pub quorum: Option<usize>,

    /// IDW distance exponent
    #[arg(long, default_value_t = 2.0)]
    pub power: f64,

    /// Nearest stations per pixel
    #[arg(short = 'k', long, default_value_t = 4)]
    pub neighbors: usize,

    /// Gaussian smoothing sigma in pixels
    #[arg(long, default_value_t = 3.0)]
    pub sigma: f64,

    /// Behaviour when every estimate is equal
    #[arg(long, value_enum, default_value_t = DegeneratePolicy::ZeroFill)]
    pub degenerate: DegeneratePolicy,

    /// Output pixel type
    #[arg(long, value_enum, default_value_t = PixelType::Float32)]
    pub pixel_type: PixelType,

    /// Compression type (DEFLATE, LZW, ZSTD, NONE)
    #[arg(long, value_name = "TYPE")]
    pub compress: Option<String>,

    /// Also load the surface into this PostGIS raster table
    #[arg(long, value_name = "TABLE", requires = "database_url")]
    pub import_table: Option<String>,

    #[command(flatten)]
    pub import: ImportToolArgs,
}

#[derive(ClapArgs, Debug)]
pub struct ImportToolArgs {
    /// SRID to tag the imported raster with (default: the raster's own)
    #[arg(long, value_name = "SRID")]
    pub srid: Option<u32>,

    /// Allow an SRID that differs from the raster's spatial reference
    #[arg(long)]
    pub force_srid: bool,

    /// raster2pgsql executable
    #[arg(long, default_value = "raster2pgsql", value_name = "PATH")]
    pub raster2pgsql: PathBuf,

    /// psql executable
    #[arg(long, default_value = "psql", value_name = "PATH")]
    pub psql: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct ImportArgs {
    /// Surface GeoTIFF to load
    #[arg(short, long, value_name = "FILE")]
    pub raster: PathBuf,

    /// Target raster table
    #[arg(long, default_value = "interpolated", value_name = "TABLE")]
    pub table: String,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub tools: ImportToolArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_interpolate_defaults() {
        let args = Args::try_parse_from([
            "precip-surface",
            "interpolate",
            "-r",
            "reference_4326.tif",
            "-o",
            "interpolated.tif",
            "--readings",
            "readings.json",
        ])
        .unwrap();

        match args.command {
            Command::Interpolate(a) => {
                assert_eq!(a.power, 2.0);
                assert_eq!(a.neighbors, 4);
                assert_eq!(a.sigma, 3.0);
                assert_eq!(a.degenerate, DegeneratePolicy::ZeroFill);
                assert_eq!(a.pixel_type, PixelType::Float32);
                assert_eq!(a.stations.table, DEFAULT_TABLE);
                assert!(a.stations.stations.is_empty());
                assert!(!a.import.force_srid);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_verbose_after_subcommand() {
        let args = Args::try_parse_from([
            "precip-surface",
            "import",
            "-r",
            "interpolated.tif",
            "--database-url",
            "postgres://localhost/db",
            "--srid",
            "32633",
            "--force-srid",
            "-v",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Import(a) => {
                assert_eq!(a.tools.srid, Some(32633));
                assert!(a.tools.force_srid);
                assert_eq!(a.table, "interpolated");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
