use crate::config::ImportConfig;
use crate::error::{Result, SurfaceError};
use log::{debug, info};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

/// Arguments for `raster2pgsql`: tag SRID, spatial index, constraints, vacuum
pub fn raster2pgsql_args(raster: &Path, table: &str, srid: u32) -> Vec<OsString> {
    vec![
        "-s".into(),
        srid.to_string().into(),
        "-I".into(),
        "-C".into(),
        "-M".into(),
        raster.as_os_str().to_owned(),
        table.into(),
    ]
}

pub fn psql_args(database_url: &str) -> Vec<OsString> {
    vec!["--quiet".into(), "--dbname".into(), database_url.into()]
}

/// Load a written surface into PostGIS by piping `raster2pgsql` into `psql`.
///
/// `raster_srid` is the SRID of the raster's own spatial reference; see
/// [`crate::crs::resolve_import_srid`] for how it is reconciled with the configured one.
pub fn import_raster(raster: &Path, raster_srid: Option<u32>, config: &ImportConfig) -> Result<u32> {
    let srid = config.resolve_srid(raster_srid)?;

    info!(
        "Inserting raster '{}' into PostGIS table '{}' (SRID {})",
        raster.display(),
        config.table,
        srid
    );

    let mut producer = Command::new(&config.raster2pgsql)
        .args(raster2pgsql_args(raster, &config.table, srid))
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| {
            SurfaceError::ImportFailed(format!(
                "cannot start {}: {}",
                config.raster2pgsql.display(),
                e
            ))
        })?;

    let sql = producer
        .stdout
        .take()
        .ok_or_else(|| SurfaceError::ImportFailed("raster2pgsql produced no output pipe".into()))?;

    let consumer = Command::new(&config.psql)
        .args(psql_args(&config.database_url))
        .stdin(Stdio::from(sql))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let consumer = match consumer {
        Ok(child) => child,
        Err(e) => {
            // Don't leave raster2pgsql blocked on a closed pipe
            let _ = producer.kill();
            let _ = producer.wait();
            return Err(SurfaceError::ImportFailed(format!(
                "cannot start {}: {}",
                config.psql.display(),
                e
            )));
        }
    };

    let output = consumer.wait_with_output()?;
    let producer_status = producer.wait()?;

    if !producer_status.success() {
        return Err(SurfaceError::ImportFailed(format!(
            "raster2pgsql exited with {}",
            producer_status
        )));
    }
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SurfaceError::ImportFailed(format!(
            "psql exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    debug!("psql: {}", String::from_utf8_lossy(&output.stdout).trim());
    info!("Raster imported into PostGIS");
    Ok(srid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config() -> ImportConfig {
        ImportConfig::new("postgres://localhost/precip", "interpolated").unwrap()
    }

    #[test]
    fn test_raster2pgsql_args() {
        let args = raster2pgsql_args(Path::new("out/interpolated.tif"), "interpolated", 4326);
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-s", "4326", "-I", "-C", "-M", "out/interpolated.tif", "interpolated"]
        );
    }

    #[test]
    fn test_psql_args() {
        let args = psql_args("postgres://u@h:5432/db");
        assert_eq!(args.last().unwrap(), "postgres://u@h:5432/db");
    }

    #[test]
    fn test_mismatched_srid_refused_before_spawning() {
        let mut config = config();
        config.srid = Some(32633);
        // Executable does not exist; the SRID check must fail first
        config.raster2pgsql = PathBuf::from("/nonexistent/raster2pgsql");
        let result = import_raster(Path::new("x.tif"), Some(4326), &config);
        assert!(matches!(result, Err(SurfaceError::SridMismatch { .. })));
    }

    #[test]
    fn test_missing_tool() {
        let mut config = config();
        config.raster2pgsql = PathBuf::from("/nonexistent/raster2pgsql");
        let result = import_raster(Path::new("x.tif"), Some(4326), &config);
        assert!(matches!(result, Err(SurfaceError::ImportFailed(_))));
    }
}
