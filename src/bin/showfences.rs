use clap::Parser;
use fencewatch::{AlertDatabase, FenceWatchResult, KmlFile, KmlWriter, Snapshot};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Export the geofences from a snapshot as a KML file for viewing in Google Earth.
///
/// Each fence becomes a filled polygon placemark; circle fences are traced as a ring. If an alert
/// database is given, recent violation alerts are included as timestamped point placemarks at the
/// offending positions.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "showfences")]
#[clap(author, version, about)]
struct ShowFencesOptionsInit {
    /// The path to the snapshot JSON file with the geofences.
    ///
    /// If this is not specified, then the program will check for it in the "FENCE_SNAPSHOT"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FENCE_SNAPSHOT")]
    snapshot_file: PathBuf,

    /// The path to the alert database file to read recent alerts from.
    ///
    /// If this is not specified, then the program will check the "ALERT_DB" environment variable.
    /// When neither is set, only the fences are exported.
    #[clap(short, long)]
    #[clap(env = "ALERT_DB")]
    alert_store_file: Option<PathBuf>,

    /// The path to the KML file to write.
    ///
    /// If this is not specified, then it will be the snapshot file path with the extension changed
    /// to "kml".
    #[clap(short, long)]
    kml_file: Option<PathBuf>,

    /// How many hours back to include alerts from.
    #[clap(short, long)]
    #[clap(default_value_t = 24)]
    lookback_hours: i64,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct ShowFencesOptionsChecked {
    /// The path to the snapshot JSON file.
    snapshot_file: PathBuf,

    /// The path to the alert database file, if alerts should be included.
    alert_store_file: Option<PathBuf>,

    /// The path to the KML file to write.
    kml_file: PathBuf,

    /// How many hours back to include alerts from.
    lookback_hours: i64,

    /// Verbose output
    verbose: bool,
}

impl Display for ShowFencesOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f)?;
        writeln!(f, "    Snapshot: {}", self.snapshot_file.display())?;
        match &self.alert_store_file {
            Some(path) => writeln!(f, "    Alert DB: {}", path.display())?,
            None => writeln!(f, "    Alert DB: (no alerts)")?,
        }
        writeln!(f, "    KML File: {}", self.kml_file.display())?;
        writeln!(f, "    Lookback: {} hours", self.lookback_hours)?;
        writeln!(f)?;

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables or sane defaults.
fn parse_args() -> FenceWatchResult<ShowFencesOptionsChecked> {
    let ShowFencesOptionsInit {
        snapshot_file,
        alert_store_file,
        kml_file,
        lookback_hours,
        verbose,
    } = ShowFencesOptionsInit::parse();

    let kml_file = kml_file.unwrap_or_else(|| {
        let mut path = snapshot_file.clone();
        path.set_extension("kml");
        path
    });

    let checked = ShowFencesOptionsChecked {
        snapshot_file,
        alert_store_file,
        kml_file,
        lookback_hours,
        verbose,
    };

    if checked.verbose {
        println!("{}", checked);
    }

    Ok(checked)
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> FenceWatchResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let snapshot = Snapshot::load(&opts.snapshot_file)?;

    let mut kfile = KmlFile::new(&opts.kml_file)?;

    kfile.start_style(Some("alert"))?;
    kfile.create_icon_style(
        Some("http://maps.google.com/mapfiles/kml/shapes/caution.png"),
        1.3,
    )?;
    kfile.finish_style()?;

    kfile.start_folder(Some("Geofences"), None, true)?;
    let mut drawn = 0;
    for fence in &snapshot.geofences {
        if !fence.is_evaluable() {
            log::debug!("Skipping half-drawn geofence: {} ({})", fence.name, fence.id);
            continue;
        }
        fence.kml_write(&mut kfile)?;
        drawn += 1;
    }
    kfile.finish_folder()?;

    log::info!("Exported {} geofences.", drawn);

    if let Some(path) = &opts.alert_store_file {
        let db = AlertDatabase::connect(path)?;
        let since = chrono::Utc::now() - chrono::Duration::hours(opts.lookback_hours);
        let alerts = db.query_recent_alerts(since)?;

        kfile.start_folder(Some("Alerts"), None, true)?;
        for alert in &alerts {
            alert.kml_write(&mut kfile, "#alert")?;
        }
        kfile.finish_folder()?;

        log::info!("Exported {} alerts.", alerts.len());
    }

    log::info!("Wrote {}.", opts.kml_file.display());

    Ok(())
}
