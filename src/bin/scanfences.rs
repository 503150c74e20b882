use clap::Parser;
use fencewatch::{AlertDatabase, FencePolicy, FenceWatchResult, Snapshot};
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
/// Scan a snapshot of device positions against its geofences and report violations.
///
/// This program loads a JSON snapshot with the current fences and device positions, runs the
/// violation scan, and logs one warning per offending (device, fence) pair. Optionally it records
/// each violation as a warning-level alert in a SQLite alert database.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "scanfences")]
#[clap(author, version, about)]
struct ScanFencesOptionsInit {
    /// The path to the snapshot JSON file with devices and geofences.
    ///
    /// If this is not specified, then the program will check for it in the "FENCE_SNAPSHOT"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "FENCE_SNAPSHOT")]
    snapshot_file: PathBuf,

    /// The path to the alert database file to record violations in.
    ///
    /// If this is not specified, then the program will check the "ALERT_DB" environment variable.
    /// When neither is set, violations are only logged.
    #[clap(short, long)]
    #[clap(env = "ALERT_DB")]
    alert_store_file: Option<PathBuf>,

    /// The enforcement direction for every fence in the snapshot.
    ///
    /// "keep-inside" reports devices found outside their fences, "keep-out" reports devices found
    /// inside them.
    #[clap(short, long)]
    #[clap(parse(try_from_str=parse_policy))]
    #[clap(default_value_t=FencePolicy::KeepInside)]
    policy: FencePolicy,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

fn parse_policy(policy: &str) -> Result<FencePolicy, String> {
    let policy = policy
        .parse()
        .map_err(|_| format!("Argument is not a valid fence policy: {}", policy))?;
    Ok(policy)
}

#[derive(Debug)]
struct ScanFencesOptionsChecked {
    /// The path to the snapshot JSON file.
    snapshot_file: PathBuf,

    /// The path to the alert database file, if alerts should be recorded.
    alert_store_file: Option<PathBuf>,

    /// The enforcement direction.
    policy: FencePolicy,

    /// Verbose output
    verbose: bool,
}

impl Display for ScanFencesOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f)?;
        writeln!(f, "    Snapshot: {}", self.snapshot_file.display())?;
        match &self.alert_store_file {
            Some(path) => writeln!(f, "    Alert DB: {}", path.display())?,
            None => writeln!(f, "    Alert DB: (not recording)")?,
        }
        writeln!(f, "      Policy: {}", self.policy)?;
        writeln!(f)?;

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> FenceWatchResult<ScanFencesOptionsChecked> {
    let ScanFencesOptionsInit {
        snapshot_file,
        alert_store_file,
        policy,
        verbose,
    } = ScanFencesOptionsInit::parse();

    let checked = ScanFencesOptionsChecked {
        snapshot_file,
        alert_store_file,
        policy,
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

    log::info!(
        "Loaded {} devices and {} geofences.",
        snapshot.devices.len(),
        snapshot.geofences.len()
    );

    for fence in snapshot.geofences.iter().filter(|f| !f.is_evaluable()) {
        log::debug!("Skipping half-drawn geofence: {} ({})", fence.name, fence.id);
    }

    let violations = fencewatch::scan(&snapshot.devices, &snapshot.geofences, opts.policy);

    if violations.is_empty() {
        log::info!("No geofence violations.");
        return Ok(());
    }

    for violation in &violations {
        log::warn!("{}", violation.message);
        log::debug!(
            "    device {:>6} fence {:>9} at {:.6},{:.6} ({})",
            violation.device_id,
            violation.geofence_id,
            violation.coordinates.lat,
            violation.coordinates.lon,
            violation.kind,
        );
    }

    log::info!("{} geofence violations found.", violations.len());

    if let Some(path) = &opts.alert_store_file {
        let db = AlertDatabase::connect(path)?;
        let mut adder = db.prepare_to_add_alerts()?;
        adder.add(&violations)?;
        log::info!("Recorded violations in {}.", path.display());
    }

    Ok(())
}
