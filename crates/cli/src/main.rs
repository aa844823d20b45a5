mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use chrono::{FixedOffset, Utc};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;

use checkin_core::attendance::domain::attendance_record::{filter_records, AttendanceRecord};
use checkin_core::attendance::domain::record_store::RecordStore;
use checkin_core::attendance::domain::session::NewSession;
use checkin_core::attendance::infrastructure::json_file_record_store::JsonFileRecordStore;
use checkin_core::attendance::infrastructure::rest_record_store::RestRecordStore;
use checkin_core::capture::domain::frame_source::CaptureError;
use checkin_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use checkin_core::decoding::infrastructure::qr_decoder::QrDecoder;
use checkin_core::pipeline::check_in_use_case::{CheckInOutcome, CheckInUseCase};
use checkin_core::pipeline::export_attendance_use_case::ExportAttendanceUseCase;
use checkin_core::pipeline::statistics_use_case::StatisticsUseCase;
use checkin_core::scanning::domain::scanner_config::ScannerConfig;
use checkin_core::scanning::scan_controller::{ScanController, ScanError};
use checkin_core::shared::constants::MISSING_FIELD;

use settings::{Settings, StoreBackend, REST_KEY_VAR, REST_URL_VAR};

/// How often the scan command wakes up when no deadline is set.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// QR attendance check-in.
#[derive(Parser)]
#[command(name = "checkin")]
struct Cli {
    /// Use a local JSON store at this path instead of the configured backend.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List sessions, newest first.
    Sessions,
    /// Create a session named "<name> - dd/mm/yyyy HH:MM".
    CreateSession {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a session and all of its attendance.
    DeleteSession {
        id: String,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Check badges into a session from a frame feed.
    Scan(ScanArgs),
    /// Show a session's attendance, newest first.
    List {
        #[arg(long)]
        session: String,
        /// Only records whose QR content contains this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show store-wide attendance statistics.
    Stats,
    /// Write a session's attendance to a CSV file.
    Export {
        #[arg(long)]
        session: String,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Show or update saved settings.
    Config(ConfigArgs),
}

#[derive(Args)]
struct ScanArgs {
    #[arg(long)]
    session: String,

    /// Directory of image frames replayed as the camera feed.
    #[arg(long)]
    frames: PathBuf,

    /// Restart from the first frame when the directory is exhausted.
    #[arg(long)]
    loop_frames: bool,

    /// Suppress repeats of the same code within this window.
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Pause between decode attempts.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop scanning after this many seconds.
    #[arg(long)]
    duration_secs: Option<u64>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Record store backend: local or rest.
    #[arg(long)]
    backend: Option<String>,

    #[arg(long)]
    rest_url: Option<String>,

    #[arg(long)]
    rest_key: Option<String>,

    /// Path of the local JSON store.
    #[arg(long)]
    store_path: Option<PathBuf>,

    #[arg(long)]
    cooldown_ms: Option<u64>,

    #[arg(long)]
    interval_ms: Option<u64>,

    /// Display offset such as +07:00.
    #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
    utc_offset: Option<FixedOffset>,
}

impl ConfigArgs {
    fn has_changes(&self) -> bool {
        self.backend.is_some()
            || self.rest_url.is_some()
            || self.rest_key.is_some()
            || self.store_path.is_some()
            || self.cooldown_ms.is_some()
            || self.interval_ms.is_some()
            || self.utc_offset.is_some()
    }
}

/// A scan-loop notification forwarded to the main thread.
enum ScanMessage {
    Scanned(String),
    Failed(ScanError),
}

#[derive(Default)]
struct ScanTally {
    recorded: usize,
    duplicates: usize,
    failed: usize,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    if let Command::Config(args) = &cli.command {
        return run_config(args);
    }

    let settings = Settings::load();
    let offset = settings.utc_offset()?;
    let mut store = open_store(cli.store.as_deref(), &settings)?;

    match cli.command {
        Command::Sessions => run_sessions(store.as_ref(), offset),
        Command::CreateSession { name, description } => {
            let session = store.create_session(NewSession::stamped(
                &name,
                description.as_deref(),
                Utc::now(),
                offset,
            ))?;
            println!("Created session {} ({})", session.name, session.id);
            Ok(())
        }
        Command::DeleteSession { id, .. } => {
            store.delete_session(&id)?;
            println!("Deleted session {id}");
            Ok(())
        }
        Command::Scan(args) => {
            let mut config = settings.scanner_config();
            if let Some(ms) = args.cooldown_ms {
                config = config.with_cooldown(Duration::from_millis(ms));
            }
            if let Some(ms) = args.interval_ms {
                config = config.with_scan_interval(Duration::from_millis(ms));
            }
            run_scan(store.as_mut(), &args, config)
        }
        Command::List { session, filter } => {
            run_list(store.as_ref(), &session, filter.as_deref(), offset)
        }
        Command::Stats => run_stats(store.as_ref(), offset),
        Command::Export {
            session,
            output_dir,
        } => {
            let path = ExportAttendanceUseCase::new(offset).execute(
                store.as_ref(),
                &session,
                &output_dir,
                Utc::now(),
            )?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        Command::Config(_) => Ok(()),
    }
}

fn open_store(
    path: Option<&Path>,
    settings: &Settings,
) -> Result<Box<dyn RecordStore>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(Box::new(JsonFileRecordStore::open(path)?));
    }
    match settings.backend {
        StoreBackend::Local => {
            let path = settings.local_store_path();
            log::debug!("Using local store at {}", path.display());
            Ok(Box::new(JsonFileRecordStore::open(path)?))
        }
        StoreBackend::Rest => {
            let (Some(url), Some(key)) = (&settings.rest_url, &settings.rest_key) else {
                return Err(format!(
                    "REST backend needs a url and key (set {REST_URL_VAR} and {REST_KEY_VAR} \
                     or run `checkin config`)"
                )
                .into());
            };
            log::debug!("Using REST store at {url}");
            Ok(Box::new(RestRecordStore::new(url, key)))
        }
    }
}

fn run_scan(
    store: &mut dyn RecordStore,
    args: &ScanArgs,
    config: ScannerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = store
        .find_session(&args.session)?
        .ok_or_else(|| format!("Session not found: {}", args.session))?;
    let check_in = CheckInUseCase::new(session.id.clone());

    let (tx, rx) = crossbeam_channel::unbounded();
    let error_tx = tx.clone();
    let mut controller = ScanController::new(Box::new(QrDecoder::new())).with_config(config);
    let source = ImageSequenceSource::new(&args.frames).looping(args.loop_frames);
    controller.start(
        Box::new(source),
        move |text| {
            let _ = tx.send(ScanMessage::Scanned(text));
        },
        move |err| {
            let _ = error_tx.send(ScanMessage::Failed(err));
        },
    );
    eprintln!(
        "Scanning into {} (cooldown {:?}, interval {:?})",
        session.name,
        controller.config().cooldown,
        controller.config().scan_interval
    );

    let deadline = args
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut tally = ScanTally::default();

    let outcome = loop {
        let timeout = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => break Ok(()),
            },
            None => IDLE_POLL,
        };
        match rx.recv_timeout(timeout) {
            Ok(ScanMessage::Scanned(text)) => record_scan(store, &check_in, &text, &mut tally),
            Ok(ScanMessage::Failed(ScanError::Capture(CaptureError::EndOfStream))) => {
                log::info!("No more frames");
                break Ok(());
            }
            Ok(ScanMessage::Failed(err)) if !controller.is_active() => break Err(err),
            Ok(ScanMessage::Failed(err)) => log::warn!("{err}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break Ok(()),
        }
    };
    controller.stop();

    // Scans reported before the stop still count.
    for message in rx.try_iter() {
        if let ScanMessage::Scanned(text) = message {
            record_scan(store, &check_in, &text, &mut tally);
        }
    }

    eprintln!(
        "Recorded {}, already checked in {}, failed {}",
        tally.recorded, tally.duplicates, tally.failed
    );
    outcome.map_err(Into::into)
}

fn record_scan(
    store: &mut dyn RecordStore,
    check_in: &CheckInUseCase,
    text: &str,
    tally: &mut ScanTally,
) {
    match check_in.execute(store, text, Utc::now()) {
        Ok(CheckInOutcome::Recorded(record)) => {
            tally.recorded += 1;
            println!("Checked in: {}", describe(&record));
        }
        Ok(CheckInOutcome::AlreadyCheckedIn) => {
            tally.duplicates += 1;
            println!("Already checked in: {text}");
        }
        Err(e) => {
            tally.failed += 1;
            log::error!("Failed to record scan: {e}");
        }
    }
}

fn run_sessions(
    store: &dyn RecordStore,
    offset: FixedOffset,
) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = store.list_sessions()?;
    if sessions.is_empty() {
        println!("No sessions");
    }
    for session in sessions {
        let created = session.created_at.with_timezone(&offset);
        println!(
            "{}\t{}\t{}\t{}",
            session.id,
            session.name,
            created.format("%d/%m/%Y %H:%M"),
            session.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn run_list(
    store: &dyn RecordStore,
    session_id: &str,
    filter: Option<&str>,
    offset: FixedOffset,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = store
        .find_session(session_id)?
        .ok_or_else(|| format!("Session not found: {session_id}"))?;
    let records = store.list_attendance(session_id)?;
    let shown = match filter {
        Some(text) => filter_records(&records, text),
        None => records.iter().collect(),
    };

    println!("{} ({} of {})", session.name, shown.len(), records.len());
    for record in shown {
        let at = record.scanned_at.with_timezone(&offset);
        println!(
            "{}\t{}\t{}",
            at.format("%d/%m/%Y %H:%M:%S"),
            describe(record),
            record.qr_content
        );
    }
    Ok(())
}

fn run_stats(
    store: &dyn RecordStore,
    offset: FixedOffset,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = StatisticsUseCase::new(offset).execute(store, Utc::now())?;
    println!("Sessions:             {}", stats.total_sessions);
    println!("Attendance:           {}", stats.total_attendance);
    println!("Today:                {}", stats.today_attendance);
    println!("Average per session:  {}", stats.average_per_session);
    if !stats.recent_sessions.is_empty() {
        println!("Recent sessions:");
        for summary in &stats.recent_sessions {
            println!(
                "  {}\t{}",
                summary.session.name, summary.attendance_count
            );
        }
    }
    Ok(())
}

fn run_config(args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = Settings::config_path().ok_or("No configuration directory on this platform")?;
    let mut settings = Settings::load_from(&path)?;

    if args.has_changes() {
        if let Some(backend) = &args.backend {
            settings.backend = parse_backend(backend)?;
        }
        if let Some(url) = &args.rest_url {
            settings.rest_url = Some(url.clone());
        }
        if let Some(key) = &args.rest_key {
            settings.rest_key = Some(key.clone());
        }
        if let Some(store_path) = &args.store_path {
            settings.store_path = Some(store_path.clone());
        }
        if let Some(ms) = args.cooldown_ms {
            settings.cooldown_ms = ms;
        }
        if let Some(ms) = args.interval_ms {
            settings.scan_interval_ms = ms;
        }
        if let Some(offset) = args.utc_offset {
            settings.utc_offset_secs = offset.local_minus_utc();
        }
        let saved = settings.save()?;
        log::info!("Settings written to {}", saved.display());
    }

    println!("Settings file:   {}", path.display());
    println!("Backend:         {}", settings.backend);
    println!(
        "REST url:        {}",
        settings.rest_url.as_deref().unwrap_or(MISSING_FIELD)
    );
    println!(
        "REST key:        {}",
        if settings.rest_key.is_some() { "set" } else { MISSING_FIELD }
    );
    println!("Local store:     {}", settings.local_store_path().display());
    println!("Cooldown:        {} ms", settings.cooldown_ms);
    println!("Scan interval:   {} ms", settings.scan_interval_ms);
    println!("UTC offset:      {}", settings.utc_offset()?);
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::CreateSession { name, .. } if name.trim().is_empty() => {
            return Err("Session name must not be empty".into());
        }
        Command::DeleteSession { id, yes } if !yes => {
            return Err(format!("Deleting session {id} removes its attendance; pass --yes").into());
        }
        Command::Scan(args) => {
            if !args.frames.is_dir() {
                return Err(format!("Frames directory not found: {}", args.frames.display()).into());
            }
            if args.interval_ms == Some(0) {
                return Err("Scan interval must be at least 1 ms".into());
            }
            if args.duration_secs == Some(0) {
                return Err("Duration must be at least 1 second".into());
            }
        }
        Command::Config(args) => {
            if let Some(backend) = &args.backend {
                parse_backend(backend)?;
            }
            if args.interval_ms == Some(0) {
                return Err("Scan interval must be at least 1 ms".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_backend(value: &str) -> Result<StoreBackend, String> {
    match value {
        "local" => Ok(StoreBackend::Local),
        "rest" => Ok(StoreBackend::Rest),
        other => Err(format!("Backend must be 'local' or 'rest', got '{other}'")),
    }
}

fn parse_offset(value: &str) -> Result<FixedOffset, String> {
    value
        .parse::<FixedOffset>()
        .map_err(|e| format!("invalid UTC offset '{value}': {e}"))
}

/// Badge holder as "name (id)", falling back to the raw QR content.
fn describe(record: &AttendanceRecord) -> String {
    match (&record.student_name, &record.student_id) {
        (Some(name), Some(id)) => format!("{name} ({id})"),
        (Some(name), None) => name.clone(),
        (None, Some(id)) => id.clone(),
        (None, None) => record.qr_content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(qr: &str, name: Option<&str>, id: Option<&str>) -> AttendanceRecord {
        AttendanceRecord {
            id: "a1".into(),
            session_id: "s1".into(),
            qr_content: qr.into(),
            scanned_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            student_name: name.map(str::to_string),
            student_id: id.map(str::to_string),
            additional_info: None,
        }
    }

    #[test]
    fn test_describe_prefers_badge_details() {
        assert_eq!(describe(&record("x", Some("Lan"), Some("B1"))), "Lan (B1)");
        assert_eq!(describe(&record("x", Some("Lan"), None)), "Lan");
        assert_eq!(describe(&record("x", None, Some("B1"))), "B1");
        assert_eq!(describe(&record("SV-42", None, None)), "SV-42");
    }

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend("rest").unwrap(), StoreBackend::Rest);
        assert!(parse_backend("sqlite").is_err());
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(
            parse_offset("+07:00").unwrap(),
            FixedOffset::east_opt(7 * 3600).unwrap()
        );
        assert_eq!(
            parse_offset("-05:30").unwrap(),
            FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap()
        );
        assert!(parse_offset("seven").is_err());
    }

    #[test]
    fn test_store_flag_forces_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let settings = Settings {
            backend: StoreBackend::Rest,
            ..Settings::default()
        };
        let mut store = open_store(Some(&path), &settings).unwrap();
        store
            .create_session(NewSession {
                name: "Lab".into(),
                description: None,
            })
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rest_backend_requires_credentials() {
        let settings = Settings {
            backend: StoreBackend::Rest,
            rest_url: Some("https://db.example.com".into()),
            rest_key: None,
            ..Settings::default()
        };
        assert!(open_store(None, &settings).is_err());
    }

    #[test]
    fn test_validate_rejects_unconfirmed_delete() {
        let cli = Cli::parse_from(["checkin", "delete-session", "session-1"]);
        assert!(validate(&cli).is_err());
        let cli = Cli::parse_from(["checkin", "delete-session", "session-1", "--yes"]);
        assert!(validate(&cli).is_ok());
    }

    #[test]
    fn test_validate_scan_needs_frames_dir() {
        let cli = Cli::parse_from([
            "checkin",
            "scan",
            "--session",
            "session-1",
            "--frames",
            "/definitely/not/here",
        ]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_scan_empty_frames_dir_fails_without_records() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        let mut store = JsonFileRecordStore::open(dir.path().join("store.json")).unwrap();
        let session = store
            .create_session(NewSession {
                name: "Lab".into(),
                description: None,
            })
            .unwrap();
        let args = ScanArgs {
            session: session.id.clone(),
            frames,
            loop_frames: false,
            cooldown_ms: None,
            interval_ms: Some(1),
            duration_secs: Some(5),
        };

        let result = run_scan(&mut store, &args, ScannerConfig::default());
        assert!(result.is_err());
        assert!(store.list_attendance(&session.id).unwrap().is_empty());
    }

    #[test]
    fn test_scan_blank_frames_end_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        for i in 0..3 {
            image::RgbImage::from_pixel(32, 32, image::Rgb([255, 255, 255]))
                .save(frames.join(format!("frame_{i}.png")))
                .unwrap();
        }
        let mut store = JsonFileRecordStore::open(dir.path().join("store.json")).unwrap();
        let session = store
            .create_session(NewSession {
                name: "Lab".into(),
                description: None,
            })
            .unwrap();
        let args = ScanArgs {
            session: session.id.clone(),
            frames,
            loop_frames: false,
            cooldown_ms: None,
            interval_ms: Some(1),
            duration_secs: Some(5),
        };

        run_scan(
            &mut store,
            &args,
            ScannerConfig::default().with_scan_interval(Duration::from_millis(1)),
        )
        .unwrap();
        assert!(store.list_attendance(&session.id).unwrap().is_empty());
    }

    fn write_qr_png(path: &Path, payload: &str) {
        const MODULE_PX: u32 = 4;
        const QUIET_ZONE: u32 = 4;
        let code = qrcode::QrCode::new(payload.as_bytes()).unwrap();
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let side = (modules + 2 * QUIET_ZONE) * MODULE_PX;
        let img = image::GrayImage::from_fn(side, side, |x, y| {
            let (mx, my) = (x / MODULE_PX, y / MODULE_PX);
            let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&mx)
                && (QUIET_ZONE..QUIET_ZONE + modules).contains(&my);
            let dark = inside
                && colors[((my - QUIET_ZONE) * modules + (mx - QUIET_ZONE)) as usize]
                    == qrcode::Color::Dark;
            image::Luma([if dark { 0 } else { 255 }])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_scan_records_badge_once() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        let payload = r#"{"name":"Lan","id":"B21"}"#;
        // The same badge held up for two frames.
        write_qr_png(&frames.join("frame_0.png"), payload);
        write_qr_png(&frames.join("frame_1.png"), payload);

        let mut store = JsonFileRecordStore::open(dir.path().join("store.json")).unwrap();
        let session = store
            .create_session(NewSession {
                name: "Lab".into(),
                description: None,
            })
            .unwrap();
        let args = ScanArgs {
            session: session.id.clone(),
            frames,
            loop_frames: false,
            cooldown_ms: None,
            interval_ms: Some(1),
            duration_secs: Some(10),
        };

        run_scan(
            &mut store,
            &args,
            ScannerConfig::default().with_scan_interval(Duration::from_millis(1)),
        )
        .unwrap();

        let records = store.list_attendance(&session.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].qr_content, payload);
        assert_eq!(records[0].student_name.as_deref(), Some("Lan"));
        assert_eq!(records[0].student_id.as_deref(), Some("B21"));
    }

    #[test]
    fn test_scan_unknown_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileRecordStore::open(dir.path().join("store.json")).unwrap();
        let args = ScanArgs {
            session: "missing".into(),
            frames: dir.path().to_path_buf(),
            loop_frames: false,
            cooldown_ms: None,
            interval_ms: None,
            duration_secs: None,
        };
        assert!(run_scan(&mut store, &args, ScannerConfig::default()).is_err());
    }
}
