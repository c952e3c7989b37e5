mod config;

use std::time::Duration;

use ffxiv_enmity::{find_client_processes, ClientProcess, ClientVariant, Combatant, EnmityEntry, Session};
use log::{debug, error, info, warn};
use serde::Serialize;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

fn rotate_file(path: &std::path::Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.len() >= MAX_LOG_SIZE {
            let old = path.with_extension("old");
            let _ = std::fs::rename(path, old);
        }
    }
}

fn setup_logging(level: log::LevelFilter) {
    let log_path = config::config_dir().join("enmity.log");
    rotate_file(&log_path);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_millis(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(file) = log_file {
        dispatch = dispatch.chain(file);
    } else {
        eprintln!("Warning: could not open log file {}", log_path.display());
    }

    dispatch.apply().expect("Failed to initialize logger");
}

// ─── Output ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PollLine<'a> {
    time: String,
    pid: u32,
    variant: ClientVariant,
    me: Option<&'a Combatant>,
    target: Option<&'a Combatant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    combatants: Option<&'a [Combatant]>,
    enmity: &'a [EnmityEntry],
}

fn print_snapshot(session: &Session, print_combatants: bool) {
    let snapshot = session.snapshot();
    let line = PollLine {
        time: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        pid: session.pid(),
        variant: session.variant(),
        me: snapshot.me.as_ref(),
        target: snapshot.target.as_ref(),
        combatants: print_combatants.then_some(snapshot.combatants.as_slice()),
        enmity: &snapshot.enmity,
    };
    match serde_json::to_string(&line) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize snapshot: {}", e),
    }
}

fn find_process(wanted: &str) -> Option<ClientProcess> {
    find_client_processes()
        .into_iter()
        .find(|p| wanted.is_empty() || p.name.eq_ignore_ascii_case(wanted))
}

// ─── Main ────────────────────────────────────────────────────────────

fn main() {
    let cfg = config::ProbeConfig::load();
    setup_logging(cfg.level_filter());

    info!("Enmity probe starting");
    info!(
        "process={} interval={}ms",
        if cfg.process_name.is_empty() { "<any client>" } else { cfg.process_name.as_str() },
        cfg.poll_interval_ms,
    );

    let interval = Duration::from_millis(cfg.poll_interval_ms.max(50));
    let mut session: Option<Session> = None;
    let mut waiting_logged = false;

    loop {
        match session.as_mut() {
            None => match find_process(&cfg.process_name) {
                Some(process) => {
                    info!("Found process '{}' with PID={}", process.name, process.pid);
                    match Session::attach(&process) {
                        Ok(s) => {
                            session = Some(s);
                            waiting_logged = false;
                        }
                        Err(e) => error!("Failed to attach to PID={}: {}", process.pid, e),
                    }
                }
                None => {
                    if !waiting_logged {
                        warn!("No client process found, waiting");
                        waiting_logged = true;
                    }
                }
            },
            Some(s) => {
                if s.is_usable() {
                    print_snapshot(s, cfg.print_combatants);
                } else if s.has_exited() {
                    info!("Process {} exited, detaching", s.pid());
                    session = None;
                } else {
                    debug!("Session for PID={} not usable yet", s.pid());
                }
            }
        }
        std::thread::sleep(interval);
    }
}
