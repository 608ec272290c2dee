//! Headless host for the reminder engine.
//!
//! Fire events go to the log. Standing in for the tray menu, stdin accepts:
//! `quick <title>`, `list`, `exit`.

use std::io::{self, BufRead};
use std::sync::Arc;

use log::{error, info, warn};
use reminder_engine_lib::{EngineConfig, LogSink, ReminderApp};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = EngineConfig::from_env();
    info!("Using data directory {}", config.data_dir.display());

    let app = ReminderApp::open(&config, Arc::new(LogSink));
    let scheduler = app.start(config.tick_interval);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read command: {}", e);
                break;
            }
        };
        let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));

        match command {
            "quick" => {
                let title = match rest.trim() {
                    "" => "Quick reminder",
                    title => title,
                };
                match app.quick_reminder(title) {
                    Ok(id) => info!("Quick reminder {} added", id),
                    Err(e) if e.is_warning() => warn!("Quick reminder added, not yet saved: {}", e),
                    Err(e) => error!("Quick reminder failed: {}", e),
                }
            }
            "list" => print_overview(&app),
            "exit" | "quit" => break,
            "" => {}
            other => warn!("Unknown command {:?} (quick, list, exit)", other),
        }
    }

    if let Err(e) = scheduler.shutdown() {
        error!("Exited without saving: {}", e);
        std::process::exit(1);
    }
    info!("Goodbye");
}

fn print_overview(app: &ReminderApp) {
    let pending = app.pending_reminders();
    println!("{} pending reminder(s)", pending.len());
    for r in pending {
        println!(
            "  [{}] {} at {} ({:?})",
            r.id,
            r.title,
            r.due_at.format("%Y-%m-%d %I:%M %p"),
            r.priority
        );
    }

    let upcoming = app.upcoming_alarms();
    println!("{} upcoming alarm(s)", upcoming.len());
    for (alarm, next) in upcoming {
        println!(
            "  [{}] {} at {} next {}",
            alarm.id,
            alarm.label,
            alarm.time_of_day,
            next.format("%a %Y-%m-%d %I:%M %p")
        );
    }
}
