use std::path::{Path, PathBuf};

mod ai;
mod calendar;
mod config;
mod db;
mod error;
mod media;
mod models;
mod pipeline;
mod session;

use config::Config;
use db::Repository;
use error::Result;
use models::{GenerationInput, MediaBlob};
use pipeline::{Pipeline, ProgressSender, ProgressUpdate, UserFacingError};
use session::UserSession;
use tokio::sync::mpsc;
use uuid::Uuid;

const USAGE: &str = "\
sermon-scribe — turn sermon material into devotional plans and calendar events

USAGE:
    sermon-scribe study [--audio FILE] [--image FILE]... [--text FILE]
    sermon-scribe bulletin IMAGE...
    sermon-scribe plans
    sermon-scribe complete PLAN_ID DAY
    sermon-scribe events
    sermon-scribe export-event ID [--out FILE]
    sermon-scribe delete-event ID
    sermon-scribe find-church QUERY...
";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = Config::load()?;
    let repository = Repository::new(&config.db_path).await?;
    let pipeline = Pipeline::new(&config, repository);
    let session = UserSession::from(&config);

    let Some(command) = args.first() else {
        print!("{}", USAGE);
        return Ok(());
    };

    match command.as_str() {
        "study" => run_study(&pipeline, &session, &args[1..]).await?,
        "bulletin" => run_bulletin(&pipeline, &session, &args[1..]).await?,
        "plans" => run_plans(&pipeline, &session).await?,
        "complete" => run_complete(&pipeline, &args[1..]).await?,
        "events" => run_events(&pipeline, &session).await?,
        "export-event" => run_export_event(&pipeline, &args[1..]).await?,
        "delete-event" => run_delete_event(&pipeline, &args[1..]).await?,
        "find-church" => run_find_church(&pipeline, &args[1..]).await?,
        _ => {
            eprintln!("Unknown command: {}", command);
            print!("{}", USAGE);
        }
    }

    Ok(())
}

async fn run_study(
    pipeline: &Pipeline,
    session: &UserSession,
    args: &[String],
) -> Result<()> {
    let mut input = GenerationInput::default();

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--audio" => {
                let path = expect_value(&mut iter, "--audio")?;
                input.audio = Some(read_blob(&path)?);
            }
            "--image" => {
                let path = expect_value(&mut iter, "--image")?;
                input.images.push(read_blob(&path)?);
            }
            "--text" => {
                let path = expect_value(&mut iter, "--text")?;
                input.text = Some(std::fs::read_to_string(&path)?);
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print!("{}", USAGE);
                return Ok(());
            }
        }
    }

    let (tx, printer) = spawn_progress_printer();
    let result = pipeline.generate_study_plan(session, input, &tx).await;
    drop(tx);
    let _ = printer.await;

    match result {
        Ok(plan) => {
            println!("Created study plan: {}", plan.title);
            if let Some(speaker) = &plan.speaker {
                println!("Speaker: {}", speaker);
            }
            for day in &plan.days {
                println!("  Day {}: {} ({})", day.day_number, day.topic, day.scripture);
            }
        }
        Err(e) => report_failure(&e),
    }

    Ok(())
}

async fn run_bulletin(
    pipeline: &Pipeline,
    session: &UserSession,
    args: &[String],
) -> Result<()> {
    let images = args
        .iter()
        .map(|path| read_blob(Path::new(path)))
        .collect::<Result<Vec<_>>>()?;

    let (tx, printer) = spawn_progress_printer();
    let result = pipeline.scan_bulletin(session, images, &tx).await;
    drop(tx);
    let _ = printer.await;

    match result {
        Ok(bulletin) => {
            println!("Scanned bulletin: {}", bulletin.title);
            if !bulletin.summary.is_empty() {
                println!("{}", bulletin.summary);
            }
            if bulletin.events.is_empty() {
                println!("No new events found.");
            }
            for event in &bulletin.events {
                println!(
                    "  {} — {} {} @ {}",
                    event.title, event.date, event.time, event.location
                );
            }
        }
        Err(e) => report_failure(&e),
    }

    Ok(())
}

async fn run_plans(pipeline: &Pipeline, session: &UserSession) -> Result<()> {
    let plans = pipeline.repository().list_plans(&session.user_id).await?;
    if plans.is_empty() {
        println!("No study plans yet.");
        return Ok(());
    }
    for plan in plans {
        let done = plan.days.iter().filter(|d| d.is_completed).count();
        println!(
            "{}  {} ({} days, {} completed)",
            plan.id,
            plan.title,
            plan.days.len(),
            done
        );
    }
    Ok(())
}

async fn run_complete(pipeline: &Pipeline, args: &[String]) -> Result<()> {
    let (Some(id_arg), Some(day_arg)) = (args.first(), args.get(1)) else {
        eprintln!("complete requires a plan id and a day number");
        return Ok(());
    };
    let Ok(id) = Uuid::parse_str(id_arg) else {
        eprintln!("Not a valid plan id: {}", id_arg);
        return Ok(());
    };
    let Ok(day) = day_arg.parse::<u32>() else {
        eprintln!("Not a valid day number: {}", day_arg);
        return Ok(());
    };

    pipeline.repository().set_day_completed(id, day, true).await?;

    match pipeline.repository().get_plan(id).await? {
        Some(plan) => {
            let done = plan.days.iter().filter(|d| d.is_completed).count();
            println!(
                "Marked day {} of '{}' complete ({}/{} done)",
                day,
                plan.title,
                done,
                plan.days.len()
            );
        }
        None => eprintln!("No plan with id {}", id),
    }
    Ok(())
}

async fn run_delete_event(pipeline: &Pipeline, args: &[String]) -> Result<()> {
    let Some(id_arg) = args.first() else {
        eprintln!("delete-event requires an event id");
        return Ok(());
    };
    let Ok(id) = Uuid::parse_str(id_arg) else {
        eprintln!("Not a valid event id: {}", id_arg);
        return Ok(());
    };
    pipeline.repository().delete_event(id).await?;
    println!("Deleted event {}", id);
    Ok(())
}

async fn run_events(pipeline: &Pipeline, session: &UserSession) -> Result<()> {
    let mut events = pipeline.repository().list_events(&session.user_id).await?;
    if events.is_empty() {
        println!("No events yet.");
        return Ok(());
    }
    calendar::sort_events_chronologically(&mut events);
    for event in events {
        println!(
            "{}  {} {}  {} @ {}",
            event.id,
            event.date,
            calendar::normalize_time(&event.time),
            event.title,
            event.location
        );
    }
    Ok(())
}

async fn run_export_event(pipeline: &Pipeline, args: &[String]) -> Result<()> {
    let Some(id_arg) = args.first() else {
        eprintln!("export-event requires an event id");
        return Ok(());
    };
    let Ok(id) = Uuid::parse_str(id_arg) else {
        eprintln!("Not a valid event id: {}", id_arg);
        return Ok(());
    };

    let out_path = match args.get(1).map(String::as_str) {
        Some("--out") => args.get(2).map(PathBuf::from),
        _ => None,
    };

    let Some(event) = pipeline.repository().get_event(id).await? else {
        eprintln!("No event with id {}", id);
        return Ok(());
    };

    let ics = calendar::event_to_ics(&event);
    match out_path {
        Some(path) => {
            std::fs::write(&path, ics)?;
            println!("Wrote {:?}", path);
        }
        None => print!("{}", ics),
    }
    Ok(())
}

async fn run_find_church(pipeline: &Pipeline, args: &[String]) -> Result<()> {
    let query = args.join(" ");

    let (tx, printer) = spawn_progress_printer();
    let result = pipeline.search_locations(&query, &tx).await;
    drop(tx);
    let _ = printer.await;

    match result {
        Ok(candidates) => {
            if candidates.is_empty() {
                println!("No churches found.");
            }
            for c in candidates {
                println!("{}  ({:.5}, {:.5})", c.name, c.latitude, c.longitude);
                if !c.address.is_empty() {
                    println!("    {}", c.address);
                }
            }
        }
        Err(e) => report_failure(&e),
    }
    Ok(())
}

fn spawn_progress_printer() -> (ProgressSender, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
    let handle = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            eprintln!("[{:>3}%] {}", update.percent, update.state.label());
        }
    });
    (tx, handle)
}

fn report_failure(e: &UserFacingError) {
    eprintln!("{}", e.message);
    eprintln!("  {}", e.detail);
    if e.error.is_retryable() {
        eprintln!("  Run the same command again to retry.");
    }
}

fn expect_value<'a, I: Iterator<Item = &'a String>>(
    iter: &mut I,
    flag: &str,
) -> Result<PathBuf> {
    iter.next()
        .map(PathBuf::from)
        .ok_or_else(|| error::AppError::Config(format!("{} requires a file path", flag)))
}

fn read_blob(path: &Path) -> Result<MediaBlob> {
    let bytes = std::fs::read(path)?;
    Ok(MediaBlob::new(bytes, guess_mime(path)))
}

fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("m4a") => "audio/m4a",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("aac") => "audio/aac",
        _ => "application/octet-stream",
    }
}
