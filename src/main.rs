use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use touchcontroller::host::{self, HostCommand, ParseError};
use touchcontroller::persistence::{FileStore, KeyValueStore, MemoryStore};
use touchcontroller::synth::TracingSink;
use touchcontroller::{Engine, EngineHandle};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let store = open_store();
    let engine = Engine::load(Box::new(TracingSink), store, Instant::now());
    let mut handle = EngineHandle::spawn(engine);
    info!("Reading commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            info!("End of input");
            break;
        };
        if line.trim_start().starts_with('#') {
            continue;
        }

        let command = match line.parse::<HostCommand>() {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        match host::dispatch(&handle, command).await {
            Ok(Some(reply)) => println!("{}", reply),
            Ok(None) => {}
            Err(e) => error!("{}", e),
        }
    }

    let outcome = handle.shutdown().await?;
    info!("Shut down ({:?})", outcome);
    Ok(())
}

fn open_store() -> Box<dyn KeyValueStore + Send> {
    match FileStore::open_default() {
        Ok(store) => {
            info!("Persisting to {}", store.dir().display());
            Box::new(store)
        }
        Err(e) => {
            warn!("{}, settings will only live in memory", e);
            Box::new(MemoryStore::new())
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging(log_level(std::env::var("RUST_LOG").ok().as_deref()));
    Ok(())
}

/// Max level from a plain `RUST_LOG` value such as `debug`. Anything else,
/// including per-target directives, falls back to info.
fn log_level(value: Option<&str>) -> Level {
    value
        .and_then(|v| v.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

fn setup_logging(level: Level) {
    // stdout carries the command replies
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_follows_plain_rust_log() {
        assert_eq!(log_level(Some("debug")), Level::DEBUG);
        assert_eq!(log_level(Some("WARN")), Level::WARN);
        assert_eq!(log_level(Some("touchcontroller=trace")), Level::INFO);
        assert_eq!(log_level(None), Level::INFO);
    }
}
