//! Feeds a recorded protocol event fixture through the engine and prints
//! the resulting surface commands as JSON lines on stdout.
//!
//! Fixtures are JSON lines, one [`ProtocolEvent`] per line. Blank lines and
//! lines starting with `#` are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatglass_core::models::ProtocolEvent;
use chatglass_core::{
    BadgeProvider, EventRouter, HelixBadgeProvider, JsonFileStore, MemoryStore, NullSink,
    OverlayConfig, StateStore, Surface, SurfaceCommand,
};
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

pub async fn run(
    events: &Path,
    config: Option<&Path>,
    state: Option<PathBuf>,
    no_state: bool,
) -> Result<()> {
    let config = OverlayConfig::load(config)?;

    let store: Arc<dyn StateStore> = if no_state {
        Arc::new(MemoryStore::new())
    } else {
        let path = match state {
            Some(path) => path,
            None => default_state_path()?,
        };
        let store = JsonFileStore::open(&path)
            .with_context(|| format!("opening state file {}", path.display()))?;
        Arc::new(store)
    };

    let (surface, mut rx) = Surface::channel();
    let mut router = EventRouter::new(config.clone(), surface, store, Arc::new(NullSink));

    let provider = badge_provider(&config)?;
    router
        .seed(provider.as_ref().map(|p| p as &dyn BadgeProvider))
        .await;
    print_pending(&mut rx)?;

    let reader = open_events(events)?;
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", events.display()))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: ProtocolEvent = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: bad event", events.display(), number + 1))?;
        router.on_event(event).await;
        print_pending(&mut rx)?;
    }

    // Alerts animate on their own clock; let the queue finish before exiting.
    while !router.alerts_idle() {
        tokio::time::sleep(Duration::from_millis(25)).await;
        print_pending(&mut rx)?;
    }
    print_pending(&mut rx)?;
    Ok(())
}

fn print_pending(rx: &mut UnboundedReceiver<SurfaceCommand>) -> Result<()> {
    while let Ok(command) = rx.try_recv() {
        println!("{}", serde_json::to_string(&command)?);
    }
    Ok(())
}

fn open_events(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file =
            File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn badge_provider(config: &OverlayConfig) -> Result<Option<HelixBadgeProvider>> {
    if config.helix.client_id.is_empty() {
        return Ok(None);
    }
    let base = Url::parse(&config.helix.base_url).context("invalid helix base_url")?;
    Ok(Some(HelixBadgeProvider::new(
        base,
        config.helix.client_id.clone(),
        config.helix.token.clone(),
    )))
}

fn default_state_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "chatglass")
        .context("no home directory found; pass --state or --no-state")?;
    Ok(dirs.data_dir().join("state.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn no_client_id_means_no_provider() {
        let config = OverlayConfig::default();
        assert!(badge_provider(&config).unwrap().is_none());
    }

    #[test]
    fn fixture_lines_parse_as_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(
            file,
            r#"{{"tags":{{"user-id":"1","display-name":"A"}},"body":"hi"}}"#
        )
        .unwrap();

        let reader = open_events(&path).unwrap();
        let events: Vec<ProtocolEvent> = reader
            .lines()
            .map(Result::unwrap)
            .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
            .map(|line| serde_json::from_str(&line).unwrap())
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body, "hi");
    }
}
