use crate::model::Forecast;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Default file name for a saved forecast, e.g. `forecast-springfield-2024-05-01_19-47-12Z.json`.
pub fn default_export_name(forecast: &Forecast) -> String {
    let place: String = forecast
        .location
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!(
        "forecast-{}-{}.json",
        place,
        forecast.fetched_at_utc.replace(':', "-").replace('T', "_")
    )
}

/// Save the forecast as JSON, to `explicit` if given, otherwise into the current directory.
/// Returns the absolute path written.
pub fn save_forecast(forecast: &Forecast, explicit: Option<&Path>) -> Result<PathBuf> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir()
            .context("get current directory")?
            .join(default_export_name(forecast)),
    };
    crate::cli::export_json(&path, forecast)?;
    Ok(path)
}

/// Initialize the clipboard manager thread if not already initialized.
/// Operations are processed in order, each clipboard instance kept alive for a while.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        // X11 and Wayland serve clipboard reads from the owning process.
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue the forecast summary for the clipboard. Returns without waiting.
pub fn copy_forecast(forecast: &Forecast) -> Result<()> {
    let text = crate::text_summary::build_text_summary(forecast)
        .lines
        .join("\n");
    let sender = init_clipboard_manager()?;
    sender
        .send(text)
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
