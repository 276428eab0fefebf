use anyhow::Context;
use dotenvy::dotenv;
use fb_uploader::{
    FilePayload, FormController, SubmitOutcome, UploadConfig, UploadEvent, UploadManager,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fb_uploader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: fb-uploader <file>...");
        std::process::exit(2);
    }

    let config = UploadConfig::from_env()?;
    let fields = load_fields()?;
    info!("⬆️  Uploading {} file(s) to {}", paths.len(), config.endpoint);

    let redirect_when_done = config.redirect_when_done.clone();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let manager = UploadManager::new(config.endpoint.clone(), events_tx);
    let mut form = FormController::new(config, fields);

    for path in &paths {
        let payload = FilePayload::from_path(path)
            .await
            .with_context(|| format!("reading {path}"))?;
        let filename = payload.filename.clone();
        // A valid selection into the last slot appends a fresh one, so the
        // last slot is always the free one.
        let slot = form.slot_count() - 1;
        match form.select_file(slot, payload) {
            Ok(()) => info!("📄 {} queued for upload", filename),
            Err(err) => warn!("❌ {} rejected: {}", filename, err),
        }
    }

    let redirect = match form.submit(&manager) {
        SubmitOutcome::Redirect(url) => {
            // Nothing passed validation; same fast path as an empty form.
            url
        }
        SubmitOutcome::Submitted(count) => {
            info!("📤 {} upload(s) started", count);
            let mut redirect = redirect_when_done;
            while let Some(event) = events_rx.recv().await {
                match &event {
                    UploadEvent::Progress { task, percent } => {
                        debug!(task, percent, "upload progress");
                    }
                    UploadEvent::Succeeded { task, .. } => info!("✅ upload {} finished", task),
                    UploadEvent::Failed { task, status } => {
                        warn!("❌ upload {} failed with status {}", task, status);
                    }
                    _ => {}
                }
                if let Some(url) = form.apply(&event) {
                    redirect = url;
                    break;
                }
            }
            redirect
        }
    };

    let failed = form
        .slots()
        .iter()
        .filter(|slot| slot.error.is_some())
        .count();
    if failed > 0 {
        warn!("⚠️  {} file(s) were not uploaded", failed);
    }
    info!("↪️  Done, redirecting to {}", redirect);

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Optional extra form fields from the file named by `UPLOAD_FIELDS`: a JSON
/// array of `[name, value]` pairs, kept in order.
fn load_fields() -> anyhow::Result<Vec<(String, String)>> {
    let Ok(path) = std::env::var("UPLOAD_FIELDS") else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let fields = serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    Ok(fields)
}
