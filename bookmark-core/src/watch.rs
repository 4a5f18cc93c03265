//! Keep the vault index and render cache in step with the filesystem.

use crate::render::Renderer;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Watch the content directory; on change, rebuild the index off the async
/// runtime, publish it and drop every cached render.
///
/// Must be called from within a tokio runtime. Watching stops when the
/// returned watcher is dropped.
pub fn spawn_vault_watcher(renderer: Arc<Renderer>) -> Result<RecommendedWatcher, notify::Error> {
    let content_dir = renderer.vault().content_dir().to_path_buf();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )?;
    watcher.watch(&content_dir, RecursiveMode::Recursive)?;
    tracing::info!("Watching {:?} for changes", content_dir);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                Ok(event) if affects_vault(&event, &content_dir) => {
                    // Debounce by draining pending events
                    while rx.try_recv().is_ok() {}
                    tracing::info!("Change detected, rebuilding vault index...");

                    let shared = renderer.shared_vault().clone();
                    match tokio::task::spawn_blocking(move || shared.rebuild()).await {
                        Ok(vault) => {
                            renderer.cache().clear();
                            tracing::info!(files = vault.files().len(), "Rebuild complete");
                        }
                        Err(e) => tracing::error!("Rebuild task panicked: {}", e),
                    }
                }
                Ok(_) => {}
                Err(err) => tracing::warn!("Watcher error: {}", err),
            }
        }
    });

    Ok(watcher)
}

/// Whether an event can change what the vault renders: reads and events on
/// hidden entries are ignored
pub fn affects_vault(event: &Event, content_dir: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|path| {
        let rel = path.strip_prefix(content_dir).unwrap_or(path);
        !rel.components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
    })
}
