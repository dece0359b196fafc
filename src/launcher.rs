//! Handing URLs to the operating system.

/// Opens a URI with whatever the OS has registered for it.
///
/// Fire-and-forget: implementations report failures through logging only.
pub trait Launcher: Send + Sync + 'static {
    fn open_url(&self, url: &str);
}

/// Launches through the desktop's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn open_url(&self, url: &str) {
        tracing::info!(url, "opening link");
        if let Err(e) = open::that_detached(url) {
            tracing::error!("Failed to open link {}: {}", url, e);
        }
    }
}
