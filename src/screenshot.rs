//! Idempotent viewport screenshot capture.
//!
//! Shares the media pipeline's discipline: a gallery file whose name is
//! prefixed by the viewport label means the capture already happened and is
//! skipped, and per-viewport failures are isolated and counted. Rendering
//! sits behind a trait; the default implementation shells out to a headless
//! Chromium binary.
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::csv_load::ProjectRow;
use crate::media::scanner::IMAGE_EXTENSIONS;
use crate::pacing::Pacer;
use crate::util::env::{env_opt, env_parse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const VIEWPORTS: [Viewport; 3] = [
    Viewport {
        name: "mobile",
        width: 375,
        height: 667,
    },
    Viewport {
        name: "tablet",
        width: 768,
        height: 1024,
    },
    Viewport {
        name: "desktop",
        width: 1920,
        height: 1080,
    },
];

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render the page in an isolated context sized to the viewport and
    /// return encoded PNG bytes.
    async fn capture(&self, url: &str, viewport: &Viewport) -> Result<Vec<u8>>;
}

/// Renders through a headless Chromium binary. Virtual time stands in for
/// the network-idle wait; a run that exceeds the navigation timeout is
/// retried once after a fixed settle delay instead of failing outright.
pub struct ChromiumRenderer {
    binary: String,
    nav_timeout: Duration,
    settle: Duration,
}

impl ChromiumRenderer {
    pub fn from_env() -> Self {
        Self {
            binary: env_opt("CHROMIUM_BIN").unwrap_or_else(|| "chromium".into()),
            nav_timeout: Duration::from_secs(env_parse("CAPTURE_NAV_TIMEOUT_SECS", 90u64)),
            settle: Duration::from_millis(env_parse("CAPTURE_SETTLE_MS", 4000u64)),
        }
    }

    fn scratch_path(&self, viewport: &Viewport) -> PathBuf {
        std::env::temp_dir().join(format!(
            "folio-capture-{}-{}-{}.png",
            std::process::id(),
            viewport.name,
            chrono::Utc::now().timestamp_millis()
        ))
    }

    async fn run_once(&self, url: &str, viewport: &Viewport, out: &Path) -> Result<()> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .arg(format!(
                "--window-size={},{}",
                viewport.width, viewport.height
            ))
            .arg(format!(
                "--virtual-time-budget={}",
                self.settle.as_millis()
            ))
            .arg(format!("--screenshot={}", out.display()))
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = tokio::time::timeout(self.nav_timeout, cmd.status())
            .await
            .map_err(|_| anyhow!("navigation timed out after {:?}", self.nav_timeout))?
            .with_context(|| format!("cannot spawn {}", self.binary))?;
        if !status.success() {
            return Err(anyhow!("{} exited with {status}", self.binary));
        }
        Ok(())
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn capture(&self, url: &str, viewport: &Viewport) -> Result<Vec<u8>> {
        let out = self.scratch_path(viewport);
        if let Err(err) = self.run_once(url, viewport, &out).await {
            warn!(url, viewport = viewport.name, error = %err, "capture attempt failed, retrying after settle delay");
            tokio::time::sleep(self.settle).await;
            self.run_once(url, viewport, &out).await?;
        }
        let bytes = std::fs::read(&out)
            .with_context(|| format!("no screenshot produced at {}", out.display()))?;
        let _ = std::fs::remove_file(&out);
        Ok(bytes)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureSummary {
    pub urls: usize,
    pub captured: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ScreenshotCapture<'a, R: Renderer> {
    renderer: &'a R,
    media_root: &'a Path,
    pacer: &'a Pacer,
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Viewport labels that already have a capture in the gallery directory.
fn existing_viewports(dir: &Path) -> HashSet<&'static str> {
    let mut seen = HashSet::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return seen;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_image = path.is_file()
            && path
                .extension()
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
                .unwrap_or(false);
        if !is_image {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        for viewport in &VIEWPORTS {
            if name.starts_with(&format!("{}-", viewport.name)) {
                seen.insert(viewport.name);
            }
        }
    }
    seen
}

impl<'a, R: Renderer> ScreenshotCapture<'a, R> {
    pub fn new(renderer: &'a R, media_root: &'a Path, pacer: &'a Pacer) -> Self {
        Self {
            renderer,
            media_root,
            pacer,
        }
    }

    pub async fn run(&self, rows: &[ProjectRow]) -> CaptureSummary {
        let mut summary = CaptureSummary::default();

        for row in rows {
            let Some(url) = &row.company_url else {
                info!(company = %row.company, "no URL configured, skipping");
                continue;
            };
            let url = normalize_url(url);
            summary.urls += 1;

            let gallery_dir = self.media_root.join(row.project_key()).join("gallery");
            if let Err(err) = std::fs::create_dir_all(&gallery_dir) {
                warn!(project = %row.project_key(), error = %err, "cannot create gallery directory, skipping project");
                summary.failed += VIEWPORTS.len();
                continue;
            }

            let existing = existing_viewports(&gallery_dir);
            for viewport in &VIEWPORTS {
                if existing.contains(viewport.name) {
                    info!(project = %row.project_key(), viewport = viewport.name, "capture already present, skipping");
                    summary.skipped += 1;
                    continue;
                }

                match self.renderer.capture(&url, viewport).await {
                    Ok(bytes) => {
                        let name = format!(
                            "{}-{}.png",
                            viewport.name,
                            chrono::Utc::now().timestamp_millis()
                        );
                        let target = gallery_dir.join(&name);
                        match std::fs::write(&target, &bytes) {
                            Ok(()) => {
                                info!(project = %row.project_key(), viewport = viewport.name, file = %name, "captured");
                                summary.captured += 1;
                            }
                            Err(err) => {
                                warn!(project = %row.project_key(), viewport = viewport.name, error = %err, "cannot persist capture");
                                summary.failed += 1;
                            }
                        }
                    }
                    Err(err) => {
                        warn!(project = %row.project_key(), viewport = viewport.name, url = %url, error = %err, "capture failed");
                        summary.failed += 1;
                    }
                }
            }

            self.pacer.before_lookup().await;
        }

        summary
    }
}
