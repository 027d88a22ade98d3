use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use folio_migrate::config::{MigrateConfig, TagMode};
use folio_migrate::content_api::{ContentApi, RecordStore};
use folio_migrate::csv_load::{load_projects, load_tag_rows};
use folio_migrate::driver::MigrationDriver;
use folio_migrate::logging::init_tracing;
use folio_migrate::media::sync::{MediaMap, MediaSync, MediaSyncSummary};
use folio_migrate::pacing::Pacer;
use folio_migrate::screenshot::{ChromiumRenderer, ScreenshotCapture};
use folio_migrate::util::env as env_util;

#[derive(Parser, Debug)]
#[command(name = "fm", version, about = "Portfolio migration CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Synchronize local media with the remote store and print the media map
    MediaSync {
        /// Media root override (defaults to MEDIA_ROOT, then ./media)
        media_root: Option<PathBuf>,
    },
    /// Create one record per CSV row, attaching synchronized media
    Migrate {
        /// Input CSV (defaults to projects.csv)
        csv: Option<PathBuf>,
        /// Submit records without a media pass
        #[arg(long, default_value_t = false)]
        skip_media: bool,
    },
    /// Bulk-create tags from a name,description CSV (defaults to tags.csv)
    AddTags {
        /// Input CSV
        csv: Option<PathBuf>,
    },
    /// List remote categories and tags with their identifiers
    Taxonomies,
    /// Capture viewport screenshots for projects with a configured URL
    Screenshots {
        /// Input CSV (defaults to projects.csv)
        csv: Option<PathBuf>,
    },
}

fn require_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("input file not found: {}", path.display());
    }
    Ok(())
}

fn print_media_summary(summary: &MediaSyncSummary) {
    println!(
        "Media sync complete: {} project(s), {} already present, {} uploaded, {} failed, {} rename failure(s)",
        summary.projects,
        summary.confirmed_existing,
        summary.uploaded,
        summary.upload_failures,
        summary.rename_failures
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::MediaSync { media_root } => {
            let cfg = MigrateConfig::from_env()?;
            let root = media_root.unwrap_or_else(|| cfg.media_root.clone());
            let api = ContentApi::new(&cfg)?;
            let pacer = Pacer::new(cfg.lookup_rps, cfg.upload_rps, cfg.submit_rps);

            println!("Starting media sync...");
            println!("Media directory: {}\n", root.display());
            let (map, summary) = MediaSync::new(&api, &pacer, cfg.strategy)
                .build_media_map(&root)
                .await?;
            println!();
            print_media_summary(&summary);
            println!("\nMedia map:\n{}", map.to_pretty_json());
        }

        Commands::Migrate { csv, skip_media } => {
            let cfg = MigrateConfig::from_env()?;
            let csv_path = csv.unwrap_or_else(|| PathBuf::from("projects.csv"));
            require_file(&csv_path)?;
            let rows = load_projects(&csv_path, cfg.tag_mode)?;
            let api = ContentApi::new(&cfg)?;
            let pacer = Pacer::new(cfg.lookup_rps, cfg.upload_rps, cfg.submit_rps);

            println!("Starting bulk upload...\n");
            println!("CSV file: {}", csv_path.display());
            println!("Total records to create: {}\n", rows.len());

            let (map, media_summary) = if skip_media {
                (MediaMap::default(), MediaSyncSummary::default())
            } else {
                MediaSync::new(&api, &pacer, cfg.strategy)
                    .build_media_map(&cfg.media_root)
                    .await?
            };
            if !skip_media {
                print_media_summary(&media_summary);
                println!();
            }

            let summary = MigrationDriver::new(&api, &pacer).run(&rows, &map).await;
            println!(
                "\nUpload complete: {}/{} records created successfully",
                summary.succeeded, summary.attempted
            );
            if summary.failed > 0 {
                println!("{} record(s) failed; see log above", summary.failed);
            }
        }

        Commands::AddTags { csv } => {
            let cfg = MigrateConfig::from_env()?;
            let csv_path = csv.unwrap_or_else(|| PathBuf::from("tags.csv"));
            require_file(&csv_path)?;
            let tags = load_tag_rows(&csv_path)?;
            if tags.is_empty() {
                println!("No tags to create.");
                return Ok(());
            }
            println!("Found {} tag(s) to create.\n", tags.len());

            let api = ContentApi::new(&cfg)?;
            let pacer = Pacer::new(cfg.lookup_rps, cfg.upload_rps, cfg.submit_rps);
            let mut created = 0usize;
            for tag in &tags {
                pacer.before_submit().await;
                match api.create_tag(&tag.name, Some(tag.description.as_str())).await {
                    Ok(term) => {
                        println!("Created: {} (ID: {})", term.name, term.id);
                        created += 1;
                    }
                    Err(err) => error!(tag = %tag.name, error = %err, "tag creation failed"),
                }
            }
            println!(
                "\nCompleted: {}/{} tags created successfully.",
                created,
                tags.len()
            );
        }

        Commands::Taxonomies => {
            let cfg = MigrateConfig::from_env()?;
            let api = ContentApi::new(&cfg)?;

            println!("CATEGORIES:");
            println!("===========\n");
            let categories = api.list_terms("categories").await?;
            if categories.is_empty() {
                println!("No categories found.");
            }
            for term in categories {
                println!("ID: {} | Name: {} | Slug: {}", term.id, term.name, term.slug);
            }

            println!("\nTAGS:");
            println!("=====\n");
            let tags = api.list_terms("tags").await?;
            if tags.is_empty() {
                println!("No tags found.");
            }
            for term in tags {
                println!("ID: {} | Name: {} | Slug: {}", term.id, term.name, term.slug);
            }

            println!("\nTo use categories/tags in your CSV:");
            println!("- Add a \"categories\" column with comma-separated category IDs");
            println!("- Add a \"tags\" column with comma-separated tag IDs");
        }

        Commands::Screenshots { csv } => {
            // Capture is local-only; no API credentials required.
            let csv_path = csv.unwrap_or_else(|| PathBuf::from("projects.csv"));
            require_file(&csv_path)?;
            let rows = load_projects(&csv_path, TagMode::ById)?;
            let media_root =
                PathBuf::from(env_util::env_opt("MEDIA_ROOT").unwrap_or_else(|| "media".into()));

            println!("Starting screenshot capture...\n");
            println!("CSV file: {}", csv_path.display());
            println!("Output directory: {}\n", media_root.display());

            let renderer = ChromiumRenderer::from_env();
            let pacer = Pacer::new(1, 1, 1);
            let capture = ScreenshotCapture::new(&renderer, &media_root, &pacer);
            let summary = capture.run(&rows).await;

            let rule = "=".repeat(60);
            println!("\n{rule}");
            println!("SCREENSHOT CAPTURE SUMMARY");
            println!("{rule}");
            println!("Total URLs processed: {}", summary.urls);
            println!("Total screenshots captured: {}", summary.captured);
            println!("Skipped (already present): {}", summary.skipped);
            println!("Total failures: {}", summary.failed);
            println!("{rule}");
        }
    }

    Ok(())
}
