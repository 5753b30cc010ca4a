// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running a headless swapping session
//! - Swapping a single image
//! - Refining a persona image into a description
//! - Showing and writing the configuration

use chrono::Local;
use persona_feed::app::{SessionController, SessionSettings, SessionStatus};
use persona_feed::backends::capture::{CaptureBackendType, get_backend};
use persona_feed::backends::inference::{GeminiClient, InferenceService, SwapRequest};
use persona_feed::config::Config;
use persona_feed::constants::app_info::CONFIG_DIR_NAME;
use persona_feed::constants::file_formats::extension_for_mime;
use persona_feed::constants::prompts::REFINE_INSTRUCTION;
use persona_feed::errors::{AppError, ConfigError};
use persona_feed::identity::IdentityStore;
use persona_feed::media::{DataUrl, ImageCodec, ImageResource, strip_envelope};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Options of the `run` command
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub persona: String,
    pub name: String,
    pub backend: Option<CaptureBackendType>,
    pub source: Option<PathBuf>,
    pub interval: Option<u64>,
    pub duration: Option<u64>,
    pub output: Option<PathBuf>,
}

/// Run a headless session, saving every new result frame
pub fn run_session(opts: RunOptions) -> CliResult<()> {
    let (mut config, _) = load_config(opts.config_path.as_deref())?;
    if let Some(backend) = opts.backend {
        config.backend = backend;
    }
    if let Some(interval) = opts.interval {
        config.tick_interval_secs = interval;
    }

    let output_dir = opts.output.unwrap_or_else(get_default_output_dir);
    std::fs::create_dir_all(&output_dir)?;

    let inference: Arc<dyn InferenceService> = Arc::new(GeminiClient::from_config(&config)?);
    let backend = get_backend(config.backend, opts.source)?;
    let settings = SessionSettings::from_config(&config);

    println!("Backend: {}", config.backend);
    println!("Interval: {:.1}s", settings.tick_interval.as_secs_f32());
    println!("Output: {}", output_dir.display());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let store = IdentityStore::new(Arc::clone(&inference), ImageCodec::new(settings.jpeg_quality));
        let (controller, handle) =
            SessionController::new(backend, Arc::clone(&inference), &store, settings);
        let session = tokio::spawn(controller.run());

        let persona = store.add(opts.name, ImageResource::parse(&opts.persona));
        store.select(&persona.id);
        println!("Persona: {} ({})", persona.name, persona.id);

        // Power on and wait for the device
        let mut views = handle.subscribe();
        handle.toggle_power()?;
        let view = views
            .wait_for(|v| {
                v.status == SessionStatus::Active
                    || (v.status == SessionStatus::Inactive && v.last_error.is_some())
            })
            .await?
            .clone();
        if view.status != SessionStatus::Active {
            handle.shutdown()?;
            session.await?;
            let reason = view.last_error.unwrap_or_default();
            return Err(format!("Failed to start capture: {}", reason).into());
        }

        // The persona image must be resolved before swapping can start
        let resolved = matches!(
            tokio::time::timeout(
                settings.request_timeout,
                views.wait_for(|v| v.can_toggle_persona())
            )
            .await,
            Ok(Ok(_))
        );
        if !resolved {
            handle.shutdown()?;
            session.await?;
            return Err("Persona image could not be loaded".into());
        }

        handle.toggle_persona()?;
        println!();
        println!("Swapping... (press Ctrl+C to stop)");

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let deadline = async {
            match opts.duration {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut last_anchor: Option<DataUrl> = None;
        let mut saved = 0u32;

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    println!();
                    println!("Stopping...");
                    break;
                }
                _ = &mut deadline => break,
                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let anchor = views.borrow_and_update().anchor.clone();
                    if let Some(anchor) = anchor
                        && last_anchor.as_ref() != Some(&anchor)
                    {
                        saved += 1;
                        let path = output_dir.join(format!(
                            "frame_{:04}.{}",
                            saved,
                            extension_for_mime(anchor.mime_type())
                        ));
                        tokio::fs::write(&path, anchor.decode_bytes()?).await?;
                        println!("Saved: {}", path.display());
                        last_anchor = Some(anchor);
                    }
                }
            }
        }

        let counters = handle.view().counters;
        handle.shutdown()?;
        session.await?;

        println!();
        println!(
            "Requests: {} sent, {} applied, {} failed, {} discarded",
            counters.dispatched, counters.completed, counters.failed, counters.discarded
        );
        println!("Frames saved: {}", saved);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Swap one source image with a persona
pub fn swap_once(
    config_path: Option<PathBuf>,
    source: String,
    target: String,
    anchor: Option<String>,
    output: Option<PathBuf>,
) -> CliResult<()> {
    let (config, _) = load_config(config_path.as_deref())?;
    let client = GeminiClient::from_config(&config)?;
    let codec = ImageCodec::new(config.jpeg_quality());

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let source = codec
            .resource_to_transportable(&ImageResource::parse(&source))
            .await?;
        let target = codec
            .resource_to_transportable(&ImageResource::parse(&target))
            .await?;
        let anchor = match anchor {
            Some(anchor) => Some(
                codec
                    .resource_to_transportable(&ImageResource::parse(&anchor))
                    .await?,
            ),
            None => None,
        };

        let request = SwapRequest::from_urls(&source, &target, anchor.as_ref());
        let payload = client.swap(&request).await?;
        Ok::<_, AppError>(DataUrl::envelope(&payload)?)
    })?;

    let output_path = match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            path
        }
        None => {
            let dir = get_default_output_dir();
            std::fs::create_dir_all(&dir)?;
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!(
                "swap_{}.{}",
                timestamp,
                extension_for_mime(result.mime_type())
            ))
        }
    };

    std::fs::write(&output_path, result.decode_bytes()?)?;
    println!("Swap saved: {}", output_path.display());
    Ok(())
}

/// Print the face description for a persona image
pub fn refine(config_path: Option<PathBuf>, image: String) -> CliResult<()> {
    let (config, _) = load_config(config_path.as_deref())?;
    let client = GeminiClient::from_config(&config)?;
    let codec = ImageCodec::new(config.jpeg_quality());

    let rt = tokio::runtime::Runtime::new()?;
    let description = rt.block_on(async {
        let url = codec
            .resource_to_transportable(&ImageResource::parse(&image))
            .await?;
        Ok::<_, AppError>(client.refine(&strip_envelope(&url), REFINE_INSTRUCTION).await?)
    })?;

    println!("{}", description);
    Ok(())
}

/// Print the effective configuration, optionally writing it back
pub fn show_config(config_path: Option<PathBuf>, write: bool) -> CliResult<()> {
    let (config, path) = load_config(config_path.as_deref())?;

    if write {
        config.save_to(&path)?;
        println!("Configuration written: {}", path.display());
    }

    let mut shown = config;
    if shown.api_key.is_some() {
        shown.api_key = Some("<redacted>".to_string());
    }
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}

/// Load the config from an explicit path or the default location
fn load_config(path: Option<&Path>) -> Result<(Config, PathBuf), ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    let config = Config::load_from(&path)?;
    Ok((config, path))
}

/// Get default output directory
fn get_default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(CONFIG_DIR_NAME)
}
