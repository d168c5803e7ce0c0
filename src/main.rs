/*
 *  main.rs
 *
 *  StatusPane - worth a glance
 *  (c) 2020-26 Stuart Hunter
 *
 *  Process wiring: config, threads, signals
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal::unix::{signal, SignalKind};

use statuspane::animation::AnimationEngine;
use statuspane::cache::ImageCaches;
use statuspane::config::{self, Config};
use statuspane::display::compose::Layout;
use statuspane::display::drivers::{FbdevSink, MockSink};
use statuspane::display::{DisplaySink, DisplayState, RenderScheduler};
use statuspane::ingest::{Ingest, IngestOptions};
use statuspane::media::{MediaFile, WeatherFile};
use statuspane::metrics::LoadSampler;
use statuspane::persist::{self, StateWriter};
use statuspane::pipeline::{self, Coordinator};
use statuspane::rate::{PollBackoff, RateController};
use statuspane::runtime::{self, AnimationLoop};
use statuspane::shutdown::Shutdown;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and logs which one arrived.
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

fn spawn_renderer<S: DisplaySink + 'static>(
    sink: S,
    state: Arc<DisplayState>,
    cfg: &Config,
    shutdown: Shutdown,
) -> anyhow::Result<JoinHandle<()>> {
    let scheduler = RenderScheduler::new(sink, state, cfg.scheduler())?;
    let handle = std::thread::Builder::new()
        .name("render".into())
        .spawn(move || scheduler.run(shutdown))?;
    Ok(handle)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level.as_str()))
        .format_timestamp_secs()
        .init();

    info!("{} v.{} built {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let shutdown = Shutdown::new();
    let (width, height) = cfg.display.logical_size();
    let layout = Layout::for_size(width, height);
    let anim = &cfg.animation;
    let album_size = (anim.album_size, anim.album_size);
    let portrait_size = (anim.portrait_size, anim.portrait_size);

    let state = Arc::new(DisplayState::new((width, height), cfg.render.start_screen, album_size, portrait_size));
    info!(
        "Display {}x{} ({:?}, rotated {}), {:?} layout",
        cfg.display.width, cfg.display.height, cfg.display.color_depth, cfg.display.rotate_deg, layout.category
    );

    let mut threads: Vec<JoinHandle<()>> = Vec::new();

    // persisted now playing state, shown paused until the first poll
    let writer = match cfg.state_path() {
        Some(path) => {
            if let Some(mut track) = persist::load_snapshot(&path) {
                info!("Restored last track: {}", track.title);
                track.is_playing = false;
                let mut f = state.lock();
                layout.fit_scroll(&mut f.scroll, &track);
                f.track = Some(track);
            }
            let writer = StateWriter::new(path);
            let handle = writer.handle();
            threads.push(writer.start(shutdown.clone()).context("starting state writer")?);
            Some(handle)
        }
        None => {
            warn!("No state file location; now playing state will not persist");
            None
        }
    };

    // image pipeline
    let p = &cfg.pipeline;
    let caches = Arc::new(ImageCaches::new(p.resized_cache, p.dithered_cache, p.background_cache));
    let pool = pipeline::start_pool(p.workers);
    let (coordinator, requester) = Coordinator::new(state.clone(), caches, pool, p.queue_capacity);
    threads.push(coordinator.spawn(shutdown.clone()).context("starting pipeline coordinator")?);

    // render loop
    let render = match &cfg.display.sink_path {
        Some(path) => {
            let sink = FbdevSink::open(path, cfg.display.capabilities())?;
            info!("Writing frames to {}", sink.path().display());
            spawn_renderer(sink, state.clone(), &cfg, shutdown.clone())?
        }
        None => {
            warn!("No sink path configured, rendering headless");
            spawn_renderer(MockSink::with_capabilities(cfg.display.capabilities()), state.clone(), &cfg, shutdown.clone())?
        }
    };
    threads.push(render);

    // animation and scroll
    let animation = AnimationLoop {
        state: state.clone(),
        engine: AnimationEngine::new(anim.speed),
        controller: RateController::new(anim.fps, anim.scroll_fps, anim.min_fps, anim.load_threshold),
        sampler: LoadSampler::new(),
        sample_every: Duration::from_secs(anim.load_sample_secs.max(1)),
    };
    threads.push(animation.spawn(shutdown.clone()).context("starting animation loop")?);

    // collaborators
    let ingest = Ingest::new(
        state.clone(),
        requester,
        writer,
        layout,
        IngestOptions {
            album_size,
            portrait_size,
            dither: cfg.dither(),
            auto_switch: cfg.render.auto_switch,
        },
    );
    let poll = &cfg.polling;
    match &poll.media_path {
        Some(path) => {
            let backoff = PollBackoff::new(
                Duration::from_secs(poll.base_secs),
                Duration::from_secs(poll.cap_secs),
                Duration::from_secs(poll.idle_secs),
                poll.idle_after,
            );
            threads.push(runtime::spawn_media_poller(MediaFile::new(path), ingest.clone(), backoff, shutdown.clone())?);
        }
        None => warn!("No media path configured; now playing stays empty"),
    }
    match &poll.weather_path {
        Some(path) => {
            let every = Duration::from_secs(poll.weather_interval_secs.max(1));
            let backoff = PollBackoff::new(every, every * 4, every, 0);
            threads.push(runtime::spawn_weather_poller(WeatherFile::new(path), ingest.clone(), backoff, shutdown.clone())?);
        }
        None => warn!("No weather path configured; weather screen shows unavailable"),
    }

    // blocks on stdin, never joined
    let _input = runtime::spawn_input_reader(ingest, shutdown.clone())?;

    if let Err(e) = signal_handler().await {
        error!("Signal handling failed: {}", e);
    }
    shutdown.trigger();

    for handle in threads {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        if handle.join().is_err() {
            error!("{} thread panicked", name);
        }
    }
    info!("Shutdown complete");
    Ok(())
}
