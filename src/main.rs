mod cache;
mod cli;
mod config;
mod drag;
mod error;
mod fetch;
mod files;
mod gallery;
mod loader;
mod metadata;
mod progressive;
mod session;
mod slide;
mod ui;
mod viewer;
mod zoom;

use clap::Parser;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::{Arc, Condvar, Mutex};
use winit::event_loop::EventLoop;

use crate::cache::{CacheHandle, ImageCache};
use crate::cli::{Cli, default_memory_budget, parse_memory_budget};
use crate::fetch::FsFetcher;
use crate::files::{collect_gallery, load_manifest};
use crate::gallery::{Gallery, gallery_path, image_path};
use crate::loader::{CacheState, SharedState, UserEvent, spawn_decode_workers};
use crate::session::{FileStore, SessionStore};
use crate::ui::App;
use crate::ui::state::AppState;
use crate::viewer::{Now, ViewerDeps};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let budget = match &cli.memory {
        Some(s) => parse_memory_budget(s),
        None => default_memory_budget(),
    };

    let images = match &cli.manifest {
        Some(path) => match load_manifest(path) {
            Ok(images) => images,
            Err(e) => {
                log::error!("Could not read manifest {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => collect_gallery(&cli.paths, cli.recursive, cli.follow_links),
    };
    let gallery = Gallery::new(images);
    if gallery.is_empty() {
        log::error!("No image files found.");
        return ExitCode::FAILURE;
    }

    let shared: SharedState = Arc::new((Mutex::new(CacheState::new(budget)), Condvar::new()));

    let num_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(4, 16);

    let event_loop = match EventLoop::<UserEvent>::with_user_event().build() {
        Ok(el) => el,
        Err(e) => {
            log::error!("Could not create event loop: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let proxy = event_loop.create_proxy();

    spawn_decode_workers(Arc::clone(&shared), proxy.clone(), num_threads);

    let waker_proxy = proxy;
    let cache = CacheHandle::new(
        ImageCache::new(budget),
        Arc::new(FsFetcher),
        Arc::new(move || {
            let _ = waker_proxy.send_event(UserEvent::LoaderUpdate);
        }),
    );

    let session: Rc<dyn SessionStore> = match &cli.session_dir {
        Some(dir) => Rc::new(FileStore::new(dir)),
        None => Rc::new(FileStore::in_temp_dir()),
    };

    let config = cli.viewer_config();
    let start = match &cli.start {
        Some(id) => image_path(&config.locale, id),
        None => gallery_path(&config.locale),
    };
    let deps = ViewerDeps { cache, sources: shared, session, config };

    let mut state = AppState::new(gallery, deps);
    state.navigate_to(start, Now::capture());
    let mut app = App::new(state);

    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop failed: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
