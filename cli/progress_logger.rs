use covermap_core::Progress;
use covermap_util::progress_counter::ProgressCounter;
use num_traits::ToPrimitive;
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

/// A `ProgressLogger` logs each stage of a run. While a grid is being predicted, a background thread logs each tenth of the rows as it finishes.
pub struct ProgressLogger {
	watcher: Option<Watcher>,
}

struct Watcher {
	done: Arc<AtomicBool>,
	handle: JoinHandle<()>,
}

impl ProgressLogger {
	pub fn new() -> ProgressLogger {
		ProgressLogger { watcher: None }
	}

	pub fn update(&mut self, progress: Progress) {
		self.finish();
		match progress {
			Progress::LoadingSamples(path) => log::info!("loading samples from {}", path.display()),
			Progress::LoadingCovariates(n) => log::info!("loading {} covariates", n),
			Progress::Training(name) => log::info!("{}: training base models", name),
			Progress::Stacking(name) => log::info!("{}: stacking", name),
			Progress::Predicting(name, counter) => {
				log::info!("{}: predicting {} rows", name, counter.total());
				self.watcher = Some(watch(name, counter));
			}
			Progress::Writing(path) => log::info!("writing {}", path.display()),
		}
	}

	/// Stop watching the current prediction, if any.
	pub fn finish(&mut self) {
		if let Some(watcher) = self.watcher.take() {
			watcher.done.store(true, Ordering::Relaxed);
			watcher.handle.join().ok();
		}
	}
}

fn watch(name: String, counter: ProgressCounter) -> Watcher {
	let done = Arc::new(AtomicBool::new(false));
	let handle = std::thread::spawn({
		let done = done.clone();
		move || {
			let mut logged_tenths = 0;
			loop {
				let tenths = (counter.fraction() * 10.0).floor().to_u32().unwrap_or(0);
				if tenths > logged_tenths {
					log::info!("{}: predicted {}% of rows", name, tenths * 10);
					logged_tenths = tenths;
				}
				if tenths >= 10 || done.load(Ordering::Relaxed) {
					break;
				}
				std::thread::sleep(Duration::from_millis(100));
			}
		}
	});
	Watcher { done, handle }
}
