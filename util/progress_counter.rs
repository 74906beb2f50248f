use num_traits::ToPrimitive;
use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/**
A `ProgressCounter` tracks the progress of a task running across multiple threads, such as predicting every row of a covariate grid with rayon. Cloning a `ProgressCounter` shares the underlying atomic, so one clone can be handed to the workers while another is reported to the user.
*/
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	/// Create a new `ProgressCounter` that will count from 0 up to the specified `total`.
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}
	/// Retrieve the total value this `ProgressCounter` counts up to.
	pub fn total(&self) -> u64 {
		self.total
	}
	/// Retrieve the current progress value.
	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}
	/// Increment the progress value by `amount`.
	pub fn inc(&self, amount: u64) {
		self.current.fetch_add(amount, Ordering::Relaxed);
	}
	/// The fraction of the work that is done, in [0, 1]. An empty task is always done.
	pub fn fraction(&self) -> f32 {
		if self.total == 0 {
			1.0
		} else {
			self.get().min(self.total).to_f32().unwrap() / self.total.to_f32().unwrap()
		}
	}
}

#[test]
fn test_progress_counter_shared_between_clones() {
	let counter = ProgressCounter::new(4);
	let worker = counter.clone();
	worker.inc(1);
	worker.inc(2);
	assert_eq!(counter.get(), 3);
	assert!((counter.fraction() - 0.75).abs() < f32::EPSILON);
	assert!((ProgressCounter::new(0).fraction() - 1.0).abs() < f32::EPSILON);
}
