/**
The `EarlyStoppingMonitor` keeps track of the training loss for each epoch, and if enough epochs have passed without a significant decrease, the `update()` function will return `true` to indicate that training should be stopped.
*/
pub struct EarlyStoppingMonitor {
	threshold: f32,
	epochs: usize,
	n_epochs_without_observed_improvement: usize,
	previous_epoch_loss: Option<f32>,
}

impl EarlyStoppingMonitor {
	pub fn new(threshold: f32, epochs: usize) -> Self {
		EarlyStoppingMonitor {
			threshold,
			epochs: epochs.max(1),
			n_epochs_without_observed_improvement: 0,
			previous_epoch_loss: None,
		}
	}

	/// Update the monitor with the next epoch's loss. Returns true if training should stop.
	pub fn update(&mut self, loss: f32) -> bool {
		let result = if let Some(previous_loss) = self.previous_epoch_loss {
			if previous_loss - loss < self.threshold {
				self.n_epochs_without_observed_improvement += 1;
				self.n_epochs_without_observed_improvement >= self.epochs
			} else {
				self.n_epochs_without_observed_improvement = 0;
				false
			}
		} else {
			false
		};
		self.previous_epoch_loss = Some(loss);
		result
	}
}

#[test]
fn test_early_stopping_monitor() {
	let mut monitor = EarlyStoppingMonitor::new(0.01, 2);
	assert!(!monitor.update(1.0));
	assert!(!monitor.update(0.5));
	assert!(!monitor.update(0.499));
	assert!(monitor.update(0.498));
}
