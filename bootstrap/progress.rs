/// Observer for reporting bootstrap progress.
///
/// Rounds may finish on several worker threads at once, so callbacks take `&self`.
pub trait BootstrapProgressObserver: Sync {
    fn on_start(&self, total_rounds: usize) {
        let _ = total_rounds;
    }
    fn on_round_finish(&self, round: usize) {
        let _ = round;
    }
    fn on_finish(&self) {}
}

#[derive(Default)]
pub struct NoopProgress;

impl BootstrapProgressObserver for NoopProgress {}
