use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interrupt flag. Checked between chunks and while waiting on the
/// translator process.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Routes Ctrl-C to this token. Can only be installed once per process.
    pub fn install_ctrlc(&self) -> anyhow::Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            if token.is_cancelled() {
                // Second interrupt: give up on a clean stop.
                std::process::exit(130);
            }
            token.cancel();
        })?;
        Ok(())
    }
}
