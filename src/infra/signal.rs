//! SIGINT handling for prompt, clean cancellation.
//!
//! The first interrupt sets the run's cancellation flag; fetch loops and the
//! file pipeline poll it and unwind with [`FoldError::Interrupted`]. A second
//! interrupt exits immediately with status 130.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::FoldError;

/// Flag shared with the signal handler (set once per process)
static SIGNAL_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag
{
    flag: Arc<AtomicBool>,
}

impl CancelFlag
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self)
    {
        self.flag
            .store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool
    {
        self.flag
            .load(Ordering::SeqCst)
    }

    /// Err(Interrupted) once cancellation was requested
    pub fn check(&self) -> Result<(), FoldError>
    {
        if self.is_cancelled() { Err(FoldError::Interrupted) } else { Ok(()) }
    }

    /// Route SIGINT to this flag. Only the first call per process wires the
    /// handler; later flags stay signal-agnostic.
    pub fn install_sigint(&self)
    {
        if SIGNAL_FLAG
            .set(self.flag.clone())
            .is_ok()
        {
            install_handler();
        }
    }
}

#[cfg(unix)]
extern "C" fn on_sigint(_sig: libc::c_int)
{
    if let Some(flag) = SIGNAL_FLAG.get()
        && flag.swap(true, Ordering::SeqCst)
    {
        // Second interrupt: in-flight work is abandoned
        unsafe { libc::_exit(crate::error::EXIT_INTERRUPTED as libc::c_int) };
    }
}

#[cfg(unix)]
fn install_handler()
{
    let handler = on_sigint as extern "C" fn(libc::c_int);

    // Safety: the handler only touches an atomic and calls _exit
    unsafe {
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_handler() {}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn check_reports_interrupted_after_cancel()
    {
        let flag = CancelFlag::new();
        assert!(flag.check().is_ok());

        let clone = flag.clone();
        clone.cancel();

        assert!(matches!(flag.check(), Err(FoldError::Interrupted)));
    }
}
