use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use ascii_types::AsciiFrameError;

/// Runs `work` on a background thread and waits at most `duration` for
/// it to finish. The shared state is just the one-shot result channel:
/// on timeout the spawned thread is left to finish in the background
/// and its result is dropped, since `FrameSource` decode has no
/// intrinsic per-frame timeout, only source open (20s) and probe (9s).
pub fn with_deadline<T, F>(component: &'static str, duration: Duration, work: F) -> Result<T, AsciiFrameError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AsciiFrameError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(work());
    });

    match rx.recv_timeout(duration) {
        Ok(result) => result,
        Err(_) => Err(AsciiFrameError::timeout(
            component,
            format!("exceeded {:?}", duration),
        )),
    }
}
