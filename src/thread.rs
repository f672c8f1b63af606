use std::thread::JoinHandle;

use crate::error::Error;

/// Spawn a named worker thread.
///
/// An error returned by `thread_body` ends the thread and is logged under its name.
pub fn spawn<F>(name: &'static str, stack_size: usize, thread_body: F) -> Result<JoinHandle<()>, Error>
where
    F: FnOnce() -> Result<(), Error> + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_owned())
        .stack_size(stack_size)
        .spawn(move || {
            log::debug!("[{}] thread started", name);

            if let Err(e) = thread_body() {
                log::error!("[{}] thread exited with error: {}", name, e);
            }
        })
        .map_err(|source| Error::Spawn { name, source })
}
