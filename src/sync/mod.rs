pub mod lamport;

use std::fmt::Display;

/// Mutual exclusion between parties that may not share memory.
///
/// The requirements for that are
/// 1. Mutual Exclusion - at most one party is between `acquire()` and `release()` at any instant.
/// 2. Ordered entry - requests are served in the total order the implementation defines, so a
/// waiting party is eventually served as long as every other party keeps responding.
pub trait Mutex {
    type Error: Display;

    /// Blocks until this party may enter the critical section.
    fn acquire(&self) -> Result<(), Self::Error>;
    /// Leaves the critical section. Never blocks.
    fn release(&self) -> Result<(), Self::Error>;

    fn lock(&self) -> Result<MutexGuard<'_, Self>, Self::Error>
    where
        Self: Sized,
    {
        self.acquire()?;
        Ok(MutexGuard { mutex: self })
    }
}

/// Releases the mutex when dropped.
#[must_use = "the critical section ends as soon as the guard is dropped"]
pub struct MutexGuard<'a, M: Mutex> {
    mutex: &'a M,
}

impl<'a, M: Mutex> MutexGuard<'a, M> {
    /// Releases now and reports failure instead of only logging it.
    pub fn unlock(self) -> Result<(), M::Error> {
        let mutex = self.mutex;
        // Guard holds only a reference, nothing else to drop
        std::mem::forget(self);
        mutex.release()
    }
}

impl<M: Mutex> Drop for MutexGuard<'_, M> {
    fn drop(&mut self) {
        if let Err(error) = self.mutex.release() {
            tracing::warn!(%error, "failed to release mutex on guard drop");
        }
    }
}
