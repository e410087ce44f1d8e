use std::sync::{Condvar, Mutex, MutexGuard};

/// Non-reentrant exclusion between world mutation and frame presentation.
///
/// Unlike a `MutexGuard`, holding it does not borrow anything, so the
/// simulation thread can lock, mutate its own state and unlock in separate
/// calls the way the renderer interface expects.
#[derive(Debug, Default)]
pub struct FrameLock {
    locked: Mutex<bool>,
    released: Condvar,
}

impl FrameLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) {
        let mut locked = self.state();
        while *locked {
            locked = match self.released.wait(locked) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *locked = true;
    }

    pub fn unlock(&self) {
        let mut locked = self.state();
        *locked = false;
        drop(locked);
        self.released.notify_one();
    }

    pub fn is_locked(&self) -> bool {
        *self.state()
    }

    fn state(&self) -> MutexGuard<'_, bool> {
        match self.locked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn second_locker_waits_for_unlock() {
        let lock = Arc::new(FrameLock::new());
        let entered = Arc::new(AtomicBool::new(false));
        lock.lock();

        let waiter = {
            let lock = Arc::clone(&lock);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                lock.lock();
                entered.store(true, Ordering::SeqCst);
                lock.unlock();
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!entered.load(Ordering::SeqCst));
        lock.unlock();
        waiter.join().expect("waiter");

        assert!(entered.load(Ordering::SeqCst));
        assert!(!lock.is_locked());
    }
}
