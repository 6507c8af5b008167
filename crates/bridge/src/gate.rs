use crate::errors::{BridgeError, Resource};
use crate::registry::GateId;
use nix::errno::Errno;

/// Binary semaphore shared between two processes.
///
/// Count is 0 or 1 in practice: whoever holds the token may touch the
/// guarded region, and hands it back with [`Gate::release`].
#[derive(Debug)]
pub struct Gate {
    id: GateId,
}

impl Gate {
    pub fn new(id: GateId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &GateId {
        &self.id
    }

    /// Block until the count is positive, then decrement it.
    ///
    /// Returns [`BridgeError::Interrupted`] when a signal handler ran during
    /// the wait. The wait is not resumed; the caller decides whether to retry.
    pub fn acquire(&self) -> Result<(), BridgeError> {
        tracing::trace!(key = self.id.key(), "Waiting to acquire the semaphore");
        self.semop("acquire", -1)
    }

    pub fn release(&self) -> Result<(), BridgeError> {
        tracing::trace!(key = self.id.key(), "Releasing the semaphore");
        self.semop("release", 1)
    }

    /// Acquire and return a guard that releases on drop.
    pub fn lock(&self) -> Result<GateGuard<'_>, BridgeError> {
        self.acquire()?;
        Ok(GateGuard {
            gate: self,
            held: true,
        })
    }

    pub fn value(&self) -> Result<i32, BridgeError> {
        let val = unsafe { libc::semctl(self.id.id(), 0, libc::GETVAL) };
        if val == -1 {
            return Err(self.error("getval", Errno::last()));
        }
        Ok(val)
    }

    fn semop(&self, op: &'static str, delta: i16) -> Result<(), BridgeError> {
        let mut buf = libc::sembuf {
            sem_num: 0,
            sem_op: delta,
            sem_flg: 0,
        };
        let ret = unsafe { libc::semop(self.id.id(), &mut buf, 1) };
        if ret == -1 {
            return Err(self.error(op, Errno::last()));
        }
        Ok(())
    }

    fn error(&self, op: &'static str, errno: Errno) -> BridgeError {
        BridgeError::from_operation(op, Resource::Gate, self.id.key(), errno)
    }
}

/// Holds one acquired count of a [`Gate`].
///
/// Every acquire is paired with exactly one release: either the explicit
/// [`GateGuard::release`], or the one issued on drop.
#[must_use = "dropping the guard releases the gate immediately"]
pub struct GateGuard<'a> {
    gate: &'a Gate,
    held: bool,
}

impl GateGuard<'_> {
    pub fn release(mut self) -> Result<(), BridgeError> {
        self.held = false;
        self.gate.release()
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if self.held {
            self.held = false;
            if let Err(e) = self.gate.release() {
                tracing::error!("Releasing the semaphore failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{create_gate, destroy_gate, test_keys};

    fn new_gate() -> Gate {
        Gate::new(create_gate(test_keys::unique().size_gate).unwrap())
    }

    #[test]
    fn test_new_gate_starts_closed() {
        let gate = new_gate();
        assert_eq!(gate.value().unwrap(), 0, "semget initializes the count to 0");
        destroy_gate(gate.id()).unwrap();
    }

    #[test]
    fn test_release_then_acquire() {
        let gate = new_gate();

        gate.release().unwrap();
        assert_eq!(gate.value().unwrap(), 1);

        gate.acquire().unwrap();
        assert_eq!(gate.value().unwrap(), 0);

        destroy_gate(gate.id()).unwrap();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let gate = new_gate();
        gate.release().unwrap();

        {
            let _guard = gate.lock().unwrap();
            assert_eq!(gate.value().unwrap(), 0);
        }
        assert_eq!(gate.value().unwrap(), 1, "Drop must hand the token back");

        destroy_gate(gate.id()).unwrap();
    }

    #[test]
    fn test_explicit_release_is_not_repeated_on_drop() {
        let gate = new_gate();
        gate.release().unwrap();

        let guard = gate.lock().unwrap();
        guard.release().unwrap();
        assert_eq!(gate.value().unwrap(), 1, "Exactly one release per acquire");

        destroy_gate(gate.id()).unwrap();
    }

    #[test]
    fn test_operations_on_removed_gate_fail() {
        let gate = new_gate();
        destroy_gate(gate.id()).unwrap();

        assert!(matches!(gate.release(), Err(BridgeError::Removed { .. })));
        assert!(matches!(gate.acquire(), Err(BridgeError::Removed { .. })));
    }

    #[test]
    fn test_removal_wakes_blocked_acquire() {
        use std::thread;
        use std::time::Duration;

        let gate = new_gate();
        let id = *gate.id();

        let waiter = thread::spawn(move || Gate::new(id).acquire());

        thread::sleep(Duration::from_millis(50));
        destroy_gate(&id).unwrap();

        let result = waiter.join().expect("Waiter thread panicked");
        assert!(
            matches!(result, Err(BridgeError::Removed { .. })),
            "A blocked peer must not stay deadlocked after removal"
        );
    }
}
