//! Creation, attachment and removal of the SysV objects behind a channel.
//!
//! Creation is exclusive (`IPC_CREAT | IPC_EXCL`): a segment or semaphore left
//! behind by a crashed run is reported as `AlreadyExists`, never reused, since
//! its stale content could be misread as an in-flight message.

use crate::errors::{BridgeError, Resource};
use crate::keys::{ChannelKeys, PERMISSIONS};
use nix::errno::Errno;
use std::ptr::{self, NonNull};
use std::slice;

/// Handle to a shared memory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionId {
    key: i32,
    id: i32,
    size: usize,
}

impl RegionId {
    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Handle to a one-semaphore SysV set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateId {
    key: i32,
    id: i32,
}

impl GateId {
    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn id(&self) -> i32 {
        self.id
    }
}

pub fn create_region(key: i32, size: usize) -> Result<RegionId, BridgeError> {
    let region = shmget(key, size, libc::IPC_CREAT | libc::IPC_EXCL | PERMISSIONS)?;
    tracing::debug!("Key {} shared memory's id is {}", key, region.id);
    Ok(region)
}

/// Look up an existing segment. `size` must not exceed the segment's size.
pub fn open_region(key: i32, size: usize) -> Result<RegionId, BridgeError> {
    shmget(key, size, 0)
}

fn shmget(key: i32, size: usize, flags: i32) -> Result<RegionId, BridgeError> {
    let id = unsafe { libc::shmget(key, size, flags) };
    if id == -1 {
        return Err(BridgeError::from_setup(Resource::Region, key, Errno::last()));
    }
    Ok(RegionId { key, id, size })
}

pub fn create_gate(key: i32) -> Result<GateId, BridgeError> {
    let gate = semget(key, libc::IPC_CREAT | libc::IPC_EXCL | PERMISSIONS)?;
    tracing::debug!("Key {} semaphore's id is {}", key, gate.id);
    Ok(gate)
}

pub fn open_gate(key: i32) -> Result<GateId, BridgeError> {
    semget(key, 0)
}

fn semget(key: i32, flags: i32) -> Result<GateId, BridgeError> {
    let id = unsafe { libc::semget(key, 1, flags) };
    if id == -1 {
        return Err(BridgeError::from_setup(Resource::Gate, key, Errno::last()));
    }
    Ok(GateId { key, id })
}

/// Map a segment into this process.
pub fn attach(region: &RegionId) -> Result<Attachment, BridgeError> {
    let addr = unsafe { libc::shmat(region.id, ptr::null(), 0) };
    if addr as isize == -1 {
        return Err(BridgeError::AttachFailed {
            key: region.key,
            errno: Errno::last(),
        });
    }
    let ptr = NonNull::new(addr as *mut u8).ok_or(BridgeError::AttachFailed {
        key: region.key,
        errno: Errno::EFAULT,
    })?;

    Ok(Attachment {
        key: region.key,
        ptr,
        len: region.size,
        attached: true,
    })
}

pub fn destroy_region(region: &RegionId) -> Result<(), BridgeError> {
    let ret = unsafe { libc::shmctl(region.id, libc::IPC_RMID, ptr::null_mut()) };
    if ret == -1 {
        return Err(BridgeError::from_operation(
            "remove",
            Resource::Region,
            region.key,
            Errno::last(),
        ));
    }
    Ok(())
}

pub fn destroy_gate(gate: &GateId) -> Result<(), BridgeError> {
    let ret = unsafe { libc::semctl(gate.id, 0, libc::IPC_RMID) };
    if ret == -1 {
        return Err(BridgeError::from_operation(
            "remove",
            Resource::Gate,
            gate.key,
            Errno::last(),
        ));
    }
    Ok(())
}

/// A segment mapped into this process' address space.
///
/// Access to the bytes is only coherent while the guarding gate is held;
/// the peer process writes the same memory.
pub struct Attachment {
    key: i32,
    ptr: NonNull<u8>,
    len: usize,
    attached: bool,
}

unsafe impl Send for Attachment {}

impl Attachment {
    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub fn detach(mut self) -> Result<(), BridgeError> {
        self.detach_inner()
    }

    fn detach_inner(&mut self) -> Result<(), BridgeError> {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;
        let ret = unsafe { libc::shmdt(self.ptr.as_ptr() as *const libc::c_void) };
        if ret == -1 {
            return Err(BridgeError::OperationFailed {
                op: "detach",
                resource: Resource::Region,
                key: self.key,
                errno: Errno::last(),
            });
        }
        Ok(())
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        if let Err(e) = self.detach_inner() {
            tracing::warn!("{}", e);
        }
    }
}

/// What happened to one object during [`remove_existing`].
#[derive(Debug)]
pub enum Removal {
    Removed,
    Absent,
    Failed(BridgeError),
}

#[derive(Debug, Default)]
pub struct RemovalReport {
    pub entries: Vec<(Resource, i32, Removal)>,
}

impl RemovalReport {
    pub fn removed(&self) -> usize {
        self.count(|r| matches!(r, Removal::Removed))
    }

    pub fn absent(&self) -> usize {
        self.count(|r| matches!(r, Removal::Absent))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, Removal::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&Removal) -> bool) -> usize {
        self.entries.iter().filter(|(_, _, r)| pred(r)).count()
    }
}

/// Remove whatever objects exist for `keys`, e.g. after a consumer crash.
///
/// Objects that do not exist are reported as [`Removal::Absent`]. Each
/// removal is attempted independently.
pub fn remove_existing(keys: &ChannelKeys) -> RemovalReport {
    let mut report = RemovalReport::default();

    for key in [keys.content_gate, keys.size_gate] {
        let outcome = match open_gate(key) {
            Ok(gate) => removal_outcome(destroy_gate(&gate)),
            Err(BridgeError::NotFound { .. }) => Removal::Absent,
            Err(e) => Removal::Failed(e),
        };
        report.entries.push((Resource::Gate, key, outcome));
    }

    for key in [keys.content_region, keys.size_region] {
        let outcome = match open_region(key, 0) {
            Ok(region) => removal_outcome(destroy_region(&region)),
            Err(BridgeError::NotFound { .. }) => Removal::Absent,
            Err(e) => Removal::Failed(e),
        };
        report.entries.push((Resource::Region, key, outcome));
    }

    for (resource, key, outcome) in &report.entries {
        match outcome {
            Removal::Removed => tracing::info!("Removed the {} with key {}", resource, key),
            Removal::Absent => {
                tracing::debug!("The {} with key {} doesn't exist", resource, key)
            }
            Removal::Failed(e) => {
                tracing::error!("Removing the {} with key {}: {}", resource, key, e)
            }
        }
    }

    report
}

fn removal_outcome(result: Result<(), BridgeError>) -> Removal {
    match result {
        Ok(()) => Removal::Removed,
        Err(e) => Removal::Failed(e),
    }
}
