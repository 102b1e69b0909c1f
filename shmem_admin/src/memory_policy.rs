//! Thread NUMA mempolicy snapshot/bind/restore, and the `mbind`/`mlock`
//! calls layered on top of it.
//!
//! A newly mapped region can still be preemptively backed by pages on
//! the wrong node (e.g. under `mlockall(MCL_FUTURE)`),
//! so the calling thread's mempolicy is pinned to the target NUMA node
//! for the duration of the mapping dance, then restored — `mbind`
//! afterward is a best-effort nudge, not a guarantee, which is why
//! [`crate::numa::validate_numa`] double-checks residency afterward.

use crate::error::{ShmError, ShmResult};

const MPOL_BIND: libc::c_int = 2;
const MPOL_F_STATIC_NODES: libc::c_ulong = 1 << 15;
const MPOL_MF_STRICT: libc::c_int = 1 << 0;
const MPOL_MF_MOVE: libc::c_int = 1 << 1;

/// Words needed to hold a `NUMA_MAX`-bit node mask.
fn nodemask_words() -> usize {
    (crate::topology::NUMA_MAX + 63) / 64
}

fn nodemask_for(numa_idx: usize) -> Vec<libc::c_ulong> {
    let mut mask = vec![0 as libc::c_ulong; nodemask_words()];
    mask[numa_idx >> 6] = 1 << (numa_idx & 63);
    mask
}

/// A saved copy of the calling thread's mempolicy, restored on `Drop`.
///
/// Holding one of these and calling [`Self::bind_to_node`] implements
/// the snapshot/bind half of the dance; dropping it (or calling
/// [`Self::restore`] explicitly) implements the restore half, even on
/// an early return via `?`.
pub struct MempolicyGuard {
    orig_mode: libc::c_int,
    orig_nodemask: Vec<libc::c_ulong>,
    restored: bool,
}

impl MempolicyGuard {
    /// Snapshot the calling thread's current mempolicy.
    pub fn snapshot() -> ShmResult<Self> {
        let mut orig_mode: libc::c_int = 0;
        let mut orig_nodemask = vec![0 as libc::c_ulong; nodemask_words()];
        let rc = unsafe {
            libc::syscall(
                libc::SYS_get_mempolicy,
                &mut orig_mode as *mut libc::c_int,
                orig_nodemask.as_mut_ptr(),
                crate::topology::NUMA_MAX as libc::c_ulong,
                std::ptr::null::<libc::c_void>(),
                0 as libc::c_ulong,
            )
        };
        if rc != 0 {
            return Err(ShmError::from_errno("get_mempolicy"));
        }
        Ok(MempolicyGuard {
            orig_mode,
            orig_nodemask,
            restored: false,
        })
    }

    /// Bind the calling thread's mempolicy to `numa_idx`, so any page
    /// fault serviced on this thread prefers that node.
    pub fn bind_to_node(&self, numa_idx: usize) -> ShmResult<()> {
        let mask = nodemask_for(numa_idx);
        let rc = unsafe {
            libc::syscall(
                libc::SYS_set_mempolicy,
                MPOL_BIND | (MPOL_F_STATIC_NODES as libc::c_int),
                mask.as_ptr(),
                crate::topology::NUMA_MAX as libc::c_ulong,
            )
        };
        if rc != 0 {
            return Err(ShmError::from_errno("set_mempolicy"));
        }
        Ok(())
    }

    /// Restore the mempolicy saved at [`Self::snapshot`]. Logs and
    /// swallows a failure here, matching the "attempting to continue"
    /// best-effort cleanup the rest of this crate's unwind paths use —
    /// there is no meaningful recovery action left to take.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let rc = unsafe {
            libc::syscall(
                libc::SYS_set_mempolicy,
                self.orig_mode,
                self.orig_nodemask.as_ptr(),
                crate::topology::NUMA_MAX as libc::c_ulong,
            )
        };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            tracing::warn!(%err, "set_mempolicy restore failed; attempting to continue");
        }
    }
}

impl Drop for MempolicyGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// `mbind(2)` a mapped region to `numa_idx`, with `MPOL_MF_MOVE |
/// MPOL_MF_STRICT` so the kernel tries to migrate any page that still
/// landed on the wrong node.
pub fn mbind_to_node(addr: *mut libc::c_void, len: usize, numa_idx: usize) -> ShmResult<()> {
    let mask = nodemask_for(numa_idx);
    let rc = unsafe {
        libc::syscall(
            libc::SYS_mbind,
            addr,
            len as libc::c_ulong,
            MPOL_BIND,
            mask.as_ptr(),
            crate::topology::NUMA_MAX as libc::c_ulong,
            MPOL_MF_MOVE | MPOL_MF_STRICT,
        )
    };
    if rc != 0 {
        return Err(ShmError::from_errno("mbind"));
    }
    Ok(())
}

/// `mlock(2)` a region to force it to be fully backed by resident pages
/// before anyone touches it — the only way to observe an out-of-memory
/// condition on the target node without risking a `SIGBUS` deep inside
/// an ordinary memory access.
pub fn mlock_region(addr: *mut libc::c_void, len: usize) -> ShmResult<()> {
    let rc = unsafe { libc::mlock(addr, len) };
    if rc != 0 {
        return Err(ShmError::from_errno("mlock"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodemask_for_sets_expected_bit() {
        let mask = nodemask_for(3);
        assert_eq!(mask[0], 1 << 3);
        let mask = nodemask_for(65);
        assert_eq!(mask[1], 1 << 1);
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        // Exercises the real get_mempolicy/set_mempolicy syscalls; does
        // not change to a bound policy so it is safe to run anywhere.
        let mut guard = MempolicyGuard::snapshot().expect("get_mempolicy should succeed");
        guard.restore();
    }
}
