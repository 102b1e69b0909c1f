//! Anonymous page-run allocation: `acquire`/`release`.
//!
//! Unlike [`crate::lifecycle::create`], these regions have no backing
//! file or name — just an anonymous mapping bound to a NUMA node,
//! handed back as a raw pointer for the caller to manage. The mapping
//! dance (mempolicy bind, mlock, mbind, residency validation) mirrors
//! `create`'s, minus the file open/size/unlink steps.

use crate::error::{ShmError, ShmResult};
use crate::memory_policy::{self, MempolicyGuard};
use crate::numa::validate_numa;
use crate::page_size::PageSize;
use crate::topology;

fn max_page_cnt(page_sz: usize) -> usize {
    (isize::MAX as usize) / page_sz
}

/// Map and pin `page_cnt` anonymous pages of size `page_sz`, backed by
/// the NUMA node that owns `cpu_idx`. The returned pointer must later be
/// passed to [`release`] with the same `page_sz`/`page_cnt`.
pub fn acquire(page_sz: usize, page_cnt: usize, cpu_idx: usize) -> ShmResult<*mut u8> {
    let page_sz_enum = PageSize::from_bytes(page_sz)
        .ok_or_else(|| ShmError::invalid_arg(format!("bad page_sz ({page_sz})")))?;

    if !(1..=max_page_cnt(page_sz)).contains(&page_cnt) {
        return Err(ShmError::invalid_arg(format!("bad page_cnt ({page_cnt})")));
    }

    let Some(numa_idx) = topology::numa_idx(cpu_idx) else {
        return Err(ShmError::invalid_arg(format!("bad cpu_idx ({cpu_idx})")));
    };

    let sz = page_cnt * page_sz;
    let mut flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
    if let Some(shift) = page_sz_enum.huge_shift_bits() {
        flags |= libc::MAP_HUGETLB | ((shift as libc::c_int) << 26);
    }

    let _admin = crate::lock::lock();

    let mut policy = MempolicyGuard::snapshot()?;
    let result = acquire_inner(sz, page_sz, page_cnt, numa_idx, flags, &mut policy);
    policy.restore();
    result
}

fn acquire_inner(
    sz: usize,
    page_sz: usize,
    page_cnt: usize,
    numa_idx: usize,
    flags: libc::c_int,
    policy: &mut MempolicyGuard,
) -> ShmResult<*mut u8> {
    policy.bind_to_node(numa_idx)?;

    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            sz,
            libc::PROT_READ | libc::PROT_WRITE,
            flags,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(ShmError::from_errno("mmap"));
    }

    let result = (|| -> ShmResult<()> {
        if (addr as usize) % page_sz != 0 {
            return Err(ShmError::CorruptMount {
                path: "<anonymous>".to_string(),
                reason: "mmap returned a misaligned mapping".to_string(),
            });
        }

        memory_policy::mlock_region(addr, sz).map_err(|e| {
            if matches!(e, ShmError::Io { .. }) {
                ShmError::NoMemory { page_sz, page_cnt }
            } else {
                e
            }
        })?;

        memory_policy::mbind_to_node(addr, sz, numa_idx)?;

        let cpu_idx = topology::cpu_idx(numa_idx).unwrap_or(0);
        validate_numa(addr as *const u8, page_sz, page_cnt, cpu_idx).map_err(|err| {
            tracing::warn!(%err, "numa binding failed for anonymous mapping");
            err
        })
    })();

    if let Err(err) = result {
        if unsafe { libc::munmap(addr, sz) } != 0 {
            tracing::warn!(
                err = %std::io::Error::last_os_error(),
                "munmap failed after acquire error; attempting to continue"
            );
        }
        return Err(err);
    }

    Ok(addr as *mut u8)
}

/// Release a mapping previously returned by [`acquire`]. `mem` must not
/// be used again afterward.
pub fn release(mem: *mut u8, page_sz: usize, page_cnt: usize) -> ShmResult<()> {
    if mem.is_null() {
        return Err(ShmError::invalid_arg("NULL mem"));
    }
    if PageSize::from_bytes(page_sz).is_none() {
        return Err(ShmError::invalid_arg(format!("bad page_sz ({page_sz})")));
    }
    if (mem as usize) % page_sz != 0 {
        return Err(ShmError::invalid_arg("misaligned mem"));
    }
    if !(1..=max_page_cnt(page_sz)).contains(&page_cnt) {
        return Err(ShmError::invalid_arg(format!("bad page_cnt ({page_cnt})")));
    }

    let sz = page_cnt * page_sz;
    let rc = unsafe { libc::munmap(mem as *mut libc::c_void, sz) };
    if rc != 0 {
        return Err(ShmError::from_errno("munmap"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_rejects_bad_page_size() {
        let err = acquire(123, 1, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn acquire_rejects_zero_page_cnt() {
        let err = acquire(PageSize::Normal.byte_size(), 0, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn release_rejects_null() {
        let err = release(std::ptr::null_mut(), PageSize::Normal.byte_size(), 1).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn release_rejects_bad_page_size() {
        let mut buf = [0u8; 4096];
        let err = release(buf.as_mut_ptr(), 123, 1).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn release_rejects_misaligned_pointer() {
        let mut buf = [0u8; 8192];
        let misaligned = unsafe { buf.as_mut_ptr().add(1) };
        let err = release(misaligned, PageSize::Normal.byte_size(), 1).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn acquire_normal_page_round_trips_without_numa_boot() {
        // With no topology booted, numa_idx(0) is None, so acquire must
        // fail closed rather than silently defaulting to a node.
        crate::topology::halt();
        let err = acquire(PageSize::Normal.byte_size(), 1, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }
}
