//! Post-mapping NUMA residency validation.

use crate::error::{ShmError, ShmResult};
use crate::page_size::is_valid_page_size;
use crate::topology;

/// `move_pages(2)` is queried in batches no larger than this, matching
/// the stack-allocated batch arrays the rest of this crate's callers
/// size their loops against.
const BATCH_MAX: usize = 512;

/// Verify that every page of a `page_cnt`-page, `page_sz`-byte region
/// starting at `mem` is resident on the NUMA node that owns `cpu_idx`.
///
/// Queries residency via `move_pages(2)` in batches of up to
/// [`BATCH_MAX`] pages. Returns `WrongNode` on the first page found on
/// the wrong node, `InvalidArg` on a malformed argument, and `Io` if the
/// `move_pages` syscall itself fails.
pub fn validate_numa(mem: *const u8, page_sz: usize, page_cnt: usize, cpu_idx: usize) -> ShmResult<()> {
    if mem.is_null() {
        return Err(ShmError::invalid_arg("NULL mem"));
    }
    if !is_valid_page_size(page_sz) {
        return Err(ShmError::invalid_arg(format!("bad page_sz ({page_sz})")));
    }
    if (mem as usize) % page_sz != 0 {
        return Err(ShmError::invalid_arg("misaligned mem"));
    }
    let max_page_cnt = (isize::MAX as usize) / page_sz;
    if !(1..=max_page_cnt).contains(&page_cnt) {
        return Err(ShmError::invalid_arg(format!("bad page_cnt ({page_cnt})")));
    }
    let Some(numa_idx) = topology::numa_idx(cpu_idx) else {
        return Err(ShmError::invalid_arg(format!("bad cpu_idx ({cpu_idx})")));
    };

    let mut page = mem as usize;
    let mut remaining = page_cnt;
    let mut batch_pages: Vec<*mut libc::c_void> = Vec::with_capacity(BATCH_MAX.min(page_cnt));
    let mut batch_status: Vec<i32> = Vec::with_capacity(BATCH_MAX.min(page_cnt));

    while remaining > 0 {
        batch_pages.push(page as *mut libc::c_void);
        page += page_sz;
        remaining -= 1;

        if batch_pages.len() == BATCH_MAX || remaining == 0 {
            batch_status.resize(batch_pages.len(), 0);
            let rc = unsafe {
                libc::syscall(
                    libc::SYS_move_pages,
                    0, // pid: current process
                    batch_pages.len() as libc::c_ulong,
                    batch_pages.as_ptr(),
                    std::ptr::null::<libc::c_int>(), // nodes: NULL = query only
                    batch_status.as_mut_ptr(),
                    0, // flags
                )
            };
            if rc != 0 {
                return Err(ShmError::from_errno("move_pages"));
            }

            for &status in &batch_status {
                if status < 0 {
                    let err = std::io::Error::from_raw_os_error(-status);
                    tracing::warn!(%err, "page status failed");
                    return Err(ShmError::Io { source: err });
                }
                if status as usize != numa_idx {
                    tracing::warn!(
                        actual = status,
                        expected = numa_idx,
                        "page allocated to wrong numa node"
                    );
                    return Err(ShmError::WrongNode {
                        actual: status,
                        expected: numa_idx as i32,
                    });
                }
            }

            batch_pages.clear();
            batch_status.clear();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_mem_rejected() {
        let err = validate_numa(std::ptr::null(), 4096, 1, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn bad_page_sz_rejected() {
        let buf = [0u8; 4096];
        let err = validate_numa(buf.as_ptr(), 100, 1, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn misaligned_mem_rejected() {
        let buf = [0u8; 8192];
        let misaligned = unsafe { buf.as_ptr().add(1) };
        let err = validate_numa(misaligned, 4096, 1, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn zero_page_cnt_rejected() {
        let buf = [0u8; 4096];
        let err = validate_numa(buf.as_ptr(), 4096, 0, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }

    #[test]
    fn unbooted_topology_rejects_any_cpu_idx() {
        topology::halt();
        let buf = [0u8; 4096];
        let err = validate_numa(buf.as_ptr(), 4096, 1, 0).unwrap_err();
        assert!(matches!(err, ShmError::InvalidArg { .. }));
    }
}
