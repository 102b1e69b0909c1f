//! Named shared-memory region lifecycle: `create`, `unlink`, `info`.

use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;

use crate::error::{ShmError, ShmResult};
use crate::memory_policy::{self, MempolicyGuard};
use crate::name::resolve_path;
use crate::numa::validate_numa;
use crate::page_size::PageSize;
use crate::topology;

/// Size and page size of an existing named region, as reported by
/// [`info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegionInfo {
    /// Page size backing the region, in bytes.
    pub page_sz: usize,
    /// Number of pages in the region.
    pub page_cnt: usize,
}

fn max_page_cnt(page_sz: usize) -> usize {
    (isize::MAX as usize) / page_sz
}

/// Create a new named region of `page_cnt` pages of size `page_sz`,
/// with the given creation `mode` (as passed to `open(2)`), backed by
/// pages on the NUMA node that owns `cpu_idx`.
///
/// Follows a snapshot-mempolicy / bind / create / size / map /
/// validate-alignment / prefault-lock / mbind / validate-residency /
/// restore-mempolicy sequence, with a strict reverse-order unwind on
/// every failure path: unmap, then conditionally unlink (only if
/// creation didn't complete), then close, then restore the mempolicy.
pub fn create(name: &str, page_sz: usize, page_cnt: usize, cpu_idx: usize, mode: u32) -> ShmResult<()> {
    let page_sz_enum = PageSize::from_bytes(page_sz)
        .ok_or_else(|| ShmError::invalid_arg(format!("bad page_sz ({page_sz})")))?;

    if !(1..=max_page_cnt(page_sz)).contains(&page_cnt) {
        return Err(ShmError::invalid_arg(format!("bad page_cnt ({page_cnt})")));
    }

    let Some(numa_idx) = topology::numa_idx(cpu_idx) else {
        return Err(ShmError::invalid_arg(format!("bad cpu_idx ({cpu_idx})")));
    };

    let base = crate::base_path()?;
    let path = resolve_path(&base, page_sz_enum, name)?;
    let sz = page_cnt * page_sz;

    let _admin = crate::lock::lock();

    let mut policy = MempolicyGuard::snapshot()?;
    let result = create_inner(&path, sz, page_sz, page_cnt, numa_idx, mode, &mut policy);
    policy.restore();
    result
}

fn create_inner(
    path: &str,
    sz: usize,
    page_sz: usize,
    page_cnt: usize,
    numa_idx: usize,
    mode: u32,
    policy: &mut MempolicyGuard,
) -> ShmResult<()> {
    policy.bind_to_node(numa_idx)?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ShmError::AlreadyExists {
                    name: path.to_string(),
                }
            } else {
                ShmError::Io { source: e }
            }
        })?;

    let result = (|| -> ShmResult<()> {
        file.set_len(sz as u64).map_err(ShmError::from)?;

        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                sz,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(ShmError::from_errno("mmap"));
        }

        let result = (|| -> ShmResult<()> {
            if (addr as usize) % page_sz != 0 {
                return Err(ShmError::CorruptMount {
                    path: path.to_string(),
                    reason: "mmap returned a misaligned address".to_string(),
                });
            }

            memory_policy::mlock_region(addr, sz).map_err(|e| {
                if matches!(e, ShmError::Io { .. }) {
                    ShmError::NoMemory {
                        page_sz,
                        page_cnt,
                    }
                } else {
                    e
                }
            })?;

            memory_policy::mbind_to_node(addr, sz, numa_idx)?;

            validate_numa(addr as *const u8, page_sz, page_cnt, numa_idx_to_cpu(numa_idx)).map_err(|err| {
                tracing::warn!(%err, path, "numa binding failed");
                err
            })
        })();

        if unsafe { libc::munmap(addr, sz) } != 0 {
            tracing::warn!(
                path,
                err = %std::io::Error::last_os_error(),
                "munmap failed; attempting to continue"
            );
        }

        result
    })();

    if result.is_err() {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path, %err, "unlink failed");
        }
    }

    drop(file);
    result
}

fn numa_idx_to_cpu(numa_idx: usize) -> usize {
    topology::cpu_idx(numa_idx).unwrap_or(0)
}

/// Unlink a named region's backing file.
pub fn unlink(name: &str, page_sz: usize) -> ShmResult<()> {
    let page_sz_enum = PageSize::from_bytes(page_sz)
        .ok_or_else(|| ShmError::invalid_arg(format!("bad page_sz ({page_sz})")))?;

    let base = crate::base_path()?;
    let path = resolve_path(&base, page_sz_enum, name)?;

    std::fs::remove_file(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ShmError::NotFound {
                name: name.to_string(),
            }
        } else {
            ShmError::Io { source: e }
        }
    })
}

/// Query an existing named region's size.
///
/// Passing `page_sz = 0` searches gigantic, then huge, then normal page
/// sizes in turn and returns the first match, mirroring the original
/// "don't know the page size, just find it" convenience mode.
pub fn info(name: &str, page_sz: usize) -> ShmResult<RegionInfo> {
    if !crate::name::name_valid(name) {
        return Err(ShmError::invalid_arg(format!("bad name ({name:?})")));
    }

    if page_sz == 0 {
        for candidate in [PageSize::Gigantic, PageSize::Huge, PageSize::Normal] {
            if let Ok(info) = info(name, candidate.byte_size()) {
                return Ok(info);
            }
        }
        return Err(ShmError::NotFound {
            name: name.to_string(),
        });
    }

    let page_sz_enum = PageSize::from_bytes(page_sz)
        .ok_or_else(|| ShmError::invalid_arg(format!("bad page_sz ({page_sz})")))?;

    let base = crate::base_path()?;
    let path = resolve_path(&base, page_sz_enum, name)?;

    let file = OpenOptions::new().read(true).open(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ShmError::NotFound {
                name: name.to_string(),
            }
        } else {
            ShmError::Io { source: e }
        }
    })?;

    let meta = file.metadata().map_err(ShmError::from)?;
    let sz = meta.len() as usize;
    if sz % page_sz != 0 {
        return Err(ShmError::CorruptMount {
            path,
            reason: format!("size {sz} is not a multiple of page size {page_sz}"),
        });
    }

    Ok(RegionInfo {
        page_sz,
        page_cnt: sz / page_sz,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests mutate the process-wide FD_SHMEM_PATH env var, which
    // cargo's default parallel test execution would otherwise race on.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn with_base<F: FnOnce(&str)>(f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_str().unwrap().to_string();
        std::fs::create_dir_all(format!("{base}/normal")).unwrap();
        unsafe {
            std::env::set_var("FD_SHMEM_PATH", &base);
        }
        f(&base);
        unsafe {
            std::env::remove_var("FD_SHMEM_PATH");
        }
    }

    #[test]
    fn unlink_missing_region_is_not_found() {
        with_base(|_| {
            let err = unlink("no-such-region", PageSize::Normal.byte_size()).unwrap_err();
            assert!(matches!(err, ShmError::NotFound { .. }));
        });
    }

    #[test]
    fn info_missing_region_is_not_found() {
        with_base(|_| {
            let err = info("no-such-region", PageSize::Normal.byte_size()).unwrap_err();
            assert!(matches!(err, ShmError::NotFound { .. }));
        });
    }

    #[test]
    fn info_rejects_bad_page_size() {
        with_base(|_| {
            let err = info("region", 123).unwrap_err();
            assert!(matches!(err, ShmError::InvalidArg { .. }));
        });
    }

    #[test]
    fn info_rejects_bad_name_even_when_probing_all_sizes() {
        with_base(|_| {
            let err = info(".hidden", 0).unwrap_err();
            assert!(matches!(err, ShmError::InvalidArg { .. }));
        });
    }

    #[test]
    fn info_reports_size_of_manually_created_file() {
        with_base(|base| {
            let path = format!("{base}/normal/region.a");
            std::fs::write(&path, vec![0u8; 3 * PageSize::Normal.byte_size()]).unwrap();
            let info = info("region.a", PageSize::Normal.byte_size()).unwrap();
            assert_eq!(info.page_cnt, 3);
            assert_eq!(info.page_sz, PageSize::Normal.byte_size());
        });
    }

    #[test]
    fn info_detects_corrupt_size() {
        with_base(|base| {
            let path = format!("{base}/normal/region.b");
            std::fs::write(&path, vec![0u8; 100]).unwrap();
            let err = info("region.b", PageSize::Normal.byte_size()).unwrap_err();
            assert!(matches!(err, ShmError::CorruptMount { .. }));
        });
    }
}
