//! # `shmem_admin`
//!
//! NUMA-aware shared-memory region administration.
//!
//! `shmem_admin` manages two families of memory: *named regions*,
//! backed by a file under a (typically hugetlbfs-mounted) base path and
//! addressable by name and page size, and *anonymous page runs*, raw
//! NUMA-bound mappings with no filesystem identity. Both are mapped
//! with a best-effort NUMA residency guarantee: the calling thread's
//! mempolicy is pinned to the target node for the duration of the
//! mapping, the region is `mlock`ed to force it fully resident before
//! anyone touches it, `mbind` is used to ask the kernel to keep it on
//! that node, and [`numa::validate_numa`] double-checks the outcome via
//! `move_pages(2)` because none of the above is a hard guarantee.
//!
//! ## Modules
//!
//! - [`page_size`] — the closed catalog of supported page sizes.
//! - [`name`] — region name grammar and path resolution.
//! - [`topology`] — NUMA node/CPU discovery (`boot`/`halt`).
//! - [`numa`] — post-mapping residency validation.
//! - [`memory_policy`] — mempolicy snapshot/bind/restore and `mbind`/`mlock`.
//! - [`lock`] — the process-wide administrative lock.
//! - [`lifecycle`] — named region `create`/`unlink`/`info`.
//! - [`allocator`] — anonymous region `acquire`/`release`.
//! - [`error`] — the crate's error type.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod error;
pub mod lifecycle;
pub mod lock;
pub mod memory_policy;
pub mod name;
pub mod numa;
pub mod page_size;
pub mod topology;

pub use allocator::{acquire, release};
pub use error::{ShmError, ShmResult};
pub use lifecycle::{RegionInfo, create, info, unlink};
pub use name::{name_valid, validate_name};
pub use numa::validate_numa;
pub use page_size::{PageSize, is_valid_page_size};
pub use topology::{cpu_cnt, cpu_idx, numa_cnt, numa_idx};

use std::sync::RwLock;

static BASE_PATH_OVERRIDE: RwLock<Option<String>> = RwLock::new(None);

/// Pin the shared-memory base path to an explicit value (e.g. from a
/// `--shmem-path` CLI flag), taking priority over `FD_SHMEM_PATH` and
/// the built-in default for the rest of this process's lifetime.
pub fn configure_base_path(path: impl Into<String>) {
    *BASE_PATH_OVERRIDE.write().expect("base path lock poisoned") = Some(path.into());
}

/// The shared-memory base path: an explicit [`configure_base_path`]
/// override, then `FD_SHMEM_PATH`, then the default `/mnt/.fd` —
/// re-resolved on every call, so tests can scope `FD_SHMEM_PATH` to a
/// temporary directory without cross-test leakage through a cache.
pub fn base_path() -> ShmResult<String> {
    let override_guard = BASE_PATH_OVERRIDE.read().expect("base path lock poisoned");
    let resolved = evo::resolve_cfg_value(override_guard.as_deref(), "FD_SHMEM_PATH", "/mnt/.fd");
    drop(override_guard);
    name::trim_base_path(&resolved)
}

/// Initialize tracing for administrative CLI use.
pub fn init_tracing() {
    evo::init_tracing();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_defaults_without_configuration() {
        unsafe {
            std::env::remove_var("FD_SHMEM_PATH");
        }
        let path = name::trim_base_path("/mnt/.fd").unwrap();
        assert_eq!(path, "/mnt/.fd");
    }
}
