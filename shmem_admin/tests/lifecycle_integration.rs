//! End-to-end exercise of topology boot, named-region lifecycle, and the
//! anonymous allocator against a temporary base path with NORMAL pages.
//!
//! Huge and gigantic pages need a privileged hugetlbfs mount this test
//! environment cannot assume, so only NORMAL-page behavior is covered
//! here; the page-size conversions themselves are covered without any
//! filesystem interaction in `page_size.rs`'s unit tests.

use std::sync::Mutex;

use shmem_admin::page_size::PageSize;
use shmem_admin::{allocator, lifecycle, topology};

// topology::boot() and FD_SHMEM_PATH are both process-wide state; these
// tests run in the same test binary's threads by default, so serialize
// them rather than pulling in a separate test-harness dependency.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn setup() -> (std::sync::MutexGuard<'static, ()>, tempfile::TempDir) {
    let guard = ENV_LOCK.lock().unwrap();
    topology::boot().expect("topology boot should succeed even without real NUMA hardware");
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("normal")).unwrap();
    unsafe {
        std::env::set_var("FD_SHMEM_PATH", dir.path());
    }
    (guard, dir)
}

#[test]
fn create_info_unlink_round_trip() {
    let (_guard, _dir) = setup();

    let name = "integration-region";
    let page_sz = PageSize::Normal.byte_size();

    lifecycle::create(name, page_sz, 4, 0, 0o600).expect("create should succeed");

    let info = lifecycle::info(name, page_sz).expect("info should find the region");
    assert_eq!(info.page_cnt, 4);
    assert_eq!(info.page_sz, page_sz);

    lifecycle::unlink(name, page_sz).expect("unlink should succeed");

    let err = lifecycle::info(name, page_sz).unwrap_err();
    assert!(matches!(err, shmem_admin::ShmError::NotFound { .. }));
}

#[test]
fn create_twice_is_already_exists() {
    let (_guard, _dir) = setup();

    let name = "duplicate-region";
    let page_sz = PageSize::Normal.byte_size();

    lifecycle::create(name, page_sz, 1, 0, 0o600).expect("first create should succeed");
    let err = lifecycle::create(name, page_sz, 1, 0, 0o600).unwrap_err();
    assert!(matches!(err, shmem_admin::ShmError::AlreadyExists { .. }));

    lifecycle::unlink(name, page_sz).unwrap();
}

#[test]
fn info_with_zero_page_sz_searches_all_sizes() {
    let (_guard, _dir) = setup();

    let name = "auto-detected-region";
    let page_sz = PageSize::Normal.byte_size();
    lifecycle::create(name, page_sz, 2, 0, 0o600).unwrap();

    let info = lifecycle::info(name, 0).expect("search across page sizes should find it");
    assert_eq!(info.page_sz, page_sz);
    assert_eq!(info.page_cnt, 2);

    lifecycle::unlink(name, page_sz).unwrap();
}

#[test]
fn acquire_release_anonymous_pages() {
    let _guard = ENV_LOCK.lock().unwrap();
    topology::boot().unwrap();
    let page_sz = PageSize::Normal.byte_size();
    let mem = allocator::acquire(page_sz, 2, 0).expect("acquire should succeed");
    assert!(!mem.is_null());
    assert_eq!((mem as usize) % page_sz, 0);
    allocator::release(mem, page_sz, 2).expect("release should succeed");
}
