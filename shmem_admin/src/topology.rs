//! NUMA topology oracle.
//!
//! Discovers, at `boot()`, the number of NUMA nodes and logical CPUs on
//! the host and the CPU-to-node map, via sysfs rather than `libnuma` —
//! this crate has no C dependency to link against, and
//! `/sys/devices/system/{node,cpu}` carries the same information the
//! kernel exposes to `libnuma` itself.

use std::sync::RwLock;

use crate::error::{ShmError, ShmResult};

/// Hard ceiling on discoverable NUMA nodes. Matches the sentinel arrays
/// the rest of the crate sizes against.
pub const NUMA_MAX: usize = 128;

/// Hard ceiling on discoverable logical CPUs.
pub const CPU_MAX: usize = 1024;

/// Sentinel marking a slot in `Topology::numa_idx` that has no backing
/// CPU — either the id was never observed (a hole in a sparse/offline id
/// set) or it falls past the highest discovered id.
const CPU_UNASSIGNED: u16 = u16::MAX;

struct Topology {
    numa_cnt: usize,
    cpu_cnt: usize,
    /// `numa_idx[cpu] = numa node that cpu belongs to`, sized by the
    /// highest discovered CPU id (not `cpu_cnt`) so a sparse/non-contiguous
    /// id set — e.g. an offline CPU leaving a gap — never indexes past the
    /// end of this table. Unoccupied slots hold [`CPU_UNASSIGNED`].
    numa_idx: Vec<u16>,
    /// `cpu_idx[numa] = a representative cpu on that node`
    cpu_idx: Vec<u16>,
}

static TOPOLOGY: RwLock<Option<Topology>> = RwLock::new(None);

/// Discover NUMA topology and record it in process-wide state.
///
/// Idempotent: a second `boot()` without an intervening `halt()` is a
/// no-op that returns `Ok(())`, mirroring the thread-group-wide
/// boot/halt discipline of the rest of the administrative surface.
pub fn boot() -> ShmResult<()> {
    tracing::info!("shmem topology: booting");

    {
        let guard = TOPOLOGY.read().expect("topology lock poisoned");
        if guard.is_some() {
            tracing::info!("shmem topology: already booted");
            return Ok(());
        }
    }

    let node_ids = discover_node_ids()?;
    let numa_cnt = node_ids.len();
    if !(1..=NUMA_MAX).contains(&numa_cnt) {
        return Err(ShmError::invalid_arg(format!(
            "unexpected numa_cnt {numa_cnt} (expected in [1,{NUMA_MAX}])"
        )));
    }

    let cpu_ids = discover_cpu_ids()?;
    let cpu_cnt = cpu_ids.len();
    if !(1..=CPU_MAX).contains(&cpu_cnt) {
        return Err(ShmError::invalid_arg(format!(
            "unexpected cpu_cnt {cpu_cnt} (expected in [1,{CPU_MAX}])"
        )));
    }

    // cpu_ids may be sparse (e.g. an offline CPU leaves a gap), so size the
    // table by the highest id actually seen rather than by cpu_cnt — a
    // dense-id assumption here panics on an otherwise legal topology.
    let max_cpu_id = *cpu_ids.iter().max().expect("cpu_cnt checked nonempty above");
    if max_cpu_id >= CPU_MAX {
        return Err(ShmError::invalid_arg(format!(
            "cpu id {max_cpu_id} out of range (expected < {CPU_MAX})"
        )));
    }

    let mut numa_idx = vec![CPU_UNASSIGNED; max_cpu_id + 1];
    let mut cpu_idx = vec![0u16; numa_cnt];
    for &cpu in cpu_ids.iter().rev() {
        let node = numa_node_of_cpu(cpu)?;
        if node >= numa_cnt {
            return Err(ShmError::invalid_arg(format!(
                "unexpected numa idx ({node}) for cpu idx {cpu}"
            )));
        }
        numa_idx[cpu] = node as u16;
        cpu_idx[node] = cpu as u16;
    }

    let topo = Topology {
        numa_cnt,
        cpu_cnt,
        numa_idx,
        cpu_idx,
    };

    *TOPOLOGY.write().expect("topology lock poisoned") = Some(topo);
    tracing::info!(numa_cnt, cpu_cnt, "shmem topology: boot success");
    Ok(())
}

/// Discard discovered topology. Idempotent.
pub fn halt() {
    tracing::info!("shmem topology: halting");
    *TOPOLOGY.write().expect("topology lock poisoned") = None;
    tracing::info!("shmem topology: halt success");
}

fn with_topology<T>(f: impl FnOnce(&Topology) -> T) -> Option<T> {
    TOPOLOGY.read().expect("topology lock poisoned").as_ref().map(f)
}

/// Number of NUMA nodes discovered at boot, or `0` if not yet booted.
pub fn numa_cnt() -> usize {
    with_topology(|t| t.numa_cnt).unwrap_or(0)
}

/// Number of logical CPUs discovered at boot, or `0` if not yet booted.
pub fn cpu_cnt() -> usize {
    with_topology(|t| t.cpu_cnt).unwrap_or(0)
}

/// NUMA node a given logical CPU belongs to, or `None` if `cpu_idx` is
/// out of range, unoccupied (a hole in a sparse/offline id set), or
/// topology has not been booted.
pub fn numa_idx(cpu_idx: usize) -> Option<usize> {
    with_topology(|t| {
        t.numa_idx
            .get(cpu_idx)
            .copied()
            .filter(|&node| node != CPU_UNASSIGNED)
            .map(|node| node as usize)
    })
    .flatten()
}

/// A representative logical CPU on a given NUMA node, or `None` if
/// `numa_idx` is out of range or topology has not been booted.
pub fn cpu_idx(numa_idx: usize) -> Option<usize> {
    with_topology(|t| {
        if numa_idx < t.numa_cnt {
            Some(t.cpu_idx[numa_idx] as usize)
        } else {
            None
        }
    })
    .flatten()
}

fn discover_node_ids() -> ShmResult<Vec<usize>> {
    // Containers and non-NUMA hosts may not expose
    // /sys/devices/system/node at all; treat that as a single node 0
    // rather than failing boot() outright.
    match read_indexed_entries("/sys/devices/system/node", "node") {
        Ok(mut ids) => {
            if ids.is_empty() {
                ids.push(0);
            }
            ids.sort_unstable();
            Ok(ids)
        }
        Err(_) => Ok(vec![0]),
    }
}

fn discover_cpu_ids() -> ShmResult<Vec<usize>> {
    let mut ids = read_indexed_entries("/sys/devices/system/cpu", "cpu")?;
    ids.sort_unstable();
    Ok(ids)
}

/// List the numeric suffixes of `<prefix><N>` entries directly under
/// `dir` (e.g. `node3` under `/sys/devices/system/node` yields `3`).
fn read_indexed_entries(dir: &str, prefix: &str) -> ShmResult<Vec<usize>> {
    let entries = std::fs::read_dir(dir).map_err(ShmError::from)?;
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ShmError::from)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(suffix) = name.strip_prefix(prefix) else {
            continue;
        };
        if let Ok(id) = suffix.parse::<usize>() {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn numa_node_of_cpu(cpu: usize) -> ShmResult<usize> {
    let path = format!("/sys/devices/system/cpu/cpu{cpu}/node");
    if let Ok(ids) = read_indexed_entries(&path, "node") {
        if let Some(&id) = ids.first() {
            return Ok(id);
        }
    }

    // Some kernels expose this as a symlink named nodeN rather than a
    // directory entry matched by read_indexed_entries's glob above;
    // fall back to parsing /sys/devices/system/node/*/cpuN membership.
    for node in discover_node_ids()? {
        let cpu_path = format!("/sys/devices/system/node/node{node}/cpu{cpu}");
        if std::path::Path::new(&cpu_path).exists() {
            return Ok(node);
        }
    }

    tracing::warn!(cpu, "could not determine numa node for cpu, defaulting to 0");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // boot()/halt() touch global process state and read real sysfs, so
    // only non-mutating accessor behavior is exercised here without
    // assuming a booted state.

    #[test]
    fn accessors_return_none_before_boot() {
        halt();
        assert_eq!(numa_cnt(), 0);
        assert_eq!(cpu_cnt(), 0);
        assert_eq!(numa_idx(0), None);
        assert_eq!(cpu_idx(0), None);
    }

    #[test]
    fn numa_idx_handles_sparse_cpu_ids_without_panicking() {
        // Simulates a host where cpu1 is offline (missing from the
        // discovered id set), so numa_idx is sized 0..=2 but slot 1 is a
        // hole rather than contiguous with cpu_cnt.
        let topo = Topology {
            numa_cnt: 1,
            cpu_cnt: 2,
            numa_idx: vec![0, CPU_UNASSIGNED, 0],
            cpu_idx: vec![0],
        };
        *TOPOLOGY.write().expect("topology lock poisoned") = Some(topo);

        assert_eq!(numa_idx(0), Some(0));
        assert_eq!(numa_idx(1), None, "hole in the sparse id set");
        assert_eq!(numa_idx(2), Some(0));
        assert_eq!(numa_idx(3), None, "past the end of the table, not a panic");

        halt();
    }

    #[test]
    fn read_indexed_entries_parses_numeric_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("node0")).unwrap();
        std::fs::create_dir(dir.path().join("node3")).unwrap();
        std::fs::create_dir(dir.path().join("online")).unwrap();
        let mut ids = read_indexed_entries(dir.path().to_str().unwrap(), "node").unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 3]);
    }
}
