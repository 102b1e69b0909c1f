//! # `shmem_admin` CLI
//!
//! A thin command-line front end over the [`shmem_admin`] library:
//! create, unlink, and inspect named shared-memory regions, exercise
//! the anonymous allocator, and dump discovered NUMA topology.

use clap::{Parser, Subcommand};
use serde::Serialize;
use shmem_admin::{ShmError, allocator, lifecycle, page_size::PageSize, topology};
use tracing::{error, info};

/// NUMA-aware shared-memory region administration.
#[derive(Parser, Debug)]
#[command(name = "shmem_admin")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Create, inspect, and release NUMA-bound shared-memory regions")]
struct Args {
    /// Shared-memory base path (overrides FD_SHMEM_PATH and the built-in default).
    #[arg(long, global = true)]
    shmem_path: Option<String>,

    /// Emit structured JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover and print NUMA topology (node count, cpu count, cpu->node map).
    Topology,
    /// Create a named region.
    Create {
        /// Region name.
        name: String,
        /// Page size: "normal", "huge", "gigantic", a byte count, or a log2 value.
        page_sz: String,
        /// Number of pages.
        page_cnt: usize,
        /// Logical CPU whose NUMA node the region should be bound to.
        #[arg(long, default_value_t = 0)]
        cpu_idx: usize,
        /// Creation mode (octal), e.g. 600.
        #[arg(long, default_value_t = 0o600)]
        mode: u32,
    },
    /// Unlink a named region.
    Unlink {
        /// Region name.
        name: String,
        /// Page size: "normal", "huge", "gigantic", a byte count, or a log2 value.
        page_sz: String,
    },
    /// Print a named region's size. Pass page_sz "0" to search all sizes.
    Info {
        /// Region name.
        name: String,
        /// Page size, or "0" to search gigantic/huge/normal in turn.
        #[arg(default_value = "0")]
        page_sz: String,
    },
    /// Exercise the anonymous allocator: acquire then immediately release.
    AcquireRelease {
        /// Page size: "normal", "huge", "gigantic", a byte count, or a log2 value.
        page_sz: String,
        /// Number of pages.
        page_cnt: usize,
        /// Logical CPU whose NUMA node the region should be bound to.
        #[arg(long, default_value_t = 0)]
        cpu_idx: usize,
    },
}

#[derive(Serialize)]
struct JsonResult<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    shmem_admin::init_tracing();
    let args = Args::parse();

    if let Some(path) = &args.shmem_path {
        shmem_admin::configure_base_path(path.clone());
    }

    if let Err(err) = topology::boot() {
        error!(%err, "failed to boot numa topology");
        std::process::exit(1);
    }

    let exit_code = run(&args);
    topology::halt();
    std::process::exit(exit_code);
}

fn parse_page_sz(s: &str) -> Result<usize, ShmError> {
    PageSize::from_cstr(s)
        .map(PageSize::byte_size)
        .ok_or_else(|| ShmError::invalid_arg(format!("bad page_sz ({s})")))
}

fn run(args: &Args) -> i32 {
    match &args.command {
        Command::Topology => emit(
            args.json,
            Ok(serde_json::json!({
                "numa_cnt": topology::numa_cnt(),
                "cpu_cnt": topology::cpu_cnt(),
            })),
        ),
        Command::Create {
            name,
            page_sz,
            page_cnt,
            cpu_idx,
            mode,
        } => {
            let result = parse_page_sz(page_sz)
                .and_then(|sz| lifecycle::create(name, sz, *page_cnt, *cpu_idx, *mode))
                .map(|()| serde_json::json!({ "created": name }));
            emit(args.json, result)
        }
        Command::Unlink { name, page_sz } => {
            let result = parse_page_sz(page_sz)
                .and_then(|sz| lifecycle::unlink(name, sz))
                .map(|()| serde_json::json!({ "unlinked": name }));
            emit(args.json, result)
        }
        Command::Info { name, page_sz } => {
            // "0" means "probe gigantic, then huge, then normal" — bypass
            // parse_page_sz since 0 is not itself a valid page size.
            let result = (if page_sz == "0" {
                Ok(0)
            } else {
                parse_page_sz(page_sz)
            })
            .and_then(|sz| lifecycle::info(name, sz))
            .map(|info| serde_json::json!(info));
            emit(args.json, result)
        }
        Command::AcquireRelease {
            page_sz,
            page_cnt,
            cpu_idx,
        } => {
            let result = parse_page_sz(page_sz).and_then(|sz| {
                let mem = allocator::acquire(sz, *page_cnt, *cpu_idx)?;
                allocator::release(mem, sz, *page_cnt)?;
                Ok(serde_json::json!({ "acquired_and_released_pages": page_cnt }))
            });
            emit(args.json, result)
        }
    }
}

fn emit<T: Serialize>(json: bool, result: Result<T, ShmError>) -> i32 {
    match result {
        Ok(data) => {
            if json {
                let out = JsonResult {
                    ok: true,
                    data: Some(data),
                    error: None,
                };
                println!("{}", serde_json::to_string(&out).unwrap());
            } else {
                info!("ok");
                println!("{}", serde_json::to_string_pretty(&data).unwrap());
            }
            0
        }
        Err(err) => {
            error!(%err, "command failed");
            if json {
                let out: JsonResult<()> = JsonResult {
                    ok: false,
                    data: None,
                    error: Some(err.to_string()),
                };
                println!("{}", serde_json::to_string(&out).unwrap());
            } else {
                eprintln!("error: {err}");
            }
            1
        }
    }
}
