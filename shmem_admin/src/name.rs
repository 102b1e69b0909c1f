//! Name validation and name/page-size → filesystem path resolution.

use crate::error::{ShmError, ShmResult};
use crate::page_size::PageSize;

/// Maximum length of a region name, not including the NUL terminator a C
/// caller would expect.
pub const NAME_MAX: usize = 128;

/// Maximum length of the shared-memory base path.
pub const BASE_MAX: usize = 256;

/// Maximum length of a fully resolved region path
/// (`<base>/<page_sz_cstr>/<name>`).
pub const PATH_BUF_MAX: usize = BASE_MAX + 1 + 8 + 1 + NAME_MAX;

/// Validate a region name against the grammar: nonempty, shorter than
/// [`NAME_MAX`], first byte alphanumeric, subsequent bytes alphanumeric
/// or one of `_ - .`.
///
/// Returns the validated length, or `0` to signal rejection — mirroring
/// the C convention this crate's path resolution is built on (an empty
/// name is never valid, so `0` is an unambiguous sentinel).
pub fn validate_name(name: &str) -> usize {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= NAME_MAX {
        return 0;
    }

    for (i, &c) in bytes.iter().enumerate() {
        let ok = c.is_ascii_alphanumeric()
            || (i > 0 && matches!(c, b'_' | b'-' | b'.'));
        if !ok {
            return 0;
        }
    }

    bytes.len()
}

/// `true` iff `name` satisfies the region name grammar.
pub fn name_valid(name: &str) -> bool {
    validate_name(name) > 0
}

fn require_valid_name(name: &str) -> ShmResult<()> {
    if !name_valid(name) {
        return Err(ShmError::invalid_arg(format!("bad name ({name:?})")));
    }
    Ok(())
}

/// Build the filesystem path for a named region:
/// `<base>/<page_sz_cstr>/<name>`.
///
/// Fails with `INVALID_ARG` if `name` fails the grammar check, or if the
/// resulting path would overflow [`PATH_BUF_MAX`].
pub fn resolve_path(base: &str, page_sz: PageSize, name: &str) -> ShmResult<String> {
    require_valid_name(name)?;

    let path = format!("{base}/{}/{name}", page_sz.as_str());
    if path.len() >= PATH_BUF_MAX {
        return Err(ShmError::invalid_arg(format!(
            "resolved path too long ({} >= {PATH_BUF_MAX})",
            path.len()
        )));
    }
    Ok(path)
}

/// Trim trailing slashes from a candidate base path and verify it fits
/// within [`BASE_MAX`] and is not empty after trimming.
pub fn trim_base_path(raw: &str) -> ShmResult<String> {
    let trimmed = raw.trim_end_matches('/');
    let trimmed = if trimmed.is_empty() && !raw.is_empty() {
        // raw was e.g. "/" or "///" — one leading slash always survives.
        "/"
    } else {
        trimmed
    };

    if trimmed.is_empty() {
        return Err(ShmError::invalid_arg("shmem base path too short"));
    }
    if trimmed.len() >= BASE_MAX {
        return Err(ShmError::invalid_arg(format!(
            "shmem base path too long ({} >= {BASE_MAX})",
            trimmed.len()
        )));
    }
    Ok(trimmed.to_string())
}
