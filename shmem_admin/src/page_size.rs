//! Page-size catalog — the closed set of page sizes `shmem_admin` will
//! ever allocate against, and the string/log2/byte-count conversions the
//! rest of the crate funnels every page-size argument through.

use std::fmt;

/// A page size from the fixed, build-time-closed set.
///
/// No runtime registration: every other component checks a candidate
/// `usize` against [`PageSize::from_bytes`] before trusting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageSize {
    /// 4 KiB — the ordinary page size on x86-64.
    Normal,
    /// 2 MiB — a "huge" page on x86-64.
    Huge,
    /// 1 GiB — a "gigantic" page on x86-64.
    Gigantic,
}

impl PageSize {
    /// All known page sizes, in ascending order.
    pub const ALL: [PageSize; 3] = [PageSize::Normal, PageSize::Huge, PageSize::Gigantic];

    /// Byte size of this page size on x86-64.
    pub const fn byte_size(self) -> usize {
        match self {
            PageSize::Normal => 4 * 1024,
            PageSize::Huge => 2 * 1024 * 1024,
            PageSize::Gigantic => 1024 * 1024 * 1024,
        }
    }

    /// `log2` of [`Self::byte_size`].
    pub const fn lg_byte_size(self) -> u32 {
        match self {
            PageSize::Normal => 12,
            PageSize::Huge => 21,
            PageSize::Gigantic => 30,
        }
    }

    /// Canonical lowercase name, used in paths and CLI output.
    pub const fn as_str(self) -> &'static str {
        match self {
            PageSize::Normal => "normal",
            PageSize::Huge => "huge",
            PageSize::Gigantic => "gigantic",
        }
    }

    /// The `mmap(2)` huge-page-size encoding bits (`MAP_HUGE_2MB` /
    /// `MAP_HUGE_1GB`), or `None` for [`PageSize::Normal`] which needs no
    /// `MAP_HUGETLB` flag at all.
    pub const fn huge_shift_bits(self) -> Option<u32> {
        match self {
            PageSize::Normal => None,
            PageSize::Huge => Some(21),
            PageSize::Gigantic => Some(30),
        }
    }

    /// Parse a page size from its canonical name (case-insensitive), its
    /// `log2` form (e.g. `"21"`), or its literal byte count (e.g.
    /// `"2097152"`). Returns `None` (the `UNKNOWN` sentinel) for anything
    /// else.
    pub fn from_cstr(s: &str) -> Option<PageSize> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "normal" => return Some(PageSize::Normal),
            "huge" => return Some(PageSize::Huge),
            "gigantic" => return Some(PageSize::Gigantic),
            _ => {}
        }

        if let Ok(i) = s.parse::<u32>() {
            if let Some(p) = Self::from_lg(i) {
                return Some(p);
            }
        }
        if let Ok(u) = s.parse::<usize>() {
            return Self::from_bytes(u);
        }
        None
    }

    /// Map a `log2` page size to its [`PageSize`], or `None` if it does
    /// not match one of the three known values.
    pub fn from_lg(lg: u32) -> Option<PageSize> {
        Self::ALL.into_iter().find(|p| p.lg_byte_size() == lg)
    }

    /// Map a byte count to its [`PageSize`], or `None` if it does not
    /// match one of the three known values. This is the predicate every
    /// other component uses to validate an incoming page-size argument.
    pub fn from_bytes(bytes: usize) -> Option<PageSize> {
        Self::ALL.into_iter().find(|p| p.byte_size() == bytes)
    }

    /// `log2`-form string conversion, mirroring [`Self::from_cstr`] /
    /// [`Self::as_str`] but keyed on the `log2` value instead of the byte
    /// count.
    pub fn lg_to_cstr(lg: u32) -> &'static str {
        match Self::from_lg(lg) {
            Some(p) => p.as_str(),
            None => "unknown",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` iff `bytes` matches one of the three known page sizes. Every
/// other component in this crate funnels its page-size argument through
/// this check (via [`PageSize::from_bytes`]) before acting on it.
pub fn is_valid_page_size(bytes: usize) -> bool {
    PageSize::from_bytes(bytes).is_some()
}
