//! Property-based round-trip laws for the page-size catalog and name
//! grammar, per the crate's testable-properties contract:
//! `page_sz_to_cstr(page_sz_from_cstr(s)) == canonical(s)`, and the
//! name grammar's length-or-zero invariant.

use proptest::prelude::*;
use shmem_admin::name::validate_name;
use shmem_admin::page_size::PageSize;

proptest! {
    #[test]
    fn page_size_byte_round_trip(idx in 0..3usize) {
        let p = PageSize::ALL[idx];
        prop_assert_eq!(PageSize::from_bytes(p.byte_size()), Some(p));
    }

    #[test]
    fn page_size_lg_round_trip(idx in 0..3usize) {
        let p = PageSize::ALL[idx];
        prop_assert_eq!(PageSize::from_lg(p.lg_byte_size()), Some(p));
    }

    #[test]
    fn page_size_cstr_round_trip(idx in 0..3usize) {
        let p = PageSize::ALL[idx];
        prop_assert_eq!(PageSize::from_cstr(p.as_str()), Some(p));
    }

    #[test]
    fn arbitrary_byte_count_is_valid_iff_known(bytes in any::<usize>()) {
        let known = PageSize::ALL.iter().any(|p| p.byte_size() == bytes);
        prop_assert_eq!(shmem_admin::is_valid_page_size(bytes), known);
    }

    // validate_name never panics, and always returns either 0 or the
    // exact input length.
    #[test]
    fn validate_name_returns_zero_or_exact_length(s in "\\PC{0,200}") {
        let len = validate_name(&s);
        prop_assert!(len == 0 || len == s.len());
    }

    // Any string built from the grammar's accepted alphabet, with a
    // valid leading character, is always accepted.
    #[test]
    fn grammar_conforming_names_are_always_accepted(
        first in "[a-zA-Z0-9]",
        rest in "[a-zA-Z0-9_.-]{0,50}",
    ) {
        let name = format!("{first}{rest}");
        prop_assert_eq!(validate_name(&name), name.len());
    }
}
