// SPDX-License-Identifier: Apache-2.0

//! Initial seeds that stress hash tables keyed by strings.
//!
//! `"An"`, `"BO"` and `"C0"` share the same Java `String.hashCode`, and so
//! does every concatenation of the same number of them.

pub const COLLIDING_PAIRS: [&str; 3] = ["An", "BO", "C0"];

/// All `3^pairs` strings made of `pairs` blocks from [`COLLIDING_PAIRS`], in
/// lexicographic order of the block sequence.
pub fn colliding_strings(pairs: usize) -> Vec<String> {
    let mut result = vec![String::new()];
    for _ in 0..pairs {
        result = result
            .iter()
            .flat_map(|prefix| COLLIDING_PAIRS.iter().map(move |p| format!("{}{}", prefix, p)))
            .collect();
    }
    result
}

/// Java's `String.hashCode` over UTF-16 code units.
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn two_pairs_in_generation_order() {
        assert_eq!(
            colliding_strings(2),
            vec!["AnAn", "AnBO", "AnC0", "BOAn", "BOBO", "BOC0", "C0An", "C0BO", "C0C0"]
        );
    }

    #[test_case(0, 1)]
    #[test_case(1, 3)]
    #[test_case(4, 81)]
    fn count_is_three_to_the_k(pairs: usize, want: usize) {
        assert_eq!(colliding_strings(pairs).len(), want);
    }

    #[test]
    fn all_strings_of_a_length_collide() {
        let strings = colliding_strings(3);
        let h = java_string_hash(&strings[0]);
        assert!(strings.iter().all(|s| java_string_hash(s) == h));
    }
}
