// SPDX-License-Identifier: Apache-2.0

//! Single-character point mutations.

use rand::Rng;

/// Replacement alphabet: ASCII letters, digits, space and punctuation.
pub const CHARSET: &str = concat!(
    "abcdefghijklmnopqrstuvwxyz",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "0123456789",
    " !@#$%^&*()-_=+[]{};':\",.<>/?`~",
);

fn random_char<R: Rng + ?Sized>(rng: &mut R) -> char {
    let bytes = CHARSET.as_bytes();
    bytes[rng.gen_range(0..bytes.len())] as char
}

/// Replaces one uniformly chosen character of `parent` with a uniformly
/// chosen character of [`CHARSET`]. An empty parent yields a one-character
/// string.
pub fn point_mutation<R: Rng + ?Sized>(parent: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = parent.chars().collect();
    if chars.is_empty() {
        return random_char(rng).to_string();
    }
    let pos = rng.gen_range(0..chars.len());
    chars[pos] = random_char(rng);
    chars.into_iter().collect()
}

/// `count` independent mutants of the same parent.
pub fn mutate_siblings<R: Rng + ?Sized>(parent: &str, count: usize, rng: &mut R) -> Vec<String> {
    (0..count).map(|_| point_mutation(parent, rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn charset_has_letters_digits_and_punctuation() {
        assert_eq!(CHARSET.len(), 26 + 26 + 10 + 31);
        assert!(CHARSET.contains(' '));
        assert!(CHARSET.contains('"'));
        assert!(CHARSET.contains('~'));
        assert!(CHARSET.is_ascii());
    }

    #[test]
    fn mutant_differs_in_at_most_one_position() {
        let mut rng = StdRng::seed_from_u64(42);
        let parent = "hello, world";
        for _ in 0..500 {
            let m = point_mutation(parent, &mut rng);
            assert_eq!(m.chars().count(), parent.chars().count());
            let diffs = m.chars().zip(parent.chars()).filter(|(a, b)| a != b).count();
            assert!(diffs <= 1, "{:?}", m);
            assert!(m.chars().all(|c| parent.contains(c) || CHARSET.contains(c)));
        }
    }

    #[test]
    fn multibyte_parent_keeps_char_count() {
        let mut rng = StdRng::seed_from_u64(3);
        let parent = "héllo→";
        for _ in 0..100 {
            assert_eq!(point_mutation(parent, &mut rng).chars().count(), 6);
        }
    }

    #[test]
    fn empty_parent_grows_to_one_char() {
        let mut rng = StdRng::seed_from_u64(0);
        let m = point_mutation("", &mut rng);
        assert_eq!(m.chars().count(), 1);
        assert!(CHARSET.contains(m.as_str()));
    }

    #[test]
    fn siblings_are_derived_from_the_parent() {
        let mut rng = StdRng::seed_from_u64(9);
        let kids = mutate_siblings("aaaaaaaa", 4, &mut rng);
        assert_eq!(kids.len(), 4);
        for k in kids.iter() {
            assert!(k.chars().filter(|&c| c != 'a').count() <= 1);
        }
    }
}
