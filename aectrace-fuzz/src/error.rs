// SPDX-License-Identifier: Apache-2.0

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuzzError {
    /// Seed selection from a corpus with no seeds.
    EmptyCorpus,
    DuplicateSeed {
        content: String,
    },
    SeedTooLong {
        content: String,
        len: usize,
        max_len: usize,
    },
}

impl fmt::Display for FuzzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuzzError::EmptyCorpus => write!(f, "cannot select a seed from an empty corpus"),
            FuzzError::DuplicateSeed { content } => {
                write!(f, "seed {:?} is already in the corpus", content)
            }
            FuzzError::SeedTooLong {
                content,
                len,
                max_len,
            } => write!(
                f,
                "seed {:?} has {} characters; the maximum is {}",
                content, len, max_len
            ),
        }
    }
}

impl std::error::Error for FuzzError {}
