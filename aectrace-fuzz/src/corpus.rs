// SPDX-License-Identifier: Apache-2.0

//! Energy-weighted seed corpus.

use std::collections::BTreeSet;

use rand::Rng;

use crate::error::FuzzError;

/// Energy a seed starts with when it enters the corpus.
pub const INITIAL_ENERGY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub content: String,
    pub energy: f64,
}

/// Seeds in insertion order. Contents are unique.
#[derive(Debug, Clone, Default)]
pub struct SeedCorpus {
    seeds: Vec<Seed>,
    contents: BTreeSet<String>,
}

impl SeedCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn contains(&self, content: &str) -> bool {
        self.contents.contains(content)
    }

    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }

    pub fn energy(&self, content: &str) -> Option<f64> {
        self.seeds
            .iter()
            .find(|s| s.content == content)
            .map(|s| s.energy)
    }

    pub fn total_energy(&self) -> f64 {
        self.seeds.iter().map(|s| s.energy).sum()
    }

    /// Inserts an initial seed at [`INITIAL_ENERGY`] without touching the
    /// energy of the others. Returns false if the content is already present.
    pub fn insert_initial(&mut self, content: &str) -> bool {
        if !self.contents.insert(content.to_string()) {
            return false;
        }
        self.seeds.push(Seed {
            content: content.to_string(),
            energy: INITIAL_ENERGY,
        });
        true
    }

    /// Multiplies every existing energy by `1 - decay`, then inserts
    /// `content` at [`INITIAL_ENERGY`].
    pub fn add_seed(&mut self, content: &str, decay: f64) -> Result<(), FuzzError> {
        if self.contains(content) {
            return Err(FuzzError::DuplicateSeed {
                content: content.to_string(),
            });
        }
        let factor = 1.0 - decay;
        for seed in self.seeds.iter_mut() {
            seed.energy *= factor;
        }
        let inserted = self.insert_initial(content);
        debug_assert!(inserted);
        Ok(())
    }

    /// Multiplies the energy of `content` by `1 + boost`. Returns false if
    /// the seed is unknown.
    pub fn boost_seed(&mut self, content: &str, boost: f64) -> bool {
        match self.seeds.iter_mut().find(|s| s.content == content) {
            Some(seed) => {
                seed.energy *= 1.0 + boost;
                true
            }
            None => false,
        }
    }

    /// Roulette-wheel selection proportional to energy.
    pub fn pick_seed<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&Seed, FuzzError> {
        let last = self.seeds.last().ok_or(FuzzError::EmptyCorpus)?;
        let mut r = rng.gen::<f64>() * self.total_energy();
        for seed in self.seeds.iter() {
            if r < seed.energy {
                return Ok(seed);
            }
            r -= seed.energy;
        }
        // Rounding can leave a sliver past the last seed.
        Ok(last)
    }
}
