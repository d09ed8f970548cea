/*!
Periodic voting. Every populated institution polls its members through the
membership ring: each member casts one vote per feature, for the trait it
holds. A feature's aggregate trait changes only if some trait gets strictly
more votes than the trait currently settled (an unset feature takes any
winner). Ties among the best traits are broken uniformly at random.

```rust
use model::beliefs::BeliefStore;
use model::consensus::{vote, Tally};
use model::institutions::InstitutionRegistry;
use rand::SeedableRng;

// Three members voting 0, 0, 1 on the only feature.
let beliefs = BeliefStore::from_values(1, 2, vec![0, 0, 1]).unwrap();
let mut registry = InstitutionRegistry::singletons(3, 1);
registry.switch_institution(1, 1, 0, 0).unwrap();
registry.switch_institution(2, 2, 0, 0).unwrap();
let mut rng = rand::rngs::StdRng::seed_from_u64(0);
vote(&mut registry, &beliefs, Tally::AllFeatures, &mut rng).unwrap();
assert_eq!(registry.aggregate_feature(0, 0), Some(0));
```
 */
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::beliefs::BeliefStore;
use crate::error::RingError;
use crate::institutions::InstitutionRegistry;
use crate::{InstitutionId, Trait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tally {
    /// Every feature is decided independently.
    AllFeatures,
    /// Only the feature with the largest winning margin changes.
    SingleFeature,
}

impl std::str::FromStr for Tally {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "all-features" | "all" => Ok(Tally::AllFeatures),
            "single-feature" | "single" => Ok(Tally::SingleFeature),
            _ => Err(format!("unknown tally {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsensusReport {
    pub institutions: usize,
    pub updated_features: usize,
}

/// Votes of one institution, `traits` counters per feature.
struct Votes {
    traits: usize,
    counts: Vec<u32>,
}

impl Votes {
    fn new(features: usize, traits: usize) -> Votes {
        Votes {
            traits,
            counts: vec![0; features * traits],
        }
    }

    fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    fn count(&self, feature: usize, value: Trait) -> u32 {
        self.counts[feature * self.traits + value as usize]
    }

    fn cast(&mut self, beliefs: &[Trait]) {
        for (feature, value) in beliefs.iter().enumerate() {
            self.counts[feature * self.traits + *value as usize] += 1;
        }
    }

    /// The winning margin of a feature over the settled trait and the traits
    /// reaching it, or `None` when nothing beats the status quo.
    fn challengers(&self, feature: usize, settled: Option<Trait>) -> Option<(u32, Vec<Trait>)> {
        let row = &self.counts[feature * self.traits..(feature + 1) * self.traits];
        let best = *row.iter().max()?;
        let defended = settled.map(|t| self.count(feature, t)).unwrap_or(0);
        if best == 0 || (settled.is_some() && best <= defended) {
            return None;
        }
        let candidates = row
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == best)
            .map(|(t, _)| t as Trait)
            .collect();
        Some((best - defended, candidates))
    }
}

fn pick<T: Copy>(options: &[T], rng: &mut dyn RngCore) -> Option<T> {
    if options.len() == 1 {
        options.first().copied()
    } else {
        options.choose(rng).copied()
    }
}

/// Run one voting round over all populated institutions.
pub fn vote(
    registry: &mut InstitutionRegistry,
    beliefs: &BeliefStore,
    tally: Tally,
    rng: &mut dyn RngCore,
) -> Result<ConsensusReport, RingError> {
    let mut votes = Votes::new(beliefs.features(), beliefs.traits() as usize);
    let mut report = ConsensusReport::default();
    for institution in registry.live_institutions() {
        votes.reset();
        for member in registry.iterate_members(institution) {
            votes.cast(beliefs.beliefs(member?));
        }
        report.institutions += 1;
        report.updated_features += settle(registry, institution, &votes, tally, rng);
    }
    Ok(report)
}

fn settle(
    registry: &mut InstitutionRegistry,
    institution: InstitutionId,
    votes: &Votes,
    tally: Tally,
    rng: &mut dyn RngCore,
) -> usize {
    let features = registry.features();
    match tally {
        Tally::AllFeatures => {
            let mut updated = 0;
            for feature in 0..features {
                let settled = registry.aggregate_feature(institution, feature);
                if let Some((_, candidates)) = votes.challengers(feature, settled) {
                    if let Some(winner) = pick(&candidates, rng) {
                        debug!(institution, feature, winner, "vote settled");
                        registry.settle_feature(institution, feature, winner);
                        updated += 1;
                    }
                }
            }
            updated
        }
        Tally::SingleFeature => {
            let mut best_margin = 0;
            let mut contested: Vec<(usize, Vec<Trait>)> = Vec::new();
            for feature in 0..features {
                let settled = registry.aggregate_feature(institution, feature);
                if let Some((margin, candidates)) = votes.challengers(feature, settled) {
                    if margin > best_margin {
                        best_margin = margin;
                        contested.clear();
                    }
                    if margin == best_margin {
                        contested.push((feature, candidates));
                    }
                }
            }
            let k = match contested.len() {
                0 => return 0,
                1 => 0,
                n => rng.gen_range(0..n),
            };
            let (feature, candidates) = &contested[k];
            match pick(candidates, rng) {
                None => 0,
                Some(winner) => {
                    debug!(institution, feature, winner, "vote settled");
                    registry.settle_feature(institution, *feature, winner);
                    1
                }
            }
        }
    }
}
