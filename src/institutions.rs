/*!
Institutions are aggregate belief profiles shared by groups of agents.

Every cell belongs to exactly one institution. Institution ids range over the
cell indices, and at setup every cell is its own singleton institution. For
each institution the registry keeps

 - the aggregate belief, one `Option<Trait>` per feature, where `None` means
   the institution has not settled on a trait for that feature yet;
 - the population, i.e. the number of cells currently assigned to it;
 - a membership ring: a circular doubly-linked list through its members, so
   that members can be enumerated in time proportional to the population
   instead of scanning the grid.

The ring is an index arena. `next[c]` and `prev[c]` are the neighbours of cell
`c` in the ring of whatever institution `c` currently belongs to, and `head[i]`
is some member of institution `i` to start walking from.

```rust
use model::beliefs::BeliefStore;
use model::institutions::InstitutionRegistry;

let beliefs = BeliefStore::from_values(2, 3, vec![0, 1, 0, 2, 1, 1]).unwrap();
let mut registry = InstitutionRegistry::seeded(&beliefs);
registry.switch_institution(0, 0, 1, 1).unwrap();
assert_eq!(registry.population(0), 0);
assert_eq!(registry.population(1), 2);
let members: Vec<_> = registry.iterate_members(1).collect::<Result<_, _>>().unwrap();
assert_eq!(members.len(), 2);
```
 */
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::beliefs::BeliefStore;
use crate::error::RingError;
use crate::{CellId, InstitutionId, Trait};

#[derive(Clone)]
pub struct InstitutionRegistry {
    features: usize,
    /// Aggregate beliefs, `features` consecutive entries per institution.
    aggregate: Vec<Option<Trait>>,
    population: Vec<usize>,
    membership: Vec<InstitutionId>,
    next: Vec<CellId>,
    prev: Vec<CellId>,
    head: Vec<Option<CellId>>,
}

impl InstitutionRegistry {
    /// One singleton institution per cell, with id equal to the cell index and
    /// no settled traits.
    pub fn singletons(cells: usize, features: usize) -> InstitutionRegistry {
        InstitutionRegistry {
            features,
            aggregate: vec![None; cells * features],
            population: vec![1; cells],
            membership: (0..cells).collect(),
            next: (0..cells).collect(),
            prev: (0..cells).collect(),
            head: (0..cells).map(Some).collect(),
        }
    }

    /// Singleton institutions whose aggregate belief is their founder's.
    pub fn seeded(beliefs: &BeliefStore) -> InstitutionRegistry {
        let mut registry = InstitutionRegistry::singletons(beliefs.cells(), beliefs.features());
        for cell in 0..beliefs.cells() {
            for (feature, value) in beliefs.beliefs(cell).iter().enumerate() {
                registry.set_feature_if_unset(cell, feature, *value);
            }
        }
        registry
    }

    pub fn features(&self) -> usize {
        self.features
    }

    /// Number of institution ids, populated or latent.
    pub fn capacity(&self) -> usize {
        self.population.len()
    }

    pub fn institution_of(&self, cell: CellId) -> InstitutionId {
        self.membership[cell]
    }

    pub fn population(&self, institution: InstitutionId) -> usize {
        self.population[institution]
    }

    pub fn aggregate(&self, institution: InstitutionId) -> &[Option<Trait>] {
        &self.aggregate[institution * self.features..(institution + 1) * self.features]
    }

    pub fn aggregate_feature(&self, institution: InstitutionId, feature: usize) -> Option<Trait> {
        self.aggregate[institution * self.features + feature]
    }

    /// Number of features where the cell holds the institution's trait. Unset
    /// aggregate features never match.
    pub fn overlap(&self, cell: CellId, institution: InstitutionId, beliefs: &BeliefStore) -> usize {
        self.aggregate(institution)
            .iter()
            .zip(beliefs.beliefs(cell))
            .filter(|(settled, value)| **settled == Some(**value))
            .count()
    }

    /// Write `value` into the aggregate only if the feature is still unset.
    /// Returns whether anything was written.
    pub fn set_feature_if_unset(&mut self, institution: InstitutionId, feature: usize, value: Trait) -> bool {
        let slot = &mut self.aggregate[institution * self.features + feature];
        match slot {
            Some(_) => false,
            None => {
                *slot = Some(value);
                true
            }
        }
    }

    /// Overwrite an aggregate feature. Reserved for the voting process.
    pub(crate) fn settle_feature(&mut self, institution: InstitutionId, feature: usize, value: Trait) {
        self.aggregate[institution * self.features + feature] = Some(value);
    }

    /// Move `cell` from institution `from` to `to`, splicing it into the ring
    /// of `to` directly after `anchor`, which must already be a member of
    /// `to`. Constant time.
    pub fn switch_institution(
        &mut self,
        cell: CellId,
        from: InstitutionId,
        to: InstitutionId,
        anchor: CellId,
    ) -> Result<(), RingError> {
        let actual = self.membership[cell];
        if actual != from {
            return Err(RingError::MembershipMismatch {
                cell,
                expected: from,
                actual,
            });
        }
        if from == to {
            return Ok(());
        }
        if anchor == cell || self.membership[anchor] != to {
            return Err(RingError::ForeignAnchor {
                anchor,
                institution: to,
            });
        }
        self.unlink(cell, from);

        let after = self.next[anchor];
        self.prev[cell] = anchor;
        self.next[cell] = after;
        self.next[anchor] = cell;
        self.prev[after] = cell;
        self.membership[cell] = to;
        self.population[to] += 1;
        Ok(())
    }

    /// Detach `cell` into a singleton institution of its own. The new id is
    /// the cell's own index when that institution is latent, otherwise the
    /// next latent id above it. The institution being reused is latent, so
    /// its stale aggregate is cleared and re-seeded from the founder.
    pub fn found_institution(&mut self, cell: CellId, beliefs: &BeliefStore) -> Result<InstitutionId, RingError> {
        let from = self.membership[cell];
        if self.population[from] == 1 {
            return Ok(from);
        }
        let n = self.capacity();
        let fresh = (0..n)
            .map(|k| (cell + k) % n)
            .find(|&i| self.population[i] == 0)
            .ok_or(RingError::NoLatentInstitution { cell })?;
        self.unlink(cell, from);

        self.next[cell] = cell;
        self.prev[cell] = cell;
        self.head[fresh] = Some(cell);
        self.membership[cell] = fresh;
        self.population[fresh] = 1;
        for feature in 0..self.features {
            self.aggregate[fresh * self.features + feature] = None;
        }
        for (feature, value) in beliefs.beliefs(cell).iter().enumerate() {
            self.set_feature_if_unset(fresh, feature, *value);
        }
        debug!(cell, from, institution = fresh, "founded institution");
        Ok(fresh)
    }

    fn unlink(&mut self, cell: CellId, from: InstitutionId) {
        let (left, right) = (self.prev[cell], self.next[cell]);
        self.next[left] = right;
        self.prev[right] = left;
        self.population[from] -= 1;
        if self.head[from] == Some(cell) {
            self.head[from] = if self.population[from] == 0 {
                None
            } else {
                Some(right)
            };
        }
    }

    /// Walk the membership ring of `institution`.
    pub fn iterate_members(&self, institution: InstitutionId) -> Members<'_> {
        Members {
            registry: self,
            institution,
            start: self.head[institution],
            current: self.head[institution],
            seen: 0,
            population: self.population[institution],
            failed: false,
        }
    }

    /// Populated institution ids, in the order a row-major scan of the cells
    /// first meets them.
    pub fn live_institutions(&self) -> Vec<InstitutionId> {
        let mut seen = FxHashSet::default();
        self.membership
            .iter()
            .filter(|&&i| seen.insert(i))
            .copied()
            .collect()
    }

    pub fn institution_count(&self) -> usize {
        self.population.iter().filter(|&&p| p > 0).count()
    }

    pub fn largest_population(&self) -> usize {
        self.population.iter().copied().max().unwrap_or(0)
    }

    /// Check the population counters against the membership map and every
    /// populated ring against its population.
    pub fn check_consistency(&self) -> Result<(), RingError> {
        let mut counted = vec![0usize; self.capacity()];
        for &i in self.membership.iter() {
            counted[i] += 1;
        }
        for (institution, (&n, &population)) in counted.iter().zip(self.population.iter()).enumerate() {
            if n != population {
                return Err(RingError::PopulationMismatch {
                    institution,
                    counted: n,
                    population,
                });
            }
            if population > 0 {
                for member in self.iterate_members(institution) {
                    member?;
                }
            }
        }
        Ok(())
    }
}

/// Iterator over the members of one institution, following `next` links from
/// the ring head. It yields at most `population` cells and reports an error
/// instead of looping if the ring is damaged. Once an error has been yielded
/// the iterator is exhausted.
pub struct Members<'a> {
    registry: &'a InstitutionRegistry,
    institution: InstitutionId,
    start: Option<CellId>,
    current: Option<CellId>,
    seen: usize,
    population: usize,
    failed: bool,
}

impl<'a> Members<'a> {
    fn fail(&mut self, e: RingError) -> Option<Result<CellId, RingError>> {
        self.failed = true;
        Some(Err(e))
    }
}

impl<'a> Iterator for Members<'a> {
    type Item = Result<CellId, RingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let cell = match self.current {
            None => {
                if self.seen < self.population {
                    let (institution, seen, population) = (self.institution, self.seen, self.population);
                    return self.fail(RingError::ClosedEarly {
                        institution,
                        seen,
                        population,
                    });
                }
                return None;
            }
            Some(c) => c,
        };
        let r = self.registry;
        if self.seen == self.population {
            // The walk must be back at the start by now.
            let institution = self.institution;
            let population = self.population;
            return self.fail(RingError::Overlong {
                institution,
                population,
            });
        }
        let actual = r.membership[cell];
        if actual != self.institution {
            let institution = self.institution;
            return self.fail(RingError::ForeignMember {
                institution,
                cell,
                actual,
            });
        }
        let next = r.next[cell];
        if r.prev[next] != cell {
            return self.fail(RingError::Dangling { cell, next });
        }
        self.seen += 1;
        self.current = if Some(next) == self.start {
            if self.seen < self.population {
                let (institution, seen, population) = (self.institution, self.seen, self.population);
                return self.fail(RingError::ClosedEarly {
                    institution,
                    seen,
                    population,
                });
            }
            None
        } else {
            Some(next)
        };
        Some(Ok(cell))
    }
}
