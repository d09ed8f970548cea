impl std::fmt::Debug for crate::beliefs::BeliefStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeliefStore")
            .field("cells", &self.cells())
            .field("features", &self.features())
            .field("traits", &self.traits())
            .finish()
    }
}

impl std::fmt::Debug for crate::institutions::InstitutionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstitutionRegistry")
            .field("institutions", &self.institution_count())
            .field("largest", &self.largest_population())
            .finish()
    }
}

impl std::fmt::Debug for crate::engine::Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("iteration", &self.iteration())
            .field("status", &self.status())
            .field("beliefs", self.beliefs())
            .field("institutions", self.institutions())
            .field("policy", &self.parameters().policy)
            .finish()
    }
}
