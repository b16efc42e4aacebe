//! Memory accounting for resident chunks
//!
//! Tracks bytes held by resident chunks against a byte budget. The paged
//! volume uses the pressure value for logging and the chunk count limit for
//! eviction decisions.

/// Memory budget manager
#[derive(Clone, Debug)]
pub struct MemoryBudget {
    /// Maximum memory allowed (bytes)
    budget_bytes: usize,
    /// Currently used memory (bytes)
    used_bytes: usize,
}

impl MemoryBudget {
    /// Create a new memory budget of `budget_bytes`
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            used_bytes: 0,
        }
    }

    /// Add memory usage
    pub fn add(&mut self, bytes: usize) {
        self.used_bytes = self.used_bytes.saturating_add(bytes);
    }

    /// Remove memory usage
    pub fn remove(&mut self, bytes: usize) {
        self.used_bytes = self.used_bytes.saturating_sub(bytes);
    }

    /// Get current memory usage in bytes
    pub fn used(&self) -> usize {
        self.used_bytes
    }

    pub fn budget(&self) -> usize {
        self.budget_bytes
    }

    /// Get available memory in bytes
    pub fn available(&self) -> usize {
        self.budget_bytes.saturating_sub(self.used_bytes)
    }

    /// Get memory pressure (0.0 to 1.0+)
    ///
    /// Values above 1.0 indicate over-budget.
    pub fn pressure(&self) -> f32 {
        if self.budget_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f32 / self.budget_bytes as f32
    }

    /// Check if an allocation of `bytes` fits in the remaining budget
    pub fn can_load(&self, bytes: usize) -> bool {
        self.available() >= bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn test_budget_new() {
        let budget = MemoryBudget::new(512 * MB);
        assert_eq!(budget.used(), 0);
        assert_eq!(budget.available(), 512 * MB);
    }

    #[test]
    fn test_budget_add_remove() {
        let mut budget = MemoryBudget::new(512 * MB);
        budget.add(100 * MB);
        assert_eq!(budget.available(), 412 * MB);
        budget.remove(50 * MB);
        assert_eq!(budget.used(), 50 * MB);
    }

    #[test]
    fn test_budget_saturating_ops() {
        let mut budget = MemoryBudget::new(512 * MB);

        // Removing more than used saturates at 0
        budget.remove(1000 * MB);
        assert_eq!(budget.used(), 0);

        budget.add(usize::MAX);
        budget.add(100);
        assert_eq!(budget.used(), usize::MAX);
    }

    #[test]
    fn test_budget_pressure() {
        let mut budget = MemoryBudget::new(100 * MB);
        assert_eq!(budget.pressure(), 0.0);

        budget.add(50 * MB);
        assert!((budget.pressure() - 0.5).abs() < 0.01);

        budget.add(60 * MB);
        assert!(budget.pressure() > 1.0);
        assert_eq!(MemoryBudget::new(0).pressure(), 0.0);
    }

    #[test]
    fn test_budget_can_load() {
        let mut budget = MemoryBudget::new(100 * MB);
        assert!(budget.can_load(10 * MB));
        budget.add(95 * MB);
        assert!(!budget.can_load(10 * MB));
        assert!(budget.can_load(4 * MB));
    }
}
