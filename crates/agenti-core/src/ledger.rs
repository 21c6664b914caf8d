/// Listings the current session has subscribed to.
///
/// Entries are only ever added; a subscription lasts for the session.
#[derive(Debug, Clone, Default)]
pub struct PurchaseLedger {
    ids: Vec<String>,
}

impl PurchaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &str) -> bool {
        self.ids.iter().any(|owned| owned == id)
    }

    /// Record a purchase. Returns false when the id was already held.
    pub fn record(&mut self, id: &str) -> bool {
        if self.has(id) {
            return false;
        }
        self.ids.push(id.to_string());
        tracing::info!(listing = id, "purchase recorded");
        true
    }

    /// Purchased ids in purchase order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_false_before_record() {
        let ledger = PurchaseLedger::new();
        for id in ["1", "2", "3", "unknown"] {
            assert!(!ledger.has(id));
        }
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut ledger = PurchaseLedger::new();
        assert!(ledger.record("3"));
        assert!(!ledger.record("3"));

        assert!(ledger.has("3"));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.ids(), &["3".to_string()]);
    }

    #[test]
    fn test_record_keeps_purchase_order() {
        let mut ledger = PurchaseLedger::new();
        ledger.record("5");
        ledger.record("1");
        ledger.record("5");
        assert_eq!(ledger.ids(), &["5".to_string(), "1".to_string()]);
        assert!(!ledger.has("2"));
    }
}
