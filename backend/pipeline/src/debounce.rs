/// Ticket-based debouncer: each call takes a ticket, and when its window has
/// elapsed only the holder of the newest ticket proceeds.
#[derive(Debug, Default)]
pub struct Debouncer {
    latest: u64,
}

impl Debouncer {
    /// Take a ticket, superseding every earlier one.
    pub fn arm(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_latest(&self, ticket: u64) -> bool {
        ticket == self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_supersedes_older() {
        let mut d = Debouncer::default();
        let first = d.arm();
        assert!(d.is_latest(first));
        let second = d.arm();
        assert!(!d.is_latest(first));
        assert!(d.is_latest(second));
    }
}
