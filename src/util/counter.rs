use crate::Error;

/// Monotonic id allocator with a hard ceiling.
///
/// Every state and transition of the generated automaton takes its id from
/// one of these. Running past `limit` aborts compilation with
/// [`Error::AutomatonTooLarge`].
#[derive(Clone, Debug)]
pub struct ThresholdCounter {
    next: u32,
    limit: u32,
    kind: &'static str,
}

impl ThresholdCounter {
    pub fn new(limit: u32, kind: &'static str) -> Self {
        ThresholdCounter {
            next: 0,
            limit,
            kind,
        }
    }

    /// Returns the next id.
    pub fn inc(&mut self) -> Result<u32, Error> {
        if self.next >= self.limit {
            return Err(Error::AutomatonTooLarge {
                kind: self.kind,
                limit: self.limit,
            });
        }
        let id = self.next;
        self.next += 1;
        Ok(id)
    }

    /// Number of ids handed out so far.
    #[inline]
    pub fn count(&self) -> u32 {
        self.next
    }
}
