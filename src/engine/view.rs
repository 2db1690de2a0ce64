use log::debug;

/// Issued when a load starts; only the newest ticket may commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

/// Hands out strictly increasing tickets.
#[derive(Clone, Debug, Default)]
pub struct Generation {
    issued: u64,
}

impl Generation {
    pub fn next(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }
}

/// Holds the last committed value of a view. A response that resolves after
/// a newer load was started is dropped instead of overwriting the view.
#[derive(Clone, Debug)]
pub struct ViewSlot<T> {
    generation: Generation,
    value: Option<T>,
}

impl<T> Default for ViewSlot<T> {
    fn default() -> Self {
        Self {
            generation: Generation::default(),
            value: None,
        }
    }
}

impl<T> ViewSlot<T> {
    pub fn begin(&mut self) -> Ticket {
        self.generation.next()
    }

    pub fn commit(&mut self, ticket: Ticket, value: T) -> bool {
        if !self.generation.is_current(ticket) {
            debug!("dropping stale view result {:?}", ticket);
            return false;
        }
        self.value = Some(value);
        true
    }

    pub fn current(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }
}

/// What a view renders: the selection it was built for and its rows. A new
/// selection makes a new model; nothing mutates a committed one.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewModel<T> {
    pub selection: super::filters::Selection,
    pub rows: T,
}

impl<T> ViewModel<T> {
    pub fn new(selection: super::filters::Selection, rows: T) -> Self {
        Self { selection, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn older_response_cannot_overwrite_newer() {
        let mut slot: ViewSlot<&str> = ViewSlot::default();
        let first = slot.begin();
        let second = slot.begin();
        assert!(slot.commit(second, "new"));
        assert!(!slot.commit(first, "old"));
        assert_eq!(slot.current(), Some(&"new"));
    }

    #[test]
    fn pending_load_supersedes_committed_ticket() {
        let mut slot: ViewSlot<u32> = ViewSlot::default();
        let t = slot.begin();
        assert!(slot.commit(t, 1));
        let _pending = slot.begin();
        assert!(!slot.commit(t, 2));
        assert_eq!(slot.take(), Some(1));
    }
}
