//! Per-path signal tables.

use std::collections::HashMap;

use crate::signal::Signal;

use super::PropertyEvent;

/// The three notification families a path can be observed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SignalFamily {
    Added,
    Changed,
    Removed,
}

impl SignalFamily {
    pub(crate) const ALL: [Self; 3] = [Self::Added, Self::Changed, Self::Removed];
}

/// Lazily created per-path signals, one table per family.
#[derive(Default)]
pub(crate) struct SignalRegistry {
    added: HashMap<String, Signal<PropertyEvent>>,
    changed: HashMap<String, Signal<PropertyEvent>>,
    removed: HashMap<String, Signal<PropertyEvent>>,
}

impl SignalRegistry {
    fn table(&self, family: SignalFamily) -> &HashMap<String, Signal<PropertyEvent>> {
        match family {
            SignalFamily::Added => &self.added,
            SignalFamily::Changed => &self.changed,
            SignalFamily::Removed => &self.removed,
        }
    }

    fn table_mut(&mut self, family: SignalFamily) -> &mut HashMap<String, Signal<PropertyEvent>> {
        match family {
            SignalFamily::Added => &mut self.added,
            SignalFamily::Changed => &mut self.changed,
            SignalFamily::Removed => &mut self.removed,
        }
    }

    pub(crate) fn get(&self, family: SignalFamily, path: &str) -> Option<Signal<PropertyEvent>> {
        self.table(family).get(path).cloned()
    }

    pub(crate) fn contains(&self, family: SignalFamily, path: &str) -> bool {
        self.table(family).contains_key(path)
    }

    /// Inserts a fresh signal for `path`.
    pub(crate) fn insert(&mut self, family: SignalFamily, path: &str, signal: Signal<PropertyEvent>) {
        self.table_mut(family).insert(path.to_owned(), signal);
    }

    /// Drops the signal at `path` if nobody can observe it any more.
    ///
    /// A signal is kept while it has callbacks or while a handle on it lives
    /// outside of the registry.
    pub(crate) fn release_if_idle(&mut self, family: SignalFamily, path: &str) -> Option<Signal<PropertyEvent>> {
        let table = self.table_mut(family);
        let idle = table
            .get(path)
            .is_some_and(|signal| signal.num_callbacks() == 0 && signal.handle_count() == 1);
        if idle {
            table.remove(path)
        } else {
            None
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }
}
