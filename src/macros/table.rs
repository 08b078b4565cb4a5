//! The ordered macro table.
//!
//! Keys are applied in `order`. Text macros come first in insertion order,
//! function macros form a contiguous suffix. Undefined keys keep their slot
//! as a tombstone so ordering never shifts, and redefining a tombstoned key
//! reuses it. Every define and undefine bumps `version`, which is what makes
//! compiled function bodies stale.
//!
//! # Error Handling
//!
//! The table itself never fails. Redefinition is reported as a
//! [`DefineOutcome`]; turning that into a warning or an error is the
//! session's job.
//!
//! # Thread Safety
//!
//! Not thread-safe. Compiled bodies are shared through `Rc`, so a table
//! belongs to exactly one session on one thread.

use super::Macro;
use std::collections::HashMap;

#[derive(Debug)]
enum Slot {
    Live(Box<Macro>),
    Tombstone { function: bool },
    /// Taken out while its body is being compiled.
    Detached { function: bool },
}

impl Slot {
    fn is_function(&self) -> bool {
        match self {
            Slot::Live(mac) => mac.is_function(),
            Slot::Tombstone { function } | Slot::Detached { function } => *function,
        }
    }
}

/// How a definition related to what was already in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineOutcome {
    New,
    /// Same key, same body.
    Duplicate,
    /// Same key, different body.
    Redefined,
}

/// Ordered storage for every macro, built-in directives included.
///
/// | Method       | Effect on order                    | Bumps version |
/// |--------------|------------------------------------|---------------|
/// | `define`     | new key appended to its section    | yes           |
/// | `undefine`   | slot kept as a tombstone           | yes           |
/// | `detach`     | slot kept, macro taken out         | no            |
/// | `reattach`   | macro put back into its slot       | no            |
#[derive(Debug, Default)]
pub struct MacroTable {
    order: Vec<String>,
    slots: HashMap<String, Slot>,
    num_funcs: usize,
    version: u64,
    next_id: usize,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Installs `mac`, replacing any live entry with the same key.
    pub fn define(&mut self, mut mac: Macro) -> DefineOutcome {
        let function = mac.is_function();
        mac.id = self.next_id;
        self.next_id += 1;
        self.version += 1;

        let outcome = match self.slots.get(&mac.key) {
            Some(Slot::Live(old)) if old.body == mac.body => DefineOutcome::Duplicate,
            Some(Slot::Live(_)) => DefineOutcome::Redefined,
            _ => DefineOutcome::New,
        };
        let previous_class = self.slots.get(&mac.key).map(Slot::is_function);
        match previous_class {
            Some(was_function) if was_function == function => {}
            Some(was_function) => {
                self.remove_from_order(&mac.key, was_function);
                self.insert_in_order(&mac.key, function);
            }
            None => self.insert_in_order(&mac.key, function),
        }
        log::debug!(
            "define {} macro '{}' (v{}, {:?})",
            mac.class_name(),
            mac.key,
            self.version,
            outcome
        );
        self.slots.insert(mac.key.clone(), Slot::Live(Box::new(mac)));
        outcome
    }

    /// Tombstones `key`. Returns the removed macro, or `None` if it was not live.
    pub fn undefine(&mut self, key: &str) -> Option<Macro> {
        let slot = self.slots.get_mut(key)?;
        if !matches!(slot, Slot::Live(_)) {
            return None;
        }
        let function = slot.is_function();
        let previous = std::mem::replace(slot, Slot::Tombstone { function });
        self.version += 1;
        log::debug!("undefine macro '{}' (v{})", key, self.version);
        match previous {
            Slot::Live(mac) => Some(*mac),
            _ => None,
        }
    }

    fn insert_in_order(&mut self, key: &str, function: bool) {
        if function {
            self.order.push(key.to_string());
            self.num_funcs += 1;
        } else {
            let at = self.order.len() - self.num_funcs;
            self.order.insert(at, key.to_string());
        }
    }

    fn remove_from_order(&mut self, key: &str, function: bool) {
        if let Some(at) = self.order.iter().position(|k| k == key) {
            self.order.remove(at);
            if function {
                self.num_funcs -= 1;
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Macro> {
        match self.slots.get(key) {
            Some(Slot::Live(mac)) => Some(mac),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Macro> {
        match self.slots.get_mut(key) {
            Some(Slot::Live(mac)) => Some(mac),
            _ => None,
        }
    }

    /// Index of `key` in application order, tombstones included.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.order.iter().position(|k| k == key)
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Takes a live macro out of the table without touching order or version.
    pub fn detach(&mut self, key: &str) -> Option<Macro> {
        let slot = self.slots.get_mut(key)?;
        if !matches!(slot, Slot::Live(_)) {
            return None;
        }
        let function = slot.is_function();
        match std::mem::replace(slot, Slot::Detached { function }) {
            Slot::Live(mac) => Some(*mac),
            _ => None,
        }
    }

    /// Puts a detached macro back. If its key was redefined or undefined in
    /// the meantime, the newer state wins and `mac` is dropped.
    pub fn reattach(&mut self, mac: Macro) {
        if let Some(slot) = self.slots.get_mut(&mac.key) {
            if matches!(slot, Slot::Detached { .. }) {
                *slot = Slot::Live(Box::new(mac));
            }
        }
    }

    /// Keys of live macros in application order.
    pub fn live_keys(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|key| matches!(self.slots.get(key.as_str()), Some(Slot::Live(_))))
            .cloned()
            .collect()
    }

    /// Live macros in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Macro> {
        self.order.iter().filter_map(|key| self.get(key))
    }

    /// Every slot in order, `None` for tombstones.
    pub fn slots(&self) -> impl Iterator<Item = (&str, Option<&Macro>)> {
        self.order.iter().map(|key| (key.as_str(), self.get(key)))
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn function_count(&self) -> usize {
        self.num_funcs
    }
}
