//! Undo and redo stacks
//!
//! Both stacks hold [`HistoryEntry`] units, most recent last. The undo stack
//! is bounded by `max_size` entries; pushing past the bound evicts from the
//! bottom. A new command always invalidates the redo stack.

use crate::error::HistoryError;
use retrace_command::{BatchId, Command};
use std::collections::VecDeque;

/// One undo/redo unit: a single command or every command sharing a batch id
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    commands: Vec<Command>,
}

impl HistoryEntry {
    /// Entry holding one command
    ///
    /// # Errors
    /// [`HistoryError::Unconfirmed`] if the command has no undo payload.
    pub fn single(command: Command) -> Result<Self, HistoryError> {
        Self::batch(vec![command])
    }

    /// Entry holding several commands in execution order
    ///
    /// # Errors
    /// [`HistoryError::Empty`] for an empty list, [`HistoryError::Unconfirmed`]
    /// if any command lacks its undo payload.
    pub fn batch(commands: Vec<Command>) -> Result<Self, HistoryError> {
        if commands.is_empty() {
            return Err(HistoryError::Empty);
        }
        if let Some(unconfirmed) = commands.iter().find(|c| !c.can_undo()) {
            return Err(HistoryError::Unconfirmed(unconfirmed.id()));
        }
        Ok(Self { commands })
    }

    /// Commands in execution order
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Commands in the order an undo must reverse them
    pub fn undo_order(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().rev()
    }

    /// Commands in the order a redo must replay them
    pub fn redo_order(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Number of commands in this unit
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Always false; entries are never empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Batch id shared by the commands, if any
    #[must_use]
    pub fn batch_id(&self) -> Option<BatchId> {
        self.commands.first().and_then(Command::batch_id)
    }

    /// Description of the most recently executed command
    #[must_use]
    pub fn description(&self) -> &str {
        self.commands.last().map_or("", Command::description)
    }

    fn joins(&self, command: &Command) -> bool {
        matches!((self.batch_id(), command.batch_id()), (Some(a), Some(b)) if a == b)
    }
}

/// Bounded undo/redo history
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    max_size: usize,
}

impl History {
    /// Empty history keeping at most `max_size` undo entries
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(max_size.min(256)),
            redo: Vec::new(),
            max_size,
        }
    }

    /// Entry cap
    #[inline]
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Record a newly confirmed command
    ///
    /// Clears the redo stack. A command whose batch id matches the top entry
    /// joins that entry instead of starting a new one.
    ///
    /// # Errors
    /// [`HistoryError::Unconfirmed`] if the command has no undo payload; the
    /// history is left untouched.
    pub fn push(&mut self, command: Command) -> Result<(), HistoryError> {
        if !command.can_undo() {
            return Err(HistoryError::Unconfirmed(command.id()));
        }
        self.redo.clear();
        match self.undo.back_mut() {
            Some(top) if top.joins(&command) => top.commands.push(command),
            _ => {
                self.undo.push_back(HistoryEntry {
                    commands: vec![command],
                });
                self.enforce_cap();
            }
        }
        Ok(())
    }

    /// Record a whole confirmed unit at once
    pub fn push_entry(&mut self, entry: HistoryEntry) {
        self.redo.clear();
        self.undo.push_back(entry);
        self.enforce_cap();
    }

    /// Take the most recent undo entry
    pub fn pop_for_undo(&mut self) -> Option<HistoryEntry> {
        self.undo.pop_back()
    }

    /// Take the top undo entry if it belongs to `batch_id`
    ///
    /// Used to back out a batch whose later member failed after earlier
    /// members were recorded by separate dispatches.
    pub fn take_batch(&mut self, batch_id: BatchId) -> Option<HistoryEntry> {
        match self.undo.back() {
            Some(top) if top.batch_id() == Some(batch_id) => self.undo.pop_back(),
            _ => None,
        }
    }

    /// Take the most recent redo entry
    pub fn pop_for_redo(&mut self) -> Option<HistoryEntry> {
        self.redo.pop()
    }

    /// A reversed entry moves to the redo stack
    pub fn commit_undo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// A replayed entry moves back to the undo stack; redo is kept
    pub fn commit_redo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        self.enforce_cap();
    }

    /// Put back an entry whose undo failed
    pub fn restore_undo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
    }

    /// Put back an entry whose redo failed
    pub fn restore_redo(&mut self, entry: HistoryEntry) {
        self.redo.push(entry);
    }

    /// True if something can be undone
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// True if something can be redone
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Description of the command an undo would reverse last-in-first-out
    #[must_use]
    pub fn last_executed_description(&self) -> Option<&str> {
        self.undo.back().map(HistoryEntry::description)
    }

    /// Undo entries
    #[inline]
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Redo entries
    #[inline]
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Undo entries, oldest first
    pub fn undo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo.iter()
    }

    /// Redo entries, oldest first
    pub fn redo_entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.redo.iter()
    }

    /// Drop both stacks
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn enforce_cap(&mut self) {
        while self.undo.len() > self.max_size {
            if let Some(evicted) = self.undo.pop_front() {
                tracing::debug!(
                    description = evicted.description(),
                    commands = evicted.len(),
                    "history entry evicted"
                );
            }
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use retrace_command::RemoteReply;
    use retrace_model::{Item, ItemId};
    use std::collections::BTreeMap;

    fn confirmed(cmd: Command) -> Command {
        let mut before = BTreeMap::new();
        for id in ["a", "b", "c"] {
            before.insert(ItemId::from(id), Item::new(id, id, 1));
        }
        cmd.capture_undo(&before, &RemoteReply::empty()).unwrap();
        cmd
    }

    #[test]
    fn rejects_unconfirmed_commands() {
        let mut history = History::new(5);
        let cmd = Command::toggle("a".into());
        let id = cmd.id();
        assert_eq!(history.push(cmd), Err(HistoryError::Unconfirmed(id)));
        assert!(!history.can_undo());
    }

    #[test]
    fn push_clears_redo() {
        let mut history = History::new(5);
        history.push(confirmed(Command::toggle("a".into()))).unwrap();
        let entry = history.pop_for_undo().unwrap();
        history.commit_undo(entry);
        assert!(history.can_redo());

        history.push(confirmed(Command::toggle("b".into()))).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn same_batch_joins_top_entry() {
        let mut history = History::new(5);
        let batch = Some(BatchId::new());
        history
            .push(confirmed(Command::toggle("a".into()).with_batch(batch)))
            .unwrap();
        history
            .push(confirmed(Command::delete("b".into()).with_batch(batch)))
            .unwrap();
        history.push(confirmed(Command::toggle("c".into()))).unwrap();

        assert_eq!(history.undo_len(), 2);
        let entries: Vec<_> = history.undo_entries().map(HistoryEntry::len).collect();
        assert_eq!(entries, vec![2, 1]);
    }

    #[test]
    fn unbatched_commands_never_join() {
        let mut history = History::new(5);
        history.push(confirmed(Command::toggle("a".into()))).unwrap();
        history.push(confirmed(Command::toggle("a".into()))).unwrap();
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn eviction_drops_oldest() {
        let mut history = History::new(2);
        for id in ["a", "b", "c"] {
            history
                .push(confirmed(Command::toggle(id.into())))
                .unwrap();
        }
        assert_eq!(history.undo_len(), 2);
        let oldest = history.undo_entries().next().unwrap();
        assert_eq!(oldest.description(), "Toggle item b");
    }

    #[test]
    fn commit_redo_keeps_remaining_redo_entries() {
        let mut history = History::new(5);
        history.push(confirmed(Command::toggle("a".into()))).unwrap();
        history.push(confirmed(Command::toggle("b".into()))).unwrap();
        for _ in 0..2 {
            let entry = history.pop_for_undo().unwrap();
            history.commit_undo(entry);
        }
        let entry = history.pop_for_redo().unwrap();
        history.commit_redo(entry);

        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 1);
        assert_eq!(history.last_executed_description(), Some("Toggle item a"));
    }

    #[test]
    fn entry_orders() {
        let batch = Some(BatchId::new());
        let first = confirmed(Command::toggle("a".into()).with_batch(batch));
        let second = confirmed(Command::toggle("b".into()).with_batch(batch));
        let (first_id, second_id) = (first.id(), second.id());
        let entry = HistoryEntry::batch(vec![first, second]).unwrap();

        let undo: Vec<_> = entry.undo_order().map(Command::id).collect();
        let redo: Vec<_> = entry.redo_order().map(Command::id).collect();
        assert_eq!(undo, vec![second_id, first_id]);
        assert_eq!(redo, vec![first_id, second_id]);
        assert_eq!(entry.batch_id(), batch);
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert_eq!(HistoryEntry::batch(Vec::new()).unwrap_err(), HistoryError::Empty);
    }
}
