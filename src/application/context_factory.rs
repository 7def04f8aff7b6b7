//! Registry of the media contexts an engine processes

use crate::domain::shared::{ContextId, MpfError, Result, TerminationId};
use crate::infrastructure::media::context::MediaContext;
use tracing::info;

/// Owns active contexts in creation order
pub struct ContextFactory {
    capacity: usize,
    contexts: Vec<MediaContext>,
}

impl ContextFactory {
    /// `capacity` is the number of termination slots per context
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            contexts: Vec::new(),
        }
    }

    pub fn create(&mut self, name: &str) -> ContextId {
        let context = MediaContext::new(name, self.capacity);
        let id = context.id();
        info!("Create media context {} [{}]", name, id);
        self.contexts.push(context);
        id
    }

    /// Remove a context from the registry; the caller disposes of its
    /// terminations
    pub fn remove(&mut self, id: ContextId) -> Result<MediaContext> {
        let index = self
            .contexts
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| MpfError::NotFound(format!("context {}", id)))?;
        let context = self.contexts.remove(index);
        info!("Remove media context {} [{}]", context.name(), id);
        Ok(context)
    }

    pub fn get(&self, id: ContextId) -> Result<&MediaContext> {
        self.contexts
            .iter()
            .find(|c| c.id() == id)
            .ok_or_else(|| MpfError::NotFound(format!("context {}", id)))
    }

    pub fn get_mut(&mut self, id: ContextId) -> Result<&mut MediaContext> {
        self.contexts
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| MpfError::NotFound(format!("context {}", id)))
    }

    /// Context holding a termination
    pub fn find_termination(&mut self, id: TerminationId) -> Option<&mut MediaContext> {
        self.contexts.iter_mut().find(|c| c.slot_of(id).is_some())
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Run one tick of every context
    pub fn process(&mut self) {
        for context in self.contexts.iter_mut() {
            context.process();
        }
    }

    /// Take every context out, e.g. on shutdown
    pub fn drain(&mut self) -> Vec<MediaContext> {
        std::mem::take(&mut self.contexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_remove() {
        let mut factory = ContextFactory::new(3);
        let a = factory.create("a");
        let b = factory.create("b");
        assert_eq!(factory.len(), 2);
        assert_eq!(factory.get(b).unwrap().capacity(), 3);

        let removed = factory.remove(a).unwrap();
        assert_eq!(removed.name(), "a");
        assert!(matches!(factory.remove(a), Err(MpfError::NotFound(_))));
        assert_eq!(factory.drain().len(), 1);
        assert!(factory.is_empty());
    }
}
