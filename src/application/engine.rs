//! Media engine
//!
//! The engine owns every media context and runs on a single task. Each
//! scheduler tick it dispatches expired timers to their terminations and
//! processes every context once. Structural changes arrive as commands on a
//! bounded queue and are applied between ticks, so no media state is ever
//! shared across threads.

use super::context_factory::ContextFactory;
use super::scheduler::Scheduler;
use crate::config::EngineConfig;
use crate::domain::shared::{ContextId, MpfError, Result, SlotId, TerminationId};
use crate::infrastructure::media::codec::CodecManager;
use crate::infrastructure::media::context::MediaContext;
use crate::infrastructure::media::termination::{MediaEnv, Termination, TerminationDescriptor};
use crate::infrastructure::media::timer::TimerId;
use crate::infrastructure::metrics;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests executed on the engine task
pub enum EngineCommand {
    ContextCreate {
        name: String,
        reply: Reply<ContextId>,
    },
    ContextDestroy {
        context: ContextId,
        reply: Reply<()>,
    },
    TerminationAdd {
        context: ContextId,
        termination: Box<dyn Termination>,
        descriptor: Option<TerminationDescriptor>,
        reply: Reply<(TerminationId, Option<TerminationDescriptor>)>,
    },
    TerminationModify {
        termination: TerminationId,
        descriptor: TerminationDescriptor,
        reply: Reply<TerminationDescriptor>,
    },
    TerminationSubtract {
        termination: TerminationId,
        reply: Reply<()>,
    },
    AssociationAdd {
        t1: TerminationId,
        t2: TerminationId,
        reply: Reply<()>,
    },
    AssociationRemove {
        t1: TerminationId,
        t2: TerminationId,
        reply: Reply<()>,
    },
    AssociationsReset {
        context: ContextId,
        reply: Reply<()>,
    },
    TopologyApply {
        context: ContextId,
        reply: Reply<()>,
    },
    TopologyDestroy {
        context: ContextId,
        reply: Reply<()>,
    },
    Shutdown,
}

impl EngineCommand {
    fn name(&self) -> &'static str {
        match self {
            EngineCommand::ContextCreate { .. } => "context-create",
            EngineCommand::ContextDestroy { .. } => "context-destroy",
            EngineCommand::TerminationAdd { .. } => "termination-add",
            EngineCommand::TerminationModify { .. } => "termination-modify",
            EngineCommand::TerminationSubtract { .. } => "termination-subtract",
            EngineCommand::AssociationAdd { .. } => "association-add",
            EngineCommand::AssociationRemove { .. } => "association-remove",
            EngineCommand::AssociationsReset { .. } => "associations-reset",
            EngineCommand::TopologyApply { .. } => "topology-apply",
            EngineCommand::TopologyDestroy { .. } => "topology-destroy",
            EngineCommand::Shutdown => "shutdown",
        }
    }
}

/// Media engine task state
pub struct Engine {
    codecs: Arc<CodecManager>,
    contexts: ContextFactory,
    scheduler: Scheduler,
    commands: mpsc::Receiver<EngineCommand>,
}

impl Engine {
    pub fn new(config: &EngineConfig, codecs: Arc<CodecManager>) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(config.command_queue.max(1));
        let engine = Self {
            codecs,
            contexts: ContextFactory::new(config.context_capacity),
            scheduler: Scheduler::new(config.tick_ms),
            commands: rx,
        };
        (engine, EngineHandle { commands: tx })
    }

    /// Start the engine on its own task
    pub fn spawn(config: &EngineConfig, codecs: Arc<CodecManager>) -> (EngineHandle, JoinHandle<()>) {
        let (engine, handle) = Self::new(config, codecs);
        let task = tokio::spawn(engine.run());
        (handle, task)
    }

    /// Process ticks and commands until shutdown or until every handle is
    /// dropped
    pub async fn run(mut self) {
        info!("Media engine started [tick {} ms]", self.scheduler.tick_ms());
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.dispatch(command),
                },
                expired = self.scheduler.tick() => self.on_tick(expired),
            }
        }
        self.shutdown();
        info!("Media engine stopped after {} ticks", self.scheduler.ticks());
    }

    fn on_tick(&mut self, expired: Vec<(TimerId, TerminationId)>) {
        for (timer, owner) in expired {
            let mut env = MediaEnv {
                timers: self.scheduler.timers_mut(),
                codecs: &self.codecs,
            };
            let Some(context) = self.contexts.find_termination(owner) else {
                debug!("Drop {} of detached termination {}", timer, owner);
                continue;
            };
            if let Some(termination) = context.slot_of(owner).and_then(|slot| context.termination_mut(slot)) {
                termination.on_timer(timer, &mut env);
            }
        }

        self.contexts.process();
        metrics::record_engine_tick();
        metrics::update_active_contexts(self.contexts.len());
    }

    fn dispatch(&mut self, command: EngineCommand) {
        debug!("Process engine command {}", command.name());
        match command {
            EngineCommand::ContextCreate { name, reply } => {
                let _ = reply.send(Ok(self.contexts.create(&name)));
            }
            EngineCommand::ContextDestroy { context, reply } => {
                let _ = reply.send(self.context_destroy(context));
            }
            EngineCommand::TerminationAdd {
                context,
                termination,
                descriptor,
                reply,
            } => {
                let _ = reply.send(self.termination_add(context, termination, descriptor));
            }
            EngineCommand::TerminationModify {
                termination,
                descriptor,
                reply,
            } => {
                let _ = reply.send(self.termination_modify(termination, descriptor));
            }
            EngineCommand::TerminationSubtract { termination, reply } => {
                let _ = reply.send(self.termination_subtract(termination));
            }
            EngineCommand::AssociationAdd { t1, t2, reply } => {
                let _ = reply.send(self.with_pair(t1, t2, |context, s1, s2| context.association_add(s1, s2)));
            }
            EngineCommand::AssociationRemove { t1, t2, reply } => {
                let _ = reply.send(self.with_pair(t1, t2, |context, s1, s2| context.association_remove(s1, s2)));
            }
            EngineCommand::AssociationsReset { context, reply } => {
                let result = self.contexts.get_mut(context).map(MediaContext::associations_reset);
                let _ = reply.send(result);
            }
            EngineCommand::TopologyApply { context, reply } => {
                let codecs = &self.codecs;
                let result = self
                    .contexts
                    .get_mut(context)
                    .and_then(|context| context.topology_apply(codecs));
                let _ = reply.send(result);
            }
            EngineCommand::TopologyDestroy { context, reply } => {
                let result = self.contexts.get_mut(context).map(MediaContext::topology_destroy);
                let _ = reply.send(result);
            }
            EngineCommand::Shutdown => {}
        }
    }

    fn context_destroy(&mut self, id: ContextId) -> Result<()> {
        let context = self.contexts.remove(id)?;
        self.context_release(context);
        Ok(())
    }

    /// Subtract and destroy every termination left in a context
    fn context_release(&mut self, mut context: MediaContext) {
        context.topology_destroy();
        let slots: Vec<SlotId> = context.terminations().map(|(slot, _)| slot).collect();
        for slot in slots {
            match context.termination_subtract(slot) {
                Ok(termination) => self.termination_release(termination),
                Err(e) => warn!("Failed to subtract {} from {}: {}", slot, context.name(), e),
            }
        }
    }

    fn termination_release(&mut self, mut termination: Box<dyn Termination>) {
        let mut env = MediaEnv {
            timers: self.scheduler.timers_mut(),
            codecs: &self.codecs,
        };
        if let Err(e) = termination.subtract(&mut env) {
            warn!("Failed to subtract termination {}: {}", termination.name(), e);
        }
        if let Err(e) = termination.destroy() {
            warn!("Failed to destroy termination {}: {}", termination.name(), e);
        }
    }

    fn termination_add(
        &mut self,
        context_id: ContextId,
        mut termination: Box<dyn Termination>,
        mut descriptor: Option<TerminationDescriptor>,
    ) -> Result<(TerminationId, Option<TerminationDescriptor>)> {
        let room = self.contexts.get(context_id).and_then(|context| {
            if context.count() < context.capacity() {
                Ok(())
            } else {
                Err(MpfError::CapacityExceeded(format!(
                    "context {} holds at most {} terminations",
                    context.name(),
                    context.capacity()
                )))
            }
        });
        if let Err(e) = room {
            warn!("Reject termination {}: {}", termination.name(), e);
            self.termination_release(termination);
            return Err(e);
        }

        let mut env = MediaEnv {
            timers: self.scheduler.timers_mut(),
            codecs: &self.codecs,
        };
        if let Err(e) = termination.add(descriptor.as_mut(), &mut env) {
            error!("Failed to add termination {}: {}", termination.name(), e);
            self.termination_release(termination);
            return Err(e);
        }

        let id = termination.id();
        self.contexts.get_mut(context_id)?.termination_add(termination)?;
        Ok((id, descriptor))
    }

    fn termination_modify(
        &mut self,
        id: TerminationId,
        mut descriptor: TerminationDescriptor,
    ) -> Result<TerminationDescriptor> {
        let mut env = MediaEnv {
            timers: self.scheduler.timers_mut(),
            codecs: &self.codecs,
        };
        let context = self
            .contexts
            .find_termination(id)
            .ok_or_else(|| MpfError::NotFound(format!("termination {}", id)))?;
        let slot = context
            .slot_of(id)
            .ok_or_else(|| MpfError::NotFound(format!("termination {}", id)))?;

        // Streams are reopened with the renegotiated formats
        let applied = context.is_applied();
        if applied {
            context.topology_destroy();
        }
        let result = match context.termination_mut(slot) {
            Some(termination) => termination.modify(&mut descriptor, &mut env),
            None => Err(MpfError::NotFound(format!("termination {}", id))),
        };
        if applied {
            context.topology_apply(env.codecs)?;
        }
        result.map(|_| descriptor)
    }

    fn termination_subtract(&mut self, id: TerminationId) -> Result<()> {
        let context = self
            .contexts
            .find_termination(id)
            .ok_or_else(|| MpfError::NotFound(format!("termination {}", id)))?;
        let slot = context
            .slot_of(id)
            .ok_or_else(|| MpfError::NotFound(format!("termination {}", id)))?;

        let applied = context.is_applied();
        let termination = context.termination_subtract(slot)?;
        if applied && !context.is_empty() {
            context.topology_apply(&self.codecs)?;
        }
        self.termination_release(termination);
        Ok(())
    }

    fn with_pair<F>(&mut self, t1: TerminationId, t2: TerminationId, op: F) -> Result<()>
    where
        F: FnOnce(&mut MediaContext, SlotId, SlotId) -> Result<()>,
    {
        let context = self
            .contexts
            .find_termination(t1)
            .ok_or_else(|| MpfError::NotFound(format!("termination {}", t1)))?;
        let (Some(s1), Some(s2)) = (context.slot_of(t1), context.slot_of(t2)) else {
            return Err(MpfError::InvalidOperation(format!(
                "terminations {} and {} are not in the same context",
                t1, t2
            )));
        };
        op(context, s1, s2)
    }

    fn shutdown(&mut self) {
        for context in self.contexts.drain() {
            self.context_release(context);
        }
    }
}

/// Cloneable client of the engine task
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> EngineCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| MpfError::EngineStopped)?;
        rx.await.map_err(|_| MpfError::EngineStopped)?
    }

    pub async fn context_create(&self, name: impl Into<String>) -> Result<ContextId> {
        let name = name.into();
        self.request(|reply| EngineCommand::ContextCreate { name, reply }).await
    }

    pub async fn context_destroy(&self, context: ContextId) -> Result<()> {
        self.request(|reply| EngineCommand::ContextDestroy { context, reply })
            .await
    }

    /// Add a termination to a context
    ///
    /// Returns the termination id and the descriptor completed with the
    /// negotiated local side.
    pub async fn termination_add(
        &self,
        context: ContextId,
        termination: Box<dyn Termination>,
        descriptor: Option<TerminationDescriptor>,
    ) -> Result<(TerminationId, Option<TerminationDescriptor>)> {
        self.request(|reply| EngineCommand::TerminationAdd {
            context,
            termination,
            descriptor,
            reply,
        })
        .await
    }

    pub async fn termination_modify(
        &self,
        termination: TerminationId,
        descriptor: TerminationDescriptor,
    ) -> Result<TerminationDescriptor> {
        self.request(|reply| EngineCommand::TerminationModify {
            termination,
            descriptor,
            reply,
        })
        .await
    }

    pub async fn termination_subtract(&self, termination: TerminationId) -> Result<()> {
        self.request(|reply| EngineCommand::TerminationSubtract { termination, reply })
            .await
    }

    pub async fn association_add(&self, t1: TerminationId, t2: TerminationId) -> Result<()> {
        self.request(|reply| EngineCommand::AssociationAdd { t1, t2, reply })
            .await
    }

    pub async fn association_remove(&self, t1: TerminationId, t2: TerminationId) -> Result<()> {
        self.request(|reply| EngineCommand::AssociationRemove { t1, t2, reply })
            .await
    }

    pub async fn associations_reset(&self, context: ContextId) -> Result<()> {
        self.request(|reply| EngineCommand::AssociationsReset { context, reply })
            .await
    }

    pub async fn topology_apply(&self, context: ContextId) -> Result<()> {
        self.request(|reply| EngineCommand::TopologyApply { context, reply })
            .await
    }

    pub async fn topology_destroy(&self, context: ContextId) -> Result<()> {
        self.request(|reply| EngineCommand::TopologyDestroy { context, reply })
            .await
    }

    /// Ask the engine to stop; pending commands are dropped
    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| MpfError::EngineStopped)
    }
}
