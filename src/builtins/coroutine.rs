//! The Coroutine class
//!
//! A coroutine runs its function on a dedicated thread and hands control
//! back and forth with the resuming thread over a pair of channels, so only
//! one side runs at a time. The function is called as
//! `function(coroutine, first_resume_value)`; each `yield(value)` makes the
//! pending `resume` return `value`, and the next `resume(arg)` makes that
//! `yield` return `arg`. When the function returns, the pending `resume`
//! returns its result and the coroutine has exited.
//!
//! `dispose` aborts a suspended coroutine: its pending `yield` fails and the
//! thread unwinds. A suspended coroutine that is never disposed keeps its
//! thread until the coroutine object is invalidated.

use super::method;
use crate::engine::Engine;
use crate::error::{RtResult, RuntimeError, TemporaryException};
use crate::runtime::class::{CoreClasses, call_super};
use crate::runtime::function::{Args, CallInfo, NO_ARGS};
use crate::runtime::object::ObjectRef;
use crate::runtime::operate::Dispatch;
use crate::runtime::sync;
use crate::value::Variant;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    NotStarted,
    Running,
    Suspended,
    Exited,
    Disposed,
}

enum Resume {
    Value(Variant),
    Abort,
}

enum Transfer {
    Yielded(Variant),
    Finished(RtResult<Variant>),
}

/// Channel ends used by the resuming side
struct Resumer {
    to_worker: Sender<Resume>,
    from_worker: Receiver<Transfer>,
    handle: JoinHandle<()>,
}

/// Channel ends used by `yield` on the coroutine thread
struct WorkerLink {
    to_caller: Sender<Transfer>,
    from_caller: Receiver<Resume>,
    thread: ThreadId,
}

/// Native state of Coroutine instances
pub struct CoroutineInstance {
    state: Mutex<CoroutineState>,
    function: Mutex<Variant>,
    resumer: Mutex<Option<Resumer>>,
    worker: Mutex<Option<WorkerLink>>,
}

fn aborted() -> TemporaryException {
    TemporaryException::coroutine_exited()
}

impl Default for CoroutineInstance {
    fn default() -> Self {
        CoroutineInstance {
            state: Mutex::new(CoroutineState::NotStarted),
            function: Mutex::new(Variant::Void),
            resumer: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }
}

impl CoroutineInstance {
    pub fn state(&self) -> CoroutineState {
        *sync::lock(&self.state)
    }

    /// Check if the coroutine has started and not yet exited
    pub fn is_alive(&self) -> bool {
        matches!(self.state(), CoroutineState::Running | CoroutineState::Suspended)
    }

    fn set_state(&self, state: CoroutineState) {
        *sync::lock(&self.state) = state;
    }

    /// Run the coroutine until it yields or finishes
    fn resume(&self, engine: &Engine, coroutine: &Variant, arg: Variant) -> RtResult<Variant> {
        {
            let mut state = sync::lock(&self.state);
            match *state {
                CoroutineState::Exited => return Err(TemporaryException::coroutine_exited().into()),
                CoroutineState::Disposed => {
                    return Err(TemporaryException::inaccessible_resource("coroutine").into());
                }
                CoroutineState::Running => return Err(TemporaryException::coroutine_running().into()),
                CoroutineState::NotStarted => self.spawn(engine, coroutine, arg)?,
                CoroutineState::Suspended => {
                    let sent = sync::lock(&self.resumer)
                        .as_ref()
                        .is_some_and(|r| r.to_worker.send(Resume::Value(arg)).is_ok());
                    if !sent {
                        *state = CoroutineState::Exited;
                        return Err(TemporaryException::coroutine_exited().into());
                    }
                }
            }
            *state = CoroutineState::Running;
        }
        self.wait()
    }

    fn spawn(&self, engine: &Engine, coroutine: &Variant, arg: Variant) -> RtResult<()> {
        let (to_worker, from_caller) = mpsc::channel();
        let (to_caller, from_worker) = mpsc::channel();
        let function = sync::lock(&self.function).clone();
        let finished = to_caller.clone();
        let engine = engine.clone();
        let coroutine = coroutine.clone();

        let mut builder = thread::Builder::new().name("risse-coroutine".to_string());
        if let Some(size) = engine.config().thread_stack_size {
            builder = builder.stack_size(size);
        }
        // hold the link slot so an early yield waits for the link
        let mut link = sync::lock(&self.worker);
        let handle = builder
            .spawn(move || {
                let result = function.call(&engine, &Args::from([coroutine, arg]));
                if let Err(e) = &result {
                    if e.to_temporary() != Some(aborted()) {
                        log::warn!("coroutine terminated by unhandled exception: {}", e);
                    }
                }
                let _ = finished.send(Transfer::Finished(result));
            })
            .map_err(|e| {
                log::error!("could not spawn coroutine thread: {}", e);
                TemporaryException::could_not_create_coroutine()
            })?;
        *link = Some(WorkerLink {
            to_caller,
            from_caller,
            thread: handle.thread().id(),
        });
        *sync::lock(&self.resumer) = Some(Resumer {
            to_worker,
            from_worker,
            handle,
        });
        Ok(())
    }

    /// Block until the coroutine thread hands control back
    fn wait(&self) -> RtResult<Variant> {
        let message = sync::lock(&self.resumer)
            .as_ref()
            .and_then(|r| r.from_worker.recv().ok());
        match message {
            Some(Transfer::Yielded(value)) => {
                self.set_state(CoroutineState::Suspended);
                Ok(value)
            }
            Some(Transfer::Finished(result)) => {
                self.finish(CoroutineState::Exited);
                result
            }
            None => {
                self.finish(CoroutineState::Exited);
                Err(TemporaryException::coroutine_exited().into())
            }
        }
    }

    fn finish(&self, state: CoroutineState) {
        if let Some(resumer) = sync::lock(&self.resumer).take() {
            drop(resumer.to_worker);
            if resumer.handle.join().is_err() {
                log::error!("coroutine thread panicked");
            }
        }
        self.set_state(state);
    }

    /// Abort a suspended coroutine, or forget one that never ran
    fn dispose(&self) -> RtResult<()> {
        let previous = {
            let mut state = sync::lock(&self.state);
            let previous = *state;
            if previous == CoroutineState::Running {
                return Err(TemporaryException::coroutine_running().into());
            }
            *state = CoroutineState::Disposed;
            previous
        };
        if previous == CoroutineState::Suspended {
            let resumer = sync::lock(&self.resumer).take();
            if let Some(resumer) = resumer {
                // the function may catch the abort and yield again
                while resumer.to_worker.send(Resume::Abort).is_ok() {
                    match resumer.from_worker.recv() {
                        Ok(Transfer::Yielded(_)) => continue,
                        Ok(Transfer::Finished(_)) | Err(_) => break,
                    }
                }
                drop(resumer.to_worker);
                if resumer.handle.join().is_err() {
                    log::error!("coroutine thread panicked");
                }
            }
            log::debug!("coroutine disposed while suspended");
        }
        Ok(())
    }
}

/// Hand `value` to the resuming side and wait to be resumed
fn do_yield(call: &CallInfo<'_>, value: Variant) -> RtResult<Variant> {
    let id = call.engine.builtins().ids.coroutine;
    let instance = call.native::<CoroutineInstance>(id)?;
    let link = {
        let mut slot = sync::lock(&instance.worker);
        match slot.as_ref() {
            Some(link) if link.thread == thread::current().id() => slot.take(),
            _ => None,
        }
    };
    let Some(link) = link else {
        return Err(match instance.state() {
            CoroutineState::NotStarted => TemporaryException::coroutine_not_started(),
            CoroutineState::Exited | CoroutineState::Disposed => TemporaryException::coroutine_exited(),
            _ => TemporaryException::coroutine_not_running(),
        }
        .into());
    };
    // not holding the instance while suspended lets invalidation abort us
    drop(instance);

    if link.to_caller.send(Transfer::Yielded(value)).is_err() {
        return Err(aborted().into());
    }
    let resumed = link.from_caller.recv();
    if let Some(instance) = call.this.as_object().and_then(|o| o.native::<CoroutineInstance>(id)) {
        *sync::lock(&instance.worker) = Some(link);
    }
    match resumed {
        Ok(Resume::Value(arg)) => Ok(arg),
        Ok(Resume::Abort) | Err(_) => Err(RuntimeError::from(aborted())),
    }
}

fn state(call: &CallInfo<'_>) -> RtResult<Arc<CoroutineInstance>> {
    call.native::<CoroutineInstance>(call.engine.builtins().ids.coroutine)
}

pub(super) fn register(core: &CoreClasses) -> ObjectRef {
    let class = core.builtin_class("Coroutine", &core.object_class);

    core.bind_function(&class, "construct", method(), |call| {
        let id = call.engine.builtins().ids.coroutine;
        call.this_object()?.set_native(id, Arc::new(CoroutineInstance::default()))?;
        Ok(Variant::Void)
    });

    // initialize(function): the function as the single block argument or,
    // failing that, the single ordinary argument
    core.bind_function(&class, "initialize", method(), |call| {
        let coroutine_class = &call.engine.builtins().coroutine_class;
        call_super(call.engine, coroutine_class, "initialize", call.this, &NO_ARGS)?;
        let function = if call.args.block_len() > 0 {
            call.args.expect_block_count(1, Some(1))?;
            call.args.block(0).clone()
        } else {
            call.args.expect_count(1, Some(1))?;
            call.arg(0).clone()
        };
        *sync::lock(&state(call)?.function) = function;
        Ok(Variant::Void)
    });

    for name in ["resume", "run"] {
        core.bind_function(&class, name, method(), |call| {
            call.args.expect_count(0, Some(1))?;
            state(call)?.resume(call.engine, call.this, call.arg(0).clone())
        });
    }
    core.bind_function(&class, "yield", method(), |call| {
        call.args.expect_count(0, Some(1))?;
        do_yield(call, call.arg(0).clone())
    });
    for name in ["dispose", "exit"] {
        core.bind_function(&class, name, method(), |call| {
            state(call)?.dispose()?;
            Ok(Variant::Void)
        });
    }
    core.bind_getter(&class, "alive", |call| Ok(Variant::Boolean(state(call)?.is_alive())));

    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn coroutine(engine: &Engine, function: ObjectRef) -> Variant {
        Variant::object(engine.builtins().coroutine_class.clone())
            .create_new(engine, &Args::from([Variant::object(function)]))
            .unwrap()
    }

    fn resume(engine: &Engine, co: &Variant, arg: Variant) -> RtResult<Variant> {
        co.invoke(engine, "resume", &Args::from([arg]))
    }

    #[test]
    fn test_generator_protocol() {
        let engine = Engine::new();
        // yields its argument + 1 until it is resumed with 0
        let body = engine.new_function("body", |call| {
            let co = call.arg(0).clone();
            let mut value = call.arg(1).to_integer();
            while value != 0 {
                value = co
                    .invoke(call.engine, "yield", &Args::from([Variant::from(value + 1)]))?
                    .to_integer();
            }
            Ok(Variant::from("done"))
        });
        let co = coroutine(&engine, body);
        assert!(!co.get_property(&engine, "alive").unwrap().to_bool());
        assert_eq!(resume(&engine, &co, Variant::from(1)).unwrap(), Variant::from(2));
        assert!(co.get_property(&engine, "alive").unwrap().to_bool());
        assert_eq!(resume(&engine, &co, Variant::from(10)).unwrap(), Variant::from(11));
        assert_eq!(resume(&engine, &co, Variant::from(0)).unwrap(), Variant::from("done"));
        assert!(!co.get_property(&engine, "alive").unwrap().to_bool());

        let err = resume(&engine, &co, Variant::Void).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coroutine);
        assert_eq!(err.message(), "coroutine has already exited");
    }

    #[test]
    fn test_yield_outside_coroutine() {
        let engine = Engine::new();
        let body = engine.new_function("body", |_| Ok(Variant::Void));
        let co = coroutine(&engine, body);
        let err = co.invoke(&engine, "yield", &NO_ARGS).unwrap_err();
        assert_eq!(err.message(), "coroutine has not started yet");
    }

    #[test]
    fn test_resume_from_inside_is_refused() {
        let engine = Engine::new();
        let body = engine.new_function("body", |call| {
            let co = call.arg(0).clone();
            let err = co.invoke(call.engine, "resume", &NO_ARGS).unwrap_err();
            Ok(Variant::String(err.message()))
        });
        let co = coroutine(&engine, body);
        assert_eq!(
            resume(&engine, &co, Variant::Void).unwrap(),
            Variant::from("coroutine is currently running")
        );
    }

    #[test]
    fn test_dispose_suspended() {
        let engine = Engine::new();
        let body = engine.new_function("body", |call| {
            let co = call.arg(0).clone();
            loop {
                co.invoke(call.engine, "yield", &NO_ARGS)?;
            }
        });
        let co = coroutine(&engine, body);
        resume(&engine, &co, Variant::Void).unwrap();
        co.invoke(&engine, "dispose", &NO_ARGS).unwrap();
        assert!(!co.get_property(&engine, "alive").unwrap().to_bool());

        let err = resume(&engine, &co, Variant::Void).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InaccessibleResource);
        assert_eq!(err.message(), "coroutine is no longer accessible");
    }

    #[test]
    fn test_exception_propagates_to_resumer() {
        let engine = Engine::new();
        let body = engine.new_function("body", |_| Err(TemporaryException::illegal_state("broken").into()));
        let co = coroutine(&engine, body);
        let err = resume(&engine, &co, Variant::Void).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        let state = engine.builtins().ids.coroutine;
        let instance = co.as_object().unwrap().native::<CoroutineInstance>(state).unwrap();
        assert_eq!(instance.state(), CoroutineState::Exited);
    }

    #[test]
    fn test_initialize_requires_function() {
        let engine = Engine::new();
        let err = Variant::object(engine.builtins().coroutine_class.clone())
            .create_new(&engine, &NO_ARGS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgumentCount);
    }
}
