//! The Thread class
//!
//! Each started Thread runs its method on a dedicated OS thread sharing the
//! engine. `join` waits for it and returns the method's result; an
//! exception that escaped the method is rethrown into the joining thread.

use super::method;
use crate::error::{RtResult, TemporaryException};
use crate::runtime::class::{CoreClasses, call_super};
use crate::runtime::function::{CallInfo, NO_ARGS};
use crate::runtime::object::ObjectRef;
use crate::runtime::operate::Dispatch;
use crate::runtime::sync;
use crate::value::Variant;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Default)]
struct ThreadInner {
    /// Function to run; void means the instance's `run` member
    method: Variant,
    handle: Option<JoinHandle<RtResult<Variant>>>,
    /// Set while one joiner owns the handle and waits on it
    joining: bool,
    result: Option<RtResult<Variant>>,
}

/// Native state of Thread instances
#[derive(Default)]
pub struct ThreadInstance {
    inner: Mutex<ThreadInner>,
    /// Signalled once the result is stored
    finished: Condvar,
    terminate: AtomicBool,
}

impl ThreadInstance {
    /// Check if the thread has been started and has not finished
    pub fn is_alive(&self) -> bool {
        let inner = sync::lock(&self.inner);
        match &inner.handle {
            Some(handle) => !handle.is_finished(),
            None => inner.joining,
        }
    }

    pub fn should_terminate(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }
}

fn state(call: &CallInfo<'_>) -> RtResult<Arc<ThreadInstance>> {
    call.native::<ThreadInstance>(call.engine.builtins().ids.thread)
}

fn start(call: &CallInfo<'_>) -> RtResult<Variant> {
    let thread_state = state(call)?;
    let mut inner = sync::lock(&thread_state.inner);
    if inner.handle.is_some() || inner.result.is_some() {
        return Ok(Variant::Void);
    }

    let engine = call.engine.clone();
    let this = call.this.clone();
    let method = inner.method.clone();
    let mut builder = thread::Builder::new().name("risse-thread".to_string());
    if let Some(size) = engine.config().thread_stack_size {
        builder = builder.stack_size(size);
    }
    let handle = builder
        .spawn(move || {
            let result = if method.is_void() {
                this.invoke(&engine, "run", &NO_ARGS)
            } else {
                method.call_with_this(&engine, this, &NO_ARGS)
            };
            if let Err(e) = &result {
                log::warn!("unexpected thread abortion due to unhandled exception: {}", e);
            }
            result
        })
        .map_err(|e| TemporaryException::illegal_state(&format!("could not start thread: {}", e)))?;
    log::debug!("thread {:?} started", handle.thread().id());
    inner.handle = Some(handle);
    Ok(Variant::Void)
}

/// Wait for the thread and return its result
///
/// The first joiner takes the handle; later joiners wait for the result it
/// stores. Joining a thread that was never started gives void.
fn join(call: &CallInfo<'_>) -> RtResult<Variant> {
    let thread_state = state(call)?;
    let mut inner = sync::lock(&thread_state.inner);
    loop {
        if let Some(result) = &inner.result {
            return result.clone();
        }
        if let Some(handle) = inner.handle.take() {
            inner.joining = true;
            drop(inner);
            let result = match handle.join() {
                Ok(result) => result.map_err(|e| e.into_thrown(call.engine)),
                Err(_) => Err(TemporaryException::illegal_state("thread panicked").into()),
            };
            let mut inner = sync::lock(&thread_state.inner);
            inner.joining = false;
            inner.result = Some(result.clone());
            thread_state.finished.notify_all();
            return result;
        }
        if !inner.joining {
            return Ok(Variant::Void);
        }
        inner = sync::wait(&thread_state.finished, inner);
    }
}

pub(super) fn register(core: &CoreClasses) -> ObjectRef {
    let class = core.builtin_class("Thread", &core.object_class);

    core.bind_function(&class, "construct", method(), |call| {
        let id = call.engine.builtins().ids.thread;
        call.this_object()?.set_native(id, Arc::new(ThreadInstance::default()))?;
        Ok(Variant::Void)
    });

    // initialize(function = run): the block argument wins over an ordinary one
    core.bind_function(&class, "initialize", method(), |call| {
        call.args.expect_count(0, Some(1))?;
        let thread_class = &call.engine.builtins().thread_class;
        call_super(call.engine, thread_class, "initialize", call.this, &NO_ARGS)?;
        let method = if call.args.block_len() > 0 {
            call.args.block(0).clone()
        } else {
            call.arg(0).clone()
        };
        sync::lock(&state(call)?.inner).method = method;
        Ok(Variant::Void)
    });

    core.bind_function(&class, "run", method(), |_| Ok(Variant::Void));
    core.bind_function(&class, "start", method(), start);
    core.bind_function(&class, "join", method(), join);

    core.bind_function(&class, "terminate", method(), |call| {
        state(call)?.terminate.store(true, Ordering::Release);
        Ok(Variant::Void)
    });
    core.bind_getter(&class, "shouldTerminate", |call| {
        Ok(Variant::Boolean(state(call)?.should_terminate()))
    });
    core.bind_getter(&class, "alive", |call| Ok(Variant::Boolean(state(call)?.is_alive())));

    // sleep(milliseconds); callable on the class itself
    core.bind_function(&class, "sleep", method(), |call| {
        call.args.expect_count(1, Some(1))?;
        let ms = u64::try_from(call.arg(0).to_integer()).unwrap_or(0);
        thread::sleep(Duration::from_millis(ms));
        Ok(Variant::Void)
    });

    class
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::ErrorKind;
    use crate::runtime::class::ClassInfo;
    use crate::runtime::function::{Args, NO_ARGS};
    use crate::runtime::operate::Dispatch;
    use crate::value::Variant;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn thread_class(engine: &Engine) -> Variant {
        Variant::object(engine.builtins().thread_class.clone())
    }

    #[test]
    fn test_join_returns_result() {
        let engine = Engine::new();
        let f = engine.new_function("work", |_| Ok(Variant::from(42)));
        let t = thread_class(&engine)
            .create_new(&engine, &Args::from([Variant::object(f)]))
            .unwrap();
        t.invoke(&engine, "start", &NO_ARGS).unwrap();
        assert_eq!(t.invoke(&engine, "join", &NO_ARGS).unwrap(), Variant::from(42));
        // joining again gives the same result
        assert_eq!(t.invoke(&engine, "join", &NO_ARGS).unwrap(), Variant::from(42));
        assert!(!t.get_property(&engine, "alive").unwrap().to_bool());
    }

    #[test]
    fn test_concurrent_joiners_wait_for_the_result() {
        let engine = Engine::new();
        let f = engine.new_function("slow", |_| {
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(Variant::from(7))
        });
        let t = thread_class(&engine)
            .create_new(&engine, &Args::from([Variant::object(f)]))
            .unwrap();
        t.invoke(&engine, "start", &NO_ARGS).unwrap();

        let joiners: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let t = t.clone();
                std::thread::spawn(move || t.invoke(&engine, "join", &NO_ARGS).unwrap())
            })
            .collect();
        for joiner in joiners {
            assert_eq!(joiner.join().unwrap(), Variant::from(7));
        }
        assert!(!t.get_property(&engine, "alive").unwrap().to_bool());
    }

    #[test]
    fn test_join_before_start_gives_void() {
        let engine = Engine::new();
        let f = engine.new_function("idle", |_| Ok(Variant::from(1)));
        let t = thread_class(&engine)
            .create_new(&engine, &Args::from([Variant::object(f)]))
            .unwrap();
        assert!(t.invoke(&engine, "join", &NO_ARGS).unwrap().is_void());
    }

    #[test]
    fn test_start_twice_runs_once() {
        let engine = Engine::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let f = engine.new_function("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Variant::Void)
        });
        let t = thread_class(&engine)
            .create_new(&engine, &Args::with_block(Vec::new(), vec![Variant::object(f)]))
            .unwrap();
        t.invoke(&engine, "start", &NO_ARGS).unwrap();
        t.invoke(&engine, "start", &NO_ARGS).unwrap();
        t.invoke(&engine, "join", &NO_ARGS).unwrap();
        t.invoke(&engine, "start", &NO_ARGS).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exception_is_rethrown_by_join() {
        let engine = Engine::new();
        let f = engine.new_function("fail", |call| {
            Variant::object(call.engine.new_object()).get_property(call.engine, "missing")
        });
        let t = thread_class(&engine)
            .create_new(&engine, &Args::from([Variant::object(f)]))
            .unwrap();
        t.invoke(&engine, "start", &NO_ARGS).unwrap();
        let err = t.invoke(&engine, "join", &NO_ARGS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MemberNotFound);
        assert_eq!(err.message(), "member \"missing\" not found");
    }

    #[test]
    fn test_subclass_overrides_run() {
        let engine = Engine::new();
        let core = engine.core();
        let worker = core
            .new_class(ClassInfo::new("Worker", Some(engine.builtins().thread_class.clone())))
            .unwrap();
        core.bind_function(&worker, "run", super::method(), |call| {
            Ok(Variant::from(call.this.get_property(call.engine, "shouldTerminate")?.to_bool()))
        });
        let t = Variant::object(worker).create_new(&engine, &NO_ARGS).unwrap();
        t.invoke(&engine, "terminate", &NO_ARGS).unwrap();
        t.invoke(&engine, "start", &NO_ARGS).unwrap();
        assert_eq!(t.invoke(&engine, "join", &NO_ARGS).unwrap(), Variant::from(true));
    }

    #[test]
    fn test_synchronized_increments_from_two_threads() {
        let engine = Engine::new();
        let counter = Variant::object(engine.new_object());
        counter.set_property(&engine, "value", 0).unwrap();

        let increment = engine.new_function("increment", |call| {
            let counter = call.arg(0);
            let value = counter.get_property(call.engine, "value")?.to_integer();
            counter.set_property(call.engine, "value", value + 1)
                .map(|_| Variant::Void)
        });
        let target = counter.clone();
        let work = engine.new_function("work", move |call| {
            let args = Args::from([Variant::object(increment.clone()), target.clone()]);
            for _ in 0..10000 {
                target.invoke(call.engine, "synchronize", &args)?;
            }
            Ok(Variant::Void)
        });

        let threads: Vec<Variant> = (0..2)
            .map(|_| {
                thread_class(&engine)
                    .create_new(&engine, &Args::from([Variant::object(work.clone())]))
                    .unwrap()
            })
            .collect();
        for t in &threads {
            t.invoke(&engine, "start", &NO_ARGS).unwrap();
        }
        for t in &threads {
            t.invoke(&engine, "join", &NO_ARGS).unwrap();
        }
        assert_eq!(counter.get_property(&engine, "value").unwrap(), Variant::from(20000));
    }

    #[test]
    fn test_sleep_on_class() {
        let engine = Engine::new();
        thread_class(&engine)
            .invoke(&engine, "sleep", &Args::from([Variant::from(1)]))
            .unwrap();
    }
}
