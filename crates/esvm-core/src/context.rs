//! Execution context: the global object plus whichever [`Thread`] is
//! currently running (spec section 3.10's `curr_thread`).
//!
//! The source's `VmContext` is a single flat register array shared by
//! every call frame, with a separate `SharedContext` for cross-thread
//! interrupt signaling. This implementation instead gives each `Thread`
//! its own value/call/catch stacks (so resuming a different thread is
//! just swapping which `Rc<RefCell<Thread>>` is "current") and drops the
//! cross-thread machinery entirely, since an `Isolate` and everything it
//! owns is confined to one OS thread (see `DESIGN.md`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{VmError, VmResult};
use crate::gc::{GcRef, Heap};
use crate::object::JsObject;
use crate::thread::{CallFrame, Catcher, CatcherKind, Thread, ThreadStatus};
use crate::value::Value;

/// Native-function call context, handed to a [`crate::value::NativeFn`]
/// so it can interact with the running thread (push an argument, read
/// `this`, call back into script) without taking ownership of it.
pub struct NativeContext<'a> {
    pub vm: &'a mut VmContext,
}

impl<'a> NativeContext<'a> {
    pub fn new(vm: &'a mut VmContext) -> Self {
        Self { vm }
    }

    pub fn global(&self) -> GcRef<JsObject> {
        self.vm.global.clone()
    }
}

/// Owns the global object and dispatches to whichever thread is current.
pub struct VmContext {
    pub global: GcRef<JsObject>,
    /// Shared handle to the isolate's heap, so any code holding a
    /// `&VmContext` (the executor, native functions) can register a
    /// freshly allocated `JsObject`/`JsString`/buffer with the cycle
    /// collector without needing a separate `&Isolate` borrow.
    pub heap: Rc<Heap>,
    main_thread: Rc<RefCell<Thread>>,
    current_thread: RefCell<Rc<RefCell<Thread>>>,
    interrupted: Cell<bool>,
}

impl VmContext {
    pub fn new(global: GcRef<JsObject>, heap: Rc<Heap>) -> Self {
        let main_thread = Rc::new(RefCell::new(Thread::new()));
        Self {
            global,
            heap,
            current_thread: RefCell::new(main_thread.clone()),
            main_thread,
            interrupted: Cell::new(false),
        }
    }

    pub fn main_thread(&self) -> Rc<RefCell<Thread>> {
        self.main_thread.clone()
    }

    pub fn current_thread(&self) -> Rc<RefCell<Thread>> {
        self.current_thread.borrow().clone()
    }

    /// Switches the current thread, returning the previous one so the
    /// caller can restore it once the newly-current thread yields or
    /// returns (`Thread.resume`'s entry/exit pair).
    pub fn enter_thread(&self, thread: Rc<RefCell<Thread>>) -> Rc<RefCell<Thread>> {
        self.current_thread.replace(thread)
    }

    /// Requests that execution stop at the next safepoint. Cooperative:
    /// there is no cross-thread signal, since everything here runs on one
    /// OS thread; the executor polls [`VmContext::check_interrupt`]
    /// between instructions.
    pub fn interrupt(&self) {
        self.interrupted.set(true);
    }

    pub fn clear_interrupt(&self) {
        self.interrupted.set(false);
    }

    pub fn check_interrupt(&self) -> VmResult<()> {
        if self.interrupted.get() {
            Err(VmError::interrupted())
        } else {
            Ok(())
        }
    }

    /// Pushes a new activation record onto the current thread.
    pub fn push_frame(&self, frame: CallFrame, register_count: usize) {
        self.current_thread
            .borrow()
            .borrow_mut()
            .push_frame(frame, register_count);
    }

    /// Pops the current thread's top activation record.
    pub fn pop_frame(&self) -> Option<CallFrame> {
        self.current_thread.borrow().borrow_mut().pop_frame()
    }

    pub fn get_register(&self, frame_index: usize, register: u16) -> Value {
        self.current_thread
            .borrow()
            .borrow()
            .get_register(frame_index, register)
    }

    pub fn set_register(&self, frame_index: usize, register: u16, value: Value) {
        self.current_thread
            .borrow()
            .borrow_mut()
            .set_register(frame_index, register, value);
    }

    pub fn call_depth(&self) -> usize {
        self.current_thread.borrow().borrow().call_stack.len()
    }

    /// Pushes a try/catch/finally guard, active from here until popped or
    /// an enclosing catcher at a shallower frame depth is found during
    /// unwind.
    pub fn push_catcher(&self, catcher: Catcher) {
        self.current_thread
            .borrow()
            .borrow_mut()
            .catch_stack
            .push(catcher);
    }

    pub fn pop_catcher(&self) -> Option<Catcher> {
        self.current_thread.borrow().borrow_mut().catch_stack.pop()
    }

    /// Finds (without popping) the nearest catcher that can handle a
    /// thrown exception — i.e. the nearest `Catch`/`Finally` catcher,
    /// unwinding past `Label` catchers along the way.
    pub fn find_exception_handler(&self) -> Option<usize> {
        let thread = self.current_thread.borrow();
        let thread = thread.borrow();
        thread
            .catch_stack
            .iter()
            .rposition(|c| matches!(c.kind, CatcherKind::Catch | CatcherKind::Finally))
    }

    /// Finds the nearest `Label` catcher matching `label` (0 = nearest
    /// enclosing loop, counted from the top), for `break`/`continue`
    /// unwinding.
    pub fn find_label_handler(&self, label: u32) -> Option<usize> {
        let thread = self.current_thread.borrow();
        let thread = thread.borrow();
        let mut seen = 0u32;
        for (i, catcher) in thread.catch_stack.iter().enumerate().rev() {
            if catcher.kind != CatcherKind::Label {
                continue;
            }
            if seen == label {
                return Some(i);
            }
            seen += 1;
        }
        None
    }

    pub fn is_main_thread_current(&self) -> bool {
        Rc::ptr_eq(&self.main_thread, &self.current_thread.borrow())
    }

    pub fn current_status(&self) -> ThreadStatus {
        self.current_thread.borrow().borrow().status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::JsObject;

    fn new_context() -> VmContext {
        let heap = Rc::new(Heap::new(crate::gc::GcConfig::default()));
        VmContext::new(Rc::new(JsObject::new(None)), heap)
    }

    #[test]
    fn fresh_context_runs_on_main_thread() {
        let ctx = new_context();
        assert!(ctx.is_main_thread_current());
        assert_eq!(ctx.call_depth(), 0);
    }

    #[test]
    fn interrupt_is_observed_then_clearable() {
        let ctx = new_context();
        assert!(ctx.check_interrupt().is_ok());
        ctx.interrupt();
        assert!(ctx.check_interrupt().is_err());
        ctx.clear_interrupt();
        assert!(ctx.check_interrupt().is_ok());
    }

    #[test]
    fn entering_another_thread_changes_current() {
        let ctx = new_context();
        let other = Rc::new(RefCell::new(Thread::new()));
        let previous = ctx.enter_thread(other.clone());
        assert!(Rc::ptr_eq(&previous, &ctx.main_thread()));
        assert!(Rc::ptr_eq(&ctx.current_thread(), &other));
        assert!(!ctx.is_main_thread_current());
    }

    #[test]
    fn label_handler_counts_from_innermost() {
        let ctx = new_context();
        ctx.push_catcher(Catcher {
            kind: CatcherKind::Label,
            frame_depth: 0,
            catch_pc: None,
            finally_pc: None,
            catch_binding: None,
            label: 0,
        });
        ctx.push_catcher(Catcher {
            kind: CatcherKind::Label,
            frame_depth: 0,
            catch_pc: None,
            finally_pc: None,
            catch_binding: None,
            label: 0,
        });
        assert_eq!(ctx.find_label_handler(0), Some(1));
        assert_eq!(ctx.find_label_handler(1), Some(0));
        assert_eq!(ctx.find_label_handler(2), None);
    }
}
