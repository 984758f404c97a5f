use super::{ContextPtr, SlotChain};
use crate::logging;
use crate::{Error, Result};
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::{RwLock, Weak};
use std::vec::Vec;

pub type ExitHandler = Box<dyn Send + Sync + Fn(&RampartEntry, ContextPtr) -> Result<()>>;

// currently, ctx and entry are N:M mapped,
// and they may be used in async contexts,
// therefore, we need Arc (for Sync and Send) and RwLock (for inner mutability)
type EntryStrongPtrInner = Arc<RwLock<RampartEntry>>;
#[derive(Clone)]
pub struct EntryStrongPtr(EntryStrongPtrInner);
pub type EntryWeakPtr = Weak<RwLock<RampartEntry>>;

std::thread_local! {
    /// deepest un-exited entry created on this thread
    static CURRENT_ENTRY: RefCell<Option<EntryStrongPtrInner>> = RefCell::new(None);
}

pub struct RampartEntry {
    ctx: ContextPtr,
    exit_handlers: Vec<ExitHandler>,
    /// each entry traverses a slot chain,
    /// global slot chain is wrapped by Arc, thus here we use Arc
    sc: Arc<SlotChain>,
    /// caller entry, kept alive until this entry exits
    parent: Option<EntryStrongPtrInner>,
    child: Option<EntryWeakPtr>,
    exited: bool,
}

impl RampartEntry {
    pub fn new(ctx: ContextPtr, sc: Arc<SlotChain>) -> Self {
        RampartEntry {
            ctx,
            exit_handlers: Vec::new(),
            sc,
            parent: None,
            child: None,
            exited: false,
        }
    }

    pub fn when_exit(&mut self, exit_handler: ExitHandler) {
        self.exit_handlers.push(exit_handler);
    }

    pub fn context(&self) -> &ContextPtr {
        &self.ctx
    }

    pub fn parent(&self) -> Option<&EntryStrongPtrInner> {
        self.parent.as_ref()
    }

    pub fn is_exited(&self) -> bool {
        self.exited
    }

    pub fn set_err(&self, err: Error) {
        self.ctx.write().unwrap().set_err(err);
    }
}

/// current_entry returns the deepest entry created on this thread
/// that has not exited yet.
pub fn current_entry() -> Option<EntryStrongPtr> {
    CURRENT_ENTRY.with(|cell| cell.borrow().as_ref().cloned().map(EntryStrongPtr))
}

/// attach links `entry` under the current entry of this thread and
/// makes it the new current one.
pub(crate) fn attach(entry: EntryStrongPtrInner) {
    CURRENT_ENTRY.with(|cell| {
        let mut cur = cell.borrow_mut();
        if let Some(parent) = cur.as_ref() {
            parent.write().unwrap().child = Some(Arc::downgrade(&entry));
            entry.write().unwrap().parent = Some(Arc::clone(parent));
        }
        *cur = Some(entry);
    });
}

/// restore_current_to_parent rewinds the thread-local current entry to the
/// parent of `entry`, if `entry` is the current one. Used when an entry is
/// handed over to an async task and must not leak into subsequent
/// synchronous calls on this thread.
pub(crate) fn restore_current_to_parent(entry: &EntryStrongPtrInner) {
    CURRENT_ENTRY.with(|cell| {
        let mut cur = cell.borrow_mut();
        let matched = match cur.as_ref() {
            Some(c) => Arc::ptr_eq(c, entry),
            None => false,
        };
        if matched {
            *cur = entry.read().unwrap().parent.clone();
        }
    });
}

// exit_single completes one entry: run its exit hooks, let the slot chain
// record completion, unlink it from its parent and rewind the thread-local
// current pointer. Idempotent.
fn exit_single(ptr: &EntryStrongPtrInner) {
    let parent = {
        let mut entry = ptr.write().unwrap();
        if entry.exited {
            return;
        }
        entry.exited = true;
        for handler in &entry.exit_handlers {
            if let Err(err) = handler(&entry, entry.ctx.clone()) {
                logging::error!("exit handler failed: {}", err);
            }
        }
        entry.sc.exit(entry.ctx.clone());
        entry.parent.take()
    };
    if let Some(parent) = &parent {
        parent.write().unwrap().child = None;
    }
    CURRENT_ENTRY.with(|cell| {
        let mut cur = cell.borrow_mut();
        let matched = match cur.as_ref() {
            Some(c) => Arc::ptr_eq(c, ptr),
            None => false,
        };
        if matched {
            *cur = parent;
        }
    });
}

impl EntryStrongPtr {
    pub fn new(entry: EntryStrongPtrInner) -> EntryStrongPtr {
        EntryStrongPtr(entry)
    }

    pub(crate) fn inner(&self) -> &EntryStrongPtrInner {
        &self.0
    }

    pub fn context(&self) -> ContextPtr {
        let entry = self.0.read().unwrap();
        entry.context().clone()
    }

    pub fn set_err(&self, err: Error) {
        self.0.read().unwrap().set_err(err);
    }

    pub fn when_exit(&self, exit_handler: ExitHandler) {
        self.0.write().unwrap().when_exit(exit_handler);
    }

    pub fn is_exited(&self) -> bool {
        self.0.read().unwrap().exited
    }

    /// exit completes this entry. Exiting twice is a no-op. If entries
    /// created after this one have not exited yet, they are force-exited
    /// deepest first and an error is returned afterwards.
    pub fn exit(&self) -> Result<()> {
        if self.is_exited() {
            return Ok(());
        }
        // collect un-exited descendants, shallowest first
        let mut pending = Vec::new();
        {
            let mut node = self.0.read().unwrap().child.as_ref().and_then(Weak::upgrade);
            while let Some(child) = node {
                let next = child.read().unwrap().child.as_ref().and_then(Weak::upgrade);
                pending.push(child);
                node = next;
            }
        }
        let out_of_order = pending.iter().any(|c| !c.read().unwrap().exited);
        for child in pending.iter().rev() {
            exit_single(child);
        }
        exit_single(&self.0);
        if out_of_order {
            Err(Error::msg(
                "entries exited in a different order than they were created, deeper entries were force-exited",
            ))
        } else {
            Ok(())
        }
    }
}
