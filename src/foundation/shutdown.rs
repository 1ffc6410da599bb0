//! Hierarchical cancellation signal.
//!
//! A [`Shutdown`] is cheap to clone. Cancelling a handle cancels every clone and every child
//! created from it; cancelling a child leaves the parent running.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

#[derive(Debug)]
struct Node {
    tx: watch::Sender<bool>,
    children: Mutex<Vec<Arc<Node>>>,
}

impl Node {
    fn new(cancelled: bool) -> Arc<Self> {
        let (tx, _) = watch::channel(cancelled);
        Arc::new(Self {
            tx,
            children: Mutex::new(Vec::new()),
        })
    }

    fn cancel(&self) {
        if self.tx.send_replace(true) {
            return;
        }
        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children {
            child.cancel();
        }
    }
}

/// Cancellation handle threaded through every task of a run.
#[derive(Clone, Debug)]
pub struct Shutdown {
    node: Arc<Node>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            node: Node::new(false),
        }
    }

    /// New handle that is cancelled together with `self` but can also be cancelled alone.
    pub fn child(&self) -> Self {
        let mut children = self
            .node
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let node = Node::new(*self.node.tx.borrow());
        if !*self.node.tx.borrow() {
            children.retain(|c| !*c.tx.borrow());
            children.push(Arc::clone(&node));
        }
        Self { node }
    }

    pub fn cancel(&self) {
        self.node.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.node.tx.borrow()
    }

    /// Resolves once this handle (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.node.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
