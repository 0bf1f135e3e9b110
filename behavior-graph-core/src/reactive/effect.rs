//! Actions, Side Effects and Completions
//!
//! Actions and side effects are the graph's two boundaries with the outside
//! world.
//!
//! # Actions
//!
//! An action is the only way in. It opens a new event and updates the
//! resources that seed it. Actions submitted while an event is in flight are
//! queued and run after that event closes.
//!
//! # Side Effects
//!
//! A side effect is the only way out. Behaviors queue them during propagation;
//! they run in submission order once no behavior is pending, so they always
//! observe a settled graph. Effects may issue new actions but never update
//! resources or change links.
//!
//! # Completions
//!
//! External work started by an effect (a network call, a timer) usually
//! finishes later, possibly on another thread. A [`Completion`] lets that work
//! post an action back into the graph. Posted actions wait in a shared inbox
//! until the loop runs out of queued actions or the host calls
//! [`Graph::process_completions`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::extent::Extent;
use super::runtime::Graph;
use crate::error::GraphResult;

/// Block run when an action opens its event.
pub(crate) type ActionFn = dyn FnOnce(&mut Graph) -> GraphResult<()>;

/// Block run after propagation settles.
pub(crate) type EffectFn = dyn FnOnce(&mut Graph, Extent) -> GraphResult<()>;

/// A queued external stimulus.
pub(crate) struct Action {
    pub(crate) impulse: String,
    pub(crate) block: Box<ActionFn>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("impulse", &self.impulse)
            .finish_non_exhaustive()
    }
}

/// A queued effect and the extent that created it.
pub(crate) struct SideEffect {
    pub(crate) name: Option<String>,
    pub(crate) extent: Extent,
    pub(crate) block: Box<EffectFn>,
}

impl fmt::Debug for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffect")
            .field("name", &self.name)
            .field("extent", &self.extent)
            .finish_non_exhaustive()
    }
}

struct PostedAction {
    impulse: String,
    block: Box<dyn FnOnce(&mut Graph) -> GraphResult<()> + Send>,
}

/// Handle for posting actions from outside the event loop.
///
/// Cheap to clone, and safe to move to other threads.
#[derive(Clone, Default)]
pub struct Completion {
    inbox: Arc<Mutex<VecDeque<PostedAction>>>,
}

impl Completion {
    /// Post an action. It runs as its own event once the graph picks it up.
    pub fn complete<F>(&self, impulse: impl Into<String>, block: F)
    where
        F: FnOnce(&mut Graph) -> GraphResult<()> + Send + 'static,
    {
        self.inbox.lock().push_back(PostedAction {
            impulse: impulse.into(),
            block: Box::new(block),
        });
    }

    /// Number of posted actions not yet picked up.
    pub fn pending(&self) -> usize {
        self.inbox.lock().len()
    }

    pub(crate) fn take_next(&self) -> Option<Action> {
        let posted = self.inbox.lock().pop_front()?;
        Some(Action {
            impulse: posted.impulse,
            block: posted.block,
        })
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_are_taken_in_post_order() {
        let completion = Completion::default();
        completion.complete("first", |_| Ok(()));
        completion.complete("second", |_| Ok(()));
        assert_eq!(completion.pending(), 2);

        let first = completion.take_next().unwrap();
        let second = completion.take_next().unwrap();
        assert_eq!(first.impulse, "first");
        assert_eq!(second.impulse, "second");
        assert!(completion.take_next().is_none());
    }

    #[test]
    fn clones_share_one_inbox() {
        let completion = Completion::default();
        let remote = completion.clone();

        std::thread::spawn(move || remote.complete("from thread", |_| Ok(())))
            .join()
            .unwrap();

        assert_eq!(completion.pending(), 1);
    }

    #[test]
    fn completion_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Completion>();
        assert_sync::<Completion>();
    }
}
