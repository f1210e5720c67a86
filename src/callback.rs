use std::sync::Arc;

use crate::active::Active;
use crate::handler::Handler;
use crate::weak::WeakLink;

/// An invocable reference to "send `M` to that instance", detached from the
/// instance's concrete type.
///
/// Tokens are cheap to clone and freely shareable across threads. They hold
/// only a weak handle: invoking a token whose target has been destroyed is
/// a silent no-op, and a token never extends the target's lifetime.
pub struct Callback<M: Send + 'static> {
	target: Arc<dyn CallbackTarget<M>>,
}

pub(crate) trait CallbackTarget<M>: Send + Sync {
	fn deliver(&self, value: M);
}

impl<M: Send + 'static> Clone for Callback<M> {
	fn clone(&self) -> Self {
		Self {
			target: self.target.clone(),
		}
	}
}

impl<M: Send + 'static> Callback<M> {
	pub(crate) fn new<A>(link: WeakLink<A>) -> Self
	where
		A: Handler<M>,
	{
		Self {
			target: Arc::new(link),
		}
	}

	/// Opportunistic send to the token's target.
	pub fn invoke(&self, value: M) {
		self.target.deliver(value);
	}
}

impl<M, A> CallbackTarget<M> for WeakLink<A>
where
	M: Send + 'static,
	A: Active + Handler<M>,
{
	fn deliver(&self, value: M) {
		self.send(value);
	}
}
