use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;

use crate::active::Active;
use crate::envelope::Envelope;
use crate::handler::Exec;
use crate::handler::Handler;
use crate::mailbox::Mailbox;
use crate::timer::TimerCycle;

pub(crate) struct LinkState<A: Active> {
	pub(crate) mailbox: Arc<Mailbox<Envelope<A>>>,
}

impl<A: Active> Drop for LinkState<A> {
	fn drop(&mut self) {
		// Last strong handle gone: close the mailbox so the worker observes
		// the loss of external interest and stops itself.
		self.mailbox.close();
	}
}

/// Shared owning handle to an active object. Cloning is cheap; the worker
/// keeps running as long as any clone is alive.
pub struct Link<A: Active> {
	pub(crate) state: Arc<LinkState<A>>,
}

impl<A: Active> Clone for Link<A> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
		}
	}
}

impl<A: Active> std::fmt::Debug for Link<A> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Link").field("active", &type_name::<A>()).finish()
	}
}

impl<A: Active> Link<A> {
	pub(crate) fn new(mailbox: Arc<Mailbox<Envelope<A>>>) -> Self {
		Self {
			state: Arc::new(LinkState { mailbox }),
		}
	}

	/// Enqueue `message` for dispatch to the owner's handler for `M`.
	///
	/// The payload is moved into the mailbox; a send to a stopped instance
	/// is dropped and reported, never an error.
	pub fn send<M>(&self, message: M)
	where
		M: Send + 'static,
		A: Handler<M>,
	{
		if !self.state.mailbox.send(Envelope::of(message)) {
			tracing::debug!(
				active = type_name::<A>(),
				message = type_name::<M>(),
				"send dropped, mailbox closed"
			);
		}
	}

	/// Request a graceful stop; idempotent and safe from any thread.
	pub fn stop(&self) {
		self.control(|_state, ctx| ctx.stop());
	}

	/// Start (or replace) a timer on the instance from outside its worker.
	/// Applied when the worker next drains its mailbox.
	pub fn timer_start<M>(&self, value: M, period: Duration, cycle: TimerCycle)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		self.control(move |_state, ctx| ctx.timer_start(value, period, cycle));
	}

	/// Stop the timer keyed by `value`; unknown keys are a silent no-op.
	pub fn timer_stop<M>(&self, value: M)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		self.control(move |_state, ctx| ctx.timer_stop(value));
	}

	/// Whether the worker is still accepting messages.
	pub fn alive(&self) -> bool {
		!self.state.mailbox.is_closed()
	}

	fn control<F>(&self, operation: F)
	where
		F: FnOnce(&mut A, &mut Exec<'_, A>) + Send + 'static,
	{
		if !self.state.mailbox.send(Envelope::control(operation)) {
			tracing::debug!(active = type_name::<A>(), "control dropped, mailbox closed");
		}
	}
}
