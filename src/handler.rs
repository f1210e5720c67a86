use std::time::Duration;
use std::time::Instant;

use crate::active::Active;
use crate::active::RunState;
use crate::active::Runtime;
use crate::callback::Callback;
use crate::timer::TimerCycle;
use crate::weak::WeakLink;

/// A handler for messages of type `M` on the active object `Self`.
///
/// `send::<M>` is only available for types the owner implements this trait
/// for; a send without a matching handler fails to compile. The payload
/// arrives by value, moved through the mailbox, so move-only messages
/// transfer without copies.
pub trait Handler<M>: Active
where
	M: Send + 'static,
{
	fn handle(&mut self, ctx: &mut Exec<'_, Self>, msg: M);
}

/// Worker-side context handed to every handler and lifecycle hook.
///
/// Everything here runs on the owner thread, so timer operations take
/// effect synchronously and `stop` applies at the next dispatch boundary.
pub struct Exec<'a, A: Active> {
	pub(crate) rt: &'a mut Runtime<A>,
}

impl<'a, A: Active> Exec<'a, A> {
	pub(crate) fn new(rt: &'a mut Runtime<A>) -> Self {
		Self { rt }
	}

	/// A weak handle to this instance, safe to hand to peers.
	pub fn link(&self) -> WeakLink<A> {
		self.rt.link.clone()
	}

	/// Request a graceful stop. Takes effect once the current dispatch
	/// returns; idempotent.
	pub fn stop(&mut self) {
		if self.rt.run_state == RunState::Started {
			self.rt.run_state = RunState::Stopping;
			tracing::debug!("stop requested");
		}
	}

	/// Start (or replace) a timer keyed by the payload's type and value.
	///
	/// The first expiry is one `period` from now. Periodic timers re-arm at
	/// the previous deadline plus `period`, so firing never drifts.
	pub fn timer_start<M>(&mut self, value: M, period: Duration, cycle: TimerCycle)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		self.rt.timers.start(value, period, cycle, Instant::now());
	}

	/// Stop the timer keyed by `value`. Unknown keys are a silent no-op.
	pub fn timer_stop<M>(&mut self, value: M)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		self.rt.timers.stop(&value);
	}

	/// A token any party can invoke to send `M` to this instance later.
	pub fn callback<M>(&self) -> Callback<M>
	where
		M: Send + 'static,
		A: Handler<M>,
	{
		Callback::new(self.link())
	}
}
