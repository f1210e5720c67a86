use std::sync::Weak;
use std::time::Duration;

use crate::active::Active;
use crate::callback::Callback;
use crate::handler::Handler;
use crate::link::Link;
use crate::link::LinkState;
use crate::timer::TimerCycle;

/// Non-owning handle: observes the instance without keeping it alive.
/// Every operation upgrades opportunistically and is a silent no-op once
/// the target is gone.
pub struct WeakLink<A: Active> {
	state: Weak<LinkState<A>>,
}

impl<A: Active> Clone for WeakLink<A> {
	fn clone(&self) -> Self {
		Self {
			state: self.state.clone(),
		}
	}
}

impl<A: Active> WeakLink<A> {
	pub fn upgrade(&self) -> Option<Link<A>> {
		self.state.upgrade().map(|state| Link { state })
	}

	pub fn send<M>(&self, message: M)
	where
		M: Send + 'static,
		A: Handler<M>,
	{
		if let Some(link) = self.upgrade() {
			link.send(message);
		}
	}

	pub fn stop(&self) {
		if let Some(link) = self.upgrade() {
			link.stop();
		}
	}

	pub fn timer_start<M>(&self, value: M, period: Duration, cycle: TimerCycle)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		if let Some(link) = self.upgrade() {
			link.timer_start(value, period, cycle);
		}
	}

	pub fn timer_stop<M>(&self, value: M)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		if let Some(link) = self.upgrade() {
			link.timer_stop(value);
		}
	}

	/// A token that sends `M` to this instance for as long as it lives.
	pub fn callback<M>(&self) -> Callback<M>
	where
		M: Send + 'static,
		A: Handler<M>,
	{
		Callback::new(self.clone())
	}
}

impl<A: Active> Link<A> {
	pub fn downgrade(&self) -> WeakLink<A> {
		WeakLink {
			state: std::sync::Arc::downgrade(&self.state),
		}
	}
}
