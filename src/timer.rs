use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;
use std::time::Instant;

use downcast_rs::impl_downcast;
use downcast_rs::Downcast;

use crate::active::Active;
use crate::handler::Exec;
use crate::handler::Handler;

/// Whether a timer fires once or re-arms after every expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerCycle {
	OneShot,
	Periodic,
}

/// Erased timer payload: carries the value, its identity, and the dispatch
/// into the owner's handler for the payload type.
pub(crate) trait TimerPayload<A: Active>: Downcast + Send {
	fn fire(&self, state: &mut A, ctx: &mut Exec<'_, A>);
	fn matches(&self, other: &dyn TimerPayload<A>) -> bool;
	fn clone_box(&self) -> Box<dyn TimerPayload<A>>;
}

impl_downcast!(TimerPayload<A> where A: Active);

impl<M, A> TimerPayload<A> for M
where
	M: Clone + PartialEq + Send + 'static,
	A: Handler<M>,
{
	fn fire(&self, state: &mut A, ctx: &mut Exec<'_, A>) {
		Handler::<M>::handle(state, ctx, self.clone());
	}

	fn matches(&self, other: &dyn TimerPayload<A>) -> bool {
		other.downcast_ref::<M>().map_or(false, |other| other == self)
	}

	fn clone_box(&self) -> Box<dyn TimerPayload<A>> {
		Box::new(self.clone())
	}
}

struct TimerEntry<A: Active> {
	deadline: Instant,
	period: Duration,
	cycle: TimerCycle,
	seq: u64,
	payload: Box<dyn TimerPayload<A>>,
}

impl<A: Active> PartialEq for TimerEntry<A> {
	fn eq(&self, other: &Self) -> bool {
		self.deadline == other.deadline && self.seq == other.seq
	}
}

impl<A: Active> Eq for TimerEntry<A> {}

impl<A: Active> PartialOrd for TimerEntry<A> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<A: Active> Ord for TimerEntry<A> {
	fn cmp(&self, other: &Self) -> Ordering {
		// Reversed: BinaryHeap is a max-heap and the earliest deadline must
		// surface first; equal deadlines fire in insertion order.
		other
			.deadline
			.cmp(&self.deadline)
			.then_with(|| other.seq.cmp(&self.seq))
	}
}

/// Pending timers for one active object. Owned by the worker thread;
/// off-thread starts and stops arrive as control envelopes.
pub(crate) struct TimerSet<A: Active> {
	heap: BinaryHeap<TimerEntry<A>>,
	seq: u64,
}

impl<A: Active> TimerSet<A> {
	pub(crate) fn new() -> Self {
		Self {
			heap: BinaryHeap::new(),
			seq: 0,
		}
	}

	/// Arm a timer keyed by (type of `value`, `value`), replacing any timer
	/// with an equal key.
	pub(crate) fn start<M>(&mut self, value: M, period: Duration, cycle: TimerCycle, now: Instant)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		self.stop(&value);
		self.seq += 1;
		self.heap.push(TimerEntry {
			deadline: now + period,
			period,
			cycle,
			seq: self.seq,
			payload: Box::new(value),
		});
	}

	/// Disarm the timer keyed by `value`; unknown keys are a no-op.
	pub(crate) fn stop<M>(&mut self, value: &M)
	where
		M: Clone + PartialEq + Send + 'static,
		A: Handler<M>,
	{
		self.heap.retain(|entry| !entry.payload.matches(value));
	}

	pub(crate) fn next_deadline(&self) -> Option<Instant> {
		self.heap.peek().map(|entry| entry.deadline)
	}

	/// Take the next timer due at or before `now`, if any.
	///
	/// A periodic entry is re-armed at `deadline + period` before its payload
	/// is returned, so a `timer_stop` issued from the fired handler cancels
	/// the re-armed instance. One-shot entries are gone before their handler
	/// runs.
	pub(crate) fn pop_due(&mut self, now: Instant) -> Option<Box<dyn TimerPayload<A>>> {
		if self.heap.peek().map_or(true, |entry| entry.deadline > now) {
			return None;
		}
		let entry = self.heap.pop()?;
		if entry.cycle == TimerCycle::Periodic {
			self.seq += 1;
			self.heap.push(TimerEntry {
				deadline: entry.deadline + entry.period,
				period: entry.period,
				cycle: entry.cycle,
				seq: self.seq,
				payload: entry.payload.clone_box(),
			});
		}
		Some(entry.payload)
	}

	pub(crate) fn clear(&mut self) {
		self.heap.clear();
	}

	#[cfg(test)]
	fn len(&self) -> usize {
		self.heap.len()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;
	use std::time::Instant;

	use super::TimerCycle;
	use super::TimerSet;
	use crate::active::Active;
	use crate::active::Init;
	use crate::handler::Exec;
	use crate::handler::Handler;

	struct Probe;

	impl Active for Probe {
		type Spec = ();

		fn init(_ctx: Init<'_, Self>) -> Self {
			Probe
		}
	}

	impl Handler<u32> for Probe {
		fn handle(&mut self, _ctx: &mut Exec<'_, Self>, _msg: u32) {}
	}

	impl Handler<&'static str> for Probe {
		fn handle(&mut self, _ctx: &mut Exec<'_, Self>, _msg: &'static str) {}
	}

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	#[test]
	fn pops_in_deadline_order() {
		let now = Instant::now();
		let mut timers = TimerSet::<Probe>::new();
		timers.start(30u32, ms(30), TimerCycle::OneShot, now);
		timers.start(10u32, ms(10), TimerCycle::OneShot, now);
		timers.start(20u32, ms(20), TimerCycle::OneShot, now);

		let mut fired = Vec::new();
		while let Some(payload) = timers.pop_due(now + ms(35)) {
			fired.push(*payload.downcast_ref::<u32>().unwrap());
		}
		assert_eq!(fired, vec![10, 20, 30]);
	}

	#[test]
	fn equal_deadlines_fire_in_insertion_order() {
		let now = Instant::now();
		let mut timers = TimerSet::<Probe>::new();
		timers.start(1u32, ms(10), TimerCycle::OneShot, now);
		timers.start(2u32, ms(10), TimerCycle::OneShot, now);
		timers.start(3u32, ms(10), TimerCycle::OneShot, now);

		let mut fired = Vec::new();
		while let Some(payload) = timers.pop_due(now + ms(10)) {
			fired.push(*payload.downcast_ref::<u32>().unwrap());
		}
		assert_eq!(fired, vec![1, 2, 3]);
	}

	#[test]
	fn start_replaces_equal_key() {
		let now = Instant::now();
		let mut timers = TimerSet::<Probe>::new();
		timers.start(5u32, ms(100), TimerCycle::Periodic, now);
		timers.start(5u32, ms(10), TimerCycle::Periodic, now);

		assert_eq!(timers.len(), 1);
		assert_eq!(timers.next_deadline(), Some(now + ms(10)));
	}

	#[test]
	fn same_value_different_types_coexist() {
		let now = Instant::now();
		let mut timers = TimerSet::<Probe>::new();
		timers.start(1u32, ms(10), TimerCycle::OneShot, now);
		timers.start("1", ms(10), TimerCycle::OneShot, now);

		assert_eq!(timers.len(), 2);
		timers.stop(&1u32);
		assert_eq!(timers.len(), 1);
	}

	#[test]
	fn stop_unknown_key_is_noop() {
		let now = Instant::now();
		let mut timers = TimerSet::<Probe>::new();
		timers.start(1u32, ms(10), TimerCycle::OneShot, now);
		timers.stop(&99u32);
		assert_eq!(timers.len(), 1);
	}

	#[test]
	fn periodic_rearms_at_previous_deadline_plus_period() {
		let now = Instant::now();
		let mut timers = TimerSet::<Probe>::new();
		timers.start(1u32, ms(10), TimerCycle::Periodic, now);

		// Fire well past the deadline: the re-arm anchors to the old
		// deadline, not to the observation instant.
		assert!(timers.pop_due(now + ms(25)).is_some());
		assert_eq!(timers.next_deadline(), Some(now + ms(20)));
	}

	#[test]
	fn one_shot_removed_before_fire() {
		let now = Instant::now();
		let mut timers = TimerSet::<Probe>::new();
		timers.start(1u32, ms(10), TimerCycle::OneShot, now);

		assert!(timers.pop_due(now + ms(10)).is_some());
		assert_eq!(timers.len(), 0);
		assert!(timers.pop_due(now + ms(50)).is_none());
	}
}
