use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicPtr;
use std::sync::atomic::Ordering;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;

/// Outcome of a consumer-side receive.
pub(crate) enum Recv<T> {
	Message(T),
	TimedOut,
	Closed,
}

struct Node<T> {
	next: AtomicPtr<Node<T>>,
	value: Option<T>,
}

impl<T> Node<T> {
	fn alloc(value: Option<T>) -> *mut Node<T> {
		Box::into_raw(Box::new(Node {
			next: AtomicPtr::new(ptr::null_mut()),
			value,
		}))
	}
}

/// Intrusive lock-free MPSC queue.
///
/// Producers publish by swapping `tail` and linking the new node from the
/// previous one. The consumer alone walks `head`, which always points at a
/// stub node whose value has already been taken. Between a producer's swap
/// and its link store the consumer can observe an empty `next` while the
/// queue is logically non-empty; `pop` reports empty and the mailbox-level
/// arrival flag (set after the link) re-wakes the consumer.
struct MpscQueue<T> {
	head: AtomicPtr<Node<T>>,
	tail: AtomicPtr<Node<T>>,
}

impl<T> MpscQueue<T> {
	fn new() -> Self {
		let stub = Node::alloc(None);
		Self {
			head: AtomicPtr::new(stub),
			tail: AtomicPtr::new(stub),
		}
	}

	/// Enqueue from any thread.
	fn push(&self, value: T) {
		let node = Node::alloc(Some(value));
		let prev = self.tail.swap(node, Ordering::AcqRel);
		// SAFETY: `prev` is a live node. Nodes are freed only by the consumer
		// once it has moved past them, and it cannot move past `prev` before
		// this store makes `prev.next` non-null.
		unsafe { (*prev).next.store(node, Ordering::Release) };
	}

	/// Dequeue. Single-consumer only.
	fn pop(&self) -> Option<T> {
		let stub = self.head.load(Ordering::Relaxed);
		// SAFETY: `head` always points at the stub node, owned by the consumer.
		let next = unsafe { (*stub).next.load(Ordering::Acquire) };
		if next.is_null() {
			return None;
		}
		// SAFETY: `next` was fully initialized before the producer's release
		// store that published it. Promoting it to stub transfers exclusive
		// ownership of the old stub to us.
		let value = unsafe { (*next).value.take() };
		self.head.store(next, Ordering::Relaxed);
		// SAFETY: the old stub is unreachable from both ends of the queue.
		drop(unsafe { Box::from_raw(stub) });
		value
	}
}

impl<T> Drop for MpscQueue<T> {
	fn drop(&mut self) {
		let mut cursor = self.head.load(Ordering::Relaxed);
		while !cursor.is_null() {
			// SAFETY: we have exclusive access during drop and every node in
			// the chain was allocated through `Node::alloc`.
			let node = unsafe { Box::from_raw(cursor) };
			cursor = node.next.load(Ordering::Relaxed);
		}
	}
}

// SAFETY: values only move through the queue; nodes are never shared between
// threads outside the atomic head/tail protocol above.
unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

/// Unbounded MPSC mailbox with a sleeping consumer.
///
/// Producers never block. The consumer parks on a condvar when the queue is
/// empty; producers advertise publication through `arrived` and only take the
/// sleep lock when the consumer has declared itself sleeping, so the wakeup
/// cost is amortized away on the hot path.
pub(crate) struct Mailbox<T> {
	queue: MpscQueue<T>,
	closed: AtomicBool,
	arrived: AtomicBool,
	sleeping: AtomicBool,
	lock: Mutex<()>,
	wake: Condvar,
}

impl<T> Mailbox<T> {
	pub(crate) fn new() -> Self {
		Self {
			queue: MpscQueue::new(),
			closed: AtomicBool::new(false),
			arrived: AtomicBool::new(false),
			sleeping: AtomicBool::new(false),
			lock: Mutex::new(()),
			wake: Condvar::new(),
		}
	}

	/// Enqueue from any thread. Returns `false` when the mailbox is closed
	/// and the value was dropped.
	pub(crate) fn send(&self, value: T) -> bool {
		if self.closed.load(Ordering::Acquire) {
			return false;
		}
		self.queue.push(value);
		self.arrived.store(true, Ordering::Release);
		if self.sleeping.load(Ordering::Acquire) {
			let _held = self.lock.lock();
			self.wake.notify_one();
		}
		true
	}

	/// Idempotent. Remaining messages are not drained; subsequent sends are
	/// dropped.
	pub(crate) fn close(&self) {
		if !self.closed.swap(true, Ordering::AcqRel) {
			let _held = self.lock.lock();
			self.wake.notify_one();
		}
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Consumer-side receive, owner thread only.
	///
	/// Blocks until a message arrives, the mailbox closes, or `deadline`
	/// elapses. A pending message always wins over an elapsed deadline.
	pub(crate) fn recv_deadline(&self, deadline: Option<Instant>) -> Recv<T> {
		loop {
			if self.closed.load(Ordering::Acquire) {
				return Recv::Closed;
			}
			if let Some(value) = self.queue.pop() {
				return Recv::Message(value);
			}

			let mut guard = self.lock.lock();
			self.sleeping.store(true, Ordering::Release);
			// Recheck under the lock: a producer that published before we
			// advertised sleeping will not signal.
			if self.arrived.swap(false, Ordering::AcqRel) || self.closed.load(Ordering::Acquire) {
				self.sleeping.store(false, Ordering::Release);
				continue;
			}
			let timed_out = match deadline {
				Some(deadline) => self.wake.wait_until(&mut guard, deadline).timed_out(),
				None => {
					self.wake.wait(&mut guard);
					false
				}
			};
			self.sleeping.store(false, Ordering::Release);
			drop(guard);

			if timed_out {
				// Message first: a payload that raced the deadline wins.
				if let Some(value) = self.queue.pop() {
					return Recv::Message(value);
				}
				return Recv::TimedOut;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::thread;
	use std::time::Duration;
	use std::time::Instant;

	use super::Mailbox;
	use super::Recv;

	#[test]
	fn delivers_in_order() {
		let mailbox = Mailbox::new();
		for n in 0..100 {
			assert!(mailbox.send(n));
		}
		for n in 0..100 {
			match mailbox.recv_deadline(None) {
				Recv::Message(value) => assert_eq!(value, n),
				_ => panic!("expected message {n}"),
			}
		}
	}

	#[test]
	fn times_out_when_empty() {
		let mailbox = Mailbox::<i32>::new();
		let start = Instant::now();
		let deadline = start + Duration::from_millis(30);
		assert!(matches!(mailbox.recv_deadline(Some(deadline)), Recv::TimedOut));
		assert!(start.elapsed() >= Duration::from_millis(30));
	}

	#[test]
	fn pending_message_beats_elapsed_deadline() {
		let mailbox = Mailbox::new();
		assert!(mailbox.send(7));
		let past = Instant::now() - Duration::from_millis(10);
		assert!(matches!(mailbox.recv_deadline(Some(past)), Recv::Message(7)));
	}

	#[test]
	fn close_wakes_blocked_consumer() {
		let mailbox = Arc::new(Mailbox::<i32>::new());
		let consumer = {
			let mailbox = mailbox.clone();
			thread::spawn(move || matches!(mailbox.recv_deadline(None), Recv::Closed))
		};
		thread::sleep(Duration::from_millis(30));
		mailbox.close();
		assert!(consumer.join().unwrap());
	}

	#[test]
	fn send_after_close_is_dropped() {
		let mailbox = Mailbox::new();
		mailbox.close();
		mailbox.close();
		assert!(!mailbox.send(1));
		assert!(matches!(mailbox.recv_deadline(None), Recv::Closed));
	}

	#[test]
	fn producer_wakes_sleeping_consumer() {
		let mailbox = Arc::new(Mailbox::new());
		let consumer = {
			let mailbox = mailbox.clone();
			thread::spawn(move || match mailbox.recv_deadline(None) {
				Recv::Message(value) => value,
				_ => panic!("expected message"),
			})
		};
		thread::sleep(Duration::from_millis(40));
		assert!(mailbox.send(42));
		assert_eq!(consumer.join().unwrap(), 42);
	}

	#[test]
	fn per_producer_order_survives_contention() {
		let mailbox = Arc::new(Mailbox::new());
		let producers: Vec<_> = (0..4u32)
			.map(|id| {
				let mailbox = mailbox.clone();
				thread::spawn(move || {
					for seq in 0..250u32 {
						assert!(mailbox.send((id, seq)));
					}
				})
			})
			.collect();
		for producer in producers {
			producer.join().unwrap();
		}

		let mut last = [None::<u32>; 4];
		for _ in 0..1000 {
			match mailbox.recv_deadline(Some(Instant::now() + Duration::from_secs(1))) {
				Recv::Message((id, seq)) => {
					let slot = &mut last[id as usize];
					assert!(slot.map_or(true, |prev| prev < seq));
					*slot = Some(seq);
				}
				_ => panic!("queue drained early"),
			}
		}
		assert!(last.iter().all(|slot| *slot == Some(249)));
	}
}
