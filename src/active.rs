use std::any::type_name;
use std::panic::catch_unwind;
use std::panic::resume_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use crate::count::Count;
use crate::envelope::Envelope;
use crate::error::ActiveError;
use crate::handler::Exec;
use crate::link::Link;
use crate::mailbox::Mailbox;
use crate::mailbox::Recv;
use crate::timer::TimerSet;
use crate::weak::WeakLink;

/// An active object: its state is touched only by the worker thread that
/// owns it, and the outside world talks to it through typed messages.
///
/// Implementors define `init` plus a [`Handler`](crate::Handler) impl per
/// accepted message type; `on_start`/`on_stop` are optional hooks invoked on
/// the worker at the edges of its life.
pub trait Active: Sized + Send + 'static {
	type Spec: Send + 'static;

	/// Span entered for the lifetime of the worker thread.
	fn span(_spec: &Self::Spec) -> tracing::Span {
		tracing::info_span!("Active")
	}

	/// Build the instance on its worker thread.
	fn init(ctx: Init<'_, Self>) -> Self;

	/// First thing the worker runs after `init`; the place to arm timers
	/// and introduce this instance to its peers.
	fn on_start(&mut self, _ctx: &mut Exec<'_, Self>) {}

	/// Last thing the worker runs, on every exit path including handler
	/// panics.
	fn on_stop(&mut self, _ctx: &mut Exec<'_, Self>) {}
}

/// Initialization context. The strong [`Link`] is only borrowed: storing a
/// clone inside the instance would keep it alive forever; store a
/// [`WeakLink`](crate::WeakLink) or a callback instead.
pub struct Init<'a, A: Active> {
	pub spec: A::Spec,
	pub link: &'a Link<A>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RunState {
	Constructed,
	Started,
	Stopping,
	Stopped,
}

/// Worker-owned runtime: the mailbox consumer end, the timer set, and the
/// weak self-handle. Nothing here is ever touched off-thread.
pub(crate) struct Runtime<A: Active> {
	pub(crate) mailbox: Arc<Mailbox<Envelope<A>>>,
	pub(crate) timers: TimerSet<A>,
	pub(crate) link: WeakLink<A>,
	pub(crate) run_state: RunState,
}

impl<A: Active> Runtime<A> {
	fn new(mailbox: Arc<Mailbox<Envelope<A>>>, link: WeakLink<A>) -> Self {
		Self {
			mailbox,
			timers: TimerSet::new(),
			link,
			run_state: RunState::Constructed,
		}
	}
}

/// Spawn an instance on its own worker thread and return the strong handle.
///
/// The worker runs `init` and `on_start` before consuming any message. It
/// keeps only a weak self-handle: dropping the last external [`Link`] is
/// observed at the next dispatch boundary and stops the instance.
pub fn create<A: Active>(spec: A::Spec) -> Result<Link<A>, ActiveError> {
	let mailbox = Arc::new(Mailbox::new());
	let link = Link::new(mailbox.clone());
	let weak = link.downgrade();
	let span = A::span(&spec);
	let init_link = link.clone();

	std::thread::Builder::new()
		.name(short_name::<A>().to_string())
		.spawn(move || {
			let _guard = span.enter();
			let _count = Count::<A>::new();
			let state = match catch_unwind(AssertUnwindSafe(|| {
				A::init(Init {
					spec,
					link: &init_link,
				})
			})) {
				Ok(state) => state,
				Err(panic) => {
					mailbox.close();
					resume_unwind(panic);
				}
			};
			let rt = Runtime::new(mailbox, weak);
			drop(init_link);
			serve(rt, state);
		})
		.map_err(ActiveError::Spawn)?;

	Ok(link)
}

/// Run an instance on the caller's thread; for top-level application
/// objects. Returns the exit code, zero on a normal stop.
///
/// The caller's frame anchors the strong handle, so the only way out is a
/// `stop` issued by a handler or a peer.
pub fn run<A: Active>(spec: A::Spec) -> i32 {
	let mailbox = Arc::new(Mailbox::new());
	let link = Link::new(mailbox.clone());
	let weak = link.downgrade();
	let span = A::span(&spec);
	let _guard = span.enter();
	let _count = Count::<A>::new();

	let state = A::init(Init { spec, link: &link });
	let rt = Runtime::new(mailbox, weak);
	serve(rt, state)
}

/// The delivery loop: wait for the next envelope or the nearest timer
/// deadline, dispatch, repeat until stopped.
fn serve<A: Active>(mut rt: Runtime<A>, mut state: A) -> i32 {
	let mailbox = rt.mailbox.clone();
	rt.run_state = RunState::Started;
	tracing::debug!(active = type_name::<A>(), "started");

	let outcome = catch_unwind(AssertUnwindSafe(|| {
		{
			let mut ctx = Exec::new(&mut rt);
			state.on_start(&mut ctx);
		}

		while rt.run_state == RunState::Started {
			let deadline = rt.timers.next_deadline();
			match mailbox.recv_deadline(deadline) {
				Recv::Message(envelope) => {
					let mut ctx = Exec::new(&mut rt);
					envelope.dispatch(&mut state, &mut ctx);
				}
				Recv::TimedOut => {
					let now = Instant::now();
					while rt.run_state == RunState::Started {
						let Some(due) = rt.timers.pop_due(now) else {
							break;
						};
						let mut ctx = Exec::new(&mut rt);
						due.fire(&mut state, &mut ctx);
					}
				}
				Recv::Closed => {
					rt.run_state = RunState::Stopping;
				}
			}
		}
	}));

	rt.run_state = RunState::Stopping;
	tracing::debug!(active = type_name::<A>(), "stopping");
	let stop_outcome = catch_unwind(AssertUnwindSafe(|| {
		let mut ctx = Exec::new(&mut rt);
		state.on_stop(&mut ctx);
	}));

	// Pending one-shots never fire, periodic timers halt, and late sends
	// are dropped rather than drained.
	rt.timers.clear();
	mailbox.close();
	rt.run_state = RunState::Stopped;
	tracing::debug!(active = type_name::<A>(), "stopped");

	if let Err(panic) = outcome {
		tracing::error!(active = type_name::<A>(), "handler panicked, worker terminated");
		resume_unwind(panic);
	}
	if let Err(panic) = stop_outcome {
		resume_unwind(panic);
	}
	0
}

fn short_name<A>() -> &'static str {
	let name = type_name::<A>();
	name.rsplit("::").next().unwrap_or(name)
}
