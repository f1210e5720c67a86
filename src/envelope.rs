use std::marker::PhantomData;

use crate::active::Active;
use crate::handler::Exec;
use crate::handler::Handler;

/// A type-erased unit of work bound for an active object's worker.
///
/// The dispatch thunk is baked at the `send::<M>` call site, so the worker
/// loop never inspects payload types: it hands the envelope its state and
/// context and the thunk does the rest.
pub(crate) struct Envelope<A: Active> {
	thunk: Box<dyn Dispatch<A>>,
}

pub(crate) trait Dispatch<A: Active>: Send {
	fn dispatch(self: Box<Self>, state: &mut A, ctx: &mut Exec<'_, A>);
}

impl<A: Active> Envelope<A> {
	/// Wrap a payload for delivery to the handler its static type selects.
	pub(crate) fn of<M>(value: M) -> Self
	where
		M: Send + 'static,
		A: Handler<M>,
	{
		Envelope {
			thunk: Box::new(Payload {
				value,
				_owner: PhantomData,
			}),
		}
	}

	/// Wrap a control operation (stop, timer maintenance) issued off-thread.
	pub(crate) fn control<F>(operation: F) -> Self
	where
		F: FnOnce(&mut A, &mut Exec<'_, A>) + Send + 'static,
	{
		Envelope {
			thunk: Box::new(Control(operation)),
		}
	}

	pub(crate) fn dispatch(self, state: &mut A, ctx: &mut Exec<'_, A>) {
		self.thunk.dispatch(state, ctx);
	}
}

struct Payload<M, A> {
	value: M,
	_owner: PhantomData<fn(&mut A)>,
}

impl<M, A> Dispatch<A> for Payload<M, A>
where
	M: Send + 'static,
	A: Handler<M>,
{
	fn dispatch(self: Box<Self>, state: &mut A, ctx: &mut Exec<'_, A>) {
		Handler::<M>::handle(state, ctx, self.value);
	}
}

struct Control<F>(F);

impl<A, F> Dispatch<A> for Control<F>
where
	A: Active,
	F: FnOnce(&mut A, &mut Exec<'_, A>) + Send,
{
	fn dispatch(self: Box<Self>, state: &mut A, ctx: &mut Exec<'_, A>) {
		(self.0)(state, ctx)
	}
}
