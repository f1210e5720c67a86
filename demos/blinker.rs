use std::time::Duration;

use strand::prelude::*;

/// Top-level application object: runs on the main thread via `strand::run`
/// and stops itself after a handful of timer expiries.
struct Blinker {
	blinks: u32,
	target: u32,
}

#[derive(Clone, Debug, PartialEq)]
struct Blink;

impl Active for Blinker {
	type Spec = u32;

	fn init(ctx: Init<'_, Self>) -> Self {
		Blinker {
			blinks: 0,
			target: ctx.spec,
		}
	}

	fn on_start(&mut self, ctx: &mut Exec<'_, Self>) {
		tracing::info!(blinks = self.target, "blinker started");
		ctx.timer_start(Blink, Duration::from_millis(200), TimerCycle::Periodic);
	}

	fn on_stop(&mut self, _ctx: &mut Exec<'_, Self>) {
		tracing::info!("blinker done");
	}
}

impl Handler<Blink> for Blinker {
	fn handle(&mut self, ctx: &mut Exec<'_, Self>, _msg: Blink) {
		self.blinks += 1;
		tracing::info!(blink = self.blinks, "tick");
		if self.blinks == self.target {
			ctx.stop();
		}
	}
}

fn main() {
	tracing_subscriber::fmt::init();
	let code = strand::run::<Blinker>(5);
	std::process::exit(code);
}
