use std::thread;
use std::time::Duration;

use strand::create;
use strand::prelude::*;
use strand::Link;

struct Player {
	name: &'static str,
	other: Option<Link<Player>>,
}

#[derive(Debug)]
struct Connect(Link<Player>);

#[derive(Debug)]
struct Ball(u32);

impl Active for Player {
	type Spec = &'static str;

	fn span(spec: &Self::Spec) -> tracing::Span {
		tracing::info_span!("player", name = *spec)
	}

	fn init(ctx: Init<'_, Self>) -> Self {
		Player {
			name: ctx.spec,
			other: None,
		}
	}

	fn on_start(&mut self, _ctx: &mut Exec<'_, Self>) {
		tracing::info!("{} ready", self.name);
	}
}

impl Handler<Connect> for Player {
	fn handle(&mut self, _ctx: &mut Exec<'_, Self>, msg: Connect) {
		self.other = Some(msg.0);

		// The ping side serves once both players know each other.
		if self.name == "ping" {
			if let Some(other) = &self.other {
				tracing::info!("{} serves ball #1", self.name);
				other.send(Ball(1));
			}
		}
	}
}

impl Handler<Ball> for Player {
	fn handle(&mut self, ctx: &mut Exec<'_, Self>, msg: Ball) {
		tracing::info!("{} receives ball #{}", self.name, msg.0);

		let Some(other) = &self.other else {
			return;
		};
		if msg.0 < 10 {
			other.send(Ball(msg.0 + 1));
		} else {
			tracing::info!("{} ends the game at ball #{}", self.name, msg.0);
			other.stop();
			ctx.stop();
		}
	}
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt::init();

	let ping = create::<Player>("ping")?;
	let pong = create::<Player>("pong")?;

	ping.send(Connect(pong.clone()));
	pong.send(Connect(ping.clone()));

	thread::sleep(Duration::from_secs(2));
	Ok(())
}
