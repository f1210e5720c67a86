use std::any::type_name;
use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;

use dashmap::DashMap;

/// Per-type instance statistics.
#[derive(Debug)]
struct Stats {
	type_name: &'static str,
	total: AtomicUsize,
	max_live: AtomicUsize,
	live: AtomicUsize,
}

impl Stats {
	fn new(type_name: &'static str) -> Self {
		Self {
			type_name,
			total: AtomicUsize::new(0),
			max_live: AtomicUsize::new(0),
			live: AtomicUsize::new(0),
		}
	}
}

static COUNTS: OnceLock<DashMap<TypeId, Stats>> = OnceLock::new();

fn counts() -> &'static DashMap<TypeId, Stats> {
	COUNTS.get_or_init(DashMap::new)
}

/// A guard counting live instances of `T`; each worker thread holds one for
/// the lifetime of its active object.
#[derive(Debug)]
pub(crate) struct Count<T: 'static> {
	_phantom: PhantomData<T>,
}

impl<T: 'static> Count<T> {
	pub(crate) fn new() -> Self {
		let entry = counts()
			.entry(TypeId::of::<T>())
			.or_insert_with(|| Stats::new(type_name::<T>()));

		entry.total.fetch_add(1, Ordering::Relaxed);
		let live = entry.live.fetch_add(1, Ordering::Relaxed) + 1;
		entry.max_live.fetch_max(live, Ordering::Relaxed);

		Self {
			_phantom: PhantomData,
		}
	}
}

impl<T: 'static> Drop for Count<T> {
	fn drop(&mut self) {
		if let Some(entry) = counts().get(&TypeId::of::<T>()) {
			entry.live.fetch_sub(1, Ordering::Relaxed);
		}
	}
}

/// Live instances of `T` right now.
#[allow(dead_code)]
pub(crate) fn live<T: 'static>() -> usize {
	counts()
		.get(&TypeId::of::<T>())
		.map_or(0, |entry| entry.live.load(Ordering::Relaxed))
}

/// One line per instance type: `name total=N max_live=N live=N`.
#[allow(dead_code)]
pub(crate) fn report_string() -> String {
	let mut lines: Vec<String> = counts()
		.iter()
		.map(|entry| {
			let stats = entry.value();
			format!(
				"{} total={} max_live={} live={}",
				stats.type_name,
				stats.total.load(Ordering::Relaxed),
				stats.max_live.load(Ordering::Relaxed),
				stats.live.load(Ordering::Relaxed),
			)
		})
		.collect();
	lines.sort();
	lines.join("\n")
}

#[cfg(test)]
mod tests {
	use super::live;
	use super::report_string;
	use super::Count;

	struct Marker;

	#[test]
	fn tracks_live_instances() {
		assert_eq!(live::<Marker>(), 0);
		let first = Count::<Marker>::new();
		let second = Count::<Marker>::new();
		assert_eq!(live::<Marker>(), 2);
		drop(first);
		assert_eq!(live::<Marker>(), 1);
		assert!(report_string().contains("Marker total=2 max_live=2 live=1"));
		drop(second);
		assert_eq!(live::<Marker>(), 0);
	}
}
