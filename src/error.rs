#[derive(thiserror::Error, Debug)]
pub enum ActiveError {
	#[error("failed to spawn worker thread: {0}")]
	Spawn(#[from] std::io::Error),
}
