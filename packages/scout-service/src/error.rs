use scout_domain::SourceTag;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Source {source_tag} is unavailable: {message}")]
	SourceUnavailable { source_tag: SourceTag, message: String },
	#[error("Malformed decision: {message}")]
	MalformedDecision { message: String },
	#[error("Tool {tool} failed: {message}")]
	ToolDispatch { tool: String, message: String },
	#[error("Persistence error: {message}")]
	Persistence { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Web engine unavailable: {message}")]
	EngineUnavailable { message: String },
}
impl Error {
	pub(crate) fn unavailable(source_tag: SourceTag, err: impl std::fmt::Display) -> Self {
		Self::SourceUnavailable { source_tag, message: err.to_string() }
	}
}
impl From<scout_providers::Error> for Error {
	fn from(err: scout_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<scout_storage::Error> for Error {
	fn from(err: scout_storage::Error) -> Self {
		match err {
			scout_storage::Error::Qdrant(err) => Self::Qdrant { message: err.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
