pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Backend unavailable for {modality}: {message}")]
	BackendUnavailable { modality: String, message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}

	pub(crate) fn backend(modality: impl Into<String>, err: prism_backend::Error) -> Self {
		Self::BackendUnavailable { modality: modality.into(), message: err.to_string() }
	}
}
