use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	#[error("Unsupported selector: {0:?}")]
	UnsupportedSelector(String),

	#[error("Expected an element but found {found}")]
	NotAnElement { found: String },

	#[error("Hierarchy request error: {0}")]
	HierarchyRequest(String),

	#[error("HTML parse error: {0}")]
	HtmlParse(String),

	#[error("Fetch of {url:?} failed: {message}")]
	Fetch { url: String, message: String },

	#[error("Invalid instruction: {0}")]
	InvalidInstruction(String),

	#[error("Unknown instruction method {0:?}")]
	UnknownMethod(String),

	#[error("Invalid table data: {0}")]
	InvalidTableData(String),

	#[error("Element not found: {0}")]
	NotFound(String),

	#[error("Serialization error: {0}")]
	Serialization(String),

	#[error("Host error: {0}")]
	Host(String),
}

impl From<serde_json::Error> for Error {
	fn from(error: serde_json::Error) -> Self {
		Error::Serialization(error.to_string())
	}
}
