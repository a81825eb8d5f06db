pub mod classifier;
pub mod dispatcher;
pub mod google;
pub mod pool;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use classifier::{classify, FailureClass};
pub use dispatcher::{DispatchOutcome, Dispatcher, Exhaustion};
pub use google::GeminiBackend;
pub use pool::{Credential, CredentialInfo, CredentialPool};
pub use traits::{GenerationBackend, GenerationRequest, GenerationResponse};
pub use util::credentials_from_env;
