//! RPC channel to the locator: session handling, documents, version gate

pub mod document;
pub mod mock;
pub mod session;
pub mod transport;
pub mod versions;

pub use document::{ConfigDocument, ConfigValue, Document};
pub use session::SessionClient;
pub use transport::{HttpTransport, RpcTransport};
pub use versions::{ModuleVersion, ModuleVersions, REQUIRED_MODULE_VERSIONS, check_module_versions};
