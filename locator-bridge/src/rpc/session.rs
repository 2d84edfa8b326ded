//! Authenticated session with the locator
//!
//! All RPC traffic goes through one [`SessionClient`]. Calls are serialized:
//! the transport sits behind a mutex, so at most one call is outstanding. The
//! session token is held separately behind a read/write lock so the refresh
//! timer and the control surface can read it without waiting on a call.

use super::document::{ConfigDocument, Document};
use super::transport::RpcTransport;
use super::versions::{ModuleVersion, ModuleVersions};
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};

/// Session lifetime requested at login (seconds)
pub const SESSION_TIMEOUT_SECS: u64 = 60;

pub struct SessionClient {
    transport: Mutex<Box<dyn RpcTransport>>,
    session_id: RwLock<Option<String>>,
}

impl SessionClient {
    pub fn new(transport: impl RpcTransport + 'static) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    pub fn from_boxed(transport: Box<dyn RpcTransport>) -> Self {
        Self {
            transport: Mutex::new(transport),
            session_id: RwLock::new(None),
        }
    }

    fn invoke(&self, method: &str, query: Document) -> Result<Document> {
        let response = self.transport.lock().invoke(method, query)?;
        match response.get_i64("responseCode") {
            None | Some(0) => Ok(response),
            Some(code) => Err(Error::Rpc {
                method: method.to_string(),
                reason: format!("response code {}", code),
            }),
        }
    }

    /// Log in and store the session token
    pub fn login(&self, user: &str, password: &str) -> Result<()> {
        let query = Document::new()
            .with(
                "timeout",
                json!({"valid": true, "time": SESSION_TIMEOUT_SECS, "resolution": 1}),
            )
            .with("userName", user)
            .with("password", password);

        let response = match self.invoke("sessionLogin", query) {
            Ok(response) => response,
            Err(Error::Rpc { reason, .. }) => return Err(Error::Auth(reason)),
            Err(e) => return Err(e),
        };

        let session_id = response
            .get_str("sessionId")
            .ok_or_else(|| Error::Auth("login response carries no sessionId".to_string()))?;
        *self.session_id.write() = Some(session_id.to_string());
        log::info!("Logged in to locator as '{}'", user);
        Ok(())
    }

    /// Extend the current session
    ///
    /// Fails with [`Error::NotLoggedIn`] if there is no session; never logs in.
    pub fn refresh(&self) -> Result<()> {
        let query = self.get_session_query()?;
        self.invoke("sessionRefresh", query)?;
        log::debug!("Session refreshed");
        Ok(())
    }

    /// End the session; the token is dropped even if the call fails
    pub fn logout(&self) -> Result<()> {
        let Some(session_id) = self.session_id.write().take() else {
            return Ok(());
        };
        self.invoke("sessionLogout", Document::new().with("sessionId", session_id))?;
        log::info!("Logged out of locator");
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.session_id.read().is_some()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Query document carrying the session token
    pub fn get_session_query(&self) -> Result<Document> {
        let session_id = self.session_id().ok_or(Error::NotLoggedIn)?;
        Ok(Document::new().with("sessionId", session_id))
    }

    /// Authenticated call of `method`
    ///
    /// The session token is added to `query` if the caller did not set it.
    /// Response fields are method specific; callers check for presence.
    pub fn call(&self, method: &str, mut query: Document) -> Result<Document> {
        if !query.has("sessionId") {
            let session_id = self.session_id().ok_or(Error::NotLoggedIn)?;
            query.set("sessionId", session_id);
        }
        self.invoke(method, query)
    }

    /// Module versions reported by the locator
    pub fn get_about_modules(&self) -> Result<ModuleVersions> {
        let response = self.call("aboutModules", Document::new())?;
        let entries = response.get_array("moduleVersions").ok_or_else(|| Error::Rpc {
            method: "aboutModules".to_string(),
            reason: "response carries no moduleVersions".to_string(),
        })?;

        let mut modules = ModuleVersions::new();
        for entry in entries {
            let name = entry.get("moduleName").and_then(Value::as_str);
            let version = entry.get("moduleVersion");
            let major = version.and_then(|v| v.get("major")).and_then(Value::as_u64);
            let minor = version.and_then(|v| v.get("minor")).and_then(Value::as_u64);
            match (name, major, minor) {
                (Some(name), Some(major), Some(minor)) => {
                    modules.insert(name.to_string(), ModuleVersion::new(major, minor));
                }
                _ => log::warn!("Ignoring malformed module version entry: {}", entry),
            }
        }
        Ok(modules)
    }

    /// Full locator configuration
    pub fn get_config_list(&self) -> Result<ConfigDocument> {
        let response = self.call("configList", Document::new())?;
        let entries = response.get_array("configEntries").ok_or_else(|| Error::Rpc {
            method: "configList".to_string(),
            reason: "response carries no configEntries".to_string(),
        })?;
        ConfigDocument::from_entries(entries)
    }

    /// Write `config` to the locator
    pub fn set_config_list(&self, config: &ConfigDocument) -> Result<()> {
        let query = Document::new().with("configEntries", config.to_entries());
        self.call("configSet", query)?;
        Ok(())
    }

    /// Display string of one config entry
    pub fn get_config_entry(&self, name: &str) -> Result<String> {
        let config = self.get_config_list()?;
        config
            .get(name)
            .map(ToString::to_string)
            .ok_or_else(|| Error::ConfigEntryMissing(name.to_string()))
    }
}
