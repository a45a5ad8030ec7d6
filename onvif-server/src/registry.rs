//! Service registry
//!
//! Maps a typed `(Service, method)` pair to its handler. Populated once at
//! startup and read-only afterwards; a duplicate registration is a startup
//! error, never a silent overwrite.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::args::Args;
use crate::error::{ConfigurationError, OnvifError};
use crate::soap::{DEVICE_NS, MEDIA_NS, PTZ_NS};

/// ONVIF services served by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    Device,
    Media,
    Ptz,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Device, Service::Media, Service::Ptz];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Device => "device",
            Service::Media => "media",
            Service::Ptz => "ptz",
        }
    }

    /// WSDL namespace of the service
    pub fn namespace(&self) -> &'static str {
        match self {
            Service::Device => DEVICE_NS,
            Service::Media => MEDIA_NS,
            Service::Ptz => PTZ_NS,
        }
    }

    /// Response element prefix declared on every envelope
    pub fn prefix(&self) -> &'static str {
        match self {
            Service::Device => "tds",
            Service::Media => "trt",
            Service::Ptz => "tptz",
        }
    }

    /// HTTP path segment, e.g. `media_service`
    pub fn endpoint(&self) -> &'static str {
        match self {
            Service::Device => "device_service",
            Service::Media => "media_service",
            Service::Ptz => "ptz_service",
        }
    }

    pub fn from_namespace(ns: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.namespace() == ns)
    }

    /// Resolve an endpoint path segment (`media_service`) or a bare name (`media`)
    pub fn from_path(segment: &str) -> Option<Self> {
        let name = segment.strip_suffix("_service").unwrap_or(segment);
        name.parse().ok()
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "device" => Ok(Service::Device),
            "media" => Ok(Service::Media),
            "ptz" => Ok(Service::Ptz),
            other => Err(format!("unknown service: {}", other)),
        }
    }
}

/// A registered method body. Returns the response fragment placed inside
/// the SOAP `Body`.
pub type Handler = Box<dyn Fn(&Args) -> Result<String, OnvifError> + Send + Sync>;

/// Entry of a service's method table
pub type Method<S> = fn(&S, &Args) -> Result<String, OnvifError>;

/// A service implementation exposing a static method table
pub trait OnvifService: Send + Sync + 'static {
    const SERVICE: Service;

    /// lowerCamel method name and its handler
    fn methods() -> Vec<(&'static str, Method<Self>)>
    where
        Self: Sized;
}

#[derive(Default)]
pub struct ServiceRegistry {
    handlers: HashMap<(Service, String), Handler>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &mut self,
        service: Service,
        method: &str,
        handler: F,
    ) -> Result<(), ConfigurationError>
    where
        F: Fn(&Args) -> Result<String, OnvifError> + Send + Sync + 'static,
    {
        let key = (service, method.to_string());
        if self.handlers.contains_key(&key) {
            return Err(ConfigurationError::DuplicateMethod {
                service,
                method: method.to_string(),
            });
        }
        self.handlers.insert(key, Box::new(handler));
        Ok(())
    }

    /// Register every entry of the service's method table
    pub fn register_service<S: OnvifService>(
        &mut self,
        service: Arc<S>,
    ) -> Result<(), ConfigurationError> {
        for (method, f) in S::methods() {
            let svc = Arc::clone(&service);
            self.register(S::SERVICE, method, move |args| f(&svc, args))?;
        }
        Ok(())
    }

    pub fn get(&self, service: Service, method: &str) -> Option<&Handler> {
        self.handlers.get(&(service, method.to_string()))
    }

    /// Registered method names of a service, sorted
    pub fn methods(&self, service: Service) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .handlers
            .keys()
            .filter(|(s, _)| *s == service)
            .map(|(_, m)| m.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
