//! Request dispatch
//!
//! Resolves `(service, method)` against the registry and runs the handler.
//! A panicking handler is contained here and reported as a fault, so one
//! bad request never takes the server down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, debug_span, error, warn};

use crate::args::Args;
use crate::error::OnvifError;
use crate::registry::{Service, ServiceRegistry};

#[derive(Debug)]
pub struct Dispatcher {
    registry: ServiceRegistry,
}

impl Dispatcher {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Run the handler registered for the pair and return its response fragment
    pub fn dispatch(&self, service: Service, method: &str, args: &Args) -> Result<String, OnvifError> {
        let span = debug_span!("dispatch", %service, method);
        let _enter = span.enter();

        let Some(handler) = self.registry.get(service, method) else {
            warn!("Unknown action");
            return Err(OnvifError::UnknownAction {
                service: service.to_string(),
                method: method.to_string(),
            });
        };

        debug!("Dispatching");
        match panic::catch_unwind(AssertUnwindSafe(|| handler(args))) {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => {
                warn!(error = %e, "Handler returned fault");
                Err(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Handler panicked");
                Err(OnvifError::Internal(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
