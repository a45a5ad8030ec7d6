//! ONVIF fault and startup error types

use thiserror::Error;

use crate::model::EntityKind;
use crate::registry::Service;

/// Why a mutation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Attempt to delete a fixed profile
    DeletionOfFixedProfile,
    /// Attempt to change a structural binding of a fixed profile
    FixedProfile,
    /// Configuration is referenced by at least one profile
    InUse,
    /// Requested profile token already issued
    ProfileExists,
    /// Profile lacks a configuration the operation needs
    IncompleteConfiguration,
    /// Configuration kind cannot be created or deleted at runtime
    StaticConfiguration,
}

impl ConflictKind {
    pub fn subcode(&self) -> &'static str {
        match self {
            ConflictKind::DeletionOfFixedProfile => "ter:DeletionOfFixedProfile",
            ConflictKind::ProfileExists => "ter:ProfileExists",
            ConflictKind::IncompleteConfiguration => "ter:IncompleteConfiguration",
            ConflictKind::FixedProfile
            | ConflictKind::InUse
            | ConflictKind::StaticConfiguration => "ter:ConfigurationConflict",
        }
    }
}

/// Faults raised by the store, services and dispatcher
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OnvifError {
    /// Unknown token
    #[error("{kind} '{token}' not found")]
    NotFound { kind: EntityKind, token: String },

    /// Value outside the advertised options or malformed argument
    #[error("Invalid argument {field}: {reason}")]
    InvalidArgs { field: String, reason: String },

    /// Mutation would violate a use-count or fixed-profile invariant
    #[error("{reason}")]
    Conflict { kind: ConflictKind, reason: String },

    /// No handler registered for the pair
    #[error("Action not supported: {service}.{method}")]
    UnknownAction { service: String, method: String },

    /// Unexpected handler failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OnvifError {
    pub fn not_found(kind: EntityKind, token: impl Into<String>) -> Self {
        OnvifError::NotFound {
            kind,
            token: token.into(),
        }
    }

    pub fn invalid_arg(field: impl Into<String>, reason: impl Into<String>) -> Self {
        OnvifError::InvalidArgs {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict(kind: ConflictKind, reason: impl Into<String>) -> Self {
        OnvifError::Conflict {
            kind,
            reason: reason.into(),
        }
    }

    /// Map to the SOAP fault the transport renders
    pub fn fault(&self) -> Fault {
        let reason = self.to_string();
        match self {
            OnvifError::NotFound { kind, .. } => Fault {
                code: FaultCode::Sender,
                subcode: "ter:InvalidArgVal",
                detail: Some(kind.fault_detail()),
                reason,
            },
            OnvifError::InvalidArgs { .. } => Fault {
                code: FaultCode::Sender,
                subcode: "ter:InvalidArgVal",
                detail: None,
                reason,
            },
            OnvifError::Conflict { kind, .. } => Fault {
                code: FaultCode::Receiver,
                subcode: "ter:Action",
                detail: Some(kind.subcode()),
                reason,
            },
            OnvifError::UnknownAction { .. } | OnvifError::Internal(_) => Fault {
                code: FaultCode::Receiver,
                subcode: "ter:ActionNotSupported",
                detail: None,
                reason,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    Sender,
    Receiver,
}

impl FaultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::Sender => "env:Sender",
            FaultCode::Receiver => "env:Receiver",
        }
    }
}

/// Tagged fault rendered by the transport as a SOAP `Fault` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: FaultCode,
    pub subcode: &'static str,
    pub detail: Option<&'static str>,
    pub reason: String,
}

/// Startup-time failures. Fatal: the process must not accept traffic.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Handler already registered for {service}.{method}")]
    DuplicateMethod { service: Service, method: String },

    #[error("Invalid seed configuration: {0}")]
    InvalidSeed(String),

    #[error(transparent)]
    Config(#[from] config_manager::ConfigError),
}

/// Malformed SOAP request
#[derive(Debug, Error)]
pub enum SoapError {
    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Missing Body element")]
    MissingBody,

    #[error("Body element is empty")]
    EmptyBody,
}

impl SoapError {
    pub fn fault(&self) -> Fault {
        Fault {
            code: FaultCode::Sender,
            subcode: "ter:WellFormed",
            detail: None,
            reason: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_invalid_arg_val() {
        let fault = OnvifError::not_found(EntityKind::Profile, "nope").fault();
        assert_eq!(fault.code, FaultCode::Sender);
        assert_eq!(fault.subcode, "ter:InvalidArgVal");
        assert_eq!(fault.detail, Some("ter:NoProfile"));
        assert!(fault.reason.contains("nope"));
    }

    #[test]
    fn test_unknown_action_maps_to_action_not_supported() {
        let fault = OnvifError::UnknownAction {
            service: "media".to_string(),
            method: "getFoo".to_string(),
        }
        .fault();
        assert_eq!(fault.code, FaultCode::Receiver);
        assert_eq!(fault.subcode, "ter:ActionNotSupported");
    }

    #[test]
    fn test_conflict_detail() {
        let fault =
            OnvifError::conflict(ConflictKind::DeletionOfFixedProfile, "fixed").fault();
        assert_eq!(fault.subcode, "ter:Action");
        assert_eq!(fault.detail, Some("ter:DeletionOfFixedProfile"));
    }
}
