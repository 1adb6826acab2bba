//! Error types for the Maestro operator

use thiserror::Error;

/// Main error type for Maestro operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// A referenced resource does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind (Workflow, Agent, WorkflowRun)
        kind: String,
        /// Resource name
        name: String,
    },

    /// A generic object could not be converted to its typed form
    #[error("failed to convert {kind} {name}: {message}")]
    Conversion {
        /// Resource kind being converted
        kind: String,
        /// Resource name
        name: String,
        /// Underlying decode failure
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A write was based on a stale resourceVersion
    #[error("conflict writing {kind} {name}: object was modified concurrently")]
    Conflict {
        /// Resource kind being written
        kind: String,
        /// Resource name
        name: String,
    },

    /// The API server rejected creation of a derived object
    #[error("failed to create {kind} {name}: {message}")]
    Create {
        /// Kind of the derived object
        kind: String,
        /// Name of the derived object
        name: String,
        /// Reason reported by the API server
        message: String,
    },

    /// An owner reference to the WorkflowRun could not be built
    #[error("owner link error: {0}")]
    OwnerLink(String),

    /// Validation error for CRD specs
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a not-found error for the given kind and name
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a conversion error for the given kind and name
    pub fn conversion(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a conflict error for the given kind and name
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a creation error for a derived object
    pub fn create(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Create {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create an owner link error with the given message
    pub fn owner_link(msg: impl Into<String>) -> Self {
        Self::OwnerLink(msg.into())
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Classify a kube API error for a specific object
    ///
    /// 404 becomes [`Error::NotFound`] and 409 Conflict becomes
    /// [`Error::Conflict`]. Everything else is passed through as [`Error::Kube`].
    pub fn from_kube(kind: &str, name: &str, err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(ae) if ae.code == 404 => Self::not_found(kind, name),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "Conflict" => {
                Self::conflict(kind, name)
            }
            _ => Self::Kube(err),
        }
    }

    /// Returns true if the error is a missing resource
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    /// Returns true if retrying the whole reconciliation may succeed
    ///
    /// Malformed definitions and ownership failures need a spec change;
    /// everything else can clear up on its own.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Conversion { .. }
                | Self::Serialization(_)
                | Self::OwnerLink(_)
                | Self::Validation(_)
        )
    }
}

/// Returns true if a kube error reports that the object already exists
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists")
}
