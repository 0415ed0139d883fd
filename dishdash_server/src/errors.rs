use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use dishdash_engine::traits::{
    DeliveryError,
    LocationError,
    NotificationError,
    OrderFlowError,
    OutboxError,
    PaymentApiError,
    ProfileError,
};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The payment processor could not be reached. {0}")]
    PaymentGatewayError(String),
    #[error("Webhook rejected. {0}")]
    WebhookRejected(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::CouldNotIssueToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            // The processor retries anything that isn't a 2xx
            Self::WebhookRejected(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Could not sign an access token. {0}")]
    CouldNotIssueToken(String),
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            OrderFlowError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::Validation(_) => Self::ValidationError(e.to_string()),
            OrderFlowError::InvalidTransition { .. } |
            OrderFlowError::Conflict(_) |
            OrderFlowError::PaymentNotCompleted(_) => Self::Conflict(e.to_string()),
        }
    }
}

impl From<DeliveryError> for ServerError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            DeliveryError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            DeliveryError::Validation(_) => Self::ValidationError(e.to_string()),
            DeliveryError::NotYourDelivery(_) => Self::InsufficientPermissions(e.to_string()),
            DeliveryError::InvalidTransition { .. } |
            DeliveryError::AlreadyActive(_) |
            DeliveryError::AlreadyRated(_) |
            DeliveryError::NotRateable(_) |
            DeliveryError::Conflict(_) => Self::Conflict(e.to_string()),
        }
    }
}

impl From<PaymentApiError> for ServerError {
    fn from(e: PaymentApiError) -> Self {
        match e {
            PaymentApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            PaymentApiError::Validation(_) => Self::ValidationError(e.to_string()),
            PaymentApiError::Gateway(s) => Self::PaymentGatewayError(s),
            PaymentApiError::WebhookSignature(_) | PaymentApiError::MalformedEvent(_) => {
                Self::WebhookRejected(e.to_string())
            },
            PaymentApiError::DuplicateIntent(_) => Self::Conflict(e.to_string()),
        }
    }
}

impl From<NotificationError> for ServerError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            NotificationError::Validation(_) => Self::ValidationError(e.to_string()),
            NotificationError::NotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}

impl From<LocationError> for ServerError {
    fn from(e: LocationError) -> Self {
        match e {
            LocationError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            LocationError::Validation(_) => Self::ValidationError(e.to_string()),
            LocationError::NotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}

impl From<ProfileError> for ServerError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            ProfileError::Validation(_) => Self::ValidationError(e.to_string()),
            ProfileError::NotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}

impl From<OutboxError> for ServerError {
    fn from(e: OutboxError) -> Self {
        Self::BackendError(e.to_string())
    }
}
