use serde::Serialize;
use thiserror::Error;

use crate::models::FieldErrors;

pub const DEFAULT_FETCH_ERROR: &str = "データの取得に失敗しました";
pub const DEFAULT_SAVE_ERROR: &str = "受注の保存中にエラーが発生しました";
pub const DEFAULT_DELETE_ERROR: &str = "受注の削除中にエラーが発生しました";
pub const DEFAULT_VALIDATION_ERROR: &str = "入力内容に誤りがあります";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{}", first_message(.0))]
    Validation(FieldErrors),

    #[error("通信エラーが発生しました: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Server { status: u16, message: String },
}

impl ClientError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ClientError::Validation(errors)
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ClientError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Server { status, .. } => Some(*status),
            ClientError::Network(err) => err.status().map(|s| s.as_u16()),
            ClientError::Validation(_) => None,
        }
    }
}

fn first_message(errors: &FieldErrors) -> String {
    errors
        .values()
        .flat_map(|messages| messages.iter())
        .next()
        .cloned()
        .unwrap_or_else(|| DEFAULT_VALIDATION_ERROR.to_string())
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Server,
    State,
}

/// Error payload returned to the web view: a banner message plus inline
/// messages for the inputs they belong to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
    pub fields: FieldErrors,
}

impl CommandError {
    pub fn state(message: impl Into<String>) -> Self {
        CommandError {
            kind: ErrorKind::State,
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }
}

impl From<ClientError> for CommandError {
    fn from(err: ClientError) -> Self {
        let message = err.to_string();
        match err {
            ClientError::Validation(fields) => CommandError {
                kind: ErrorKind::Validation,
                message,
                fields,
            },
            ClientError::Network(_) => CommandError {
                kind: ErrorKind::Network,
                message,
                fields: FieldErrors::new(),
            },
            ClientError::Server { .. } => CommandError {
                kind: ErrorKind::Server,
                message,
                fields: FieldErrors::new(),
            },
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_displays_first_field_message() {
        let err = ClientError::validation("customer_name", "顧客名は必須です");
        assert_eq!(err.to_string(), "顧客名は必須です");
        assert!(err.field_errors().is_some());
    }

    #[test]
    fn empty_validation_falls_back_to_default() {
        let err = ClientError::Validation(FieldErrors::new());
        assert_eq!(err.to_string(), DEFAULT_VALIDATION_ERROR);
    }

    #[test]
    fn server_error_becomes_banner() {
        let err = ClientError::Server {
            status: 404,
            message: DEFAULT_DELETE_ERROR.to_string(),
        };
        assert_eq!(err.status(), Some(404));
        let banner = CommandError::from(err);
        assert_eq!(banner.kind, ErrorKind::Server);
        assert_eq!(banner.message, DEFAULT_DELETE_ERROR);
        assert!(banner.fields.is_empty());
    }
}
