//! Client for the local question-answering service
//!
//! The service itself is opaque. Responses are JSON objects that carry at
//! least a `response` or an `error`/`message` field; nothing else is assumed
//! to be present.

use crate::config::OverlayConfig;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// A successful answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskResult {
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Server,
    Unknown,
}

impl ErrorKind {
    fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            400..=499 => ErrorKind::BadRequest,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        }
    }
}

/// An error reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResult {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Please input a question.")]
    EmptyQuestion,

    #[error("Please enter a game name.")]
    MissingGame,

    #[error("Error connecting to server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error ({0})")]
    Service(ErrorResult),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// Body of `POST /ask`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub text: String,
    pub game_name: String,
    pub is_pdf_mode: bool,
}

impl AskRequest {
    /// A question about a game; the game name is appended to the question
    pub fn about_game(question: &str, game: &str) -> Result<Self, BackendError> {
        let question = question.trim();
        let game = game.trim();
        if question.is_empty() {
            return Err(BackendError::EmptyQuestion);
        }
        if game.is_empty() {
            return Err(BackendError::MissingGame);
        }
        Ok(AskRequest {
            text: format!("{} {}", question, game),
            game_name: game.to_string(),
            is_pdf_mode: false,
        })
    }

    /// A question scoped to an uploaded document
    pub fn about_document(question: &str, document: &str) -> Result<Self, BackendError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(BackendError::EmptyQuestion);
        }
        Ok(AskRequest {
            text: question.to_string(),
            game_name: document.trim().to_string(),
            is_pdf_mode: true,
        })
    }
}

fn string_field<'a>(value: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| value.get(*name).and_then(Value::as_str))
}

/// Interpret an `/ask` reply. Never panics on missing or odd fields.
pub fn parse_ask_response(status: u16, body: &str) -> Result<AskResult, BackendError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| BackendError::Malformed(format!("status {}: {}", status, e)))?;

    let success = (200..300).contains(&status);
    if success {
        if let Some(response) = string_field(&value, &["response"]) {
            return Ok(AskResult {
                response: response.to_string(),
            });
        }
    }

    if let Some(message) = string_field(&value, &["error", "message", "detail"]) {
        return Err(BackendError::Service(ErrorResult {
            kind: ErrorKind::from_status(status),
            message: message.to_string(),
        }));
    }

    if success {
        Err(BackendError::Malformed("no response field".to_string()))
    } else {
        Err(BackendError::Service(ErrorResult {
            kind: ErrorKind::from_status(status),
            message: format!("HTTP {}", status),
        }))
    }
}

/// Interpret a `/detect_game` reply. A blank name means nothing is running.
pub fn parse_detected_game(body: &str) -> Result<Option<String>, BackendError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;
    Ok(string_field(&value, &["gameName"])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string))
}

/// Blocking HTTP client for the service
pub struct BackendClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &OverlayConfig) -> Result<Self, BackendError> {
        Self::new(
            &config.backend_url,
            Duration::from_secs(config.backend_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Succeeds if the service answers with a 2xx status
    pub fn ping(&self) -> Result<(), BackendError> {
        let response = self.http.get(self.url("ping")).send()?;
        let status = response.status().as_u16();
        debug!("Ping returned {}", status);
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Service(ErrorResult {
                kind: ErrorKind::from_status(status),
                message: format!("ping returned HTTP {}", status),
            }))
        }
    }

    /// The game the service sees running, if any
    pub fn detect_game(&self) -> Result<Option<String>, BackendError> {
        let body = self.http.get(self.url("detect_game")).send()?.text()?;
        let game = parse_detected_game(&body)?;
        info!("Detected game: {:?}", game);
        Ok(game)
    }

    pub fn ask(&self, request: &AskRequest) -> Result<AskResult, BackendError> {
        let body = serde_json::to_string(request)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        debug!("Asking: {}", request.text);

        let response = self
            .http
            .post(self.url("ask"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        parse_ask_response(status, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_request_body() {
        let request = AskRequest::about_game("  how do I parry? ", "Elden Ring").unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["text"], "how do I parry? Elden Ring");
        assert_eq!(json["gameName"], "Elden Ring");
        assert_eq!(json["isPdfMode"], false);
    }

    #[test]
    fn test_document_request_body() {
        let request = AskRequest::about_document("what is chapter 2?", "manual.pdf").unwrap();
        assert_eq!(request.text, "what is chapter 2?");
        assert_eq!(request.game_name, "manual.pdf");
        assert!(request.is_pdf_mode);
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(
            AskRequest::about_game("   ", "Doom"),
            Err(BackendError::EmptyQuestion)
        ));
        assert!(matches!(
            AskRequest::about_game("best weapon?", " "),
            Err(BackendError::MissingGame)
        ));
        assert!(matches!(
            AskRequest::about_document("", "manual.pdf"),
            Err(BackendError::EmptyQuestion)
        ));
    }

    #[test]
    fn test_parse_success() {
        let result = parse_ask_response(200, r#"{"response": "Use the shield."}"#).unwrap();
        assert_eq!(result.response, "Use the shield.");
    }

    #[test]
    fn test_parse_error_fields() {
        let err = parse_ask_response(400, r#"{"error": "no document loaded"}"#).unwrap_err();
        match err {
            BackendError::Service(result) => {
                assert_eq!(result.kind, ErrorKind::BadRequest);
                assert_eq!(result.message, "no document loaded");
            }
            other => panic!("unexpected: {:?}", other),
        }

        let err = parse_ask_response(200, r#"{"message": "model offline"}"#).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Service(ErrorResult { kind: ErrorKind::Unknown, .. })
        ));

        let err = parse_ask_response(503, r#"{}"#).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Service(ErrorResult { kind: ErrorKind::Server, .. })
        ));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_ask_response(200, "<html>"),
            Err(BackendError::Malformed(_))
        ));
        assert!(matches!(
            parse_ask_response(200, r#"{"response": 42}"#),
            Err(BackendError::Malformed(_))
        ));
    }

    #[test]
    fn test_detected_game() {
        assert_eq!(
            parse_detected_game(r#"{"gameName": " Hades "}"#).unwrap(),
            Some("Hades".to_string())
        );
        assert_eq!(parse_detected_game(r#"{"gameName": ""}"#).unwrap(), None);
        assert_eq!(parse_detected_game(r#"{"status": "idle"}"#).unwrap(), None);
        assert!(parse_detected_game("not json").is_err());
    }
}
