use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
  #[error("Invalid job id `{0}`")]
  InvalidJobId(String),

  #[error("Job {0} not found")]
  NotFound(String),

  #[error("Job {0} is already running")]
  Conflict(String),

  #[error(transparent)]
  Docstream(#[from] docstream::Error),
}

impl ServerError {
  pub fn status(&self) -> StatusCode {
    match self {
      ServerError::InvalidJobId(_) => StatusCode::BAD_REQUEST,
      ServerError::NotFound(_) => StatusCode::NOT_FOUND,
      ServerError::Conflict(_) => StatusCode::CONFLICT,
      ServerError::Docstream(docstream::Error::ConfigError(_)) => {
        StatusCode::UNPROCESSABLE_ENTITY
      }
      ServerError::Docstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ServerError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      log::error!("Request failed: {}", self);
    }

    let body = Json(serde_json::json!({ "error": self.to_string() }));

    (status, body).into_response()
  }
}
