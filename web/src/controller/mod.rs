use serde::Serialize;
pub(crate) mod channel_controller;
pub(crate) mod health_check_controller;
pub(crate) mod publish_controller;

/// JSON envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self {
            status_code,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_serialize_api_response_wraps_data() {
        let response = ApiResponse::new(StatusCode::ACCEPTED.into(), json!({"deliveries": 3}));

        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value, json!({"status_code": 202, "data": {"deliveries": 3}}));
    }

    #[test]
    fn test_serialize_api_response_without_data_omits_the_key() {
        let response: ApiResponse<()> = ApiResponse {
            status_code: StatusCode::NO_CONTENT.into(),
            data: None,
        };

        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value, json!({"status_code": 204}));
    }
}
