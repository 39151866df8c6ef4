use serde::Deserialize;

use crate::error::{ChatError, Result};

/// `code` value the backend uses for logical success.
pub const SUCCESS_CODE: i32 = 1000;

/// Response wrapper used by every storefront endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Success is decided by `code`, never by the HTTP status.
    pub fn into_result(self) -> Result<Option<T>> {
        if self.code == SUCCESS_CODE {
            Ok(self.result)
        } else {
            Err(ChatError::Api {
                code: self.code,
                message: self
                    .message
                    .unwrap_or_else(|| "request rejected".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_code_yields_result() {
        let envelope: ApiResponse<Vec<i32>> =
            serde_json::from_str(r#"{"code":1000,"result":[1,2]}"#).unwrap();
        assert_eq!(envelope.into_result().unwrap(), Some(vec![1, 2]));
    }

    #[test]
    fn other_codes_are_errors_even_with_result() {
        let envelope: ApiResponse<Vec<i32>> =
            serde_json::from_str(r#"{"code":1005,"message":"Unauthenticated","result":[]}"#)
                .unwrap();
        match envelope.into_result() {
            Err(ChatError::Api { code, message }) => {
                assert_eq!(code, 1005);
                assert_eq!(message, "Unauthenticated");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_result_is_none() {
        let envelope: ApiResponse<String> = serde_json::from_str(r#"{"code":1000}"#).unwrap();
        assert_eq!(envelope.into_result().unwrap(), None);
    }
}
