use crate::command::Request;
use crate::error::{KeeperError, RpcError};

#[derive(serde::Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    pub(super) jsonrpc: &'static str,
    pub(super) id: u64,
    pub(super) method: &'static str,
    pub(super) params: &'a [serde_json::Value],
}

impl<'a> From<&'a Request> for JsonRpcRequest<'a> {
    fn from(request: &'a Request) -> Self {
        Self {
            jsonrpc: "2.0",
            id: request.id,
            method: request.method,
            params: &request.params,
        }
    }
}

#[derive(serde::Deserialize)]
pub(super) struct JsonRpcResponse {
    pub(super) result: Option<serde_json::Value>,
    pub(super) error: Option<serde_json::Value>,
}

#[derive(serde::Deserialize)]
pub(super) struct JsonRpcResponseOwned {
    pub(super) id: serde_json::Value,
    pub(super) result: Option<serde_json::Value>,
    pub(super) error: Option<serde_json::Value>,
}

/// Parse a JSON-RPC error value into a structured `KeeperError`.
///
/// Errors shaped `{"code": <int>, "message": <string>}` are logical
/// rejections reported by the daemon (`ServerError`). Anything else means
/// we are not talking to the daemon we expect, which is `InvalidResponse`.
pub(super) fn parse_jsonrpc_error(err: serde_json::Value) -> KeeperError {
    #[derive(serde::Deserialize)]
    struct JsonRpcError {
        code: i64,
        message: String,
    }

    match serde_json::from_value::<JsonRpcError>(err.clone()) {
        Ok(parsed) => RpcError::ServerError {
            code: parsed.code,
            message: parsed.message,
        }
        .into(),
        Err(_) => RpcError::InvalidResponse(format!("non-standard JSON-RPC error: {err}")).into(),
    }
}

/// A response with neither `error` nor `result` is treated as a `null`
/// result, which is how `ping` and similar procedures answer.
pub(super) fn into_result(
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
) -> Result<serde_json::Value, KeeperError> {
    match error {
        Some(err) if !err.is_null() => Err(parse_jsonrpc_error(err)),
        _ => Ok(result.unwrap_or(serde_json::Value::Null)),
    }
}

pub(super) fn parse_batch_id(id: &serde_json::Value) -> Result<u64, KeeperError> {
    if let Some(n) = id.as_u64() {
        return Ok(n);
    }

    if let Some(s) = id.as_str() {
        return s.parse::<u64>().map_err(|e| {
            RpcError::InvalidResponse(format!("invalid batch response id string: {e}")).into()
        });
    }

    Err(RpcError::InvalidResponse(format!("invalid batch response id: {id}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_batch_id_u64() {
        let val = serde_json::json!(42);
        assert_eq!(parse_batch_id(&val).expect("should parse"), 42);
    }

    #[test]
    fn parse_batch_id_string() {
        let val = serde_json::json!("123");
        assert_eq!(parse_batch_id(&val).expect("should parse"), 123);
    }

    #[test]
    fn parse_batch_id_invalid() {
        let val = serde_json::json!(true);
        assert!(parse_batch_id(&val).is_err());
    }

    #[test]
    fn standard_error_object_is_logical() {
        let err = parse_jsonrpc_error(serde_json::json!({
            "code": -6,
            "message": "Account has insufficient funds"
        }));
        assert!(matches!(
            err,
            KeeperError::Rpc(RpcError::ServerError { code: -6, ref message })
                if message == "Account has insufficient funds"
        ));
        assert!(!err.is_connectivity());
    }

    #[test]
    fn non_standard_error_is_connectivity() {
        let err = parse_jsonrpc_error(serde_json::json!("boom"));
        assert!(err.is_connectivity());
    }

    #[test]
    fn null_error_field_yields_result() {
        let value = into_result(Some(serde_json::json!(812)), Some(serde_json::Value::Null))
            .expect("null error is success");
        assert_eq!(value, serde_json::json!(812));
        let empty = into_result(None, None).expect("missing result is null");
        assert!(empty.is_null());
    }

    #[test]
    fn request_body_carries_version_id_method_params() {
        let request = Request {
            id: 9,
            method: "getblockcount",
            params: Vec::new(),
        };
        let body = serde_json::to_value(JsonRpcRequest::from(&request)).expect("serializable");
        assert_eq!(
            body,
            serde_json::json!({"jsonrpc": "2.0", "id": 9, "method": "getblockcount", "params": []})
        );
    }
}
