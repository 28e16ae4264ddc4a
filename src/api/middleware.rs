//! Caller-scope middleware.
//!
//! Every request must say which tenant and facility it operates on; the
//! staff session is optional (endpoints that need an identity fail with 401
//! themselves when none resolves). The scope travels as an extension so no
//! handler reads ambient state.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::access::CareContext;
use crate::api::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const FACILITY_HEADER: &str = "x-facility-id";
pub const STAFF_HEADER: &str = "x-staff-id";

/// Build the [`CareContext`] from request headers and inject it.
pub async fn require_scope(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let ctx = scope_from_headers(request.headers())?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

fn scope_from_headers(headers: &HeaderMap) -> Result<CareContext, ApiError> {
    let tenant_id = header_value(headers, TENANT_HEADER)?
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {TENANT_HEADER} header")))?;
    let facility_id = header_value(headers, FACILITY_HEADER)?
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {FACILITY_HEADER} header")))?;

    let mut ctx = CareContext::new(tenant_id, facility_id);
    if let Some(staff) = header_value(headers, STAFF_HEADER)? {
        let staff_id = Uuid::parse_str(&staff)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {STAFF_HEADER} header")))?;
        ctx = ctx.with_session(staff_id);
    }
    Ok(ctx)
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, ApiError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|s| Some(s.to_string()))
            .map_err(|_| ApiError::BadRequest(format!("Invalid {name} header"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn full_scope_parses() {
        let staff = Uuid::new_v4();
        let map = headers(&[
            (TENANT_HEADER, "tn-1"),
            (FACILITY_HEADER, "fc-1"),
            (STAFF_HEADER, &staff.to_string()),
        ]);
        let ctx = scope_from_headers(&map).unwrap();
        assert_eq!(ctx.tenant_id, "tn-1");
        assert_eq!(ctx.facility_id, "fc-1");
        assert_eq!(ctx.session_staff_id, Some(staff));
    }

    #[test]
    fn staff_header_is_optional() {
        let map = headers(&[(TENANT_HEADER, "tn-1"), (FACILITY_HEADER, "fc-1")]);
        let ctx = scope_from_headers(&map).unwrap();
        assert!(ctx.session_staff_id.is_none());
    }

    #[test]
    fn missing_tenant_or_facility_is_rejected() {
        let map = headers(&[(FACILITY_HEADER, "fc-1")]);
        assert!(matches!(scope_from_headers(&map), Err(ApiError::BadRequest(_))));

        let map = headers(&[(TENANT_HEADER, "tn-1")]);
        assert!(matches!(scope_from_headers(&map), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn malformed_staff_id_is_rejected() {
        let map = headers(&[
            (TENANT_HEADER, "tn-1"),
            (FACILITY_HEADER, "fc-1"),
            (STAFF_HEADER, "not-a-uuid"),
        ]);
        assert!(matches!(scope_from_headers(&map), Err(ApiError::BadRequest(_))));
    }
}
