use std::collections::HashMap;

use actix_web::{http::header, web, HttpMessage, HttpRequest, HttpResponse};
use log::{debug, trace};
use serde_json::Value;
use thriftsy_gateways::CallbackFields;

/// Collects every parameter a gateway callback carries, whether it arrived in the query string, as a form post, or
/// as a JSON body. Query parameters win over body fields of the same name.
pub fn callback_fields(req: &HttpRequest, body: &[u8]) -> CallbackFields {
    let mut fields = urlencoded_fields(req.query_string());
    if body.is_empty() {
        return fields;
    }
    let body_fields = if req.content_type().eq_ignore_ascii_case("application/json") {
        serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| CallbackFields::from_json(&v).ok())
            .unwrap_or_else(|| {
                debug!("💻️ Callback body claimed to be JSON but was not a JSON object. Ignoring it.");
                CallbackFields::default()
            })
    } else {
        match std::str::from_utf8(body) {
            Ok(s) => urlencoded_fields(s),
            Err(e) => {
                debug!("💻️ Callback body is not valid UTF-8. Ignoring it. {e}");
                CallbackFields::default()
            },
        }
    };
    fields.merge(body_fields);
    trace!("💻️ Callback fields: {fields:?}");
    fields
}

fn urlencoded_fields(s: &str) -> CallbackFields {
    if s.is_empty() {
        return CallbackFields::default();
    }
    web::Query::<HashMap<String, String>>::from_query(s)
        .map(|q| CallbackFields::from(q.into_inner()))
        .unwrap_or_else(|e| {
            debug!("💻️ Could not parse url-encoded callback parameters. {e}");
            CallbackFields::default()
        })
}

/// A `302 Found` to `location`.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().insert_header((header::LOCATION, location)).finish()
}
