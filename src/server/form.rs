//! Form coercion: urlencoded text fields into a raw configuration request
//!
//! Only type coercion happens here. Range checks belong to the validator.

use std::collections::HashMap;

use thiserror::Error;

use crate::request::RawConfigRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Missing field: {0}")]
    Missing(&'static str),

    #[error("Field {field} must be an integer, got {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Field {field} must be a checkbox value, got {value:?}")]
    InvalidBool { field: &'static str, value: String },
}

/// Parse an `application/x-www-form-urlencoded` body
pub fn parse_generate_form(body: &[u8]) -> Result<RawConfigRequest, FormError> {
    let fields: HashMap<String, String> = url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    Ok(RawConfigRequest {
        backend: required(&fields, "server_type")?.to_string(),
        sip_port: integer(&fields, "sip_port")?,
        rtp_start: integer(&fields, "rtp_start")?,
        rtp_end: integer(&fields, "rtp_end")?,
        max_attempts: integer(&fields, "max_attempts")?,
        ban_time: integer(&fields, "ban_time")?,
        enable_ssh: checkbox(&fields, "enable_ssh")?,
        enable_ipv6: checkbox(&fields, "enable_ipv6")?,
    })
}

fn required<'a>(
    fields: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, FormError> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(FormError::Missing(name))
}

fn integer(fields: &HashMap<String, String>, name: &'static str) -> Result<i64, FormError> {
    let value = required(fields, name)?;
    value.parse::<i64>().map_err(|_| FormError::InvalidInteger {
        field: name,
        value: value.to_string(),
    })
}

/// Unchecked boxes are simply absent from the submitted form
fn checkbox(fields: &HashMap<String, String>, name: &'static str) -> Result<bool, FormError> {
    let Some(value) = fields.get(name) else {
        return Ok(false);
    };

    match value.trim().to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "" | "off" | "false" | "0" | "no" => Ok(false),
        _ => Err(FormError::InvalidBool {
            field: name,
            value: value.clone(),
        }),
    }
}
