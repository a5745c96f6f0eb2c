use super::{Capability, CapabilityError, CapabilityResult, Extensions};
use crate::context::Context;
use http::header::{HeaderName, HeaderValue, LOCATION};
use http::StatusCode;
use serde_json::Value;

/// Register the built-in capabilities
pub(crate) fn register(extensions: &mut Extensions) {
    extensions
        .add("mode", Capability::contextual(mode))
        .add("store", Capability::contextual(store))
        .add("start", Capability::contextual(start))
        .add("release", Capability::contextual(release))
        .add("serveplain", Capability::contextual(serve_plain))
        .add("servejson", Capability::contextual(serve_json))
        .add("redirect", Capability::contextual(redirect))
        .add("header", Capability::contextual(header));
}

fn arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a Value, CapabilityError> {
    args.get(index)
        .ok_or_else(|| CapabilityError::invalid(name, format!("missing argument {index}")))
}

fn str_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str, CapabilityError> {
    arg(name, args, index)?
        .as_str()
        .ok_or_else(|| CapabilityError::invalid(name, format!("argument {index} must be a string")))
}

fn status_arg(name: &str, args: &[Value], index: usize) -> Result<StatusCode, CapabilityError> {
    let code = arg(name, args, index)?
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| CapabilityError::invalid(name, format!("argument {index} must be a status code")))?;
    StatusCode::from_u16(code).map_err(|e| CapabilityError::invalid(name, e.to_string()))
}

fn mode(ctx: &mut Context, _args: &[Value]) -> CapabilityResult {
    serde_json::to_value(ctx.env().modes).map_err(|e| CapabilityError::failed("mode", e))
}

fn store(ctx: &mut Context, args: &[Value]) -> CapabilityResult {
    let key = str_arg("store", args, 0)?;
    ctx.env()
        .store
        .get(key)
        .map(|item| Value::String(item.value.clone()))
        .ok_or_else(|| CapabilityError::NotFound {
            name: format!("store.{key}"),
        })
}

fn start(ctx: &mut Context, _args: &[Value]) -> CapabilityResult {
    let sid = ctx
        .start_session()
        .map_err(|e| CapabilityError::failed("start", e))?;
    Ok(sid.map_or(Value::Null, Value::String))
}

fn release(ctx: &mut Context, _args: &[Value]) -> CapabilityResult {
    ctx.release_session();
    ctx.cancel();
    Ok(Value::Null)
}

fn serve_plain(ctx: &mut Context, args: &[Value]) -> CapabilityResult {
    let status = status_arg("serveplain", args, 0)?;
    let body = match arg("serveplain", args, 1)? {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let written = ctx
        .serve_plain(status, &body)
        .map_err(|e| CapabilityError::failed("serveplain", e))?;
    Ok(Value::from(written))
}

fn serve_json(ctx: &mut Context, args: &[Value]) -> CapabilityResult {
    let status = status_arg("servejson", args, 0)?;
    let body = arg("servejson", args, 1)?;
    let written = ctx
        .serve_json(status, body)
        .map_err(|e| CapabilityError::failed("servejson", e))?;
    Ok(Value::from(written))
}

fn redirect(ctx: &mut Context, args: &[Value]) -> CapabilityResult {
    let status = status_arg("redirect", args, 0)?;
    if !status.is_redirection() {
        return Err(CapabilityError::invalid(
            "redirect",
            format!("{status} is not a redirect status"),
        ));
    }
    let location = HeaderValue::from_str(str_arg("redirect", args, 1)?)
        .map_err(|e| CapabilityError::invalid("redirect", e.to_string()))?;
    let response = ctx.response();
    response.insert_header(LOCATION, location);
    response.set_status(status);
    response
        .write_header()
        .map_err(|e| CapabilityError::failed("redirect", e))?;
    Ok(Value::Null)
}

fn header(ctx: &mut Context, args: &[Value]) -> CapabilityResult {
    let name = HeaderName::from_bytes(str_arg("header", args, 0)?.as_bytes())
        .map_err(|e| CapabilityError::invalid("header", e.to_string()))?;
    let value = HeaderValue::from_str(str_arg("header", args, 1)?)
        .map_err(|e| CapabilityError::invalid("header", e.to_string()))?;
    ctx.response().insert_header(name, value);
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_arg_validation() {
        assert_eq!(
            status_arg("t", &[json!(404)], 0).unwrap(),
            StatusCode::NOT_FOUND
        );
        assert!(status_arg("t", &[json!("404")], 0).is_err());
        assert!(status_arg("t", &[json!(70000)], 0).is_err());
        assert!(status_arg("t", &[], 0).is_err());
    }

    #[test]
    fn test_register_adds_every_builtin() {
        let mut extensions = Extensions::new();
        register(&mut extensions);
        assert_eq!(
            extensions.names(),
            vec![
                "header",
                "mode",
                "redirect",
                "release",
                "servejson",
                "serveplain",
                "start",
                "store"
            ]
        );
    }
}
