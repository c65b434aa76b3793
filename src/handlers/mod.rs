//! HTTP handlers. Each one unpacks a parsed request, calls a service and
//! shapes the response; business rules stay in `services`.

pub mod bucket_handlers;
pub mod health_handlers;
pub mod object_handlers;

use crate::{errors::AppError, xml};
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};

/// Wrap a rendered XML document in a response.
fn xml_response(
    status: StatusCode,
    document: Result<String, xml::XmlError>,
) -> Result<Response, AppError> {
    let document = document.map_err(|err| AppError::internal(err.to_string()))?;
    let mut response = Response::new(Body::from(document));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(xml::CONTENT_TYPE),
    );
    Ok(response)
}

fn empty_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
