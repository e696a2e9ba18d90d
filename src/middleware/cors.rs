//! Permissive CORS: any origin may read the API.

use crate::method::Method;
use crate::response::Response;
use crate::status::Status;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET, OPTIONS";

/// Answers a preflight request, or `None` if `method` is not `OPTIONS`.
pub fn preflight(method: Method) -> Option<Response> {
    (method == Method::Options).then(|| {
        Response::builder()
            .status(Status::NoContent)
            .header("access-control-allow-methods", ALLOW_METHODS)
            .header("access-control-allow-headers", "*")
            .header("access-control-max-age", "600")
            .no_body()
    })
}

/// Stamps the allow-origin header on an outgoing response.
pub fn apply(resp: &mut Response) {
    if resp.header("access-control-allow-origin").is_none() {
        resp.insert_header("access-control-allow-origin", ALLOW_ORIGIN);
    }
}
