//! Gzip compression of scrape responses for clients that accept it.
use std::io::{
    self,
    Cursor,
    Write,
};

use flate2::write::GzEncoder;
use flate2::Compression;
use rocket::fairing::{
    Fairing,
    Info,
    Kind,
};
use rocket::http::{
    Header,
    Status,
};
use rocket::{
    Request,
    Response,
};
use tracing::{
    debug,
    error,
};

/// Response fairing that gzips successful bodies when the request's `Accept-Encoding` allows it.
///
/// Scrapers normally ask for gzip, so compressing here keeps payload size and scrape latency close
/// to what a real sidecar endpoint produces.
pub struct Gzip;

/// Whether any `Accept-Encoding` value lists gzip (or `*`) without a zero quality.
pub fn accepts_gzip<'a>(values: impl IntoIterator<Item = &'a str>) -> bool {
    values.into_iter().flat_map(|v| v.split(',')).any(|coding| {
        let mut params = coding.split(';').map(str::trim);
        let name = params.next().unwrap_or_default();
        let refused = params.any(|p| p.strip_prefix("q=").and_then(|q| q.parse::<f32>().ok()).is_some_and(|q| q <= 0.0));
        (name.eq_ignore_ascii_case("gzip") || name == "*") && !refused
    })
}

/// Gzip `body` at the default compression level.
pub fn compress(body: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 4), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

/// Replace a response whose body was already consumed with an empty 500.
fn fail(response: &mut Response<'_>) {
    response.set_status(Status::InternalServerError);
    response.set_sized_body(0, Cursor::new(Vec::new()));
}

#[rocket::async_trait]
impl Fairing for Gzip {
    fn info(&self) -> Info {
        Info { name: "gzip", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if response.status() != Status::Ok || response.headers().contains("Content-Encoding") {
            return;
        }
        response.adjoin_header(Header::new("Vary", "Accept-Encoding"));
        if !accepts_gzip(request.headers().get("Accept-Encoding")) {
            return;
        }

        let body = match response.body_mut().to_bytes().await {
            Ok(body) => body,
            Err(err) => {
                error!(%err, "failed to read response body");
                fail(response);
                return;
            },
        };

        let plain = body.len();
        match rocket::tokio::task::spawn_blocking(move || compress(&body)).await {
            Ok(Ok(gz)) => {
                debug!(plain, gzipped = gz.len(), "compressed response");
                response.set_header(Header::new("Content-Encoding", "gzip"));
                response.set_sized_body(gz.len(), Cursor::new(gz));
            },
            Ok(Err(err)) => {
                error!(%err, "failed to gzip response");
                fail(response);
            },
            Err(err) => {
                error!(%err, "gzip task panicked");
                fail(response);
            },
        }
    }
}
