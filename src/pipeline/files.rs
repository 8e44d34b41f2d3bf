//! File responses
//!
//! Bodies are looked up in the content cache under (hash, encoding). On a
//! miss the identity body is read through the site's filesystem, compressed
//! if the client negotiated an encoding and the type is worth it, and
//! offered back to the cache. Files the cache would never keep are streamed
//! instead of buffered.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{
    HeaderMap, HeaderName, ACCEPT_ENCODING, ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_ENCODING,
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    LAST_MODIFIED, RANGE, VARY,
};
use http::{HeaderValue, Method, Response, StatusCode};
use std::sync::Arc;
use tokio::io::AsyncSeekExt;
use tracing::{debug, error, warn};

use super::range::parse_range_header;
use super::{text_response, Body, FileStream, Handler, PipelineContext, RequestContext};
use crate::cache::ContentKey;
use crate::compression::{compress, is_compressible, negotiate_compression, Compression};
use crate::constants::CACHE_CONTROL_VALUE;
use crate::metrics::Metrics;
use crate::resolver::Site;
use crate::vfs::{clean_path, read_to_bytes, FileInfo, FsError};

/// Last handler of every pipeline
pub struct FileServer {
    site: Arc<Site>,
    ctx: PipelineContext,
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// IMF-fixdate, e.g. `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

fn etag_matches(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

/// `If-None-Match` wins over `If-Modified-Since` when both are present.
fn is_not_modified(req: &RequestContext, etag: &str, mod_time: DateTime<Utc>) -> bool {
    if let Some(if_none_match) = req.header(IF_NONE_MATCH) {
        return etag_matches(if_none_match, etag);
    }
    req.header(IF_MODIFIED_SINCE)
        .and_then(parse_http_date)
        .map_or(false, |since| mod_time.timestamp() <= since.timestamp())
}

fn content_type_for(path: &str, info: &FileInfo) -> String {
    if info.content_type.is_empty() {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string()
    } else {
        info.content_type.clone()
    }
}

impl FileServer {
    pub fn new(site: Arc<Site>, ctx: PipelineContext) -> Self {
        Self { site, ctx }
    }

    fn internal_error(&self, req: &RequestContext, path: &str, err: &FsError) -> Response<Body> {
        error!(
            request_id = %req.request_id(),
            site = %self.site.id,
            path = %path,
            error = %err,
            "failed to serve file"
        );
        text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error\n")
    }

    /// 404, with the site's custom page when it has one.
    async fn not_found(&self, req: &RequestContext) -> Response<Body> {
        if let Some(page) = &self.site.config.not_found {
            let fs = self.site.fs.as_ref();
            match fs.stat(page).await {
                Ok(info) if !info.is_dir => match self.identity_body(page, &info).await {
                    Ok(body) => {
                        let mut response = Response::new(body);
                        *response.status_mut() = StatusCode::NOT_FOUND;
                        let headers = response.headers_mut();
                        set_header(headers, CONTENT_TYPE, &content_type_for(page, &info));
                        headers.insert(CONTENT_LENGTH, HeaderValue::from(info.size));
                        return strip_body_for_head(req, response);
                    }
                    Err(e) => warn!(site = %self.site.id, page = %page, error = %e, "failed to read not-found page"),
                },
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    debug!(site = %self.site.id, page = %page, "not-found page missing")
                }
                Err(e) => warn!(site = %self.site.id, page = %page, error = %e, "failed to stat not-found page"),
            }
        }
        strip_body_for_head(
            req,
            text_response(StatusCode::NOT_FOUND, "404 page not found\n"),
        )
    }

    /// Uncompressed bytes, from the cache or read in full and offered to it.
    async fn cached_identity(&self, path: &str, info: &FileInfo) -> Result<Bytes, FsError> {
        let cache = &self.ctx.content_cache;
        let key = ContentKey::identity(info.hash.as_str());
        if let Some(body) = cache.get(&key).await {
            Metrics::global().record_content_cache("hit");
            return Ok(body);
        }
        Metrics::global().record_content_cache("miss");

        let body = read_to_bytes(self.site.fs.as_ref(), path).await?;
        if body.len() as u64 != info.size {
            return Err(FsError::Read {
                path: path.to_string(),
                message: format!("expected {} bytes, read {}", info.size, body.len()),
            });
        }

        if cache.accepts(info.size) {
            cache.set(key, body.clone()).await;
            Metrics::global().record_content_cache("set");
        }
        Ok(body)
    }

    /// Uncompressed body. Files the cache would never keep are streamed.
    async fn identity_body(&self, path: &str, info: &FileInfo) -> Result<Body, FsError> {
        if !self.ctx.content_cache.accepts(info.size) {
            let file = self.site.fs.open(path).await?;
            return Ok(Body::Stream(FileStream::new(file, info.size)));
        }
        Ok(Body::Full(self.cached_identity(path, info).await?))
    }

    /// Body in `encoding`; falls back to identity when compression fails or
    /// does not pay off.
    async fn encoded_body(
        &self,
        path: &str,
        info: &FileInfo,
        encoding: Option<Compression>,
    ) -> Result<(Body, Option<Compression>), FsError> {
        let Some(algo) = encoding else {
            return Ok((self.identity_body(path, info).await?, None));
        };

        let cache = &self.ctx.content_cache;
        let key = ContentKey::new(info.hash.as_str(), Some(algo));
        if let Some(body) = cache.get(&key).await {
            Metrics::global().record_content_cache("hit");
            return Ok((Body::Full(body), Some(algo)));
        }
        Metrics::global().record_content_cache("miss");

        let identity = self.cached_identity(path, info).await?;
        let level = self.ctx.compression.level_for(algo);
        let input = identity.clone();
        let compressed = tokio::task::spawn_blocking(move || compress(&input, algo, level)).await;

        match compressed {
            Ok(Ok(compressed)) if compressed.len() < identity.len() => {
                let body = Bytes::from(compressed);
                if cache.accepts(body.len() as u64) {
                    cache.set(key, body.clone()).await;
                    Metrics::global().record_content_cache("set");
                }
                Ok((Body::Full(body), Some(algo)))
            }
            Ok(Ok(_)) => Ok((Body::Full(identity), None)),
            Ok(Err(e)) => {
                warn!(path = %path, encoding = %algo, error = %e, "compression failed");
                Ok((Body::Full(identity), None))
            }
            Err(e) => {
                warn!(path = %path, encoding = %algo, error = %e, "compression task failed");
                Ok((Body::Full(identity), None))
            }
        }
    }

    /// Bytes `first..=last`, sliced from a cached body or streamed after a
    /// seek.
    async fn range_body(
        &self,
        path: &str,
        info: &FileInfo,
        first: u64,
        last: u64,
    ) -> Result<Body, FsError> {
        if let Some(body) = self
            .ctx
            .content_cache
            .get(&ContentKey::identity(info.hash.as_str()))
            .await
        {
            if body.len() as u64 == info.size {
                return Ok(Body::Full(body.slice(first as usize..=last as usize)));
            }
        }

        let mut file = self.site.fs.open(path).await?;
        file.seek(std::io::SeekFrom::Start(first))
            .await
            .map_err(|e| FsError::read(path, e))?;
        Ok(Body::Stream(FileStream::new(file, last - first + 1)))
    }

    /// Inclusive byte range requested and applicable to this response.
    /// `Err(())` means the range cannot be satisfied.
    fn requested_range(
        req: &RequestContext,
        etag: &str,
        info: &FileInfo,
    ) -> Option<Result<(u64, u64), ()>> {
        let header = parse_range_header(req.header(RANGE)?)?;
        if let Some(if_range) = req.header(IF_RANGE) {
            if if_range.trim() != etag {
                return None;
            }
        }
        let range = header.single_bytes_range()?;
        Some(range.resolve(info.size).ok_or(()))
    }
}

fn strip_body_for_head(req: &RequestContext, mut response: Response<Body>) -> Response<Body> {
    if req.method() == Method::HEAD {
        *response.body_mut() = Body::empty();
    }
    response
}

#[async_trait]
impl Handler for FileServer {
    async fn handle(&self, req: RequestContext) -> Response<Body> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            let mut response =
                text_response(StatusCode::METHOD_NOT_ALLOWED, "405 method not allowed\n");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let path = clean_path(req.path());
        let info = match self.site.fs.stat(&path).await {
            Ok(info) if !info.is_dir => info,
            Ok(_) => return self.not_found(&req).await,
            Err(e) if e.is_not_found() => return self.not_found(&req).await,
            Err(e) => return self.internal_error(&req, &path, &e),
        };

        let etag = format!("\"{}\"", info.hash);
        let content_type = content_type_for(&path, &info);
        let compressible = is_compressible(&content_type);

        let mut headers = HeaderMap::new();
        set_header(&mut headers, ETAG, &etag);
        set_header(&mut headers, LAST_MODIFIED, &http_date(info.mod_time));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
        if compressible {
            headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
        }

        if is_not_modified(&req, &etag, info.mod_time) {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NOT_MODIFIED;
            *response.headers_mut() = headers;
            return response;
        }

        set_header(&mut headers, CONTENT_TYPE, &content_type);
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        if let Some(range) = Self::requested_range(&req, &etag, &info) {
            let (first, last) = match range {
                Ok(range) => range,
                Err(()) => {
                    let mut response =
                        text_response(StatusCode::RANGE_NOT_SATISFIABLE, "416 range not satisfiable\n");
                    set_header(
                        response.headers_mut(),
                        CONTENT_RANGE,
                        &format!("bytes */{}", info.size),
                    );
                    return response;
                }
            };

            let body = match self.range_body(&path, &info, first, last).await {
                Ok(body) => body,
                Err(e) => return self.internal_error(&req, &path, &e),
            };
            set_header(
                &mut headers,
                CONTENT_RANGE,
                &format!("bytes {}-{}/{}", first, last, info.size),
            );
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

            let mut response = Response::new(body);
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            *response.headers_mut() = headers;
            return strip_body_for_head(&req, response);
        }

        let encoding = if compressible && self.ctx.compression.size_in_range(info.size) {
            negotiate_compression(req.header(ACCEPT_ENCODING), &self.ctx.compression)
        } else {
            None
        };

        let (body, encoding) = match self.encoded_body(&path, &info, encoding).await {
            Ok(result) => result,
            Err(e) if e.is_not_found() => return self.not_found(&req).await,
            Err(e) => return self.internal_error(&req, &path, &e),
        };

        if let Some(algo) = encoding {
            headers.insert(
                CONTENT_ENCODING,
                HeaderValue::from_static(algo.to_header_value()),
            );
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::OK;
        *response.headers_mut() = headers;
        strip_body_for_head(&req, response)
    }
}
