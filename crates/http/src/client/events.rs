//! Completion-event handlers of a client exchange.

use std::time::SystemTime;

use bytes::Buf;
use http::{Method, header};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, info, trace, warn};

use crate::client::{RequestHandle, RequestStatus};
use crate::codec::{RequestHeaderEncoder, ResponseHeaderDecoder};
use crate::context::{BoxedStream, Context, EventHandler, Operation};
use crate::protocol::date::parse_date;
use crate::protocol::{Cookie, PayloadSize, has_connection_token, wants_close};

/// Largest request or response body piece moved per operation
pub(crate) const NETWORK_UNIT: usize = 8 * 1024;

type ClientContext = Context<BoxedStream, RequestHandle>;

/// Drives the [`RequestHandle`] attached to a context through its phases.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExchangeEvents;

impl EventHandler<BoxedStream, RequestHandle> for ExchangeEvents {
    fn on_pre_connect(&self, ctx: &mut ClientContext) {
        let handle = ctx.payload_mut();
        handle.status = RequestStatus::Connecting;
        let timeout = handle.timeouts.connect;
        ctx.set_timeout(timeout);
    }

    fn on_connected(&self, ctx: &mut ClientContext) -> Operation {
        ctx.cancel_timeout();

        let (handle, write_buf) = ctx.payload_and_write_buf();
        handle.status = RequestStatus::Requesting;

        let payload_size = PayloadSize::new_length(handle.request_body_size);
        if let Err(e) = RequestHeaderEncoder.encode((handle.request(), payload_size), write_buf) {
            warn!(cause = %e, "encode request head failed");
            return Operation::Close;
        }
        debug!(method = %handle.request().method(), uri = %handle.request().uri(), "request head staged");

        let timeout = handle.timeouts.request;
        ctx.set_timeout(timeout);
        Operation::Write
    }

    fn on_pre_read(&self, ctx: &mut ClientContext) {
        ctx.cancel_timeout();
    }

    fn on_read_completed(&self, ctx: &mut ClientContext, _read: usize) -> Operation {
        let response_timeout = ctx.payload().timeouts.response;
        if ctx.buffered() == 0 {
            ctx.set_timeout(response_timeout);
            return Operation::Read;
        }

        if ctx.payload().response.is_none() {
            match ResponseHeaderDecoder::new().decode(ctx.read_buf_mut()) {
                Ok(Some((head, payload_size))) => {
                    let handle = ctx.payload_mut();
                    handle.response_body_size =
                        if handle.request().method() == Method::HEAD { 0 } else { payload_size.length() };
                    debug!(status = %head.status(), body_size = handle.response_body_size, "response head received");
                    handle.response = Some(head);
                }
                Ok(None) => {
                    ctx.set_timeout(response_timeout);
                    return Operation::Read;
                }
                Err(e) => {
                    warn!(cause = %e, "parse response head failed");
                    return Operation::Close;
                }
            }
        }

        loop {
            let handle = ctx.payload();
            let remaining = handle.response_body_size - handle.response_body_handled;
            if remaining == 0 || ctx.buffered() == 0 {
                break;
            }
            let max = usize::try_from(remaining).map_or(NETWORK_UNIT, |remaining| remaining.min(NETWORK_UNIT));
            let chunk = ctx.read_bytes(max);
            ctx.payload_mut().deliver(&chunk);
        }

        let handle = ctx.payload();
        if handle.response_body_handled < handle.response_body_size {
            ctx.set_timeout(response_timeout);
            return Operation::Read;
        }

        finish(ctx)
    }

    fn on_write_completed(&self, ctx: &mut ClientContext, _written: usize) -> Operation {
        let (handle, write_buf) = ctx.payload_and_write_buf();

        if handle.request_body_handled < handle.request_body_size {
            let staged = handle.fill_body(write_buf, NETWORK_UNIT);
            if staged == 0 {
                warn!(handled = handle.request_body_handled, size = handle.request_body_size, "request body ended early");
                return Operation::Close;
            }
            let timeout = handle.timeouts.request;
            ctx.set_timeout(timeout);
            return Operation::Write;
        }

        handle.status = RequestStatus::Responding;
        let timeout = handle.timeouts.response;
        ctx.set_timeout(timeout);
        Operation::Read
    }

    fn on_timeout(&self, ctx: &mut ClientContext) {
        let handle = ctx.payload();
        warn!(status = %handle.status, address = %handle.address(), "exchange timed out");
    }
}

/// Completes a fully received response.
fn finish(ctx: &mut ClientContext) -> Operation {
    let leftover = ctx.buffered();
    if leftover > 0 {
        debug!(leftover, "discard bytes after response body");
        ctx.read_buf_mut().advance(leftover);
    }

    let handle = ctx.payload_mut();
    let Some(head) = handle.response.as_ref() else {
        return Operation::Close;
    };

    let server_date = head.headers().get(header::DATE).and_then(|value| value.to_str().ok()).and_then(parse_date);
    let reference = server_date.unwrap_or_else(SystemTime::now);
    for value in head.headers().get_all(header::SET_COOKIE) {
        let Some(mut cookie) = value.to_str().ok().and_then(Cookie::parse_set_cookie) else {
            debug!(?value, "ignore malformed set-cookie");
            continue;
        };
        cookie.update(reference);
        if cookie.is_expired(reference) {
            trace!(name = cookie.name(), "set-cookie removes cookie");
            handle.cookie_store().remove(cookie.name());
        } else {
            handle.cookie_store().add(cookie);
        }
    }

    let close = wants_close(head) || has_connection_token(handle.request().headers(), "close");

    handle.tried_times = 0;
    handle.status = RequestStatus::Succeeded;
    info!(status = %head.status(), body_size = handle.response_body_size, "exchange succeeded");
    handle.invoke_callback();

    if close { Operation::Close } else { Operation::Park }
}
