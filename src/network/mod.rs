// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Network interception
//!
//! Paused fetches are handed to the context's handler chains as mutable
//! views; the browser adapter applies whatever they changed.

mod handlers;
mod intercept;

pub use handlers::{EventHandler, Handlers, JsHandler, RequestHandler, ResponseHandler};
pub use intercept::{InterceptedHttpRequest, InterceptedHttpResponse};
