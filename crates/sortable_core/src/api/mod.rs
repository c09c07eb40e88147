//! Transport-neutral admin API.
//!
//! Front ends (HTTP adapters, the CLI) build an [`controller::ApiRequest`]
//! and forward the returned [`controller::ApiResponse`].

pub mod controller;
