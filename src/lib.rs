//! Async client for the Twikey creditor API.
//!
//! The crate keeps one bearer session per [`client::Client`] with single-flight logins, drains
//! the change feeds (mandates, transactions, invoices, payment links, credit transfers) page by
//! page until they run dry, and verifies the signatures on inbound webhooks and exit URLs.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod feed;
pub mod feeds;
pub mod obs;
pub mod otp;
pub mod session;
pub mod signature;
pub mod transport;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::Client,
		config::{ClientConfig, ClientConfigBuilder},
		transport::ReqwestHttpClient,
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = Client<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Seeds a config builder pointed at a mock server base URL.
	pub fn test_config_builder(base_url: &str, api_key: &str) -> ClientConfigBuilder {
		ClientConfig::builder(api_key)
			.endpoint(Url::parse(base_url).expect("Mock server URL should parse successfully."))
	}

	/// Constructs a [`Client`] backed by the insecure reqwest transport used across integration
	/// tests.
	pub fn build_reqwest_test_client(config: ClientConfig) -> ReqwestTestClient {
		Client::with_transport(config, test_reqwest_http_client())
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
