//! pipedis
//! =======
//!
//! Pipedis is a RESP2 client for Rust with typed commands and pipelining.
//!
//! ## Making a query
//!
//! For most use cases the [`Client`](crate::Client) is the only thing you need to know.
//! Each command returns a [`Response`](crate::client::Response),
//! which is ready right away unless the client is capturing a pipeline.
//!
//! ```
//! # helper::with_client(|mut client| async move {
//! client.set("doctest_lib_query_1", "42").await?;
//! let res = client.incr("doctest_lib_query_1").await?.ready();
//! assert_eq!(Some(43), res);
//! # Ok(())})?; Ok::<(), helper::BoxError>(())
//! ```
//!
//! ## Pipelining
//!
//! While capturing, commands are queued instead of being sent.
//! The results are taken from the [`Batch`](crate::pipeline::Batch) with the slots.
//!
//! ```
//! # helper::with_client(|mut client| async move {
//! client.pipeline()?;
//! let set = client.set("doctest_lib_pipeline_1", "1").await?.into_slot().unwrap();
//! let get = client.get("doctest_lib_pipeline_1").await?.into_slot().unwrap();
//! let mut batch = client.execute_pipeline().await?.unwrap();
//!
//! batch.take(set)?;
//! assert_eq!(Some(bstr::BString::from("1")), batch.take(get)?);
//! # Ok(())})?; Ok::<(), helper::BoxError>(())
//! ```
//!
//! ## Making a custom query
//!
//! You may want to call some query which is not supported as a method.
//! Requests are serialized into arguments and replies are deserialized using [`serde`].
//!
//! ```no_run
//! # helper::with_client(|mut client| async move {
//! # #[derive(serde::Deserialize)] struct MyStruct;
//! let res: Option<MyStruct> = client
//!     .raw_command(&("SOMECUSTOMCOMMAND", "ARG1", 42, "ARG2", "FOO"))
//!     .await?
//!     .ready();
//! # Ok(())})?; Ok::<(), helper::BoxError>(())
//! ```

// #![deny(missing_docs)]
#![deny(missing_debug_implementations)]

pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod pipeline;
pub mod resp2;

pub use client::Client;
pub use config::Config;
pub use error::Error;
