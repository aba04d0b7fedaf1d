//! Client with pipelining.
//!
//! For more information, see the [`Client`](self::Client) type.

use futures_core::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::config::{Config, ErrorPolicy};
use crate::connection::Session;
use crate::connector::{AddressConnector, Connector};
use crate::error::{Error, ProtocolError, ShapeError};
use crate::pipeline::{Batch, Pipeline, Slot};
use crate::resp2::{encode, Reply, ServerError};

mod commands;

#[cfg(test)]
mod tests;

/// Client over a single lazily established session.
///
/// The client is either idle, where each command is sent right away,
/// or capturing, where commands are queued into a [`Pipeline`]
/// until [`execute_pipeline()`](Self::execute_pipeline) sends them at once.
///
/// ```no_run
/// # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), pipedis::Error> {
/// use pipedis::{Client, Config};
///
/// let mut client = Client::new(Config::default());
/// client.set("key", "value").await?;
///
/// client.pipeline()?;
/// let incr = client.incr("counter").await?.into_slot().unwrap();
/// let get = client.get("key").await?.into_slot().unwrap();
/// let mut batch = client.execute_pipeline().await?.unwrap();
///
/// println!("counter: {}", batch.take(incr)?);
/// println!("key: {:?}", batch.take(get)?);
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Client<C: Connector = AddressConnector> {
    config: Config,
    connector: C,
    session: Option<Session<C::Stream>>,
    pipeline: Option<Pipeline>,
}

/// Outcome of [`Client::execute()`].
#[derive(Debug)]
pub enum Response<T> {
    /// Interpreted reply.
    Ready(T),
    /// Error reply, returned as value with [`ErrorPolicy::ReturnAsValue`].
    Failed(ServerError),
    /// The client is capturing a pipeline, the result will be in its [`Batch`].
    Queued(Slot<T>),
}

/// Discards the pipeline if the scope ends before it is executed.
struct CaptureGuard<'a, C: Connector> {
    client: &'a mut Client<C>,
}

impl Client<AddressConnector> {
    /// Create a client for the server of the config.
    ///
    /// No connection is made until the first command.
    pub fn new(config: Config) -> Self {
        let connector = AddressConnector::new(config.server().clone());
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> Client<C> {
    /// Create a client which connects using the `connector`.
    ///
    /// The server address of the config is not used.
    pub fn with_connector(config: Config, connector: C) -> Self {
        Client {
            config,
            connector,
            session: None,
            pipeline: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns `true` while capturing a pipeline.
    pub fn is_capturing(&self) -> bool {
        self.pipeline.is_some()
    }

    async fn session(&mut self) -> Result<&mut Session<C::Stream>, Error> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                debug!("connecting");
                let stream = timeout(self.config.timeout(), self.connector.connect())
                    .await
                    .map_err(|_| Error::Timeout)??;
                Session::new(stream, self.config.timeout())
            }
        };

        Ok(self.session.insert(session))
    }

    /// Send the command, or queue it while capturing a pipeline.
    pub async fn execute<T: Send + 'static>(
        &mut self,
        command: Command<T>,
    ) -> Result<Response<T>, Error> {
        if let Some(pipeline) = &mut self.pipeline {
            trace!(command = %command.name(), "queued");
            return Ok(Response::Queued(pipeline.add_command(command)));
        }

        let frame = encode(&command);
        let reply = self
            .session()
            .await?
            .send(&frame, 1)
            .await?
            .pop()
            // send() returns exactly the expected amount of replies
            .ok_or(ProtocolError::Truncated {
                received: 0,
                expected: 1,
            })?;
        match reply.into_result() {
            Ok(reply) => command.interpret(reply).map(Response::Ready).map_err(|source| {
                ShapeError {
                    command: command.name().into(),
                    position: None,
                    source,
                }
                .into()
            }),
            Err(err) => match self.config.error_policy() {
                ErrorPolicy::Raise => Err(Error::Server(err)),
                ErrorPolicy::ReturnAsValue => Ok(Response::Failed(err)),
            },
        }
    }

    /// Serialize the request into a command and execute it.
    ///
    /// The reply is read with the serde [`Deserializer`](crate::resp2::de::Deserializer).
    pub async fn raw_command<T, Req>(&mut self, request: &Req) -> Result<Response<T>, Error>
    where
        T: DeserializeOwned + Send + 'static,
        Req: Serialize + ?Sized,
    {
        let command = Command::new(request)?;
        self.execute(command).await
    }

    /// Like [`raw_command()`](Self::raw_command), but returns the reply as is.
    pub async fn raw_reply<Req>(&mut self, request: &Req) -> Result<Response<Reply>, Error>
    where
        Req: Serialize + ?Sized,
    {
        let command = Command::raw(request)?;
        self.execute(command).await
    }

    /// Start capturing a pipeline.
    ///
    /// Fails with [`Error::AlreadyCapturing`] if already capturing,
    /// leaving the queued commands untouched.
    pub fn pipeline(&mut self) -> Result<(), Error> {
        if self.pipeline.is_some() {
            return Err(Error::AlreadyCapturing);
        }

        debug!("capturing pipeline");
        self.pipeline = Some(Pipeline::new());
        Ok(())
    }

    /// Send every captured command at once and stop capturing.
    ///
    /// Returns `Ok(None)` if not capturing. An empty pipeline returns an empty batch
    /// without sending anything. The client stops capturing even if sending fails.
    pub async fn execute_pipeline(&mut self) -> Result<Option<Batch>, Error> {
        let pipeline = match self.pipeline.take() {
            Some(pipeline) => pipeline,
            None => return Ok(None),
        };
        let policy = self.config.error_policy();

        if pipeline.is_empty() {
            return pipeline.parse_response(vec![], policy).map(Some);
        }

        debug!(commands = pipeline.len(), "executing pipeline");
        let replies = self
            .session()
            .await?
            .send(pipeline.structure(), pipeline.len())
            .await?;

        pipeline.parse_response(replies, policy).map(Some)
    }

    /// Capture the commands the `routine` executes and send them at once.
    ///
    /// If the `routine` fails, nothing is sent and its error is returned.
    /// The pipeline is discarded as well if the returned future is dropped before completion.
    ///
    /// ```no_run
    /// # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), pipedis::Error> {
    /// # use pipedis::{Client, Config, Error};
    /// let mut client = Client::new(Config::default());
    /// let (slots, mut batch) = client
    ///     .pipeline_with(|client| {
    ///         Box::pin(async move {
    ///             let a = client.incr("a").await?.into_slot();
    ///             let b = client.incr("b").await?.into_slot();
    ///             Ok::<_, Error>((a, b))
    ///         })
    ///     })
    ///     .await?;
    /// if let (Some(a), Some(b)) = slots {
    ///     println!("a = {}, b = {}", batch.take(a)?, batch.take(b)?);
    /// }
    /// # Ok(()) }
    /// ```
    pub async fn pipeline_with<F, R>(&mut self, routine: F) -> Result<(R, Batch), Error>
    where
        F: for<'a> FnOnce(&'a mut Client<C>) -> BoxFuture<'a, Result<R, Error>>,
    {
        self.pipeline()?;
        let guard = CaptureGuard { client: self };

        let value = routine(&mut *guard.client).await?;
        // the routine may have executed the pipeline by itself
        let batch = guard
            .client
            .execute_pipeline()
            .await?
            .unwrap_or_else(Batch::empty);

        Ok((value, batch))
    }

    /// Stop capturing without sending anything.
    ///
    /// Returns the amount of discarded commands.
    pub fn discard_pipeline(&mut self) -> usize {
        match self.pipeline.take() {
            Some(pipeline) => {
                if !pipeline.is_empty() {
                    warn!(commands = pipeline.len(), "pipeline discarded");
                }
                pipeline.len()
            }
            None => 0,
        }
    }

    /// Drop the session. The next command connects again.
    ///
    /// This is the way to recover after a timeout, transport or protocol failure.
    pub fn close(&mut self) {
        if self.session.take().is_some() {
            debug!("session closed");
        }
    }
}

impl<C: Connector> Drop for CaptureGuard<'_, C> {
    fn drop(&mut self) {
        self.client.discard_pipeline();
    }
}

impl<T> Response<T> {
    /// Returns the value if it's ready.
    pub fn ready(self) -> Option<T> {
        match self {
            Response::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the error reply if the command failed.
    pub fn failed(self) -> Option<ServerError> {
        match self {
            Response::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the slot if the command was queued.
    pub fn into_slot(self) -> Option<Slot<T>> {
        match self {
            Response::Queued(slot) => Some(slot),
            _ => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, Response::Queued(_))
    }
}
