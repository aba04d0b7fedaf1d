//! Batched command execution.
//!
//! Commands added to a [`Pipeline`] are encoded into one buffer and sent in a single write.
//! Each added command returns a [`Slot<T>`] which redeems its result from the [`Batch`]
//! once the pipeline is executed.
//!
//! ```
//! # use bstr::BString;
//! # use pipedis::{command::strings, pipeline::Pipeline, config::ErrorPolicy, resp2::Reply};
//! let mut pipeline = Pipeline::new();
//! let set = pipeline.add_command(strings::set("a", "1"));
//! let get = pipeline.add_command(strings::get("a"));
//!
//! // replies as read from the server
//! let replies = vec![Reply::ok(), Reply::bulk("1")];
//! let mut batch = pipeline.parse_response(replies, ErrorPolicy::Raise)?;
//! assert_eq!(Ok(()), batch.take(set));
//! assert_eq!(Some(BString::from("1")), batch.take(get)?);
//! # Ok::<_, pipedis::Error>(())
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use bstr::ByteSlice;
use bytes::Bytes;

use crate::command::Command;
use crate::config::ErrorPolicy;
use crate::error::{Error, ProtocolError, ShapeError};
use crate::resp2::{de, put_command, Reply, ServerError};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

type Value = Box<dyn Any + Send>;
type ErasedInterpreter = Box<dyn FnOnce(Reply) -> Result<Value, de::Error> + Send>;

/// Ordered queue of commands waiting to be sent together.
pub struct Pipeline {
    id: u64,
    frames: Vec<u8>,
    queue: Vec<Queued>,
}

struct Queued {
    name: Bytes,
    interpret: ErasedInterpreter,
}

/// Handle to the result of a pipelined command.
///
/// Only valid for the [`Batch`] of the pipeline which issued it.
#[must_use = "the result can only be taken from the batch with its slot"]
pub struct Slot<T> {
    pipeline: u64,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

/// Interpreted results of an executed pipeline, in the order of the commands.
pub struct Batch {
    pipeline: u64,
    results: Vec<Option<Result<Value, ServerError>>>,
}

impl Pipeline {
    /// Constructs an empty `Pipeline`.
    pub fn new() -> Self {
        Pipeline {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            frames: Vec::new(),
            queue: Vec::new(),
        }
    }

    /// Queue the command and return the slot of its result.
    pub fn add_command<T: Send + 'static>(&mut self, command: Command<T>) -> Slot<T> {
        let (name, args, interpret) = command.into_parts();
        put_command(&mut self.frames, &name, &args);
        self.queue.push(Queued {
            name,
            interpret: Box::new(move |reply| interpret(reply).map(|value| Box::new(value) as Value)),
        });

        Slot {
            pipeline: self.id,
            index: self.queue.len() - 1,
            _marker: PhantomData,
        }
    }

    /// Wire frames of every queued command, concatenated.
    pub fn structure(&self) -> &[u8] {
        &self.frames
    }

    /// Amount of queued commands.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if no command is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Match the replies with the queued commands, in order.
    ///
    /// With [`ErrorPolicy::Raise`] the first error reply fails the whole batch.
    /// With [`ErrorPolicy::ReturnAsValue`] error replies are kept in their position.
    /// A reply with unexpected shape fails the whole batch under both policies.
    pub fn parse_response(self, replies: Vec<Reply>, policy: ErrorPolicy) -> Result<Batch, Error> {
        if replies.len() != self.queue.len() {
            return Err(ProtocolError::CountMismatch {
                expected: self.queue.len(),
                actual: replies.len(),
            }
            .into());
        }

        if policy == ErrorPolicy::Raise {
            if let Some(err) = replies.iter().find_map(Reply::as_error) {
                return Err(Error::Server(err.clone()));
            }
        }

        let results = self
            .queue
            .into_iter()
            .zip(replies)
            .enumerate()
            .map(|(position, (queued, reply))| match reply.into_result() {
                Ok(reply) => match (queued.interpret)(reply) {
                    Ok(value) => Ok(Some(Ok(value))),
                    Err(source) => Err(ShapeError {
                        command: queued.name.as_bstr().into(),
                        position: Some(position),
                        source,
                    }),
                },
                Err(err) => Ok(Some(Err(err))),
            })
            .collect::<Result<_, _>>()?;

        Ok(Batch {
            pipeline: self.id,
            results,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field(
                "commands",
                &self.queue.iter().map(|q| q.name.as_bstr()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T> Slot<T> {
    /// Position of the command within its pipeline.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("pipeline", &self.pipeline)
            .field("index", &self.index)
            .finish()
    }
}

impl Batch {
    /// A batch of no results.
    pub(crate) fn empty() -> Self {
        Batch {
            pipeline: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            results: Vec::new(),
        }
    }

    /// Take the result of the slot's command.
    ///
    /// `Err` is the error reply of the command, only kept with
    /// [`ErrorPolicy::ReturnAsValue`].
    ///
    /// # Panics
    ///
    /// Panics if the slot was issued by another pipeline,
    /// or its result was already taken.
    pub fn take<T: 'static>(&mut self, slot: Slot<T>) -> Result<T, ServerError> {
        assert_eq!(
            self.pipeline, slot.pipeline,
            "slot was issued by another pipeline"
        );
        let result = match self.results.get_mut(slot.index).and_then(Option::take) {
            Some(result) => result,
            None => panic!("result of the slot {} was already taken", slot.index),
        };

        result.map(|value| match value.downcast::<T>() {
            Ok(value) => *value,
            Err(_) => unreachable!("slot type always matches its command"),
        })
    }

    /// Amount of results, including already taken ones.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if the pipeline had no command.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns `true` if the server replied an error at the position.
    pub fn is_error(&self, index: usize) -> bool {
        matches!(self.results.get(index), Some(Some(Err(_))))
    }

    /// Error replies and their positions.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &ServerError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(idx, res)| match res {
                Some(Err(err)) => Some((idx, err)),
                _ => None,
            })
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Entry<'a>(&'a Option<Result<Value, ServerError>>);

        impl fmt::Debug for Entry<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.0 {
                    None => f.write_str("Taken"),
                    Some(Ok(_)) => f.write_str("Ready"),
                    Some(Err(err)) => write!(f, "Failed({})", err),
                }
            }
        }

        f.debug_struct("Batch")
            .field("pipeline", &self.pipeline)
            .field(
                "results",
                &self.results.iter().map(Entry).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bstr::BString;

    use super::*;
    use crate::command::{hash, keys, strings};
    use crate::resp2::encode;

    fn err(msg: &str) -> Reply {
        Reply::Error(ServerError::parse(msg.as_bytes()))
    }

    #[test]
    fn frames_are_concatenated() {
        let mut pipeline = Pipeline::new();
        let _ = pipeline.add_command(strings::set("a", "1"));
        let _ = pipeline.add_command(strings::get("a"));

        let mut expected = encode(&strings::set("a", "1"));
        expected.extend(encode(&strings::get("a")));
        assert_eq!(&expected[..], pipeline.structure());
        assert_eq!(2, pipeline.len());
    }

    #[test]
    fn results_in_order() {
        let mut pipeline = Pipeline::new();
        let set = pipeline.add_command(strings::set("a", "1"));
        let incr = pipeline.add_command(strings::incr("n"));
        let missing = pipeline.add_command(strings::get("missing"));
        let wrong = pipeline.add_command(strings::incr("a-list"));
        let all = pipeline.add_command(hash::hgetall("h"));

        let replies = vec![
            Reply::ok(),
            Reply::Integer(5),
            Reply::Bulk(None),
            err("WRONGTYPE Operation against a key"),
            Reply::Array(Some(vec![])),
        ];
        let mut batch = pipeline
            .parse_response(replies, ErrorPolicy::ReturnAsValue)
            .unwrap();
        assert_eq!(5, batch.len());
        assert_eq!(2, missing.index());
        assert_eq!(Ok(None), batch.take(missing));
        assert_eq!(Ok(5), batch.take(incr));
        assert_eq!(Ok(()), batch.take(set));
        assert_eq!("WRONGTYPE", batch.take(wrong).unwrap_err().kind());
        assert!(batch.take(all).unwrap().is_empty());
    }

    #[test]
    fn count_mismatch() {
        let mut pipeline = Pipeline::new();
        let _ = pipeline.add_command(strings::set("a", "1"));
        let _ = pipeline.add_command(strings::set("b", "2"));
        let _ = pipeline.add_command(strings::set("c", "3"));

        let res = pipeline.parse_response(vec![Reply::ok(), Reply::ok()], ErrorPolicy::Raise);
        assert!(matches!(
            res,
            Err(Error::Protocol(ProtocolError::CountMismatch {
                expected: 3,
                actual: 2
            }))
        ));
    }

    #[test]
    fn raise_fails_the_whole_batch() {
        let mut pipeline = Pipeline::new();
        let _ = pipeline.add_command(strings::set("a", "1"));
        let _ = pipeline.add_command(strings::incr("a"));
        let _ = pipeline.add_command(strings::incr("b"));

        let replies = vec![Reply::ok(), err("ERR bad state"), err("ERR second")];
        match pipeline.parse_response(replies, ErrorPolicy::Raise) {
            Err(Error::Server(err)) => {
                assert_eq!("ERR", err.kind());
                assert_eq!("bad state", err.message());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn errors_as_values() {
        let mut pipeline = Pipeline::new();
        let set = pipeline.add_command(strings::set("a", "1"));
        let incr = pipeline.add_command(strings::incr("a"));

        let replies = vec![Reply::ok(), err("ERR bad state")];
        let mut batch = pipeline
            .parse_response(replies, ErrorPolicy::ReturnAsValue)
            .unwrap();
        assert!(!batch.is_error(0));
        assert!(batch.is_error(1));
        assert_eq!(1, batch.errors().count());
        assert_eq!(Ok(()), batch.take(set));
        assert_eq!(Err(ServerError::new("ERR", "bad state")), batch.take(incr));
    }

    #[test]
    fn shape_mismatch_names_position() {
        let mut pipeline = Pipeline::new();
        let _ = pipeline.add_command(keys::del(["a"]));
        let _ = pipeline.add_command(strings::incr("a"));

        let replies = vec![Reply::Integer(1), Reply::bulk("not a number")];
        match pipeline.parse_response(replies, ErrorPolicy::ReturnAsValue) {
            Err(Error::Shape(err)) => {
                assert_eq!(BString::from("INCR"), err.command);
                assert_eq!(Some(1), err.position);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_pipeline() {
        let batch = Pipeline::new()
            .parse_response(vec![], ErrorPolicy::Raise)
            .unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    #[should_panic(expected = "another pipeline")]
    fn foreign_slot() {
        let mut first = Pipeline::new();
        let mut second = Pipeline::new();
        let _ = first.add_command(strings::incr("a"));
        let slot = second.add_command(strings::incr("a"));

        let mut batch = first
            .parse_response(vec![Reply::Integer(1)], ErrorPolicy::Raise)
            .unwrap();
        let _ = batch.take(slot);
    }

    #[test]
    #[should_panic(expected = "already taken")]
    fn slot_taken_twice() {
        let mut pipeline = Pipeline::new();
        let slot = pipeline.add_command(strings::incr("a"));
        let twin = Slot::<i64> {
            pipeline: slot.pipeline,
            index: slot.index,
            _marker: PhantomData,
        };

        let mut batch = pipeline
            .parse_response(vec![Reply::Integer(1)], ErrorPolicy::Raise)
            .unwrap();
        let _ = batch.take(slot);
        let _ = batch.take(twin);
    }
}
