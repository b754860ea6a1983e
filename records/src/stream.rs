//!
//! The lazy record stream returned by `records()`.
//!

use futures_util::stream::Stream;
use std::sync::Arc;

use crate::engine::{Cursor, FetchOptions, QueryEngine};
use crate::materialize::{Materializer, ResolverSet};
use crate::project::ProjectionRequest;
use crate::{RecordError, RecordResult};

enum State {
    /// Not executed yet.
    Pending,
    Open(Box<dyn Cursor>),
    /// Exhausted, or failed.
    Done,
}

///
/// Forward-only, single-consumption sequence of records.
///
/// Nothing is executed until the first call to [`RecordStream::next`].
/// The stream yields `None` forever after exhaustion or after the first error.
///
pub struct RecordStream<R> {
    engine: Arc<dyn QueryEngine>,
    request: ProjectionRequest,
    options: FetchOptions,
    materializer: Materializer<R>,
    state: State,
}

impl<R: 'static> RecordStream<R> {
    pub(crate) fn new(
        engine: Arc<dyn QueryEngine>,
        request: ProjectionRequest,
        options: FetchOptions,
        materializer: Materializer<R>,
    ) -> Self {
        Self {
            engine,
            request,
            options,
            materializer,
            state: State::Pending,
        }
    }

    /// The projection this stream was built with.
    pub fn request(&self) -> &ProjectionRequest {
        &self.request
    }

    pub fn resolvers(&self) -> &ResolverSet {
        self.materializer.resolvers()
    }

    /// Pull the next record.
    pub async fn next(&mut self) -> Option<RecordResult<R>> {
        if let State::Pending = self.state {
            match self.engine.execute(&self.request, &self.options).await {
                Ok(cursor) => self.state = State::Open(cursor),
                Err(err) => {
                    self.state = State::Done;
                    return Some(Err(RecordError::Fetch(err)));
                }
            }
        }

        let cursor = match &mut self.state {
            State::Open(cursor) => cursor,
            _ => return None,
        };

        match cursor.next_row().await {
            Ok(Some(row)) => {
                let record = self.materializer.materialize(row);
                if record.is_err() {
                    self.state = State::Done;
                }
                Some(record)
            }
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(err) => {
                self.state = State::Done;
                Some(Err(RecordError::Fetch(err)))
            }
        }
    }

    /// Drain the stream. The first error aborts the whole consumption.
    pub async fn try_collect(mut self) -> RecordResult<Vec<R>> {
        let mut records = vec![];
        while let Some(record) = self.next().await {
            records.push(record?);
        }
        Ok(records)
    }

    pub async fn first(mut self) -> RecordResult<Option<R>> {
        self.next().await.transpose()
    }

    pub fn into_stream(self) -> impl Stream<Item = RecordResult<R>> {
        futures_util::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|record| (record, stream))
        })
    }
}

impl<R> std::fmt::Debug for RecordStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Pending => "pending",
            State::Open(_) => "open",
            State::Done => "done",
        };
        f.debug_struct("RecordStream")
            .field("request", &self.request)
            .field("state", &state)
            .finish()
    }
}
