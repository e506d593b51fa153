#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// A failure while pulling bytes off the connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The body of the response could not be read.
    #[error("{0}")]
    Read(#[source] reqwest::Error),
    #[cfg(test)]
    #[error("{0}")]
    Injected(String),
}

/// An adapter for streaming byte chunks.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    VecDeque(VecDeque<Result<Bytes, Error>>),
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec.into_iter().map(Ok).collect())
    }

    /// Like [`Chunks::from_vec_deque`], but fails with `message` once all
    /// `chunks` have been consumed.
    #[cfg(test)]
    pub fn failing_after(chunks: Vec<Bytes>, message: &str) -> Self {
        let mut vec: VecDeque<_> = chunks.into_iter().map(Ok).collect();
        vec.push_back(Err(Error::Injected(message.to_owned())));
        Chunks::VecDeque(vec)
    }

    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => {
                response.chunk().await.map_err(Error::Read)
            }
            #[cfg(test)]
            Chunks::VecDeque(vec) => vec.pop_front().transpose(),
        }
    }
}
