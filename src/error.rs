use derive_more::From;

/// Failure observed by a waiter of a batch.
///
/// Every key of a batch shares the same outcome: either all of them resolve
/// or all of them receive the same error.
#[derive(From, thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error<E> {
    #[error("Fetch Error: {0}")]
    Fetch(E),

    #[error("Batch was dropped before its fetch completed")]
    #[from(ignore)]
    Aborted,
}

impl<E> Error<E> {
    /// Returns the error produced by the loader, if there is one.
    pub fn fetch_error(&self) -> Option<&E> {
        match self {
            Error::Fetch(error) => Some(error),
            Error::Aborted => None,
        }
    }
}

pub type Result<A, E> = std::result::Result<A, Error<E>>;
