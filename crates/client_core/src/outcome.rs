/// Why a user action finished without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Search text was empty after trimming.
    EmptyQuery,
    /// The trigger is disabled: a listing/search load, a submit, or an
    /// operation on the same article is still in flight.
    Busy,
    /// The user declined the confirmation prompt.
    Declined,
    /// The result arrived after its dialog was closed or replaced.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T = ()> {
    Done(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn skipped(&self) -> Option<SkipReason> {
        match self {
            Self::Done(_) => None,
            Self::Skipped(reason) => Some(*reason),
        }
    }

    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Skipped(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Done(value) => Outcome::Done(f(value)),
            Self::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}
