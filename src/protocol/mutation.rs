//! Mutation definitions
//!
//! A single key-level change and the mode it is applied in.

/// A key-level change to an object's key-value set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or overwrite a key
    Upsert { key: String, value: String },

    /// Remove a key (absent keys are not an error)
    Delete { key: String },
}

impl Mutation {
    pub fn upsert(key: impl Into<String>, value: impl Into<String>) -> Self {
        Mutation::Upsert {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Mutation::Delete { key: key.into() }
    }

    /// The key this mutation touches
    pub fn key(&self) -> &str {
        match self {
            Mutation::Upsert { key, .. } => key,
            Mutation::Delete { key } => key,
        }
    }
}

/// How a mutating call is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Buffer in the object's staging area (`more = true`)
    Staged,

    /// Commit anything staged, then apply directly (`more = false`)
    Immediate,
}

impl Mode {
    /// Map the caller's `more` flag
    pub fn from_more(more: bool) -> Self {
        if more {
            Mode::Staged
        } else {
            Mode::Immediate
        }
    }

    /// Value of the `x-ccow-autocommit` query flag
    pub fn autocommit_flag(&self) -> &'static str {
        match self {
            Mode::Staged => "0",
            Mode::Immediate => "1",
        }
    }
}
