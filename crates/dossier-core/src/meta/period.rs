//! Financial periods (exercices) of a dossier.

use std::fmt;

use jiff::civil::Date;

/// One financial period of a dossier, stored in its own database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    /// Beginning of the exercice, if known
    pub begin: Option<Date>,
    /// End of the exercice, if known
    pub end: Option<Date>,
    /// Whether this is the exercice currently being worked on
    pub current: bool,
    /// Provider-specific storage identifier (the database name)
    pub storage: String,
}

impl Period {
    /// Creates a non-current period without dates.
    pub fn new(storage: impl Into<String>) -> Self {
        Self {
            begin: None,
            end: None,
            current: false,
            storage: storage.into(),
        }
    }

    pub fn with_dates(mut self, begin: Option<Date>, end: Option<Date>) -> Self {
        self.begin = begin;
        self.end = end;
        self
    }

    pub fn with_current(mut self, current: bool) -> Self {
        self.current = current;
        self
    }

    /// Exact comparison of the stored bounds with the given ones.
    ///
    /// This is the default "is suitable" predicate used to find the period
    /// an exercice belongs to; providers may substitute their own.
    pub fn matches_dates(&self, begin: Option<Date>, end: Option<Date>) -> bool {
        self.begin == begin && self.end == end
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let date = |d: Option<Date>| d.map_or_else(|| "…".to_string(), |d| d.to_string());
        write!(
            f,
            "{} [{} - {}]",
            self.storage,
            date(self.begin),
            date(self.end)
        )?;
        if self.current {
            write!(f, " (current)")?;
        }
        Ok(())
    }
}
