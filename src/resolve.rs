use crate::store::Resources;

/// How a user-supplied token was interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// An in-range 1-based position into the current listing.
    Ordinal { position: usize, identifier: String },
    /// Anything else, taken verbatim. It may or may not be tracked.
    Literal(String),
}

impl Reference {
    /// Interprets `token` against a snapshot of the tracked resources.
    ///
    /// Only a plain decimal number between 1 and the number of tracked
    /// resources is an ordinal; everything else (including `0`, negative or
    /// out-of-range numbers) falls back to a literal identifier.
    #[must_use]
    pub fn parse(token: &str, resources: &Resources) -> Self {
        let ordinal = token
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| token.parse::<usize>().ok())
            .flatten()
            .and_then(|position| resources.at(position).map(|id| (position, id)));

        match ordinal {
            Some((position, identifier)) => Reference::Ordinal {
                position,
                identifier: identifier.to_string(),
            },
            None => Reference::Literal(token.to_string()),
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Reference::Ordinal { identifier, .. } => identifier,
            Reference::Literal(identifier) => identifier,
        }
    }

    #[must_use]
    pub fn into_identifier(self) -> String {
        match self {
            Reference::Ordinal { identifier, .. } | Reference::Literal(identifier) => identifier,
        }
    }
}

/// Maps an ordinal or literal token to the canonical identifier.
#[must_use]
pub fn resolve(token: &str, resources: &Resources) -> String {
    Reference::parse(token, resources).into_identifier()
}
