use strum_macros::Display;

/// Zero-width joiner placed between adjacent spans so renderers do not merge their delimiters.
pub const SPAN_JOINER: &str = "\u{200d}";

/// The flavor of chat markup to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MarkupDialect {
    /// `_em_`, `*strong*`, `` `mono` ``.
    #[default]
    Slack,
    /// `_em_`, `**strong**`, `` `mono` ``.
    Markdown,
    /// Text only, for terminals.
    Plain,
}

impl MarkupDialect {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "slack" => Some(Self::Slack),
            "markdown" | "md" => Some(Self::Markdown),
            "plain" | "text" => Some(Self::Plain),
            _ => None,
        }
    }

    pub fn emphasis(self) -> &'static str {
        match self {
            Self::Slack | Self::Markdown => "_",
            Self::Plain => "",
        }
    }

    pub fn strong(self) -> &'static str {
        match self {
            Self::Slack => "*",
            Self::Markdown => "**",
            Self::Plain => "",
        }
    }

    pub fn monospace(self) -> &'static str {
        match self {
            Self::Slack | Self::Markdown => "`",
            Self::Plain => "",
        }
    }

    pub fn quote_prefix(self) -> &'static str {
        "> "
    }

    pub fn span_joiner(self) -> &'static str {
        match self {
            Self::Slack | Self::Markdown => SPAN_JOINER,
            Self::Plain => "",
        }
    }

    /// Whether a body starting with whitespace needs a visible leader to survive rendering.
    pub fn needs_leading_sentinel(self) -> bool {
        !matches!(self, Self::Plain)
    }
}
