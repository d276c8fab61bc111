use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::warn;
use xyzzy_protocol::Span;
use xyzzy_protocol::SpanStyle;
use xyzzy_protocol::Window;
use xyzzy_protocol::WindowContent;

use crate::dialect::MarkupDialect;

static UNKNOWN_STYLE_LOGGED: AtomicBool = AtomicBool::new(false);

/// Turns styled window content into chat markup. Holds no state besides the dialect, so the same
/// content always formats to the same text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatter {
    dialect: MarkupDialect,
}

impl Formatter {
    pub fn new(dialect: MarkupDialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> MarkupDialect {
        self.dialect
    }

    /// Formats one span. `single` marks a span that is the whole line: its surrounding spaces
    /// are moved outside the delimiters.
    pub fn format_span(&self, span: &Span, single: bool) -> String {
        let (open, close) = self.delimiters(span.style);
        let text = span.text.as_str();
        if open.is_empty() && close.is_empty() {
            return text.to_string();
        }

        let (leading, core, trailing) = if single {
            split_spaces(text)
        } else {
            ("", text, "")
        };
        if core.trim_matches(' ').is_empty() {
            // No bare `__` or `**`.
            return text.to_string();
        }
        format!("{leading}{open}{core}{close}{trailing}")
    }

    /// Formats a run of spans making up one line.
    pub fn format_spans(&self, spans: &[Span]) -> String {
        let single = spans.len() == 1;
        spans
            .iter()
            .map(|span| self.format_span(span, single))
            .collect::<Vec<_>>()
            .join(self.dialect.span_joiner())
    }

    /// Formats a window's content: grid lines first, then buffer text, newline-joined. Buffer
    /// items flagged `append` continue the previous line.
    pub fn format_content(&self, content: &WindowContent) -> String {
        let mut lines: Vec<String> = content
            .lines
            .iter()
            .map(|line| self.format_spans(&line.content))
            .collect();

        for item in &content.text {
            let formatted = self.format_spans(&item.content);
            match lines.last_mut() {
                Some(last) if item.append => {
                    if !last.is_empty() && !formatted.is_empty() {
                        last.push_str(self.dialect.span_joiner());
                    }
                    last.push_str(&formatted);
                }
                _ => lines.push(formatted),
            }
        }

        lines.join("\n")
    }

    /// `None` when the window has no known content.
    pub fn format_window(&self, window: &Window) -> Option<String> {
        window
            .content
            .as_deref()
            .map(|content| self.format_content(content))
    }

    fn delimiters(&self, style: SpanStyle) -> (&'static str, &'static str) {
        let dialect = self.dialect;
        match style {
            SpanStyle::Normal | SpanStyle::Input | SpanStyle::User1 | SpanStyle::User2 => ("", ""),
            SpanStyle::Emphasized => (dialect.emphasis(), dialect.emphasis()),
            SpanStyle::Preformatted => (dialect.monospace(), dialect.monospace()),
            SpanStyle::Header | SpanStyle::Subheader => (dialect.strong(), dialect.strong()),
            SpanStyle::Alert | SpanStyle::Note => ("[", "]"),
            SpanStyle::BlockQuote => (dialect.quote_prefix(), ""),
            SpanStyle::Unknown => {
                if !UNKNOWN_STYLE_LOGGED.swap(true, Ordering::Relaxed) {
                    warn!("unknown span style; rendering as plain text");
                }
                ("", "")
            }
        }
    }
}

fn split_spaces(text: &str) -> (&str, &str, &str) {
    let start = text.len() - text.trim_start_matches(' ').len();
    let end = text.trim_end_matches(' ').len().max(start);
    (&text[..start], &text[start..end], &text[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use xyzzy_protocol::GridLine;
    use xyzzy_protocol::TextContent;
    use xyzzy_protocol::WindowType;

    fn slack() -> Formatter {
        Formatter::new(MarkupDialect::Slack)
    }

    fn text(items: Vec<(bool, Vec<Span>)>) -> WindowContent {
        WindowContent {
            id: 1,
            clear: false,
            lines: Vec::new(),
            text: items
                .into_iter()
                .map(|(append, content)| TextContent { append, content })
                .collect(),
        }
    }

    #[test]
    fn span_styles_map_to_markup() {
        let cases = [
            (SpanStyle::Normal, "plain"),
            (SpanStyle::Emphasized, "_plain_"),
            (SpanStyle::Preformatted, "`plain`"),
            (SpanStyle::Header, "*plain*"),
            (SpanStyle::Subheader, "*plain*"),
            (SpanStyle::Alert, "[plain]"),
            (SpanStyle::Note, "[plain]"),
            (SpanStyle::BlockQuote, "> plain"),
            (SpanStyle::Input, "plain"),
            (SpanStyle::User1, "plain"),
            (SpanStyle::User2, "plain"),
            (SpanStyle::Unknown, "plain"),
        ];
        for (style, expected) in cases {
            assert_eq!(
                slack().format_span(&Span::new(style, "plain"), false),
                expected,
                "{style:?}"
            );
        }
    }

    #[test]
    fn markdown_doubles_strong_delimiters() {
        let formatter = Formatter::new(MarkupDialect::Markdown);
        assert_eq!(
            formatter.format_span(&Span::new(SpanStyle::Header, "West of House"), true),
            "**West of House**"
        );
    }

    #[test]
    fn single_span_moves_spaces_outside_markup() {
        assert_eq!(
            slack().format_spans(&[Span::new(SpanStyle::Emphasized, " hi")]),
            " _hi_"
        );
        assert_eq!(
            slack().format_spans(&[Span::new(SpanStyle::Header, "  Kitchen   ")]),
            "  *Kitchen*   "
        );
    }

    #[test]
    fn spaces_stay_inside_markup_for_multi_span_lines() {
        let line = [
            Span::new(SpanStyle::Normal, "You see"),
            Span::new(SpanStyle::Emphasized, " a lamp"),
        ];
        assert_eq!(slack().format_spans(&line), "You see\u{200d}_ a lamp_");
    }

    #[test]
    fn adjacent_styled_spans_are_joined_with_zwj() {
        let line = [
            Span::new(SpanStyle::Emphasized, "a"),
            Span::new(SpanStyle::Header, "b"),
        ];
        assert_eq!(slack().format_spans(&line), "_a_\u{200d}*b*");
        assert_eq!(Formatter::new(MarkupDialect::Plain).format_spans(&line), "ab");
    }

    #[test]
    fn whitespace_only_styled_span_has_no_delimiters() {
        assert_eq!(
            slack().format_spans(&[Span::new(SpanStyle::Emphasized, "   ")]),
            "   "
        );
        assert_eq!(slack().format_span(&Span::new(SpanStyle::Header, ""), false), "");
    }

    #[test]
    fn grid_lines_then_text_are_newline_joined() {
        let content = WindowContent {
            id: 1,
            clear: false,
            lines: vec![
                GridLine {
                    line: 0,
                    content: vec![Span::new(SpanStyle::Normal, "Kitchen")],
                },
                GridLine {
                    line: 1,
                    content: vec![Span::new(SpanStyle::Normal, "Score: 10")],
                },
            ],
            text: Vec::new(),
        };
        assert_eq!(slack().format_content(&content), "Kitchen\nScore: 10");
    }

    #[test]
    fn appended_text_continues_previous_line() {
        let content = text(vec![
            (false, vec![Span::new(SpanStyle::Normal, "Taken.")]),
            (false, vec![Span::new(SpanStyle::Normal, ">")]),
            (true, vec![Span::new(SpanStyle::Input, "look")]),
        ]);
        assert_eq!(slack().format_content(&content), "Taken.\n>\u{200d}look");
        assert_eq!(
            Formatter::new(MarkupDialect::Plain).format_content(&content),
            "Taken.\n>look"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        let content = text(vec![
            (false, vec![Span::new(SpanStyle::Emphasized, " dark ")]),
            (
                false,
                vec![
                    Span::new(SpanStyle::Alert, "grue"),
                    Span::new(SpanStyle::Preformatted, "xyzzy"),
                ],
            ),
        ]);
        let formatter = slack();
        assert_eq!(formatter.format_content(&content), formatter.format_content(&content));
    }

    #[test]
    fn window_without_content_formats_to_none() {
        let mut window = Window {
            id: 3,
            kind: WindowType::TextBuffer,
            rock: 0,
            gridwidth: None,
            gridheight: None,
            left: 0,
            top: 0,
            width: 80,
            height: 25,
            content: None,
        };
        assert_eq!(slack().format_window(&window), None);

        window.content = Some(Arc::new(text(vec![(
            false,
            vec![Span::new(SpanStyle::Normal, "Hello.")],
        )])));
        assert_eq!(slack().format_window(&window), Some("Hello.".to_string()));
    }
}
