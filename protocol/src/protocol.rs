//! Defines the remote-Glk frames an interpreter writes to its stdout.
//!
//! Every frame is one JSON object. Window lists are only sent when the layout changes, and
//! content entries are always deltas keyed by window id. Field names are accepted both in the
//! lower-case remglk spelling and in the capitalized spelling some interpreters emit.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

use crate::user_input::InputKind;

/// Interpreter-assigned window identifier, stable for the lifetime of the process.
pub type WindowId = u32;

/// Turn counter used to correlate an input submission with the prompt that requested it.
pub type Generation = u32;

/// A single decoded frame from the interpreter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Output {
    #[serde(rename = "type", alias = "Type")]
    pub kind: OutputType,

    #[serde(rename = "gen", alias = "Gen", default)]
    pub generation: Generation,

    /// Either absent (layout unchanged since the last frame) or the complete window set.
    #[serde(alias = "Windows", default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<Vec<Window>>,

    /// Content deltas, matched against whichever window list is in effect.
    #[serde(alias = "Content", default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Arc<WindowContent>>,

    #[serde(alias = "Input", default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<InputRequest>,

    /// Only populated for `error` frames.
    #[serde(alias = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Output {
    /// Windows carried by this frame, or an empty slice when the list is absent.
    pub fn windows(&self) -> &[Window] {
        self.windows.as_deref().unwrap_or_default()
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows().iter().find(|window| window.id == id)
    }

    /// The input request this bridge honors. Only one prompt is expected to be active at a time,
    /// so any additional requests are ignored.
    pub fn input_request(&self) -> Option<&InputRequest> {
        self.input.first()
    }

    pub fn is_error(&self) -> bool {
        self.kind == OutputType::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputType {
    Update,
    Error,
}

/// Window kinds. The names match remglk's wire spelling; remglk itself only ever sends
/// `buffer`, `grid` and `graphics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum WindowType {
    #[serde(rename = "pair")]
    Pair,
    #[serde(rename = "blank")]
    Blank,
    #[serde(rename = "buffer")]
    #[strum(serialize = "buffer")]
    TextBuffer,
    #[serde(rename = "grid")]
    #[strum(serialize = "grid")]
    TextGrid,
    #[serde(rename = "graphics")]
    Graphics,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Window {
    #[serde(alias = "ID")]
    pub id: WindowId,

    #[serde(rename = "type", alias = "Type")]
    pub kind: WindowType,

    #[serde(alias = "Rock", default)]
    pub rock: u32,

    #[serde(alias = "GridWidth", default, skip_serializing_if = "Option::is_none")]
    pub gridwidth: Option<u32>,

    #[serde(alias = "GridHeight", default, skip_serializing_if = "Option::is_none")]
    pub gridheight: Option<u32>,

    #[serde(alias = "Left", default)]
    pub left: i32,

    #[serde(alias = "Top", default)]
    pub top: i32,

    #[serde(alias = "Width", default)]
    pub width: i32,

    #[serde(alias = "Height", default)]
    pub height: i32,

    /// Latest known content for this window, attached during reconciliation. Never on the wire.
    #[serde(skip)]
    pub content: Option<Arc<WindowContent>>,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(window {} ({}): @{},{}, {}x{})",
            self.id, self.kind, self.left, self.top, self.width, self.height
        )
    }
}

/// Content delta for one window. Grid windows carry `lines`, buffer windows carry `text`; a
/// single entry never mixes the two.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WindowContent {
    #[serde(alias = "ID")]
    pub id: WindowId,

    #[serde(alias = "Clear", default, skip_serializing_if = "std::ops::Not::not")]
    pub clear: bool,

    #[serde(alias = "Lines", default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<GridLine>,

    #[serde(alias = "Text", default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<TextContent>,
}

/// One numbered row of a grid window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GridLine {
    #[serde(alias = "Line")]
    pub line: u32,

    #[serde(alias = "Content", default)]
    pub content: Vec<Span>,
}

/// One paragraph of a buffer window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TextContent {
    /// When set, this paragraph continues the previous line instead of starting a new one.
    #[serde(alias = "Append", default, skip_serializing_if = "std::ops::Not::not")]
    pub append: bool,

    #[serde(alias = "Content", default)]
    pub content: Vec<Span>,
}

/// Smallest styled run of text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Span {
    #[serde(alias = "Style")]
    pub style: SpanStyle,

    #[serde(alias = "Text", default)]
    pub text: String,
}

impl Span {
    pub fn new(style: SpanStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Glk text styles, see `style_*` in glk.h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SpanStyle {
    Normal,
    Emphasized,
    Preformatted,
    Header,
    Subheader,
    Alert,
    Note,
    #[serde(rename = "blockquote")]
    BlockQuote,
    Input,
    User1,
    User2,
    /// remglk sends `unknown` for styles it cannot name; any other unrecognized value lands here
    /// as well.
    #[serde(other)]
    Unknown,
}

/// Prompt for input emitted by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputRequest {
    /// Window the input must be addressed to.
    #[serde(alias = "ID")]
    pub id: WindowId,

    #[serde(rename = "gen", alias = "Gen", default)]
    pub generation: Generation,

    #[serde(rename = "type", alias = "Type")]
    pub kind: InputKind,

    #[serde(alias = "MaxLen", default, skip_serializing_if = "Option::is_none")]
    pub maxlen: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_capitalized_update_frame() {
        let raw = r#"{"type":"update","gen":1,"windows":[{"ID":1,"Type":"buffer","Left":0,"Top":0,"Width":80,"Height":25}],"content":[{"ID":1,"Text":[{"Content":[{"Style":"normal","Text":"Hello."}]}]}],"input":[{"ID":1,"Gen":1,"Type":"line","MaxLen":80}]}"#;

        let output: Output = serde_json::from_str(raw).expect("decode frame");

        assert_eq!(output.kind, OutputType::Update);
        assert_eq!(output.generation, 1);
        let window = output.window(1).expect("window 1");
        assert_eq!(window.kind, WindowType::TextBuffer);
        assert_eq!((window.width, window.height), (80, 25));
        assert_eq!(window.content, None);
        assert_eq!(
            output.content[0].text,
            vec![TextContent {
                append: false,
                content: vec![Span::new(SpanStyle::Normal, "Hello.")],
            }]
        );
        assert_eq!(
            output.input_request(),
            Some(&InputRequest {
                id: 1,
                generation: 1,
                kind: InputKind::Line,
                maxlen: Some(80),
            })
        );
    }

    #[test]
    fn decodes_remglk_grid_frame() {
        let raw = r#"{"type":"update","gen":3,
            "windows":[{"id":12,"type":"grid","rock":0,"gridwidth":80,"gridheight":1,
                        "left":0,"top":0,"width":80,"height":1}],
            "content":[{"id":12,"lines":[{"line":0,"content":[{"style":"reverse","text":" West of House"}]}]}],
            "input":[{"id":13,"gen":3,"type":"char"}],
            "timer":null}"#;

        let output: Output = serde_json::from_str(raw).expect("decode frame");

        let window = output.window(12).expect("window 12");
        assert_eq!(window.kind, WindowType::TextGrid);
        assert_eq!(window.gridheight, Some(1));
        assert_eq!(output.content[0].lines[0].content[0].style, SpanStyle::Unknown);
        assert_eq!(output.input_request().map(|input| input.kind), Some(InputKind::Char));
        assert_eq!(output.input[0].maxlen, None);
    }

    #[test]
    fn missing_windows_field_is_distinct_from_empty_list() {
        let absent: Output =
            serde_json::from_str(r#"{"type":"update","gen":2}"#).expect("decode absent");
        let empty: Output =
            serde_json::from_str(r#"{"type":"update","gen":2,"windows":[]}"#).expect("decode empty");

        assert_eq!(absent.windows, None);
        assert_eq!(empty.windows, Some(Vec::new()));
        assert!(absent.windows().is_empty());
    }

    #[test]
    fn decodes_error_frame_without_generation() {
        let output: Output =
            serde_json::from_str(r#"{"type":"error","message":"bad input"}"#).expect("decode");

        assert!(output.is_error());
        assert_eq!(output.generation, 0);
        assert_eq!(output.message.as_deref(), Some("bad input"));
    }

    #[test]
    fn window_display_includes_geometry() {
        let window = Window {
            id: 4,
            kind: WindowType::TextGrid,
            rock: 0,
            gridwidth: None,
            gridheight: None,
            left: 0,
            top: 0,
            width: 80,
            height: 1,
            content: None,
        };

        assert_eq!(window.to_string(), "(window 4 (grid): @0,0, 80x1)");
    }
}
