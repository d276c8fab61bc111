use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

use crate::protocol::Generation;
use crate::protocol::WindowId;

/// Kind of input an interpreter prompts for, and the kind of input frame sent back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputKind {
    /// A full command line.
    Line,
    /// A single keystroke.
    Char,
}

/// Input frame written to the interpreter's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputFrame {
    #[serde(rename = "type")]
    pub kind: InputKind,
    /// Generation of the prompt being answered.
    #[serde(rename = "gen")]
    pub generation: Generation,
    /// Window the prompt was issued for.
    pub window: WindowId,
    pub value: String,
}
