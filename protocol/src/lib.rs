pub mod protocol;
pub mod user_input;

pub use protocol::Generation;
pub use protocol::GridLine;
pub use protocol::InputRequest;
pub use protocol::Output;
pub use protocol::OutputType;
pub use protocol::Span;
pub use protocol::SpanStyle;
pub use protocol::TextContent;
pub use protocol::Window;
pub use protocol::WindowContent;
pub use protocol::WindowId;
pub use protocol::WindowType;
pub use user_input::InputFrame;
pub use user_input::InputKind;
