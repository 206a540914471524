pub mod block;
pub mod click;
pub mod header;
pub mod json;
pub mod statusline;

// Re-exported for the engine, renderers and CLI.
#[allow(unused_imports)]
pub use block::{Align, RichText, StatusBlock};
#[allow(unused_imports)]
pub use click::{ClickEvent, Modifiers};
pub use header::ProtocolHeader;
pub use json::JsonAdapter;
pub use statusline::{Statusline, StatuslineStore};
