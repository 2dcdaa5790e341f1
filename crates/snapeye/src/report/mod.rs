pub mod compose;
pub mod font;
pub mod terminal;

pub use self::compose::{ComposeError, ReportComposer, ReportImage, ReportLayout, ReportMeta};
