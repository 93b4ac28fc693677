pub mod clean;
pub mod directives;
pub mod errors;
pub mod model;
pub mod reader;
pub mod special;
pub mod timestamp;

pub use directives::{ReadDirectives, RecordGroupSpec, RecordGroups, TimestampSpec};
pub use errors::{ReadAttempt, ReadError};
pub use model::{CellValue, ColumnId, NormalizedTable, RawTable, UNITS_NOT_GIVEN};
pub use reader::FiletypeReader;
pub use special::{SpecialFormatOutcome, SpecialFormatTag};
