//! Data model for the per-ticker spreadsheet agent.

mod callback;
mod context;
mod target_file;
mod ticker;
mod workbook;

pub use callback::{CallbackPayload, RunStatus, RunSummary};
pub use context::{AgentContext, Note, NoteCategory};
pub use target_file::{DataType, Period, StatementType, TargetFile, FILE_ORDER};
pub use ticker::{IngestRequest, TickerJob, TickerJobInput, Timing};
pub use workbook::{CellValue, RowMapEntry, WorkbookGrid};
