mod labels;
mod record;
mod shape;
mod table;

pub use labels::{SeverityLevel, danger_label};
pub use record::{FindingRecord, HostFinding, WebFinding};
pub use shape::{HOST_COLUMNS, ReportShape, WEB_COLUMNS};
pub use table::{PageRecords, ReportTable};
