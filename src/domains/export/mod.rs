pub mod capability;
pub mod coordinator;
pub mod domain;
pub mod types;

pub use capability::{EngineExportCapability, ExportCapability};
pub use coordinator::{ExportJobCoordinator, ExportNavigator};
pub use domain::{export_path, ExportDomain};
pub use types::{
    CsvOptions, ExportFormat, ExportJob, ExportOutcome, ExportPhase, ExportRequest, ExportStatus, ParquetCompression,
    ParquetOptions,
};
