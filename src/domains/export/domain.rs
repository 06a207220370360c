use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

use super::types::ExportFormat;

/// Entity domains whose engine exposes a by-ids export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportDomain {
    StrategicGoals,
    Projects,
    Participants,
    Activities,
}

impl ExportDomain {
    pub const ALL: [ExportDomain; 4] = [
        ExportDomain::StrategicGoals,
        ExportDomain::Projects,
        ExportDomain::Participants,
        ExportDomain::Activities,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExportDomain::StrategicGoals => "Strategic Goals",
            ExportDomain::Projects => "Projects",
            ExportDomain::Participants => "Participants",
            ExportDomain::Activities => "Activities",
        }
    }

    /// Directory under the app's documents folder
    pub fn directory_name(&self) -> &'static str {
        match self {
            ExportDomain::StrategicGoals => "StrategicGoals_Exports",
            ExportDomain::Projects => "Projects_Exports",
            ExportDomain::Participants => "Participants_Exports",
            ExportDomain::Activities => "Activities_Exports",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            ExportDomain::StrategicGoals => "strategic_goals",
            ExportDomain::Projects => "projects",
            ExportDomain::Participants => "participants",
            ExportDomain::Activities => "activities",
        }
    }

    pub fn engine_symbol(&self) -> &'static str {
        match self {
            ExportDomain::StrategicGoals => "export_strategic_goals_by_ids",
            ExportDomain::Projects => "export_projects_by_ids",
            ExportDomain::Participants => "export_participants_by_ids",
            ExportDomain::Activities => "export_activities_by_ids",
        }
    }
}

impl fmt::Display for ExportDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `<documents>/<Domain>_Exports/<prefix>_selected_<unix seconds>.<ext>`
pub fn export_path(documents_dir: &Path, domain: ExportDomain, format: &ExportFormat, at: DateTime<Utc>) -> PathBuf {
    documents_dir.join(domain.directory_name()).join(format!(
        "{}_selected_{}.{}",
        domain.file_prefix(),
        at.timestamp(),
        format.file_extension()
    ))
}
