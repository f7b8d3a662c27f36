//! Startup re-activation of persisted translatable fields.
//!
//! Class surgery lives only in memory, so every process must replay it from
//! the `tof_translatable_field` table before serving requests.

use tracing::{info, warn};

use crate::class::activate;
use crate::error::Result;
use crate::state::Tof;

/// Commands during which activation must not run.
const MIGRATION_COMMANDS: &[&str] = &["migrate", "makemigrations"];

/// Why bootstrap did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The process was started for a schema command.
    MigrationCommand(String),
    /// tof's tables do not exist yet.
    SchemaMissing,
}

/// Outcome of [`ready`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Field ids activated by this run.
    pub activated: Vec<String>,
    /// Field ids already active before this run.
    pub already_active: Vec<String>,
    /// Field ids whose model type is not registered.
    pub unregistered: Vec<String>,
    /// Field ids whose model type no longer declares the field.
    pub rejected: Vec<String>,
    pub skipped: Option<SkipReason>,
}

impl BootstrapReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

/// Activate every persisted translatable field on its registered class.
///
/// `args` are the process arguments. Nothing happens when they name a
/// migration command or when tof's tables are missing.
pub async fn ready<S: AsRef<str>>(tof: &Tof, args: &[S]) -> Result<BootstrapReport> {
    if let Some(command) = args
        .iter()
        .map(AsRef::as_ref)
        .find(|arg| MIGRATION_COMMANDS.contains(arg))
    {
        info!(command, "skipping translatable field activation");
        return Ok(BootstrapReport::skipped(SkipReason::MigrationCommand(
            command.to_string(),
        )));
    }

    if !tof.backend().schema_ready().await? {
        info!("translation tables missing; skipping translatable field activation");
        return Ok(BootstrapReport::skipped(SkipReason::SchemaMissing));
    }

    let mut report = BootstrapReport::default();
    let change_default_manager = tof.settings().change_default_manager;
    for field in tof.backend().translatable_fields().await? {
        let Some(class) = tof.registry().get(&field.content_type) else {
            warn!(field = %field.id, "model type not registered; field left inactive");
            report.unregistered.push(field.id);
            continue;
        };
        match activate(&class, &field, change_default_manager) {
            Ok(true) => report.activated.push(field.id),
            Ok(false) => report.already_active.push(field.id),
            Err(e) => {
                warn!(field = %field.id, error = %e, "failed to activate translatable field");
                report.rejected.push(field.id);
            }
        }
    }

    info!(
        activated = report.activated.len(),
        unregistered = report.unregistered.len(),
        rejected = report.rejected.len(),
        "translatable fields ready"
    );
    Ok(report)
}
