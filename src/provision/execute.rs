use std::fs::{File, OpenOptions};
use std::io::Write;

use super::{InstallInstruction, InstructionKind, Provisioner};
use crate::error::{InstructionFailure, ProvisionError, Result};
use crate::runner::{CommandRunner, SCRIPT};
use crate::system::SystemInfo;

impl<S: SystemInfo, R: CommandRunner> Provisioner<S, R> {
    /// Run `plan` in order. A failing instruction is recorded and the next
    /// one still runs; the failures of this run come back together as
    /// `ProvisionError::ExecutionFailed`.
    pub fn execute_plan(&mut self, plan: &[InstallInstruction]) -> Result<()> {
        self.section("Installing");

        if self.dry_run {
            self.dry_run_log
                .extend(plan.iter().map(InstallInstruction::to_string));
            tracing::info!("Dry run: recorded {} instruction(s)", plan.len());
            self.section("Complete");
            return Ok(());
        }

        let mut log = self.open_log();
        let mut failures = Vec::new();
        for inst in plan {
            write_log(&mut log, &inst.to_string());
            if let Err(e) = self.dispatch(inst) {
                tracing::error!("{} failed: {:#}", inst, e);
                write_log(&mut log, &format!("[ERROR] {:#}", e));
                failures.push(InstructionFailure {
                    instruction: inst.clone(),
                    message: format!("{:#}", e),
                });
            }
        }

        self.section("Complete");
        if failures.is_empty() {
            return Ok(());
        }
        self.errors.extend(failures.iter().cloned());
        Err(ProvisionError::ExecutionFailed(failures))
    }

    fn dispatch(&self, inst: &InstallInstruction) -> anyhow::Result<()> {
        match inst.kind {
            InstructionKind::Script => self.runner.run(SCRIPT, &[inst.package.as_str()]),
            InstructionKind::Installer(installer) => {
                let args = installer.invocation_args(&inst.package);
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                self.runner.run(installer.id(), &args)
            }
        }
    }

    /// Every failure collected since the last `clear_errors`, as one error.
    pub fn aggregated_error(&self) -> Option<ProvisionError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(ProvisionError::ExecutionFailed(self.errors.clone()))
        }
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    fn open_log(&self) -> Option<File> {
        let path = self.log_file.as_ref()?;
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("Cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn write_log(log: &mut Option<File>, line: &str) {
    if let Some(file) = log {
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!("Failed to write log file: {}", e);
        }
    }
}
