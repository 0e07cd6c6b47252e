use std::io;
use std::process::Command;

use crate::contract::{CommandOutcome, CommandRunner, Invocation};

/// Runs programs with `std::process::Command`, inheriting stdio so tool
/// output reaches the operator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<CommandOutcome> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .status()?;
        Ok(CommandOutcome {
            success: status.success(),
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_a_launch_error() {
        let result = SystemCommandRunner.run(&Invocation::new("tvbox-sync-no-such-program"));
        assert!(result.is_err());
    }
}
