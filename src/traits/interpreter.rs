//! Receiver for driver-machine interface feedback.

/// Consumes the opaque command strings the DMI sends back through the
/// `etcs::dmi::feedback` parameter.
///
/// Command grammar and handling belong to the DMI integration; the bus only
/// forwards each payload untouched, with the vital state locked.
pub trait CommandInterpreter: Send {
    /// Handle one command string.
    fn interpret(&mut self, command: &str);
}

impl<F> CommandInterpreter for F
where
    F: FnMut(&str) + Send,
{
    fn interpret(&mut self, command: &str) {
        self(command)
    }
}

/// Interpreter that discards every command.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreCommands;

impl CommandInterpreter for IgnoreCommands {
    fn interpret(&mut self, command: &str) {
        tracing::trace!(command, "DMI feedback ignored");
    }
}
