//! Tracks which batch is currently accumulating.
//!
//! Only one batch may hold pending work at a time. Switching to another kind
//! flushes the active one first, so passes reach the GPU in the same order
//! as the draw calls that produced them.

use crate::error::RenderResult;

/// The batch kinds a draw can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Sprite,
    Mesh2d,
    Line,
    Clear,
}

/// Something that can flush the batch behind a [`CommandKind`].
pub trait FlushCommand {
    fn flush(&mut self, kind: CommandKind) -> RenderResult<()>;
}

#[derive(Debug, Default)]
pub struct CommandRouter {
    current: Option<CommandKind>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `next` the active command, flushing the previous one if it
    /// differs.
    ///
    /// A failed flush leaves no command active.
    pub fn switch_to(
        &mut self,
        next: CommandKind,
        commands: &mut impl FlushCommand,
    ) -> RenderResult<()> {
        if let Some(current) = self.current
            && current != next
        {
            self.current = None;
            tracing::trace!("Switching from {:?} to {:?}", current, next);
            commands.flush(current)?;
        }

        self.current = Some(next);
        Ok(())
    }

    /// Flush the active command, if any. No command is active afterwards,
    /// even if the flush fails.
    pub fn flush_current(&mut self, commands: &mut impl FlushCommand) -> RenderResult<()> {
        match self.current.take() {
            Some(current) => commands.flush(current),
            None => Ok(()),
        }
    }

    pub fn current(&self) -> Option<CommandKind> {
        self.current
    }
}
