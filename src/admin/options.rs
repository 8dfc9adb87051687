/// Common options used when opening a message file for administrative commands.
#[derive(Clone, Debug)]
pub struct AdminOpenOptions {
    /// Whether to take the exclusive advisory lock on the file while working.
    pub advisory_lock: bool,
}

impl Default for AdminOpenOptions {
    fn default() -> Self {
        Self {
            advisory_lock: true,
        }
    }
}
