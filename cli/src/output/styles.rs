//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

use crate::domain::ProxyStatus;

/// Centralized stylesheet for CLI output colors.
///
/// `Default` is the uncolored sheet used for `--no-color`, `NO_COLOR` and
/// non-TTY output.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// Secondary text: ids, fingerprints, timestamps
    pub dim: Style,
    pub bold: Style,
    /// Section titles in `server show`
    pub header: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
    }

    /// Style for a proxy's last observed status.
    #[must_use]
    pub fn status(&self, status: ProxyStatus) -> Style {
        match status {
            ProxyStatus::Running => self.success,
            ProxyStatus::Restarting => self.warning,
            ProxyStatus::Stopped => self.error,
            ProxyStatus::Unknown => self.dim,
        }
    }
}
