use crossterm::style::Color;
use healthmon_core::HealthStatus;

/// Terminal background the report is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Color scheme for the health report
#[derive(Debug, Clone)]
pub struct StatusPalette {
    pub foreground: Color,
    pub accent: Color,
    pub muted: Color,
    pub table_header: Color,
    pub healthy: Color,
    pub warning: Color,
    pub critical: Color,
    pub unknown: Color,
    pub maintenance: Color,
    /// When false, renderers emit no styling commands at all
    pub enabled: bool,
}

impl StatusPalette {
    pub fn new(theme: Theme, no_color: bool) -> Self {
        if no_color {
            Self::no_color()
        } else {
            match theme {
                Theme::Dark => Self::dark(),
                Theme::Light => Self::light(),
            }
        }
    }

    fn dark() -> Self {
        Self {
            foreground: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGrey,
            table_header: Color::Cyan,
            healthy: Color::Green,
            warning: Color::Yellow,
            critical: Color::Red,
            unknown: Color::DarkGrey,
            maintenance: Color::Blue,
            enabled: true,
        }
    }

    fn light() -> Self {
        Self {
            foreground: Color::Black,
            accent: Color::Blue,
            muted: Color::Grey,
            table_header: Color::DarkBlue,
            healthy: Color::DarkGreen,
            warning: Color::DarkYellow,
            critical: Color::DarkRed,
            unknown: Color::Grey,
            maintenance: Color::DarkBlue,
            enabled: true,
        }
    }

    fn no_color() -> Self {
        Self {
            foreground: Color::Reset,
            accent: Color::Reset,
            muted: Color::Reset,
            table_header: Color::Reset,
            healthy: Color::Reset,
            warning: Color::Reset,
            critical: Color::Reset,
            unknown: Color::Reset,
            maintenance: Color::Reset,
            enabled: false,
        }
    }

    /// Get color for a health status
    pub fn status_color(&self, status: HealthStatus) -> Color {
        match status {
            HealthStatus::Healthy => self.healthy,
            HealthStatus::Warning => self.warning,
            HealthStatus::Critical => self.critical,
            HealthStatus::Unknown => self.unknown,
            HealthStatus::Maintenance => self.maintenance,
        }
    }
}

impl Default for StatusPalette {
    fn default() -> Self {
        Self::new(Theme::default(), false)
    }
}
