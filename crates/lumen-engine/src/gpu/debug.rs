//! GPU debug-message classification.
//!
//! Classification is data, not control flow: each tag maps to its label through
//! a lookup table, and severity alone decides the log level.

use std::fmt;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DebugSource {
    Api,
    WindowSystem,
    ShaderCompiler,
    ThirdParty,
    Application,
    Other,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DebugKind {
    Error,
    DeprecatedBehavior,
    UndefinedBehavior,
    Portability,
    Performance,
    Other,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum DebugSeverity {
    Notification,
    Low,
    Medium,
    High,
}

const SOURCE_LABELS: [(DebugSource, &str); 6] = [
    (DebugSource::Api, "Graphics API"),
    (DebugSource::WindowSystem, "Window system"),
    (DebugSource::ShaderCompiler, "Shader compiler"),
    (DebugSource::ThirdParty, "Third party"),
    (DebugSource::Application, "Application"),
    (DebugSource::Other, "Other"),
];

const KIND_LABELS: [(DebugKind, &str); 6] = [
    (DebugKind::Error, "Error"),
    (DebugKind::DeprecatedBehavior, "Deprecated behavior"),
    (DebugKind::UndefinedBehavior, "Undefined behavior"),
    (DebugKind::Portability, "Portability"),
    (DebugKind::Performance, "Performance"),
    (DebugKind::Other, "Other"),
];

const SEVERITY_LABELS: [(DebugSeverity, &str); 4] = [
    (DebugSeverity::Notification, "Notification"),
    (DebugSeverity::Low, "Low"),
    (DebugSeverity::Medium, "Medium"),
    (DebugSeverity::High, "High"),
];

fn lookup<T: PartialEq + Copy>(table: &[(T, &'static str)], tag: T) -> &'static str {
    table
        .iter()
        .find(|(t, _)| *t == tag)
        .map_or("Unknown", |(_, label)| *label)
}

impl DebugSource {
    pub fn as_str(self) -> &'static str {
        lookup(&SOURCE_LABELS, self)
    }
}

impl DebugKind {
    pub fn as_str(self) -> &'static str {
        lookup(&KIND_LABELS, self)
    }
}

impl DebugSeverity {
    pub fn as_str(self) -> &'static str {
        lookup(&SEVERITY_LABELS, self)
    }

    pub fn log_level(self) -> log::Level {
        match self {
            DebugSeverity::High => log::Level::Error,
            DebugSeverity::Medium => log::Level::Warn,
            DebugSeverity::Low => log::Level::Info,
            DebugSeverity::Notification => log::Level::Debug,
        }
    }
}

/// One diagnostic reported by the graphics backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugMessage {
    pub source: DebugSource,
    pub kind: DebugKind,
    pub id: u32,
    pub severity: DebugSeverity,
    pub message: String,
}

impl DebugMessage {
    /// Classifies an uncaptured `wgpu` device error.
    pub fn from_wgpu(error: &wgpu::Error) -> Self {
        let (source, kind, severity, id) = match error {
            wgpu::Error::OutOfMemory { .. } => {
                (DebugSource::Api, DebugKind::Error, DebugSeverity::High, 1)
            }
            wgpu::Error::Validation { .. } => {
                (DebugSource::Api, DebugKind::UndefinedBehavior, DebugSeverity::High, 2)
            }
            _ => (DebugSource::Other, DebugKind::Other, DebugSeverity::Medium, 3),
        };

        Self {
            source,
            kind,
            id,
            severity,
            message: error.to_string(),
        }
    }

    pub fn log(&self) {
        log::log!(target: "lumen::gpu", self.severity.log_level(), "{self}");
    }
}

impl fmt::Display for DebugMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Source: {} | Type: {} | ID: {} | Severity: {} | Message: {}",
            self.source.as_str(),
            self.kind.as_str(),
            self.id,
            self.severity.as_str(),
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_has_a_label() {
        for (tag, label) in SOURCE_LABELS {
            assert_eq!(tag.as_str(), label);
        }
        for (tag, label) in KIND_LABELS {
            assert_eq!(tag.as_str(), label);
        }
        for (tag, label) in SEVERITY_LABELS {
            assert_eq!(tag.as_str(), label);
        }
    }

    #[test]
    fn message_formats_all_fields() {
        let msg = DebugMessage {
            source: DebugSource::ShaderCompiler,
            kind: DebugKind::Performance,
            id: 42,
            severity: DebugSeverity::Low,
            message: "slow path".to_string(),
        };
        assert_eq!(
            msg.to_string(),
            "Source: Shader compiler | Type: Performance | ID: 42 | Severity: Low | Message: slow path"
        );
    }

    #[test]
    fn severity_drives_log_level() {
        assert_eq!(DebugSeverity::High.log_level(), log::Level::Error);
        assert_eq!(DebugSeverity::Medium.log_level(), log::Level::Warn);
        assert_eq!(DebugSeverity::Notification.log_level(), log::Level::Debug);
    }
}
