use serde::Deserialize;

/// Texture detail level; each maps to one texture archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TexturePack {
    Low,
    Medium,
    #[default]
    High,
}

impl TexturePack {
    pub fn archive_name(self) -> &'static str {
        match self {
            Self::Low => "tex_tpc.erf",
            Self::Medium => "tex_tpb.erf",
            Self::High => "tex_tpa.erf",
        }
    }
}

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 6_000;
pub const DEFAULT_WALK_SPEED: f32 = 1.75;
pub const DEFAULT_RUN_SPEED: f32 = 5.4;
pub const DEFAULT_TURN_RATE_DEGREES: f32 = 180.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleConfig {
    pub texture_pack: TexturePack,
    /// Zero disables the heartbeat script.
    pub heartbeat_interval_ms: u64,
    /// Units per second.
    pub walk_speed: f32,
    pub run_speed: f32,
    /// Degrees per second.
    pub turn_rate_degrees: f32,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            texture_pack: TexturePack::default(),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            walk_speed: DEFAULT_WALK_SPEED,
            run_speed: DEFAULT_RUN_SPEED,
            turn_rate_degrees: DEFAULT_TURN_RATE_DEGREES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: ModuleConfig =
            serde_json::from_str(r#"{ "texture_pack": "low" }"#).expect("parse");

        assert_eq!(config.texture_pack, TexturePack::Low);
        assert_eq!(config.heartbeat_interval_ms, DEFAULT_HEARTBEAT_INTERVAL_MS);
        assert_eq!(config.walk_speed, DEFAULT_WALK_SPEED);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ModuleConfig>(r#"{ "texture_quality": "low" }"#);
        assert!(result.is_err());
    }

    #[test]
    fn packs_map_to_distinct_archives() {
        assert_eq!(TexturePack::High.archive_name(), "tex_tpa.erf");
        assert_eq!(TexturePack::Medium.archive_name(), "tex_tpb.erf");
        assert_eq!(TexturePack::Low.archive_name(), "tex_tpc.erf");
    }
}
