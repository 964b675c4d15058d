use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub capability: CapabilityConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FusionConfig {
    /// これ未満の信頼度の関節は欠損扱い（閾値ちょうどは採用）
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// 深度が読めないときの代替値（メートル、平均的な立ち位置）
    #[serde(default = "default_depth")]
    pub default_depth: f32,
    /// これを超える深度は無効値とみなす（メートル）
    #[serde(default = "default_max_valid_depth")]
    pub max_valid_depth: f32,
    /// Standardモードで使う推定深度（メートル）
    #[serde(default = "default_estimated_depth")]
    pub estimated_depth: f32,
}

fn default_confidence_threshold() -> f32 { 0.3 }
fn default_depth() -> f32 { 1.5 }
fn default_max_valid_depth() -> f32 { 10.0 }
fn default_estimated_depth() -> f32 { 1.5 }

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            default_depth: default_depth(),
            max_valid_depth: default_max_valid_depth(),
            estimated_depth: default_estimated_depth(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GovernorConfig {
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// 1フレームの処理予算（ミリ秒）。未指定なら 1000 / target_fps
    #[serde(default)]
    pub budget_ms: Option<f32>,
}

fn default_target_fps() -> u32 { 60 }

impl GovernorConfig {
    pub fn frame_budget_ms(&self) -> f32 {
        match self.budget_ms {
            Some(ms) if ms > 0.0 => ms,
            _ => 1000.0 / self.target_fps.max(1) as f32,
        }
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            budget_ms: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CapabilityConfig {
    /// 深度センサー（LiDAR/TrueDepth等）の有無
    #[serde(default)]
    pub has_depth_sensor: bool,
    /// 3D姿勢推定APIが使えるか
    #[serde(default)]
    pub supports_3d_pose: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// クライアントが指定しなかった場合の種目
    #[serde(default = "default_exercise")]
    pub exercise: String,
}

fn default_listen_addr() -> String { "0.0.0.0:9100".to_string() }
fn default_exercise() -> String { "squat".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            exercise: default_exercise(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 読めなければデフォルト設定で続行する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.fusion.confidence_threshold, 0.3);
        assert_eq!(config.fusion.default_depth, 1.5);
        assert_eq!(config.fusion.max_valid_depth, 10.0);
        assert_eq!(config.governor.target_fps, 60);
        assert!(!config.capability.has_depth_sensor);
        assert_eq!(config.server.exercise, "squat");
    }

    #[test]
    fn test_frame_budget() {
        let config = Config::default();
        assert!((config.governor.frame_budget_ms() - 16.666_666).abs() < 1e-3);

        let config = Config::parse("[governor]\ntarget_fps = 30\n").unwrap();
        assert!((config.governor.frame_budget_ms() - 33.333_332).abs() < 1e-3);

        let config = Config::parse("[governor]\nbudget_ms = 16.7\n").unwrap();
        assert_eq!(config.governor.frame_budget_ms(), 16.7);
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [capability]
            has_depth_sensor = true
            supports_3d_pose = true

            [fusion]
            estimated_depth = 2.0
        "#;
        let config = Config::parse(toml).unwrap();
        assert!(config.capability.has_depth_sensor);
        assert!(config.capability.supports_3d_pose);
        assert_eq!(config.fusion.estimated_depth, 2.0);
        assert_eq!(config.fusion.default_depth, 1.5);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/axis-trainer.toml");
        assert_eq!(config.server.listen_addr, "0.0.0.0:9100");
    }

    #[test]
    fn test_invalid_toml_is_error() {
        assert!(Config::parse("[fusion\n").is_err());
    }
}
