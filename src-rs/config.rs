use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub downloads_path: PathBuf,
    pub servers_path: PathBuf,
    pub install_dir: PathBuf,
    pub update_repo: String,
    pub tick_interval: Duration,
    pub synthetic_cap: u8,
    pub job_deadline: Option<Duration>,
    pub retention: Option<Duration>,
    pub sweep_interval: Duration,
    pub persist_path: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            downloads_path: PathBuf::from("/opt/minecraft/downloads"),
            servers_path: PathBuf::from("/opt/minecraft/servers"),
            install_dir: PathBuf::from("/opt/minecraft"),
            update_repo: "https://github.com/JarlTheGamer/MinecraftOS".to_string(),
            tick_interval: Duration::from_secs(2),
            synthetic_cap: 95,
            job_deadline: Some(Duration::from_secs(30 * 60)),
            retention: Some(Duration::from_secs(60 * 60)),
            sweep_interval: Duration::from_secs(60),
            persist_path: None,
        }
    }
}

impl TrackerConfig {
    pub fn update_script(&self) -> PathBuf {
        self.install_dir.join("scripts").join("auto-update.sh")
    }

    pub fn version_file(&self) -> PathBuf {
        self.install_dir.join(".version")
    }

    pub fn last_update_file(&self) -> PathBuf {
        self.install_dir.join(".last_update")
    }

    pub fn last_check_file(&self) -> PathBuf {
        self.install_dir.join(".last_check")
    }
}
