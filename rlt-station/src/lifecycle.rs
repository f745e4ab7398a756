use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::config::DeviceSection;
use crate::error::StationError;

/// Grace period after starting the embedded applications; their startup is
/// not synchronized, only approximated.
pub const APP_START_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct MacAddresses {
    pub eth0: Option<String>,
    pub wlan0: Option<String>,
}

/// Remote process control for one embedded device.
#[async_trait]
pub trait AppLifecycle: Send + Sync {
    /// Kills any previous instance of the test application.
    async fn kill_app(&self) -> Result<(), StationError>;

    /// Starts the test application; returns once the remote command is
    /// issued, not when the application is ready.
    async fn start_app(&self) -> Result<(), StationError>;

    async fn mac_addresses(&self) -> Result<MacAddresses, StationError>;
}

/// SSH-backed lifecycle, shelling out to `sshpass`/`ssh` like the rest of
/// the bench tooling.
pub struct SshLifecycle {
    host: IpAddr,
    user: String,
    password: String,
    start_cmd: String,
    kill_cmd: String,
}

impl SshLifecycle {
    pub fn new(host: IpAddr, section: &DeviceSection) -> Self {
        Self {
            host,
            user: section.ssh_user.clone(),
            password: section.ssh_password.clone(),
            start_cmd: section.start_cmd.clone(),
            kill_cmd: section.kill_cmd.clone(),
        }
    }

    fn ssh_command(&self, remote_cmd: &str) -> Command {
        let mut cmd = Command::new("sshpass");
        cmd.args(["-p", &self.password])
            .arg("ssh")
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "ConnectTimeout=3"])
            .arg(format!("{}@{}", self.user, self.host))
            .arg(remote_cmd);
        cmd
    }

    async fn run_remote(&self, remote_cmd: &str) -> Result<String, StationError> {
        let output = self
            .ssh_command(remote_cmd)
            .output()
            .await
            .map_err(|e| StationError::Lifecycle(format!("ssh to {}: {e}", self.host)))?;

        if !output.status.success() {
            return Err(StationError::Lifecycle(format!(
                "'{remote_cmd}' on {} failed: {}",
                self.host,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl AppLifecycle for SshLifecycle {
    async fn kill_app(&self) -> Result<(), StationError> {
        // killall reports failure when nothing was running; that is fine.
        if let Err(e) = self.run_remote(&self.kill_cmd).await {
            log::debug!("{e}");
        }
        Ok(())
    }

    async fn start_app(&self) -> Result<(), StationError> {
        // The application runs for the whole test, so the ssh command never
        // terminates on its own. Detach it instead of waiting.
        let mut child = self
            .ssh_command(&self.start_cmd)
            .spawn()
            .map_err(|e| StationError::Lifecycle(format!("ssh to {}: {e}", self.host)))?;

        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(())
    }

    async fn mac_addresses(&self) -> Result<MacAddresses, StationError> {
        let output = self.run_remote("ifconfig").await?;
        Ok(parse_mac_addresses(&output))
    }
}

/// Scrapes the eth0/wlan0 hardware addresses out of `ifconfig` output.
pub fn parse_mac_addresses(ifconfig: &str) -> MacAddresses {
    let find = |interface: &str| {
        let pattern = format!(r"(?s){interface}.*?ether\s+([0-9a-f]{{2}}(?::[0-9a-f]{{2}}){{5}})");
        Regex::new(&pattern)
            .expect("static interface pattern")
            .captures(ifconfig)
            .map(|c| c[1].to_string())
    };

    MacAddresses {
        eth0: find("eth0"),
        wlan0: find("wlan0"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IFCONFIG: &str = "\
eth0: flags=4163<UP,BROADCAST,RUNNING,MULTICAST>  mtu 1500
        inet 192.168.1.101  netmask 255.255.255.0
        ether d0:63:b4:02:86:27  txqueuelen 1000  (Ethernet)

lo: flags=73<UP,LOOPBACK,RUNNING>  mtu 65536
        inet 127.0.0.1  netmask 255.0.0.0

wlan0: flags=4099<UP,BROADCAST,MULTICAST>  mtu 1500
        ether d0:63:b4:02:86:28  txqueuelen 1000  (Ethernet)
";

    #[test]
    fn test_both_interfaces_found() {
        let macs = parse_mac_addresses(IFCONFIG);

        assert_eq!(macs.eth0.as_deref(), Some("d0:63:b4:02:86:27"));
        assert_eq!(macs.wlan0.as_deref(), Some("d0:63:b4:02:86:28"));
    }

    #[test]
    fn test_missing_interface() {
        let without_wlan = IFCONFIG.split("wlan0").next().unwrap();
        let macs = parse_mac_addresses(without_wlan);

        assert_eq!(macs.eth0.as_deref(), Some("d0:63:b4:02:86:27"));
        assert!(macs.wlan0.is_none());
    }
}
