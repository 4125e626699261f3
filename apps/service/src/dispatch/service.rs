use hostwatch_proto::Response;
use serde_json::Value;
use tracing::info;

use super::items::{peer_address, positive_number};
use super::{Caller, CommandError, CommandResult, Dispatcher, format_uptime};

impl Dispatcher {
    pub(super) async fn service(
        &self,
        command: i64,
        item: Value,
        caller: &Caller,
    ) -> CommandResult {
        let result = self.run_service(command, &item, caller).await;
        if matches!(result, Err(CommandError::Malformed)) {
            self.audit(caller, format!("SERVICE {command} rejected: bad request")).await;
        }
        result
    }

    async fn run_service(&self, command: i64, item: &Value, caller: &Caller) -> CommandResult {
        match command {
            10 => {
                self.pinger.ping_all();
                self.audit(caller, "started a check of all hosts").await;
            }
            20 => {
                let ip = item.as_str().filter(|ip| !ip.is_empty()).ok_or(CommandError::Malformed)?;
                self.pinger.ping_one(ip);
                self.audit(caller, format!("started a check of host <{ip}>")).await;
            }
            21 => {
                self.pinger.ping_dead();
                self.audit(caller, "started a check of unreachable hosts").await;
            }
            82 => return Ok(Response::success(format_uptime(self.uptime()))),
            30 => {
                self.audit(caller, "requested server shutdown").await;
                info!(login = %caller.login, "shutdown requested");
                self.shutdown.notify_one();
            }
            40 | 50 | 60 | 70 | 80 => self.tune(command, item, caller).await?,
            81 => {
                let peer = peer_address(item).ok_or(CommandError::Malformed)?;
                if self.sessions.evict(peer).await == 0 {
                    return Err(CommandError::not_found("client not exists"));
                }
                self.audit(caller, format!("disconnected client <{peer}>")).await;
            }
            _ => return Err(CommandError::Malformed),
        }

        Ok(Response::success(""))
    }

    /// Persist one pinger parameter and hand it to the running pinger
    async fn tune(&self, command: i64, item: &Value, caller: &Caller) -> Result<(), CommandError> {
        let value = positive_number(item).ok_or(CommandError::Malformed)?;
        let parameter = match command {
            40 => "hosts per second",
            50 => "echoes per host",
            60 => "echo interval",
            70 => "check interval",
            80 => "echo timeout",
            _ => return Err(CommandError::Malformed),
        };

        let whole = value.fract() == 0.0 && value <= f64::from(u32::MAX);
        if matches!(command, 40 | 50 | 70) && !whole {
            return Err(CommandError::Malformed);
        }

        self.pinger
            .update_config(|config| match command {
                40 => config.hosts_per_second = value as u32,
                50 => config.icmp_count = value as u32,
                60 => config.icmp_interval_s = value,
                70 => config.auto_ping_interval_s = value as u64,
                _ => config.icmp_timeout_s = value,
            })
            .await?;
        self.audit(caller, format!("changed pinger parameter <{parameter}> to {value}")).await;
        Ok(())
    }
}
