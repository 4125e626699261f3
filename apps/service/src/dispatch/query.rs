use hostwatch_proto::ObjectKind;
use serde::Serialize;
use serde_json::Value;

use super::items::{FolderQuery, HostQuery, UserQuery, parse};
use super::{CommandError, CommandResult, Dispatcher, success};
use crate::database::models::{Host, PhoneNumber, UserView};

/// Lines of the event log returned when the request does not say
const DEFAULT_LOG_LINES: usize = 100;

#[derive(Serialize)]
struct SmsRoster {
    phones: Vec<PhoneNumber>,
    hosts: Vec<Host>,
}

impl Dispatcher {
    pub(super) async fn get(&self, object: ObjectKind, item: Value) -> CommandResult {
        match object {
            ObjectKind::Host => match parse::<HostQuery>(item)? {
                HostQuery::Group(group) => {
                    let hosts = self.database.list_hosts().await?;
                    let hosts: Vec<_> =
                        hosts.into_iter().filter(|host| group.contains(host.state)).collect();
                    success(hosts)
                }
                HostQuery::One { ip } => match self.database.get_host(&ip).await? {
                    Some(host) => success(host),
                    None => Err(CommandError::not_found("not exists")),
                },
            },
            ObjectKind::Folder => match parse::<FolderQuery>(item)? {
                FolderQuery::All(_) => success(self.database.list_folders().await?),
                FolderQuery::One { folder_id } => {
                    if self.database.get_folder(folder_id).await?.is_none() {
                        return Err(CommandError::not_found("not exists"));
                    }
                    let hosts = self.database.list_hosts().await?;
                    let hosts: Vec<_> =
                        hosts.into_iter().filter(|host| host.folder_id == folder_id).collect();
                    success(hosts)
                }
            },
            ObjectKind::User => match parse::<UserQuery>(item)? {
                UserQuery::Online => success(self.sessions.online().await),
                UserQuery::Registered => {
                    let users = self.database.list_users().await?;
                    success(users.iter().map(UserView::from).collect::<Vec<_>>())
                }
            },
            ObjectKind::Pinger => success(self.database.pinger_config().await?),
            ObjectKind::Phone => success(self.database.list_phones().await?),
            ObjectKind::SmsApi => {
                let phones = self.database.list_phones().await?;
                let hosts = self
                    .database
                    .list_hosts()
                    .await?
                    .into_iter()
                    .filter(|host| host.sms_config.is_some())
                    .collect();
                success(SmsRoster { phones, hosts })
            }
            ObjectKind::LogFile => {
                let lines = parse::<Option<usize>>(item)?.unwrap_or(DEFAULT_LOG_LINES);
                match self.events.tail(lines).await {
                    Ok(Some(lines)) => success(lines),
                    Ok(None) => Err(CommandError::not_found("not exists")),
                    Err(e) => {
                        tracing::warn!("failed to read event log: {e:#}");
                        Err(CommandError::StorageFailure("DB.error".into()))
                    }
                }
            }
        }
    }
}
