use hostwatch_proto::{ObjectKind, Response};
use serde_json::Value;

use super::items::{
    FolderChange, FolderKey, HostChange, NewFolder, NewHost, NewPhone, NewUser, PhoneChange,
    UserChange, parse,
};
use super::{Caller, CommandError, CommandResult, Dispatcher};
use crate::database::models::{Folder, Host, HostState, PhoneNumber, User, unix_now};
use crate::database::{HostUpdate, StoreError};

/// Map a failed insert: uniqueness violations become `700 <duplicate>`
fn insert_error(duplicate: &str) -> impl FnOnce(StoreError) -> CommandError + '_ {
    move |err| match err {
        StoreError::Conflict => CommandError::conflict(duplicate),
        other => CommandError::storage("DB.error", other),
    }
}

/// Map a failed delete/update of a keyed row: a missing key becomes `300 <missing>`
fn keyed_error(missing: &str) -> impl FnOnce(StoreError) -> CommandError + '_ {
    move |err| match err {
        StoreError::NotFound => CommandError::not_found(missing),
        other => CommandError::storage("DB.error", other),
    }
}

impl Dispatcher {
    pub(super) async fn post(
        &self,
        object: ObjectKind,
        item: Value,
        caller: &Caller,
    ) -> CommandResult {
        match object {
            ObjectKind::Host => {
                let new: NewHost = parse(item)?;
                let host = Host {
                    ip: new.ip,
                    name: new.name,
                    folder_id: new.folder_id,
                    state: new.state.unwrap_or(HostState::Offline),
                    last_change_time: unix_now(),
                    info: new.info.unwrap_or_default(),
                    sms_config: new.sms.flatten(),
                };
                self.database
                    .insert_host(&host)
                    .await
                    .map_err(insert_error("DB.host exists"))?;
                self.audit(caller, format!("added host <{}>", host.ip)).await;
            }
            ObjectKind::Folder => {
                let new: NewFolder = parse(item)?;
                let folders = self.database.list_folders().await?;
                let id = folders.iter().map(|folder| folder.id).max().map_or(1, |max| max + 1);
                let folder = Folder { id, name: new.name };
                self.database
                    .insert_folder(&folder)
                    .await
                    .map_err(insert_error("DB.folder exists"))?;
                let message = format!("created folder <{}> with id {}", folder.name, folder.id);
                self.audit(caller, message).await;
            }
            ObjectKind::User => {
                let new: NewUser = parse(item)?;
                let user = User {
                    login: new.login,
                    password: new.password,
                    access: new.access,
                    last_online: None,
                };
                self.database
                    .insert_user(&user)
                    .await
                    .map_err(insert_error("DB.user exists"))?;
                let message = format!("created user <{}> ({})", user.login, user.access);
                self.audit(caller, message).await;
            }
            ObjectKind::Phone => {
                let new: NewPhone = parse(item)?;
                let phone = PhoneNumber { number: new.number, info: new.info };
                self.database
                    .insert_phone(&phone)
                    .await
                    .map_err(insert_error("DB.phone exists"))?;
                self.audit(caller, format!("added phone number <{}>", phone.number)).await;
            }
            ObjectKind::Pinger | ObjectKind::SmsApi | ObjectKind::LogFile => {
                return Err(CommandError::Malformed);
            }
        }

        Ok(Response::success("DB.success"))
    }

    pub(super) async fn put(
        &self,
        object: ObjectKind,
        item: Value,
        caller: &Caller,
    ) -> CommandResult {
        match object {
            ObjectKind::Host => self.put_host(parse(item)?, caller).await,
            ObjectKind::Folder => self.put_folder(parse(item)?, caller).await,
            ObjectKind::User => {
                let change: UserChange = parse(item)?;
                let new = change.new;
                let changed = new.password.is_some() || new.access.is_some();

                self.database
                    .update_user(&change.login, new.password.as_deref(), new.access)
                    .await
                    .map_err(keyed_error("user not exists"))?;

                if !changed {
                    return Ok(Response::success("no changes"));
                }
                self.audit(caller, format!("edited user <{}>", change.login)).await;
                Ok(Response::success("success"))
            }
            ObjectKind::Phone => {
                let change: PhoneChange = parse(item)?;
                self.database
                    .update_phone_info(&change.number, &change.new.info)
                    .await
                    .map_err(keyed_error("phone not exists"))?;
                self.audit(caller, format!("edited phone number <{}>", change.number)).await;
                Ok(Response::success("success"))
            }
            ObjectKind::Pinger | ObjectKind::SmsApi | ObjectKind::LogFile => {
                Err(CommandError::Malformed)
            }
        }
    }

    /// Validate the whole edit first, then apply field by field.
    ///
    /// Fields are separate writes: a failure part-way leaves the earlier
    /// fields changed and names the field that failed.
    async fn put_host(&self, change: HostChange, caller: &Caller) -> CommandResult {
        let new = change.new;
        let name = new.name.filter(|name| !name.is_empty());
        let new_ip = new.ip.filter(|ip| !ip.is_empty() && *ip != change.ip);

        if let Some(new_ip) = &new_ip {
            if self.database.get_host(new_ip).await?.is_some() {
                return Err(CommandError::conflict("new ip already exists"));
            }
        }
        if self.database.get_host(&change.ip).await?.is_none() {
            return Err(CommandError::not_found("ip not exists"));
        }

        let updates = [
            name.map(HostUpdate::Name),
            new.folder_id.map(HostUpdate::Folder),
            new.state.map(HostUpdate::State),
            new.info.map(HostUpdate::Info),
            new.sms.map(HostUpdate::Sms),
            new_ip.map(HostUpdate::Ip),
        ];

        for update in updates.into_iter().flatten() {
            let field = update.field();
            let audit = match &update {
                HostUpdate::Name(name) => format!("renamed host <{}> to \"{name}\"", change.ip),
                HostUpdate::State(state) => format!("set state of host <{}> to {state}", change.ip),
                HostUpdate::Ip(ip) => format!("changed IP of host <{}> to <{ip}>", change.ip),
                _ => format!("changed {field} of host <{}>", change.ip),
            };

            self.database
                .update_host(&change.ip, update)
                .await
                .map_err(|err| CommandError::storage(format!("DB.change_{field}.error"), err))?;
            self.audit(caller, audit).await;
        }

        Ok(Response::success("success"))
    }

    async fn put_folder(&self, change: FolderChange, caller: &Caller) -> CommandResult {
        let new = change.new;
        let name = new.name.filter(|name| !name.is_empty());
        let new_id = new.folder_id.filter(|id| *id != change.folder_id);

        if self.database.get_folder(change.folder_id).await?.is_none() {
            return Err(CommandError::not_found("folder not exists"));
        }
        if let Some(new_id) = new_id {
            if self.database.get_folder(new_id).await?.is_some() {
                return Err(CommandError::conflict("id folder already exists"));
            }
        }
        if let Some(target) = new.move_hosts_to {
            if self.database.get_folder(target).await?.is_none() {
                return Err(CommandError::not_found("folder not exists"));
            }
        }

        let mut current = change.folder_id;
        let mut changed = false;

        if let Some(name) = name {
            self.database
                .rename_folder(current, &name)
                .await
                .map_err(|err| CommandError::storage("DB.change_folder.error", err))?;
            self.audit(caller, format!("renamed folder {current} to \"{name}\"")).await;
            changed = true;
        }

        if let Some(new_id) = new_id {
            self.database.change_folder_id(current, new_id).await.map_err(|err| match err {
                StoreError::Conflict => CommandError::conflict("id folder already exists"),
                other => CommandError::storage("DB.change_folder.error", other),
            })?;
            self.audit(caller, format!("changed folder id {current} to {new_id}")).await;
            current = new_id;
            changed = true;
        }

        if let Some(target) = new.move_hosts_to.filter(|target| *target != current) {
            let moved = self
                .database
                .reassign_hosts(current, target)
                .await
                .map_err(|err| CommandError::storage("DB.change_folder.error", err))?;
            let message = format!("moved {moved} hosts from folder {current} to {target}");
            self.audit(caller, message).await;
            changed = true;
        }

        if changed {
            Ok(Response::success("DB.change_folder.success"))
        } else {
            Ok(Response::success("no changes"))
        }
    }

    pub(super) async fn delete(
        &self,
        object: ObjectKind,
        item: Value,
        caller: &Caller,
    ) -> CommandResult {
        match object {
            ObjectKind::Host => {
                let ip: String = parse(item)?;
                self.database.delete_host(&ip).await.map_err(keyed_error("ip not exists"))?;
                self.audit(caller, format!("deleted host <{ip}>")).await;
            }
            ObjectKind::Folder => {
                let FolderKey(id) = parse(item)?;
                if self.database.get_folder(id).await?.is_none() {
                    return Err(CommandError::not_found("folder not exists"));
                }
                if self.database.count_hosts_in_folder(id).await? > 0 {
                    return Err(CommandError::conflict("folder not empty"));
                }
                self.database
                    .delete_folder(id)
                    .await
                    .map_err(keyed_error("folder not exists"))?;
                self.audit(caller, format!("deleted folder with id {id}")).await;
            }
            ObjectKind::User => {
                let login: String = parse(item)?;
                self.database.delete_user(&login).await.map_err(keyed_error("user not exists"))?;
                self.audit(caller, format!("deleted user <{login}>")).await;
            }
            ObjectKind::Phone => {
                let number: String = parse(item)?;
                self.database
                    .delete_phone(&number)
                    .await
                    .map_err(keyed_error("phone not exists"))?;
                self.audit(caller, format!("deleted phone number <{number}>")).await;
            }
            ObjectKind::Pinger | ObjectKind::SmsApi | ObjectKind::LogFile => {
                return Err(CommandError::Malformed);
            }
        }

        Ok(Response::success("DB.delete.success"))
    }
}
